//! Core of the multi-screen server
//!
//! `Server` owns one backend per physical screen, the composite resource
//! table and the dispatch table. Every request a client sends is routed to a
//! handler which resolves the composites it names, replays it on the screens
//! and synthesizes the single reply the client sees.

mod client;
mod coords;
pub mod dispatch;
pub mod fanout;
mod procs;

pub use client::Client;
pub use coords::{to_desktop, to_screen, Translation};
pub use dispatch::{Dispatcher, Handler, RequestHandler};
pub use fanout::{directive_for, FanoutDirective, FanoutOutcome, ReplayBuffer, ReplySource};

use crate::backend::{Backend, MemoryBackend, ScreenInfo, ScreenProbe};
use crate::protocol::*;
use crate::resources::{CompositeResource, CompositeTable, KindData, ResourceKind};
use crate::screens::{ScreenDescriptor, ScreenGeometry, ScreenIndex, ScreenSet};
use crate::security::{ClientId, SecurityPolicy, SERVER_CLIENT};
use std::collections::{BTreeMap, HashMap};
use std::error::Error;

/// The logical X11 screen spread over N physical screens
pub struct Server {
    /// Layout of the physical screens
    screens: ScreenSet,

    /// One backend per physical screen, by index
    backends: Vec<Box<dyn Backend>>,

    /// Static screen descriptions, by index
    infos: Vec<ScreenInfo>,

    /// Logical id -> per-screen ids
    table: CompositeTable,

    /// Opcode -> handler
    dispatcher: Dispatcher,

    /// Connected clients
    clients: HashMap<ClientId, Client>,

    /// Next client ID to hand out
    next_client_id: ClientId,

    /// Logical root window (screen 0's root)
    root: XID,

    /// Logical default colormap
    default_colormap: XID,

    /// Screen saver window, treated like the root for coordinates
    saver: Option<XID>,
}

impl Server {
    /// Create a server over `backends`, screen `i` placed at `origins[i]` on
    /// the desktop
    pub fn new(
        backends: Vec<Box<dyn Backend>>,
        origins: &[(i32, i32)],
        policy: SecurityPolicy,
    ) -> Result<Self, Box<dyn Error + Send + Sync>> {
        if backends.is_empty() {
            return Err("At least one screen is required".into());
        }
        if origins.len() != backends.len() {
            return Err(format!(
                "{} screens but {} origins",
                backends.len(),
                origins.len()
            )
            .into());
        }

        let infos: Vec<ScreenInfo> = backends.iter().map(|b| b.screen_info()).collect();
        let screens = ScreenSet::new(
            infos
                .iter()
                .zip(origins)
                .enumerate()
                .map(|(i, (info, &(origin_x, origin_y)))| ScreenDescriptor {
                    index: ScreenIndex(i),
                    origin_x,
                    origin_y,
                    width: info.width,
                    height: info.height,
                    root: info.root,
                })
                .collect(),
        );

        let mut table = CompositeTable::new(backends.len(), policy);
        let root = infos[0].root;
        let default_colormap = infos[0].default_colormap;
        table.register(CompositeResource {
            logical_id: root,
            owner: SERVER_CLIENT,
            per_screen: per_screen_ids(&infos, |info| info.root),
            data: KindData::Window {
                is_root: true,
                class: WindowClass::InputOutput,
            },
        })?;
        table.register(CompositeResource {
            logical_id: default_colormap,
            owner: SERVER_CLIENT,
            per_screen: per_screen_ids(&infos, |info| info.default_colormap),
            data: KindData::Colormap,
        })?;

        let (width, height) = screens.desktop_size();
        log::info!(
            "Xinerama desktop {}x{} across {} screens",
            width,
            height,
            screens.len()
        );
        for screen in screens.iter() {
            log::info!(
                "  {}: {}x{}+{}+{} root {}",
                screen.index,
                screen.width,
                screen.height,
                screen.origin_x,
                screen.origin_y,
                screen.root
            );
        }

        Ok(Server {
            screens,
            backends,
            infos,
            table,
            dispatcher: procs::install(),
            clients: HashMap::new(),
            next_client_id: 1,
            root,
            default_colormap,
            saver: None,
        })
    }

    /// Server over in-memory screens laid out as given, plus a probe per
    /// screen
    pub fn with_memory_screens(
        layout: &[ScreenGeometry],
        policy: SecurityPolicy,
    ) -> Result<(Self, Vec<ScreenProbe>), Box<dyn Error + Send + Sync>> {
        let mut backends: Vec<Box<dyn Backend>> = Vec::new();
        let mut probes = Vec::new();
        for (i, geometry) in layout.iter().enumerate() {
            let backend = MemoryBackend::new(i, geometry.width, geometry.height);
            probes.push(backend.probe());
            backends.push(Box::new(backend));
        }
        let origins: Vec<(i32, i32)> = layout.iter().map(|g| (g.x, g.y)).collect();
        let server = Server::new(backends, &origins, policy)?;
        Ok((server, probes))
    }

    pub fn screens(&self) -> &ScreenSet {
        &self.screens
    }

    pub fn table(&self) -> &CompositeTable {
        &self.table
    }

    /// Get the root window
    pub fn root_window(&self) -> Window {
        Window(self.root)
    }

    pub fn default_colormap(&self) -> Colormap {
        Colormap(self.default_colormap)
    }

    pub fn screen_saver(&self) -> Option<Window> {
        self.saver.map(Window)
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    /// Every physical id behind a logical id, by screen
    pub fn physical_ids(&self, logical: XID) -> Option<BTreeMap<ScreenIndex, XID>> {
        self.table.get(logical).map(|r| r.per_screen.clone())
    }

    /// Screen 0's physical id behind a logical id
    pub fn primary_id(&self, logical: XID) -> Option<XID> {
        self.table
            .get(logical)
            .and_then(|r| r.physical(ScreenIndex::PRIMARY))
    }

    /// Mark a composite pixmap as backed by storage every screen shares, as
    /// a shared-memory extension does after creating it. Drawing to it then
    /// goes to screen 0 only.
    pub fn adopt_shared_pixmap(&mut self, pixmap: XID) -> X11Result<()> {
        self.table.set_data(pixmap, KindData::Pixmap { shared: true })?;
        log::debug!("Pixmap {} is shared", pixmap);
        Ok(())
    }

    /// Create the screen saver window: a server-owned child of the root on
    /// every screen, each covering its own screen the way the root does
    pub fn create_screen_saver(&mut self) -> X11Result<Window> {
        if let Some(saver) = self.saver {
            return Ok(Window(saver));
        }
        let wid = self.table.allocate_id()?;
        let root = self
            .table
            .get(self.root)
            .cloned()
            .ok_or_else(|| X11Error::bad_window(self.root))?;
        let sizes: Vec<(u16, u16)> = self.screens.iter().map(|s| (s.width, s.height)).collect();
        let request = CreateWindowRequest {
            depth: 0,
            wid: Window(wid),
            parent: Window(self.root),
            x: 0,
            y: 0,
            width: sizes[0].0,
            height: sizes[0].1,
            border_width: 0,
            class: WindowClass::InputOutput,
            visual: VisualID::COPY_FROM_PARENT,
            values: ValueList::new(window_attr::OVERRIDE_REDIRECT, vec![1]),
        };
        self.create_composite(
            SERVER_CLIENT,
            Opcode::Core(RequestOpcode::CreateWindow),
            wid,
            KindData::Window {
                is_root: false,
                class: WindowClass::InputOutput,
            },
            request,
            Request::CreateWindow,
            |req, screen, id| {
                req.wid = Window(id);
                req.parent = Window(root.physical_on(screen)?);
                (req.width, req.height) = sizes[screen.0];
                Ok(())
            },
        )?;
        self.saver = Some(wid);
        log::info!("Screen saver window {}", wid);
        Ok(Window(wid))
    }

    /// Register a new client
    pub fn register_client(&mut self, byte_order: ByteOrder) -> ClientId {
        let client_id = self.next_client_id;
        self.next_client_id += 1;
        self.clients
            .insert(client_id, Client::new(client_id, byte_order));
        log::info!("Client {} connected", client_id);
        client_id
    }

    /// Tear a client down: every composite it owns is destroyed through the
    /// ordinary destroy requests
    pub fn close_client(&mut self, client: ClientId) {
        self.clients.remove(&client);
        let owned = self.table.owned_by(client);
        log::info!(
            "Client {} disconnected, freeing {} resources",
            client,
            owned.len()
        );

        for (kind, id) in owned {
            // Windows go away with their parent
            if !self.table.contains(id) {
                continue;
            }
            let target = ResourceRequest::new(id);
            let request = match kind {
                ResourceKind::Picture => Request::RenderFreePicture(target),
                ResourceKind::Gc => Request::FreeGC(target),
                ResourceKind::Window => Request::DestroyWindow(target),
                ResourceKind::Pixmap => Request::FreePixmap(target),
                ResourceKind::Colormap => Request::FreeColormap(target),
            };
            if let Err(err) = self.handle(SERVER_CLIENT, &request) {
                log::warn!("Failed to free {} {}: {}", kind.as_str(), id, err);
            }
            if self.table.release(id).is_some() {
                log::warn!("Dropped {} {} left behind by client {}", kind.as_str(), id, client);
            }
        }
    }

    /// Execute one request on behalf of `client`
    pub fn handle(&mut self, client: ClientId, request: &Request) -> X11Result<Option<Reply>> {
        let opcode = request.opcode();
        let stamp = |err: X11Error| err.with_opcodes(opcode.major(), opcode.minor());

        let handler = self
            .dispatcher
            .get(opcode)
            .ok_or_else(|| stamp(X11Error::bad_request()))?;
        log::debug!("Client {}: {}", client, opcode);
        handler.handle(self, client, request).map_err(stamp)
    }

    /// Execute every request in `bytes` and return the wire replies and
    /// errors, in order
    pub fn process(&mut self, client: ClientId, bytes: &[u8]) -> Vec<u8> {
        let (parser, encoder) = match self.clients.get(&client) {
            Some(session) => (session.parser(), session.encoder()),
            None => {
                log::warn!("Request data from unknown client {}", client);
                return Vec::new();
            }
        };

        let mut output = Vec::new();
        let mut offset = 0;
        while offset < bytes.len() {
            let remaining = &bytes[offset..];
            let size = match RequestHeader::parse(remaining, parser.byte_order()) {
                Ok(header) if header.size() >= 4 && header.size() <= remaining.len() => {
                    header.size()
                }
                _ => {
                    log::warn!(
                        "Client {}: {} trailing bytes do not form a request",
                        client,
                        remaining.len()
                    );
                    break;
                }
            };

            let sequence = match self.clients.get_mut(&client) {
                Some(session) => session.next_sequence(),
                None => break,
            };
            let result = parser
                .parse_request(remaining)
                .and_then(|(request, _)| self.handle(client, &request));
            match result {
                Ok(Some(reply)) => output.extend(encoder.encode_reply(sequence, &reply)),
                Ok(None) => {}
                Err(err) => {
                    log::debug!("Client {}: request {} failed: {}", client, sequence, err);
                    let err = X11Error { sequence, ..err };
                    output.extend(encoder.encode_error(&err));
                }
            }
            offset += size;
        }
        output
    }
}

fn per_screen_ids(
    infos: &[ScreenInfo],
    id: impl Fn(&ScreenInfo) -> XID,
) -> BTreeMap<ScreenIndex, XID> {
    infos
        .iter()
        .enumerate()
        .map(|(i, info)| (ScreenIndex(i), id(info)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_screens() -> (Server, Vec<ScreenProbe>) {
        let layout = [
            ScreenGeometry {
                x: 0,
                y: 0,
                width: 640,
                height: 480,
            },
            ScreenGeometry {
                x: 640,
                y: 0,
                width: 640,
                height: 480,
            },
        ];
        Server::with_memory_screens(&layout, SecurityPolicy::permissive()).unwrap()
    }

    #[test]
    fn test_root_and_colormap_are_composites() {
        let (server, probes) = two_screens();
        let root = server.physical_ids(server.root_window().id()).unwrap();
        assert_eq!(root.len(), 2);
        assert_eq!(root[&ScreenIndex(1)], probes[1].screen_info().root);
        assert!(server
            .physical_ids(server.default_colormap().id())
            .is_some());
    }

    #[test]
    fn test_replaced_handler_errors_are_stamped() {
        let (mut server, _) = two_screens();
        server.dispatcher_mut().replace(
            Opcode::Core(RequestOpcode::MapWindow),
            std::sync::Arc::new(
                |_: &mut Server, _: ClientId, _: &Request| -> X11Result<Option<Reply>> {
                    Err(X11Error::bad_request())
                },
            ),
        );
        let err = server
            .handle(1, &Request::MapWindow(ResourceRequest::new(XID(0x100))))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Request);
        assert_eq!(err.major_opcode, RequestOpcode::MapWindow as u8);
    }

    #[test]
    fn test_process_stamps_sequence() {
        let (mut server, _) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);

        // MapWindow on an unknown window, then GetGeometry of the root
        let mut bytes = vec![8, 0, 2, 0];
        bytes.extend_from_slice(&0x0020_0001u32.to_le_bytes());
        bytes.extend_from_slice(&[14, 0, 2, 0]);
        bytes.extend_from_slice(&0x100u32.to_le_bytes());

        let output = server.process(client, &bytes);
        assert_eq!(output.len(), 64);
        assert_eq!(output[0], 0);
        assert_eq!(output[1], ErrorCode::Window as u8);
        assert_eq!(u16::from_le_bytes([output[2], output[3]]), 1);
        assert_eq!(output[32], 1);
        assert_eq!(u16::from_le_bytes([output[34], output[35]]), 2);
        // Root reports the whole desktop
        assert_eq!(u16::from_le_bytes([output[48], output[49]]), 1280);
    }

    #[test]
    fn test_screen_saver_covers_each_screen() {
        let (mut server, probes) = two_screens();
        let saver = server.create_screen_saver().unwrap();
        let ids = server.physical_ids(saver.id()).unwrap();
        for (screen, id) in ids {
            let window = probes[screen.0].window(id).unwrap();
            assert_eq!((window.x, window.y, window.width), (0, 0, 640));
        }
        assert_eq!(server.create_screen_saver().unwrap(), saver);
    }
}
