//! Request procedures
//!
//! One `Server` method per handled request, grouped by resource kind, plus
//! the helpers they share: composite resolution, target screen selection,
//! creation bookkeeping and value-list id rewriting.

mod colormap;
mod copy;
mod drawing;
mod gc;
mod pixmap;
mod query;
mod render;
mod window;
mod xinerama;

use super::dispatch::{route, Dispatcher};
use super::fanout::{self, directive_for, FanoutDirective, FanoutOutcome};
use super::{Server, Translation};
use crate::protocol::*;
use crate::resources::{CompositeResource, KindData, ResourceKind, SERVER_BIT};
use crate::screens::{Order, ScreenIndex};
use crate::security::{Access, ClientId, SERVER_CLIENT};
use std::collections::BTreeMap;

/// Attribute bit, kind of the resource it names, values that name none
type AttrSpec = (u32, ResourceKind, &'static [u32]);

const WINDOW_ATTR_IDS: [AttrSpec; 3] = [
    (window_attr::BACK_PIXMAP, ResourceKind::Pixmap, &[NONE, PARENT_RELATIVE]),
    (window_attr::BORDER_PIXMAP, ResourceKind::Pixmap, &[COPY_FROM_PARENT]),
    (window_attr::COLORMAP, ResourceKind::Colormap, &[COPY_FROM_PARENT]),
];

const GC_ATTR_IDS: [AttrSpec; 3] = [
    (gc_attr::TILE, ResourceKind::Pixmap, &[]),
    (gc_attr::STIPPLE, ResourceKind::Pixmap, &[]),
    (gc_attr::CLIP_MASK, ResourceKind::Pixmap, &[NONE]),
];

const PICTURE_ATTR_IDS: [AttrSpec; 2] = [
    (picture_attr::ALPHA_MAP, ResourceKind::Picture, &[NONE]),
    (picture_attr::CLIP_MASK, ResourceKind::Pixmap, &[NONE]),
];

/// Id-valued attributes of a value list, resolved to their per-screen ids
#[derive(Debug, Default, Clone)]
pub(crate) struct AttrIds {
    slots: Vec<(u32, BTreeMap<ScreenIndex, XID>)>,
}

impl AttrIds {
    pub(crate) fn apply(&self, values: &mut ValueList, screen: ScreenIndex) {
        for (bit, ids) in &self.slots {
            if let Some(id) = ids.get(&screen) {
                values.set(*bit, id.get());
            }
        }
    }
}

pub(crate) fn core(op: RequestOpcode) -> Opcode {
    Opcode::Core(op)
}

/// Build the dispatch table of every handled request
pub(crate) fn install() -> Dispatcher {
    use RequestOpcode as Op;

    let mut d = Dispatcher::new();

    route!(d, Opcode::Core(Op::CreateWindow), CreateWindow => create_window);
    route!(d, Opcode::Core(Op::ChangeWindowAttributes), ChangeWindowAttributes => change_window_attributes);
    route!(d, Opcode::Core(Op::DestroyWindow), DestroyWindow => destroy_window);
    route!(d, Opcode::Core(Op::DestroySubwindows), DestroySubwindows => destroy_subwindows);
    route!(d, Opcode::Core(Op::ChangeSaveSet), ChangeSaveSet => change_save_set);
    route!(d, Opcode::Core(Op::ReparentWindow), ReparentWindow => reparent_window);
    route!(d, Opcode::Core(Op::MapWindow), MapWindow => map_window);
    route!(d, Opcode::Core(Op::MapSubwindows), MapSubwindows => map_subwindows);
    route!(d, Opcode::Core(Op::UnmapWindow), UnmapWindow => unmap_window);
    route!(d, Opcode::Core(Op::UnmapSubwindows), UnmapSubwindows => unmap_subwindows);
    route!(d, Opcode::Core(Op::ConfigureWindow), ConfigureWindow => configure_window);
    route!(d, Opcode::Core(Op::CirculateWindow), CirculateWindow => circulate_window);

    route!(d, Opcode::Core(Op::GetGeometry), GetGeometry => get_geometry);
    route!(d, Opcode::Core(Op::TranslateCoordinates), TranslateCoordinates => translate_coordinates);
    route!(d, Opcode::Core(Op::GetImage), GetImage => get_image);

    route!(d, Opcode::Core(Op::CreatePixmap), CreatePixmap => create_pixmap);
    route!(d, Opcode::Core(Op::FreePixmap), FreePixmap => free_pixmap);
    route!(d, Opcode::Core(Op::CreateGC), CreateGC => create_gc);
    route!(d, Opcode::Core(Op::ChangeGC), ChangeGC => change_gc);
    route!(d, Opcode::Core(Op::CopyGC), CopyGC => copy_gc);
    route!(d, Opcode::Core(Op::SetDashes), SetDashes => set_dashes);
    route!(d, Opcode::Core(Op::SetClipRectangles), SetClipRectangles => set_clip_rectangles);
    route!(d, Opcode::Core(Op::FreeGC), FreeGC => free_gc);

    route!(d, Opcode::Core(Op::ClearArea), ClearArea => clear_area);
    route!(d, Opcode::Core(Op::CopyArea), CopyArea => copy_area);
    route!(d, Opcode::Core(Op::CopyPlane), CopyPlane => copy_plane);
    route!(d, Opcode::Core(Op::PolyPoint), PolyPoint => poly_point);
    route!(d, Opcode::Core(Op::PolyLine), PolyLine => poly_line);
    route!(d, Opcode::Core(Op::PolySegment), PolySegment => poly_segment);
    route!(d, Opcode::Core(Op::PolyRectangle), PolyRectangle => poly_rectangle);
    route!(d, Opcode::Core(Op::PolyArc), PolyArc => poly_arc);
    route!(d, Opcode::Core(Op::FillPoly), FillPoly => fill_poly);
    route!(d, Opcode::Core(Op::PolyFillRectangle), PolyFillRectangle => poly_fill_rectangle);
    route!(d, Opcode::Core(Op::PolyFillArc), PolyFillArc => poly_fill_arc);
    route!(d, Opcode::Core(Op::PutImage), PutImage => put_image);
    route!(d, Opcode::Core(Op::PolyText8), PolyText8 => poly_text8);
    route!(d, Opcode::Core(Op::PolyText16), PolyText16 => poly_text16);
    route!(d, Opcode::Core(Op::ImageText8), ImageText8 => image_text8);
    route!(d, Opcode::Core(Op::ImageText16), ImageText16 => image_text16);

    route!(d, Opcode::Core(Op::CreateColormap), CreateColormap => create_colormap);
    route!(d, Opcode::Core(Op::FreeColormap), FreeColormap => free_colormap);
    route!(d, Opcode::Core(Op::CopyColormapAndFree), CopyColormapAndFree => copy_colormap_and_free);
    route!(d, Opcode::Core(Op::InstallColormap), InstallColormap => install_colormap);
    route!(d, Opcode::Core(Op::UninstallColormap), UninstallColormap => uninstall_colormap);
    route!(d, Opcode::Core(Op::AllocColor), AllocColor => alloc_color);
    route!(d, Opcode::Core(Op::AllocNamedColor), AllocNamedColor => alloc_named_color);
    route!(d, Opcode::Core(Op::AllocColorCells), AllocColorCells => alloc_color_cells);
    route!(d, Opcode::Core(Op::AllocColorPlanes), AllocColorPlanes => alloc_color_planes);
    route!(d, Opcode::Core(Op::FreeColors), FreeColors => free_colors);
    route!(d, Opcode::Core(Op::StoreColors), StoreColors => store_colors);
    route!(d, Opcode::Core(Op::StoreNamedColor), StoreNamedColor => store_named_color);

    route!(d, Opcode::Render(RenderOpcode::CreatePicture), RenderCreatePicture => create_picture);
    route!(d, Opcode::Render(RenderOpcode::ChangePicture), RenderChangePicture => change_picture);
    route!(d, Opcode::Render(RenderOpcode::SetPictureClipRectangles), RenderSetPictureClipRectangles => set_picture_clip_rectangles);
    route!(d, Opcode::Render(RenderOpcode::FreePicture), RenderFreePicture => free_picture);
    route!(d, Opcode::Render(RenderOpcode::Composite), RenderComposite => composite);
    route!(d, Opcode::Render(RenderOpcode::FillRectangles), RenderFillRectangles => fill_rectangles);
    route!(d, Opcode::Render(RenderOpcode::CreateSolidFill), RenderCreateSolidFill => create_solid_fill);

    route!(d, Opcode::Xinerama(XineramaOpcode::QueryVersion), XineramaQueryVersion => xinerama_query_version);
    route!(d, Opcode::Xinerama(XineramaOpcode::GetState), XineramaGetState => xinerama_get_state);
    route!(d, Opcode::Xinerama(XineramaOpcode::GetScreenCount), XineramaGetScreenCount => xinerama_get_screen_count);
    route!(d, Opcode::Xinerama(XineramaOpcode::GetScreenSize), XineramaGetScreenSize => xinerama_get_screen_size);
    d.register(
        Opcode::Xinerama(XineramaOpcode::IsActive),
        |server: &mut Server, _: ClientId, _: &Request| server.xinerama_is_active(),
    );
    d.register(
        Opcode::Xinerama(XineramaOpcode::QueryScreens),
        |server: &mut Server, _: ClientId, _: &Request| server.xinerama_query_screens(),
    );

    d
}

impl Server {
    pub(crate) fn resolve(
        &self,
        client: ClientId,
        id: XID,
        kind: ResourceKind,
        access: Access,
    ) -> X11Result<CompositeResource> {
        self.table.lookup(id, kind, client, access).cloned()
    }

    /// Window or pixmap; a miss is `BadDrawable`
    pub(crate) fn resolve_drawable(
        &self,
        client: ClientId,
        id: XID,
        access: Access,
    ) -> X11Result<CompositeResource> {
        self.table
            .lookup_drawable(id, client, access)
            .cloned()
            .map_err(|err| match err.code {
                ErrorCode::Value => X11Error::bad_drawable(id),
                _ => err,
            })
    }

    /// Resolve every id-valued attribute present in `values`
    pub(crate) fn resolve_attr_ids(
        &self,
        client: ClientId,
        values: &ValueList,
        specs: &[AttrSpec],
    ) -> X11Result<AttrIds> {
        if !values.is_well_formed() {
            return Err(X11Error::bad_length());
        }
        let mut ids = AttrIds::default();
        for &(bit, kind, sentinels) in specs {
            let Some(value) = values.get(bit) else {
                continue;
            };
            if sentinels.contains(&value) {
                continue;
            }
            let resource = self.resolve(client, XID(value), kind, Access::GetAttr)?;
            ids.slots.push((bit, resource.per_screen));
        }
        Ok(ids)
    }

    /// Per-screen translations, indexed by screen
    pub(crate) fn translations(&self) -> Vec<Translation> {
        self.screens
            .iter()
            .map(|s| Translation::new(s.origin_x, s.origin_y))
            .collect()
    }

    /// Translation of a drawable's content coordinates: only drawables
    /// that stand for the whole desktop move
    pub(crate) fn content_translations(&self, drawable: &CompositeResource) -> Vec<Translation> {
        if self.is_root_like(drawable) {
            self.translations()
        } else {
            vec![Translation::default(); self.screens.len()]
        }
    }

    pub(crate) fn is_root_like(&self, resource: &CompositeResource) -> bool {
        resource.is_root() || Some(resource.logical_id) == self.saver
    }

    /// Whether a window with this parent is positioned in desktop coordinates
    pub(crate) fn parent_is_root(&self, parent: XID) -> bool {
        parent == self.root || Some(parent) == self.saver
    }

    /// Parent of a window as screen 0 sees it
    pub(crate) fn window_parent(&self, window: &CompositeResource) -> Option<XID> {
        let id = window.physical(ScreenIndex::PRIMARY)?;
        self.backends
            .first()
            .and_then(|b| b.window_info(id))
            .map(|info| info.parent)
    }

    /// Screens holding `resource`, in the order `opcode` is replayed
    pub(crate) fn targets(&self, opcode: Opcode, resource: &CompositeResource) -> Vec<ScreenIndex> {
        let order = directive_for(opcode)
            .map(|d| d.order)
            .unwrap_or(Order::Backward);
        self.screens
            .indices(order)
            .into_iter()
            .filter(|s| resource.per_screen.contains_key(s))
            .collect()
    }

    /// Replay a request and forget the physical resources the screens
    /// report as freed
    pub(crate) fn fan_out<T, W, R>(
        &mut self,
        opcode: Opcode,
        screens: &[ScreenIndex],
        request: T,
        wrap: W,
        rewrite: R,
    ) -> FanoutOutcome
    where
        T: Clone,
        W: Fn(T) -> Request,
        R: FnMut(&mut T, ScreenIndex) -> X11Result<()>,
    {
        let directive = directive_for(opcode).unwrap_or_else(FanoutDirective::backward);
        let outcome = fanout::run(&mut self.backends, directive, screens, request, wrap, rewrite);
        for (screen, id) in &outcome.freed {
            self.table.release_physical(*screen, *id);
        }
        outcome
    }

    /// Replay a request on every screen holding `target`
    pub(crate) fn fan_out_on<T, W, R>(
        &mut self,
        opcode: Opcode,
        target: &CompositeResource,
        request: T,
        wrap: W,
        rewrite: R,
    ) -> X11Result<Option<Reply>>
    where
        T: Clone,
        W: Fn(T) -> Request,
        R: FnMut(&mut T, ScreenIndex) -> X11Result<()>,
    {
        let screens = self.targets(opcode, target);
        self.fan_out(opcode, &screens, request, wrap, rewrite)
            .into_result()
    }

    /// Destroy fanout; a composite missing its screen-0 half is not reported
    /// freed by screen 0, so it is dropped here
    pub(crate) fn fan_out_destroy<T, W, R>(
        &mut self,
        opcode: Opcode,
        target: &CompositeResource,
        request: T,
        wrap: W,
        rewrite: R,
    ) -> X11Result<Option<Reply>>
    where
        T: Clone,
        W: Fn(T) -> Request,
        R: FnMut(&mut T, ScreenIndex) -> X11Result<()>,
    {
        let reply = self.fan_out_on(opcode, target, request, wrap, rewrite)?;
        if target.physical(ScreenIndex::PRIMARY).is_none() {
            self.table.release(target.logical_id);
        }
        Ok(reply)
    }

    /// Create a composite: allocate its per-screen ids, replay the creation
    /// request on every screen and register what came out of it.
    ///
    /// `rewrite` receives the physical id allocated for the screen.
    pub(crate) fn create_composite<T, W, R>(
        &mut self,
        client: ClientId,
        opcode: Opcode,
        logical: XID,
        data: KindData,
        request: T,
        wrap: W,
        mut rewrite: R,
    ) -> X11Result<Option<Reply>>
    where
        T: Clone,
        W: Fn(T) -> Request,
        R: FnMut(&mut T, ScreenIndex, XID) -> X11Result<()>,
    {
        let foreign_range = client != SERVER_CLIENT && logical.get() & SERVER_BIT != 0;
        if logical.is_none() || foreign_range || self.table.contains(logical) {
            return Err(X11Error::bad_id_choice(logical));
        }

        let resource = self.table.create(logical, client, data)?;
        let ids = resource.per_screen.clone();
        let order = directive_for(opcode)
            .map(|d| d.order)
            .unwrap_or(Order::Backward);
        let screens = self.screens.indices(order);

        let outcome = self.fan_out(opcode, &screens, request, wrap, |req, screen| {
            let id = ids.get(&screen).copied().ok_or_else(X11Error::bad_alloc)?;
            rewrite(req, screen, id)
        });
        self.finish_creation(resource, outcome)
    }

    fn finish_creation(
        &mut self,
        mut resource: CompositeResource,
        outcome: FanoutOutcome,
    ) -> X11Result<Option<Reply>> {
        match outcome.status {
            Ok(()) => {
                self.table.register(resource)?;
                Ok(outcome.reply)
            }
            Err(err) if outcome.completed.is_empty() => Err(err),
            Err(err) => {
                resource
                    .per_screen
                    .retain(|screen, _| outcome.completed.contains(screen));
                log::warn!(
                    "{} {} exists on {} of {} screens",
                    resource.kind().as_str(),
                    resource.logical_id,
                    resource.per_screen.len(),
                    self.screens.len()
                );
                if let Err(register_err) = self.table.register(resource) {
                    log::warn!("Partial composite not registered: {}", register_err);
                }
                Err(err)
            }
        }
    }

    /// Visual of screen `screen` matching screen 0's `visual` by class and
    /// depth; `CopyFromParent` when that screen has none
    pub(crate) fn visuals_for(&self, visual: VisualID) -> X11Result<Vec<VisualID>> {
        if visual == VisualID::COPY_FROM_PARENT {
            return Ok(vec![visual; self.infos.len()]);
        }
        let primary = self.infos[0]
            .visual(visual)
            .ok_or_else(|| X11Error::bad_match(visual.get()))?;
        Ok(self
            .infos
            .iter()
            .enumerate()
            .map(|(i, info)| {
                if i == 0 {
                    return visual;
                }
                info.visuals
                    .iter()
                    .find(|v| v.class == primary.class && v.depth == primary.depth)
                    .map(|v| v.visual_id)
                    .unwrap_or(VisualID::COPY_FROM_PARENT)
            })
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backend::ScreenProbe;
    use crate::screens::ScreenGeometry;
    use crate::security::SecurityPolicy;

    /// Two 640x480 screens side by side
    pub(crate) fn two_screens() -> (Server, Vec<ScreenProbe>) {
        two_screens_with(SecurityPolicy::permissive())
    }

    pub(crate) fn two_screens_with(policy: SecurityPolicy) -> (Server, Vec<ScreenProbe>) {
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
        Server::with_memory_screens(&layout, policy).unwrap()
    }

    /// 100x50 InputOutput window with a 2 pixel border and a background pixel
    pub(crate) fn create_window(wid: u32, parent: XID, x: i16, y: i16) -> Request {
        Request::CreateWindow(CreateWindowRequest {
            depth: 0,
            wid: Window::new(wid),
            parent: Window(parent),
            x,
            y,
            width: 100,
            height: 50,
            border_width: 2,
            class: WindowClass::InputOutput,
            visual: VisualID::COPY_FROM_PARENT,
            values: ValueList::new(window_attr::BACK_PIXEL, vec![0x00ff00]),
        })
    }

    pub(crate) fn create_gc(cid: u32, drawable: XID, foreground: u32) -> Request {
        Request::CreateGC(CreateGCRequest {
            cid: GContext::new(cid),
            drawable,
            values: ValueList::new(gc_attr::FOREGROUND, vec![foreground]),
        })
    }

    #[test]
    fn test_every_routed_opcode_has_a_handler() {
        let dispatcher = install();
        assert_eq!(dispatcher.len(), 64);
        assert!(dispatcher
            .get(Opcode::Xinerama(XineramaOpcode::QueryScreens))
            .is_some());
        assert!(dispatcher.get(core(RequestOpcode::QueryTree)).is_none());
    }

    #[test]
    fn test_server_range_ids_are_rejected_from_clients() {
        let (mut server, _) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window().id();
        let err = server
            .handle(client, &create_window(SERVER_BIT | 7, root, 0, 0))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::IDChoice);
    }

    #[test]
    fn test_partial_creation_keeps_completed_screens() {
        let (mut server, probes) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window().id();
        probes[0].fail_on(core(RequestOpcode::CreateWindow), ErrorCode::Alloc);

        let err = server
            .handle(client, &create_window(0x0020_0001, root, 0, 0))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Alloc);

        // Screen 1 ran first and succeeded
        let ids = server.physical_ids(XID(0x0020_0001)).unwrap();
        assert_eq!(ids.len(), 1);
        assert!(ids.contains_key(&ScreenIndex(1)));
    }

    #[test]
    fn test_failure_on_first_screen_registers_nothing() {
        let (mut server, probes) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window().id();
        probes[1].fail_on(core(RequestOpcode::CreateWindow), ErrorCode::Alloc);

        server
            .handle(client, &create_window(0x0020_0001, root, 0, 0))
            .unwrap_err();
        assert!(!server.table().contains(XID(0x0020_0001)));
        assert_eq!(probes[0].count(core(RequestOpcode::CreateWindow)), 0);
    }

    #[test]
    fn test_unknown_visual_is_bad_match() {
        let (server, _) = two_screens();
        assert_eq!(
            server.visuals_for(VisualID::new(0x7777)).unwrap_err().code,
            ErrorCode::Match
        );
        let pseudo = server.visuals_for(VisualID::new(0x22)).unwrap();
        assert_eq!(pseudo, vec![VisualID::new(0x22), VisualID::new(0x32)]);
    }
}
