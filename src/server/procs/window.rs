//! Window requests

use super::{core, WINDOW_ATTR_IDS};
use crate::protocol::*;
use crate::resources::{KindData, ResourceKind};
use crate::security::{Access, ClientId};
use crate::server::{Server, Translation};

impl Server {
    pub(crate) fn create_window(
        &mut self,
        client: ClientId,
        req: &CreateWindowRequest,
    ) -> X11Result<Option<Reply>> {
        let parent = self.resolve(client, req.parent.id(), ResourceKind::Window, Access::GetAttr)?;

        let class = match req.class {
            WindowClass::CopyFromParent => parent
                .window_class()
                .unwrap_or(WindowClass::InputOutput),
            class => class,
        };
        if class == WindowClass::InputOnly && req.values.mask & !window_attr::INPUT_ONLY_LEGAL != 0
        {
            return Err(X11Error::bad_match(req.values.mask));
        }

        let attr_ids = self.resolve_attr_ids(client, &req.values, &WINDOW_ATTR_IDS)?;
        let visuals = self.visuals_for(req.visual)?;
        let translations = self.content_translations(&parent);

        self.create_composite(
            client,
            core(RequestOpcode::CreateWindow),
            req.wid.id(),
            KindData::Window {
                is_root: false,
                class,
            },
            req.clone(),
            Request::CreateWindow,
            |req, screen, wid| {
                req.wid = Window(wid);
                req.parent = Window(parent.physical_on(screen)?);
                req.visual = visuals[screen.0];
                attr_ids.apply(&mut req.values, screen);
                translations[screen.0].apply(&mut req.x, &mut req.y);
                Ok(())
            },
        )
    }

    pub(crate) fn change_window_attributes(
        &mut self,
        client: ClientId,
        req: &ChangeWindowAttributesRequest,
    ) -> X11Result<Option<Reply>> {
        let window = self.resolve(client, req.window.id(), ResourceKind::Window, Access::Write)?;
        if window.window_class() == Some(WindowClass::InputOnly)
            && req.values.mask & !window_attr::INPUT_ONLY_LEGAL != 0
        {
            return Err(X11Error::bad_match(req.values.mask));
        }
        let attr_ids = self.resolve_attr_ids(client, &req.values, &WINDOW_ATTR_IDS)?;

        self.fan_out_on(
            core(RequestOpcode::ChangeWindowAttributes),
            &window,
            req.clone(),
            Request::ChangeWindowAttributes,
            |req, screen| {
                req.window = Window(window.physical_on(screen)?);
                attr_ids.apply(&mut req.values, screen);
                Ok(())
            },
        )
    }

    pub(crate) fn destroy_window(
        &mut self,
        client: ClientId,
        req: &ResourceRequest,
    ) -> X11Result<Option<Reply>> {
        let window = self.resolve(client, req.id, ResourceKind::Window, Access::Destroy)?;
        let reply = self.fan_out_destroy(
            core(RequestOpcode::DestroyWindow),
            &window,
            *req,
            Request::DestroyWindow,
            |req, screen| {
                req.id = window.physical_on(screen)?;
                Ok(())
            },
        )?;
        if self.saver == Some(req.id) && !self.table.contains(req.id) {
            log::info!("Screen saver window {} destroyed", req.id);
            self.saver = None;
        }
        Ok(reply)
    }

    pub(crate) fn destroy_subwindows(
        &mut self,
        client: ClientId,
        req: &ResourceRequest,
    ) -> X11Result<Option<Reply>> {
        let window = self.resolve(client, req.id, ResourceKind::Window, Access::Destroy)?;
        self.fan_out_on(
            core(RequestOpcode::DestroySubwindows),
            &window,
            *req,
            Request::DestroySubwindows,
            |req, screen| {
                req.id = window.physical_on(screen)?;
                Ok(())
            },
        )
    }

    pub(crate) fn change_save_set(
        &mut self,
        client: ClientId,
        req: &ChangeSaveSetRequest,
    ) -> X11Result<Option<Reply>> {
        let window = self.resolve(client, req.window.id(), ResourceKind::Window, Access::GetAttr)?;
        self.fan_out_on(
            core(RequestOpcode::ChangeSaveSet),
            &window,
            *req,
            Request::ChangeSaveSet,
            |req, screen| {
                req.window = Window(window.physical_on(screen)?);
                Ok(())
            },
        )
    }

    pub(crate) fn reparent_window(
        &mut self,
        client: ClientId,
        req: &ReparentWindowRequest,
    ) -> X11Result<Option<Reply>> {
        let window = self.resolve(client, req.window.id(), ResourceKind::Window, Access::Write)?;
        let parent = self.resolve(client, req.parent.id(), ResourceKind::Window, Access::GetAttr)?;
        let translations = self.content_translations(&parent);

        self.fan_out_on(
            core(RequestOpcode::ReparentWindow),
            &window,
            *req,
            Request::ReparentWindow,
            |req, screen| {
                req.window = Window(window.physical_on(screen)?);
                req.parent = Window(parent.physical_on(screen)?);
                translations[screen.0].apply(&mut req.x, &mut req.y);
                Ok(())
            },
        )
    }

    pub(crate) fn map_window(
        &mut self,
        client: ClientId,
        req: &ResourceRequest,
    ) -> X11Result<Option<Reply>> {
        self.window_fanout(client, RequestOpcode::MapWindow, req, Request::MapWindow)
    }

    pub(crate) fn map_subwindows(
        &mut self,
        client: ClientId,
        req: &ResourceRequest,
    ) -> X11Result<Option<Reply>> {
        self.window_fanout(client, RequestOpcode::MapSubwindows, req, Request::MapSubwindows)
    }

    pub(crate) fn unmap_window(
        &mut self,
        client: ClientId,
        req: &ResourceRequest,
    ) -> X11Result<Option<Reply>> {
        self.window_fanout(client, RequestOpcode::UnmapWindow, req, Request::UnmapWindow)
    }

    pub(crate) fn unmap_subwindows(
        &mut self,
        client: ClientId,
        req: &ResourceRequest,
    ) -> X11Result<Option<Reply>> {
        self.window_fanout(
            client,
            RequestOpcode::UnmapSubwindows,
            req,
            Request::UnmapSubwindows,
        )
    }

    /// Requests whose only argument is the window they act on
    fn window_fanout(
        &mut self,
        client: ClientId,
        opcode: RequestOpcode,
        req: &ResourceRequest,
        wrap: fn(ResourceRequest) -> Request,
    ) -> X11Result<Option<Reply>> {
        let window = self.resolve(client, req.id, ResourceKind::Window, Access::Write)?;
        self.fan_out_on(core(opcode), &window, *req, wrap, |req, screen| {
            req.id = window.physical_on(screen)?;
            Ok(())
        })
    }

    pub(crate) fn configure_window(
        &mut self,
        client: ClientId,
        req: &ConfigureWindowRequest,
    ) -> X11Result<Option<Reply>> {
        let window = self.resolve(client, req.window.id(), ResourceKind::Window, Access::Write)?;
        if !req.values.is_well_formed() {
            return Err(X11Error::bad_length());
        }

        let sibling = match req.values.get(config_window::SIBLING) {
            Some(id) => Some(self.resolve(client, XID(id), ResourceKind::Window, Access::GetAttr)?),
            None => None,
        };

        // Top-level windows are positioned in desktop coordinates
        let top_level = self
            .window_parent(&window)
            .map(|parent| self.parent_is_root(parent))
            .unwrap_or(false);
        let translations = if top_level {
            self.translations()
        } else {
            vec![Translation::default(); self.screens.len()]
        };

        self.fan_out_on(
            core(RequestOpcode::ConfigureWindow),
            &window,
            req.clone(),
            Request::ConfigureWindow,
            |req, screen| {
                req.window = Window(window.physical_on(screen)?);
                if let Some(sibling) = &sibling {
                    req.values
                        .set(config_window::SIBLING, sibling.physical_on(screen)?.get());
                }
                translations[screen.0].apply_values(
                    &mut req.values,
                    config_window::X,
                    config_window::Y,
                );
                Ok(())
            },
        )
    }

    pub(crate) fn circulate_window(
        &mut self,
        client: ClientId,
        req: &CirculateWindowRequest,
    ) -> X11Result<Option<Reply>> {
        let window = self.resolve(client, req.window.id(), ResourceKind::Window, Access::Write)?;
        self.fan_out_on(
            core(RequestOpcode::CirculateWindow),
            &window,
            *req,
            Request::CirculateWindow,
            |req, screen| {
                req.window = Window(window.physical_on(screen)?);
                Ok(())
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{create_window, two_screens};
    use super::*;
    use crate::screens::ScreenIndex;

    #[test]
    fn test_top_level_configure_moves_per_screen() {
        let (mut server, probes) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window();
        server
            .handle(client, &create_window(0x0020_0001, root.id(), 10, 10))
            .unwrap();

        server
            .handle(
                client,
                &Request::ConfigureWindow(ConfigureWindowRequest {
                    window: Window::new(0x0020_0001),
                    values: ValueList::new(config_window::X | config_window::Y, vec![700, 5]),
                }),
            )
            .unwrap();

        let ids = server.physical_ids(XID(0x0020_0001)).unwrap();
        assert_eq!(probes[0].window(ids[&ScreenIndex(0)]).unwrap().x, 700);
        assert_eq!(probes[1].window(ids[&ScreenIndex(1)]).unwrap().x, 60);
    }

    #[test]
    fn test_nested_window_is_not_translated() {
        let (mut server, probes) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window();
        server
            .handle(client, &create_window(0x0020_0001, root.id(), 700, 0))
            .unwrap();
        server
            .handle(client, &create_window(0x0020_0002, XID(0x0020_0001), 3, 4))
            .unwrap();

        let ids = server.physical_ids(XID(0x0020_0002)).unwrap();
        let on_second = probes[1].window(ids[&ScreenIndex(1)]).unwrap();
        assert_eq!((on_second.x, on_second.y), (3, 4));
    }

    #[test]
    fn test_input_only_rejects_background() {
        let (mut server, _) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let mut request = match create_window(0x0020_0001, server.root_window().id(), 0, 0) {
            Request::CreateWindow(req) => req,
            _ => unreachable!(),
        };
        request.class = WindowClass::InputOnly;
        request.border_width = 0;
        let err = server
            .handle(client, &Request::CreateWindow(request))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Match);
        assert!(!server.table().contains(XID(0x0020_0001)));
    }

    #[test]
    fn test_destroy_releases_children() {
        let (mut server, probes) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window();
        server
            .handle(client, &create_window(0x0020_0001, root.id(), 0, 0))
            .unwrap();
        server
            .handle(client, &create_window(0x0020_0002, XID(0x0020_0001), 0, 0))
            .unwrap();
        let child_on_second = server.physical_ids(XID(0x0020_0002)).unwrap()[&ScreenIndex(1)];

        server
            .handle(
                client,
                &Request::DestroyWindow(ResourceRequest::new(XID(0x0020_0001))),
            )
            .unwrap();
        assert!(!server.table().contains(XID(0x0020_0001)));
        assert!(!server.table().contains(XID(0x0020_0002)));
        assert!(!probes[1].contains(child_on_second));
    }

    #[test]
    fn test_child_missing_on_screen_zero_goes_with_its_parent() {
        let (mut server, probes) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window().id();
        server
            .handle(client, &create_window(0x0020_0001, root, 0, 0))
            .unwrap();

        let create = Opcode::Core(RequestOpcode::CreateWindow);
        probes[0].fail_on(create, ErrorCode::Alloc);
        let err = server
            .handle(client, &create_window(0x0020_0002, XID(0x0020_0001), 0, 0))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Alloc);
        probes[0].clear_failures();
        let child = server.physical_ids(XID(0x0020_0002)).unwrap();
        assert_eq!(child.keys().collect::<Vec<_>>(), vec![&ScreenIndex(1)]);

        server
            .handle(
                client,
                &Request::DestroyWindow(ResourceRequest::new(XID(0x0020_0001))),
            )
            .unwrap();
        assert!(!server.table().contains(XID(0x0020_0002)));
        assert!(!probes[1].contains(child[&ScreenIndex(1)]));

        // The id is free for reuse
        server
            .handle(client, &create_window(0x0020_0002, root, 0, 0))
            .unwrap();
        assert_eq!(server.physical_ids(XID(0x0020_0002)).unwrap().len(), 2);
    }
}
