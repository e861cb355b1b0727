//! PANORAMIX / XINERAMA queries
//!
//! Answered from the screen layout alone; nothing is sent to the screens.

use crate::protocol::*;
use crate::resources::ResourceKind;
use crate::security::{Access, ClientId};
use crate::server::Server;
use crate::{XINERAMA_MAJOR, XINERAMA_MINOR};

impl Server {
    pub(crate) fn xinerama_query_version(
        &mut self,
        _client: ClientId,
        req: &XineramaQueryVersionRequest,
    ) -> X11Result<Option<Reply>> {
        log::debug!(
            "Xinerama version query from a {}.{} client",
            req.client_major,
            req.client_minor
        );
        Ok(Some(Reply::XineramaQueryVersion {
            major: XINERAMA_MAJOR,
            minor: XINERAMA_MINOR,
        }))
    }

    pub(crate) fn xinerama_get_state(
        &mut self,
        client: ClientId,
        req: &ResourceRequest,
    ) -> X11Result<Option<Reply>> {
        self.resolve(client, req.id, ResourceKind::Window, Access::GetAttr)?;
        Ok(Some(Reply::XineramaGetState {
            state: 1,
            window: Window(req.id),
        }))
    }

    pub(crate) fn xinerama_get_screen_count(
        &mut self,
        client: ClientId,
        req: &ResourceRequest,
    ) -> X11Result<Option<Reply>> {
        self.resolve(client, req.id, ResourceKind::Window, Access::GetAttr)?;
        let count =
            u8::try_from(self.screens.len()).map_err(|_| X11Error::implementation_error())?;
        Ok(Some(Reply::XineramaGetScreenCount {
            count,
            window: Window(req.id),
        }))
    }

    pub(crate) fn xinerama_get_screen_size(
        &mut self,
        client: ClientId,
        req: &GetScreenSizeRequest,
    ) -> X11Result<Option<Reply>> {
        self.resolve(client, req.window.id(), ResourceKind::Window, Access::GetAttr)?;
        let screen = self
            .screens
            .iter()
            .nth(req.screen as usize)
            .ok_or_else(|| X11Error::bad_match(req.screen))?;
        Ok(Some(Reply::XineramaGetScreenSize(GetScreenSizeReply {
            width: screen.width as u32,
            height: screen.height as u32,
            window: req.window,
            screen: req.screen,
        })))
    }

    pub(crate) fn xinerama_is_active(&mut self) -> X11Result<Option<Reply>> {
        Ok(Some(Reply::XineramaIsActive { state: 1 }))
    }

    pub(crate) fn xinerama_query_screens(&mut self) -> X11Result<Option<Reply>> {
        let screens = self
            .screens
            .iter()
            .map(|s| Rectangle::new(s.origin_x as i16, s.origin_y as i16, s.width, s.height))
            .collect();
        Ok(Some(Reply::XineramaQueryScreens { screens }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::two_screens;
    use super::*;

    #[test]
    fn test_query_screens_lists_the_layout() {
        let (mut server, probes) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let reply = server.handle(client, &Request::XineramaQueryScreens).unwrap();
        assert_eq!(
            reply,
            Some(Reply::XineramaQueryScreens {
                screens: vec![
                    Rectangle::new(0, 0, 640, 480),
                    Rectangle::new(640, 0, 640, 480),
                ],
            })
        );
        assert!(probes.iter().all(|p| p.requests().is_empty()));
    }

    #[test]
    fn test_screen_size_of_missing_screen_is_bad_match() {
        let (mut server, _) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window();

        let size = |screen| {
            Request::XineramaGetScreenSize(GetScreenSizeRequest {
                window: root,
                screen,
            })
        };
        match server.handle(client, &size(1)).unwrap() {
            Some(Reply::XineramaGetScreenSize(reply)) => {
                assert_eq!((reply.width, reply.height, reply.screen), (640, 480, 1));
            }
            other => panic!("unexpected reply {:?}", other),
        }
        let err = server.handle(client, &size(2)).unwrap_err();
        assert_eq!(err.code, ErrorCode::Match);
    }

    #[test]
    fn test_state_needs_a_window() {
        let (mut server, _) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let err = server
            .handle(
                client,
                &Request::XineramaGetState(ResourceRequest::new(XID(0x0020_0099))),
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Window);

        let root = server.root_window().id();
        let reply = server
            .handle(client, &Request::XineramaGetScreenCount(ResourceRequest::new(root)))
            .unwrap();
        assert_eq!(
            reply,
            Some(Reply::XineramaGetScreenCount {
                count: 2,
                window: Window(root),
            })
        );
    }
}
