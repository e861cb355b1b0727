//! Pixmap requests

use super::core;
use crate::protocol::*;
use crate::resources::{KindData, ResourceKind};
use crate::security::{Access, ClientId};
use crate::server::Server;

impl Server {
    pub(crate) fn create_pixmap(
        &mut self,
        client: ClientId,
        req: &CreatePixmapRequest,
    ) -> X11Result<Option<Reply>> {
        let drawable = self.resolve_drawable(client, req.drawable, Access::GetAttr)?;
        self.create_composite(
            client,
            core(RequestOpcode::CreatePixmap),
            req.pid.id(),
            KindData::Pixmap { shared: false },
            *req,
            Request::CreatePixmap,
            |req, screen, pid| {
                req.pid = Pixmap(pid);
                req.drawable = drawable.physical_on(screen)?;
                Ok(())
            },
        )
    }

    pub(crate) fn free_pixmap(
        &mut self,
        client: ClientId,
        req: &ResourceRequest,
    ) -> X11Result<Option<Reply>> {
        let pixmap = self.resolve(client, req.id, ResourceKind::Pixmap, Access::Destroy)?;
        self.fan_out_destroy(
            core(RequestOpcode::FreePixmap),
            &pixmap,
            *req,
            Request::FreePixmap,
            |req, screen| {
                req.id = pixmap.physical_on(screen)?;
                Ok(())
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::two_screens;
    use super::*;
    use crate::screens::ScreenIndex;

    fn create_pixmap(pid: u32, drawable: XID) -> Request {
        Request::CreatePixmap(CreatePixmapRequest {
            depth: 24,
            pid: Pixmap::new(pid),
            drawable,
            width: 16,
            height: 16,
        })
    }

    #[test]
    fn test_pixmap_exists_on_every_screen() {
        let (mut server, probes) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window().id();
        server.handle(client, &create_pixmap(0x0020_0010, root)).unwrap();

        let ids = server.physical_ids(XID(0x0020_0010)).unwrap();
        assert_eq!(ids[&ScreenIndex(0)], XID(0x0020_0010));
        assert!(probes[0].contains(ids[&ScreenIndex(0)]));
        assert!(probes[1].contains(ids[&ScreenIndex(1)]));

        server
            .handle(client, &Request::FreePixmap(ResourceRequest::new(XID(0x0020_0010))))
            .unwrap();
        assert!(!probes[1].contains(ids[&ScreenIndex(1)]));
        assert!(server.physical_ids(XID(0x0020_0010)).is_none());
    }

    #[test]
    fn test_unknown_drawable_is_bad_drawable() {
        let (mut server, _) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let err = server
            .handle(client, &create_pixmap(0x0020_0010, XID(0x0020_9999)))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Drawable);
        assert_eq!(err.bad_value, 0x0020_9999);
    }
}
