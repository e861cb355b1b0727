//! CopyArea and CopyPlane
//!
//! A window's pixels are spread over the screens it covers, so a copy out of
//! a window into a pixmap cannot run screen by screen: the source area is
//! read from the whole desktop first and written into every copy of the
//! pixmap. The same goes for a shared pixmap, whose pixels live on screen 0.

use super::core;
use crate::protocol::image;
use crate::protocol::*;
use crate::resources::{CompositeResource, ResourceKind};
use crate::screens::ScreenIndex;
use crate::security::{Access, ClientId};
use crate::server::Server;

impl Server {
    pub(crate) fn copy_area(
        &mut self,
        client: ClientId,
        req: &CopyAreaRequest,
    ) -> X11Result<Option<Reply>> {
        let src = self.resolve_drawable(client, req.src_drawable, Access::Read)?;
        let dst = self.resolve_drawable(client, req.dst_drawable, Access::Write)?;
        let gc = self.resolve(client, req.gc.id(), ResourceKind::Gc, Access::GetAttr)?;

        let gathered = (src.is_window() && !dst.is_window())
            || (src.is_shared() && !dst.is_shared());
        if gathered {
            return self.copy_gathered(&src, &dst, &gc, req);
        }

        let opcode = core(RequestOpcode::CopyArea);
        let screens = self.copy_targets(opcode, &dst);
        let src_translations = self.content_translations(&src);
        let dst_translations = self.content_translations(&dst);

        self.fan_out(opcode, &screens, *req, Request::CopyArea, |req, screen| {
            req.src_drawable = src.physical_on(screen)?;
            req.dst_drawable = dst.physical_on(screen)?;
            req.gc = GContext(gc.physical_on(screen)?);
            src_translations[screen.0].apply(&mut req.src_x, &mut req.src_y);
            dst_translations[screen.0].apply(&mut req.dst_x, &mut req.dst_y);
            Ok(())
        })
        .into_result()
    }

    /// Copy through an image read from the desktop, written with PutImage
    fn copy_gathered(
        &mut self,
        src: &CompositeResource,
        dst: &CompositeResource,
        gc: &CompositeResource,
        req: &CopyAreaRequest,
    ) -> X11Result<Option<Reply>> {
        let depth = self.primary_depth(src)?;
        if depth != self.primary_depth(dst)? {
            return Err(X11Error::bad_match(req.dst_drawable.get()));
        }
        if req.width == 0 || req.height == 0 {
            return Ok(None);
        }

        let area = Rectangle::new(req.src_x, req.src_y, req.width, req.height);
        let assembled = self.read_image(src, area, image::depth_mask(depth), true)?;
        log::debug!(
            "CopyArea {} -> {}: {}x{} gathered from the desktop",
            src.logical_id,
            dst.logical_id,
            req.width,
            req.height
        );

        let put = PutImageRequest {
            format: ImageFormat::ZPixmap,
            drawable: req.dst_drawable,
            gc: req.gc,
            width: req.width,
            height: req.height,
            dst_x: req.dst_x,
            dst_y: req.dst_y,
            left_pad: 0,
            depth,
            data: assembled.data,
        };
        let opcode = core(RequestOpcode::PutImage);
        let screens = self.copy_targets(opcode, dst);
        let translations = self.content_translations(dst);

        self.fan_out(opcode, &screens, put, Request::PutImage, |put, screen| {
            put.drawable = dst.physical_on(screen)?;
            put.gc = GContext(gc.physical_on(screen)?);
            translations[screen.0].apply(&mut put.dst_x, &mut put.dst_y);
            Ok(())
        })
        .into_result()
    }

    /// Screens a copy writes to; a shared destination is written once
    fn copy_targets(&self, opcode: Opcode, dst: &CompositeResource) -> Vec<ScreenIndex> {
        if dst.is_shared() {
            vec![ScreenIndex::PRIMARY]
        } else {
            self.targets(opcode, dst)
        }
    }

    pub(crate) fn copy_plane(
        &mut self,
        client: ClientId,
        req: &CopyPlaneRequest,
    ) -> X11Result<Option<Reply>> {
        let src = self.resolve_drawable(client, req.src_drawable, Access::Read)?;
        let dst = self.resolve_drawable(client, req.dst_drawable, Access::Write)?;
        let gc = self.resolve(client, req.gc.id(), ResourceKind::Gc, Access::GetAttr)?;

        let depth = self.primary_depth(&src)?;
        let plane = req.bit_plane;
        if !plane.is_power_of_two() || plane > image::depth_mask(depth) {
            return Err(X11Error::bad_value(plane));
        }

        let opcode = core(RequestOpcode::CopyPlane);
        let screens = self.copy_targets(opcode, &dst);
        let src_translations = self.content_translations(&src);
        let dst_translations = self.content_translations(&dst);

        self.fan_out(opcode, &screens, *req, Request::CopyPlane, |req, screen| {
            req.src_drawable = src.physical_on(screen)?;
            req.dst_drawable = dst.physical_on(screen)?;
            req.gc = GContext(gc.physical_on(screen)?);
            src_translations[screen.0].apply(&mut req.src_x, &mut req.src_y);
            dst_translations[screen.0].apply(&mut req.dst_x, &mut req.dst_y);
            Ok(())
        })
        .into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{create_gc, two_screens};
    use super::*;

    fn create_pixmap(pid: u32, drawable: XID, depth: u8) -> Request {
        Request::CreatePixmap(CreatePixmapRequest {
            depth,
            pid: Pixmap::new(pid),
            drawable,
            width: 8,
            height: 8,
        })
    }

    fn plot(server: &mut Server, client: ClientId, drawable: XID, x: i16, y: i16) {
        server
            .handle(
                client,
                &Request::PolyPoint(PolyPointRequest {
                    coordinate_mode: CoordMode::Origin,
                    drawable,
                    gc: GContext::new(0x0020_0020),
                    points: vec![Point::new(x, y)],
                }),
            )
            .unwrap();
    }

    #[test]
    fn test_root_to_pixmap_copy_gathers_both_screens() {
        let (mut server, probes) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window().id();
        server.handle(client, &create_gc(0x0020_0020, root, 0xabcdef)).unwrap();
        server.handle(client, &create_pixmap(0x0020_0010, root, 24)).unwrap();
        plot(&mut server, client, root, 638, 1);
        plot(&mut server, client, root, 641, 1);

        server
            .handle(
                client,
                &Request::CopyArea(CopyAreaRequest {
                    src_drawable: root,
                    dst_drawable: XID(0x0020_0010),
                    gc: GContext::new(0x0020_0020),
                    src_x: 636,
                    src_y: 0,
                    dst_x: 0,
                    dst_y: 0,
                    width: 8,
                    height: 2,
                }),
            )
            .unwrap();

        let ids = server.physical_ids(XID(0x0020_0010)).unwrap();
        for (screen, id) in ids {
            let probe = &probes[screen.0];
            assert_eq!(probe.pixel(id, 2, 1), Some(0xabcdef));
            assert_eq!(probe.pixel(id, 5, 1), Some(0xabcdef));
            assert_eq!(probe.pixel(id, 4, 1), Some(0));
        }
        assert_eq!(probes[0].count(core(RequestOpcode::CopyArea)), 0);
    }

    #[test]
    fn test_depth_mismatch_is_bad_match() {
        let (mut server, _) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window().id();
        server.handle(client, &create_gc(0x0020_0020, root, 1)).unwrap();
        server.handle(client, &create_pixmap(0x0020_0010, root, 8)).unwrap();

        let err = server
            .handle(
                client,
                &Request::CopyArea(CopyAreaRequest {
                    src_drawable: root,
                    dst_drawable: XID(0x0020_0010),
                    gc: GContext::new(0x0020_0020),
                    src_x: 0,
                    src_y: 0,
                    dst_x: 0,
                    dst_y: 0,
                    width: 4,
                    height: 4,
                }),
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Match);
    }

    #[test]
    fn test_copy_plane_checks_plane_against_depth() {
        let (mut server, _) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window().id();
        server.handle(client, &create_gc(0x0020_0020, root, 1)).unwrap();
        server.handle(client, &create_pixmap(0x0020_0010, root, 8)).unwrap();

        let copy = |bit_plane| {
            Request::CopyPlane(CopyPlaneRequest {
                src_drawable: XID(0x0020_0010),
                dst_drawable: root,
                gc: GContext::new(0x0020_0020),
                src_x: 0,
                src_y: 0,
                dst_x: 0,
                dst_y: 0,
                width: 4,
                height: 4,
                bit_plane,
            })
        };
        let err = server.handle(client, &copy(1 << 8)).unwrap_err();
        assert_eq!(err.code, ErrorCode::Value);
        let err = server.handle(client, &copy(3)).unwrap_err();
        assert_eq!(err.code, ErrorCode::Value);
        server.handle(client, &copy(1 << 7)).unwrap();
    }
}
