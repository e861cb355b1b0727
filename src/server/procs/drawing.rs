//! Drawing requests
//!
//! Every drawing request names a drawable and a GC. It runs on each screen
//! holding the drawable; coordinates are only translated when the drawable
//! is the root (or the screen saver), whose content is the desktop.

use super::core;
use crate::protocol::*;
use crate::resources::ResourceKind;
use crate::screens::ScreenIndex;
use crate::security::{Access, ClientId};
use crate::server::{Server, Translation};

/// A request that draws into a drawable through a GC
pub(crate) trait DrawRequest: Clone {
    fn drawable(&self) -> XID;
    fn gc(&self) -> GContext;
    fn retarget(&mut self, drawable: XID, gc: GContext);
    /// Move drawable coordinates onto one screen
    fn translate(&mut self, translation: &Translation);

    /// Nothing to draw
    fn is_empty(&self) -> bool {
        false
    }
}

impl DrawRequest for PolyPointRequest {
    fn drawable(&self) -> XID {
        self.drawable
    }

    fn gc(&self) -> GContext {
        self.gc
    }

    fn retarget(&mut self, drawable: XID, gc: GContext) {
        self.drawable = drawable;
        self.gc = gc;
    }

    fn translate(&mut self, translation: &Translation) {
        translation.apply_points(self.coordinate_mode, &mut self.points);
    }

    fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl DrawRequest for FillPolyRequest {
    fn drawable(&self) -> XID {
        self.drawable
    }

    fn gc(&self) -> GContext {
        self.gc
    }

    fn retarget(&mut self, drawable: XID, gc: GContext) {
        self.drawable = drawable;
        self.gc = gc;
    }

    fn translate(&mut self, translation: &Translation) {
        translation.apply_points(self.coordinate_mode, &mut self.points);
    }

    fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl DrawRequest for PolySegmentRequest {
    fn drawable(&self) -> XID {
        self.drawable
    }

    fn gc(&self) -> GContext {
        self.gc
    }

    fn retarget(&mut self, drawable: XID, gc: GContext) {
        self.drawable = drawable;
        self.gc = gc;
    }

    fn translate(&mut self, translation: &Translation) {
        translation.apply_segments(&mut self.segments);
    }

    fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl DrawRequest for PolyRectangleRequest {
    fn drawable(&self) -> XID {
        self.drawable
    }

    fn gc(&self) -> GContext {
        self.gc
    }

    fn retarget(&mut self, drawable: XID, gc: GContext) {
        self.drawable = drawable;
        self.gc = gc;
    }

    fn translate(&mut self, translation: &Translation) {
        translation.apply_rectangles(&mut self.rectangles);
    }

    fn is_empty(&self) -> bool {
        self.rectangles.is_empty()
    }
}

impl DrawRequest for PolyArcRequest {
    fn drawable(&self) -> XID {
        self.drawable
    }

    fn gc(&self) -> GContext {
        self.gc
    }

    fn retarget(&mut self, drawable: XID, gc: GContext) {
        self.drawable = drawable;
        self.gc = gc;
    }

    fn translate(&mut self, translation: &Translation) {
        translation.apply_arcs(&mut self.arcs);
    }

    fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }
}

impl DrawRequest for PutImageRequest {
    fn drawable(&self) -> XID {
        self.drawable
    }

    fn gc(&self) -> GContext {
        self.gc
    }

    fn retarget(&mut self, drawable: XID, gc: GContext) {
        self.drawable = drawable;
        self.gc = gc;
    }

    fn translate(&mut self, translation: &Translation) {
        translation.apply(&mut self.dst_x, &mut self.dst_y);
    }
}

impl DrawRequest for TextRequest {
    fn drawable(&self) -> XID {
        self.drawable
    }

    fn gc(&self) -> GContext {
        self.gc
    }

    fn retarget(&mut self, drawable: XID, gc: GContext) {
        self.drawable = drawable;
        self.gc = gc;
    }

    fn translate(&mut self, translation: &Translation) {
        translation.apply(&mut self.x, &mut self.y);
    }
}

impl Server {
    /// Replay a drawing request. Drawing into a shared pixmap reaches every
    /// screen through screen 0.
    pub(crate) fn draw<T: DrawRequest>(
        &mut self,
        client: ClientId,
        op: RequestOpcode,
        req: &T,
        wrap: fn(T) -> Request,
    ) -> X11Result<Option<Reply>> {
        let drawable = self.resolve_drawable(client, req.drawable(), Access::Write)?;
        let gc = self.resolve(client, req.gc().id(), ResourceKind::Gc, Access::GetAttr)?;
        if req.is_empty() {
            return Ok(None);
        }

        let opcode = core(op);
        let screens = if drawable.is_shared() {
            vec![ScreenIndex::PRIMARY]
        } else {
            self.targets(opcode, &drawable)
        };
        let translations = self.content_translations(&drawable);

        self.fan_out(opcode, &screens, req.clone(), wrap, |req, screen| {
            req.retarget(drawable.physical_on(screen)?, GContext(gc.physical_on(screen)?));
            req.translate(&translations[screen.0]);
            Ok(())
        })
        .into_result()
    }

    pub(crate) fn poly_point(
        &mut self,
        client: ClientId,
        req: &PolyPointRequest,
    ) -> X11Result<Option<Reply>> {
        self.draw(client, RequestOpcode::PolyPoint, req, Request::PolyPoint)
    }

    pub(crate) fn poly_line(
        &mut self,
        client: ClientId,
        req: &PolyPointRequest,
    ) -> X11Result<Option<Reply>> {
        self.draw(client, RequestOpcode::PolyLine, req, Request::PolyLine)
    }

    pub(crate) fn poly_segment(
        &mut self,
        client: ClientId,
        req: &PolySegmentRequest,
    ) -> X11Result<Option<Reply>> {
        self.draw(client, RequestOpcode::PolySegment, req, Request::PolySegment)
    }

    pub(crate) fn poly_rectangle(
        &mut self,
        client: ClientId,
        req: &PolyRectangleRequest,
    ) -> X11Result<Option<Reply>> {
        self.draw(client, RequestOpcode::PolyRectangle, req, Request::PolyRectangle)
    }

    pub(crate) fn poly_arc(
        &mut self,
        client: ClientId,
        req: &PolyArcRequest,
    ) -> X11Result<Option<Reply>> {
        self.draw(client, RequestOpcode::PolyArc, req, Request::PolyArc)
    }

    pub(crate) fn fill_poly(
        &mut self,
        client: ClientId,
        req: &FillPolyRequest,
    ) -> X11Result<Option<Reply>> {
        self.draw(client, RequestOpcode::FillPoly, req, Request::FillPoly)
    }

    pub(crate) fn poly_fill_rectangle(
        &mut self,
        client: ClientId,
        req: &PolyRectangleRequest,
    ) -> X11Result<Option<Reply>> {
        self.draw(
            client,
            RequestOpcode::PolyFillRectangle,
            req,
            Request::PolyFillRectangle,
        )
    }

    pub(crate) fn poly_fill_arc(
        &mut self,
        client: ClientId,
        req: &PolyArcRequest,
    ) -> X11Result<Option<Reply>> {
        self.draw(client, RequestOpcode::PolyFillArc, req, Request::PolyFillArc)
    }

    pub(crate) fn put_image(
        &mut self,
        client: ClientId,
        req: &PutImageRequest,
    ) -> X11Result<Option<Reply>> {
        self.draw(client, RequestOpcode::PutImage, req, Request::PutImage)
    }

    pub(crate) fn poly_text8(
        &mut self,
        client: ClientId,
        req: &TextRequest,
    ) -> X11Result<Option<Reply>> {
        self.draw(client, RequestOpcode::PolyText8, req, Request::PolyText8)
    }

    pub(crate) fn poly_text16(
        &mut self,
        client: ClientId,
        req: &TextRequest,
    ) -> X11Result<Option<Reply>> {
        self.draw(client, RequestOpcode::PolyText16, req, Request::PolyText16)
    }

    pub(crate) fn image_text8(
        &mut self,
        client: ClientId,
        req: &TextRequest,
    ) -> X11Result<Option<Reply>> {
        self.draw(client, RequestOpcode::ImageText8, req, Request::ImageText8)
    }

    pub(crate) fn image_text16(
        &mut self,
        client: ClientId,
        req: &TextRequest,
    ) -> X11Result<Option<Reply>> {
        self.draw(client, RequestOpcode::ImageText16, req, Request::ImageText16)
    }

    pub(crate) fn clear_area(
        &mut self,
        client: ClientId,
        req: &ClearAreaRequest,
    ) -> X11Result<Option<Reply>> {
        let window = self.resolve(client, req.window.id(), ResourceKind::Window, Access::Write)?;
        let translations = self.content_translations(&window);
        self.fan_out_on(
            core(RequestOpcode::ClearArea),
            &window,
            *req,
            Request::ClearArea,
            |req, screen| {
                req.window = Window(window.physical_on(screen)?);
                translations[screen.0].apply(&mut req.x, &mut req.y);
                Ok(())
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{create_gc, create_window, two_screens};
    use super::*;

    #[test]
    fn test_rectangles_on_root_land_on_both_screens() {
        let (mut server, probes) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window().id();
        server.handle(client, &create_gc(0x0020_0020, root, 0xff0000)).unwrap();

        // Straddles the boundary at x = 640
        server
            .handle(
                client,
                &Request::PolyFillRectangle(PolyRectangleRequest {
                    drawable: root,
                    gc: GContext::new(0x0020_0020),
                    rectangles: vec![Rectangle::new(630, 10, 20, 5)],
                }),
            )
            .unwrap();

        let root1 = probes[1].screen_info().root;
        assert_eq!(probes[0].pixel(root, 635, 12), Some(0xff0000));
        assert_eq!(probes[1].pixel(root1, 5, 12), Some(0xff0000));
        assert_eq!(probes[1].pixel(root1, 15, 12), Some(0));
    }

    #[test]
    fn test_window_drawing_is_not_translated() {
        let (mut server, probes) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window().id();
        server
            .handle(client, &create_window(0x0020_0001, root, 600, 0))
            .unwrap();
        server
            .handle(client, &create_gc(0x0020_0020, XID(0x0020_0001), 0x0000ff))
            .unwrap();
        server
            .handle(
                client,
                &Request::PolyPoint(PolyPointRequest {
                    coordinate_mode: CoordMode::Origin,
                    drawable: XID(0x0020_0001),
                    gc: GContext::new(0x0020_0020),
                    points: vec![Point::new(3, 4)],
                }),
            )
            .unwrap();

        let ids = server.physical_ids(XID(0x0020_0001)).unwrap();
        for (screen, id) in ids {
            assert_eq!(probes[screen.0].pixel(id, 3, 4), Some(0x0000ff));
        }
    }

    #[test]
    fn test_empty_request_validates_then_does_nothing() {
        let (mut server, probes) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window().id();

        let err = server
            .handle(
                client,
                &Request::PolySegment(PolySegmentRequest {
                    drawable: root,
                    gc: GContext::new(0x0020_0020),
                    segments: Vec::new(),
                }),
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::GContext);

        server.handle(client, &create_gc(0x0020_0020, root, 1)).unwrap();
        let reply = server
            .handle(
                client,
                &Request::PolySegment(PolySegmentRequest {
                    drawable: root,
                    gc: GContext::new(0x0020_0020),
                    segments: Vec::new(),
                }),
            )
            .unwrap();
        assert!(reply.is_none());
        assert_eq!(probes[0].count(core(RequestOpcode::PolySegment)), 0);
    }
}
