//! RENDER requests
//!
//! A picture takes on the root-ness of the drawable it was created on:
//! coordinates given for a root picture are desktop coordinates.

use super::PICTURE_ATTR_IDS;
use crate::protocol::*;
use crate::resources::{KindData, ResourceKind};
use crate::security::{Access, ClientId};
use crate::server::Server;

fn render(op: RenderOpcode) -> Opcode {
    Opcode::Render(op)
}

impl Server {
    pub(crate) fn create_picture(
        &mut self,
        client: ClientId,
        req: &CreatePictureRequest,
    ) -> X11Result<Option<Reply>> {
        let drawable = self.resolve_drawable(client, req.drawable, Access::GetAttr)?;
        let attr_ids = self.resolve_attr_ids(client, &req.values, &PICTURE_ATTR_IDS)?;
        let is_root = self.is_root_like(&drawable);

        self.create_composite(
            client,
            render(RenderOpcode::CreatePicture),
            req.pid.id(),
            KindData::Picture { is_root },
            req.clone(),
            Request::RenderCreatePicture,
            |req, screen, pid| {
                req.pid = Picture(pid);
                req.drawable = drawable.physical_on(screen)?;
                attr_ids.apply(&mut req.values, screen);
                Ok(())
            },
        )
    }

    pub(crate) fn change_picture(
        &mut self,
        client: ClientId,
        req: &ChangePictureRequest,
    ) -> X11Result<Option<Reply>> {
        let picture =
            self.resolve(client, req.picture.id(), ResourceKind::Picture, Access::Write)?;
        let attr_ids = self.resolve_attr_ids(client, &req.values, &PICTURE_ATTR_IDS)?;

        self.fan_out_on(
            render(RenderOpcode::ChangePicture),
            &picture,
            req.clone(),
            Request::RenderChangePicture,
            |req, screen| {
                req.picture = Picture(picture.physical_on(screen)?);
                attr_ids.apply(&mut req.values, screen);
                Ok(())
            },
        )
    }

    pub(crate) fn set_picture_clip_rectangles(
        &mut self,
        client: ClientId,
        req: &SetPictureClipRectanglesRequest,
    ) -> X11Result<Option<Reply>> {
        let picture =
            self.resolve(client, req.picture.id(), ResourceKind::Picture, Access::Write)?;
        let translations = self.content_translations(&picture);

        self.fan_out_on(
            render(RenderOpcode::SetPictureClipRectangles),
            &picture,
            req.clone(),
            Request::RenderSetPictureClipRectangles,
            |req, screen| {
                req.picture = Picture(picture.physical_on(screen)?);
                translations[screen.0].apply(&mut req.clip_x_origin, &mut req.clip_y_origin);
                Ok(())
            },
        )
    }

    pub(crate) fn free_picture(
        &mut self,
        client: ClientId,
        req: &ResourceRequest,
    ) -> X11Result<Option<Reply>> {
        let picture = self.resolve(client, req.id, ResourceKind::Picture, Access::Destroy)?;
        self.fan_out_destroy(
            render(RenderOpcode::FreePicture),
            &picture,
            *req,
            Request::RenderFreePicture,
            |req, screen| {
                req.id = picture.physical_on(screen)?;
                Ok(())
            },
        )
    }

    pub(crate) fn composite(
        &mut self,
        client: ClientId,
        req: &CompositeRequest,
    ) -> X11Result<Option<Reply>> {
        let src = self.resolve(client, req.src.id(), ResourceKind::Picture, Access::Read)?;
        let mask = if req.mask == Picture::NONE {
            None
        } else {
            Some(self.resolve(client, req.mask.id(), ResourceKind::Picture, Access::Read)?)
        };
        let dst = self.resolve(client, req.dst.id(), ResourceKind::Picture, Access::Write)?;

        let src_translations = self.content_translations(&src);
        let mask_translations = mask.as_ref().map(|m| self.content_translations(m));
        let dst_translations = self.content_translations(&dst);

        self.fan_out_on(
            render(RenderOpcode::Composite),
            &dst,
            *req,
            Request::RenderComposite,
            |req, screen| {
                req.src = Picture(src.physical_on(screen)?);
                req.dst = Picture(dst.physical_on(screen)?);
                src_translations[screen.0].apply(&mut req.src_x, &mut req.src_y);
                dst_translations[screen.0].apply(&mut req.dst_x, &mut req.dst_y);
                if let (Some(mask), Some(translations)) = (&mask, &mask_translations) {
                    req.mask = Picture(mask.physical_on(screen)?);
                    translations[screen.0].apply(&mut req.mask_x, &mut req.mask_y);
                }
                Ok(())
            },
        )
    }

    pub(crate) fn fill_rectangles(
        &mut self,
        client: ClientId,
        req: &FillRectanglesRequest,
    ) -> X11Result<Option<Reply>> {
        let dst = self.resolve(client, req.dst.id(), ResourceKind::Picture, Access::Write)?;
        if req.rectangles.is_empty() {
            return Ok(None);
        }
        let translations = self.content_translations(&dst);

        self.fan_out_on(
            render(RenderOpcode::FillRectangles),
            &dst,
            req.clone(),
            Request::RenderFillRectangles,
            |req, screen| {
                req.dst = Picture(dst.physical_on(screen)?);
                translations[screen.0].apply_rectangles(&mut req.rectangles);
                Ok(())
            },
        )
    }

    pub(crate) fn create_solid_fill(
        &mut self,
        client: ClientId,
        req: &CreateSolidFillRequest,
    ) -> X11Result<Option<Reply>> {
        self.create_composite(
            client,
            render(RenderOpcode::CreateSolidFill),
            req.pid.id(),
            KindData::Picture { is_root: false },
            *req,
            Request::RenderCreateSolidFill,
            |req, _, pid| {
                req.pid = Picture(pid);
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

    const FORMAT: u32 = 0x1;

    fn create_picture(pid: u32, drawable: XID) -> Request {
        Request::RenderCreatePicture(CreatePictureRequest {
            pid: Picture::new(pid),
            drawable,
            format: FORMAT,
            values: ValueList::empty(),
        })
    }

    #[test]
    fn test_root_picture_fill_is_translated() {
        let (mut server, probes) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window().id();
        server.handle(client, &create_picture(0x0020_0040, root)).unwrap();
        assert!(server.table().get(XID(0x0020_0040)).unwrap().is_root());

        server
            .handle(
                client,
                &Request::RenderFillRectangles(FillRectanglesRequest {
                    op: 1,
                    dst: Picture::new(0x0020_0040),
                    color: RenderColor {
                        red: 0xffff,
                        green: 0,
                        blue: 0,
                        alpha: 0xffff,
                    },
                    rectangles: vec![Rectangle::new(650, 20, 4, 4)],
                }),
            )
            .unwrap();

        let root1 = probes[1].screen_info().root;
        assert_eq!(probes[1].pixel(root1, 11, 21), Some(0xff0000));
        assert_eq!(probes[0].pixel(root, 639, 21), Some(0));
    }

    #[test]
    fn test_window_picture_is_not_root() {
        let (mut server, _) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window().id();
        server
            .handle(client, &create_window(0x0020_0001, root, 10, 10))
            .unwrap();
        server
            .handle(client, &create_picture(0x0020_0040, XID(0x0020_0001)))
            .unwrap();
        assert!(!server.table().get(XID(0x0020_0040)).unwrap().is_root());
    }

    #[test]
    fn test_composite_rewrites_mask_per_screen() {
        let (mut server, probes) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window().id();
        server.handle(client, &create_picture(0x0020_0040, root)).unwrap();
        for pid in [0x0020_0041, 0x0020_0042] {
            server
                .handle(
                    client,
                    &Request::RenderCreateSolidFill(CreateSolidFillRequest {
                        pid: Picture::new(pid),
                        color: RenderColor::default(),
                    }),
                )
                .unwrap();
        }

        server
            .handle(
                client,
                &Request::RenderComposite(CompositeRequest {
                    op: 3,
                    src: Picture::new(0x0020_0041),
                    mask: Picture::new(0x0020_0042),
                    dst: Picture::new(0x0020_0040),
                    src_x: 0,
                    src_y: 0,
                    mask_x: 0,
                    mask_y: 0,
                    dst_x: 700,
                    dst_y: 5,
                    width: 2,
                    height: 2,
                }),
            )
            .unwrap();

        let mask1 = server.physical_ids(XID(0x0020_0042)).unwrap()[&ScreenIndex(1)];
        let sent = probes[1]
            .requests()
            .into_iter()
            .find_map(|r| match r {
                Request::RenderComposite(req) => Some(req),
                _ => None,
            })
            .unwrap();
        assert_eq!(sent.mask.id(), mask1);
        assert_eq!(sent.dst_x, 60);
        assert_eq!(sent.mask_x, 0);
    }

    #[test]
    fn test_free_picture_twice_is_bad_picture() {
        let (mut server, _) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window().id();
        server.handle(client, &create_picture(0x0020_0040, root)).unwrap();

        let free = Request::RenderFreePicture(ResourceRequest::new(XID(0x0020_0040)));
        server.handle(client, &free).unwrap();
        let err = server.handle(client, &free).unwrap_err();
        assert_eq!(err.code, ErrorCode::Picture);
    }
}
