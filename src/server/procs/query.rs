//! Queries answered from screen 0 or assembled across screens
//!
//! Geometry and coordinate queries read screen 0's window tree and report
//! desktop coordinates for anything positioned relative to the root. Images
//! are stitched together from every screen the requested area covers.

use crate::backend::{DrawableKind, WindowInfo};
use crate::protocol::image;
use crate::protocol::*;
use crate::resources::{CompositeResource, ResourceKind};
use crate::screens::ScreenIndex;
use crate::security::{Access, ClientId};
use crate::server::{to_desktop, Server};

/// Pixels of a drawable area in Z format
pub(crate) struct AssembledImage {
    pub depth: u8,
    pub visual: VisualID,
    pub data: Vec<u8>,
}

impl Server {
    /// Screen 0's view of a composite window
    pub(crate) fn primary_window_info(&self, window: &CompositeResource) -> X11Result<WindowInfo> {
        let id = window.physical_on(ScreenIndex::PRIMARY)?;
        self.backends
            .first()
            .and_then(|b| b.window_info(id))
            .ok_or_else(|| X11Error::bad_window(window.logical_id))
    }

    pub(crate) fn primary_depth(&self, drawable: &CompositeResource) -> X11Result<u8> {
        let id = drawable.physical_on(ScreenIndex::PRIMARY)?;
        self.backends
            .first()
            .and_then(|b| b.drawable_info(id))
            .map(|info| info.depth)
            .ok_or_else(|| X11Error::bad_drawable(drawable.logical_id))
    }

    fn origin0(&self) -> (i32, i32) {
        self.screens
            .primary()
            .map(|s| (s.origin_x, s.origin_y))
            .unwrap_or((0, 0))
    }

    pub(crate) fn get_geometry(
        &mut self,
        client: ClientId,
        req: &ResourceRequest,
    ) -> X11Result<Option<Reply>> {
        let drawable = self.resolve_drawable(client, req.id, Access::GetAttr)?;
        let id = drawable.physical_on(ScreenIndex::PRIMARY)?;
        let info = self
            .backends
            .first()
            .and_then(|b| b.drawable_info(id))
            .ok_or_else(|| X11Error::bad_drawable(req.id))?;

        let mut reply = GetGeometryReply {
            depth: info.depth,
            root: Window(self.root),
            x: 0,
            y: 0,
            width: info.width,
            height: info.height,
            border_width: 0,
        };

        if info.kind == DrawableKind::Window {
            if self.is_root_like(&drawable) {
                let (width, height) = self.screens.desktop_size();
                reply.width = width;
                reply.height = height;
            } else {
                let window = self.primary_window_info(&drawable)?;
                let (ox, oy) = if self.parent_is_root(window.parent) {
                    self.origin0()
                } else {
                    (0, 0)
                };
                reply.x = to_desktop(window.x, ox);
                reply.y = to_desktop(window.y, oy);
                reply.border_width = window.border_width;
            }
        }

        Ok(Some(Reply::GetGeometry(reply)))
    }

    pub(crate) fn translate_coordinates(
        &mut self,
        client: ClientId,
        req: &TranslateCoordinatesRequest,
    ) -> X11Result<Option<Reply>> {
        let src =
            self.resolve(client, req.src_window.id(), ResourceKind::Window, Access::GetAttr)?;
        let dst =
            self.resolve(client, req.dst_window.id(), ResourceKind::Window, Access::GetAttr)?;
        let src_info = self.primary_window_info(&src)?;
        let dst_info = self.primary_window_info(&dst)?;
        let (ox, oy) = self.origin0();

        // The point in screen 0's coordinates
        let (x, y) = if self.is_root_like(&src) {
            (req.src_x as i32 - ox, req.src_y as i32 - oy)
        } else {
            (
                src_info.abs_x + req.src_x as i32,
                src_info.abs_y + req.src_y as i32,
            )
        };

        let mut child = Window::NONE;
        for id in &dst_info.children {
            let Some(info) = self.backends.first().and_then(|b| b.window_info(*id)) else {
                continue;
            };
            let bw = info.border_width as i32;
            let inside = x >= info.abs_x - bw
                && x < info.abs_x + info.width as i32 + bw
                && y >= info.abs_y - bw
                && y < info.abs_y + info.height as i32 + bw;
            if info.mapped && inside {
                child = Window(*id);
                break;
            }
        }

        let (mut dst_x, mut dst_y) = (x - dst_info.abs_x, y - dst_info.abs_y);
        if self.is_root_like(&dst) {
            dst_x += ox;
            dst_y += oy;
        }

        Ok(Some(Reply::TranslateCoordinates(TranslateCoordinatesReply {
            same_screen: true,
            child,
            dst_x: dst_x as i16,
            dst_y: dst_y as i16,
        })))
    }

    pub(crate) fn get_image(
        &mut self,
        client: ClientId,
        req: &GetImageRequest,
    ) -> X11Result<Option<Reply>> {
        if req.format == ImageFormat::Bitmap {
            return Err(X11Error::bad_value(req.format as u32));
        }
        let drawable = self.resolve_drawable(client, req.drawable, Access::Read)?;
        let area = Rectangle::new(req.x, req.y, req.width, req.height);
        let assembled = self.read_image(&drawable, area, req.plane_mask, false)?;

        let data = match req.format {
            ImageFormat::XYPixmap => image::z_to_xy(
                &assembled.data,
                req.width as usize,
                req.height as usize,
                assembled.depth,
                req.plane_mask,
            )?,
            _ => assembled.data,
        };
        Ok(Some(Reply::GetImage(GetImageReply {
            depth: assembled.depth,
            visual: assembled.visual,
            data,
        })))
    }

    /// Read an area of a drawable as one Z image.
    ///
    /// Pixmaps are read from screen 0. Windows are read from every screen
    /// the area covers on the desktop. A `tolerant` read leaves pixels it
    /// cannot reach zero instead of failing.
    pub(crate) fn read_image(
        &mut self,
        drawable: &CompositeResource,
        area: Rectangle,
        plane_mask: u32,
        tolerant: bool,
    ) -> X11Result<AssembledImage> {
        if !drawable.is_window() {
            return self.read_pixmap(drawable, area, plane_mask, tolerant);
        }
        let Rectangle {
            x,
            y,
            width,
            height,
        } = area;

        let window = self.primary_window_info(drawable)?;
        if window.class == WindowClass::InputOnly {
            return Err(X11Error::bad_match(drawable.logical_id.get()));
        }
        if !window.viewable && !tolerant {
            return Err(X11Error::bad_match(drawable.logical_id.get()));
        }

        // Desktop position of the window interior; the root's is the origin
        let desktop_wide = self.is_root_like(drawable);
        let (ox, oy) = self.origin0();
        let (desk_x, desk_y) = if desktop_wide {
            (0, 0)
        } else {
            (ox + window.abs_x, oy + window.abs_y)
        };
        let (desktop_w, desktop_h) = self.screens.desktop_size();
        let bw = if desktop_wide {
            0
        } else {
            window.border_width as i32
        };

        // Requested area on the desktop
        let (px, py) = (desk_x + x as i32, desk_y + y as i32);
        let (w, h) = (width as i32, height as i32);
        let within_desktop =
            px >= 0 && py >= 0 && px + w <= desktop_w as i32 && py + h <= desktop_h as i32;
        let within_border = desktop_wide
            || (x as i32 >= -bw
                && y as i32 >= -bw
                && x as i32 + w <= window.width as i32 + bw
                && y as i32 + h <= window.height as i32 + bw);
        if !tolerant && !(within_desktop && within_border) {
            return Err(X11Error::bad_match(drawable.logical_id.get()));
        }

        let mut data = self.image_buffer(width, height, window.depth)?;
        let mut assembled = AssembledImage {
            depth: window.depth,
            visual: window.visual,
            data: Vec::new(),
        };
        if !window.viewable {
            assembled.data = data;
            return Ok(assembled);
        }

        // The part that can be read: inside the border and on the desktop
        let (mut cx1, mut cy1) = (px.max(0), py.max(0));
        let mut cx2 = (px + w).min(desktop_w as i32);
        let mut cy2 = (py + h).min(desktop_h as i32);
        if !desktop_wide {
            cx1 = cx1.max(desk_x - bw);
            cy1 = cy1.max(desk_y - bw);
            cx2 = cx2.min(desk_x + window.width as i32 + bw);
            cy2 = cy2.min(desk_y + window.height as i32 + bw);
        }
        if cx2 <= cx1 || cy2 <= cy1 {
            assembled.data = data;
            return Ok(assembled);
        }

        let depth = window.depth;
        let row_bytes =
            image::pixmap_row_bytes(width as usize, depth).ok_or_else(X11Error::bad_alloc)?;
        let screens = &self.screens;
        let backends = &mut self.backends;
        screens.for_each_forward(|screen| {
            let Some((ix, iy, iw, ih)) = screen.intersect(cx1, cy1, cx2 - cx1, cy2 - cy1) else {
                return Ok(());
            };
            let Some(id) = drawable.physical(screen.index) else {
                return if tolerant {
                    Ok(())
                } else {
                    Err(drawable.kind().not_found(drawable.logical_id))
                };
            };
            // Root coordinates are screen coordinates shifted by the screen's
            // origin; other windows keep their own coordinates everywhere
            let (rx, ry) = if desktop_wide {
                (ix - screen.origin_x, iy - screen.origin_y)
            } else {
                (ix - desk_x, iy - desk_y)
            };
            let part = GetImageRequest {
                format: ImageFormat::ZPixmap,
                drawable: id,
                x: rx as i16,
                y: ry as i16,
                width: iw as u16,
                height: ih as u16,
                plane_mask,
            };
            let result = match backends.get_mut(screen.index.0) {
                Some(backend) => backend.dispatch(&Request::GetImage(part)),
                None => Err(X11Error::implementation_error()),
            };
            let reply = match result {
                Ok(response) => match response.reply {
                    Some(Reply::GetImage(reply)) => reply,
                    _ => return Err(X11Error::implementation_error()),
                },
                Err(err) if tolerant => {
                    log::debug!("Skipping unreadable part on {}: {}", screen.index, err);
                    return Ok(());
                }
                Err(err) => return Err(err),
            };

            let part_row = image::pixmap_row_bytes(iw as usize, depth)
                .ok_or_else(X11Error::bad_alloc)?;
            for row in 0..ih {
                for col in 0..iw {
                    let pixel =
                        image::get_pixel(&reply.data, part_row, depth, col as usize, row as usize);
                    image::put_pixel(
                        &mut data,
                        row_bytes,
                        depth,
                        (ix - px + col) as usize,
                        (iy - py + row) as usize,
                        pixel,
                    );
                }
            }
            Ok(())
        })?;

        assembled.data = data;
        Ok(assembled)
    }

    /// Zeroed Z image buffer, or `BadAlloc` when it overflows or is larger
    /// than the policy allows
    fn image_buffer(&self, width: u16, height: u16, depth: u8) -> X11Result<Vec<u8>> {
        let len = image::z_image_len(width as usize, height as usize, depth)
            .filter(|len| self.table.policy().may_allocate_image(*len))
            .ok_or_else(X11Error::bad_alloc)?;
        image::alloc_image(len)
    }

    fn read_pixmap(
        &mut self,
        pixmap: &CompositeResource,
        area: Rectangle,
        plane_mask: u32,
        tolerant: bool,
    ) -> X11Result<AssembledImage> {
        let id = pixmap.physical_on(ScreenIndex::PRIMARY)?;
        let request = Request::GetImage(GetImageRequest {
            format: ImageFormat::ZPixmap,
            drawable: id,
            x: area.x,
            y: area.y,
            width: area.width,
            height: area.height,
            plane_mask,
        });
        let result = match self.backends.first_mut() {
            Some(backend) => backend.dispatch(&request),
            None => Err(X11Error::implementation_error()),
        };
        match result {
            Ok(response) => match response.reply {
                Some(Reply::GetImage(reply)) => Ok(AssembledImage {
                    depth: reply.depth,
                    visual: reply.visual,
                    data: reply.data,
                }),
                _ => Err(X11Error::implementation_error()),
            },
            Err(err) if tolerant && err.code == ErrorCode::Match => {
                let depth = self.primary_depth(pixmap)?;
                Ok(AssembledImage {
                    depth,
                    visual: VisualID::new(0),
                    data: self.image_buffer(area.width, area.height, depth)?,
                })
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{create_gc, create_window, two_screens, two_screens_with};
    use super::*;
    use crate::backend::ScreenProbe;
    use crate::security::SecurityPolicy;

    fn root_image(root: XID, x: i16, width: u16, height: u16) -> Request {
        Request::GetImage(GetImageRequest {
            format: ImageFormat::ZPixmap,
            drawable: root,
            x,
            y: 0,
            width,
            height,
            plane_mask: u32::MAX,
        })
    }

    fn image_reads(probes: &[ScreenProbe]) -> usize {
        probes
            .iter()
            .flat_map(|p| p.requests())
            .filter(|r| matches!(r, Request::GetImage(_)))
            .count()
    }

    fn map(server: &mut Server, client: ClientId, id: u32) {
        server
            .handle(client, &Request::MapWindow(ResourceRequest::new(XID(id))))
            .unwrap();
    }

    #[test]
    fn test_geometry_of_top_level_window_is_desktop_relative() {
        let (mut server, _) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window().id();
        server
            .handle(client, &create_window(0x0020_0001, root, 700, 20))
            .unwrap();

        let reply = server
            .handle(client, &Request::GetGeometry(ResourceRequest::new(XID(0x0020_0001))))
            .unwrap();
        match reply {
            Some(Reply::GetGeometry(g)) => {
                assert_eq!((g.x, g.y, g.width, g.height, g.border_width), (700, 20, 100, 50, 2));
                assert_eq!(g.root, Window(root));
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_translate_finds_child_on_second_screen() {
        let (mut server, _) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window().id();
        server
            .handle(client, &create_window(0x0020_0001, root, 700, 20))
            .unwrap();
        map(&mut server, client, 0x0020_0001);

        let reply = server
            .handle(
                client,
                &Request::TranslateCoordinates(TranslateCoordinatesRequest {
                    src_window: Window(root),
                    dst_window: Window(root),
                    src_x: 710,
                    src_y: 30,
                }),
            )
            .unwrap();
        assert_eq!(
            reply,
            Some(Reply::TranslateCoordinates(TranslateCoordinatesReply {
                same_screen: true,
                child: Window::new(0x0020_0001),
                dst_x: 710,
                dst_y: 30,
            }))
        );

        let reply = server
            .handle(
                client,
                &Request::TranslateCoordinates(TranslateCoordinatesRequest {
                    src_window: Window(root),
                    dst_window: Window::new(0x0020_0001),
                    src_x: 710,
                    src_y: 30,
                }),
            )
            .unwrap();
        match reply {
            Some(Reply::TranslateCoordinates(r)) => {
                // Interior starts at 700 + border 2
                assert_eq!((r.dst_x, r.dst_y), (8, 8));
                assert_eq!(r.child, Window::NONE);
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_root_image_is_stitched_across_screens() {
        let (mut server, _) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window().id();
        server.handle(client, &create_gc(0x0020_0020, root, 0x123456)).unwrap();
        server
            .handle(
                client,
                &Request::PolyPoint(PolyPointRequest {
                    coordinate_mode: CoordMode::Origin,
                    drawable: root,
                    gc: GContext::new(0x0020_0020),
                    points: vec![Point::new(639, 0), Point::new(641, 0)],
                }),
            )
            .unwrap();

        let reply = server
            .handle(
                client,
                &Request::GetImage(GetImageRequest {
                    format: ImageFormat::ZPixmap,
                    drawable: root,
                    x: 638,
                    y: 0,
                    width: 4,
                    height: 1,
                    plane_mask: u32::MAX,
                }),
            )
            .unwrap();
        let data = match reply {
            Some(Reply::GetImage(reply)) => reply.data,
            other => panic!("unexpected reply {:?}", other),
        };
        let pixels: Vec<u32> = (0..4).map(|x| image::get_pixel(&data, 16, 24, x, 0)).collect();
        assert_eq!(pixels, vec![0, 0x123456, 0, 0x123456]);
    }

    #[test]
    fn test_image_outside_desktop_is_bad_match() {
        let (mut server, _) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window().id();
        let err = server
            .handle(
                client,
                &Request::GetImage(GetImageRequest {
                    format: ImageFormat::ZPixmap,
                    drawable: root,
                    x: 1270,
                    y: 0,
                    width: 20,
                    height: 1,
                    plane_mask: u32::MAX,
                }),
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Match);
    }

    #[test]
    fn test_unmapped_window_image_is_bad_match() {
        let (mut server, _) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window().id();
        server
            .handle(client, &create_window(0x0020_0001, root, 0, 0))
            .unwrap();
        let err = server
            .handle(
                client,
                &Request::GetImage(GetImageRequest {
                    format: ImageFormat::ZPixmap,
                    drawable: XID(0x0020_0001),
                    x: 0,
                    y: 0,
                    width: 4,
                    height: 4,
                    plane_mask: u32::MAX,
                }),
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Match);
    }

    #[test]
    fn test_huge_image_off_desktop_fails_before_reading() {
        let (mut server, probes) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window().id();
        let err = server
            .handle(client, &root_image(root, 0, 20000, 20000))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Match);
        assert_eq!(image_reads(&probes), 0);
    }

    #[test]
    fn test_image_larger_than_policy_is_bad_alloc() {
        let policy = SecurityPolicy {
            max_image_bytes: 16,
            ..SecurityPolicy::permissive()
        };
        let (mut server, probes) = two_screens_with(policy);
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window().id();

        // Four 32-bit pixels fit exactly
        server.handle(client, &root_image(root, 638, 4, 1)).unwrap();
        probes.iter().for_each(|p| p.clear_requests());

        let err = server
            .handle(client, &root_image(root, 638, 5, 1))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Alloc);
        assert_eq!(image_reads(&probes), 0);
    }

    #[test]
    fn test_geometry_and_translate_repeat_identically() {
        let (mut server, probes) = two_screens();
        let client = server.register_client(ByteOrder::LSBFirst);
        let root = server.root_window().id();
        server
            .handle(client, &create_window(0x0020_0001, root, 700, 20))
            .unwrap();
        map(&mut server, client, 0x0020_0001);
        let live = server.table().len();

        let geometry = Request::GetGeometry(ResourceRequest::new(XID(0x0020_0001)));
        let translate = Request::TranslateCoordinates(TranslateCoordinatesRequest {
            src_window: Window(root),
            dst_window: Window::new(0x0020_0001),
            src_x: 710,
            src_y: 30,
        });
        for request in [geometry, translate] {
            let first = server.handle(client, &request).unwrap();
            let calls: Vec<usize> = probes.iter().map(|p| p.requests().len()).collect();
            let second = server.handle(client, &request).unwrap();
            assert!(first.is_some());
            assert_eq!(first, second);
            assert_eq!(probes.iter().map(|p| p.requests().len()).collect::<Vec<_>>(), calls);
        }
        assert_eq!(server.table().len(), live);
    }
}
