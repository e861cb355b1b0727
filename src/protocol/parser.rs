//! X11 request parser
//!
//! This module parses X11 requests from the wire protocol into the typed
//! [`Request`] values that flow through the dispatcher and the fanout layer.

use super::*;

/// Parsed X11 request
#[allow(clippy::enum_variant_names)]
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    CreateWindow(CreateWindowRequest),
    ChangeWindowAttributes(ChangeWindowAttributesRequest),
    DestroyWindow(ResourceRequest),
    DestroySubwindows(ResourceRequest),
    ChangeSaveSet(ChangeSaveSetRequest),
    ReparentWindow(ReparentWindowRequest),
    MapWindow(ResourceRequest),
    MapSubwindows(ResourceRequest),
    UnmapWindow(ResourceRequest),
    UnmapSubwindows(ResourceRequest),
    ConfigureWindow(ConfigureWindowRequest),
    CirculateWindow(CirculateWindowRequest),
    GetGeometry(ResourceRequest),
    TranslateCoordinates(TranslateCoordinatesRequest),
    CreatePixmap(CreatePixmapRequest),
    FreePixmap(ResourceRequest),
    CreateGC(CreateGCRequest),
    ChangeGC(ChangeGCRequest),
    CopyGC(CopyGCRequest),
    SetDashes(SetDashesRequest),
    SetClipRectangles(SetClipRectanglesRequest),
    FreeGC(ResourceRequest),
    ClearArea(ClearAreaRequest),
    CopyArea(CopyAreaRequest),
    CopyPlane(CopyPlaneRequest),
    PolyPoint(PolyPointRequest),
    PolyLine(PolyPointRequest),
    PolySegment(PolySegmentRequest),
    PolyRectangle(PolyRectangleRequest),
    PolyArc(PolyArcRequest),
    FillPoly(FillPolyRequest),
    PolyFillRectangle(PolyRectangleRequest),
    PolyFillArc(PolyArcRequest),
    PutImage(PutImageRequest),
    GetImage(GetImageRequest),
    PolyText8(TextRequest),
    PolyText16(TextRequest),
    ImageText8(TextRequest),
    ImageText16(TextRequest),
    CreateColormap(CreateColormapRequest),
    FreeColormap(ResourceRequest),
    CopyColormapAndFree(CopyColormapAndFreeRequest),
    InstallColormap(ResourceRequest),
    UninstallColormap(ResourceRequest),
    AllocColor(AllocColorRequest),
    AllocNamedColor(AllocNamedColorRequest),
    AllocColorCells(AllocColorCellsRequest),
    AllocColorPlanes(AllocColorPlanesRequest),
    FreeColors(FreeColorsRequest),
    StoreColors(StoreColorsRequest),
    StoreNamedColor(StoreNamedColorRequest),
    RenderCreatePicture(CreatePictureRequest),
    RenderChangePicture(ChangePictureRequest),
    RenderSetPictureClipRectangles(SetPictureClipRectanglesRequest),
    RenderFreePicture(ResourceRequest),
    RenderComposite(CompositeRequest),
    RenderFillRectangles(FillRectanglesRequest),
    RenderCreateSolidFill(CreateSolidFillRequest),
    XineramaQueryVersion(XineramaQueryVersionRequest),
    XineramaGetState(ResourceRequest),
    XineramaGetScreenCount(ResourceRequest),
    XineramaGetScreenSize(GetScreenSizeRequest),
    XineramaIsActive,
    XineramaQueryScreens,
}

impl Request {
    /// Dispatch key of this request
    pub fn opcode(&self) -> Opcode {
        use RequestOpcode as Op;
        match self {
            Request::CreateWindow(_) => Opcode::Core(Op::CreateWindow),
            Request::ChangeWindowAttributes(_) => Opcode::Core(Op::ChangeWindowAttributes),
            Request::DestroyWindow(_) => Opcode::Core(Op::DestroyWindow),
            Request::DestroySubwindows(_) => Opcode::Core(Op::DestroySubwindows),
            Request::ChangeSaveSet(_) => Opcode::Core(Op::ChangeSaveSet),
            Request::ReparentWindow(_) => Opcode::Core(Op::ReparentWindow),
            Request::MapWindow(_) => Opcode::Core(Op::MapWindow),
            Request::MapSubwindows(_) => Opcode::Core(Op::MapSubwindows),
            Request::UnmapWindow(_) => Opcode::Core(Op::UnmapWindow),
            Request::UnmapSubwindows(_) => Opcode::Core(Op::UnmapSubwindows),
            Request::ConfigureWindow(_) => Opcode::Core(Op::ConfigureWindow),
            Request::CirculateWindow(_) => Opcode::Core(Op::CirculateWindow),
            Request::GetGeometry(_) => Opcode::Core(Op::GetGeometry),
            Request::TranslateCoordinates(_) => Opcode::Core(Op::TranslateCoordinates),
            Request::CreatePixmap(_) => Opcode::Core(Op::CreatePixmap),
            Request::FreePixmap(_) => Opcode::Core(Op::FreePixmap),
            Request::CreateGC(_) => Opcode::Core(Op::CreateGC),
            Request::ChangeGC(_) => Opcode::Core(Op::ChangeGC),
            Request::CopyGC(_) => Opcode::Core(Op::CopyGC),
            Request::SetDashes(_) => Opcode::Core(Op::SetDashes),
            Request::SetClipRectangles(_) => Opcode::Core(Op::SetClipRectangles),
            Request::FreeGC(_) => Opcode::Core(Op::FreeGC),
            Request::ClearArea(_) => Opcode::Core(Op::ClearArea),
            Request::CopyArea(_) => Opcode::Core(Op::CopyArea),
            Request::CopyPlane(_) => Opcode::Core(Op::CopyPlane),
            Request::PolyPoint(_) => Opcode::Core(Op::PolyPoint),
            Request::PolyLine(_) => Opcode::Core(Op::PolyLine),
            Request::PolySegment(_) => Opcode::Core(Op::PolySegment),
            Request::PolyRectangle(_) => Opcode::Core(Op::PolyRectangle),
            Request::PolyArc(_) => Opcode::Core(Op::PolyArc),
            Request::FillPoly(_) => Opcode::Core(Op::FillPoly),
            Request::PolyFillRectangle(_) => Opcode::Core(Op::PolyFillRectangle),
            Request::PolyFillArc(_) => Opcode::Core(Op::PolyFillArc),
            Request::PutImage(_) => Opcode::Core(Op::PutImage),
            Request::GetImage(_) => Opcode::Core(Op::GetImage),
            Request::PolyText8(_) => Opcode::Core(Op::PolyText8),
            Request::PolyText16(_) => Opcode::Core(Op::PolyText16),
            Request::ImageText8(_) => Opcode::Core(Op::ImageText8),
            Request::ImageText16(_) => Opcode::Core(Op::ImageText16),
            Request::CreateColormap(_) => Opcode::Core(Op::CreateColormap),
            Request::FreeColormap(_) => Opcode::Core(Op::FreeColormap),
            Request::CopyColormapAndFree(_) => Opcode::Core(Op::CopyColormapAndFree),
            Request::InstallColormap(_) => Opcode::Core(Op::InstallColormap),
            Request::UninstallColormap(_) => Opcode::Core(Op::UninstallColormap),
            Request::AllocColor(_) => Opcode::Core(Op::AllocColor),
            Request::AllocNamedColor(_) => Opcode::Core(Op::AllocNamedColor),
            Request::AllocColorCells(_) => Opcode::Core(Op::AllocColorCells),
            Request::AllocColorPlanes(_) => Opcode::Core(Op::AllocColorPlanes),
            Request::FreeColors(_) => Opcode::Core(Op::FreeColors),
            Request::StoreColors(_) => Opcode::Core(Op::StoreColors),
            Request::StoreNamedColor(_) => Opcode::Core(Op::StoreNamedColor),
            Request::RenderCreatePicture(_) => Opcode::Render(RenderOpcode::CreatePicture),
            Request::RenderChangePicture(_) => Opcode::Render(RenderOpcode::ChangePicture),
            Request::RenderSetPictureClipRectangles(_) => {
                Opcode::Render(RenderOpcode::SetPictureClipRectangles)
            }
            Request::RenderFreePicture(_) => Opcode::Render(RenderOpcode::FreePicture),
            Request::RenderComposite(_) => Opcode::Render(RenderOpcode::Composite),
            Request::RenderFillRectangles(_) => Opcode::Render(RenderOpcode::FillRectangles),
            Request::RenderCreateSolidFill(_) => Opcode::Render(RenderOpcode::CreateSolidFill),
            Request::XineramaQueryVersion(_) => Opcode::Xinerama(XineramaOpcode::QueryVersion),
            Request::XineramaGetState(_) => Opcode::Xinerama(XineramaOpcode::GetState),
            Request::XineramaGetScreenCount(_) => {
                Opcode::Xinerama(XineramaOpcode::GetScreenCount)
            }
            Request::XineramaGetScreenSize(_) => Opcode::Xinerama(XineramaOpcode::GetScreenSize),
            Request::XineramaIsActive => Opcode::Xinerama(XineramaOpcode::IsActive),
            Request::XineramaQueryScreens => Opcode::Xinerama(XineramaOpcode::QueryScreens),
        }
    }
}

/// Any request whose body is a single resource id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRequest {
    pub id: XID,
}

impl ResourceRequest {
    pub fn new(id: XID) -> Self {
        ResourceRequest { id }
    }
}

/// Create window request
#[derive(Debug, Clone, PartialEq)]
pub struct CreateWindowRequest {
    pub depth: u8,
    pub wid: Window,
    pub parent: Window,
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub border_width: u16,
    pub class: WindowClass,
    pub visual: VisualID,
    pub values: ValueList,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeWindowAttributesRequest {
    pub window: Window,
    pub values: ValueList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeSaveSetRequest {
    pub mode: u8,
    pub window: Window,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReparentWindowRequest {
    pub window: Window,
    pub parent: Window,
    pub x: i16,
    pub y: i16,
}

/// Configure window request; x and y travel as 32-bit slots holding INT16s
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigureWindowRequest {
    pub window: Window,
    pub values: ValueList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CirculateWindowRequest {
    pub direction: u8,
    pub window: Window,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslateCoordinatesRequest {
    pub src_window: Window,
    pub dst_window: Window,
    pub src_x: i16,
    pub src_y: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatePixmapRequest {
    pub depth: u8,
    pub pid: Pixmap,
    pub drawable: XID,
    pub width: u16,
    pub height: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateGCRequest {
    pub cid: GContext,
    pub drawable: XID,
    pub values: ValueList,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeGCRequest {
    pub gc: GContext,
    pub values: ValueList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyGCRequest {
    pub src_gc: GContext,
    pub dst_gc: GContext,
    pub value_mask: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetDashesRequest {
    pub gc: GContext,
    pub dash_offset: u16,
    pub dashes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetClipRectanglesRequest {
    pub ordering: u8,
    pub gc: GContext,
    pub clip_x_origin: i16,
    pub clip_y_origin: i16,
    pub rectangles: Vec<Rectangle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearAreaRequest {
    pub exposures: bool,
    pub window: Window,
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyAreaRequest {
    pub src_drawable: XID,
    pub dst_drawable: XID,
    pub gc: GContext,
    pub src_x: i16,
    pub src_y: i16,
    pub dst_x: i16,
    pub dst_y: i16,
    pub width: u16,
    pub height: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyPlaneRequest {
    pub src_drawable: XID,
    pub dst_drawable: XID,
    pub gc: GContext,
    pub src_x: i16,
    pub src_y: i16,
    pub dst_x: i16,
    pub dst_y: i16,
    pub width: u16,
    pub height: u16,
    pub bit_plane: u32,
}

/// PolyPoint and PolyLine
#[derive(Debug, Clone, PartialEq)]
pub struct PolyPointRequest {
    pub coordinate_mode: CoordMode,
    pub drawable: XID,
    pub gc: GContext,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolySegmentRequest {
    pub drawable: XID,
    pub gc: GContext,
    pub segments: Vec<Segment>,
}

/// PolyRectangle and PolyFillRectangle
#[derive(Debug, Clone, PartialEq)]
pub struct PolyRectangleRequest {
    pub drawable: XID,
    pub gc: GContext,
    pub rectangles: Vec<Rectangle>,
}

/// PolyArc and PolyFillArc
#[derive(Debug, Clone, PartialEq)]
pub struct PolyArcRequest {
    pub drawable: XID,
    pub gc: GContext,
    pub arcs: Vec<Arc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FillPolyRequest {
    pub drawable: XID,
    pub gc: GContext,
    pub shape: u8,
    pub coordinate_mode: CoordMode,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PutImageRequest {
    pub format: ImageFormat,
    pub drawable: XID,
    pub gc: GContext,
    pub width: u16,
    pub height: u16,
    pub dst_x: i16,
    pub dst_y: i16,
    pub left_pad: u8,
    pub depth: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetImageRequest {
    pub format: ImageFormat,
    pub drawable: XID,
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub plane_mask: u32,
}

/// PolyText8/16 carry raw text items; ImageText8/16 carry `count` characters
#[derive(Debug, Clone, PartialEq)]
pub struct TextRequest {
    pub drawable: XID,
    pub gc: GContext,
    pub x: i16,
    pub y: i16,
    pub count: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateColormapRequest {
    pub alloc: u8,
    pub mid: Colormap,
    pub window: Window,
    pub visual: VisualID,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyColormapAndFreeRequest {
    pub mid: Colormap,
    pub src_cmap: Colormap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocColorRequest {
    pub cmap: Colormap,
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocNamedColorRequest {
    pub cmap: Colormap,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocColorCellsRequest {
    pub contiguous: bool,
    pub cmap: Colormap,
    pub colors: u16,
    pub planes: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocColorPlanesRequest {
    pub contiguous: bool,
    pub cmap: Colormap,
    pub colors: u16,
    pub reds: u16,
    pub greens: u16,
    pub blues: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeColorsRequest {
    pub cmap: Colormap,
    pub plane_mask: u32,
    pub pixels: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreColorsRequest {
    pub cmap: Colormap,
    pub items: Vec<ColorItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreNamedColorRequest {
    pub flags: u8,
    pub cmap: Colormap,
    pub pixel: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatePictureRequest {
    pub pid: Picture,
    pub drawable: XID,
    pub format: u32,
    pub values: ValueList,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangePictureRequest {
    pub picture: Picture,
    pub values: ValueList,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetPictureClipRectanglesRequest {
    pub picture: Picture,
    pub clip_x_origin: i16,
    pub clip_y_origin: i16,
    pub rectangles: Vec<Rectangle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeRequest {
    pub op: u8,
    pub src: Picture,
    pub mask: Picture,
    pub dst: Picture,
    pub src_x: i16,
    pub src_y: i16,
    pub mask_x: i16,
    pub mask_y: i16,
    pub dst_x: i16,
    pub dst_y: i16,
    pub width: u16,
    pub height: u16,
}

/// RENDER color, 16 bits per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderColor {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
    pub alpha: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FillRectanglesRequest {
    pub op: u8,
    pub dst: Picture,
    pub color: RenderColor,
    pub rectangles: Vec<Rectangle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateSolidFillRequest {
    pub pid: Picture,
    pub color: RenderColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XineramaQueryVersionRequest {
    pub client_major: u8,
    pub client_minor: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetScreenSizeRequest {
    pub window: Window,
    pub screen: u32,
}

/// Request parser
pub struct ProtocolParser {
    byte_order: ByteOrder,
}

impl ProtocolParser {
    pub fn new(byte_order: ByteOrder) -> Self {
        ProtocolParser { byte_order }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Parse one request from the front of `buffer`.
    ///
    /// Returns the request and the number of bytes it occupied.
    pub fn parse_request(&self, buffer: &[u8]) -> X11Result<(Request, usize)> {
        let header = RequestHeader::parse(buffer, self.byte_order)?;
        let request_size = header.size();
        if request_size < 4 || buffer.len() < request_size {
            return Err(X11Error::bad_length().with_request(0, header.opcode, 0));
        }

        let mut reader = RequestReader::new(&buffer[4..request_size], self.byte_order);
        let detail = header.detail;

        log::debug!(
            "Parsing request: opcode={}, detail={}, length={}",
            header.opcode,
            detail,
            header.length
        );

        let result = match header.opcode {
            RENDER_MAJOR_OPCODE => self.parse_render(detail, &mut reader),
            XINERAMA_MAJOR_OPCODE => self.parse_xinerama(detail, &mut reader),
            opcode => match RequestOpcode::from_u8(opcode) {
                Some(op) => self.parse_core(op, detail, &mut reader),
                None => Err(X11Error::bad_request()),
            },
        };

        let minor = if header.opcode >= 128 { detail as u16 } else { 0 };
        let request = result.map_err(|e| e.with_request(0, header.opcode, minor))?;
        Ok((request, request_size))
    }

    fn parse_core(
        &self,
        opcode: RequestOpcode,
        detail: u8,
        r: &mut RequestReader<'_>,
    ) -> X11Result<Request> {
        use RequestOpcode as Op;

        let request = match opcode {
            Op::CreateWindow => {
                let wid = r.read_window()?;
                let parent = r.read_window()?;
                let x = r.read_i16()?;
                let y = r.read_i16()?;
                let width = r.read_u16()?;
                let height = r.read_u16()?;
                let border_width = r.read_u16()?;
                let class_value = r.read_u16()?;
                let class = WindowClass::from_u16(class_value)
                    .ok_or_else(|| X11Error::bad_value(class_value as u32))?;
                let visual = VisualID::new(r.read_u32()?);
                let mask = r.read_u32()?;
                Request::CreateWindow(CreateWindowRequest {
                    depth: detail,
                    wid,
                    parent,
                    x,
                    y,
                    width,
                    height,
                    border_width,
                    class,
                    visual,
                    values: self.read_counted_values(r, mask)?,
                })
            }
            Op::ChangeWindowAttributes => {
                let window = r.read_window()?;
                let mask = r.read_u32()?;
                Request::ChangeWindowAttributes(ChangeWindowAttributesRequest {
                    window,
                    values: self.read_counted_values(r, mask)?,
                })
            }
            Op::DestroyWindow => Request::DestroyWindow(self.resource(r)?),
            Op::DestroySubwindows => Request::DestroySubwindows(self.resource(r)?),
            Op::ChangeSaveSet => Request::ChangeSaveSet(ChangeSaveSetRequest {
                mode: detail,
                window: r.read_window()?,
            }),
            Op::ReparentWindow => Request::ReparentWindow(ReparentWindowRequest {
                window: r.read_window()?,
                parent: r.read_window()?,
                x: r.read_i16()?,
                y: r.read_i16()?,
            }),
            Op::MapWindow => Request::MapWindow(self.resource(r)?),
            Op::MapSubwindows => Request::MapSubwindows(self.resource(r)?),
            Op::UnmapWindow => Request::UnmapWindow(self.resource(r)?),
            Op::UnmapSubwindows => Request::UnmapSubwindows(self.resource(r)?),
            Op::ConfigureWindow => {
                let window = r.read_window()?;
                let mask = r.read_u16()? as u32;
                r.skip(2)?;
                Request::ConfigureWindow(ConfigureWindowRequest {
                    window,
                    values: self.read_counted_values(r, mask)?,
                })
            }
            Op::CirculateWindow => Request::CirculateWindow(CirculateWindowRequest {
                direction: detail,
                window: r.read_window()?,
            }),
            Op::GetGeometry => Request::GetGeometry(self.resource(r)?),
            Op::TranslateCoordinates => {
                Request::TranslateCoordinates(TranslateCoordinatesRequest {
                    src_window: r.read_window()?,
                    dst_window: r.read_window()?,
                    src_x: r.read_i16()?,
                    src_y: r.read_i16()?,
                })
            }
            Op::CreatePixmap => Request::CreatePixmap(CreatePixmapRequest {
                depth: detail,
                pid: Pixmap(r.read_xid()?),
                drawable: r.read_xid()?,
                width: r.read_u16()?,
                height: r.read_u16()?,
            }),
            Op::FreePixmap => Request::FreePixmap(self.resource(r)?),
            Op::CreateGC => {
                let cid = r.read_gcontext()?;
                let drawable = r.read_xid()?;
                let mask = r.read_u32()?;
                Request::CreateGC(CreateGCRequest {
                    cid,
                    drawable,
                    values: self.read_counted_values(r, mask)?,
                })
            }
            Op::ChangeGC => {
                let gc = r.read_gcontext()?;
                let mask = r.read_u32()?;
                Request::ChangeGC(ChangeGCRequest {
                    gc,
                    values: self.read_counted_values(r, mask)?,
                })
            }
            Op::CopyGC => Request::CopyGC(CopyGCRequest {
                src_gc: r.read_gcontext()?,
                dst_gc: r.read_gcontext()?,
                value_mask: r.read_u32()?,
            }),
            Op::SetDashes => {
                let gc = r.read_gcontext()?;
                let dash_offset = r.read_u16()?;
                let count = r.read_u16()? as usize;
                Request::SetDashes(SetDashesRequest {
                    gc,
                    dash_offset,
                    dashes: r.read_bytes(count)?.to_vec(),
                })
            }
            Op::SetClipRectangles => {
                let gc = r.read_gcontext()?;
                let clip_x_origin = r.read_i16()?;
                let clip_y_origin = r.read_i16()?;
                Request::SetClipRectangles(SetClipRectanglesRequest {
                    ordering: detail,
                    gc,
                    clip_x_origin,
                    clip_y_origin,
                    rectangles: r.read_list(8, |r| r.read_rectangle())?,
                })
            }
            Op::FreeGC => Request::FreeGC(self.resource(r)?),
            Op::ClearArea => Request::ClearArea(ClearAreaRequest {
                exposures: detail != 0,
                window: r.read_window()?,
                x: r.read_i16()?,
                y: r.read_i16()?,
                width: r.read_u16()?,
                height: r.read_u16()?,
            }),
            Op::CopyArea => Request::CopyArea(CopyAreaRequest {
                src_drawable: r.read_xid()?,
                dst_drawable: r.read_xid()?,
                gc: r.read_gcontext()?,
                src_x: r.read_i16()?,
                src_y: r.read_i16()?,
                dst_x: r.read_i16()?,
                dst_y: r.read_i16()?,
                width: r.read_u16()?,
                height: r.read_u16()?,
            }),
            Op::CopyPlane => Request::CopyPlane(CopyPlaneRequest {
                src_drawable: r.read_xid()?,
                dst_drawable: r.read_xid()?,
                gc: r.read_gcontext()?,
                src_x: r.read_i16()?,
                src_y: r.read_i16()?,
                dst_x: r.read_i16()?,
                dst_y: r.read_i16()?,
                width: r.read_u16()?,
                height: r.read_u16()?,
                bit_plane: r.read_u32()?,
            }),
            Op::PolyPoint => Request::PolyPoint(self.poly_point(detail, r)?),
            Op::PolyLine => Request::PolyLine(self.poly_point(detail, r)?),
            Op::PolySegment => {
                let drawable = r.read_xid()?;
                let gc = r.read_gcontext()?;
                let segments = r.read_list(8, |r| {
                    Ok(Segment {
                        x1: r.read_i16()?,
                        y1: r.read_i16()?,
                        x2: r.read_i16()?,
                        y2: r.read_i16()?,
                    })
                })?;
                Request::PolySegment(PolySegmentRequest {
                    drawable,
                    gc,
                    segments,
                })
            }
            Op::PolyRectangle => Request::PolyRectangle(self.poly_rectangle(r)?),
            Op::PolyArc => Request::PolyArc(self.poly_arc(r)?),
            Op::FillPoly => {
                let drawable = r.read_xid()?;
                let gc = r.read_gcontext()?;
                let shape = r.read_u8()?;
                let mode = r.read_u8()?;
                r.skip(2)?;
                Request::FillPoly(FillPolyRequest {
                    drawable,
                    gc,
                    shape,
                    coordinate_mode: CoordMode::from_u8(mode)
                        .ok_or_else(|| X11Error::bad_value(mode as u32))?,
                    points: r.read_list(4, |r| r.read_point())?,
                })
            }
            Op::PolyFillRectangle => Request::PolyFillRectangle(self.poly_rectangle(r)?),
            Op::PolyFillArc => Request::PolyFillArc(self.poly_arc(r)?),
            Op::PutImage => {
                let format =
                    ImageFormat::from_u8(detail).ok_or_else(|| X11Error::bad_value(detail as u32))?;
                let drawable = r.read_xid()?;
                let gc = r.read_gcontext()?;
                let width = r.read_u16()?;
                let height = r.read_u16()?;
                let dst_x = r.read_i16()?;
                let dst_y = r.read_i16()?;
                let left_pad = r.read_u8()?;
                let depth = r.read_u8()?;
                r.skip(2)?;
                Request::PutImage(PutImageRequest {
                    format,
                    drawable,
                    gc,
                    width,
                    height,
                    dst_x,
                    dst_y,
                    left_pad,
                    depth,
                    data: r.remaining().to_vec(),
                })
            }
            Op::GetImage => {
                // Bitmap parses here and is rejected by the GetImage handler
                let format =
                    ImageFormat::from_u8(detail).ok_or_else(|| X11Error::bad_value(detail as u32))?;
                Request::GetImage(GetImageRequest {
                    format,
                    drawable: r.read_xid()?,
                    x: r.read_i16()?,
                    y: r.read_i16()?,
                    width: r.read_u16()?,
                    height: r.read_u16()?,
                    plane_mask: r.read_u32()?,
                })
            }
            Op::PolyText8 => Request::PolyText8(self.text(0, 0, r)?),
            Op::PolyText16 => Request::PolyText16(self.text(0, 0, r)?),
            Op::ImageText8 => Request::ImageText8(self.text(detail, detail as usize, r)?),
            Op::ImageText16 => {
                Request::ImageText16(self.text(detail, detail as usize * 2, r)?)
            }
            Op::CreateColormap => Request::CreateColormap(CreateColormapRequest {
                alloc: detail,
                mid: r.read_colormap()?,
                window: r.read_window()?,
                visual: VisualID::new(r.read_u32()?),
            }),
            Op::FreeColormap => Request::FreeColormap(self.resource(r)?),
            Op::CopyColormapAndFree => Request::CopyColormapAndFree(CopyColormapAndFreeRequest {
                mid: r.read_colormap()?,
                src_cmap: r.read_colormap()?,
            }),
            Op::InstallColormap => Request::InstallColormap(self.resource(r)?),
            Op::UninstallColormap => Request::UninstallColormap(self.resource(r)?),
            Op::AllocColor => {
                let cmap = r.read_colormap()?;
                let red = r.read_u16()?;
                let green = r.read_u16()?;
                let blue = r.read_u16()?;
                Request::AllocColor(AllocColorRequest {
                    cmap,
                    red,
                    green,
                    blue,
                })
            }
            Op::AllocNamedColor => {
                let cmap = r.read_colormap()?;
                let len = r.read_u16()? as usize;
                r.skip(2)?;
                Request::AllocNamedColor(AllocNamedColorRequest {
                    cmap,
                    name: String::from_utf8_lossy(r.read_bytes(len)?).to_string(),
                })
            }
            Op::AllocColorCells => Request::AllocColorCells(AllocColorCellsRequest {
                contiguous: detail != 0,
                cmap: r.read_colormap()?,
                colors: r.read_u16()?,
                planes: r.read_u16()?,
            }),
            Op::AllocColorPlanes => Request::AllocColorPlanes(AllocColorPlanesRequest {
                contiguous: detail != 0,
                cmap: r.read_colormap()?,
                colors: r.read_u16()?,
                reds: r.read_u16()?,
                greens: r.read_u16()?,
                blues: r.read_u16()?,
            }),
            Op::FreeColors => Request::FreeColors(FreeColorsRequest {
                cmap: r.read_colormap()?,
                plane_mask: r.read_u32()?,
                pixels: r.read_list(4, |r| r.read_u32())?,
            }),
            Op::StoreColors => {
                let cmap = r.read_colormap()?;
                let items = r.read_list(12, |r| {
                    let pixel = r.read_u32()?;
                    let red = r.read_u16()?;
                    let green = r.read_u16()?;
                    let blue = r.read_u16()?;
                    let flags = r.read_u8()?;
                    r.skip(1)?;
                    Ok(ColorItem {
                        pixel,
                        red,
                        green,
                        blue,
                        flags,
                    })
                })?;
                Request::StoreColors(StoreColorsRequest { cmap, items })
            }
            Op::StoreNamedColor => {
                let cmap = r.read_colormap()?;
                let pixel = r.read_u32()?;
                let len = r.read_u16()? as usize;
                r.skip(2)?;
                Request::StoreNamedColor(StoreNamedColorRequest {
                    flags: detail,
                    cmap,
                    pixel,
                    name: String::from_utf8_lossy(r.read_bytes(len)?).to_string(),
                })
            }
            other => {
                log::warn!("Unimplemented request opcode: {}", other.as_str());
                return Err(X11Error::bad_request());
            }
        };

        Ok(request)
    }

    fn parse_render(&self, minor: u8, r: &mut RequestReader<'_>) -> X11Result<Request> {
        let opcode = RenderOpcode::from_u8(minor).ok_or_else(X11Error::bad_request)?;

        let request = match opcode {
            RenderOpcode::CreatePicture => {
                let pid = r.read_picture()?;
                let drawable = r.read_xid()?;
                let format = r.read_u32()?;
                let mask = r.read_u32()?;
                Request::RenderCreatePicture(CreatePictureRequest {
                    pid,
                    drawable,
                    format,
                    values: self.read_counted_values(r, mask)?,
                })
            }
            RenderOpcode::ChangePicture => {
                let picture = r.read_picture()?;
                let mask = r.read_u32()?;
                Request::RenderChangePicture(ChangePictureRequest {
                    picture,
                    values: self.read_counted_values(r, mask)?,
                })
            }
            RenderOpcode::SetPictureClipRectangles => {
                let picture = r.read_picture()?;
                let clip_x_origin = r.read_i16()?;
                let clip_y_origin = r.read_i16()?;
                Request::RenderSetPictureClipRectangles(SetPictureClipRectanglesRequest {
                    picture,
                    clip_x_origin,
                    clip_y_origin,
                    rectangles: r.read_list(8, |r| r.read_rectangle())?,
                })
            }
            RenderOpcode::FreePicture => Request::RenderFreePicture(self.resource(r)?),
            RenderOpcode::Composite => {
                let op = r.read_u8()?;
                r.skip(3)?;
                Request::RenderComposite(CompositeRequest {
                    op,
                    src: r.read_picture()?,
                    mask: r.read_picture()?,
                    dst: r.read_picture()?,
                    src_x: r.read_i16()?,
                    src_y: r.read_i16()?,
                    mask_x: r.read_i16()?,
                    mask_y: r.read_i16()?,
                    dst_x: r.read_i16()?,
                    dst_y: r.read_i16()?,
                    width: r.read_u16()?,
                    height: r.read_u16()?,
                })
            }
            RenderOpcode::FillRectangles => {
                let op = r.read_u8()?;
                r.skip(3)?;
                let dst = r.read_picture()?;
                let color = self.render_color(r)?;
                Request::RenderFillRectangles(FillRectanglesRequest {
                    op,
                    dst,
                    color,
                    rectangles: r.read_list(8, |r| r.read_rectangle())?,
                })
            }
            RenderOpcode::CreateSolidFill => {
                Request::RenderCreateSolidFill(CreateSolidFillRequest {
                    pid: r.read_picture()?,
                    color: self.render_color(r)?,
                })
            }
        };

        Ok(request)
    }

    fn parse_xinerama(&self, minor: u8, r: &mut RequestReader<'_>) -> X11Result<Request> {
        let opcode = XineramaOpcode::from_u8(minor).ok_or_else(X11Error::bad_request)?;

        let request = match opcode {
            XineramaOpcode::QueryVersion => {
                Request::XineramaQueryVersion(XineramaQueryVersionRequest {
                    client_major: r.read_u8()?,
                    client_minor: r.read_u8()?,
                })
            }
            XineramaOpcode::GetState => Request::XineramaGetState(self.resource(r)?),
            XineramaOpcode::GetScreenCount => Request::XineramaGetScreenCount(self.resource(r)?),
            XineramaOpcode::GetScreenSize => {
                Request::XineramaGetScreenSize(GetScreenSizeRequest {
                    window: r.read_window()?,
                    screen: r.read_u32()?,
                })
            }
            XineramaOpcode::IsActive => Request::XineramaIsActive,
            XineramaOpcode::QueryScreens => Request::XineramaQueryScreens,
        };

        Ok(request)
    }

    fn resource(&self, r: &mut RequestReader<'_>) -> X11Result<ResourceRequest> {
        Ok(ResourceRequest::new(r.read_xid()?))
    }

    /// Value lists must carry exactly one value per mask bit
    fn read_counted_values(&self, r: &mut RequestReader<'_>, mask: u32) -> X11Result<ValueList> {
        if r.remaining().len() != mask.count_ones() as usize * 4 {
            return Err(X11Error::bad_length());
        }
        r.read_values(mask)
    }

    fn poly_point(&self, mode: u8, r: &mut RequestReader<'_>) -> X11Result<PolyPointRequest> {
        Ok(PolyPointRequest {
            coordinate_mode: CoordMode::from_u8(mode)
                .ok_or_else(|| X11Error::bad_value(mode as u32))?,
            drawable: r.read_xid()?,
            gc: r.read_gcontext()?,
            points: r.read_list(4, |r| r.read_point())?,
        })
    }

    fn poly_rectangle(&self, r: &mut RequestReader<'_>) -> X11Result<PolyRectangleRequest> {
        Ok(PolyRectangleRequest {
            drawable: r.read_xid()?,
            gc: r.read_gcontext()?,
            rectangles: r.read_list(8, |r| r.read_rectangle())?,
        })
    }

    fn poly_arc(&self, r: &mut RequestReader<'_>) -> X11Result<PolyArcRequest> {
        let drawable = r.read_xid()?;
        let gc = r.read_gcontext()?;
        let arcs = r.read_list(12, |r| {
            Ok(Arc {
                x: r.read_i16()?,
                y: r.read_i16()?,
                width: r.read_u16()?,
                height: r.read_u16()?,
                angle1: r.read_i16()?,
                angle2: r.read_i16()?,
            })
        })?;
        Ok(PolyArcRequest { drawable, gc, arcs })
    }

    fn text(&self, count: u8, len: usize, r: &mut RequestReader<'_>) -> X11Result<TextRequest> {
        let drawable = r.read_xid()?;
        let gc = r.read_gcontext()?;
        let x = r.read_i16()?;
        let y = r.read_i16()?;
        let data = if len > 0 {
            r.read_bytes(len)?.to_vec()
        } else {
            r.remaining().to_vec()
        };
        Ok(TextRequest {
            drawable,
            gc,
            x,
            y,
            count,
            data,
        })
    }

    fn render_color(&self, r: &mut RequestReader<'_>) -> X11Result<RenderColor> {
        Ok(RenderColor {
            red: r.read_u16()?,
            green: r.read_u16()?,
            blue: r.read_u16()?,
            alpha: r.read_u16()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lsb_request(opcode: u8, detail: u8, body: &[u8]) -> Vec<u8> {
        let len = ((body.len() + 4) / 4) as u16;
        let mut buf = vec![opcode, detail];
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(body);
        buf
    }

    #[test]
    fn test_parse_create_window_with_values() {
        let mut body = Vec::new();
        body.extend_from_slice(&0x0020_0001u32.to_le_bytes()); // wid
        body.extend_from_slice(&0x0000_0100u32.to_le_bytes()); // parent
        body.extend_from_slice(&100i16.to_le_bytes());
        body.extend_from_slice(&(-5i16).to_le_bytes());
        body.extend_from_slice(&640u16.to_le_bytes());
        body.extend_from_slice(&480u16.to_le_bytes());
        body.extend_from_slice(&1u16.to_le_bytes()); // border
        body.extend_from_slice(&1u16.to_le_bytes()); // InputOutput
        body.extend_from_slice(&0u32.to_le_bytes()); // visual
        body.extend_from_slice(&(window_attr::BACK_PIXEL | window_attr::EVENT_MASK).to_le_bytes());
        body.extend_from_slice(&0x00ff_0000u32.to_le_bytes());
        body.extend_from_slice(&0x8000u32.to_le_bytes());

        let buf = lsb_request(1, 24, &body);
        let parser = ProtocolParser::new(ByteOrder::LSBFirst);
        let (request, used) = parser.parse_request(&buf).unwrap();
        assert_eq!(used, buf.len());

        match request {
            Request::CreateWindow(req) => {
                assert_eq!(req.wid, Window::new(0x0020_0001));
                assert_eq!(req.y, -5);
                assert_eq!(req.values.get(window_attr::EVENT_MASK), Some(0x8000));
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_value_count_mismatch_is_bad_length() {
        let mut body = Vec::new();
        body.extend_from_slice(&0x0020_0001u32.to_le_bytes());
        body.extend_from_slice(&0b11u32.to_le_bytes()); // two bits, one value
        body.extend_from_slice(&7u32.to_le_bytes());

        let buf = lsb_request(2, 0, &body);
        let err = ProtocolParser::new(ByteOrder::LSBFirst)
            .parse_request(&buf)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Length);
        assert_eq!(err.major_opcode, 2);
    }

    #[test]
    fn test_parse_poly_point_msb() {
        let mut buf = vec![64, 1, 0, 5];
        buf.extend_from_slice(&0x0000_0100u32.to_be_bytes());
        buf.extend_from_slice(&0x0020_0002u32.to_be_bytes());
        buf.extend_from_slice(&10i16.to_be_bytes());
        buf.extend_from_slice(&20i16.to_be_bytes());
        buf.extend_from_slice(&(-1i16).to_be_bytes());
        buf.extend_from_slice(&3i16.to_be_bytes());

        let (request, _) = ProtocolParser::new(ByteOrder::MSBFirst)
            .parse_request(&buf)
            .unwrap();
        match request {
            Request::PolyPoint(req) => {
                assert_eq!(req.coordinate_mode, CoordMode::Previous);
                assert_eq!(req.points, vec![Point::new(10, 20), Point::new(-1, 3)]);
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_parse_xinerama_query_screens() {
        let buf = lsb_request(XINERAMA_MAJOR_OPCODE, 5, &[]);
        let (request, _) = ProtocolParser::new(ByteOrder::LSBFirst)
            .parse_request(&buf)
            .unwrap();
        assert_eq!(request, Request::XineramaQueryScreens);
        assert_eq!(
            request.opcode(),
            Opcode::Xinerama(XineramaOpcode::QueryScreens)
        );
    }

    #[test]
    fn test_unknown_render_minor_is_bad_request() {
        let buf = lsb_request(RENDER_MAJOR_OPCODE, 99, &[]);
        let err = ProtocolParser::new(ByteOrder::LSBFirst)
            .parse_request(&buf)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Request);
        assert_eq!(err.minor_opcode, 99);
    }
}
