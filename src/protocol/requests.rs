//! X11 request opcodes and request reading
//!
//! Core opcodes, the minor opcodes of the extensions this server routes
//! (RENDER and XINERAMA), and a byte-order aware reader for request bodies.

use super::errors::*;
use super::types::*;
use byteorder::{BigEndian, ByteOrder as Endian, LittleEndian};
use std::fmt;

/// Major opcode assigned to the RENDER extension
pub const RENDER_MAJOR_OPCODE: u8 = 139;

/// Major opcode assigned to the XINERAMA (PanoramiX) extension
pub const XINERAMA_MAJOR_OPCODE: u8 = 141;

/// X11 request opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RequestOpcode {
    CreateWindow = 1,
    ChangeWindowAttributes = 2,
    GetWindowAttributes = 3,
    DestroyWindow = 4,
    DestroySubwindows = 5,
    ChangeSaveSet = 6,
    ReparentWindow = 7,
    MapWindow = 8,
    MapSubwindows = 9,
    UnmapWindow = 10,
    UnmapSubwindows = 11,
    ConfigureWindow = 12,
    CirculateWindow = 13,
    GetGeometry = 14,
    QueryTree = 15,
    InternAtom = 16,
    GetAtomName = 17,
    ChangeProperty = 18,
    DeleteProperty = 19,
    GetProperty = 20,
    ListProperties = 21,
    SetSelectionOwner = 22,
    GetSelectionOwner = 23,
    ConvertSelection = 24,
    SendEvent = 25,
    GrabPointer = 26,
    UngrabPointer = 27,
    GrabButton = 28,
    UngrabButton = 29,
    ChangeActivePointerGrab = 30,
    GrabKeyboard = 31,
    UngrabKeyboard = 32,
    GrabKey = 33,
    UngrabKey = 34,
    AllowEvents = 35,
    GrabServer = 36,
    UngrabServer = 37,
    QueryPointer = 38,
    GetMotionEvents = 39,
    TranslateCoordinates = 40,
    WarpPointer = 41,
    SetInputFocus = 42,
    GetInputFocus = 43,
    QueryKeymap = 44,
    OpenFont = 45,
    CloseFont = 46,
    QueryFont = 47,
    QueryTextExtents = 48,
    ListFonts = 49,
    ListFontsWithInfo = 50,
    SetFontPath = 51,
    GetFontPath = 52,
    CreatePixmap = 53,
    FreePixmap = 54,
    CreateGC = 55,
    ChangeGC = 56,
    CopyGC = 57,
    SetDashes = 58,
    SetClipRectangles = 59,
    FreeGC = 60,
    ClearArea = 61,
    CopyArea = 62,
    CopyPlane = 63,
    PolyPoint = 64,
    PolyLine = 65,
    PolySegment = 66,
    PolyRectangle = 67,
    PolyArc = 68,
    FillPoly = 69,
    PolyFillRectangle = 70,
    PolyFillArc = 71,
    PutImage = 72,
    GetImage = 73,
    PolyText8 = 74,
    PolyText16 = 75,
    ImageText8 = 76,
    ImageText16 = 77,
    CreateColormap = 78,
    FreeColormap = 79,
    CopyColormapAndFree = 80,
    InstallColormap = 81,
    UninstallColormap = 82,
    ListInstalledColormaps = 83,
    AllocColor = 84,
    AllocNamedColor = 85,
    AllocColorCells = 86,
    AllocColorPlanes = 87,
    FreeColors = 88,
    StoreColors = 89,
    StoreNamedColor = 90,
    QueryColors = 91,
    LookupColor = 92,
    CreateCursor = 93,
    CreateGlyphCursor = 94,
    FreeCursor = 95,
    RecolorCursor = 96,
    QueryBestSize = 97,
    QueryExtension = 98,
    ListExtensions = 99,
    ChangeKeyboardMapping = 100,
    GetKeyboardMapping = 101,
    ChangeKeyboardControl = 102,
    GetKeyboardControl = 103,
    Bell = 104,
    ChangePointerControl = 105,
    GetPointerControl = 106,
    SetScreenSaver = 107,
    GetScreenSaver = 108,
    ChangeHosts = 109,
    ListHosts = 110,
    SetAccessControl = 111,
    SetCloseDownMode = 112,
    KillClient = 113,
    RotateProperties = 114,
    ForceScreenSaver = 115,
    SetPointerMapping = 116,
    GetPointerMapping = 117,
    SetModifierMapping = 118,
    GetModifierMapping = 119,
    NoOperation = 127,
}

impl RequestOpcode {
    pub fn from_u8(opcode: u8) -> Option<Self> {
        match opcode {
            1 => Some(RequestOpcode::CreateWindow),
            2 => Some(RequestOpcode::ChangeWindowAttributes),
            3 => Some(RequestOpcode::GetWindowAttributes),
            4 => Some(RequestOpcode::DestroyWindow),
            5 => Some(RequestOpcode::DestroySubwindows),
            6 => Some(RequestOpcode::ChangeSaveSet),
            7 => Some(RequestOpcode::ReparentWindow),
            8 => Some(RequestOpcode::MapWindow),
            9 => Some(RequestOpcode::MapSubwindows),
            10 => Some(RequestOpcode::UnmapWindow),
            11 => Some(RequestOpcode::UnmapSubwindows),
            12 => Some(RequestOpcode::ConfigureWindow),
            13 => Some(RequestOpcode::CirculateWindow),
            14 => Some(RequestOpcode::GetGeometry),
            15 => Some(RequestOpcode::QueryTree),
            16 => Some(RequestOpcode::InternAtom),
            17 => Some(RequestOpcode::GetAtomName),
            18 => Some(RequestOpcode::ChangeProperty),
            19 => Some(RequestOpcode::DeleteProperty),
            20 => Some(RequestOpcode::GetProperty),
            21 => Some(RequestOpcode::ListProperties),
            22 => Some(RequestOpcode::SetSelectionOwner),
            23 => Some(RequestOpcode::GetSelectionOwner),
            24 => Some(RequestOpcode::ConvertSelection),
            25 => Some(RequestOpcode::SendEvent),
            26 => Some(RequestOpcode::GrabPointer),
            27 => Some(RequestOpcode::UngrabPointer),
            28 => Some(RequestOpcode::GrabButton),
            29 => Some(RequestOpcode::UngrabButton),
            30 => Some(RequestOpcode::ChangeActivePointerGrab),
            31 => Some(RequestOpcode::GrabKeyboard),
            32 => Some(RequestOpcode::UngrabKeyboard),
            33 => Some(RequestOpcode::GrabKey),
            34 => Some(RequestOpcode::UngrabKey),
            35 => Some(RequestOpcode::AllowEvents),
            36 => Some(RequestOpcode::GrabServer),
            37 => Some(RequestOpcode::UngrabServer),
            38 => Some(RequestOpcode::QueryPointer),
            39 => Some(RequestOpcode::GetMotionEvents),
            40 => Some(RequestOpcode::TranslateCoordinates),
            41 => Some(RequestOpcode::WarpPointer),
            42 => Some(RequestOpcode::SetInputFocus),
            43 => Some(RequestOpcode::GetInputFocus),
            44 => Some(RequestOpcode::QueryKeymap),
            45 => Some(RequestOpcode::OpenFont),
            46 => Some(RequestOpcode::CloseFont),
            47 => Some(RequestOpcode::QueryFont),
            48 => Some(RequestOpcode::QueryTextExtents),
            49 => Some(RequestOpcode::ListFonts),
            50 => Some(RequestOpcode::ListFontsWithInfo),
            51 => Some(RequestOpcode::SetFontPath),
            52 => Some(RequestOpcode::GetFontPath),
            53 => Some(RequestOpcode::CreatePixmap),
            54 => Some(RequestOpcode::FreePixmap),
            55 => Some(RequestOpcode::CreateGC),
            56 => Some(RequestOpcode::ChangeGC),
            57 => Some(RequestOpcode::CopyGC),
            58 => Some(RequestOpcode::SetDashes),
            59 => Some(RequestOpcode::SetClipRectangles),
            60 => Some(RequestOpcode::FreeGC),
            61 => Some(RequestOpcode::ClearArea),
            62 => Some(RequestOpcode::CopyArea),
            63 => Some(RequestOpcode::CopyPlane),
            64 => Some(RequestOpcode::PolyPoint),
            65 => Some(RequestOpcode::PolyLine),
            66 => Some(RequestOpcode::PolySegment),
            67 => Some(RequestOpcode::PolyRectangle),
            68 => Some(RequestOpcode::PolyArc),
            69 => Some(RequestOpcode::FillPoly),
            70 => Some(RequestOpcode::PolyFillRectangle),
            71 => Some(RequestOpcode::PolyFillArc),
            72 => Some(RequestOpcode::PutImage),
            73 => Some(RequestOpcode::GetImage),
            74 => Some(RequestOpcode::PolyText8),
            75 => Some(RequestOpcode::PolyText16),
            76 => Some(RequestOpcode::ImageText8),
            77 => Some(RequestOpcode::ImageText16),
            78 => Some(RequestOpcode::CreateColormap),
            79 => Some(RequestOpcode::FreeColormap),
            80 => Some(RequestOpcode::CopyColormapAndFree),
            81 => Some(RequestOpcode::InstallColormap),
            82 => Some(RequestOpcode::UninstallColormap),
            83 => Some(RequestOpcode::ListInstalledColormaps),
            84 => Some(RequestOpcode::AllocColor),
            85 => Some(RequestOpcode::AllocNamedColor),
            86 => Some(RequestOpcode::AllocColorCells),
            87 => Some(RequestOpcode::AllocColorPlanes),
            88 => Some(RequestOpcode::FreeColors),
            89 => Some(RequestOpcode::StoreColors),
            90 => Some(RequestOpcode::StoreNamedColor),
            91 => Some(RequestOpcode::QueryColors),
            92 => Some(RequestOpcode::LookupColor),
            93 => Some(RequestOpcode::CreateCursor),
            94 => Some(RequestOpcode::CreateGlyphCursor),
            95 => Some(RequestOpcode::FreeCursor),
            96 => Some(RequestOpcode::RecolorCursor),
            97 => Some(RequestOpcode::QueryBestSize),
            98 => Some(RequestOpcode::QueryExtension),
            99 => Some(RequestOpcode::ListExtensions),
            100 => Some(RequestOpcode::ChangeKeyboardMapping),
            101 => Some(RequestOpcode::GetKeyboardMapping),
            102 => Some(RequestOpcode::ChangeKeyboardControl),
            103 => Some(RequestOpcode::GetKeyboardControl),
            104 => Some(RequestOpcode::Bell),
            105 => Some(RequestOpcode::ChangePointerControl),
            106 => Some(RequestOpcode::GetPointerControl),
            107 => Some(RequestOpcode::SetScreenSaver),
            108 => Some(RequestOpcode::GetScreenSaver),
            109 => Some(RequestOpcode::ChangeHosts),
            110 => Some(RequestOpcode::ListHosts),
            111 => Some(RequestOpcode::SetAccessControl),
            112 => Some(RequestOpcode::SetCloseDownMode),
            113 => Some(RequestOpcode::KillClient),
            114 => Some(RequestOpcode::RotateProperties),
            115 => Some(RequestOpcode::ForceScreenSaver),
            116 => Some(RequestOpcode::SetPointerMapping),
            117 => Some(RequestOpcode::GetPointerMapping),
            118 => Some(RequestOpcode::SetModifierMapping),
            119 => Some(RequestOpcode::GetModifierMapping),
            127 => Some(RequestOpcode::NoOperation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestOpcode::CreateWindow => "CreateWindow",
            RequestOpcode::ChangeWindowAttributes => "ChangeWindowAttributes",
            RequestOpcode::GetWindowAttributes => "GetWindowAttributes",
            RequestOpcode::DestroyWindow => "DestroyWindow",
            RequestOpcode::DestroySubwindows => "DestroySubwindows",
            RequestOpcode::ChangeSaveSet => "ChangeSaveSet",
            RequestOpcode::ReparentWindow => "ReparentWindow",
            RequestOpcode::MapWindow => "MapWindow",
            RequestOpcode::MapSubwindows => "MapSubwindows",
            RequestOpcode::UnmapWindow => "UnmapWindow",
            RequestOpcode::UnmapSubwindows => "UnmapSubwindows",
            RequestOpcode::ConfigureWindow => "ConfigureWindow",
            RequestOpcode::CirculateWindow => "CirculateWindow",
            RequestOpcode::GetGeometry => "GetGeometry",
            RequestOpcode::QueryTree => "QueryTree",
            RequestOpcode::InternAtom => "InternAtom",
            RequestOpcode::GetAtomName => "GetAtomName",
            RequestOpcode::ChangeProperty => "ChangeProperty",
            RequestOpcode::DeleteProperty => "DeleteProperty",
            RequestOpcode::GetProperty => "GetProperty",
            RequestOpcode::ListProperties => "ListProperties",
            RequestOpcode::SetSelectionOwner => "SetSelectionOwner",
            RequestOpcode::GetSelectionOwner => "GetSelectionOwner",
            RequestOpcode::ConvertSelection => "ConvertSelection",
            RequestOpcode::SendEvent => "SendEvent",
            RequestOpcode::GrabPointer => "GrabPointer",
            RequestOpcode::UngrabPointer => "UngrabPointer",
            RequestOpcode::GrabButton => "GrabButton",
            RequestOpcode::UngrabButton => "UngrabButton",
            RequestOpcode::ChangeActivePointerGrab => "ChangeActivePointerGrab",
            RequestOpcode::GrabKeyboard => "GrabKeyboard",
            RequestOpcode::UngrabKeyboard => "UngrabKeyboard",
            RequestOpcode::GrabKey => "GrabKey",
            RequestOpcode::UngrabKey => "UngrabKey",
            RequestOpcode::AllowEvents => "AllowEvents",
            RequestOpcode::GrabServer => "GrabServer",
            RequestOpcode::UngrabServer => "UngrabServer",
            RequestOpcode::QueryPointer => "QueryPointer",
            RequestOpcode::GetMotionEvents => "GetMotionEvents",
            RequestOpcode::TranslateCoordinates => "TranslateCoordinates",
            RequestOpcode::WarpPointer => "WarpPointer",
            RequestOpcode::SetInputFocus => "SetInputFocus",
            RequestOpcode::GetInputFocus => "GetInputFocus",
            RequestOpcode::QueryKeymap => "QueryKeymap",
            RequestOpcode::OpenFont => "OpenFont",
            RequestOpcode::CloseFont => "CloseFont",
            RequestOpcode::QueryFont => "QueryFont",
            RequestOpcode::QueryTextExtents => "QueryTextExtents",
            RequestOpcode::ListFonts => "ListFonts",
            RequestOpcode::ListFontsWithInfo => "ListFontsWithInfo",
            RequestOpcode::SetFontPath => "SetFontPath",
            RequestOpcode::GetFontPath => "GetFontPath",
            RequestOpcode::CreatePixmap => "CreatePixmap",
            RequestOpcode::FreePixmap => "FreePixmap",
            RequestOpcode::CreateGC => "CreateGC",
            RequestOpcode::ChangeGC => "ChangeGC",
            RequestOpcode::CopyGC => "CopyGC",
            RequestOpcode::SetDashes => "SetDashes",
            RequestOpcode::SetClipRectangles => "SetClipRectangles",
            RequestOpcode::FreeGC => "FreeGC",
            RequestOpcode::ClearArea => "ClearArea",
            RequestOpcode::CopyArea => "CopyArea",
            RequestOpcode::CopyPlane => "CopyPlane",
            RequestOpcode::PolyPoint => "PolyPoint",
            RequestOpcode::PolyLine => "PolyLine",
            RequestOpcode::PolySegment => "PolySegment",
            RequestOpcode::PolyRectangle => "PolyRectangle",
            RequestOpcode::PolyArc => "PolyArc",
            RequestOpcode::FillPoly => "FillPoly",
            RequestOpcode::PolyFillRectangle => "PolyFillRectangle",
            RequestOpcode::PolyFillArc => "PolyFillArc",
            RequestOpcode::PutImage => "PutImage",
            RequestOpcode::GetImage => "GetImage",
            RequestOpcode::PolyText8 => "PolyText8",
            RequestOpcode::PolyText16 => "PolyText16",
            RequestOpcode::ImageText8 => "ImageText8",
            RequestOpcode::ImageText16 => "ImageText16",
            RequestOpcode::CreateColormap => "CreateColormap",
            RequestOpcode::FreeColormap => "FreeColormap",
            RequestOpcode::CopyColormapAndFree => "CopyColormapAndFree",
            RequestOpcode::InstallColormap => "InstallColormap",
            RequestOpcode::UninstallColormap => "UninstallColormap",
            RequestOpcode::ListInstalledColormaps => "ListInstalledColormaps",
            RequestOpcode::AllocColor => "AllocColor",
            RequestOpcode::AllocNamedColor => "AllocNamedColor",
            RequestOpcode::AllocColorCells => "AllocColorCells",
            RequestOpcode::AllocColorPlanes => "AllocColorPlanes",
            RequestOpcode::FreeColors => "FreeColors",
            RequestOpcode::StoreColors => "StoreColors",
            RequestOpcode::StoreNamedColor => "StoreNamedColor",
            RequestOpcode::QueryColors => "QueryColors",
            RequestOpcode::LookupColor => "LookupColor",
            RequestOpcode::CreateCursor => "CreateCursor",
            RequestOpcode::CreateGlyphCursor => "CreateGlyphCursor",
            RequestOpcode::FreeCursor => "FreeCursor",
            RequestOpcode::RecolorCursor => "RecolorCursor",
            RequestOpcode::QueryBestSize => "QueryBestSize",
            RequestOpcode::QueryExtension => "QueryExtension",
            RequestOpcode::ListExtensions => "ListExtensions",
            RequestOpcode::ChangeKeyboardMapping => "ChangeKeyboardMapping",
            RequestOpcode::GetKeyboardMapping => "GetKeyboardMapping",
            RequestOpcode::ChangeKeyboardControl => "ChangeKeyboardControl",
            RequestOpcode::GetKeyboardControl => "GetKeyboardControl",
            RequestOpcode::Bell => "Bell",
            RequestOpcode::ChangePointerControl => "ChangePointerControl",
            RequestOpcode::GetPointerControl => "GetPointerControl",
            RequestOpcode::SetScreenSaver => "SetScreenSaver",
            RequestOpcode::GetScreenSaver => "GetScreenSaver",
            RequestOpcode::ChangeHosts => "ChangeHosts",
            RequestOpcode::ListHosts => "ListHosts",
            RequestOpcode::SetAccessControl => "SetAccessControl",
            RequestOpcode::SetCloseDownMode => "SetCloseDownMode",
            RequestOpcode::KillClient => "KillClient",
            RequestOpcode::RotateProperties => "RotateProperties",
            RequestOpcode::ForceScreenSaver => "ForceScreenSaver",
            RequestOpcode::SetPointerMapping => "SetPointerMapping",
            RequestOpcode::GetPointerMapping => "GetPointerMapping",
            RequestOpcode::SetModifierMapping => "SetModifierMapping",
            RequestOpcode::GetModifierMapping => "GetModifierMapping",
            RequestOpcode::NoOperation => "NoOperation",
        }
    }
}

/// RENDER minor opcodes handled by the fanout layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RenderOpcode {
    CreatePicture = 4,
    ChangePicture = 5,
    SetPictureClipRectangles = 6,
    FreePicture = 7,
    Composite = 8,
    FillRectangles = 26,
    CreateSolidFill = 33,
}

impl RenderOpcode {
    pub fn from_u8(minor: u8) -> Option<Self> {
        match minor {
            4 => Some(RenderOpcode::CreatePicture),
            5 => Some(RenderOpcode::ChangePicture),
            6 => Some(RenderOpcode::SetPictureClipRectangles),
            7 => Some(RenderOpcode::FreePicture),
            8 => Some(RenderOpcode::Composite),
            26 => Some(RenderOpcode::FillRectangles),
            33 => Some(RenderOpcode::CreateSolidFill),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RenderOpcode::CreatePicture => "RenderCreatePicture",
            RenderOpcode::ChangePicture => "RenderChangePicture",
            RenderOpcode::SetPictureClipRectangles => "RenderSetPictureClipRectangles",
            RenderOpcode::FreePicture => "RenderFreePicture",
            RenderOpcode::Composite => "RenderComposite",
            RenderOpcode::FillRectangles => "RenderFillRectangles",
            RenderOpcode::CreateSolidFill => "RenderCreateSolidFill",
        }
    }
}

/// XINERAMA minor opcodes (the PanoramiX requests plus the Xinerama 1.1 pair)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum XineramaOpcode {
    QueryVersion = 0,
    GetState = 1,
    GetScreenCount = 2,
    GetScreenSize = 3,
    IsActive = 4,
    QueryScreens = 5,
}

impl XineramaOpcode {
    pub fn from_u8(minor: u8) -> Option<Self> {
        match minor {
            0 => Some(XineramaOpcode::QueryVersion),
            1 => Some(XineramaOpcode::GetState),
            2 => Some(XineramaOpcode::GetScreenCount),
            3 => Some(XineramaOpcode::GetScreenSize),
            4 => Some(XineramaOpcode::IsActive),
            5 => Some(XineramaOpcode::QueryScreens),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            XineramaOpcode::QueryVersion => "PanoramiXQueryVersion",
            XineramaOpcode::GetState => "PanoramiXGetState",
            XineramaOpcode::GetScreenCount => "PanoramiXGetScreenCount",
            XineramaOpcode::GetScreenSize => "PanoramiXGetScreenSize",
            XineramaOpcode::IsActive => "XineramaIsActive",
            XineramaOpcode::QueryScreens => "XineramaQueryScreens",
        }
    }
}

/// Key of the dispatch table: a core request or an extension minor opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Core(RequestOpcode),
    Render(RenderOpcode),
    Xinerama(XineramaOpcode),
}

impl Opcode {
    pub fn major(&self) -> u8 {
        match self {
            Opcode::Core(op) => *op as u8,
            Opcode::Render(_) => RENDER_MAJOR_OPCODE,
            Opcode::Xinerama(_) => XINERAMA_MAJOR_OPCODE,
        }
    }

    pub fn minor(&self) -> u16 {
        match self {
            Opcode::Core(_) => 0,
            Opcode::Render(op) => *op as u16,
            Opcode::Xinerama(op) => *op as u16,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Opcode::Core(op) => op.as_str(),
            Opcode::Render(op) => op.as_str(),
            Opcode::Xinerama(op) => op.as_str(),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Request header (common to all requests)
#[derive(Debug, Clone)]
pub struct RequestHeader {
    pub opcode: u8,
    pub detail: u8, // Request-specific detail byte (minor opcode for extensions)
    pub length: u16, // Length in 4-byte units
}

impl RequestHeader {
    /// Parse request header from buffer
    pub fn parse(buffer: &[u8], byte_order: ByteOrder) -> Result<Self, X11Error> {
        if buffer.len() < 4 {
            return Err(X11Error::bad_length());
        }

        Ok(RequestHeader {
            opcode: buffer[0],
            detail: buffer[1],
            length: read_u16(&buffer[2..4], byte_order),
        })
    }

    /// Get total request size in bytes
    pub fn size(&self) -> usize {
        (self.length as usize) * 4
    }
}

pub(crate) fn read_u16(bytes: &[u8], byte_order: ByteOrder) -> u16 {
    match byte_order {
        ByteOrder::MSBFirst => BigEndian::read_u16(bytes),
        ByteOrder::LSBFirst => LittleEndian::read_u16(bytes),
    }
}

pub(crate) fn read_u32(bytes: &[u8], byte_order: ByteOrder) -> u32 {
    match byte_order {
        ByteOrder::MSBFirst => BigEndian::read_u32(bytes),
        ByteOrder::LSBFirst => LittleEndian::read_u32(bytes),
    }
}

/// Helper to read values from a request body
///
/// Every read is bounds checked; running off the end of the body is a
/// `BadLength` error rather than a panic.
pub struct RequestReader<'a> {
    buffer: &'a [u8],
    offset: usize,
    byte_order: ByteOrder,
}

impl<'a> RequestReader<'a> {
    pub fn new(buffer: &'a [u8], byte_order: ByteOrder) -> Self {
        RequestReader {
            buffer,
            offset: 0,
            byte_order,
        }
    }

    fn take(&mut self, n: usize) -> X11Result<&'a [u8]> {
        let end = self.offset.checked_add(n).ok_or_else(X11Error::bad_length)?;
        let slice = self
            .buffer
            .get(self.offset..end)
            .ok_or_else(X11Error::bad_length)?;
        self.offset = end;
        Ok(slice)
    }

    pub fn skip(&mut self, n: usize) -> X11Result<()> {
        self.take(n).map(|_| ())
    }

    pub fn read_u8(&mut self) -> X11Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> X11Result<u16> {
        let bytes = self.take(2)?;
        Ok(read_u16(bytes, self.byte_order))
    }

    pub fn read_i16(&mut self) -> X11Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> X11Result<u32> {
        let bytes = self.take(4)?;
        Ok(read_u32(bytes, self.byte_order))
    }

    pub fn read_i32(&mut self) -> X11Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_xid(&mut self) -> X11Result<XID> {
        Ok(XID(self.read_u32()?))
    }

    pub fn read_window(&mut self) -> X11Result<Window> {
        Ok(Window(self.read_xid()?))
    }

    pub fn read_gcontext(&mut self) -> X11Result<GContext> {
        Ok(GContext(self.read_xid()?))
    }

    pub fn read_colormap(&mut self) -> X11Result<Colormap> {
        Ok(Colormap(self.read_xid()?))
    }

    pub fn read_picture(&mut self) -> X11Result<Picture> {
        Ok(Picture(self.read_xid()?))
    }

    pub fn read_bytes(&mut self, len: usize) -> X11Result<&'a [u8]> {
        self.take(len)
    }

    /// Read a value list whose mask has already been consumed
    pub fn read_values(&mut self, mask: u32) -> X11Result<ValueList> {
        let count = mask.count_ones() as usize;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.read_u32()?);
        }
        Ok(ValueList::new(mask, values))
    }

    pub fn read_point(&mut self) -> X11Result<Point> {
        Ok(Point::new(self.read_i16()?, self.read_i16()?))
    }

    pub fn read_rectangle(&mut self) -> X11Result<Rectangle> {
        Ok(Rectangle::new(
            self.read_i16()?,
            self.read_i16()?,
            self.read_u16()?,
            self.read_u16()?,
        ))
    }

    /// Read fixed-size items until the body is exhausted
    pub fn read_list<T>(
        &mut self,
        item_size: usize,
        mut read: impl FnMut(&mut Self) -> X11Result<T>,
    ) -> X11Result<Vec<T>> {
        let count = self.remaining().len() / item_size;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(read(self)?);
        }
        Ok(items)
    }

    pub fn remaining(&self) -> &'a [u8] {
        self.buffer.get(self.offset..).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_respects_byte_order() {
        let data = [0x12, 0x34, 0x56, 0x78];
        let mut lsb = RequestReader::new(&data, ByteOrder::LSBFirst);
        let mut msb = RequestReader::new(&data, ByteOrder::MSBFirst);
        assert_eq!(lsb.read_u32().unwrap(), 0x7856_3412);
        assert_eq!(msb.read_u32().unwrap(), 0x1234_5678);
    }

    #[test]
    fn test_reader_short_body_is_bad_length() {
        let data = [1, 2, 3];
        let mut reader = RequestReader::new(&data, ByteOrder::LSBFirst);
        let err = reader.read_u32().unwrap_err();
        assert_eq!(err.code, ErrorCode::Length);
    }

    #[test]
    fn test_opcode_majors() {
        assert_eq!(Opcode::Core(RequestOpcode::CopyArea).major(), 62);
        assert_eq!(Opcode::Render(RenderOpcode::Composite).major(), 139);
        assert_eq!(Opcode::Xinerama(XineramaOpcode::QueryScreens).minor(), 5);
        assert_eq!(RequestOpcode::from_u8(90), Some(RequestOpcode::StoreNamedColor));
    }
}
