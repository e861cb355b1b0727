//! X11 replies produced by the handled requests

use super::types::*;

/// One reply to a request that has one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    GetGeometry(GetGeometryReply),
    TranslateCoordinates(TranslateCoordinatesReply),
    GetImage(GetImageReply),
    AllocColor(AllocColorReply),
    AllocNamedColor(AllocNamedColorReply),
    AllocColorCells(AllocColorCellsReply),
    AllocColorPlanes(AllocColorPlanesReply),
    XineramaQueryVersion { major: u16, minor: u16 },
    XineramaGetState { state: u8, window: Window },
    XineramaGetScreenCount { count: u8, window: Window },
    XineramaGetScreenSize(GetScreenSizeReply),
    XineramaIsActive { state: u32 },
    XineramaQueryScreens { screens: Vec<Rectangle> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetGeometryReply {
    pub depth: u8,
    pub root: Window,
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub border_width: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslateCoordinatesReply {
    pub same_screen: bool,
    pub child: Window,
    pub dst_x: i16,
    pub dst_y: i16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetImageReply {
    pub depth: u8,
    pub visual: VisualID,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocColorReply {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
    pub pixel: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocNamedColorReply {
    pub pixel: u32,
    pub exact: (u16, u16, u16),
    pub visual: (u16, u16, u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocColorCellsReply {
    pub pixels: Vec<u32>,
    pub masks: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocColorPlanesReply {
    pub pixels: Vec<u32>,
    pub red_mask: u32,
    pub green_mask: u32,
    pub blue_mask: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetScreenSizeReply {
    pub width: u32,
    pub height: u32,
    pub window: Window,
    pub screen: u32,
}
