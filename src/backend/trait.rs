//! Backend trait definition
//!
//! A backend is one physical screen: a single-screen X server that executes
//! ordinary requests against its own resources. The fanout layer owns one
//! backend per screen and never looks inside it beyond this trait.

use crate::protocol::*;

/// Visual description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisualInfo {
    pub visual_id: VisualID,
    pub class: u8,
    pub depth: u8,
    pub bits_per_rgb: u8,
    pub colormap_entries: u16,
    pub red_mask: u32,
    pub green_mask: u32,
    pub blue_mask: u32,
}

/// Screen information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenInfo {
    pub width: u16,
    pub height: u16,
    pub root: XID,
    pub root_depth: u8,
    pub root_visual: VisualID,
    pub default_colormap: XID,
    pub white_pixel: u32,
    pub black_pixel: u32,
    pub visuals: Vec<VisualInfo>,
}

impl ScreenInfo {
    pub fn visual(&self, id: VisualID) -> Option<&VisualInfo> {
        self.visuals.iter().find(|v| v.visual_id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawableKind {
    Window,
    Pixmap,
}

/// Geometry shared by windows and pixmaps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawableInfo {
    pub kind: DrawableKind,
    pub depth: u8,
    pub width: u16,
    pub height: u16,
}

/// A window as seen in its screen's tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    /// `XID::NONE` for the root
    pub parent: XID,
    /// Outer corner relative to the parent's interior
    pub x: i16,
    pub y: i16,
    /// Interior origin in screen coordinates
    pub abs_x: i32,
    pub abs_y: i32,
    pub width: u16,
    pub height: u16,
    pub border_width: u16,
    pub class: WindowClass,
    pub depth: u8,
    pub visual: VisualID,
    pub mapped: bool,
    pub viewable: bool,
    /// Top of the stacking order first
    pub children: Vec<XID>,
}

/// Outcome of one successfully executed request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub reply: Option<Reply>,
    /// Resources that ceased to exist as a result of the request
    pub freed: Vec<XID>,
}

impl Response {
    pub fn done() -> Self {
        Response::default()
    }

    pub fn reply(reply: Reply) -> Self {
        Response {
            reply: Some(reply),
            freed: Vec::new(),
        }
    }

    pub fn freed(freed: Vec<XID>) -> Self {
        Response { reply: None, freed }
    }
}

/// Single-screen request executor
pub trait Backend: Send {
    /// Static description of the screen
    fn screen_info(&self) -> ScreenInfo;

    /// Execute one request whose ids and coordinates are already expressed
    /// in this screen's terms
    fn dispatch(&mut self, request: &Request) -> X11Result<Response>;

    /// Kind and geometry of a window or pixmap
    fn drawable_info(&self, id: XID) -> Option<DrawableInfo>;

    /// Window tree node
    fn window_info(&self, id: XID) -> Option<WindowInfo>;
}
