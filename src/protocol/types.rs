//! Core X11 protocol types
//!
//! These types represent the fundamental data types used in the X11 protocol.
//! They are kept minimal and close to the wire protocol for efficiency.

use std::fmt;

/// X11 resource ID - used for windows, pixmaps, graphics contexts, etc.
/// In X11, all objects are identified by 29-bit IDs.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct XID(pub u32);

impl XID {
    pub const NONE: XID = XID(0);

    pub fn new(id: u32) -> Self {
        XID(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for XID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Value-list sentinels that are never resource ids
pub const NONE: u32 = 0;
pub const PARENT_RELATIVE: u32 = 1;
pub const COPY_FROM_PARENT: u32 = 0;

/// Window ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window(pub XID);

impl Window {
    pub const NONE: Window = Window(XID::NONE);

    pub fn new(id: u32) -> Self {
        Window(XID::new(id))
    }

    pub fn id(&self) -> XID {
        self.0
    }
}

/// Pixmap ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pixmap(pub XID);

impl Pixmap {
    pub fn new(id: u32) -> Self {
        Pixmap(XID::new(id))
    }

    pub fn id(&self) -> XID {
        self.0
    }
}

/// Graphics Context ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GContext(pub XID);

impl GContext {
    pub fn new(id: u32) -> Self {
        GContext(XID::new(id))
    }

    pub fn id(&self) -> XID {
        self.0
    }
}

/// Colormap ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Colormap(pub XID);

impl Colormap {
    pub fn new(id: u32) -> Self {
        Colormap(XID::new(id))
    }

    pub fn id(&self) -> XID {
        self.0
    }
}

/// RENDER Picture ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Picture(pub XID);

impl Picture {
    pub const NONE: Picture = Picture(XID::NONE);

    pub fn new(id: u32) -> Self {
        Picture(XID::new(id))
    }

    pub fn id(&self) -> XID {
        self.0
    }
}

/// Visual ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisualID(pub u32);

impl VisualID {
    pub const COPY_FROM_PARENT: VisualID = VisualID(0);

    pub fn new(id: u32) -> Self {
        VisualID(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

/// Point (x, y coordinate)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i16,
    pub y: i16,
}

impl Point {
    pub fn new(x: i16, y: i16) -> Self {
        Point { x, y }
    }
}

/// Rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rectangle {
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
}

impl Rectangle {
    pub fn new(x: i16, y: i16, width: u16, height: u16) -> Self {
        Rectangle {
            x,
            y,
            width,
            height,
        }
    }
}

/// Segment (for drawing line segments)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub x1: i16,
    pub y1: i16,
    pub x2: i16,
    pub y2: i16,
}

/// Arc (for drawing arcs and ellipses)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arc {
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub angle1: i16, // Start angle in 1/64 degrees
    pub angle2: i16, // Arc angle in 1/64 degrees
}

/// One StoreColors entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorItem {
    pub pixel: u32,
    pub red: u16,
    pub green: u16,
    pub blue: u16,
    pub flags: u8,
}

/// Window class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowClass {
    CopyFromParent = 0,
    InputOutput = 1,
    InputOnly = 2,
}

impl WindowClass {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(WindowClass::CopyFromParent),
            1 => Some(WindowClass::InputOutput),
            2 => Some(WindowClass::InputOnly),
            _ => None,
        }
    }
}

/// Point list interpretation for PolyPoint, PolyLine and FillPoly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordMode {
    Origin = 0,
    Previous = 1,
}

impl CoordMode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CoordMode::Origin),
            1 => Some(CoordMode::Previous),
            _ => None,
        }
    }
}

/// Image format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Bitmap = 0,
    XYPixmap = 1,
    ZPixmap = 2,
}

impl ImageFormat {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ImageFormat::Bitmap),
            1 => Some(ImageFormat::XYPixmap),
            2 => Some(ImageFormat::ZPixmap),
            _ => None,
        }
    }
}

/// Byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LSBFirst = 0,
    MSBFirst = 1,
}

impl ByteOrder {
    pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            ByteOrder::LSBFirst
        } else {
            ByteOrder::MSBFirst
        }
    }

    /// Interpret the byte-order byte of a connection setup ('l' or 'B')
    pub fn from_setup_byte(byte: u8) -> Option<Self> {
        match byte {
            b'l' => Some(ByteOrder::LSBFirst),
            b'B' => Some(ByteOrder::MSBFirst),
            _ => None,
        }
    }
}

/// Window attribute value-mask bits (CreateWindow, ChangeWindowAttributes)
pub mod window_attr {
    pub const BACK_PIXMAP: u32 = 1 << 0;
    pub const BACK_PIXEL: u32 = 1 << 1;
    pub const BORDER_PIXMAP: u32 = 1 << 2;
    pub const BORDER_PIXEL: u32 = 1 << 3;
    pub const BIT_GRAVITY: u32 = 1 << 4;
    pub const WIN_GRAVITY: u32 = 1 << 5;
    pub const BACKING_STORE: u32 = 1 << 6;
    pub const BACKING_PLANES: u32 = 1 << 7;
    pub const BACKING_PIXEL: u32 = 1 << 8;
    pub const OVERRIDE_REDIRECT: u32 = 1 << 9;
    pub const SAVE_UNDER: u32 = 1 << 10;
    pub const EVENT_MASK: u32 = 1 << 11;
    pub const DONT_PROPAGATE: u32 = 1 << 12;
    pub const COLORMAP: u32 = 1 << 13;
    pub const CURSOR: u32 = 1 << 14;

    /// Attributes an InputOnly window accepts
    pub const INPUT_ONLY_LEGAL: u32 =
        WIN_GRAVITY | EVENT_MASK | DONT_PROPAGATE | OVERRIDE_REDIRECT | CURSOR;
}

/// ConfigureWindow value-mask bits
pub mod config_window {
    pub const X: u32 = 1 << 0;
    pub const Y: u32 = 1 << 1;
    pub const WIDTH: u32 = 1 << 2;
    pub const HEIGHT: u32 = 1 << 3;
    pub const BORDER_WIDTH: u32 = 1 << 4;
    pub const SIBLING: u32 = 1 << 5;
    pub const STACK_MODE: u32 = 1 << 6;
}

/// GC value-mask bits
pub mod gc_attr {
    pub const FUNCTION: u32 = 1 << 0;
    pub const PLANE_MASK: u32 = 1 << 1;
    pub const FOREGROUND: u32 = 1 << 2;
    pub const BACKGROUND: u32 = 1 << 3;
    pub const LINE_WIDTH: u32 = 1 << 4;
    pub const TILE: u32 = 1 << 10;
    pub const STIPPLE: u32 = 1 << 11;
    pub const CLIP_MASK: u32 = 1 << 19;
    pub const LAST: u32 = 1 << 22;
}

/// RENDER picture attribute bits (CreatePicture, ChangePicture)
pub mod picture_attr {
    pub const REPEAT: u32 = 1 << 0;
    pub const ALPHA_MAP: u32 = 1 << 1;
    pub const ALPHA_X_ORIGIN: u32 = 1 << 2;
    pub const ALPHA_Y_ORIGIN: u32 = 1 << 3;
    pub const CLIP_X_ORIGIN: u32 = 1 << 4;
    pub const CLIP_Y_ORIGIN: u32 = 1 << 5;
    pub const CLIP_MASK: u32 = 1 << 6;
    pub const LAST: u32 = 1 << 12;
}

/// Visual classes
pub mod visual_class {
    pub const STATIC_GRAY: u8 = 0;
    pub const GRAY_SCALE: u8 = 1;
    pub const STATIC_COLOR: u8 = 2;
    pub const PSEUDO_COLOR: u8 = 3;
    pub const TRUE_COLOR: u8 = 4;
    pub const DIRECT_COLOR: u8 = 5;
}

/// Bitmask list as it travels on the wire: one value per set mask bit, in
/// ascending bit order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValueList {
    pub mask: u32,
    pub values: Vec<u32>,
}

impl ValueList {
    pub fn new(mask: u32, values: Vec<u32>) -> Self {
        ValueList { mask, values }
    }

    pub fn empty() -> Self {
        ValueList::default()
    }

    /// One value must be present per set bit
    pub fn is_well_formed(&self) -> bool {
        self.mask.count_ones() as usize == self.values.len()
    }

    /// Slot of `bit` inside `values`, if the bit is set
    pub fn slot(&self, bit: u32) -> Option<usize> {
        if self.mask & bit == 0 {
            return None;
        }
        Some((self.mask & (bit - 1)).count_ones() as usize)
    }

    pub fn get(&self, bit: u32) -> Option<u32> {
        self.slot(bit).and_then(|slot| self.values.get(slot).copied())
    }

    pub fn set(&mut self, bit: u32, value: u32) {
        if let Some(slot) = self.slot(bit) {
            if let Some(v) = self.values.get_mut(slot) {
                *v = value;
            }
        }
    }

    /// Overlay `other` on top of this list
    pub fn merge(&mut self, other: &ValueList) {
        let mask = self.mask | other.mask;
        let values: Vec<u32> = (0..32)
            .map(|shift| 1u32 << shift)
            .filter(|bit| mask & bit != 0)
            .map(|bit| other.get(bit).or_else(|| self.get(bit)).unwrap_or(0))
            .collect();
        *self = ValueList::new(mask, values);
    }

    /// Iterate (bit, value) pairs in wire order
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (0..32)
            .map(|shift| 1u32 << shift)
            .filter(move |bit| self.mask & bit != 0)
            .zip(self.values.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_list_slots() {
        let values = ValueList::new(
            window_attr::BACK_PIXEL | window_attr::EVENT_MASK | window_attr::COLORMAP,
            vec![0xff, 0x8000, 0x20],
        );
        assert!(values.is_well_formed());
        assert_eq!(values.slot(window_attr::BACK_PIXEL), Some(0));
        assert_eq!(values.get(window_attr::COLORMAP), Some(0x20));
        assert_eq!(values.get(window_attr::CURSOR), None);
    }

    #[test]
    fn test_value_list_set_only_touches_present_bits() {
        let mut values = ValueList::new(gc_attr::FOREGROUND | gc_attr::TILE, vec![1, 0x400]);
        values.set(gc_attr::TILE, 0x4000_0001);
        values.set(gc_attr::STIPPLE, 7);
        assert_eq!(values.values, vec![1, 0x4000_0001]);
    }

    #[test]
    fn test_value_list_merge_overrides() {
        let mut values = ValueList::new(picture_attr::REPEAT | picture_attr::CLIP_MASK, vec![1, 9]);
        values.merge(&ValueList::new(
            picture_attr::ALPHA_MAP | picture_attr::CLIP_MASK,
            vec![5, 0],
        ));
        assert_eq!(values.values, vec![1, 5, 0]);
    }

    #[test]
    fn test_value_list_count_mismatch() {
        let values = ValueList::new(0b101, vec![1]);
        assert!(!values.is_well_formed());
    }
}
