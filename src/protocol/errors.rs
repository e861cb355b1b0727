//! X11 protocol error codes and error handling

use super::types::*;
use std::fmt;

/// First error code allocated to the RENDER extension
pub const RENDER_FIRST_ERROR: u8 = 142;

/// X11 error codes as defined in the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    Request = 1,
    Value = 2,
    Window = 3,
    Pixmap = 4,
    Atom = 5,
    Cursor = 6,
    Font = 7,
    Match = 8,
    Drawable = 9,
    Access = 10,
    Alloc = 11,
    Colormap = 12,
    GContext = 13,
    IDChoice = 14,
    Name = 15,
    Length = 16,
    Implementation = 17,
    /// RENDER BadPictFormat
    PictFormat = RENDER_FIRST_ERROR,
    /// RENDER BadPicture
    Picture = RENDER_FIRST_ERROR + 1,
}

impl ErrorCode {
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            1 => Some(ErrorCode::Request),
            2 => Some(ErrorCode::Value),
            3 => Some(ErrorCode::Window),
            4 => Some(ErrorCode::Pixmap),
            5 => Some(ErrorCode::Atom),
            6 => Some(ErrorCode::Cursor),
            7 => Some(ErrorCode::Font),
            8 => Some(ErrorCode::Match),
            9 => Some(ErrorCode::Drawable),
            10 => Some(ErrorCode::Access),
            11 => Some(ErrorCode::Alloc),
            12 => Some(ErrorCode::Colormap),
            13 => Some(ErrorCode::GContext),
            14 => Some(ErrorCode::IDChoice),
            15 => Some(ErrorCode::Name),
            16 => Some(ErrorCode::Length),
            17 => Some(ErrorCode::Implementation),
            142 => Some(ErrorCode::PictFormat),
            143 => Some(ErrorCode::Picture),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Request => "Request: bad request code",
            ErrorCode::Value => "Value: integer parameter out of range",
            ErrorCode::Window => "Window: invalid Window parameter",
            ErrorCode::Pixmap => "Pixmap: invalid Pixmap parameter",
            ErrorCode::Atom => "Atom: invalid Atom parameter",
            ErrorCode::Cursor => "Cursor: invalid Cursor parameter",
            ErrorCode::Font => "Font: invalid Font parameter",
            ErrorCode::Match => "Match: parameter mismatch",
            ErrorCode::Drawable => "Drawable: invalid Drawable parameter",
            ErrorCode::Access => "Access: attempt to access private resource",
            ErrorCode::Alloc => "Alloc: insufficient resources",
            ErrorCode::Colormap => "Colormap: invalid Colormap parameter",
            ErrorCode::GContext => "GContext: invalid GC parameter",
            ErrorCode::IDChoice => "IDChoice: invalid resource ID for this connection",
            ErrorCode::Name => "Name: font or color name doesn't exist",
            ErrorCode::Length => "Length: request length incorrect",
            ErrorCode::Implementation => "Implementation: server implementation error",
            ErrorCode::PictFormat => "PictFormat: invalid PictFormat parameter",
            ErrorCode::Picture => "Picture: invalid Picture parameter",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// X11 error packet
///
/// Request procedures build errors without a sequence number or opcode; the
/// dispatcher stamps both with [`X11Error::with_request`] before the error
/// leaves the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X11Error {
    pub code: ErrorCode,
    pub sequence: u16,
    pub bad_value: u32,
    pub minor_opcode: u16,
    pub major_opcode: u8,
}

impl X11Error {
    pub fn new(
        code: ErrorCode,
        sequence: u16,
        bad_value: u32,
        minor_opcode: u16,
        major_opcode: u8,
    ) -> Self {
        X11Error {
            code,
            sequence,
            bad_value,
            minor_opcode,
            major_opcode,
        }
    }

    /// Error of the given code carrying `bad_value`, not yet tied to a request
    pub fn with_value(code: ErrorCode, bad_value: u32) -> Self {
        X11Error::new(code, 0, bad_value, 0, 0)
    }

    /// Tie the error to the request that produced it
    pub fn with_request(mut self, sequence: u16, major_opcode: u8, minor_opcode: u16) -> Self {
        self.sequence = sequence;
        self.major_opcode = major_opcode;
        self.minor_opcode = minor_opcode;
        self
    }

    /// Record the request opcodes, leaving the sequence number alone
    pub fn with_opcodes(mut self, major_opcode: u8, minor_opcode: u16) -> Self {
        self.major_opcode = major_opcode;
        self.minor_opcode = minor_opcode;
        self
    }

    /// Encode error to wire format (32 bytes)
    pub fn encode(&self, buffer: &mut [u8], byte_order: ByteOrder) {
        assert!(buffer.len() >= 32, "Error buffer must be at least 32 bytes");

        let (sequence, bad_value, minor) = match byte_order {
            ByteOrder::LSBFirst => (
                self.sequence.to_le_bytes(),
                self.bad_value.to_le_bytes(),
                self.minor_opcode.to_le_bytes(),
            ),
            ByteOrder::MSBFirst => (
                self.sequence.to_be_bytes(),
                self.bad_value.to_be_bytes(),
                self.minor_opcode.to_be_bytes(),
            ),
        };

        buffer[0] = 0; // Error reply type
        buffer[1] = self.code as u8;
        buffer[2..4].copy_from_slice(&sequence);
        buffer[4..8].copy_from_slice(&bad_value);
        buffer[8..10].copy_from_slice(&minor);
        buffer[10] = self.major_opcode;
        buffer[11..32].fill(0); // Padding
    }
}

impl fmt::Display for X11Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "X11 Error: {} (sequence: {}, value: 0x{:08x}, major: {}, minor: {})",
            self.code, self.sequence, self.bad_value, self.major_opcode, self.minor_opcode
        )
    }
}

impl std::error::Error for X11Error {}

/// Result type for X11 operations
pub type X11Result<T> = Result<T, X11Error>;

/// Helper functions to create common errors
impl X11Error {
    pub fn bad_request() -> Self {
        X11Error::with_value(ErrorCode::Request, 0)
    }

    pub fn bad_value(value: u32) -> Self {
        X11Error::with_value(ErrorCode::Value, value)
    }

    pub fn bad_window(window: XID) -> Self {
        X11Error::with_value(ErrorCode::Window, window.get())
    }

    pub fn bad_pixmap(pixmap: XID) -> Self {
        X11Error::with_value(ErrorCode::Pixmap, pixmap.get())
    }

    pub fn bad_drawable(drawable: XID) -> Self {
        X11Error::with_value(ErrorCode::Drawable, drawable.get())
    }

    pub fn bad_gc(gc: XID) -> Self {
        X11Error::with_value(ErrorCode::GContext, gc.get())
    }

    pub fn bad_colormap(colormap: XID) -> Self {
        X11Error::with_value(ErrorCode::Colormap, colormap.get())
    }

    pub fn bad_picture(picture: XID) -> Self {
        X11Error::with_value(ErrorCode::Picture, picture.get())
    }

    pub fn bad_match(value: u32) -> Self {
        X11Error::with_value(ErrorCode::Match, value)
    }

    pub fn bad_access(value: u32) -> Self {
        X11Error::with_value(ErrorCode::Access, value)
    }

    pub fn bad_alloc() -> Self {
        X11Error::with_value(ErrorCode::Alloc, 0)
    }

    pub fn bad_id_choice(id: XID) -> Self {
        X11Error::with_value(ErrorCode::IDChoice, id.get())
    }

    pub fn bad_name() -> Self {
        X11Error::with_value(ErrorCode::Name, 0)
    }

    pub fn bad_length() -> Self {
        X11Error::with_value(ErrorCode::Length, 0)
    }

    pub fn implementation_error() -> Self {
        X11Error::with_value(ErrorCode::Implementation, 0)
    }
}
