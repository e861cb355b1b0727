//! X11 reply encoder
//!
//! This module encodes replies and errors to the wire protocol.

use super::*;

/// Reply encoder
pub struct ProtocolEncoder {
    byte_order: ByteOrder,
}

impl ProtocolEncoder {
    pub fn new(byte_order: ByteOrder) -> Self {
        ProtocolEncoder { byte_order }
    }

    // Helper methods for writing with correct byte order
    fn write_u16(&self, value: u16) -> [u8; 2] {
        match self.byte_order {
            ByteOrder::MSBFirst => value.to_be_bytes(),
            ByteOrder::LSBFirst => value.to_le_bytes(),
        }
    }

    fn write_u32(&self, value: u32) -> [u8; 4] {
        match self.byte_order {
            ByteOrder::MSBFirst => value.to_be_bytes(),
            ByteOrder::LSBFirst => value.to_le_bytes(),
        }
    }

    fn write_i16(&self, value: i16) -> [u8; 2] {
        match self.byte_order {
            ByteOrder::MSBFirst => value.to_be_bytes(),
            ByteOrder::LSBFirst => value.to_le_bytes(),
        }
    }

    /// 32-byte reply header with the extra length filled in from `buffer`
    fn header(&self, sequence: u16, detail: u8) -> Vec<u8> {
        let mut buffer = vec![0u8; 32];
        buffer[0] = 1; // Reply
        buffer[1] = detail;
        buffer[2..4].copy_from_slice(&self.write_u16(sequence));
        buffer
    }

    fn finish(&self, mut buffer: Vec<u8>) -> Vec<u8> {
        // Pad to 4-byte boundary
        buffer.resize(padded_len(buffer.len()), 0);
        let extra = ((buffer.len() - 32) / 4) as u32;
        buffer[4..8].copy_from_slice(&self.write_u32(extra));
        buffer
    }

    /// Encode an error packet
    pub fn encode_error(&self, error: &X11Error) -> Vec<u8> {
        let mut buffer = vec![0u8; 32];
        error.encode(&mut buffer, self.byte_order);
        buffer
    }

    /// Encode any reply
    pub fn encode_reply(&self, sequence: u16, reply: &Reply) -> Vec<u8> {
        match reply {
            Reply::GetGeometry(r) => self.encode_get_geometry_reply(sequence, r),
            Reply::TranslateCoordinates(r) => {
                let mut buffer = self.header(sequence, r.same_screen as u8);
                buffer[8..12].copy_from_slice(&self.write_u32(r.child.id().get()));
                buffer[12..14].copy_from_slice(&self.write_i16(r.dst_x));
                buffer[14..16].copy_from_slice(&self.write_i16(r.dst_y));
                self.finish(buffer)
            }
            Reply::GetImage(r) => {
                let mut buffer = self.header(sequence, r.depth);
                buffer[8..12].copy_from_slice(&self.write_u32(r.visual.get()));
                buffer.extend_from_slice(&r.data);
                self.finish(buffer)
            }
            Reply::AllocColor(r) => {
                let mut buffer = self.header(sequence, 0);
                buffer[8..10].copy_from_slice(&self.write_u16(r.red));
                buffer[10..12].copy_from_slice(&self.write_u16(r.green));
                buffer[12..14].copy_from_slice(&self.write_u16(r.blue));
                buffer[16..20].copy_from_slice(&self.write_u32(r.pixel));
                self.finish(buffer)
            }
            Reply::AllocNamedColor(r) => {
                let mut buffer = self.header(sequence, 0);
                buffer[8..12].copy_from_slice(&self.write_u32(r.pixel));
                let (er, eg, eb) = r.exact;
                let (vr, vg, vb) = r.visual;
                for (i, v) in [er, eg, eb, vr, vg, vb].iter().enumerate() {
                    let at = 12 + i * 2;
                    buffer[at..at + 2].copy_from_slice(&self.write_u16(*v));
                }
                self.finish(buffer)
            }
            Reply::AllocColorCells(r) => {
                let mut buffer = self.header(sequence, 0);
                buffer[8..10].copy_from_slice(&self.write_u16(r.pixels.len() as u16));
                buffer[10..12].copy_from_slice(&self.write_u16(r.masks.len() as u16));
                for value in r.pixels.iter().chain(r.masks.iter()) {
                    buffer.extend_from_slice(&self.write_u32(*value));
                }
                self.finish(buffer)
            }
            Reply::AllocColorPlanes(r) => {
                let mut buffer = self.header(sequence, 0);
                buffer[8..10].copy_from_slice(&self.write_u16(r.pixels.len() as u16));
                buffer[12..16].copy_from_slice(&self.write_u32(r.red_mask));
                buffer[16..20].copy_from_slice(&self.write_u32(r.green_mask));
                buffer[20..24].copy_from_slice(&self.write_u32(r.blue_mask));
                for pixel in &r.pixels {
                    buffer.extend_from_slice(&self.write_u32(*pixel));
                }
                self.finish(buffer)
            }
            Reply::XineramaQueryVersion { major, minor } => {
                let mut buffer = self.header(sequence, 0);
                buffer[8..10].copy_from_slice(&self.write_u16(*major));
                buffer[10..12].copy_from_slice(&self.write_u16(*minor));
                self.finish(buffer)
            }
            Reply::XineramaGetState { state, window } => {
                let mut buffer = self.header(sequence, *state);
                buffer[8..12].copy_from_slice(&self.write_u32(window.id().get()));
                self.finish(buffer)
            }
            Reply::XineramaGetScreenCount { count, window } => {
                let mut buffer = self.header(sequence, *count);
                buffer[8..12].copy_from_slice(&self.write_u32(window.id().get()));
                self.finish(buffer)
            }
            Reply::XineramaGetScreenSize(r) => {
                let mut buffer = self.header(sequence, 0);
                buffer[8..12].copy_from_slice(&self.write_u32(r.width));
                buffer[12..16].copy_from_slice(&self.write_u32(r.height));
                buffer[16..20].copy_from_slice(&self.write_u32(r.window.id().get()));
                buffer[20..24].copy_from_slice(&self.write_u32(r.screen));
                self.finish(buffer)
            }
            Reply::XineramaIsActive { state } => {
                let mut buffer = self.header(sequence, 0);
                buffer[8..12].copy_from_slice(&self.write_u32(*state));
                self.finish(buffer)
            }
            Reply::XineramaQueryScreens { screens } => {
                let mut buffer = self.header(sequence, 0);
                buffer[8..12].copy_from_slice(&self.write_u32(screens.len() as u32));
                for screen in screens {
                    buffer.extend_from_slice(&self.write_i16(screen.x));
                    buffer.extend_from_slice(&self.write_i16(screen.y));
                    buffer.extend_from_slice(&self.write_u16(screen.width));
                    buffer.extend_from_slice(&self.write_u16(screen.height));
                }
                self.finish(buffer)
            }
        }
    }

    /// Encode GetGeometry reply
    fn encode_get_geometry_reply(&self, sequence: u16, reply: &GetGeometryReply) -> Vec<u8> {
        let mut buffer = self.header(sequence, reply.depth);

        buffer[8..12].copy_from_slice(&self.write_u32(reply.root.id().get()));
        buffer[12..14].copy_from_slice(&self.write_i16(reply.x));
        buffer[14..16].copy_from_slice(&self.write_i16(reply.y));
        buffer[16..18].copy_from_slice(&self.write_u16(reply.width));
        buffer[18..20].copy_from_slice(&self.write_u16(reply.height));
        buffer[20..22].copy_from_slice(&self.write_u16(reply.border_width));

        self.finish(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_get_geometry_lsb() {
        let encoder = ProtocolEncoder::new(ByteOrder::LSBFirst);
        let reply = Reply::GetGeometry(GetGeometryReply {
            depth: 24,
            root: Window::new(0x100),
            x: -1820,
            y: 10,
            width: 640,
            height: 480,
            border_width: 2,
        });
        let bytes = encoder.encode_reply(9, &reply);
        assert_eq!(bytes.len(), 32);
        assert_eq!(bytes[0], 1);
        assert_eq!(bytes[1], 24);
        assert_eq!(&bytes[2..4], &[9, 0]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
        assert_eq!(&bytes[12..14], &(-1820i16).to_le_bytes());
    }

    #[test]
    fn test_encode_query_screens_msb() {
        let encoder = ProtocolEncoder::new(ByteOrder::MSBFirst);
        let reply = Reply::XineramaQueryScreens {
            screens: vec![
                Rectangle::new(0, 0, 1920, 1080),
                Rectangle::new(1920, 0, 1280, 1024),
            ],
        };
        let bytes = encoder.encode_reply(1, &reply);
        assert_eq!(bytes.len(), 48);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 4]);
        assert_eq!(&bytes[8..12], &[0, 0, 0, 2]);
        assert_eq!(&bytes[40..42], &1920i16.to_be_bytes());
    }

    #[test]
    fn test_get_image_reply_is_padded() {
        let encoder = ProtocolEncoder::new(ByteOrder::LSBFirst);
        let reply = Reply::GetImage(GetImageReply {
            depth: 1,
            visual: VisualID::new(0),
            data: vec![0xff; 5],
        });
        let bytes = encoder.encode_reply(3, &reply);
        assert_eq!(bytes.len(), 40);
        assert_eq!(&bytes[4..8], &[2, 0, 0, 0]);
    }
}
