//! Client session management
//!
//! This module provides the Client struct which represents an individual
//! client and the request sequence it has reached.

use crate::protocol::{ByteOrder, ProtocolEncoder, ProtocolParser};
use crate::security::ClientId;

/// A client of the logical screen
#[derive(Debug)]
pub struct Client {
    /// Unique client ID; owner of the composites it creates
    pub client_id: ClientId,

    /// Byte order for this client (from setup request)
    byte_order: ByteOrder,

    /// Sequence number of the last request
    sequence_number: u16,
}

impl Client {
    /// Create a new client session
    pub fn new(client_id: ClientId, byte_order: ByteOrder) -> Self {
        Client {
            client_id,
            byte_order,
            sequence_number: 0,
        }
    }

    /// Get the client's byte order
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Get the current sequence number
    pub fn sequence_number(&self) -> u16 {
        self.sequence_number
    }

    /// Increment the sequence number and return it
    pub fn next_sequence(&mut self) -> u16 {
        self.sequence_number = self.sequence_number.wrapping_add(1);
        self.sequence_number
    }

    pub fn parser(&self) -> ProtocolParser {
        ProtocolParser::new(self.byte_order)
    }

    pub fn encoder(&self) -> ProtocolEncoder {
        ProtocolEncoder::new(self.byte_order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_wraps() {
        let mut client = Client::new(1, ByteOrder::LSBFirst);
        assert_eq!(client.next_sequence(), 1);
        client.sequence_number = u16::MAX;
        assert_eq!(client.next_sequence(), 0);
    }
}
