/// X11 protocol implementation
///
/// This module implements the parts of the X11 wire protocol the fanout core
/// handles: types, requests, replies, images and errors.

pub mod types;
pub mod errors;
pub mod requests;
pub mod parser;
pub mod replies;
pub mod encoder;
pub mod image;

pub use types::*;
pub use errors::*;
pub use requests::*;
pub use parser::*;
pub use replies::*;
pub use encoder::*;

/// Padding helper - X11 requires data to be padded to 4-byte boundaries
pub fn pad(n: usize) -> usize {
    (4 - (n % 4)) % 4
}

/// Calculate padded length
pub fn padded_len(n: usize) -> usize {
    n + pad(n)
}
