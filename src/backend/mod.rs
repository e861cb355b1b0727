/// Backend implementations
///
/// This module contains the backend trait through which the fanout layer
/// drives one physical screen, and the in-memory screen model.

mod r#trait;
pub use r#trait::*;

pub mod colors;
pub mod memory;

pub use memory::{MemoryBackend, ScreenProbe};
