/// X11Panorama - Xinerama request fanout core
///
/// This library presents N physical X11 screens as one logical screen: every
/// client request is resolved against a table of composite resources, replayed
/// on each physical screen with per-screen ids and coordinates, and answered
/// with a single synthesized reply.

pub mod protocol;
pub mod backend;
pub mod resources;
pub mod screens;
pub mod security;
pub mod server;

pub use backend::{Backend, MemoryBackend, ScreenProbe};
pub use protocol::{Colormap, GContext, Picture, Pixmap, Window, XID};
pub use resources::{CompositeResource, CompositeTable, ResourceKind};
pub use screens::{ScreenGeometry, ScreenIndex, ScreenSet};
pub use server::Server;

/// Server version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version of the PANORAMIX / XINERAMA extension
pub const XINERAMA_MAJOR: u16 = 1;
pub const XINERAMA_MINOR: u16 = 1;
