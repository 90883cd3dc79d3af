//! HTTP Handlers

mod consistency;
mod generation;
mod novel;
mod ping;
mod websocket;

pub use consistency::*;
pub use generation::*;
pub use novel::*;
pub use ping::*;
pub use websocket::*;
