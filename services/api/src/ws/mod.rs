//! WebSocket Session Management
//!
//! Streams tutor replies to the browser as they are generated. It is
//! structured into submodules for clarity:
//!
//! - `protocol`: Defines the JSON-based message format for client-server communication.
//! - `session`: Manages the WebSocket connection lifecycle, from handshake to termination.

pub mod protocol;
pub mod session;

pub use session::ws_handler;
