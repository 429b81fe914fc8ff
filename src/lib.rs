//! Shout Relay - a moderated real-time broadcast relay
//!
//! Clients connect over WebSocket and send short chat messages. Each message
//! is validated, rate limited per address, passed through a moderation
//! backend and then broadcast to every connected client in a single order.

pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod handlers;
pub mod moderation;
pub mod storage;

// Re-export main components
pub use config::*;
pub use constants::*;
