//! Core functionality for the broadcast relay

pub mod connection;
pub mod hub;
pub mod message;
pub mod rate_limiter;
pub mod registry;
pub mod relay;
pub mod roles;
pub mod validator;

// Re-export main components for convenience
pub use connection::{Connection, ConnectionId};
pub use hub::BroadcastHub;
pub use message::{ClientMessage, InboundMessage, OutboundMessage};
pub use rate_limiter::MessageRateLimiter;
pub use registry::{BroadcastReport, ConnectionRegistry, SharedRegistry};
pub use relay::{Admission, Relay, SharedRelay};
pub use roles::RoleTable;
pub use validator::{MessageValidator, ValidationResult};
