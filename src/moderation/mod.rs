//! Content moderation boundary

pub mod backend;
pub mod gateway;
pub mod verdict;

pub use backend::{
    backend_from_source, CommandBackend, HttpBackend, ModerationBackend, ModerationRequest,
    PassthroughBackend, SummaryRequest,
};
pub use gateway::{Moderated, ModerationGateway};
pub use verdict::{parse_verdict, Verdict};
