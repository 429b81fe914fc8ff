//! Storage for the audit trail of accepted messages

pub mod audit_log;

pub use audit_log::{AuditRecord, AuditSink, JsonlAuditLog, MemoryAuditSink, SharedAuditSink};
