//! Audit logging

pub mod recorder;

pub use recorder::{AuditEntry, AuditRecorder};
