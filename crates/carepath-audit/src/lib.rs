//! carepath-audit
//!
//! Append-only change records for rule versions, and structured audit
//! events emitted through `tracing`.

pub mod error;
pub mod events;
pub mod trail;

pub use crate::error::AuditError;
pub use crate::events::AuditEvent;
