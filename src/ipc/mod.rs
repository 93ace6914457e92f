//! Dispatcher ↔ worker messaging.
//!
//! # Data Flow
//! ```text
//! Dispatcher                                   Worker
//!   RequestEnvelope::to_line ──stdin/pipe──▶  RequestEnvelope::from_line
//!   waiters.rs (register by correlationId)       │ resolve rule + upstream
//!                                                 ▼
//!   ReplyEnvelope::from_line ◀─stdout/pipe──  ReplyEnvelope::to_line
//!   waiters.rs (resolve by correlationId)
//! ```
//!
//! # Design Decisions
//! - JSON lines: one envelope per line, UTF-8
//! - Every envelope carries a correlation id; replies are never matched by
//!   arrival order
//! - Malformed replies keep their correlation id when readable

pub mod protocol;
pub mod transport;
pub mod waiters;

pub use protocol::{EnvelopeError, HeaderField, HeaderFields, ReplyEnvelope, RequestEnvelope};
pub use waiters::{Outcome, PendingReply, WaiterRegistry, WorkerId};
