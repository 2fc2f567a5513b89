//! The ticket lifecycle — the core state machine.
//!
//! Per-ticket states: `New → Classified → Replied → Sent → Recorded →
//! Resolved`. The engine owns the invariant that a ticket is counted as
//! resolved exactly once, and the ordering discipline (update pending,
//! append processed, delete pending — deletions deferred and descending)
//! that keeps the worst partial-failure outcome at "duplicated", never
//! "lost".

pub mod engine;
pub mod types;

pub use engine::{DEFAULT_MAIL_SUBJECT, TicketLifecycle};
pub use types::{BatchReport, ResolutionStatus, ResolvedTicket, SendOutcome};
