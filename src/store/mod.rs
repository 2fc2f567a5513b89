//! Ticket persistence — the tabular store boundary.
//!
//! Two logical tables: `PendingTickets` (the work queue, mutable by row
//! identity) and `ProcessedTickets` (append-only log, never mutated). Row
//! identity is positional, so the contract puts the burden on callers:
//! snapshot identities once, defer deletions, delete descending.

pub mod memory;
pub mod workbook;

pub use memory::MemoryStore;
pub use workbook::WorkbookStore;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::ticket::{RowId, Ticket};

/// Worksheet holding the queue of unresolved tickets.
pub const PENDING_SHEET: &str = "PendingTickets";
/// Worksheet holding the append-only processed log.
pub const PROCESSED_SHEET: &str = "ProcessedTickets";

/// CRUD-level row operations with row-identity tracking.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Unresolved pending rows (lacking sentiment or cached reply), each
    /// carrying its row identity. Fresh snapshot on every call — concurrent
    /// external edits are visible on the next call.
    async fn list_pending(&self) -> Result<Vec<Ticket>, StoreError>;

    /// Every occupied pending row, resolved or not, each carrying its row
    /// identity. Send batches snapshot from here: a row with a cached reply,
    /// or one recorded but awaiting a delete retry, must stay reachable.
    async fn snapshot_pending(&self) -> Result<Vec<Ticket>, StoreError>;

    /// The processed log. Rows carry no mutation identity.
    async fn list_processed(&self) -> Result<Vec<Ticket>, StoreError>;

    /// Append a fresh submission to the pending table, analysis columns
    /// empty, in the fixed column order.
    async fn append_pending(&self, ticket: &Ticket) -> Result<(), StoreError>;

    /// In-place update of a pending row's analysis fields.
    /// `StoreError::UpdateMissing` if the row no longer exists.
    async fn update_pending(
        &self,
        row: RowId,
        sentiment: &str,
        issue_type_label: &str,
        reply: &str,
    ) -> Result<(), StoreError>;

    /// Append a resolved copy of `ticket` to the processed log. The row's
    /// timestamp records processing time, matching prior rows.
    async fn append_processed(
        &self,
        ticket: &Ticket,
        sentiment: &str,
        issue_type_label: &str,
        reply: &str,
    ) -> Result<(), StoreError>;

    /// Remove a pending row. `StoreError::DeleteMissing` if already absent
    /// (callers treat that as "already gone, fine").
    async fn delete_pending(&self, row: RowId) -> Result<(), StoreError>;
}
