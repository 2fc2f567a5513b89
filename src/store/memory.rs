//! In-memory store with worksheet positional semantics.
//!
//! Mirrors the workbook backend's identity behavior exactly: row N is the
//! N-th worksheet row (header at row 1, data from row 2), and deleting a row
//! shifts every row below it up. Used by tests and local development.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StoreError;
use crate::store::TicketStore;
use crate::ticket::{RowId, TIMESTAMP_FORMAT, Ticket, cell_to_opt};

#[derive(Default)]
struct Tables {
    pending: Vec<Ticket>,
    processed: Vec<Ticket>,
}

/// In-memory `TicketStore`.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        // A poisoned lock still holds consistent table data.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed a pending row directly (test/setup helper).
    pub fn seed_pending(&self, ticket: Ticket) {
        self.lock().pending.push(ticket);
    }

    /// Every pending row, resolved or not, with current positional ids.
    pub fn pending_rows(&self) -> Vec<Ticket> {
        let tables = self.lock();
        tables
            .pending
            .iter()
            .enumerate()
            .map(|(idx, t)| {
                let mut t = t.clone();
                t.row = Some(row_at(idx));
                t
            })
            .collect()
    }

    fn index_of(tables: &Tables, row: RowId) -> Option<usize> {
        let idx = row.as_u32().checked_sub(RowId::FIRST_DATA_ROW)? as usize;
        (idx < tables.pending.len()).then_some(idx)
    }
}

fn row_at(index: usize) -> RowId {
    RowId(index as u32 + RowId::FIRST_DATA_ROW)
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn list_pending(&self) -> Result<Vec<Ticket>, StoreError> {
        let tables = self.lock();
        Ok(tables
            .pending
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_unresolved())
            .map(|(idx, t)| {
                let mut t = t.clone();
                t.row = Some(row_at(idx));
                t
            })
            .collect())
    }

    async fn snapshot_pending(&self) -> Result<Vec<Ticket>, StoreError> {
        Ok(self.pending_rows())
    }

    async fn list_processed(&self) -> Result<Vec<Ticket>, StoreError> {
        Ok(self.lock().processed.clone())
    }

    async fn append_pending(&self, ticket: &Ticket) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let mut ticket = ticket.clone();
        ticket.row = None;
        tables.pending.push(ticket);
        Ok(())
    }

    async fn update_pending(
        &self,
        row: RowId,
        sentiment: &str,
        issue_type_label: &str,
        reply: &str,
    ) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let idx =
            Self::index_of(&tables, row).ok_or(StoreError::UpdateMissing { row })?;
        // Worksheet semantics: writing an empty cell is the same as leaving
        // the field unset.
        let ticket = &mut tables.pending[idx];
        ticket.sentiment = cell_to_opt(sentiment.to_string());
        ticket.issue_type_label = cell_to_opt(issue_type_label.to_string());
        ticket.auto_reply = cell_to_opt(reply.to_string());
        Ok(())
    }

    async fn append_processed(
        &self,
        ticket: &Ticket,
        sentiment: &str,
        issue_type_label: &str,
        reply: &str,
    ) -> Result<(), StoreError> {
        let mut tables = self.lock();
        tables.processed.push(Ticket {
            row: None,
            timestamp: Utc::now().format(TIMESTAMP_FORMAT).to_string(),
            name: ticket.name.clone(),
            email: ticket.email.clone(),
            issue_type: ticket.issue_type.clone(),
            message: ticket.message.clone(),
            sentiment: Some(sentiment.to_string()),
            issue_type_label: Some(issue_type_label.to_string()),
            auto_reply: Some(reply.to_string()),
        });
        Ok(())
    }

    async fn delete_pending(&self, row: RowId) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let idx =
            Self::index_of(&tables, row).ok_or(StoreError::DeleteMissing { row })?;
        tables.pending.remove(idx);
        Ok(())
    }
}
