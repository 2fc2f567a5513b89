//! Workbook store — a local `.xlsx` document with the two ticket worksheets.
//!
//! Every operation is read-modify-write against the file, which is what
//! gives `list_pending` its fresh-snapshot semantics: edits made by external
//! actors between calls are picked up on the next call. An async mutex
//! serializes operations within this process; the workbook itself offers no
//! cross-process locking or multi-row atomicity — the lifecycle's ordering
//! discipline is the only protection.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use umya_spreadsheet::{Spreadsheet, Worksheet};

use crate::error::StoreError;
use crate::store::{PENDING_SHEET, PROCESSED_SHEET, TicketStore};
use crate::ticket::{COLUMNS, RowId, Ticket, cell_to_opt};

/// `TicketStore` backed by an xlsx workbook on disk.
pub struct WorkbookStore {
    path: PathBuf,
    io_lock: tokio::sync::Mutex<()>,
}

impl WorkbookStore {
    /// Open (or lazily create on first write) the workbook at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io_lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn with_workbook<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Spreadsheet) -> Result<(T, bool), StoreError> + Send + 'static,
    {
        let _guard = self.io_lock.lock().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let mut book = load_or_create(&path)?;
            let (out, dirty) = op(&mut book)?;
            if dirty {
                save(&book, &path)?;
            }
            Ok(out)
        })
        .await
        .map_err(|e| StoreError::Read {
            table: "workbook".to_string(),
            reason: format!("blocking task failed: {e}"),
        })?
    }
}

#[async_trait]
impl TicketStore for WorkbookStore {
    async fn list_pending(&self) -> Result<Vec<Ticket>, StoreError> {
        self.with_workbook(|book| {
            let ws = sheet_mut(book, PENDING_SHEET)?;
            let tickets = read_rows(ws)
                .into_iter()
                .filter(|t| t.is_unresolved())
                .collect();
            Ok((tickets, false))
        })
        .await
    }

    async fn snapshot_pending(&self) -> Result<Vec<Ticket>, StoreError> {
        self.with_workbook(|book| {
            let ws = sheet_mut(book, PENDING_SHEET)?;
            Ok((read_rows(ws), false))
        })
        .await
    }

    async fn list_processed(&self) -> Result<Vec<Ticket>, StoreError> {
        self.with_workbook(|book| {
            let ws = sheet_mut(book, PROCESSED_SHEET)?;
            let mut tickets = read_rows(ws);
            for t in &mut tickets {
                t.row = None; // processed rows carry no mutation identity
            }
            Ok((tickets, false))
        })
        .await
    }

    async fn append_pending(&self, ticket: &Ticket) -> Result<(), StoreError> {
        let ticket = ticket.clone();
        self.with_workbook(move |book| {
            let ws = sheet_mut(book, PENDING_SHEET)?;
            let row = ws.get_highest_row() + 1;
            write_row(
                ws,
                row,
                &[
                    &ticket.timestamp,
                    &ticket.name,
                    &ticket.email,
                    &ticket.issue_type,
                    &ticket.message,
                    ticket.sentiment.as_deref().unwrap_or(""),
                    ticket.issue_type_label.as_deref().unwrap_or(""),
                    ticket.auto_reply.as_deref().unwrap_or(""),
                ],
            );
            Ok(((), true))
        })
        .await
    }

    async fn update_pending(
        &self,
        row: RowId,
        sentiment: &str,
        issue_type_label: &str,
        reply: &str,
    ) -> Result<(), StoreError> {
        let sentiment = sentiment.to_string();
        let label = issue_type_label.to_string();
        let reply = reply.to_string();
        self.with_workbook(move |book| {
            let ws = sheet_mut(book, PENDING_SHEET)?;
            if !row_occupied(ws, row.as_u32()) {
                return Err(StoreError::UpdateMissing { row });
            }
            ws.get_cell_mut((6, row.as_u32())).set_value_string(sentiment);
            ws.get_cell_mut((7, row.as_u32())).set_value_string(label);
            ws.get_cell_mut((8, row.as_u32())).set_value_string(reply);
            Ok(((), true))
        })
        .await
    }

    async fn append_processed(
        &self,
        ticket: &Ticket,
        sentiment: &str,
        issue_type_label: &str,
        reply: &str,
    ) -> Result<(), StoreError> {
        let ticket = ticket.clone();
        let sentiment = sentiment.to_string();
        let label = issue_type_label.to_string();
        let reply = reply.to_string();
        self.with_workbook(move |book| {
            let ws = sheet_mut(book, PROCESSED_SHEET)?;
            let row = ws.get_highest_row() + 1;
            let timestamp = chrono::Utc::now()
                .format(crate::ticket::TIMESTAMP_FORMAT)
                .to_string();
            write_row(
                ws,
                row,
                &[
                    &timestamp,
                    &ticket.name,
                    &ticket.email,
                    &ticket.issue_type,
                    &ticket.message,
                    &sentiment,
                    &label,
                    &reply,
                ],
            );
            Ok(((), true))
        })
        .await
    }

    async fn delete_pending(&self, row: RowId) -> Result<(), StoreError> {
        self.with_workbook(move |book| {
            let ws = sheet_mut(book, PENDING_SHEET)?;
            if !row_occupied(ws, row.as_u32()) {
                return Err(StoreError::DeleteMissing { row });
            }
            ws.remove_row(&row.as_u32(), &1);
            Ok(((), true))
        })
        .await
    }
}

// ── Workbook plumbing ───────────────────────────────────────────────

fn load_or_create(path: &Path) -> Result<Spreadsheet, StoreError> {
    if path.exists() {
        return umya_spreadsheet::reader::xlsx::read(path).map_err(|e| StoreError::Read {
            table: "workbook".to_string(),
            reason: format!("failed to parse {}: {e}", path.display()),
        });
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut book = umya_spreadsheet::new_file();
    let ws = book.get_sheet_mut(&0).ok_or_else(|| StoreError::Read {
        table: PENDING_SHEET.to_string(),
        reason: "fresh workbook has no first sheet".to_string(),
    })?;
    ws.set_name(PENDING_SHEET);
    write_header(ws);
    Ok(book)
}

fn save(book: &Spreadsheet, path: &Path) -> Result<(), StoreError> {
    umya_spreadsheet::writer::xlsx::write(book, path).map_err(|e| StoreError::Read {
        table: "workbook".to_string(),
        reason: format!("failed to write {}: {e}", path.display()),
    })
}

/// Get a worksheet, creating it with headers when absent (the original
/// store auto-creates both sheets on first touch).
fn sheet_mut<'a>(book: &'a mut Spreadsheet, name: &str) -> Result<&'a mut Worksheet, StoreError> {
    if book.get_sheet_by_name(name).is_none() {
        let ws = book.new_sheet(name).map_err(|e| StoreError::Read {
            table: name.to_string(),
            reason: format!("failed to create worksheet: {e}"),
        })?;
        write_header(ws);
    }
    book.get_sheet_by_name_mut(name).ok_or_else(|| StoreError::Read {
        table: name.to_string(),
        reason: "worksheet vanished after creation".to_string(),
    })
}

fn write_header(ws: &mut Worksheet) {
    for (idx, column) in COLUMNS.iter().enumerate() {
        ws.get_cell_mut((idx as u32 + 1, 1)).set_value_string(*column);
    }
}

fn write_row(ws: &mut Worksheet, row: u32, values: &[&str; 8]) {
    for (idx, value) in values.iter().enumerate() {
        ws.get_cell_mut((idx as u32 + 1, row)).set_value_string(*value);
    }
}

fn cell_text(ws: &Worksheet, col: u32, row: u32) -> String {
    ws.get_cell((col, row))
        .map(|c| c.get_value().to_string())
        .unwrap_or_default()
}

/// A row counts as occupied while its message cell is non-empty.
fn row_occupied(ws: &Worksheet, row: u32) -> bool {
    row >= RowId::FIRST_DATA_ROW
        && row <= ws.get_highest_row()
        && !cell_text(ws, 5, row).trim().is_empty()
}

fn read_rows(ws: &Worksheet) -> Vec<Ticket> {
    let highest = ws.get_highest_row();
    let mut tickets = Vec::new();
    for row in RowId::FIRST_DATA_ROW..=highest {
        let message = cell_text(ws, 5, row);
        if message.trim().is_empty() {
            continue; // blank or malformed row
        }
        tickets.push(Ticket {
            row: Some(RowId(row)),
            timestamp: cell_text(ws, 1, row),
            name: cell_text(ws, 2, row),
            email: cell_text(ws, 3, row),
            issue_type: cell_text(ws, 4, row),
            message,
            sentiment: cell_to_opt(cell_text(ws, 6, row)),
            issue_type_label: cell_to_opt(cell_text(ws, 7, row)),
            auto_reply: cell_to_opt(cell_text(ws, 8, row)),
        });
    }
    tickets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, WorkbookStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkbookStore::new(dir.path().join("SupportTickets.xlsx"));
        (dir, store)
    }

    fn ticket(name: &str, message: &str) -> Ticket {
        Ticket::submission(name, &format!("{name}@example.com"), "Umum", message).unwrap()
    }

    #[tokio::test]
    async fn workbook_created_with_headers_on_first_write() {
        let (dir, store) = temp_store();
        store.append_pending(&ticket("a", "one")).await.unwrap();

        let book =
            umya_spreadsheet::reader::xlsx::read(dir.path().join("SupportTickets.xlsx")).unwrap();
        let ws = book.get_sheet_by_name(PENDING_SHEET).unwrap();
        for (idx, column) in COLUMNS.iter().enumerate() {
            assert_eq!(
                ws.get_cell((idx as u32 + 1, 1)).unwrap().get_value(),
                *column
            );
        }
    }

    #[tokio::test]
    async fn append_then_list_roundtrip() {
        let (_dir, store) = temp_store();
        store.append_pending(&ticket("Andi", "Tagihan saya salah")).await.unwrap();
        store.append_pending(&ticket("Budi", "Tidak bisa login")).await.unwrap();

        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].row, Some(RowId(2)));
        assert_eq!(pending[0].name, "Andi");
        assert_eq!(pending[1].row, Some(RowId(3)));
        assert_eq!(pending[1].message, "Tidak bisa login");
    }

    #[tokio::test]
    async fn update_marks_row_resolved_and_hides_it_from_pending() {
        let (_dir, store) = temp_store();
        store.append_pending(&ticket("Andi", "halo")).await.unwrap();

        store
            .update_pending(RowId(2), "Netral", "Umum", "Halo Andi")
            .await
            .unwrap();

        // Fully analyzed rows drop out of the unresolved snapshot.
        assert!(store.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn snapshot_keeps_resolved_rows_selectable() {
        let (_dir, store) = temp_store();
        store.append_pending(&ticket("Andi", "halo")).await.unwrap();
        store
            .update_pending(RowId(2), "Netral", "Umum", "Halo Andi")
            .await
            .unwrap();

        assert!(store.list_pending().await.unwrap().is_empty());
        let snapshot = store.snapshot_pending().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].row, Some(RowId(2)));
        assert_eq!(snapshot[0].auto_reply.as_deref(), Some("Halo Andi"));
    }

    #[tokio::test]
    async fn delete_shifts_following_rows_up() {
        let (_dir, store) = temp_store();
        store.append_pending(&ticket("a", "one")).await.unwrap();
        store.append_pending(&ticket("b", "two")).await.unwrap();
        store.append_pending(&ticket("c", "three")).await.unwrap();

        store.delete_pending(RowId(2)).await.unwrap();

        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].name, "b");
        assert_eq!(pending[0].row, Some(RowId(2)));
        assert_eq!(pending[1].name, "c");
        assert_eq!(pending[1].row, Some(RowId(3)));
    }

    #[tokio::test]
    async fn delete_of_absent_row_is_already_gone() {
        let (_dir, store) = temp_store();
        store.append_pending(&ticket("a", "one")).await.unwrap();

        let err = store.delete_pending(RowId(7)).await.unwrap_err();
        assert!(err.is_already_gone());
    }

    #[tokio::test]
    async fn processed_log_appends_with_processing_timestamp() {
        let (_dir, store) = temp_store();
        let t = ticket("Andi", "Tagihan saya salah");
        store
            .append_processed(&t, "Negatif", "Tagihan", "Halo Andi")
            .await
            .unwrap();

        let processed = store.list_processed().await.unwrap();
        assert_eq!(processed.len(), 1);
        assert_eq!(processed[0].name, "Andi");
        assert_eq!(processed[0].sentiment.as_deref(), Some("Negatif"));
        assert!(processed[0].row.is_none());
        assert!(!processed[0].timestamp.is_empty());
    }
}
