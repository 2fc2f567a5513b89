//! The central `Ticket` entity and its row identity.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::TicketError;

/// Timestamp format used in the workbook, compatible with prior rows.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column order of both worksheets. Row creation must use exactly this
/// order for compatibility with rows written by earlier versions.
pub const COLUMNS: [&str; 8] = [
    "timestamp",
    "Name",
    "Email",
    "IssueType",
    "Message",
    "Sentiment",
    "IssueType_Label",
    "AutoReply",
];

/// Positional identity of a pending row: its 1-based worksheet row number.
///
/// Row 1 is the header, so data rows start at 2. The identity is only valid
/// against the snapshot it was read from — deleting any lower-numbered row
/// shifts it. Batch deletions therefore run in descending order, after all
/// updates and appends.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RowId(pub u32);

impl RowId {
    /// First data row (row 1 is the header).
    pub const FIRST_DATA_ROW: u32 = 2;

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for RowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A support ticket.
///
/// Lives in the pending worksheet from submission until resolution, then as
/// an append-only copy in the processed worksheet. `issue_type` is what the
/// customer declared on the form; `issue_type_label` is what the classifier
/// derived. The two are kept distinct and never reconciled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    /// Row identity within the pending worksheet. `None` for fresh
    /// submissions and for processed rows (which are never mutated).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<RowId>,
    /// Creation time, set at submission.
    pub timestamp: String,
    pub name: String,
    pub email: String,
    /// Customer-declared category.
    pub issue_type: String,
    /// Free text, immutable after submission. Non-empty by construction.
    pub message: String,
    /// Filled by classification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
    /// Filled by classification. AI-derived, distinct from `issue_type`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_type_label: Option<String>,
    /// Cached once generated; never regenerated for the same send.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_reply: Option<String>,
}

impl Ticket {
    /// Build a fresh submission with empty analysis fields.
    ///
    /// Rejects empty or whitespace-only messages — the one invariant the
    /// form layer must not be able to violate.
    pub fn submission(
        name: &str,
        email: &str,
        issue_type: &str,
        message: &str,
    ) -> std::result::Result<Self, TicketError> {
        if message.trim().is_empty() {
            return Err(TicketError::EmptyMessage);
        }
        Ok(Self {
            row: None,
            timestamp: Utc::now().format(TIMESTAMP_FORMAT).to_string(),
            name: name.to_string(),
            email: email.to_string(),
            issue_type: issue_type.to_string(),
            message: message.to_string(),
            sentiment: None,
            issue_type_label: None,
            auto_reply: None,
        })
    }

    /// A ticket is classified iff both analysis fields are present.
    pub fn is_classified(&self) -> bool {
        self.sentiment.is_some() && self.issue_type_label.is_some()
    }

    /// The store's definition of "unresolved": lacking a sentiment or a
    /// cached reply. These are the rows `list_pending` returns.
    pub fn is_unresolved(&self) -> bool {
        self.sentiment.is_none() || self.auto_reply.is_none()
    }
}

/// Normalize a cell value: empty/whitespace cells become `None`.
pub fn cell_to_opt(value: String) -> Option<String> {
    if value.trim().is_empty() { None } else { Some(value) }
}
