//! Result types for lifecycle operations.

use serde::{Deserialize, Serialize};

use crate::mail::{MailOutcome, MailStatus};
use crate::ticket::RowId;

/// Terminal record state of one ticket after a send batch.
///
/// The record step is a saga over a store with no transaction primitive, so
/// partial failure is a named state rather than a crash: a ticket recorded
/// in `processed` whose pending delete failed sits in
/// `RecordedAwaitingDelete` — duplicated across both tables and safe to
/// retry the delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResolutionStatus {
    /// Recorded in `processed` and removed from `pending`.
    Resolved,
    /// Recorded in `processed`; the pending delete failed. The ticket is
    /// duplicated, not lost — retrying the delete is safe.
    RecordedAwaitingDelete { reason: String },
    /// Never recorded: the append to `processed` failed (or the row was not
    /// in the pending snapshot). The ticket stays in `pending`.
    Failed { reason: String },
}

impl ResolutionStatus {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved)
    }
}

/// Per-ticket outcome within a send batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendOutcome {
    pub row: RowId,
    pub name: String,
    pub email: String,
    /// The reply text that was (or would have been) sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    /// Mail relay outcome; `None` when the transition failed before sending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail: Option<MailOutcome>,
    pub status: ResolutionStatus,
}

impl SendOutcome {
    /// Human-readable reason when anything about this ticket needs operator
    /// attention: a failed or half-finished record step, or a mail failure
    /// on an otherwise resolved ticket.
    pub fn warning(&self) -> Option<String> {
        match &self.status {
            ResolutionStatus::Failed { reason } => Some(format!("row {}: {reason}", self.row)),
            ResolutionStatus::RecordedAwaitingDelete { reason } => Some(format!(
                "row {}: recorded but still in pending, retry delete ({reason})",
                self.row
            )),
            ResolutionStatus::Resolved => match &self.mail {
                Some(MailOutcome {
                    status: MailStatus::Failed,
                    message,
                }) => Some(format!(
                    "row {}: resolved, but mail to {} failed: {message}",
                    self.row, self.email
                )),
                _ => None,
            },
        }
    }
}

/// Outcome of a whole send batch: every selected ticket reported
/// individually, success count plus failures with reasons.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<SendOutcome>,
}

impl BatchReport {
    pub fn resolved_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status.is_resolved())
            .count()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.outcomes.iter().filter_map(|o| o.warning()).collect()
    }

    pub fn is_clean(&self) -> bool {
        self.warnings().is_empty()
    }
}

/// Result of the programmatic single-ticket resolution endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedTicket {
    pub status: String,
    pub sentiment: String,
    pub issue_type: String,
    pub reply: String,
    pub email_status: MailStatus,
    pub email_message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: ResolutionStatus, mail: Option<MailOutcome>) -> SendOutcome {
        SendOutcome {
            row: RowId(2),
            name: "Andi".into(),
            email: "andi@example.com".into(),
            reply: Some("Halo Andi".into()),
            mail,
            status,
        }
    }

    #[test]
    fn resolved_with_sent_mail_has_no_warning() {
        let o = outcome(
            ResolutionStatus::Resolved,
            Some(MailOutcome::sent("andi@example.com")),
        );
        assert!(o.warning().is_none());
    }

    #[test]
    fn resolved_with_failed_mail_warns_but_counts_as_resolved() {
        let o = outcome(
            ResolutionStatus::Resolved,
            Some(MailOutcome::failed("auth failed")),
        );
        assert!(o.status.is_resolved());
        assert!(o.warning().unwrap().contains("auth failed"));
    }

    #[test]
    fn awaiting_delete_is_reported_as_retryable() {
        let o = outcome(
            ResolutionStatus::RecordedAwaitingDelete {
                reason: "io error".into(),
            },
            Some(MailOutcome::sent("andi@example.com")),
        );
        assert!(!o.status.is_resolved());
        assert!(o.warning().unwrap().contains("retry delete"));
    }

    #[test]
    fn batch_report_counts_and_warns() {
        let report = BatchReport {
            outcomes: vec![
                outcome(
                    ResolutionStatus::Resolved,
                    Some(MailOutcome::sent("a@x.com")),
                ),
                outcome(
                    ResolutionStatus::Failed {
                        reason: "append failed".into(),
                    },
                    None,
                ),
            ],
        };
        assert_eq!(report.resolved_count(), 1);
        assert_eq!(report.warnings().len(), 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn status_serializes_tagged() {
        let json = serde_json::to_value(ResolutionStatus::RecordedAwaitingDelete {
            reason: "x".into(),
        })
        .unwrap();
        assert_eq!(json["state"], "recorded_awaiting_delete");
    }
}
