//! The lifecycle engine.
//!
//! Classification runs automatically on fetch; everything from reply
//! generation onward is user-triggered. Batches are strictly sequential —
//! one full transition per ticket — trading throughput for the
//! update-before-delete invariant.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::classify::Classifier;
use crate::error::{Error, StoreError};
use crate::lifecycle::types::{BatchReport, ResolutionStatus, ResolvedTicket, SendOutcome};
use crate::mail::Mailer;
use crate::reply::ReplyGenerator;
use crate::store::TicketStore;
use crate::ticket::{RowId, Ticket};

/// Fixed subject line for outbound replies.
pub const DEFAULT_MAIL_SUBJECT: &str = "Terkait Tiket Bantuan Anda";

/// Orchestrates the ticket state machine across the store, classifier,
/// reply generator, and mailer.
pub struct TicketLifecycle {
    store: Arc<dyn TicketStore>,
    classifier: Arc<dyn Classifier>,
    replies: Arc<dyn ReplyGenerator>,
    mailer: Arc<dyn Mailer>,
    subject: String,
}

impl TicketLifecycle {
    pub fn new(
        store: Arc<dyn TicketStore>,
        classifier: Arc<dyn Classifier>,
        replies: Arc<dyn ReplyGenerator>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            store,
            classifier,
            replies,
            mailer,
            subject: DEFAULT_MAIL_SUBJECT.to_string(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Append a fresh submission to the pending queue (`New` state).
    pub async fn submit(
        &self,
        name: &str,
        email: &str,
        issue_type: &str,
        message: &str,
    ) -> Result<Ticket, Error> {
        let ticket = Ticket::submission(name, email, issue_type, message)?;
        self.store.append_pending(&ticket).await?;
        info!(name = %name, "Ticket submitted to pending queue");
        Ok(ticket)
    }

    /// Snapshot the pending queue, classifying any ticket that still lacks
    /// analysis fields (`New → Classified`, not gated on user action).
    ///
    /// Classification results are persisted best-effort so they are never
    /// redone; a row vanishing mid-pass (concurrent actor) is tolerated.
    pub async fn pending_tickets(&self) -> Result<Vec<Ticket>, StoreError> {
        let mut tickets = self.store.list_pending().await?;

        for ticket in &mut tickets {
            if ticket.is_classified() {
                continue;
            }
            let classification = self.classifier.classify(&ticket.message).await;
            ticket.sentiment = Some(classification.sentiment.clone());
            ticket.issue_type_label = Some(classification.issue_type.clone());

            let Some(row) = ticket.row else { continue };
            let cached_reply = ticket.auto_reply.as_deref().unwrap_or("");
            match self
                .store
                .update_pending(
                    row,
                    &classification.sentiment,
                    &classification.issue_type,
                    cached_reply,
                )
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_already_gone() => {
                    warn!(row = %row, "Pending row vanished during classification");
                }
                Err(e) => {
                    warn!(row = %row, error = %e, "Failed to persist classification");
                }
            }
        }

        Ok(tickets)
    }

    /// The append-only processed log.
    pub async fn processed_tickets(&self) -> Result<Vec<Ticket>, StoreError> {
        self.store.list_processed().await
    }

    /// Run the send transitions (`Classified → … → Resolved`) for the
    /// selected rows, one full transition per ticket, in selection order.
    ///
    /// Per ticket: reuse or generate the reply, send mail (failure is
    /// surfaced, never blocking), update the pending row (best effort),
    /// append to processed (loud on failure). Deletions are deferred until
    /// every update/append has run, then executed in descending row order so
    /// no positional identity in the batch is invalidated early.
    pub async fn send_batch(&self, rows: &[RowId]) -> Result<BatchReport, StoreError> {
        // Unfiltered snapshot: rows with cached replies, and rows recorded
        // but awaiting a delete retry, are still selectable here.
        let snapshot = self.store.snapshot_pending().await?;
        let by_row: HashMap<RowId, Ticket> = snapshot
            .into_iter()
            .filter_map(|t| t.row.map(|row| (row, t)))
            .collect();

        let mut outcomes: Vec<SendOutcome> = Vec::with_capacity(rows.len());
        let mut outcome_index: HashMap<RowId, usize> = HashMap::new();
        let mut deletions: Vec<RowId> = Vec::new();
        let mut seen: HashSet<RowId> = HashSet::new();

        for &row in rows {
            // A duplicated selection would double-resolve this ticket and
            // make the second delete eat whichever row shifted into place.
            if !seen.insert(row) {
                warn!(row = %row, "Duplicate row in selection ignored");
                continue;
            }
            let Some(ticket) = by_row.get(&row) else {
                warn!(row = %row, "Selected row not in pending snapshot");
                outcomes.push(SendOutcome {
                    row,
                    name: String::new(),
                    email: String::new(),
                    reply: None,
                    mail: None,
                    status: ResolutionStatus::Failed {
                        reason: "not in pending snapshot (already resolved?)".to_string(),
                    },
                });
                continue;
            };

            let outcome = self.send_one(row, ticket, &mut deletions).await;
            outcome_index.insert(row, outcomes.len());
            outcomes.push(outcome);
        }

        // Recorded → Resolved. Descending order keeps every remaining
        // positional identity valid while rows below it disappear.
        deletions.sort_unstable_by(|a, b| b.cmp(a));
        for row in deletions {
            let status = match self.store.delete_pending(row).await {
                Ok(()) => ResolutionStatus::Resolved,
                Err(e) if e.is_already_gone() => {
                    // A concurrent actor beat us to it; the ticket is resolved.
                    info!(row = %row, "Pending row already gone at delete");
                    ResolutionStatus::Resolved
                }
                Err(e) => {
                    warn!(row = %row, error = %e, "Delete failed; ticket duplicated until retried");
                    ResolutionStatus::RecordedAwaitingDelete {
                        reason: e.to_string(),
                    }
                }
            };
            if let Some(&idx) = outcome_index.get(&row) {
                outcomes[idx].status = status;
            }
        }

        let report = BatchReport { outcomes };
        info!(
            selected = rows.len(),
            resolved = report.resolved_count(),
            warnings = report.warnings().len(),
            "Send batch complete"
        );
        Ok(report)
    }

    /// Phase 1 of a single ticket's send: `Classified → Replied → Sent →
    /// Recorded`. Pushes the row onto `deletions` once it is safely in the
    /// processed log.
    async fn send_one(
        &self,
        row: RowId,
        ticket: &Ticket,
        deletions: &mut Vec<RowId>,
    ) -> SendOutcome {
        // Classified → Replied: cached replies are reused, never regenerated.
        let reply_text = match ticket.auto_reply.as_deref() {
            Some(cached) if !cached.trim().is_empty() => cached.to_string(),
            _ => self.replies.generate(&ticket.name, &ticket.message).await.text,
        };

        // Late classification guard: a row selected before the automatic
        // pass finished still gets recorded with real values.
        let (sentiment, label) = match (&ticket.sentiment, &ticket.issue_type_label) {
            (Some(s), Some(l)) => (s.clone(), l.clone()),
            _ => {
                let c = self.classifier.classify(&ticket.message).await;
                (c.sentiment, c.issue_type)
            }
        };

        // Replied → Sent. A relay failure is surfaced per-ticket but never
        // blocks recording — losing the ticket would be worse than a
        // manual re-send.
        let mail = self.mailer.send(&ticket.email, &self.subject, &reply_text).await;
        if !mail.is_sent() {
            warn!(row = %row, email = %ticket.email, reason = %mail.message, "Mail send failed");
        }

        // Sent → Recorded: update pending first (best effort), then append
        // to processed. This ordering bounds the worst crash outcome at
        // "duplicated in both tables".
        if let Err(e) = self
            .store
            .update_pending(row, &sentiment, &label, &reply_text)
            .await
        {
            if e.is_already_gone() {
                warn!(row = %row, "Pending row vanished before update; continuing");
            } else {
                warn!(row = %row, error = %e, "Pending update failed; continuing");
            }
        }

        match self
            .store
            .append_processed(ticket, &sentiment, &label, &reply_text)
            .await
        {
            Ok(()) => {
                deletions.push(row);
                SendOutcome {
                    row,
                    name: ticket.name.clone(),
                    email: ticket.email.clone(),
                    reply: Some(reply_text),
                    mail: Some(mail),
                    // Accurate until phase 2 overwrites it: the ticket is
                    // recorded and its delete is deferred to batch end.
                    status: ResolutionStatus::RecordedAwaitingDelete {
                        reason: "delete deferred to end of batch".to_string(),
                    },
                }
            }
            Err(e) => {
                // The loud failure: without a processed row, deleting from
                // pending would lose the ticket entirely.
                error!(row = %row, error = %e, "Append to processed failed; ticket left in pending");
                SendOutcome {
                    row,
                    name: ticket.name.clone(),
                    email: ticket.email.clone(),
                    reply: Some(reply_text),
                    mail: Some(mail),
                    status: ResolutionStatus::Failed {
                        reason: format!("processed append failed: {e}"),
                    },
                }
            }
        }
    }

    /// Programmatic single-ticket resolution: classify, draft, record,
    /// send — without touching the pending queue.
    pub async fn resolve_submission(
        &self,
        name: &str,
        email: &str,
        message: &str,
    ) -> Result<ResolvedTicket, Error> {
        if message.trim().is_empty() {
            return Err(crate::error::TicketError::EmptyMessage.into());
        }

        let classification = self.classifier.classify(message).await;
        let reply = self.replies.generate(name, message).await;

        let ticket = Ticket::submission(name, email, &classification.issue_type, message)?;
        self.store
            .append_processed(
                &ticket,
                &classification.sentiment,
                &classification.issue_type,
                &reply.text,
            )
            .await?;

        let mail = self.mailer.send(email, &self.subject, &reply.text).await;

        Ok(ResolvedTicket {
            status: "success".to_string(),
            sentiment: classification.sentiment,
            issue_type: classification.issue_type,
            reply: reply.text,
            email_status: mail.status,
            email_message: mail.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::classify::{Classification, ClassificationSource};
    use crate::mail::MailOutcome;
    use crate::reply::{GeneratedReply, ReplySource};
    use crate::store::MemoryStore;

    struct FixedClassifier {
        calls: AtomicUsize,
    }

    impl FixedClassifier {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Classifier for FixedClassifier {
        async fn classify(&self, _message: &str) -> Classification {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Classification {
                sentiment: "Negatif".into(),
                issue_type: "Tagihan".into(),
                source: ClassificationSource::Model,
            }
        }
    }

    struct CountingReplies {
        calls: AtomicUsize,
    }

    impl CountingReplies {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ReplyGenerator for CountingReplies {
        async fn generate(&self, name: &str, _message: &str) -> GeneratedReply {
            self.calls.fetch_add(1, Ordering::SeqCst);
            GeneratedReply {
                text: format!("Halo {name}, kami akan membantu."),
                source: ReplySource::Model,
            }
        }
    }

    struct OkMailer;

    #[async_trait]
    impl Mailer for OkMailer {
        async fn send(&self, to: &str, _subject: &str, _body: &str) -> MailOutcome {
            MailOutcome::sent(to)
        }
    }

    fn lifecycle(
        store: Arc<MemoryStore>,
    ) -> (TicketLifecycle, Arc<FixedClassifier>, Arc<CountingReplies>) {
        let classifier = Arc::new(FixedClassifier::new());
        let replies = Arc::new(CountingReplies::new());
        let lc = TicketLifecycle::new(
            store,
            classifier.clone(),
            replies.clone(),
            Arc::new(OkMailer),
        );
        (lc, classifier, replies)
    }

    fn ticket(name: &str, message: &str) -> Ticket {
        Ticket::submission(name, &format!("{name}@example.com"), "Umum", message).unwrap()
    }

    #[tokio::test]
    async fn fetch_classifies_and_persists_once() {
        let store = Arc::new(MemoryStore::new());
        store.seed_pending(ticket("Andi", "Tagihan saya salah"));
        let (lc, classifier, _) = lifecycle(store.clone());

        let tickets = lc.pending_tickets().await.unwrap();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].sentiment.as_deref(), Some("Negatif"));
        assert_eq!(tickets[0].issue_type_label.as_deref(), Some("Tagihan"));
        // User-declared category untouched.
        assert_eq!(tickets[0].issue_type, "Umum");
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);

        // Second fetch sees the persisted classification: no second call.
        let tickets = lc.pending_tickets().await.unwrap();
        assert!(tickets[0].is_classified());
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cached_reply_is_never_regenerated() {
        let store = Arc::new(MemoryStore::new());
        let mut t = ticket("Andi", "Tagihan saya salah");
        t.sentiment = Some("Negatif".into());
        t.issue_type_label = Some("Tagihan".into());
        t.auto_reply = Some("Halo Andi, balasan tersimpan.".into());
        store.seed_pending(t);
        let (lc, _, replies) = lifecycle(store.clone());

        let report = lc.send_batch(&[RowId(2)]).await.unwrap();
        assert_eq!(report.resolved_count(), 1);
        assert_eq!(replies.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            report.outcomes[0].reply.as_deref(),
            Some("Halo Andi, balasan tersimpan.")
        );
    }

    #[tokio::test]
    async fn send_resolves_ticket_exactly_once() {
        let store = Arc::new(MemoryStore::new());
        store.seed_pending(ticket("Andi", "Tagihan saya salah"));
        let (lc, _, _) = lifecycle(store.clone());

        let report = lc.send_batch(&[RowId(2)]).await.unwrap();
        assert_eq!(report.resolved_count(), 1);
        assert!(report.is_clean());

        assert!(store.list_pending().await.unwrap().is_empty());
        assert_eq!(store.list_processed().await.unwrap().len(), 1);

        // Sending the same (now dead) identity again fails cleanly.
        let report = lc.send_batch(&[RowId(2)]).await.unwrap();
        assert_eq!(report.resolved_count(), 0);
        assert!(matches!(
            report.outcomes[0].status,
            ResolutionStatus::Failed { .. }
        ));
        assert_eq!(store.list_processed().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_selection_resolves_once_and_spares_neighbors() {
        let store = Arc::new(MemoryStore::new());
        store.seed_pending(ticket("a", "one"));
        store.seed_pending(ticket("b", "two"));
        let (lc, _, _) = lifecycle(store.clone());

        let report = lc.send_batch(&[RowId(2), RowId(2)]).await.unwrap();
        assert_eq!(report.resolved_count(), 1);
        assert_eq!(report.outcomes.len(), 1);

        // Exactly one processed copy of "a"; "b" untouched in pending.
        let processed = store.list_processed().await.unwrap();
        assert_eq!(processed.len(), 1);
        assert_eq!(processed[0].name, "a");
        let pending = store.pending_rows();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].name, "b");
    }

    #[tokio::test]
    async fn batch_deletes_descending_so_no_row_shifts_underfoot() {
        let store = Arc::new(MemoryStore::new());
        store.seed_pending(ticket("a", "one"));
        store.seed_pending(ticket("b", "two"));
        store.seed_pending(ticket("c", "three"));
        let (lc, _, _) = lifecycle(store.clone());

        let report = lc
            .send_batch(&[RowId(2), RowId(3), RowId(4)])
            .await
            .unwrap();
        assert_eq!(report.resolved_count(), 3);

        assert!(store.list_pending().await.unwrap().is_empty());
        let processed = store.list_processed().await.unwrap();
        let names: Vec<_> = processed.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn resolve_submission_records_and_reports() {
        let store = Arc::new(MemoryStore::new());
        let (lc, _, _) = lifecycle(store.clone());

        let resolved = lc
            .resolve_submission("Andi", "andi@example.com", "Tagihan saya salah")
            .await
            .unwrap();
        assert_eq!(resolved.status, "success");
        assert_eq!(resolved.sentiment, "Negatif");
        assert_eq!(resolved.issue_type, "Tagihan");
        assert!(!resolved.reply.is_empty());

        // Recorded straight into processed; pending untouched.
        assert!(store.list_pending().await.unwrap().is_empty());
        assert_eq!(store.list_processed().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resolve_submission_rejects_empty_message() {
        let store = Arc::new(MemoryStore::new());
        let (lc, _, _) = lifecycle(store);

        let err = lc
            .resolve_submission("Andi", "andi@example.com", "  ")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Ticket(_)));
    }

    #[tokio::test]
    async fn submit_appends_to_pending() {
        let store = Arc::new(MemoryStore::new());
        let (lc, _, _) = lifecycle(store.clone());

        lc.submit("Andi", "andi@example.com", "Tagihan", "Tagihan saya salah")
            .await
            .unwrap();

        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].issue_type, "Tagihan");
        assert!(!pending[0].is_classified());
    }
}
