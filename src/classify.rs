//! Ticket classification — sentiment and issue category via the LLM.
//!
//! Classification is best-effort and never blocks the lifecycle: empty
//! input and upstream failures both collapse to defined defaults, tagged
//! with a `source` so operators can tell routine low-signal results from a
//! sustained outage.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

/// Default sentiment when classification can't run.
pub const DEFAULT_SENTIMENT: &str = "Unknown";
/// Default issue type when classification can't run.
pub const DEFAULT_ISSUE_TYPE: &str = "General";

/// Sentiment labels the model is asked to choose from.
pub const SENTIMENTS: [&str; 3] = ["Positif", "Negatif", "Netral"];
/// Issue-type labels the model is asked to choose from.
pub const ISSUE_TYPES: [&str; 5] = ["Tagihan", "Teknis", "Login", "Umum", "Lainnya"];

const CLASSIFY_MAX_TOKENS: u32 = 500;
const CLASSIFY_TEMPERATURE: f32 = 0.3;

/// Where a classification's values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    /// Parsed from model output.
    Model,
    /// Defaults: the message was empty, no model call was made.
    EmptyInput,
    /// Defaults: the model call failed or returned unparseable output.
    UpstreamFailure,
}

/// Classification result — always fully populated, never partially null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub sentiment: String,
    pub issue_type: String,
    pub source: ClassificationSource,
}

impl Classification {
    pub fn fallback(source: ClassificationSource) -> Self {
        Self {
            sentiment: DEFAULT_SENTIMENT.to_string(),
            issue_type: DEFAULT_ISSUE_TYPE.to_string(),
            source,
        }
    }
}

/// Maps free ticket text to `{sentiment, issue_type}`. Infallible by
/// contract — failures become defaults.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, message: &str) -> Classification;
}

/// LLM-backed classifier.
pub struct LlmClassifier {
    llm: Arc<dyn LlmProvider>,
}

impl LlmClassifier {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, message: &str) -> Classification {
        // Cost/latency guard: don't spend a model call on an empty ticket.
        if message.trim().is_empty() {
            return Classification::fallback(ClassificationSource::EmptyInput);
        }

        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_classify_system_prompt()),
            ChatMessage::user(build_classify_user_prompt(message)),
        ])
        .with_max_tokens(CLASSIFY_MAX_TOKENS)
        .with_temperature(CLASSIFY_TEMPERATURE);

        let response = match self.llm.complete(request).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Classification call failed, using defaults");
                return Classification::fallback(ClassificationSource::UpstreamFailure);
            }
        };

        match parse_classification(&response.content) {
            Some(c) => {
                debug!(
                    sentiment = %c.sentiment,
                    issue_type = %c.issue_type,
                    "Ticket classified"
                );
                c
            }
            None => {
                warn!(
                    raw_response = %response.content,
                    "Unparseable classification response, using defaults"
                );
                Classification::fallback(ClassificationSource::UpstreamFailure)
            }
        }
    }
}

fn build_classify_system_prompt() -> String {
    format!(
        "You classify customer support tickets.\n\n\
         From the ticket text, determine:\n\
         - Sentiment: one of {}\n\
         - Issue type: one of {}\n\n\
         Respond with ONLY a JSON object, no prose:\n\
         {{\"sentiment\": \"Negatif\", \"issue_type\": \"Tagihan\"}}",
        SENTIMENTS.join(", "),
        ISSUE_TYPES.join(", "),
    )
}

fn build_classify_user_prompt(message: &str) -> String {
    format!("Ticket text:\n\"\"\"{message}\"\"\"")
}

/// Extract a `{sentiment, issue_type}` object from model output.
///
/// Lenient about surrounding noise (code fences, prose): parses the first
/// `{...}` span. Missing fields fall back per-field to the defaults.
fn parse_classification(raw: &str) -> Option<Classification> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }

    #[derive(Deserialize)]
    struct Wire {
        sentiment: Option<String>,
        issue_type: Option<String>,
    }

    let wire: Wire = serde_json::from_str(&raw[start..=end]).ok()?;
    Some(Classification {
        sentiment: wire
            .sentiment
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SENTIMENT.to_string()),
        issue_type: wire
            .issue_type
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ISSUE_TYPE.to_string()),
        source: ClassificationSource::Model,
    })
}
