//! Auto-reply drafting.
//!
//! The model streams its reply token by token; callers wanting progressive
//! display attach a chunk sink, but the lifecycle only ever persists the
//! fully assembled text. Failures never surface as errors — the customer
//! gets a deterministic fallback instead.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::warn;

use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

const REPLY_MAX_TOKENS: u32 = 500;
const REPLY_TEMPERATURE: f32 = 0.7;

/// Closing signature appended by prompts and fallback templates alike.
const SIGN_OFF: &str = "Hormat kami,\nTim Dukungan Pelanggan";

/// Where a reply's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    /// Assembled from model output.
    Model,
    /// Deterministic template: the customer's message was empty.
    EmptyInput,
    /// Deterministic apologetic template: the model call failed.
    UpstreamFailure,
}

/// A drafted reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedReply {
    pub text: String,
    pub source: ReplySource,
}

/// Drafts a reply for `{name, message}`. Infallible by contract.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, name: &str, message: &str) -> GeneratedReply;
}

/// LLM-backed reply generator with an optional progressive-display sink.
pub struct LlmReplyGenerator {
    llm: Arc<dyn LlmProvider>,
    chunk_sink: Option<UnboundedSender<String>>,
}

impl LlmReplyGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            chunk_sink: None,
        }
    }

    /// Forward partial chunks to `sink` as they arrive.
    pub fn with_chunk_sink(mut self, sink: UnboundedSender<String>) -> Self {
        self.chunk_sink = Some(sink);
        self
    }
}

#[async_trait]
impl ReplyGenerator for LlmReplyGenerator {
    async fn generate(&self, name: &str, message: &str) -> GeneratedReply {
        if message.trim().is_empty() {
            return GeneratedReply {
                text: empty_message_reply(name),
                source: ReplySource::EmptyInput,
            };
        }

        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_reply_system_prompt()),
            ChatMessage::user(build_reply_user_prompt(name, message)),
        ])
        .with_max_tokens(REPLY_MAX_TOKENS)
        .with_temperature(REPLY_TEMPERATURE);

        let chunks = match &self.chunk_sink {
            Some(sink) => sink.clone(),
            None => mpsc::unbounded_channel().0,
        };

        match self.llm.complete_streaming(request, chunks).await {
            Ok(text) if !text.trim().is_empty() => GeneratedReply {
                text: text.trim().to_string(),
                source: ReplySource::Model,
            },
            Ok(_) => {
                warn!("Reply stream produced no text, using fallback");
                GeneratedReply {
                    text: outage_reply(name),
                    source: ReplySource::UpstreamFailure,
                }
            }
            Err(e) => {
                warn!(error = %e, "Reply generation failed, using fallback");
                GeneratedReply {
                    text: outage_reply(name),
                    source: ReplySource::UpstreamFailure,
                }
            }
        }
    }
}

/// Template when the customer sent an empty/unreadable message.
pub fn empty_message_reply(name: &str) -> String {
    format!(
        "Halo {name},\n\nPesan Anda kosong atau tidak terbaca. \
         Mohon kirim ulang pertanyaan Anda.\n\n{SIGN_OFF}"
    )
}

/// Apologetic template when the upstream model is unavailable.
pub fn outage_reply(name: &str) -> String {
    format!(
        "Halo {name},\n\nSaat ini sistem kami mengalami gangguan. \
         Silakan coba lagi beberapa saat.\n\n{SIGN_OFF}"
    )
}

fn build_reply_system_prompt() -> String {
    format!(
        "You are a friendly, professional customer support agent.\n\
         Reply to the customer's complaint or question with empathy, a clear \
         explanation, and helpful suggestions. Open with a greeting using the \
         customer's name and close politely with exactly:\n{SIGN_OFF}\n\n\
         Return ONLY the final reply body."
    )
}

fn build_reply_user_prompt(name: &str, message: &str) -> String {
    format!("Customer name: {name}\n\nMessage:\n\"\"\"{message}\"\"\"")
}
