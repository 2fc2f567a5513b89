//! Groq provider — OpenAI-compatible chat completions over HTTPS.

use async_trait::async_trait;
use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::error::LlmError;
use crate::llm::{CompletionRequest, CompletionResponse, LlmProvider};

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
const PROVIDER: &str = "groq";

/// LLM provider backed by the Groq API.
pub struct GroqProvider {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl GroqProvider {
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Override the endpoint base URL (used against local test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request_body(&self, request: &CompletionRequest, stream: bool) -> Value {
        json!({
            "model": self.model,
            "messages": &request.messages,
            "max_tokens": request.max_tokens.unwrap_or(500),
            "temperature": request.temperature.unwrap_or(0.7),
            "stream": stream,
        })
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response, LlmError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::HttpStatus {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmProvider for GroqProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.request_body(&request, false);
        let response = self.post(&body).await?;

        let value: Value = response.json().await.map_err(|e| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: e.to_string(),
        })?;

        let content = value["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: "missing choices[0].message.content".to_string(),
            })?
            .to_string();

        Ok(CompletionResponse { content })
    }

    async fn complete_streaming(
        &self,
        request: CompletionRequest,
        chunks: UnboundedSender<String>,
    ) -> Result<String, LlmError> {
        let body = self.request_body(&request, true);
        let response = self.post(&body).await?;

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut text = String::new();

        'outer: while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("stream error: {e}"),
            })?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // Consume complete SSE lines; keep any partial tail in the buffer.
            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim().to_string();
                buffer.drain(..=pos);

                if line.is_empty() {
                    continue;
                }
                if line == "data: [DONE]" {
                    break 'outer;
                }
                let Some(payload) = line.strip_prefix("data: ") else {
                    continue;
                };
                let Ok(event) = serde_json::from_str::<Value>(payload) else {
                    debug!(line = %line, "Skipping non-JSON SSE line");
                    continue;
                };
                if let Some(delta) = event["choices"][0]["delta"]["content"].as_str() {
                    text.push_str(delta);
                    // Receiver may have gone away; the final string still matters.
                    let _ = chunks.send(delta.to_string());
                }
            }
        }

        Ok(text)
    }
}
