use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::errors::{SeeClickError, SeeClickResult};
use crate::llm::provider::LlmProvider;
use crate::llm::types::{ChatRequest, PingReport};

/// Error bodies are cut to this many characters before they are surfaced.
const ERROR_BODY_LIMIT: usize = 1200;
const PING_TIMEOUT: Duration = Duration::from_secs(10);

pub struct OpenAiCompatibleProvider {
    id: String,
    api_url: String,
    api_key: String,
    retry_delay: Duration,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        id: String,
        api_url: String,
        api_key: String,
        timeout: Duration,
        retry_delay: Duration,
    ) -> SeeClickResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            id,
            api_url,
            api_key,
            retry_delay,
            client,
        })
    }

    async fn post(
        &self,
        body: &serde_json::Value,
        timeout: Option<Duration>,
    ) -> SeeClickResult<reqwest::Response> {
        let mut builder = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(body);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder.send().await?)
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn chat(&self, request: &ChatRequest) -> SeeClickResult<String> {
        let body = serde_json::to_value(request)?;

        tracing::debug!(
            provider = %self.id,
            model = %request.model,
            messages = request.messages.len(),
            "sending LLM request"
        );
        tracing::debug!(
            body = %{
                let mut log_body = body.clone();
                redact_images(&mut log_body);
                serde_json::to_string(&log_body).unwrap_or_default()
            },
            "request body (sanitized, base64 omitted)"
        );

        let mut retried = false;
        let response = loop {
            let started = Instant::now();
            let response = self.post(&body, None).await?;
            let status = response.status();
            tracing::debug!(
                status = %status,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "LLM response status"
            );

            if status.is_server_error() && !retried {
                retried = true;
                tracing::warn!(
                    status = %status,
                    delay_ms = self.retry_delay.as_millis() as u64,
                    "server error, retrying once"
                );
                tokio::time::sleep(self.retry_delay).await;
                continue;
            }

            if !status.is_success() {
                let err_body = response.text().await.unwrap_or_default();
                let err_body = truncate_chars(&err_body, ERROR_BODY_LIMIT);
                tracing::error!(status = %status, body = %err_body, "LLM request rejected");
                return Err(SeeClickError::LlmProvider(format!("{status}: {err_body}")));
            }

            break response;
        };

        let json: serde_json::Value = response.json().await?;
        let content = completion_text(&json);
        if content.trim().is_empty() {
            return Err(SeeClickError::LlmProvider("model returned an empty response".into()));
        }

        tracing::info!(content_len = content.len(), "LLM JSON response received");
        Ok(content.trim().to_string())
    }

    async fn ping(&self, model: &str) -> SeeClickResult<PingReport> {
        let body = serde_json::json!({
            "model": model,
            "messages": [{ "role": "user", "content": "ping" }],
            "max_tokens": 8,
            "temperature": 0,
        });

        let started = Instant::now();
        let response = self.post(&body, Some(PING_TIMEOUT)).await?;
        let status = response.status();
        if !status.is_success() {
            let err_body = response.text().await.unwrap_or_default();
            return Err(SeeClickError::LlmProvider(format!(
                "{status}: {}",
                truncate_chars(&err_body, ERROR_BODY_LIMIT)
            )));
        }
        let json: serde_json::Value = response.json().await?;

        Ok(PingReport {
            text: completion_text(&json),
            latency: started.elapsed(),
        })
    }
}

/// `choices[0].message.content` as plain text. Servers return either a
/// string or a list of parts; only `text` parts are kept.
fn completion_text(json: &serde_json::Value) -> String {
    let content = &json["choices"][0]["message"]["content"];
    if let Some(text) = content.as_str() {
        return text.to_string();
    }
    content
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter(|p| p["type"].as_str() == Some("text"))
                .filter_map(|p| p["text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// Replace inline image payloads so request bodies can be logged.
fn redact_images(body: &mut serde_json::Value) {
    let Some(msgs) = body.get_mut("messages").and_then(|m| m.as_array_mut()) else {
        return;
    };
    for msg in msgs {
        let Some(parts) = msg.get_mut("content").and_then(|c| c.as_array_mut()) else {
            continue;
        };
        for part in parts {
            if part.get("type").and_then(|t| t.as_str()) != Some("image_url") {
                continue;
            }
            if let Some(url) = part.get_mut("image_url").and_then(|i| i.get_mut("url")) {
                *url = serde_json::Value::String("<omitted_base64_image>".to_string());
            }
        }
    }
}

fn truncate_chars(s: &str, limit: usize) -> String {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
