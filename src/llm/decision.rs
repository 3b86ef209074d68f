use std::sync::Arc;

use crate::agent_engine::history::HistoryEntry;
use crate::errors::SeeClickResult;
use crate::llm::prompt::build_messages;
use crate::llm::provider::LlmProvider;
use crate::llm::types::{CallConfig, ChatRequest, PingReport};
use crate::perception::types::Frame;

const RAW_PREVIEW_CHARS: usize = 500;

/// Asks the vision model for the next step.
pub struct DecisionClient {
    provider: Arc<dyn LlmProvider>,
    call: CallConfig,
    max_history: usize,
}

impl DecisionClient {
    pub fn new(provider: Arc<dyn LlmProvider>, call: CallConfig, max_history: usize) -> Self {
        Self {
            provider,
            call,
            max_history,
        }
    }

    /// Raw completion text for `goal` given the text history and the current frame.
    pub async fn decide(
        &self,
        goal: &str,
        history: &[HistoryEntry],
        frame: &Frame,
    ) -> SeeClickResult<String> {
        let request = ChatRequest {
            model: self.call.model.clone(),
            messages: build_messages(goal, history, frame, self.max_history),
            temperature: self.call.temperature,
            max_tokens: self.call.max_tokens,
        };

        tracing::info!(
            provider = %self.provider.name(),
            history = history.len(),
            frame = %frame.sent,
            "requesting decision"
        );
        let raw = self.provider.chat(&request).await?;

        let preview: String = raw.chars().take(RAW_PREVIEW_CHARS).collect();
        let ellipsis = if raw.chars().count() > RAW_PREVIEW_CHARS { "..." } else { "" };
        tracing::info!(raw = %format!("{preview}{ellipsis}"), "model reply");
        Ok(raw)
    }

    pub async fn ping(&self) -> SeeClickResult<PingReport> {
        self.provider.ping(&self.call.model).await
    }
}
