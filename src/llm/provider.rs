use async_trait::async_trait;

use crate::errors::SeeClickResult;
use crate::llm::types::{ChatRequest, PingReport};

/// Chat-completion backend. The loop only needs the raw completion text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Sends one completion request and returns the trimmed reply text.
    async fn chat(&self, request: &ChatRequest) -> SeeClickResult<String>;

    /// Minimal text-only request used to check that the endpoint answers.
    async fn ping(&self, model: &str) -> SeeClickResult<PingReport>;
}
