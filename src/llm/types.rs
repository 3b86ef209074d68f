use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: MessageContent::Text(text.into()),
        }
    }

    /// Assistant turn carried as a single text part, which vision servers
    /// such as Qwen-VL on LM Studio accept alongside image turns.
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: MessageContent::Parts(vec![ContentPart::Text { text: text.into() }]),
        }
    }

    pub fn user(content: MessageContent) -> Self {
        Self {
            role: "user".into(),
            content,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

/// Per-call model settings.
#[derive(Debug, Clone)]
pub struct CallConfig {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Body of one chat-completions POST.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Reply to an endpoint probe.
#[derive(Debug, Clone)]
pub struct PingReport {
    pub text: String,
    pub latency: std::time::Duration,
}
