use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeeClickError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM provider error: {0}")]
    LlmProvider(String),

    #[error("Perception error: {0}")]
    Perception(String),

    #[error("Executor error: {0}")]
    Executor(String),

    #[error("Safety violation: {0}")]
    SafetyViolation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Interrupted: {0}")]
    Interrupted(String),
}

pub type SeeClickResult<T> = Result<T, SeeClickError>;
