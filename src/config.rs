use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{SeeClickError, SeeClickResult};

const CONFIG_FILE_NAME: &str = "config.toml";
/// Upper bound for the pause between steps.
const MAX_STEP_DELAY_SECS: f64 = 3600.0;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
}

/// Endpoint and sampling settings for the vision model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Full chat-completions URL of an OpenAI-compatible server.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Sent as a bearer token. Local servers such as LM Studio accept any value.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Vision inference on small machines can take tens of seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Pause before the single retry after a 5xx response.
    #[serde(default = "default_llm_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            model: default_model(),
            api_key: default_api_key(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            retry_delay_ms: default_llm_retry_delay_ms(),
        }
    }
}

impl LlmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_api_url() -> String {
    "http://127.0.0.1:1234/v1/chat/completions".into()
}

fn default_model() -> String {
    "Qwen/Qwen2.5-VL-7B-Instruct".into()
}

fn default_api_key() -> String {
    "lm-studio".into()
}

fn default_temperature() -> f64 {
    0.1
}

fn default_max_tokens() -> u32 {
    250
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_llm_retry_delay_ms() -> u64 {
    800
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Step budget. Invalid model replies consume a step too.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// Pause after every executed click so the UI can settle.
    #[serde(default = "default_step_delay_secs")]
    pub step_delay_secs: f64,
    /// Pause after an invalid reply before the next capture.
    #[serde(default = "default_agent_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default)]
    pub dry_run: bool,
    /// Where executed clicks are written when the session ends.
    #[serde(default = "default_command_log")]
    pub command_log: PathBuf,
    #[serde(default = "default_max_frame_width")]
    pub max_frame_width: u32,
    /// Newest history lines sent with each request.
    #[serde(default = "default_max_history_entries")]
    pub max_history_entries: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            step_delay_secs: default_step_delay_secs(),
            retry_delay_ms: default_agent_retry_delay_ms(),
            dry_run: false,
            command_log: default_command_log(),
            max_frame_width: default_max_frame_width(),
            max_history_entries: default_max_history_entries(),
        }
    }
}

impl AgentConfig {
    pub fn step_delay(&self) -> Duration {
        Duration::from_secs_f64(self.step_delay_secs.max(0.0))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_max_steps() -> u32 {
    6
}

fn default_step_delay_secs() -> f64 {
    1.2
}

fn default_agent_retry_delay_ms() -> u64 {
    600
}

fn default_command_log() -> PathBuf {
    PathBuf::from("agent_commands.json")
}

fn default_max_frame_width() -> u32 {
    1280
}

fn default_max_history_entries() -> usize {
    20
}

/// Reserved-corner interlock that aborts a live session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// The corner zone spans `0..=corner_margin_px` on both axes.
    #[serde(default)]
    pub corner_margin_px: i32,
    #[serde(default = "default_watch_interval_ms")]
    pub watch_interval_ms: u64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            corner_margin_px: 0,
            watch_interval_ms: default_watch_interval_ms(),
        }
    }
}

impl SafetyConfig {
    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms.max(1))
    }
}

fn default_watch_interval_ms() -> u64 {
    50
}

fn resolve_config_path(explicit: Option<&Path>) -> SeeClickResult<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(SeeClickError::Config(format!(
            "config file {} does not exist",
            path.display()
        )));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(Some(candidate));
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join(CONFIG_FILE_NAME);
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(Some(candidate));
    }

    if let Some(dir) = dirs::config_dir() {
        let candidate = dir.join("seeclick").join(CONFIG_FILE_NAME);
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in user config dir");
            return Ok(Some(candidate));
        }
    }

    Ok(None)
}

/// Defaults, then `config.toml` if one is found, then `SEECLICK_*` variables.
pub fn load_config(explicit: Option<&Path>) -> SeeClickResult<AppConfig> {
    load_config_with(explicit, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with environment lookups going through `lookup`.
pub fn load_config_with<F>(explicit: Option<&Path>, lookup: F) -> SeeClickResult<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match resolve_config_path(explicit)? {
        Some(path) => {
            let content = std::fs::read_to_string(&path)?;
            let config: AppConfig = toml::from_str(&content)?;
            tracing::info!(path = %path.display(), "config loaded");
            config
        }
        None => {
            tracing::debug!("no config.toml found, using defaults");
            AppConfig::default()
        }
    };
    apply_env_overrides(&mut config, lookup)?;
    config.validate()?;
    Ok(config)
}

/// Applies `SEECLICK_*` overrides read through `lookup`.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> SeeClickResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("SEECLICK_API_URL") {
        config.llm.api_url = v;
    }
    if let Some(v) = lookup("SEECLICK_MODEL") {
        config.llm.model = v;
    }
    if let Some(v) = lookup("SEECLICK_API_KEY") {
        config.llm.api_key = v;
    }
    if let Some(v) = lookup("SEECLICK_TEMPERATURE") {
        config.llm.temperature = parse_number("SEECLICK_TEMPERATURE", &v)?;
    }
    if let Some(v) = lookup("SEECLICK_MAX_TOKENS") {
        config.llm.max_tokens = parse_number("SEECLICK_MAX_TOKENS", &v)?;
    }
    if let Some(v) = lookup("SEECLICK_TIMEOUT_SECS") {
        config.llm.request_timeout_secs = parse_number("SEECLICK_TIMEOUT_SECS", &v)?;
    }
    if let Some(v) = lookup("SEECLICK_MAX_STEPS") {
        config.agent.max_steps = parse_number("SEECLICK_MAX_STEPS", &v)?;
    }
    if let Some(v) = lookup("SEECLICK_STEP_DELAY_SECS") {
        config.agent.step_delay_secs = parse_number("SEECLICK_STEP_DELAY_SECS", &v)?;
    }
    if let Some(v) = lookup("SEECLICK_DRY_RUN") {
        config.agent.dry_run = parse_flag("SEECLICK_DRY_RUN", &v)?;
    }
    if let Some(v) = lookup("SEECLICK_COMMAND_LOG") {
        config.agent.command_log = PathBuf::from(v);
    }
    Ok(())
}

impl AppConfig {
    pub fn validate(&self) -> SeeClickResult<()> {
        if self.agent.max_steps == 0 {
            return Err(SeeClickError::Config("max_steps must be at least 1".into()));
        }
        if self.agent.max_frame_width == 0 {
            return Err(SeeClickError::Config(
                "max_frame_width must be at least 1".into(),
            ));
        }
        if self.llm.api_url.trim().is_empty() {
            return Err(SeeClickError::Config("api_url is empty".into()));
        }
        if self.llm.request_timeout_secs == 0 {
            return Err(SeeClickError::Config(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        if !self.llm.temperature.is_finite() || self.llm.temperature < 0.0 {
            return Err(SeeClickError::Config(format!(
                "temperature must be a non-negative number, got {}",
                self.llm.temperature
            )));
        }
        let delay = self.agent.step_delay_secs;
        if !delay.is_finite() || !(0.0..=MAX_STEP_DELAY_SECS).contains(&delay) {
            return Err(SeeClickError::Config(format!(
                "step_delay_secs must be between 0 and {MAX_STEP_DELAY_SECS}, got {delay}"
            )));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> SeeClickResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| SeeClickError::Config(format!("{key}: cannot parse '{raw}'")))
}

fn parse_flag(key: &str, raw: &str) -> SeeClickResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(SeeClickError::Config(format!(
            "{key}: expected a boolean, got '{raw}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.api_url, "http://127.0.0.1:1234/v1/chat/completions");
        assert_eq!(cfg.llm.model, "Qwen/Qwen2.5-VL-7B-Instruct");
        assert_eq!(cfg.llm.max_tokens, 250);
        assert_eq!(cfg.llm.request_timeout(), Duration::from_secs(120));
        assert_eq!(cfg.agent.max_steps, 6);
        assert_eq!(cfg.agent.step_delay(), Duration::from_millis(1200));
        assert_eq!(cfg.agent.command_log, PathBuf::from("agent_commands.json"));
        assert_eq!(cfg.agent.max_frame_width, 1280);
        assert!(!cfg.agent.dry_run);
    }

    #[test]
    fn partial_toml_keeps_defaults_for_missing_fields() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [llm]
            model = "llava"

            [agent]
            max_steps = 10
            dry_run = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.llm.model, "llava");
        assert_eq!(cfg.llm.temperature, 0.1);
        assert_eq!(cfg.agent.max_steps, 10);
        assert!(cfg.agent.dry_run);
        assert_eq!(cfg.safety.watch_interval_ms, 50);
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut cfg = AppConfig::default();
        apply_env_overrides(
            &mut cfg,
            lookup_from(&[
                ("SEECLICK_MODEL", "other-model"),
                ("SEECLICK_MAX_STEPS", "3"),
                ("SEECLICK_DRY_RUN", "1"),
                ("SEECLICK_STEP_DELAY_SECS", "0.5"),
                ("SEECLICK_COMMAND_LOG", "/tmp/clicks.json"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.llm.model, "other-model");
        assert_eq!(cfg.agent.max_steps, 3);
        assert!(cfg.agent.dry_run);
        assert_eq!(cfg.agent.step_delay(), Duration::from_millis(500));
        assert_eq!(cfg.agent.command_log, PathBuf::from("/tmp/clicks.json"));
    }

    #[test]
    fn unparseable_env_value_is_a_config_error() {
        let mut cfg = AppConfig::default();
        let err = apply_env_overrides(&mut cfg, lookup_from(&[("SEECLICK_MAX_TOKENS", "lots")]))
            .unwrap_err();
        assert!(matches!(err, SeeClickError::Config(_)));

        let err = apply_env_overrides(&mut cfg, lookup_from(&[("SEECLICK_DRY_RUN", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, SeeClickError::Config(_)));
    }

    #[test]
    fn zero_step_budget_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.agent.max_steps = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unusable_step_delay_is_rejected() {
        for bad in ["inf", "NaN", "-1", "1e30"] {
            let mut cfg = AppConfig::default();
            apply_env_overrides(&mut cfg, lookup_from(&[("SEECLICK_STEP_DELAY_SECS", bad)]))
                .unwrap();
            let err = cfg.validate().unwrap_err();
            assert!(matches!(err, SeeClickError::Config(_)), "{bad}: {err}");
        }

        let mut cfg = AppConfig::default();
        cfg.agent.step_delay_secs = 0.0;
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.agent.step_delay(), Duration::ZERO);
    }

    #[test]
    fn step_delay_from_file_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[agent]\nstep_delay_secs = 1e30\n").unwrap();
        let err = load_config_with(Some(&path), lookup_from(&[])).unwrap_err();
        assert!(matches!(err, SeeClickError::Config(_)));
    }

    #[test]
    fn zero_request_timeout_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.llm.request_timeout_secs = 0;
        assert!(matches!(cfg.validate(), Err(SeeClickError::Config(_))));
    }

    #[test]
    fn explicit_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[agent]\nmax_steps = 2\n").unwrap();
        let cfg = load_config_with(Some(&path), lookup_from(&[])).unwrap();
        assert_eq!(cfg.agent.max_steps, 2);
    }

    #[test]
    fn env_layer_applies_on_top_of_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[agent]\nmax_steps = 2\n").unwrap();
        let cfg = load_config_with(Some(&path), lookup_from(&[("SEECLICK_MAX_STEPS", "4")]))
            .unwrap();
        assert_eq!(cfg.agent.max_steps, 4);
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let err = load_config_with(Some(Path::new("/definitely/not/here.toml")), lookup_from(&[]))
            .unwrap_err();
        assert!(matches!(err, SeeClickError::Config(_)));
    }
}
