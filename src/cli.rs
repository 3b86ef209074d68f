use std::path::PathBuf;

use clap::Parser;

use crate::config::AppConfig;

/// Let a vision model operate this desktop, one click per step.
#[derive(Parser, Debug, Clone)]
#[command(name = "seeclick", version)]
pub struct Cli {
    /// What the agent should accomplish, e.g. "open the Start menu".
    #[arg(value_parser = non_empty_goal, required_unless_present = "ping")]
    pub goal: Option<String>,

    /// Probe the model endpoint and exit.
    #[arg(long, default_value_t = false)]
    pub ping: bool,

    /// Log clicks instead of performing them.
    #[arg(long = "dry-run", default_value_t = false)]
    pub dry_run: bool,

    /// Step budget for the session.
    #[arg(long = "max-steps", value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_steps: Option<u32>,

    /// Model name sent with each request.
    #[arg(long, short = 'm')]
    pub model: Option<String>,

    /// Path to a config.toml.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Flags win over file and environment settings.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if self.dry_run {
            config.agent.dry_run = true;
        }
        if let Some(n) = self.max_steps {
            config.agent.max_steps = n;
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
    }
}

fn non_empty_goal(raw: &str) -> Result<String, String> {
    let goal = raw.trim();
    if goal.is_empty() {
        return Err("goal must not be empty".into());
    }
    Ok(goal.to_string())
}
