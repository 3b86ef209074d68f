use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::SeeClickResult;

/// Text-only record of a past step, replayed to the model as an assistant turn.
/// Frames are never kept here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEntry {
    Clicked {
        step: u32,
        x: u32,
        y: u32,
        reason: String,
    },
    Rejected {
        step: u32,
        diagnostic: String,
    },
}

impl HistoryEntry {
    pub fn clicked(step: u32, x: u32, y: u32, reason: impl Into<String>) -> Self {
        Self::Clicked {
            step,
            x,
            y,
            reason: reason.into(),
        }
    }

    pub fn rejected(step: u32, diagnostic: impl Into<String>) -> Self {
        Self::Rejected {
            step,
            diagnostic: diagnostic.into(),
        }
    }

    pub fn text(&self) -> String {
        match self {
            Self::Clicked { x, y, reason, .. } if reason.is_empty() => {
                format!("Clicked at ({x}, {y}).")
            }
            Self::Clicked { x, y, reason, .. } => {
                format!("Clicked at ({x}, {y}). Reason: {reason}")
            }
            Self::Rejected { diagnostic, .. } => format!(
                "Could not use the previous reply: {diagnostic} Send a corrected JSON object."
            ),
        }
    }
}

/// One click that was actually executed, in real screen coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedStep {
    pub step: u32,
    pub x: u32,
    pub y: u32,
    pub reason: String,
    #[serde(skip, default = "Utc::now")]
    pub at: DateTime<Utc>,
}

/// Executed clicks of one session, written to disk once when the session ends.
#[derive(Debug)]
pub struct CommandLog {
    file_path: PathBuf,
    steps: Vec<ExecutedStep>,
    flushed: bool,
}

impl CommandLog {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            steps: Vec::new(),
            flushed: false,
        }
    }

    pub fn record(&mut self, step: ExecutedStep) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[ExecutedStep] {
        &self.steps
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Write the log as a JSON array. Only the first call does anything, and
    /// nothing is written when no click was executed.
    pub fn flush(&mut self) -> SeeClickResult<Option<&Path>> {
        if self.flushed {
            return Ok(None);
        }
        self.flushed = true;

        if self.steps.is_empty() {
            tracing::debug!("no clicks executed, command log not written");
            return Ok(None);
        }

        let json = serde_json::to_string_pretty(&self.steps)?;
        std::fs::write(&self.file_path, json)?;
        tracing::info!(
            path = %self.file_path.display(),
            entries = self.steps.len(),
            "command log saved"
        );
        Ok(Some(&self.file_path))
    }
}

impl Drop for CommandLog {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::error!(error = %e, path = %self.file_path.display(), "failed to save command log");
        }
    }
}
