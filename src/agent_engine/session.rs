use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::agent_engine::history::{CommandLog, ExecutedStep, HistoryEntry};
use crate::agent_engine::loop_control::LoopController;
use crate::agent_engine::state::{ScreenPoint, SessionStatus};

/// All mutable state of one goal run. Sessions share nothing with each other.
pub struct Session {
    pub session_id: String,
    goal: String,
    history: Vec<HistoryEntry>,
    pub loop_ctrl: LoopController,
    log: CommandLog,
}

/// What a finished session hands back to its caller.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session_id: String,
    pub goal: String,
    pub status: SessionStatus,
    pub steps: Vec<ExecutedStep>,
    pub history: Vec<HistoryEntry>,
    /// Set when the command log was written.
    pub log_path: Option<PathBuf>,
}

impl Session {
    pub fn new(goal: impl Into<String>, max_steps: u32, log_path: &Path) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            goal: goal.into(),
            history: Vec::new(),
            loop_ctrl: LoopController::new(max_steps),
            log: CommandLog::new(log_path),
        }
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// A click went through: log it, tell the model, spend a step.
    pub fn record_click(&mut self, target: ScreenPoint, reason: String) {
        let step = self.loop_ctrl.step();
        self.history
            .push(HistoryEntry::clicked(step, target.x, target.y, reason.clone()));
        self.log.record(ExecutedStep {
            step,
            x: target.x,
            y: target.y,
            reason,
            at: Utc::now(),
        });
        self.loop_ctrl.advance();
    }

    /// The reply was unusable: ask for a corrected one and spend a step.
    pub fn record_rejection(&mut self, diagnostic: String) {
        let step = self.loop_ctrl.step();
        self.history.push(HistoryEntry::rejected(step, diagnostic));
        self.loop_ctrl.advance();
    }

    /// Teardown. Writes the command log exactly once and returns the report.
    pub fn finish(mut self, status: SessionStatus) -> SessionReport {
        let log_path = match self.log.flush() {
            Ok(path) => path.map(Path::to_path_buf),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    path = %self.log.path().display(),
                    "failed to save command log"
                );
                None
            }
        };

        SessionReport {
            session_id: self.session_id.clone(),
            goal: std::mem::take(&mut self.goal),
            status,
            steps: self.log.steps().to_vec(),
            history: std::mem::take(&mut self.history),
            log_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn clicks_and_rejections_both_consume_steps() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new("goal", 5, &dir.path().join("log.json"));
        session.record_rejection("JSON did not decode.".into());
        session.record_click(ScreenPoint { x: 1, y: 2 }, "menu".into());

        assert_eq!(session.loop_ctrl.step(), 3);
        assert_eq!(
            session.history(),
            &[
                HistoryEntry::rejected(1, "JSON did not decode."),
                HistoryEntry::clicked(2, 1, 2, "menu"),
            ]
        );

        let report = session.finish(SessionStatus::StepLimitReached { max_steps: 5 });
        assert_eq!(report.steps.len(), 1);
        assert_eq!(report.steps[0].step, 2);
    }

    #[test]
    fn finish_flushes_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        let mut session = Session::new("goal", 5, &path);
        session.record_click(ScreenPoint { x: 3, y: 4 }, String::new());

        let report = session.finish(SessionStatus::UserInterrupted);
        assert_eq!(report.status, SessionStatus::UserInterrupted);
        assert_eq!(report.log_path.as_deref(), Some(path.as_path()));
        assert_eq!(report.steps.len(), 1);
        assert!(path.exists());
    }

    #[test]
    fn unwritable_log_does_not_change_the_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("log.json");
        let mut session = Session::new("goal", 5, &path);
        session.record_click(ScreenPoint { x: 3, y: 4 }, String::new());

        let report = session.finish(SessionStatus::Done {
            reason: "ok".into(),
        });
        assert!(report.status.is_success());
        assert_eq!(report.log_path, None);
    }
}
