use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;

use crate::agent_engine::interrupt::{InterruptKind, InterruptSignal};
use crate::agent_engine::loop_control::TargetVerdict;
use crate::agent_engine::session::{Session, SessionReport};
use crate::agent_engine::state::{AgentState, Decision, SessionStatus};
use crate::config::AgentConfig;
use crate::errors::SeeClickError;
use crate::executor::coordinator::scale_to_screen;
use crate::executor::input::InputDriver;
use crate::llm::decision::DecisionClient;
use crate::llm::response_parser::parse_decision;
use crate::perception::traits::ScreenCapturer;

/// Loop settings fixed for the lifetime of a session.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub max_steps: u32,
    pub step_delay: Duration,
    pub retry_delay: Duration,
    pub command_log: PathBuf,
}

impl From<&AgentConfig> for EngineSettings {
    fn from(cfg: &AgentConfig) -> Self {
        Self {
            max_steps: cfg.max_steps,
            step_delay: cfg.step_delay(),
            retry_delay: cfg.retry_delay(),
            command_log: cfg.command_log.clone(),
        }
    }
}

/// Drives capture → decide → validate → act until a terminal state.
pub struct AgentEngine {
    capturer: Arc<dyn ScreenCapturer>,
    decider: DecisionClient,
    input: Arc<dyn InputDriver>,
    interrupt: InterruptSignal,
    settings: EngineSettings,
}

impl AgentEngine {
    pub fn new(
        capturer: Arc<dyn ScreenCapturer>,
        decider: DecisionClient,
        input: Arc<dyn InputDriver>,
        interrupt: InterruptSignal,
        settings: EngineSettings,
    ) -> Self {
        Self {
            capturer,
            decider,
            input,
            interrupt,
            settings,
        }
    }

    /// Run one session for `goal`. Always returns a report; the command log
    /// has been written by the time this returns.
    pub async fn run(&self, goal: &str) -> SessionReport {
        let mut session = Session::new(goal, self.settings.max_steps, &self.settings.command_log);
        let span = tracing::info_span!("session", session_id = %session.session_id);

        async move {
            tracing::info!(
                goal = %goal,
                max_steps = self.settings.max_steps,
                "session started"
            );
            let status = self.drive(&mut session).await;
            match &status {
                SessionStatus::Failed { error } => {
                    tracing::error!(error = %error, step = session.loop_ctrl.step(), "session failed")
                }
                other => tracing::info!(status = %other, "session finished"),
            }
            session.finish(status)
        }
        .instrument(span)
        .await
    }

    async fn drive(&self, session: &mut Session) -> SessionStatus {
        let mut state = AgentState::Capturing;

        loop {
            if let Some(kind) = self.interrupt.current() {
                return interrupted(kind);
            }

            state = match state {
                // ── Capturing: budget check, then grab a frame ───────────
                AgentState::Capturing => {
                    if session.loop_ctrl.budget_exhausted() {
                        tracing::info!(max_steps = self.settings.max_steps, "step limit reached");
                        AgentState::Finished(SessionStatus::StepLimitReached {
                            max_steps: self.settings.max_steps,
                        })
                    } else {
                        tracing::info!(
                            step = session.loop_ctrl.step(),
                            max_steps = self.settings.max_steps,
                            "capturing screen"
                        );
                        match self.interruptible(self.capturer.capture()).await {
                            Err(kind) => AgentState::Finished(interrupted(kind)),
                            Ok(Err(e)) => failed(e),
                            Ok(Ok(frame)) => AgentState::Deciding { frame },
                        }
                    }
                }

                // ── Deciding: one model round-trip ───────────────────────
                AgentState::Deciding { frame } => {
                    let call = self.decider.decide(session.goal(), session.history(), &frame);
                    match self.interruptible(call).await {
                        Err(kind) => AgentState::Finished(interrupted(kind)),
                        Ok(Err(e)) => failed(e),
                        Ok(Ok(raw)) => AgentState::Validating { raw, frame },
                    }
                }

                // ── Validating: parse, scale, loop check ─────────────────
                AgentState::Validating { raw, frame } => match parse_decision(&raw, frame.sent) {
                    Decision::Done { reason } => {
                        tracing::info!(reason = %reason, "model reports goal reached");
                        AgentState::Finished(SessionStatus::Done { reason })
                    }
                    Decision::Invalid { diagnostic } => {
                        tracing::warn!(diagnostic = %diagnostic, "unusable model reply");
                        AgentState::Retrying { diagnostic }
                    }
                    Decision::Click(click) => {
                        let target = scale_to_screen(&click, frame.sent, frame.screen);
                        tracing::debug!(
                            proposed = %format!("({}, {})", click.x, click.y),
                            target = %target,
                            "click scaled to screen"
                        );
                        match session.loop_ctrl.observe_target(target) {
                            TargetVerdict::LoopDetected => {
                                tracing::warn!(target = %target, "same target proposed three times, stopping");
                                AgentState::Finished(SessionStatus::LoopDetected {
                                    x: target.x,
                                    y: target.y,
                                })
                            }
                            TargetVerdict::Proceed => AgentState::Executing {
                                target,
                                reason: click.reason,
                            },
                        }
                    }
                },

                // ── Executing: the single click of this step ─────────────
                // Runs to completion once started; drivers check the interrupt
                // before moving and before pressing.
                AgentState::Executing { target, reason } => {
                    tracing::info!(target = %target, reason = %reason, "clicking");
                    match self.input.click(target).await {
                        Err(SeeClickError::SafetyViolation(msg)) => {
                            tracing::warn!(detail = %msg, "safety stop during click");
                            let kind = self
                                .interrupt
                                .current()
                                .unwrap_or(InterruptKind::SafetyTrigger);
                            AgentState::Finished(interrupted(kind))
                        }
                        Err(e) => failed(e),
                        Ok(()) => {
                            session.record_click(target, reason);
                            self.pause(self.settings.step_delay).await
                        }
                    }
                }

                // ── Retrying: feed the diagnostic back, spend a step ─────
                AgentState::Retrying { diagnostic } => {
                    session.record_rejection(diagnostic);
                    self.pause(self.settings.retry_delay).await
                }

                AgentState::Finished(status) => return status,
            };
        }
    }

    /// Race `fut` against the interrupt signal; the interrupt wins ties.
    async fn interruptible<F: Future>(&self, fut: F) -> Result<F::Output, InterruptKind> {
        tokio::select! {
            biased;
            kind = self.interrupt.tripped() => Err(kind),
            out = fut => Ok(out),
        }
    }

    async fn pause(&self, delay: Duration) -> AgentState {
        if delay.is_zero() {
            return AgentState::Capturing;
        }
        match self.interruptible(tokio::time::sleep(delay)).await {
            Ok(()) => AgentState::Capturing,
            Err(kind) => AgentState::Finished(interrupted(kind)),
        }
    }
}

fn interrupted(kind: InterruptKind) -> SessionStatus {
    match kind {
        InterruptKind::SafetyTrigger => SessionStatus::SafetyAbort,
        InterruptKind::UserRequested => SessionStatus::UserInterrupted,
    }
}

fn failed(error: SeeClickError) -> AgentState {
    AgentState::Finished(SessionStatus::Failed {
        error: error.to_string(),
    })
}
