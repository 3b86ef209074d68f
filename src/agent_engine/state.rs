use crate::perception::types::Frame;

/// Click proposed by the model, in the coordinate space of the frame it was shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickAction {
    pub x: u32,
    pub y: u32,
    pub reason: String,
}

/// One step's answer from the model after sanitizing and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Click(ClickAction),
    Done { reason: String },
    Invalid { diagnostic: String },
}

/// Position on the real screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenPoint {
    pub x: u32,
    pub y: u32,
}

impl std::fmt::Display for ScreenPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Phases of one step. `Finished` is terminal.
#[derive(Debug, Clone)]
pub enum AgentState {
    Capturing,
    Deciding { frame: Frame },
    Validating { raw: String, frame: Frame },
    Executing { target: ScreenPoint, reason: String },
    Retrying { diagnostic: String },
    Finished(SessionStatus),
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Done { reason: String },
    LoopDetected { x: u32, y: u32 },
    StepLimitReached { max_steps: u32 },
    SafetyAbort,
    UserInterrupted,
    Failed { error: String },
}

impl SessionStatus {
    /// Every outcome except `Failed` is a normal stop.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Done { reason } => write!(f, "done: {reason}"),
            Self::LoopDetected { x, y } => {
                write!(f, "loop detected: ({x}, {y}) proposed three times in a row")
            }
            Self::StepLimitReached { max_steps } => write!(f, "step limit reached ({max_steps})"),
            Self::SafetyAbort => write!(f, "safety abort: pointer reached the reserved corner"),
            Self::UserInterrupted => write!(f, "interrupted by user"),
            Self::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}
