// Pointer input. The only action this crate ever injects is one left click.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use enigo::{Button, Coordinate, Direction, Enigo, Mouse, Settings};

use crate::agent_engine::interrupt::{InterruptKind, InterruptSignal};
use crate::agent_engine::state::ScreenPoint;
use crate::errors::{SeeClickError, SeeClickResult};
use crate::executor::safety::in_reserved_corner;

const MOVE_SETTLE: Duration = Duration::from_millis(100);

#[async_trait]
pub trait InputDriver: Send + Sync {
    /// Move to `target` and press the left button once.
    async fn click(&self, target: ScreenPoint) -> SeeClickResult<()>;
}

/// Logs the click and injects nothing.
pub struct DryRunInput;

#[async_trait]
impl InputDriver for DryRunInput {
    async fn click(&self, target: ScreenPoint) -> SeeClickResult<()> {
        tracing::info!(x = target.x, y = target.y, "[dry run] click skipped");
        Ok(())
    }
}

/// Real input through `enigo`, guarded by the reserved-corner check.
pub struct EnigoInput {
    corner_margin: i32,
    signal: InterruptSignal,
}

impl EnigoInput {
    pub fn new(corner_margin: i32, signal: InterruptSignal) -> Self {
        Self {
            corner_margin,
            signal,
        }
    }
}

#[async_trait]
impl InputDriver for EnigoInput {
    async fn click(&self, target: ScreenPoint) -> SeeClickResult<()> {
        let margin = self.corner_margin;
        let signal = self.signal.clone();
        tokio::task::spawn_blocking(move || click_blocking(target, margin, &signal))
            .await
            .map_err(|e| SeeClickError::Executor(format!("click task failed: {e}")))?
    }
}

fn click_blocking(target: ScreenPoint, margin: i32, signal: &InterruptSignal) -> SeeClickResult<()> {
    let mut enigo = Enigo::new(&Settings::default())
        .map_err(|e| SeeClickError::Executor(format!("input init: {e}")))?;

    let x = i32::try_from(target.x)
        .map_err(|_| SeeClickError::Executor(format!("x out of range: {}", target.x)))?;
    let y = i32::try_from(target.y)
        .map_err(|_| SeeClickError::Executor(format!("y out of range: {}", target.y)))?;

    guard_corner(&enigo, margin, signal)?;
    enigo
        .move_mouse(x, y, Coordinate::Abs)
        .map_err(|e| SeeClickError::Executor(format!("move pointer: {e}")))?;
    std::thread::sleep(MOVE_SETTLE);

    guard_corner(&enigo, margin, signal)?;
    enigo
        .button(Button::Left, Direction::Click)
        .map_err(|e| SeeClickError::Executor(format!("left click: {e}")))?;

    tracing::debug!(x, y, "left click injected");
    Ok(())
}

/// Fails fast when the pointer sits in the reserved corner or the session
/// has already been stopped from elsewhere.
fn guard_corner(enigo: &Enigo, margin: i32, signal: &InterruptSignal) -> SeeClickResult<()> {
    if let Some(kind) = signal.current() {
        return Err(SeeClickError::SafetyViolation(format!(
            "session interrupted before input ({kind:?})"
        )));
    }
    let (px, py) = enigo
        .location()
        .map_err(|e| SeeClickError::Executor(format!("read pointer: {e}")))?;
    if in_reserved_corner(px, py, margin) {
        signal.trip(InterruptKind::SafetyTrigger);
        return Err(SeeClickError::SafetyViolation(format!(
            "pointer at ({px}, {py}) is in the reserved corner"
        )));
    }
    Ok(())
}

/// Driver for the configured mode.
pub fn driver_for(dry_run: bool, corner_margin: i32, signal: InterruptSignal) -> Arc<dyn InputDriver> {
    if dry_run {
        Arc::new(DryRunInput)
    } else {
        Arc::new(EnigoInput::new(corner_margin, signal))
    }
}
