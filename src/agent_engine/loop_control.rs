use crate::agent_engine::state::ScreenPoint;

/// Repeats of the last executed target allowed before the loop is declared
/// stuck. Two identical clicks run; the third identical proposal stops.
pub const REPEAT_LIMIT: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetVerdict {
    Proceed,
    LoopDetected,
}

/// Step budget and oscillation tracking for one session.
#[derive(Debug)]
pub struct LoopController {
    max_steps: u32,
    step: u32,
    repeat_count: u32,
    last_target: Option<ScreenPoint>,
}

impl LoopController {
    pub fn new(max_steps: u32) -> Self {
        Self {
            max_steps,
            step: 1,
            repeat_count: 0,
            last_target: None,
        }
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn budget_exhausted(&self) -> bool {
        self.step > self.max_steps
    }

    /// Count consecutive proposals of the same real-screen target. The target
    /// becomes "last executed" whether or not it is allowed to run.
    pub fn observe_target(&mut self, target: ScreenPoint) -> TargetVerdict {
        if self.last_target == Some(target) {
            self.repeat_count += 1;
        } else {
            self.repeat_count = 0;
        }
        self.last_target = Some(target);

        if self.repeat_count >= REPEAT_LIMIT {
            TargetVerdict::LoopDetected
        } else {
            TargetVerdict::Proceed
        }
    }

    /// Consume one step of the budget.
    pub fn advance(&mut self) {
        self.step += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: ScreenPoint = ScreenPoint { x: 100, y: 100 };
    const B: ScreenPoint = ScreenPoint { x: 200, y: 50 };

    #[test]
    fn third_identical_target_is_a_loop() {
        let mut ctrl = LoopController::new(10);
        assert_eq!(ctrl.observe_target(A), TargetVerdict::Proceed);
        assert_eq!(ctrl.observe_target(A), TargetVerdict::Proceed);
        assert_eq!(ctrl.observe_target(A), TargetVerdict::LoopDetected);
    }

    #[test]
    fn a_different_target_resets_the_count() {
        let mut ctrl = LoopController::new(10);
        ctrl.observe_target(A);
        ctrl.observe_target(A);
        assert_eq!(ctrl.observe_target(B), TargetVerdict::Proceed);
        assert_eq!(ctrl.observe_target(A), TargetVerdict::Proceed);
        assert_eq!(ctrl.observe_target(A), TargetVerdict::Proceed);
    }

    #[test]
    fn budget_is_exhausted_after_max_steps() {
        let mut ctrl = LoopController::new(2);
        assert_eq!(ctrl.step(), 1);
        assert!(!ctrl.budget_exhausted());
        ctrl.advance();
        assert!(!ctrl.budget_exhausted());
        ctrl.advance();
        assert!(ctrl.budget_exhausted());
    }
}
