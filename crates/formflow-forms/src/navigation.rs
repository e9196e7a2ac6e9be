//! The step navigation state machine.
//!
//! [`Navigator`] only tracks indices, completion, and the submitting flag;
//! it knows nothing about values. Gating forward moves on validity is the
//! engine's job: it validates first and then asks the navigator to move.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use formflow_core::settings::JumpPolicy;
use formflow_core::{FormflowError, FormflowResult};

/// The direction of the last move. A presentation hint only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Moved to a later step.
    Forward,
    /// Moved to an earlier step.
    Backward,
    /// Has not moved yet.
    #[default]
    None,
}

/// A completed change of the active step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMove {
    /// The step that was active.
    pub from: usize,
    /// The step that is active now.
    pub to: usize,
    /// Which way the move went.
    pub direction: Direction,
}

/// Index, completion, and submit state of a multi-step form.
///
/// # Examples
///
/// ```
/// use formflow_core::settings::JumpPolicy;
/// use formflow_forms::navigation::Navigator;
///
/// let mut nav = Navigator::new(3, true, JumpPolicy::CompletedOrCurrent);
/// assert!(nav.advance().is_some());
/// assert_eq!(nav.current(), 1);
/// assert!(nav.is_completed(0));
/// assert!(nav.retreat().is_some());
/// assert!(nav.retreat().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigator {
    current: usize,
    step_count: usize,
    direction: Direction,
    submitting: bool,
    completed: BTreeSet<usize>,
    allow_back: bool,
    jump_policy: JumpPolicy,
}

impl Navigator {
    /// Creates a navigator at step 0. A `step_count` of zero is treated as
    /// one.
    pub fn new(step_count: usize, allow_back: bool, jump_policy: JumpPolicy) -> Self {
        Self {
            current: 0,
            step_count: step_count.max(1),
            direction: Direction::None,
            submitting: false,
            completed: BTreeSet::new(),
            allow_back,
            jump_policy,
        }
    }

    /// Returns the active step index.
    pub const fn current(&self) -> usize {
        self.current
    }

    /// Returns the number of steps.
    pub const fn step_count(&self) -> usize {
        self.step_count
    }

    /// Returns the direction of the last move.
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns `true` while a submission is in flight.
    pub const fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Returns the configured jump policy.
    pub const fn jump_policy(&self) -> JumpPolicy {
        self.jump_policy
    }

    /// Returns `true` if backward navigation is enabled.
    pub const fn allows_back(&self) -> bool {
        self.allow_back
    }

    /// Returns `true` on the first step.
    pub const fn is_first(&self) -> bool {
        self.current == 0
    }

    /// Returns `true` on the last step.
    pub const fn is_last(&self) -> bool {
        self.current + 1 == self.step_count
    }

    /// Returns `true` if `index` has been completed.
    pub fn is_completed(&self, index: usize) -> bool {
        self.completed.contains(&index)
    }

    /// Returns the lowest step index that is not completed.
    pub fn first_incomplete(&self) -> usize {
        (0..self.step_count)
            .find(|i| !self.completed.contains(i))
            .unwrap_or(self.step_count - 1)
    }

    /// Marks the active step completed.
    pub fn complete_current(&mut self) {
        self.completed.insert(self.current);
    }

    /// Moves to the next step, marking the active one completed. Does
    /// nothing on the last step.
    pub fn advance(&mut self) -> Option<StepMove> {
        if self.is_last() {
            return None;
        }
        self.complete_current();
        Some(self.move_to(self.current + 1))
    }

    /// Moves to the previous step. Does nothing on the first step or when
    /// backward navigation is disabled.
    pub fn retreat(&mut self) -> Option<StepMove> {
        if self.is_first() || !self.allow_back {
            return None;
        }
        Some(self.move_to(self.current - 1))
    }

    /// Fails with [`FormflowError::InvalidStep`] if `index` is out of range.
    pub fn check_index(&self, index: usize) -> FormflowResult<()> {
        if index < self.step_count {
            Ok(())
        } else {
            Err(FormflowError::InvalidStep {
                index,
                count: self.step_count,
            })
        }
    }

    /// Returns `true` if [`jump`](Self::jump) would move to `index`.
    pub fn can_jump(&self, index: usize) -> bool {
        if index >= self.step_count || index == self.current {
            return false;
        }
        if index < self.current {
            return self.allow_back;
        }
        match self.jump_policy {
            JumpPolicy::Any => true,
            JumpPolicy::CompletedOrCurrent => index <= self.first_incomplete(),
        }
    }

    /// Jumps to `index` when the policy allows it.
    ///
    /// Out-of-range indices are an error; a disallowed or same-step jump is
    /// `Ok(None)`.
    pub fn jump(&mut self, index: usize) -> FormflowResult<Option<StepMove>> {
        self.check_index(index)?;
        if !self.can_jump(index) {
            return Ok(None);
        }
        Ok(Some(self.move_to(index)))
    }

    /// Enters the submitting state. Returns `false` if a submission is
    /// already in flight.
    pub fn begin_submit(&mut self) -> bool {
        if self.submitting {
            return false;
        }
        self.submitting = true;
        true
    }

    /// Leaves the submitting state. A successful submission completes the
    /// active step.
    pub fn finish_submit(&mut self, succeeded: bool) {
        self.submitting = false;
        if succeeded {
            self.complete_current();
        }
    }

    /// Places the navigator on `index` (clamped into range) with every
    /// earlier step completed, as after restoring a snapshot.
    pub fn restore(&mut self, index: usize) -> usize {
        let index = index.min(self.step_count - 1);
        self.completed = (0..index).collect();
        self.current = index;
        self.direction = Direction::None;
        index
    }

    /// Returns to step 0 with nothing completed.
    pub fn reset(&mut self) {
        self.current = 0;
        self.direction = Direction::None;
        self.submitting = false;
        self.completed.clear();
    }

    fn move_to(&mut self, to: usize) -> StepMove {
        let from = self.current;
        let direction = if to > from {
            Direction::Forward
        } else {
            Direction::Backward
        };
        self.current = to;
        self.direction = direction;
        tracing::debug!(from, to, ?direction, "step changed");
        StepMove {
            from,
            to,
            direction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nav(steps: usize) -> Navigator {
        Navigator::new(steps, true, JumpPolicy::CompletedOrCurrent)
    }

    #[test]
    fn test_advance_stops_at_last_step() {
        let mut n = nav(2);
        let mv = n.advance().unwrap();
        assert_eq!(
            mv,
            StepMove {
                from: 0,
                to: 1,
                direction: Direction::Forward
            }
        );
        assert!(n.is_last());
        assert!(n.advance().is_none());
        assert_eq!(n.current(), 1);
    }

    #[test]
    fn test_retreat_respects_bounds_and_setting() {
        let mut n = nav(3);
        assert!(n.retreat().is_none());
        n.advance();
        assert_eq!(n.retreat().unwrap().direction, Direction::Backward);

        let mut locked = Navigator::new(3, false, JumpPolicy::CompletedOrCurrent);
        locked.advance();
        assert!(locked.retreat().is_none());
        assert_eq!(locked.current(), 1);
    }

    #[test]
    fn test_jump_out_of_range() {
        let mut n = nav(3);
        let err = n.jump(3).unwrap_err();
        assert!(matches!(err, FormflowError::InvalidStep { index: 3, count: 3 }));
    }

    #[test]
    fn test_jump_completed_or_current() {
        let mut n = nav(4);
        assert!(n.jump(0).unwrap().is_none());
        assert!(n.jump(2).unwrap().is_none());

        n.complete_current();
        assert_eq!(n.first_incomplete(), 1);
        assert!(n.can_jump(1));
        assert!(!n.can_jump(2));

        n.advance();
        n.advance();
        assert_eq!(n.current(), 2);
        assert!(n.jump(0).unwrap().is_some());
        assert!(n.jump(2).unwrap().is_some());
        assert!(!n.can_jump(3));
    }

    #[test]
    fn test_jump_any() {
        let mut n = Navigator::new(4, true, JumpPolicy::Any);
        assert_eq!(n.jump(3).unwrap().unwrap().to, 3);
        assert!(!n.is_completed(0));
    }

    #[test]
    fn test_backward_jump_blocked_without_back_navigation() {
        let mut n = Navigator::new(3, false, JumpPolicy::Any);
        n.jump(2).unwrap();
        assert!(n.jump(0).unwrap().is_none());
        assert_eq!(n.current(), 2);
    }

    #[test]
    fn test_submit_flag() {
        let mut n = nav(1);
        assert!(n.begin_submit());
        assert!(!n.begin_submit());
        n.finish_submit(false);
        assert!(!n.is_submitting());
        assert!(!n.is_completed(0));
        assert!(n.begin_submit());
        n.finish_submit(true);
        assert!(n.is_completed(0));
    }

    #[test]
    fn test_restore_clamps_and_completes_earlier_steps() {
        let mut n = nav(3);
        assert_eq!(n.restore(7), 2);
        assert!(n.is_completed(0) && n.is_completed(1));
        assert!(!n.is_completed(2));
        n.reset();
        assert_eq!(n.current(), 0);
        assert_eq!(n.first_incomplete(), 0);
    }
}
