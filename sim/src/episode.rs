//! Episode termination and reward shaping for the learning controller.
//!
//! The kernel itself never ends an episode. A controller calls
//! [`EpisodeTracker::step`] once per action and resets the environment when
//! the returned outcome is terminal.

use crate::api::EnvironmentHandle;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// A member closer than this to the target has reached it.
pub const SUCCESS_RADIUS: f32 = 1.5;
/// A member below this height has fallen out of the world.
pub const FALL_HEIGHT: f32 = -2.0;
/// Bonus per member that reached the target this step.
pub const SUCCESS_REWARD: f32 = 1.0;
/// Penalty per member that fell this step.
pub const FALL_PENALTY: f32 = 1.0;
/// Constant per-step penalty.
pub const STEP_PENALTY: f32 = 0.0005;
/// Steps before an episode is cut short.
pub const DEFAULT_MAX_STEPS: u32 = 5000;

/// State of an episode after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodeOutcome {
    Running,
    /// At least one member reached the target.
    Success,
    /// At least one member fell below [`FALL_HEIGHT`].
    Failure,
    /// The step limit was hit first.
    Truncated,
}

impl EpisodeOutcome {
    pub fn is_terminal(self) -> bool {
        !matches!(self, EpisodeOutcome::Running)
    }
}

/// Result of evaluating one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepResult {
    pub reward: f32,
    pub outcome: EpisodeOutcome,
    /// Members within [`SUCCESS_RADIUS`] of the target.
    pub reached: usize,
    /// Members below [`FALL_HEIGHT`].
    pub fallen: usize,
}

/// Per-environment episode bookkeeping.
///
/// Progress reward is the drop in member-to-target distance since the last
/// measurement. The previous distance is a single running value walked
/// through the members in order, so with several members each one is
/// compared against the member before it.
#[derive(Debug, Clone)]
pub struct EpisodeTracker {
    max_steps: u32,
    steps: u32,
    prev_distance: f32,
    total_reward: f32,
}

impl Default for EpisodeTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STEPS)
    }
}

impl EpisodeTracker {
    /// `max_steps == 0` disables truncation.
    pub fn new(max_steps: u32) -> Self {
        Self {
            max_steps,
            steps: 0,
            prev_distance: 0.0,
            total_reward: 0.0,
        }
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Reward accumulated since the last `begin`.
    pub fn total_reward(&self) -> f32 {
        self.total_reward
    }

    /// Start bookkeeping for a fresh episode.
    ///
    /// `first_member` seeds the progress baseline; without it the baseline is
    /// taken on the first evaluated step.
    pub fn begin(&mut self, first_member: Option<Vec3>, target: Vec3) {
        self.steps = 0;
        self.total_reward = 0.0;
        self.prev_distance = first_member.map_or(0.0, |p| p.distance(target));
    }

    /// Score one step from member positions and the target position.
    pub fn evaluate(&mut self, positions: &[Vec3], target: Vec3) -> StepResult {
        self.steps += 1;

        let mut reward = 0.0;
        let mut reached = 0;
        let mut fallen = 0;

        for position in positions {
            let distance = position.distance(target);
            if self.prev_distance == 0.0 {
                self.prev_distance = distance;
            }
            reward += self.prev_distance - distance;
            self.prev_distance = distance;

            if distance < SUCCESS_RADIUS {
                reached += 1;
                reward += SUCCESS_REWARD;
            }
            if position.y < FALL_HEIGHT {
                fallen += 1;
                reward -= FALL_PENALTY;
            }
        }
        reward -= STEP_PENALTY;
        self.total_reward += reward;

        let outcome = if reached > 0 {
            EpisodeOutcome::Success
        } else if fallen > 0 {
            EpisodeOutcome::Failure
        } else {
            self.limit_outcome()
        };

        StepResult {
            reward,
            outcome,
            reached,
            fallen,
        }
    }

    /// Reset the environment and start a new episode on it.
    pub fn start(&mut self, env: &mut EnvironmentHandle<'_>) {
        env.reset_episode();
        let first = (env.is_ready() && env.member_count() > 0).then(|| env.member_state(0).position);
        self.begin(first, env.target_position());
    }

    /// Score the environment's current state.
    ///
    /// An environment that is not ready yet earns nothing, but the step still
    /// counts toward the limit.
    pub fn step(&mut self, env: &EnvironmentHandle<'_>) -> StepResult {
        if !env.is_ready() {
            self.steps += 1;
            return StepResult {
                reward: 0.0,
                outcome: self.limit_outcome(),
                reached: 0,
                fallen: 0,
            };
        }

        let positions: Vec<Vec3> = (0..env.member_count())
            .map(|i| env.member_state(i).position)
            .collect();
        self.evaluate(&positions, env.target_position())
    }

    fn limit_outcome(&self) -> EpisodeOutcome {
        if self.max_steps > 0 && self.steps >= self.max_steps {
            EpisodeOutcome::Truncated
        } else {
            EpisodeOutcome::Running
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-5, "{a} != {b}");
    }

    #[test]
    fn test_progress_reward() {
        let target = Vec3::new(0.0, 0.5, 15.0);
        let mut tracker = EpisodeTracker::default();
        tracker.begin(Some(Vec3::new(0.0, 0.5, 0.0)), target);

        let result = tracker.evaluate(&[Vec3::new(0.0, 0.5, 1.0)], target);
        assert_close(result.reward, 1.0 - STEP_PENALTY);
        assert_eq!(result.outcome, EpisodeOutcome::Running);

        // Moving away is penalized.
        let result = tracker.evaluate(&[Vec3::new(0.0, 0.5, -1.0)], target);
        assert_close(result.reward, -2.0 - STEP_PENALTY);
        assert_close(tracker.total_reward(), -1.0 - 2.0 * STEP_PENALTY);
    }

    #[test]
    fn test_baseline_taken_on_first_step_without_member() {
        let target = Vec3::new(10.0, 0.0, 0.0);
        let mut tracker = EpisodeTracker::default();
        tracker.begin(None, target);

        let result = tracker.evaluate(&[Vec3::ZERO], target);
        assert_close(result.reward, -STEP_PENALTY);
    }

    #[test]
    fn test_success_when_any_member_reaches_target() {
        let target = Vec3::new(0.0, 0.5, 5.0);
        let mut tracker = EpisodeTracker::default();
        tracker.begin(Some(Vec3::new(0.0, 0.5, 4.0)), target);

        let result = tracker.evaluate(&[Vec3::new(0.0, 0.5, 4.0), Vec3::new(0.0, 0.5, -20.0)], target);
        assert_eq!(result.outcome, EpisodeOutcome::Success);
        assert_eq!(result.reached, 1);
        assert!(result.outcome.is_terminal());
    }

    #[test]
    fn test_failure_when_member_falls() {
        let target = Vec3::new(0.0, 0.5, 15.0);
        let mut tracker = EpisodeTracker::default();
        tracker.begin(Some(Vec3::new(0.0, -3.0, 0.0)), target);

        let result = tracker.evaluate(&[Vec3::new(0.0, -3.0, 0.0)], target);
        assert_eq!(result.outcome, EpisodeOutcome::Failure);
        assert_eq!(result.fallen, 1);
        assert_close(result.reward, -FALL_PENALTY - STEP_PENALTY);
    }

    #[test]
    fn test_success_takes_precedence_over_failure() {
        let target = Vec3::new(0.0, -2.5, 0.0);
        let mut tracker = EpisodeTracker::default();
        tracker.begin(None, target);

        let result = tracker.evaluate(&[Vec3::new(0.0, -3.0, 0.0)], target);
        assert_eq!(result.outcome, EpisodeOutcome::Success);
    }

    #[test]
    fn test_truncation_at_step_limit() {
        let target = Vec3::new(0.0, 0.5, 15.0);
        let mut tracker = EpisodeTracker::new(3);
        tracker.begin(None, target);

        let position = [Vec3::new(0.0, 0.5, 0.0)];
        assert_eq!(tracker.evaluate(&position, target).outcome, EpisodeOutcome::Running);
        assert_eq!(tracker.evaluate(&position, target).outcome, EpisodeOutcome::Running);
        assert_eq!(tracker.evaluate(&position, target).outcome, EpisodeOutcome::Truncated);
        assert_eq!(tracker.steps(), 3);

        tracker.begin(None, target);
        assert_eq!(tracker.steps(), 0);

        let mut unlimited = EpisodeTracker::new(0);
        unlimited.begin(None, target);
        for _ in 0..10 {
            assert_eq!(unlimited.evaluate(&position, target).outcome, EpisodeOutcome::Running);
        }
    }
}
