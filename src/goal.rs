//! Daily goal evaluation

use serde::{Deserialize, Serialize};

/// Outcome of comparing the live step count with the daily goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalStatus {
    pub goal_reached: bool,
    /// Step count as displayed against the goal
    pub capped_steps: u32,
}

/// Compares step counts against a daily goal.
///
/// The goal is passed on every call rather than stored, so edits to it take
/// effect on the next evaluation.
pub struct GoalMonitor;

impl GoalMonitor {
    /// Evaluate `current_steps` against `daily_goal`.
    ///
    /// A goal of zero or less disables tracking: never reached, no cap.
    pub fn evaluate(current_steps: u32, daily_goal: i64) -> GoalStatus {
        if daily_goal <= 0 {
            return GoalStatus {
                goal_reached: false,
                capped_steps: current_steps,
            };
        }

        if i64::from(current_steps) >= daily_goal {
            GoalStatus {
                goal_reached: true,
                capped_steps: u32::try_from(daily_goal).unwrap_or(u32::MAX),
            }
        } else {
            GoalStatus {
                goal_reached: false,
                capped_steps: current_steps,
            }
        }
    }
}

/// Share of the daily goal completed, 0-100
pub fn daily_progress_percent(daily_goal: i64, steps: i64) -> f64 {
    if daily_goal <= 0 || steps < 0 {
        return 0.0;
    }
    (steps as f64 / daily_goal as f64 * 100.0).min(100.0)
}
