//! Metrics derivation
//!
//! Pure functions mapping a step count and active duration to distance,
//! energy, pace and goal status. Every output is recomputed from the totals
//! on each call; nothing is updated incrementally.

use serde::{Deserialize, Serialize};

use crate::activity::ActivityProfile;
use crate::error::TrackerError;
use crate::types::{BodyParams, Gender};

/// Derived metrics for a step total
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub kilometers: f64,
    pub calories_burned: f64,
    pub avg_steps_per_hour: f64,
    pub minutes_per_step: f64,
    pub goal_reached: bool,
}

/// Compute metrics for `total_steps` over `active_seconds` of activity.
///
/// The calorie model assumes a fixed cadence of two steps per second
/// (`steps / 120` minutes) regardless of the actual pace. A `daily_goal` of
/// zero or less disables goal tracking.
pub fn calculate(
    total_steps: u32,
    active_seconds: u64,
    profile: &ActivityProfile,
    body: &BodyParams,
    daily_goal: i64,
) -> Metrics {
    let steps = f64::from(total_steps);
    let active = active_seconds as f64;

    let step_length_cm = body.height_cm * profile.step_length_factor;
    let kilometers = steps * step_length_cm / 100_000.0;
    let calories_burned = (profile.met * 3.5 * body.weight_kg / 200.0) * (steps / 120.0);

    let avg_steps_per_hour = if active_seconds > 0 {
        steps / active * 3600.0
    } else {
        0.0
    };
    let minutes_per_step = if total_steps > 0 {
        active / (steps * 60.0)
    } else {
        0.0
    };

    Metrics {
        kilometers,
        calories_burned,
        avg_steps_per_hour,
        minutes_per_step,
        goal_reached: daily_goal > 0 && i64::from(total_steps) >= daily_goal,
    }
}

/// Standalone metrics query, as accepted over FFI and by the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsRequest {
    pub total_steps: u32,
    #[serde(default)]
    pub active_seconds: u64,
    /// Activity display name; unknown names produce zero distance and energy
    pub activity: String,
    #[serde(default)]
    pub body: BodyParams,
    #[serde(default)]
    pub daily_goal: i64,
}

impl MetricsRequest {
    pub fn from_json(json: &str) -> Result<Self, TrackerError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn evaluate(&self) -> Result<Metrics, TrackerError> {
        self.body.validate()?;
        let profile = ActivityProfile::lookup(&self.activity);
        Ok(calculate(
            self.total_steps,
            self.active_seconds,
            profile,
            &self.body,
            self.daily_goal,
        ))
    }
}

/// Rough day summary from a bare step count
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkEstimate {
    pub calories_burned: f64,
    pub kilometers: f64,
    pub avg_steps_per_hour: f64,
    pub spend_minutes: u64,
}

/// Estimate a day's walk when only the step count is known.
///
/// Stride comes from height and sex, duration from the profile's nominal
/// cadence, and energy from MET × weight × hours. Values are rounded to two
/// decimals.
pub fn estimate_walk_metrics(
    steps: u32,
    body: &BodyParams,
    profile: &ActivityProfile,
) -> WalkEstimate {
    let stride_cm = match body.gender {
        Gender::Male => body.height_cm * 0.415,
        Gender::Female => body.height_cm * 0.413,
    };
    let steps = f64::from(steps);
    let kilometers = steps * stride_cm / 100_000.0;

    let minutes = if profile.steps_per_minute > 0.0 {
        steps / profile.steps_per_minute
    } else {
        0.0
    };
    let calories_burned = profile.met * body.weight_kg * (minutes / 60.0);
    let avg_steps_per_hour = if minutes > 0.0 {
        steps / minutes * 60.0
    } else {
        0.0
    };

    WalkEstimate {
        calories_burned: round2(calories_burned),
        kilometers: round2(kilometers),
        avg_steps_per_hour: round2(avg_steps_per_hour),
        spend_minutes: minutes.round() as u64,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
