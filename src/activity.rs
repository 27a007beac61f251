//! Activity profiles
//!
//! Each activity kind carries a fixed heuristic: the smoothed magnitude a step
//! must exceed, the step length as a fraction of body height, the MET
//! constant and a nominal cadence.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TrackerError;

/// Kind of ambulatory activity being tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ActivityKind {
    #[serde(rename = "Slow walking")]
    SlowWalking,
    #[default]
    #[serde(rename = "Brisk walking")]
    BriskWalking,
    #[serde(rename = "Jogging")]
    Jogging,
    #[serde(rename = "Running")]
    Running,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 4] = [
        ActivityKind::SlowWalking,
        ActivityKind::BriskWalking,
        ActivityKind::Jogging,
        ActivityKind::Running,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::SlowWalking => "Slow walking",
            ActivityKind::BriskWalking => "Brisk walking",
            ActivityKind::Jogging => "Jogging",
            ActivityKind::Running => "Running",
        }
    }

    pub fn profile(&self) -> &'static ActivityProfile {
        match self {
            ActivityKind::SlowWalking => &SLOW_WALKING,
            ActivityKind::BriskWalking => &BRISK_WALKING,
            ActivityKind::Jogging => &JOGGING,
            ActivityKind::Running => &RUNNING,
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = TrackerError;

    /// Accepts display names ("Brisk walking") and kebab/snake forms ("brisk-walking").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "slowwalking" => Ok(ActivityKind::SlowWalking),
            "briskwalking" => Ok(ActivityKind::BriskWalking),
            "jogging" => Ok(ActivityKind::Jogging),
            "running" => Ok(ActivityKind::Running),
            _ => Err(TrackerError::UnknownActivity(s.to_string())),
        }
    }
}

/// Detection and energy parameters of one activity kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActivityProfile {
    /// Mean magnitude a step must exceed (m/s²)
    pub threshold: f64,
    /// Step length as a fraction of height
    pub step_length_factor: f64,
    /// Metabolic equivalent
    pub met: f64,
    /// Nominal cadence (steps per minute)
    pub steps_per_minute: f64,
}

pub const SLOW_WALKING: ActivityProfile = ActivityProfile {
    threshold: 10.5,
    step_length_factor: 0.35,
    met: 3.0,
    steps_per_minute: 120.0,
};

pub const BRISK_WALKING: ActivityProfile = ActivityProfile {
    threshold: 11.5,
    step_length_factor: 0.45,
    met: 3.8,
    steps_per_minute: 150.0,
};

pub const JOGGING: ActivityProfile = ActivityProfile {
    threshold: 13.0,
    step_length_factor: 0.65,
    met: 7.0,
    steps_per_minute: 200.0,
};

pub const RUNNING: ActivityProfile = ActivityProfile {
    threshold: 15.0,
    step_length_factor: 0.75,
    met: 10.0,
    steps_per_minute: 300.0,
};

impl ActivityProfile {
    /// Profile used when the activity kind is unknown: no sample ever
    /// crosses the threshold and no distance or energy accrues.
    pub const INERT: ActivityProfile = ActivityProfile {
        threshold: f64::INFINITY,
        step_length_factor: 0.0,
        met: 0.0,
        steps_per_minute: 0.0,
    };

    /// Resolve a profile by name, failing closed to [`ActivityProfile::INERT`]
    pub fn lookup(name: &str) -> &'static ActivityProfile {
        match name.parse::<ActivityKind>() {
            Ok(kind) => kind.profile(),
            Err(e) => {
                tracing::warn!(
                    activity = name,
                    error = %e,
                    "Falling back to inert activity profile"
                );
                &Self::INERT
            }
        }
    }

    pub fn is_inert(&self) -> bool {
        self.threshold.is_infinite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_display_names() {
        assert_eq!(
            "Brisk walking".parse::<ActivityKind>().unwrap(),
            ActivityKind::BriskWalking
        );
        assert_eq!(
            "slow-walking".parse::<ActivityKind>().unwrap(),
            ActivityKind::SlowWalking
        );
        assert_eq!("RUNNING".parse::<ActivityKind>().unwrap(), ActivityKind::Running);
    }

    #[test]
    fn test_unknown_activity_fails_closed() {
        assert!("Swimming".parse::<ActivityKind>().is_err());
        let profile = ActivityProfile::lookup("Swimming");
        assert!(profile.is_inert());
        assert!(1_000.0 <= profile.threshold);
    }

    #[test]
    fn test_serde_uses_display_names() {
        let json = serde_json::to_string(&ActivityKind::Jogging).unwrap();
        assert_eq!(json, "\"Jogging\"");
        let kind: ActivityKind = serde_json::from_str("\"Slow walking\"").unwrap();
        assert_eq!(kind, ActivityKind::SlowWalking);
    }

    #[test]
    fn test_thresholds_increase_with_intensity() {
        let thresholds: Vec<f64> = ActivityKind::ALL
            .iter()
            .map(|k| k.profile().threshold)
            .collect();
        assert!(thresholds.windows(2).all(|w| w[0] < w[1]));
    }
}
