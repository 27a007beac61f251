//! Tracker configuration
//!
//! Timing constants and the policies that distinguish historical tracker
//! variants (goal clamping, active-time resolution) live here so a single
//! tracker implementation can reproduce each of them.

use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

/// Number of magnitude readings averaged before threshold comparison
pub const WINDOW_SIZE: usize = 10;

/// Default minimum time between two accepted steps
pub const DEFAULT_COOLDOWN_MS: u64 = 300;

/// Default quiet period before accumulated steps are saved
pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 2_000;

/// Default period of the active-time ticker
pub const DEFAULT_ACTIVE_TICK_SECS: u64 = 10;

/// Longest accepted active-time ticker period
pub const MAX_ACTIVE_TICK_SECS: u64 = 3_600;

/// What happens to steps detected after the daily goal is met
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClampPolicy {
    /// Stop accepting steps once the goal is reached
    #[default]
    Clamp,
    /// Flag the goal but keep counting
    Uncapped,
}

/// Resolution the backend stores active time in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    #[default]
    Seconds,
    Minutes,
}

/// Tracker timing and policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimum time between accepted steps (ms)
    pub cooldown_ms: u64,
    /// Debounce delay before saving pending steps (ms)
    pub save_debounce_ms: u64,
    /// Active-time ticker period (s)
    pub active_tick_secs: u64,
    pub clamp_policy: ClampPolicy,
    pub time_unit: TimeUnit,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            save_debounce_ms: DEFAULT_SAVE_DEBOUNCE_MS,
            active_tick_secs: DEFAULT_ACTIVE_TICK_SECS,
            clamp_policy: ClampPolicy::Clamp,
            time_unit: TimeUnit::Seconds,
        }
    }
}

impl TrackerConfig {
    /// Load a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, TrackerError> {
        let config: TrackerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, TrackerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.save_debounce_ms == 0 {
            return Err(TrackerError::InvalidConfig(
                "save_debounce_ms must be greater than zero".to_string(),
            ));
        }
        if self.active_tick_secs == 0 || self.active_tick_secs > MAX_ACTIVE_TICK_SECS {
            return Err(TrackerError::InvalidConfig(format!(
                "active_tick_secs must be between 1 and {MAX_ACTIVE_TICK_SECS}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = TrackerConfig::from_json("{}").unwrap();
        assert_eq!(config, TrackerConfig::default());
        assert_eq!(config.cooldown_ms, 300);
        assert_eq!(config.save_debounce_ms, 2_000);
    }

    #[test]
    fn test_partial_override() {
        let config =
            TrackerConfig::from_json(r#"{"clamp_policy": "uncapped", "time_unit": "minutes"}"#)
                .unwrap();
        assert_eq!(config.clamp_policy, ClampPolicy::Uncapped);
        assert_eq!(config.time_unit, TimeUnit::Minutes);
        assert_eq!(config.active_tick_secs, DEFAULT_ACTIVE_TICK_SECS);
    }

    #[test]
    fn test_rejects_zero_debounce() {
        let result = TrackerConfig::from_json(r#"{"save_debounce_ms": 0}"#);
        assert!(matches!(result, Err(TrackerError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_out_of_range_tick() {
        for json in [
            r#"{"active_tick_secs": 0}"#,
            r#"{"active_tick_secs": 18446744073709551615}"#,
        ] {
            let result = TrackerConfig::from_json(json);
            assert!(matches!(result, Err(TrackerError::InvalidConfig(_))), "{json}");
        }
        assert!(TrackerConfig::from_json(r#"{"active_tick_secs": 3600}"#).is_ok());
    }

    #[test]
    fn test_invalid_json() {
        assert!(TrackerConfig::from_json("not json").is_err());
    }
}
