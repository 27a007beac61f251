//! Core types for the Stepwriter tracker
//!
//! This module defines the data that flows through the tracker: raw
//! acceleration samples, accepted step events, body parameters and the
//! aggregate tracker state exposed to readers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TrackerError;

/// Instantaneous 3-axis acceleration reading (m/s²)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleVector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl SampleVector {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean norm of the sample
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// A step accepted by the detector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    /// Tracker-relative time the step was accepted (ms)
    pub at_ms: u64,
    /// Smoothed magnitude that crossed the threshold
    pub mean_magnitude: f64,
}

/// Biological sex used by the offline stride estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[default]
    Male,
    Female,
}

/// Body parameters feeding distance and calorie estimates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyParams {
    /// Height (cm)
    pub height_cm: f64,
    /// Weight (kg)
    pub weight_kg: f64,
    #[serde(default)]
    pub gender: Gender,
}

impl Default for BodyParams {
    fn default() -> Self {
        Self {
            height_cm: 170.0,
            weight_kg: 70.0,
            gender: Gender::Male,
        }
    }
}

impl BodyParams {
    pub fn new(height_cm: f64, weight_kg: f64) -> Self {
        Self {
            height_cm,
            weight_kg,
            gender: Gender::Male,
        }
    }

    /// Reject non-finite or non-positive measurements
    pub fn validate(&self) -> Result<(), TrackerError> {
        if !self.height_cm.is_finite() || self.height_cm <= 0.0 {
            return Err(TrackerError::InvalidBodyParams(format!(
                "height must be positive, got {}",
                self.height_cm
            )));
        }
        if !self.weight_kg.is_finite() || self.weight_kg <= 0.0 {
            return Err(TrackerError::InvalidBodyParams(format!(
                "weight must be positive, got {}",
                self.weight_kg
            )));
        }
        Ok(())
    }
}

/// Identifier of the authenticated user owning a tracking session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Aggregate tracker state, published to readers as an immutable snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerState {
    /// Steps counted today
    pub step_count: u32,
    /// Energy expenditure estimate (kcal)
    pub calories_burned: f64,
    /// Distance estimate (km)
    pub kilometers: f64,
    /// Number of walking sessions opened today
    pub walk_sessions: u32,
    /// Steps per hour of active time
    pub avg_steps_per_hour: f64,
    /// Active time today (seconds)
    pub active_seconds: u64,
    /// Whether the daily goal has been met
    pub goal_reached: bool,
    /// Active minutes per step
    pub minutes_per_step: f64,
}

impl TrackerState {
    /// Active time rounded to whole minutes
    pub fn active_minutes(&self) -> u64 {
        (self.active_seconds + 30) / 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magnitude() {
        let sample = SampleVector::new(3.0, 4.0, 12.0);
        assert!((sample.magnitude() - 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_body_params_validation() {
        assert!(BodyParams::new(170.0, 70.0).validate().is_ok());
        assert!(BodyParams::new(0.0, 70.0).validate().is_err());
        assert!(BodyParams::new(170.0, f64::NAN).validate().is_err());
    }

    #[test]
    fn test_state_serializes_camel_case() {
        let state = TrackerState {
            step_count: 12,
            active_seconds: 90,
            ..Default::default()
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["stepCount"], 12);
        assert_eq!(json["activeSeconds"], 90);
        assert_eq!(state.active_minutes(), 2);
    }
}
