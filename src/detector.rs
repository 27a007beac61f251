//! Step detection
//!
//! A trailing-average low-pass filter over acceleration magnitude with a
//! cooldown between accepted steps. This is not a peak detector: cadences
//! above roughly 3.3 Hz are under-counted, and sustained vibration above the
//! threshold (vehicle motion) is counted since there is no upper bound.

use std::collections::VecDeque;

use crate::activity::ActivityProfile;
use crate::config::{DEFAULT_COOLDOWN_MS, WINDOW_SIZE};
use crate::types::{SampleVector, StepEvent};

/// Fixed-size FIFO of the most recent magnitude readings
#[derive(Debug, Clone)]
pub struct SmoothingWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl Default for SmoothingWindow {
    fn default() -> Self {
        Self::new(WINDOW_SIZE)
    }
}

impl SmoothingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a reading, evicting the oldest once at capacity
    pub fn push(&mut self, value: f64) {
        self.values.push_back(value);
        while self.values.len() > self.capacity {
            self.values.pop_front();
        }
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Arithmetic mean of the window, `None` while empty
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let sum: f64 = self.values.iter().sum();
        Some(sum / self.values.len() as f64)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Threshold-and-cooldown step detector
#[derive(Debug, Clone)]
pub struct StepDetector {
    window: SmoothingWindow,
    cooldown_ms: u64,
    last_step_ms: Option<u64>,
}

impl Default for StepDetector {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN_MS)
    }
}

impl StepDetector {
    pub fn new(cooldown_ms: u64) -> Self {
        Self {
            window: SmoothingWindow::default(),
            cooldown_ms,
            last_step_ms: None,
        }
    }

    /// Feed one sample taken at `now_ms`.
    ///
    /// Emits a step when the window is full, its mean exceeds the profile
    /// threshold and more than the cooldown has elapsed since the last step.
    pub fn on_sample(
        &mut self,
        sample: &SampleVector,
        profile: &ActivityProfile,
        now_ms: u64,
    ) -> Option<StepEvent> {
        self.window.push(sample.magnitude());

        if !self.window.is_full() {
            return None;
        }

        let mean = self.window.mean()?;
        if mean <= profile.threshold || !self.cooled_down(now_ms) {
            return None;
        }

        self.last_step_ms = Some(now_ms);
        Some(StepEvent {
            at_ms: now_ms,
            mean_magnitude: mean,
        })
    }

    fn cooled_down(&self, now_ms: u64) -> bool {
        match self.last_step_ms {
            Some(last) => now_ms.saturating_sub(last) > self.cooldown_ms,
            None => true,
        }
    }

    pub fn last_step_ms(&self) -> Option<u64> {
        self.last_step_ms
    }

    pub fn window(&self) -> &SmoothingWindow {
        &self.window
    }

    /// Drop buffered readings, e.g. after the sensor was resubscribed
    pub fn reset_window(&mut self) {
        self.window.clear();
    }
}
