//! Time sources and timers
//!
//! The tracker core never reads the wall clock directly. It receives
//! millisecond timestamps from a [`Clock`], and the save debounce is a plain
//! deadline ([`Debounce`]) the owner polls or sleeps until. Under a paused
//! tokio runtime both advance on virtual time.

use std::sync::Mutex;

use chrono::{Local, NaiveDate};
use tokio::time::Instant;

/// Source of tracker-relative time and of the current calendar day
pub trait Clock: Send + Sync {
    /// Milliseconds since the clock was created
    fn now_ms(&self) -> u64;

    /// Calendar day records are filed under
    fn today(&self) -> NaiveDate;

    /// Timer instant at which [`Clock::now_ms`] reads `ms`
    fn instant_at(&self, ms: u64) -> Instant;
}

/// Monotonic clock backed by the tokio timer, so paused test runtimes
/// advance it virtually.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn instant_at(&self, ms: u64) -> Instant {
        self.origin + std::time::Duration::from_millis(ms)
    }
}

/// Clock whose calendar day is set by hand.
///
/// Milliseconds follow the tokio timer like [`SystemClock`]; the day only
/// changes through [`ManualClock::set_today`].
#[derive(Debug)]
pub struct ManualClock {
    timer: SystemClock,
    today: Mutex<NaiveDate>,
}

impl ManualClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            timer: SystemClock::new(),
            today: Mutex::new(today),
        }
    }

    pub fn set_today(&self, today: NaiveDate) {
        match self.today.lock() {
            Ok(mut day) => *day = today,
            Err(poisoned) => *poisoned.into_inner() = today,
        }
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.timer.now_ms()
    }

    fn today(&self) -> NaiveDate {
        match self.today.lock() {
            Ok(day) => *day,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn instant_at(&self, ms: u64) -> Instant {
        self.timer.instant_at(ms)
    }
}

/// Cancellable debounce deadline.
///
/// Each trigger replaces the pending deadline, so a burst of triggers
/// separated by less than the delay fires once, `delay_ms` after the last.
#[derive(Debug, Clone)]
pub struct Debounce {
    delay_ms: u64,
    deadline_ms: Option<u64>,
}

impl Debounce {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            deadline_ms: None,
        }
    }

    /// (Re)start the timer from `now_ms`
    pub fn trigger(&mut self, now_ms: u64) {
        self.deadline_ms = Some(now_ms.saturating_add(self.delay_ms));
    }

    pub fn cancel(&mut self) {
        self.deadline_ms = None;
    }

    pub fn deadline_ms(&self) -> Option<u64> {
        self.deadline_ms
    }

    pub fn is_armed(&self) -> bool {
        self.deadline_ms.is_some()
    }

    /// Returns `true` once when the deadline has passed, disarming the timer
    pub fn fire_if_due(&mut self, now_ms: u64) -> bool {
        match self.deadline_ms {
            Some(deadline) if now_ms >= deadline => {
                self.deadline_ms = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debounce_coalesces_triggers() {
        let mut debounce = Debounce::new(2_000);
        let mut fired = 0;
        for t in (0..10_000u64).step_by(500) {
            debounce.trigger(t);
            if debounce.fire_if_due(t) {
                fired += 1;
            }
        }
        assert_eq!(fired, 0);
        assert_eq!(debounce.deadline_ms(), Some(9_500 + 2_000));

        assert!(!debounce.fire_if_due(11_499));
        assert!(debounce.fire_if_due(11_500));
        assert!(!debounce.fire_if_due(20_000));
    }

    #[test]
    fn test_debounce_cancel() {
        let mut debounce = Debounce::new(2_000);
        debounce.trigger(0);
        debounce.cancel();
        assert!(!debounce.is_armed());
        assert!(!debounce.fire_if_due(5_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_system_clock_follows_paused_time() {
        let clock = SystemClock::new();
        tokio::time::advance(std::time::Duration::from_millis(1_500)).await;
        assert_eq!(clock.now_ms(), 1_500);
        assert_eq!(clock.instant_at(1_500), Instant::now());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_clock_day_is_set_by_hand() {
        let monday = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let clock = ManualClock::new(monday);
        tokio::time::advance(std::time::Duration::from_secs(86_400)).await;
        assert_eq!(clock.today(), monday);
        assert_eq!(clock.now_ms(), 86_400_000);

        clock.set_today(monday.succ_opt().unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 1, 16).unwrap());
    }
}
