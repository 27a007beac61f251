//! Walking session state machine
//!
//! A session opens on the first accepted step while idle. It closes when the
//! pending progress has been saved, or when tracking stops (goal reached,
//! sensor gone). While a session is open, active time accrues on every tick
//! and every step, whether or not the user keeps moving.

use serde::{Deserialize, Serialize};

/// Session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Active { started_at_ms: u64 },
}

/// Tracks session count and accumulated active time
#[derive(Debug, Clone)]
pub struct SessionTracker {
    phase: SessionPhase,
    walk_sessions: u32,
    /// Active time carried over from the store (ms)
    seeded_active_ms: u64,
    /// Active time accrued since the last confirmed save (ms)
    unsaved_active_ms: u64,
    last_tick_ms: u64,
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTracker {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            walk_sessions: 0,
            seeded_active_ms: 0,
            unsaved_active_ms: 0,
            last_tick_ms: 0,
        }
    }

    /// Start from persisted totals
    pub fn seed(&mut self, walk_sessions: u32, active_seconds: u64) {
        self.walk_sessions = walk_sessions;
        self.seeded_active_ms = active_seconds.saturating_mul(1000);
        self.unsaved_active_ms = 0;
    }

    /// Record an accepted step, opening a session if idle.
    ///
    /// Returns `true` when this step opened a new session.
    pub fn on_step(&mut self, now_ms: u64) -> bool {
        let opened = match self.phase {
            SessionPhase::Idle => {
                self.phase = SessionPhase::Active {
                    started_at_ms: now_ms,
                };
                self.walk_sessions = self.walk_sessions.saturating_add(1);
                self.last_tick_ms = now_ms;
                true
            }
            SessionPhase::Active { .. } => false,
        };
        self.tick(now_ms);
        opened
    }

    /// Fold wall-clock time since the previous tick into active time.
    ///
    /// Idle time is never accumulated; the tick reference still advances so
    /// a later session does not inherit it.
    pub fn tick(&mut self, now_ms: u64) {
        if self.is_active() {
            let elapsed = now_ms.saturating_sub(self.last_tick_ms);
            self.unsaved_active_ms = self.unsaved_active_ms.saturating_add(elapsed);
        }
        self.last_tick_ms = self.last_tick_ms.max(now_ms);
    }

    /// Stop tracking at `now_ms`: fold the time up to it and go idle.
    ///
    /// Unsaved active time is kept for the next save.
    pub fn stop(&mut self, now_ms: u64) {
        self.tick(now_ms);
        self.phase = SessionPhase::Idle;
    }

    /// Close the current session after a confirmed save of `saved_active_ms`
    /// of active time.
    pub fn close_after_save(&mut self, saved_active_ms: u64) {
        let saved = saved_active_ms.min(self.unsaved_active_ms);
        self.seeded_active_ms = self.seeded_active_ms.saturating_add(saved);
        self.unsaved_active_ms -= saved;
        self.phase = SessionPhase::Idle;
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, SessionPhase::Active { .. })
    }

    pub fn walk_sessions(&self) -> u32 {
        self.walk_sessions
    }

    pub fn last_tick_ms(&self) -> u64 {
        self.last_tick_ms
    }

    pub fn unsaved_active_ms(&self) -> u64 {
        self.unsaved_active_ms
    }

    /// Total active time today, saved and unsaved (ms)
    pub fn total_active_ms(&self) -> u64 {
        self.seeded_active_ms.saturating_add(self.unsaved_active_ms)
    }

    pub fn total_active_seconds(&self) -> u64 {
        self.total_active_ms() / 1000
    }
}
