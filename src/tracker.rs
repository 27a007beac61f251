//! Step tracker core
//!
//! [`StepTracker`] is the single owner of the live tracker state. It composes
//! the detector, the session state machine, the goal monitor and the metrics
//! calculator, and is driven by explicit millisecond timestamps so every
//! transition is deterministic. The async runtime and the FFI wrap it.

use chrono::NaiveDate;

use crate::activity::{ActivityKind, ActivityProfile};
use crate::config::{ClampPolicy, TimeUnit, TrackerConfig};
use crate::detector::StepDetector;
use crate::error::TrackerError;
use crate::goal::GoalMonitor;
use crate::metrics;
use crate::session::{SessionPhase, SessionTracker};
use crate::store::{RemoteStepRecord, StepRecordPayload};
use crate::types::{BodyParams, SampleVector, StepEvent, TrackerState, UserId};

/// Synchronous step tracking state machine
#[derive(Debug, Clone)]
pub struct StepTracker {
    config: TrackerConfig,
    activity: Option<ActivityKind>,
    profile: &'static ActivityProfile,
    body: BodyParams,
    daily_goal: i64,
    detector: StepDetector,
    session: SessionTracker,
    step_count: u32,
    state: TrackerState,
}

impl StepTracker {
    pub fn new(
        config: TrackerConfig,
        activity: ActivityKind,
        body: BodyParams,
        daily_goal: i64,
    ) -> Self {
        let detector = StepDetector::new(config.cooldown_ms);
        let mut tracker = Self {
            config,
            activity: Some(activity),
            profile: activity.profile(),
            body,
            daily_goal,
            detector,
            session: SessionTracker::new(),
            step_count: 0,
            state: TrackerState::default(),
        };
        tracker.recompute();
        tracker
    }

    /// Seed today's totals from the persisted record
    pub fn seed(&mut self, record: &RemoteStepRecord) {
        let prefer_minutes = self.config.time_unit == TimeUnit::Minutes;
        self.step_count = record.steps;
        self.session
            .seed(record.walk_sessions, record.active_seconds(prefer_minutes));
        self.recompute();
    }

    /// Feed one accelerometer sample taken at `now_ms`.
    ///
    /// Returns the accepted step, if any. Nothing is accepted once the goal
    /// is reached under [`ClampPolicy::Clamp`].
    pub fn on_sample(&mut self, sample: &SampleVector, now_ms: u64) -> Option<StepEvent> {
        if !self.is_accepting() {
            return None;
        }

        let event = self.detector.on_sample(sample, self.profile, now_ms)?;

        if self.session.on_step(now_ms) {
            tracing::debug!(
                walk_sessions = self.session.walk_sessions(),
                "Walking session opened"
            );
        }
        self.step_count = self.step_count.saturating_add(1);
        if self.config.clamp_policy == ClampPolicy::Clamp {
            self.step_count = GoalMonitor::evaluate(self.step_count, self.daily_goal).capped_steps;
        }
        self.recompute();

        if !self.is_accepting() {
            tracing::info!(steps = self.step_count, goal = self.daily_goal, "Daily goal reached");
            self.session.stop(now_ms);
        }

        Some(event)
    }

    /// Active-time tick; a no-op for active time while idle
    pub fn tick(&mut self, now_ms: u64) {
        self.session.tick(now_ms);
        self.recompute();
    }

    /// Close the open session at `now_ms`; nothing accrues until the next step
    pub fn stop_session(&mut self, now_ms: u64) {
        self.session.stop(now_ms);
        self.recompute();
    }

    /// Change the daily goal, re-evaluating goal status immediately.
    ///
    /// If the new goal is already met under [`ClampPolicy::Clamp`], the open
    /// session closes at the last tick; tick first to keep the time since.
    pub fn set_daily_goal(&mut self, daily_goal: i64) {
        self.daily_goal = daily_goal;
        self.recompute();
        if !self.is_accepting() {
            self.session.stop(self.session.last_tick_ms());
        }
    }

    /// Start a new calendar day from zero.
    ///
    /// Steps, sessions, active time and the smoothing window are cleared;
    /// goal, activity and body stay.
    pub fn reset_day(&mut self) {
        self.detector = StepDetector::new(self.config.cooldown_ms);
        self.session = SessionTracker::new();
        self.step_count = 0;
        self.recompute();
    }

    pub fn set_activity(&mut self, activity: ActivityKind) {
        self.activity = Some(activity);
        self.profile = activity.profile();
        self.recompute();
    }

    /// Select the activity by name; unknown names fail closed to the inert
    /// profile, which accepts no steps.
    pub fn set_activity_name(&mut self, name: &str) {
        self.activity = name.parse().ok();
        self.profile = ActivityProfile::lookup(name);
        self.recompute();
    }

    /// Replace body parameters; invalid ones are rejected and the previous
    /// values kept.
    pub fn set_body(&mut self, body: BodyParams) -> Result<(), TrackerError> {
        body.validate()?;
        self.body = body;
        self.recompute();
        Ok(())
    }

    /// Build the upsert payload for the current state
    pub fn payload(&self, user: &UserId, date: NaiveDate) -> StepRecordPayload {
        let active_seconds = self.session.total_active_seconds();
        StepRecordPayload {
            steps: self.state.step_count,
            calories_burned: self.state.calories_burned,
            kilometers: self.state.kilometers,
            avg_steps_per_hour: self.state.avg_steps_per_hour,
            spend_minutes: self.state.active_minutes(),
            spend_seconds: match self.config.time_unit {
                TimeUnit::Seconds => Some(active_seconds),
                TimeUnit::Minutes => None,
            },
            goal_reached: self.state.goal_reached,
            user: user.clone(),
            date,
            walk_sessions: self.state.walk_sessions,
        }
    }

    /// Confirm that a save carrying `saved_active_ms` of unsaved active time
    /// succeeded; closes the current session.
    pub fn mark_saved(&mut self, saved_active_ms: u64) {
        self.session.close_after_save(saved_active_ms);
        self.recompute();
    }

    fn recompute(&mut self) {
        let active_seconds = self.session.total_active_seconds();
        let derived = metrics::calculate(
            self.step_count,
            active_seconds,
            self.profile,
            &self.body,
            self.daily_goal,
        );
        let goal = GoalMonitor::evaluate(self.step_count, self.daily_goal);

        self.state = TrackerState {
            step_count: self.step_count,
            calories_burned: derived.calories_burned,
            kilometers: derived.kilometers,
            walk_sessions: self.session.walk_sessions(),
            avg_steps_per_hour: derived.avg_steps_per_hour,
            active_seconds,
            goal_reached: goal.goal_reached,
            minutes_per_step: derived.minutes_per_step,
        };
    }

    /// Whether the detector pipeline still accepts steps
    pub fn is_accepting(&self) -> bool {
        !(self.state.goal_reached && self.config.clamp_policy == ClampPolicy::Clamp)
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn activity(&self) -> Option<ActivityKind> {
        self.activity
    }

    pub fn daily_goal(&self) -> i64 {
        self.daily_goal
    }

    pub fn session_phase(&self) -> SessionPhase {
        self.session.phase()
    }

    pub fn unsaved_active_ms(&self) -> u64 {
        self.session.unsaved_active_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tracker(goal: i64) -> StepTracker {
        StepTracker::new(
            TrackerConfig::default(),
            ActivityKind::BriskWalking,
            BodyParams::new(170.0, 70.0),
            goal,
        )
    }

    /// Walk at 2 Hz with every sample above the brisk threshold, starting at `start_ms`
    fn walk(tracker: &mut StepTracker, start_ms: u64, samples: u64) -> usize {
        let hot = SampleVector::new(0.0, 3.0, 12.0);
        (0..samples)
            .filter_map(|i| tracker.on_sample(&hot, start_ms + i * 500))
            .count()
    }

    #[test]
    fn test_steps_update_metrics() {
        let mut t = tracker(10_000);
        let steps = walk(&mut t, 0, 30);

        // the first nine samples only fill the window
        assert_eq!(steps, 21);
        let state = t.state();
        assert_eq!(state.step_count, 21);
        assert_eq!(state.walk_sessions, 1);
        assert_eq!(state.active_seconds, 10);
        assert!(state.kilometers > 0.0);
        assert!(state.calories_burned > 0.0);
        assert!(!state.goal_reached);
    }

    #[test]
    fn test_goal_clamp_stops_counting() {
        let mut t = tracker(5);
        walk(&mut t, 0, 40);

        assert_eq!(t.state().step_count, 5);
        assert!(t.state().goal_reached);
        assert!(!t.is_accepting());

        let before = t.state().step_count;
        walk(&mut t, 100_000, 40);
        assert_eq!(t.state().step_count, before);
    }

    #[test]
    fn test_goal_clamp_stops_active_time() {
        let mut t = tracker(5);
        walk(&mut t, 0, 40);
        assert!(t.state().goal_reached);
        assert_eq!(t.session_phase(), SessionPhase::Idle);

        // session opened at 4.5 s, the fifth step landed at 6.5 s
        let at_goal = t.state().active_seconds;
        assert_eq!(at_goal, 2);

        t.tick(3_600_000);
        assert_eq!(t.state().active_seconds, at_goal);
        assert!((t.state().avg_steps_per_hour - 9_000.0).abs() < 1e-9);
        // the stopped time still goes out with the next save
        assert_eq!(t.unsaved_active_ms(), 2_000);
    }

    #[test]
    fn test_goal_lowered_below_count_stops_session() {
        let mut t = tracker(10_000);
        walk(&mut t, 0, 20);
        t.tick(20_000);
        let active = t.state().active_seconds;

        t.set_daily_goal(10);
        assert_eq!(t.session_phase(), SessionPhase::Idle);
        t.tick(60_000);
        assert_eq!(t.state().active_seconds, active);
    }

    #[test]
    fn test_reset_day_starts_from_zero() {
        let mut t = tracker(10_000);
        t.seed(&RemoteStepRecord {
            steps: 9_000,
            spend_seconds: Some(1200),
            walk_sessions: 3,
            ..Default::default()
        });
        walk(&mut t, 0, 20);
        assert_eq!(t.state().step_count, 9_011);

        t.reset_day();
        let state = t.state();
        assert_eq!(state.step_count, 0);
        assert_eq!(state.active_seconds, 0);
        assert_eq!(state.walk_sessions, 0);
        assert_eq!(t.session_phase(), SessionPhase::Idle);
        assert_eq!(t.unsaved_active_ms(), 0);
        assert_eq!(t.daily_goal(), 10_000);

        // the smoothing window refills before the first step
        assert_eq!(walk(&mut t, 100_000, 20), 11);
    }

    #[test]
    fn test_uncapped_policy_keeps_counting() {
        let config = TrackerConfig {
            clamp_policy: ClampPolicy::Uncapped,
            ..Default::default()
        };
        let mut t = StepTracker::new(
            config,
            ActivityKind::BriskWalking,
            BodyParams::default(),
            5,
        );
        walk(&mut t, 0, 40);
        assert_eq!(t.state().step_count, 31);
        assert!(t.state().goal_reached);
        assert!(t.is_accepting());
    }

    #[test]
    fn test_goal_change_reevaluates_immediately() {
        let mut t = tracker(10_000);
        walk(&mut t, 0, 20);
        assert_eq!(t.state().step_count, 11);
        assert!(!t.state().goal_reached);

        t.set_daily_goal(10);
        assert!(t.state().goal_reached);
        assert!(!t.is_accepting());

        t.set_daily_goal(0);
        assert!(!t.state().goal_reached);
        assert!(t.is_accepting());
    }

    #[test]
    fn test_seed_from_record() {
        let mut t = tracker(10_000);
        t.seed(&RemoteStepRecord {
            steps: 500,
            spend_seconds: Some(1200),
            walk_sessions: 3,
            ..Default::default()
        });

        let state = t.state();
        assert_eq!(state.step_count, 500);
        assert_eq!(state.active_seconds, 1200);
        assert_eq!(state.walk_sessions, 3);
        assert!((state.avg_steps_per_hour - 1500.0).abs() < 1e-9);
        assert_eq!(t.session_phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_unknown_activity_accepts_nothing() {
        let mut t = tracker(10_000);
        t.set_activity_name("Swimming");
        assert_eq!(t.activity(), None);
        assert_eq!(walk(&mut t, 0, 50), 0);
        assert_eq!(t.state().kilometers, 0.0);
    }

    #[test]
    fn test_invalid_body_keeps_previous() {
        let mut t = tracker(10_000);
        walk(&mut t, 0, 20);
        let km = t.state().kilometers;
        assert!(t.set_body(BodyParams::new(-1.0, 70.0)).is_err());
        assert_eq!(t.state().kilometers, km);

        t.set_body(BodyParams::new(200.0, 70.0)).unwrap();
        assert!(t.state().kilometers > km);
    }

    #[test]
    fn test_payload_and_mark_saved() {
        let mut t = tracker(10_000);
        walk(&mut t, 0, 20);
        t.tick(60_000);

        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let payload = t.payload(&UserId::new("u-1"), date);
        assert_eq!(payload.steps, 11);
        // session opened with the first step at 4.5 s
        assert_eq!(payload.spend_seconds, Some(55));
        assert_eq!(payload.spend_minutes, 1);
        assert_eq!(payload.walk_sessions, 1);

        t.mark_saved(t.unsaved_active_ms());
        assert_eq!(t.session_phase(), SessionPhase::Idle);
        assert_eq!(t.unsaved_active_ms(), 0);
        assert_eq!(t.state().active_seconds, 55);

        // idle time is not counted, the next step opens session two
        t.tick(120_000);
        assert_eq!(t.state().active_seconds, 55);
        walk(&mut t, 200_000, 1);
        assert_eq!(t.state().walk_sessions, 2);
    }
}
