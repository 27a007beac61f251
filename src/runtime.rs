//! Async tracker service
//!
//! A single actor task owns the [`StepTracker`] and the [`SyncCoordinator`]
//! and multiplexes sensor samples, active-time ticks, the save debounce,
//! configuration commands and push completions. Callers talk to it through a
//! [`TrackerHandle`]: snapshots arrive on a `watch` channel and user-facing
//! notices on a `broadcast` channel.
//!
//! The actor files every save under the day it started tracking. When the
//! clock reports a new day, pending progress is flushed under the old date
//! and the tracker starts over from zero.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::activity::ActivityKind;
use crate::config::TrackerConfig;
use crate::device::DeviceProbe;
use crate::error::TrackerError;
use crate::scheduler::{Clock, SystemClock};
use crate::store::StepStore;
use crate::sync::{self, PushDisposition, PushOutcome, PushResult, SyncCoordinator};
use crate::tracker::StepTracker;
use crate::types::{BodyParams, SampleVector, TrackerState, UserId};

const COMMAND_CAPACITY: usize = 32;
const NOTICE_CAPACITY: usize = 16;

/// Platform accelerometer
pub trait AccelerometerSource: Send + Sync {
    /// Start receiving samples. Returns `None` when the sensor is unavailable.
    /// Dropping the receiver unsubscribes.
    fn subscribe(&self) -> Option<mpsc::Receiver<SampleVector>>;
}

/// Accelerometer fed through an in-process channel
#[derive(Debug)]
pub struct ChannelAccelerometer {
    receiver: Mutex<Option<mpsc::Receiver<SampleVector>>>,
    subscribed: AtomicBool,
}

impl ChannelAccelerometer {
    /// Create the source and the sender that feeds it
    pub fn new(capacity: usize) -> (Self, mpsc::Sender<SampleVector>) {
        let (tx, rx) = mpsc::channel(capacity);
        let source = Self {
            receiver: Mutex::new(Some(rx)),
            subscribed: AtomicBool::new(false),
        };
        (source, tx)
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }
}

impl AccelerometerSource for ChannelAccelerometer {
    fn subscribe(&self) -> Option<mpsc::Receiver<SampleVector>> {
        let receiver = match self.receiver.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if receiver.is_some() {
            self.subscribed.store(true, Ordering::SeqCst);
        }
        receiver
    }
}

/// Everything the service needs to start
#[derive(Debug, Clone)]
pub struct TrackerOptions {
    pub config: TrackerConfig,
    pub activity: ActivityKind,
    pub body: BodyParams,
    pub daily_goal: i64,
    /// Authenticated user; without one nothing is pulled or pushed
    pub user: Option<UserId>,
}

impl TrackerOptions {
    pub fn new(user: Option<UserId>, daily_goal: i64) -> Self {
        Self {
            config: TrackerConfig::default(),
            activity: ActivityKind::default(),
            body: BodyParams::default(),
            daily_goal,
            user,
        }
    }
}

/// Injected platform and backend services
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn StepStore>,
    pub probe: Arc<dyn DeviceProbe>,
    pub sensor: Arc<dyn AccelerometerSource>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Collaborators on the system clock
    pub fn new(
        store: Arc<dyn StepStore>,
        probe: Arc<dyn DeviceProbe>,
        sensor: Arc<dyn AccelerometerSource>,
    ) -> Self {
        Self {
            store,
            probe,
            sensor,
            clock: Arc::new(SystemClock::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// User-facing notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A save failed; the unsaved steps are kept for the next attempt
    SaveFailed(String),
    /// The daily goal was just reached
    GoalReached { steps: u32 },
}

#[derive(Debug)]
enum Command {
    SetDailyGoal(i64),
    SetActivity(ActivityKind),
    SetActivityName(String),
    SetBody(BodyParams, oneshot::Sender<Result<(), TrackerError>>),
    Shutdown,
}

/// Handle to a running tracker service.
///
/// Dropping the handle stops the service.
#[derive(Debug)]
pub struct TrackerHandle {
    instance_id: Uuid,
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<TrackerState>,
    notices: broadcast::Sender<Notice>,
    task: Option<JoinHandle<()>>,
}

impl TrackerHandle {
    /// Start the service.
    ///
    /// Today's record is pulled and seeded before the sensor is subscribed,
    /// so the first snapshot already carries the persisted totals. On a
    /// synthetic device the sensor is never subscribed.
    pub async fn start(options: TrackerOptions, collaborators: Collaborators) -> Self {
        let instance_id = Uuid::new_v4();
        let clock = Arc::clone(&collaborators.clock);
        let day = clock.today();
        let TrackerOptions {
            config,
            activity,
            body,
            daily_goal,
            user,
        } = options;

        let tick_period = Duration::from_secs(config.active_tick_secs);
        let mut tracker = StepTracker::new(config, activity, body, daily_goal);
        let sync = SyncCoordinator::new(user, tracker.config().save_debounce_ms);

        if let Some(record) =
            sync::pull_today(collaborators.store.as_ref(), sync.user(), day).await
        {
            tracker.seed(&record);
        }

        let sensor = if collaborators.probe.is_synthetic_device().await {
            info!(%instance_id, "Synthetic device detected, step tracking disabled");
            None
        } else {
            let receiver = collaborators.sensor.subscribe();
            if receiver.is_none() {
                warn!(%instance_id, "Accelerometer unavailable");
            }
            receiver
        };

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (state_tx, state_rx) = watch::channel(tracker.state().clone());
        let (notice_tx, _) = broadcast::channel(NOTICE_CAPACITY);
        let (push_tx, push_rx) = mpsc::unbounded_channel();

        let actor = TrackerActor {
            goal_reached: tracker.state().goal_reached,
            tracker,
            sync,
            clock,
            day,
            store: collaborators.store,
            probe: collaborators.probe,
            sensor,
            commands: command_rx,
            state: state_tx,
            notices: notice_tx.clone(),
            push_tx,
            push_rx,
            push_task: None,
            rollover_task: None,
        };
        debug!(%instance_id, "Starting tracker service");
        let task = tokio::spawn(actor.run(tick_period));

        Self {
            instance_id,
            commands: command_tx,
            state: state_rx,
            notices: notice_tx,
            task: Some(task),
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Latest published state
    pub fn snapshot(&self) -> TrackerState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn watch(&self) -> watch::Receiver<TrackerState> {
        self.state.clone()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub async fn set_daily_goal(&self, daily_goal: i64) -> Result<(), TrackerError> {
        self.send(Command::SetDailyGoal(daily_goal)).await
    }

    pub async fn set_activity(&self, activity: ActivityKind) -> Result<(), TrackerError> {
        self.send(Command::SetActivity(activity)).await
    }

    /// Select the activity by display name; unknown names disable detection
    pub async fn set_activity_name(&self, name: impl Into<String>) -> Result<(), TrackerError> {
        self.send(Command::SetActivityName(name.into())).await
    }

    pub async fn set_body(&self, body: BodyParams) -> Result<(), TrackerError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::SetBody(body, tx)).await?;
        rx.await.map_err(|_| TrackerError::TrackerStopped)?
    }

    /// Stop the service and wait for it to finish
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(Command::Shutdown).await;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Tracker task ended abnormally");
            }
        }
    }

    async fn send(&self, command: Command) -> Result<(), TrackerError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| TrackerError::TrackerStopped)
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct TrackerActor {
    tracker: StepTracker,
    sync: SyncCoordinator,
    clock: Arc<dyn Clock>,
    /// Day the live totals belong to
    day: NaiveDate,
    store: Arc<dyn StepStore>,
    probe: Arc<dyn DeviceProbe>,
    sensor: Option<mpsc::Receiver<SampleVector>>,
    commands: mpsc::Receiver<Command>,
    state: watch::Sender<TrackerState>,
    notices: broadcast::Sender<Notice>,
    push_tx: mpsc::UnboundedSender<PushResult>,
    push_rx: mpsc::UnboundedReceiver<PushResult>,
    push_task: Option<PushTask>,
    /// Final save of the previous day; never superseded by new-day saves
    rollover_task: Option<PushTask>,
    goal_reached: bool,
}

/// In-flight push, aborted when replaced or dropped
struct PushTask(JoinHandle<()>);

impl Drop for PushTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl TrackerActor {
    async fn run(mut self, tick_period: Duration) {
        let mut ticks = time::interval_at(Instant::now() + tick_period, tick_period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let deadline = self
                .sync
                .debounce_deadline_ms()
                .map(|ms| self.clock.instant_at(ms));

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.apply(command),
                },
                sample = next_sample(&mut self.sensor) => match sample {
                    Some(sample) => self.on_sample(sample),
                    None => {
                        debug!("Accelerometer stream closed");
                        self.sensor = None;
                        self.tracker.stop_session(self.clock.now_ms());
                        self.publish();
                    }
                },
                _ = ticks.tick() => {
                    self.roll_day();
                    self.tracker.tick(self.clock.now_ms());
                    self.publish();
                }
                _ = sleep_until(deadline) => self.on_debounce(),
                Some(result) = self.push_rx.recv() => self.on_push_result(result),
            }
        }

        self.teardown();
    }

    fn on_sample(&mut self, sample: SampleVector) {
        self.roll_day();
        let now_ms = self.clock.now_ms();
        if self.tracker.on_sample(&sample, now_ms).is_some() {
            self.sync.record_step(now_ms);
            self.publish();
        }
    }

    fn on_debounce(&mut self) {
        self.roll_day();
        let now_ms = self.clock.now_ms();
        let Some(request) = self.sync.take_due_push(&self.tracker, now_ms, self.day) else {
            return;
        };

        let store = Arc::clone(&self.store);
        let probe = Arc::clone(&self.probe);
        let results = self.push_tx.clone();
        // replacing the slot aborts a stalled predecessor
        self.push_task = Some(PushTask(tokio::spawn(async move {
            let result = sync::execute_push(store.as_ref(), probe.as_ref(), request).await;
            let _ = results.send(result);
        })));
    }

    /// Close out the tracked day once the clock has moved past it
    fn roll_day(&mut self) {
        let today = self.clock.today();
        if today == self.day {
            return;
        }

        let previous = self.day;
        self.tracker.tick(self.clock.now_ms());
        if let Some(request) = self.sync.roll_over(&self.tracker, previous) {
            let store = Arc::clone(&self.store);
            let probe = Arc::clone(&self.probe);
            self.rollover_task = Some(PushTask(tokio::spawn(async move {
                let result = sync::execute_push(store.as_ref(), probe.as_ref(), request).await;
                if let PushOutcome::Failed(e) = result.outcome {
                    warn!(
                        date = %previous,
                        error = %e,
                        "Failed to save the previous day's steps"
                    );
                }
            })));
        }
        self.push_task = None;
        self.tracker.reset_day();
        self.day = today;
        self.publish();
    }

    fn on_push_result(&mut self, result: PushResult) {
        match self.sync.complete(&mut self.tracker, result) {
            PushDisposition::Saved => {
                self.push_task = None;
                self.publish();
            }
            PushDisposition::Skipped => self.push_task = None,
            PushDisposition::Retained(message) => {
                self.push_task = None;
                let _ = self.notices.send(Notice::SaveFailed(message));
            }
            PushDisposition::Superseded => {}
        }
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::SetDailyGoal(goal) => {
                info!(goal, "Daily goal changed");
                self.tracker.tick(self.clock.now_ms());
                self.tracker.set_daily_goal(goal);
            }
            Command::SetActivity(activity) => self.tracker.set_activity(activity),
            Command::SetActivityName(name) => self.tracker.set_activity_name(&name),
            Command::SetBody(body, reply) => {
                let result = self.tracker.set_body(body);
                if let Err(e) = &result {
                    warn!(error = %e, "Rejected body parameters");
                }
                let _ = reply.send(result);
            }
            Command::Shutdown => {}
        }
        self.publish();
    }

    fn publish(&mut self) {
        let state = self.tracker.state().clone();
        if state.goal_reached && !self.goal_reached {
            let _ = self.notices.send(Notice::GoalReached {
                steps: state.step_count,
            });
        }
        self.goal_reached = state.goal_reached;
        self.state.send_replace(state);
    }

    fn teardown(&mut self) {
        self.sync.cancel();
        self.push_task = None;
        self.rollover_task = None;
        self.sensor = None;
        debug!(
            steps = self.tracker.state().step_count,
            "Tracker service stopped"
        );
    }
}

async fn next_sample(sensor: &mut Option<mpsc::Receiver<SampleVector>>) -> Option<SampleVector> {
    match sensor {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::StaticProbe;
    use crate::scheduler::ManualClock;
    use crate::store::{MemoryStepStore, RemoteStepRecord};
    use pretty_assertions::assert_eq;

    struct Fixture {
        store: Arc<MemoryStepStore>,
        probe: Arc<StaticProbe>,
        sensor: Arc<ChannelAccelerometer>,
        clock: Arc<ManualClock>,
        samples: mpsc::Sender<SampleVector>,
    }

    impl Fixture {
        fn new(probe: StaticProbe) -> Self {
            let (sensor, samples) = ChannelAccelerometer::new(256);
            Self {
                store: Arc::new(MemoryStepStore::new()),
                probe: Arc::new(probe),
                sensor: Arc::new(sensor),
                clock: Arc::new(ManualClock::new(today())),
                samples,
            }
        }

        fn collaborators(&self) -> Collaborators {
            Collaborators::new(self.store.clone(), self.probe.clone(), self.sensor.clone())
                .with_clock(self.clock.clone())
        }

        /// Walk at 2 Hz with every sample above the brisk threshold
        async fn walk(&self, samples: usize) {
            let hot = SampleVector::new(0.0, 3.0, 12.0);
            for _ in 0..samples {
                self.samples.send(hot).await.unwrap();
                time::sleep(Duration::from_millis(500)).await;
            }
        }
    }

    fn user() -> UserId {
        UserId::new("u-1")
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_seeds_before_sampling() {
        let fixture = Fixture::new(StaticProbe::physical());
        fixture
            .store
            .insert(
                &user(),
                today(),
                RemoteStepRecord {
                    steps: 500,
                    spend_seconds: Some(1200),
                    walk_sessions: 2,
                    ..Default::default()
                },
            )
            .await;

        let handle =
            TrackerHandle::start(TrackerOptions::new(Some(user()), 10_000), fixture.collaborators())
                .await;

        let state = handle.snapshot();
        assert_eq!(state.step_count, 500);
        assert_eq!(state.active_seconds, 1200);
        assert_eq!(state.walk_sessions, 2);
        assert!(fixture.sensor.is_subscribed());
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_steps_saves_once() {
        let fixture = Fixture::new(StaticProbe::physical());
        let handle =
            TrackerHandle::start(TrackerOptions::new(Some(user()), 10_000), fixture.collaborators())
                .await;

        fixture.walk(30).await;
        assert_eq!(handle.snapshot().step_count, 21);
        assert_eq!(fixture.store.upsert_count(), 0);

        time::sleep(Duration::from_secs(3)).await;
        settle().await;

        assert_eq!(fixture.store.upsert_count(), 1);
        let saved = fixture.store.get(&user(), today()).await.unwrap();
        assert_eq!(saved.steps, 21);
        assert_eq!(saved.walk_sessions, 1);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_synthetic_device_never_tracks() {
        let fixture = Fixture::new(StaticProbe::synthetic());
        let handle =
            TrackerHandle::start(TrackerOptions::new(Some(user()), 10_000), fixture.collaborators())
                .await;

        assert!(!fixture.sensor.is_subscribed());
        fixture.walk(30).await;
        time::sleep(Duration::from_secs(5)).await;

        assert_eq!(handle.snapshot().step_count, 0);
        assert_eq!(fixture.store.upsert_count(), 0);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_checked_again_before_save() {
        let fixture = Fixture::new(StaticProbe::physical());
        let handle =
            TrackerHandle::start(TrackerOptions::new(Some(user()), 10_000), fixture.collaborators())
                .await;

        fixture.walk(20).await;
        fixture.probe.set_synthetic(true);
        time::sleep(Duration::from_secs(3)).await;
        settle().await;

        assert_eq!(fixture.store.upsert_count(), 0);
        assert_eq!(handle.snapshot().step_count, 11);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_notifies_and_retries_with_next_step() {
        let fixture = Fixture::new(StaticProbe::physical());
        let handle =
            TrackerHandle::start(TrackerOptions::new(Some(user()), 10_000), fixture.collaborators())
                .await;
        let mut notices = handle.notices();

        fixture.store.set_failing(true);
        fixture.walk(20).await;
        time::sleep(Duration::from_secs(3)).await;
        settle().await;

        assert_eq!(fixture.store.upsert_count(), 1);
        assert_eq!(
            notices.try_recv().unwrap(),
            Notice::SaveFailed("Unable to save/update step data. Please try again.".to_string())
        );
        assert_eq!(handle.snapshot().step_count, 11);

        fixture.store.set_failing(false);
        fixture.walk(1).await;
        time::sleep(Duration::from_secs(3)).await;
        settle().await;

        assert_eq!(fixture.store.upsert_count(), 2);
        assert_eq!(fixture.store.get(&user(), today()).await.unwrap().steps, 12);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_save_supersedes_stalled_one() {
        let fixture = Fixture::new(StaticProbe::physical());
        fixture.store.set_latency(Some(Duration::from_secs(5))).await;
        let handle =
            TrackerHandle::start(TrackerOptions::new(Some(user()), 10_000), fixture.collaborators())
                .await;

        // first save starts at 11.5 s and stalls in the store
        fixture.walk(20).await;
        time::sleep(Duration::from_secs(2)).await;
        fixture.walk(4).await;
        time::sleep(Duration::from_secs(10)).await;
        settle().await;

        assert_eq!(fixture.store.upsert_count(), 2);
        let saved = fixture.store.get(&user(), today()).await.unwrap();
        assert_eq!(saved.steps, 15);
        assert_eq!(handle.snapshot().step_count, 15);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_goal_change_applies_immediately() {
        let fixture = Fixture::new(StaticProbe::physical());
        let handle =
            TrackerHandle::start(TrackerOptions::new(None, 10_000), fixture.collaborators()).await;
        let mut notices = handle.notices();

        fixture.walk(20).await;
        assert_eq!(handle.snapshot().step_count, 11);

        handle.set_daily_goal(10).await.unwrap();
        settle().await;
        let state = handle.snapshot();
        assert!(state.goal_reached);
        assert_eq!(
            notices.try_recv().unwrap(),
            Notice::GoalReached { steps: 11 }
        );

        fixture.walk(10).await;
        assert_eq!(handle.snapshot().step_count, 11);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_time_ticks_without_samples() {
        let fixture = Fixture::new(StaticProbe::physical());
        let handle =
            TrackerHandle::start(TrackerOptions::new(None, 10_000), fixture.collaborators()).await;

        fixture.walk(20).await;
        time::sleep(Duration::from_secs(30)).await;
        settle().await;

        // session opened at 4.5 s, ticks every 10 s
        let active = handle.snapshot().active_seconds;
        assert!((25..=36).contains(&active), "active {active}");
        assert_eq!(fixture.store.upsert_count(), 0);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_midnight_files_pending_steps_under_old_day() {
        let fixture = Fixture::new(StaticProbe::physical());
        fixture
            .store
            .insert(
                &user(),
                today(),
                RemoteStepRecord {
                    steps: 9_000,
                    walk_sessions: 3,
                    ..Default::default()
                },
            )
            .await;
        let handle =
            TrackerHandle::start(TrackerOptions::new(Some(user()), 10_000), fixture.collaborators())
                .await;

        fixture.walk(20).await;
        time::sleep(Duration::from_secs(3)).await;
        settle().await;
        assert_eq!(fixture.store.upsert_count(), 1);

        // four more steps, then midnight passes before their save is due
        fixture.walk(4).await;
        let tomorrow = today().succ_opt().unwrap();
        fixture.clock.set_today(tomorrow);
        time::sleep(Duration::from_secs(3)).await;
        settle().await;

        assert_eq!(fixture.store.upsert_count(), 2);
        let yesterday = fixture.store.get(&user(), today()).await.unwrap();
        assert_eq!(yesterday.steps, 9_015);
        assert_eq!(yesterday.walk_sessions, 5);
        let state = handle.snapshot();
        assert_eq!(state.step_count, 0);
        assert_eq!(state.walk_sessions, 0);
        assert_eq!(state.active_seconds, 0);
        assert!(fixture.store.get(&user(), tomorrow).await.is_none());

        fixture.walk(20).await;
        time::sleep(Duration::from_secs(3)).await;
        settle().await;

        assert_eq!(fixture.store.upsert_count(), 3);
        let saved = fixture.store.get(&user(), tomorrow).await.unwrap();
        assert_eq!(saved.steps, 11);
        assert_eq!(saved.walk_sessions, 1);
        assert_eq!(
            fixture.store.get(&user(), today()).await.unwrap().steps,
            9_015
        );
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_goal_reached_stops_active_time() {
        let fixture = Fixture::new(StaticProbe::physical());
        let handle =
            TrackerHandle::start(TrackerOptions::new(None, 5), fixture.collaborators()).await;

        fixture.walk(20).await;
        settle().await;
        let at_goal = handle.snapshot();
        assert!(at_goal.goal_reached);

        time::sleep(Duration::from_secs(3_600)).await;
        settle().await;
        assert_eq!(handle.snapshot().active_seconds, at_goal.active_seconds);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_sensor_close_stops_active_time() {
        let (sensor, samples) = ChannelAccelerometer::new(64);
        let collaborators = Collaborators::new(
            Arc::new(MemoryStepStore::new()),
            Arc::new(StaticProbe::physical()),
            Arc::new(sensor),
        )
        .with_clock(Arc::new(ManualClock::new(today())));
        let handle = TrackerHandle::start(TrackerOptions::new(None, 10_000), collaborators).await;

        let hot = SampleVector::new(0.0, 3.0, 12.0);
        for _ in 0..20 {
            samples.send(hot).await.unwrap();
            time::sleep(Duration::from_millis(500)).await;
        }
        assert_eq!(handle.snapshot().step_count, 11);

        drop(samples);
        settle().await;
        let active = handle.snapshot().active_seconds;

        time::sleep(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(handle.snapshot().active_seconds, active);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_scheduled_save() {
        let fixture = Fixture::new(StaticProbe::physical());
        let handle =
            TrackerHandle::start(TrackerOptions::new(Some(user()), 10_000), fixture.collaborators())
                .await;

        fixture.walk(20).await;
        handle.shutdown().await;
        time::sleep(Duration::from_secs(10)).await;
        settle().await;

        assert_eq!(fixture.store.upsert_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_body_is_rejected() {
        let fixture = Fixture::new(StaticProbe::physical());
        let handle =
            TrackerHandle::start(TrackerOptions::new(None, 10_000), fixture.collaborators()).await;

        assert!(handle.set_body(BodyParams::new(0.0, 70.0)).await.is_err());
        assert!(handle.set_body(BodyParams::new(180.0, 80.0)).await.is_ok());
        handle.shutdown().await;
    }
}
