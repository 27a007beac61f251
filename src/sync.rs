//! Sync coordination
//!
//! Reconciles the live tracker with the remote store:
//! - **Pull on start**: seed today's totals from the persisted record
//! - **Debounced push**: every accepted step bumps the pending delta and
//!   restarts the save timer; when it fires, the current totals are upserted
//!
//! A failed push keeps the pending delta and unsaved active time; the next
//! step restarts the debounce and the next push carries everything. There is
//! no background retry timer.
//!
//! When the calendar day changes, whatever is still pending is flushed once
//! under the old date and the coordinator starts the new day clean.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::device::DeviceProbe;
use crate::error::TrackerError;
use crate::scheduler::Debounce;
use crate::store::{RemoteStepRecord, StepRecordPayload, StepStore};
use crate::tracker::StepTracker;
use crate::types::UserId;

/// A save ready to be sent to the store
#[derive(Debug, Clone, PartialEq)]
pub struct PushRequest {
    pub generation: u64,
    pub payload: StepRecordPayload,
    /// Steps accrued since the last confirmed save
    pub delta_steps: u32,
    /// Unsaved active time covered by this save (ms)
    pub active_ms: u64,
}

/// How a push attempt ended
#[derive(Debug)]
pub enum PushOutcome {
    Saved,
    /// The device guard flagged a simulated device; nothing was sent
    SkippedSynthetic,
    Failed(TrackerError),
}

/// Result of a push attempt, routed back to the coordinator
#[derive(Debug)]
pub struct PushResult {
    pub generation: u64,
    pub delta_steps: u32,
    pub active_ms: u64,
    pub outcome: PushOutcome,
}

/// What the coordinator did with a push result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushDisposition {
    Saved,
    Skipped,
    /// Delta retained for the next attempt; carries a user-facing message
    Retained(String),
    /// A newer push replaced this one; the result was ignored
    Superseded,
}

/// Owns the pending delta and the save debounce for one user session
#[derive(Debug, Clone)]
pub struct SyncCoordinator {
    user: Option<UserId>,
    pending_delta: u32,
    debounce: Debounce,
    generation: u64,
    in_flight: Option<u64>,
}

impl SyncCoordinator {
    pub fn new(user: Option<UserId>, save_debounce_ms: u64) -> Self {
        Self {
            user,
            pending_delta: 0,
            debounce: Debounce::new(save_debounce_ms),
            generation: 0,
            in_flight: None,
        }
    }

    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    /// Count an accepted step and restart the save timer
    pub fn record_step(&mut self, now_ms: u64) {
        self.pending_delta = self.pending_delta.saturating_add(1);
        self.debounce.trigger(now_ms);
    }

    pub fn pending_delta(&self) -> u32 {
        self.pending_delta
    }

    pub fn debounce_deadline_ms(&self) -> Option<u64> {
        self.debounce.deadline_ms()
    }

    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    /// Build a push if the debounce has fired and there is something to save.
    ///
    /// A new push supersedes any still in flight.
    pub fn take_due_push(
        &mut self,
        tracker: &StepTracker,
        now_ms: u64,
        date: NaiveDate,
    ) -> Option<PushRequest> {
        if !self.debounce.fire_if_due(now_ms) {
            return None;
        }
        let Some(user) = self.user.as_ref() else {
            debug!("No authenticated user, skipping save");
            return None;
        };
        if self.pending_delta == 0 {
            return None;
        }

        if let Some(previous) = self.in_flight {
            debug!(previous, "Superseding in-flight save");
        }
        self.generation += 1;
        self.in_flight = Some(self.generation);

        Some(PushRequest {
            generation: self.generation,
            payload: tracker.payload(user, date),
            delta_steps: self.pending_delta,
            active_ms: tracker.unsaved_active_ms(),
        })
    }

    /// Apply a finished push to the coordinator and tracker
    pub fn complete(&mut self, tracker: &mut StepTracker, result: PushResult) -> PushDisposition {
        if self.in_flight != Some(result.generation) {
            debug!(generation = result.generation, "Ignoring superseded save result");
            return PushDisposition::Superseded;
        }
        self.in_flight = None;

        match result.outcome {
            PushOutcome::Saved => {
                self.pending_delta = self.pending_delta.saturating_sub(result.delta_steps);
                tracker.mark_saved(result.active_ms);
                info!(
                    steps = tracker.state().step_count,
                    saved_delta = result.delta_steps,
                    "Step progress saved"
                );
                PushDisposition::Saved
            }
            PushOutcome::SkippedSynthetic => {
                debug!("Synthetic device, save skipped");
                PushDisposition::Skipped
            }
            PushOutcome::Failed(e) => {
                warn!(error = %e, pending = self.pending_delta, "Failed to save step progress");
                PushDisposition::Retained(
                    "Unable to save/update step data. Please try again.".to_string(),
                )
            }
        }
    }

    /// Close out `date` at midnight.
    ///
    /// Returns a final push of the current totals under `date` when there is
    /// unsaved progress. The pending delta, the debounce and any in-flight
    /// push are dropped, so results for the old day are ignored.
    pub fn roll_over(&mut self, tracker: &StepTracker, date: NaiveDate) -> Option<PushRequest> {
        let request = match self.user.as_ref() {
            Some(user) if self.pending_delta > 0 => {
                self.generation += 1;
                Some(PushRequest {
                    generation: self.generation,
                    payload: tracker.payload(user, date),
                    delta_steps: self.pending_delta,
                    active_ms: tracker.unsaved_active_ms(),
                })
            }
            _ => None,
        };
        info!(%date, pending = self.pending_delta, "Day ended, starting a new record");
        self.pending_delta = 0;
        self.cancel();
        request
    }

    /// Teardown: drop the scheduled save and forget any in-flight push
    pub fn cancel(&mut self) {
        self.debounce.cancel();
        self.in_flight = None;
    }
}

/// Fetch today's persisted record.
///
/// Any failure, a missing record or a missing user yields `None`; the
/// tracker then starts from zero.
pub async fn pull_today(
    store: &dyn StepStore,
    user: Option<&UserId>,
    date: NaiveDate,
) -> Option<RemoteStepRecord> {
    let user = user?;
    match store.fetch_day(user, date).await.and_then(|r| r.into_result()) {
        Ok(Some(record)) => {
            info!(user = %user, %date, steps = record.steps, "Seeded tracker from store");
            Some(record)
        }
        Ok(None) => {
            debug!(user = %user, %date, "No stored record for today");
            None
        }
        Err(e) => {
            warn!(user = %user, error = %e, "Failed to load today's steps, starting from zero");
            None
        }
    }
}

/// Run a push: consult the device guard, then upsert
pub async fn execute_push(
    store: &dyn StepStore,
    probe: &dyn DeviceProbe,
    request: PushRequest,
) -> PushResult {
    let outcome = if probe.is_synthetic_device().await {
        PushOutcome::SkippedSynthetic
    } else {
        match store
            .upsert(&request.payload)
            .await
            .and_then(|r| r.into_result())
        {
            Ok(_) => PushOutcome::Saved,
            Err(e) => PushOutcome::Failed(e),
        }
    };

    PushResult {
        generation: request.generation,
        delta_steps: request.delta_steps,
        active_ms: request.active_ms,
        outcome,
    }
}
