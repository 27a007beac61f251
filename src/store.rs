//! Remote step store contract
//!
//! The backend exposes a per-(user, day) step record behind a JSON envelope
//! `{success, data?, message?}`. This module defines the wire types, the
//! async [`StepStore`] trait the tracker syncs through, and an in-memory
//! implementation used by the CLI and tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::TrackerError;
use crate::types::UserId;

/// Response envelope returned by every backend call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            success: true,
            data: None,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }

    /// Turn a `success: false` envelope into [`TrackerError::Rejected`]
    pub fn into_result(self) -> Result<Option<T>, TrackerError> {
        if self.success {
            Ok(self.data)
        } else {
            Err(TrackerError::Rejected(
                self.message
                    .unwrap_or_else(|| "request unsuccessful".to_string()),
            ))
        }
    }
}

/// Persisted step record for one user and day, as read back from the store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteStepRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub steps: u32,
    pub calories_burned: f64,
    pub kilometers: f64,
    pub avg_steps_per_hour: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spend_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spend_minutes: Option<u64>,
    pub walk_sessions: u32,
    #[serde(alias = "isGoalReached")]
    pub goal_reached: bool,
}

impl RemoteStepRecord {
    /// Active time in seconds, taken from whichever field the record carries.
    ///
    /// `prefer_minutes` selects `spendMinutes` when both are present.
    pub fn active_seconds(&self, prefer_minutes: bool) -> u64 {
        let from_minutes = self.spend_minutes.map(|m| m.saturating_mul(60));
        let (first, second) = if prefer_minutes {
            (from_minutes, self.spend_seconds)
        } else {
            (self.spend_seconds, from_minutes)
        };
        first.or(second).unwrap_or(0)
    }
}

/// Upsert payload for today's record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecordPayload {
    pub steps: u32,
    pub calories_burned: f64,
    pub kilometers: f64,
    pub avg_steps_per_hour: f64,
    pub spend_minutes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spend_seconds: Option<u64>,
    pub goal_reached: bool,
    pub user: UserId,
    pub date: NaiveDate,
    pub walk_sessions: u32,
}

impl From<&StepRecordPayload> for RemoteStepRecord {
    fn from(payload: &StepRecordPayload) -> Self {
        Self {
            user: Some(payload.user.clone()),
            date: Some(payload.date),
            steps: payload.steps,
            calories_burned: payload.calories_burned,
            kilometers: payload.kilometers,
            avg_steps_per_hour: payload.avg_steps_per_hour,
            spend_seconds: payload.spend_seconds,
            spend_minutes: Some(payload.spend_minutes),
            walk_sessions: payload.walk_sessions,
            goal_reached: payload.goal_reached,
        }
    }
}

/// Backend holding per-day step records
#[async_trait]
pub trait StepStore: Send + Sync {
    /// Fetch the record for `user` on `date`
    async fn fetch_day(
        &self,
        user: &UserId,
        date: NaiveDate,
    ) -> Result<ApiResponse<RemoteStepRecord>, TrackerError>;

    /// Create or update the record named by the payload's user and date
    async fn upsert(
        &self,
        payload: &StepRecordPayload,
    ) -> Result<ApiResponse<RemoteStepRecord>, TrackerError>;

    /// Fetch records for `user` between `start` and `end`, inclusive
    async fn fetch_range(
        &self,
        user: &UserId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ApiResponse<Vec<RemoteStepRecord>>, TrackerError>;
}

/// In-process store keyed by (user, day); upserts replace the day's record
#[derive(Debug, Default)]
pub struct MemoryStepStore {
    records: Mutex<BTreeMap<(UserId, NaiveDate), RemoteStepRecord>>,
    failing: AtomicBool,
    latency: Mutex<Option<Duration>>,
    upserts: AtomicUsize,
}

impl MemoryStepStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a day
    pub async fn insert(&self, user: &UserId, date: NaiveDate, record: RemoteStepRecord) {
        self.records
            .lock()
            .await
            .insert((user.clone(), date), record);
    }

    pub async fn get(&self, user: &UserId, date: NaiveDate) -> Option<RemoteStepRecord> {
        self.records
            .lock()
            .await
            .get(&(user.clone(), date))
            .cloned()
    }

    /// Make every call fail with a transport error until cleared
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay every call, simulating a slow network
    pub async fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().await = latency;
    }

    /// Number of upsert calls received, successful or not
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    async fn simulate_network(&self) -> Result<(), TrackerError> {
        let latency = *self.latency.lock().await;
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(TrackerError::StoreError("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StepStore for MemoryStepStore {
    async fn fetch_day(
        &self,
        user: &UserId,
        date: NaiveDate,
    ) -> Result<ApiResponse<RemoteStepRecord>, TrackerError> {
        self.simulate_network().await?;
        Ok(match self.get(user, date).await {
            Some(record) => ApiResponse::ok(record),
            None => ApiResponse::empty(),
        })
    }

    async fn upsert(
        &self,
        payload: &StepRecordPayload,
    ) -> Result<ApiResponse<RemoteStepRecord>, TrackerError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.simulate_network().await?;
        let record = RemoteStepRecord::from(payload);
        self.insert(&payload.user, payload.date, record.clone()).await;
        Ok(ApiResponse::ok(record))
    }

    async fn fetch_range(
        &self,
        user: &UserId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ApiResponse<Vec<RemoteStepRecord>>, TrackerError> {
        self.simulate_network().await?;
        let records = self.records.lock().await;
        let days = records
            .iter()
            .filter(|((owner, date), _)| owner == user && *date >= start && *date <= end)
            .map(|(_, record)| record.clone())
            .collect();
        Ok(ApiResponse::ok(days))
    }
}
