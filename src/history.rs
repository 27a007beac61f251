//! Multi-day history
//!
//! Aggregates the per-day records returned by [`StepStore::fetch_range`] into
//! a seven-day summary with one entry per calendar day.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;
use crate::store::{RemoteStepRecord, StepStore};
use crate::types::UserId;

/// Days covered by a weekly summary
pub const WEEK_DAYS: i64 = 7;

/// Totals for one calendar day; days without a record are zero
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayTotals {
    pub date: NaiveDate,
    pub steps: u32,
    pub calories_burned: f64,
    pub kilometers: f64,
    pub goal_reached: bool,
}

impl DayTotals {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            steps: 0,
            calories_burned: 0.0,
            kilometers: 0.0,
            goal_reached: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySummary {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Oldest day first
    pub days: Vec<DayTotals>,
    pub total_steps: u64,
    pub total_calories: f64,
    pub total_kilometers: f64,
    /// Total steps over the seven days, divided by seven
    pub daily_average_steps: f64,
    /// Day with the most steps; `None` when no steps were recorded
    pub best_day: Option<NaiveDate>,
    pub days_goal_reached: u32,
}

impl WeeklySummary {
    /// Summarise the seven days ending at `end` (inclusive).
    ///
    /// Records without a date or outside the window are ignored. When several
    /// records name the same day the last one wins, matching upsert semantics.
    pub fn from_records(end: NaiveDate, records: &[RemoteStepRecord]) -> Self {
        let start = week_start(end);
        let mut days: Vec<DayTotals> = (0..WEEK_DAYS)
            .map(|offset| DayTotals::empty(start + Duration::days(offset)))
            .collect();

        for record in records {
            let Some(date) = record.date else {
                continue;
            };
            if date < start || date > end {
                continue;
            }
            let index = (date - start).num_days() as usize;
            days[index] = DayTotals {
                date,
                steps: record.steps,
                calories_burned: record.calories_burned,
                kilometers: record.kilometers,
                goal_reached: record.goal_reached,
            };
        }

        let total_steps: u64 = days.iter().map(|d| u64::from(d.steps)).sum();
        let total_calories = days.iter().map(|d| d.calories_burned).sum();
        let total_kilometers = days.iter().map(|d| d.kilometers).sum();
        let days_goal_reached = days.iter().filter(|d| d.goal_reached).count() as u32;

        // ties go to the earlier day
        let best_day = days
            .iter()
            .filter(|d| d.steps > 0)
            .fold(None::<&DayTotals>, |best, day| match best {
                Some(b) if b.steps >= day.steps => Some(b),
                _ => Some(day),
            })
            .map(|d| d.date);

        Self {
            start,
            end,
            days,
            total_steps,
            total_calories,
            total_kilometers,
            daily_average_steps: total_steps as f64 / WEEK_DAYS as f64,
            best_day,
            days_goal_reached,
        }
    }
}

/// First day of the seven-day window ending at `end`
pub fn week_start(end: NaiveDate) -> NaiveDate {
    end - Duration::days(WEEK_DAYS - 1)
}

/// Fetch and summarise the week ending at `end`
pub async fn weekly_summary(
    store: &dyn StepStore,
    user: &UserId,
    end: NaiveDate,
) -> Result<WeeklySummary, TrackerError> {
    let records = store
        .fetch_range(user, week_start(end), end)
        .await?
        .into_result()?
        .unwrap_or_default();
    tracing::debug!(user = %user, %end, records = records.len(), "Fetched weekly history");
    Ok(WeeklySummary::from_records(end, &records))
}
