//! Success-rate rollups over validation history.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use crate::config::StatisticsConfig;
use crate::error::Result;
use crate::model::Validation;
use crate::store::{SortOrder, ValidationQuery, ValidationStore};

/// Average `success_percent` over trailing windows. `None` when no run in the
/// window has a percentage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SuccessAverages {
    #[serde(rename = "1_day")]
    pub one_day: Option<f64>,
    #[serde(rename = "7_day")]
    pub seven_day: Option<f64>,
    #[serde(rename = "31_day")]
    pub thirty_one_day: Option<f64>,
}

/// Runs of one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBucket {
    pub date: NaiveDate,
    pub run_count: usize,
    /// `None` for days without runs.
    pub average: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetStatistics {
    pub dataset_id: String,
    pub computed_at: DateTime<Utc>,
    pub averages: SuccessAverages,
    /// One bucket per day of the trailing window, oldest first.
    pub histogram: Vec<DailyBucket>,
}

/// Computes rollups from a store.
pub struct StatisticsAggregator<'a> {
    store: &'a dyn ValidationStore,
    config: StatisticsConfig,
}

impl<'a> StatisticsAggregator<'a> {
    pub fn new(store: &'a dyn ValidationStore, config: StatisticsConfig) -> Self {
        Self { store, config }
    }

    pub async fn compute(&self, dataset_id: &str) -> Result<DatasetStatistics> {
        self.compute_at(dataset_id, Utc::now()).await
    }

    /// Like [`StatisticsAggregator::compute`], relative to `now`.
    ///
    /// History is read newest first so that `query_limit` drops the oldest
    /// runs of the window, never the recent ones.
    #[instrument(skip(self), fields(histogram_days = self.config.histogram_days))]
    pub async fn compute_at(&self, dataset_id: &str, now: DateTime<Utc>) -> Result<DatasetStatistics> {
        let window = i64::from(self.config.histogram_days.max(31));
        let query = ValidationQuery::new()
            .dataset_id(dataset_id)
            .after(now - Duration::days(window))
            .before(now)
            .sort(SortOrder::Descending)
            .limit(self.config.query_limit);
        let validations = self.store.query_validations(&query).await?;
        debug!(runs = validations.len(), "Loaded validation history");

        let (averages, histogram) = summarize(&validations, now, self.config.histogram_days);
        Ok(DatasetStatistics {
            dataset_id: dataset_id.to_string(),
            computed_at: now,
            averages,
            histogram,
        })
    }
}

/// Trailing averages and the daily histogram of `validations` as seen at `now`.
///
/// Runs outside `[now - 31 days, now]` never count; runs without a
/// `success_percent` count towards a bucket's `run_count` but not its average.
pub fn summarize(
    validations: &[Validation],
    now: DateTime<Utc>,
    histogram_days: u32,
) -> (SuccessAverages, Vec<DailyBucket>) {
    let averages = SuccessAverages {
        one_day: window_average(validations, now, 1),
        seven_day: window_average(validations, now, 7),
        thirty_one_day: window_average(validations, now, 31),
    };

    let start = now - Duration::days(i64::from(histogram_days));
    let mut days: BTreeMap<NaiveDate, (usize, Vec<f64>)> = BTreeMap::new();
    let mut day = start.date_naive();
    while day <= now.date_naive() {
        days.insert(day, (0, Vec::new()));
        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    for validation in validations {
        let run_time = validation.run_time();
        if run_time < start || run_time > now {
            continue;
        }
        if let Some((count, percents)) = days.get_mut(&run_time.date_naive()) {
            *count += 1;
            percents.extend(validation.statistics.success_percent);
        }
    }

    let histogram = days
        .into_iter()
        .map(|(date, (run_count, percents))| DailyBucket {
            date,
            run_count,
            average: mean(&percents),
        })
        .collect();

    (averages, histogram)
}

fn window_average(validations: &[Validation], now: DateTime<Utc>, days: i64) -> Option<f64> {
    let start = now - Duration::days(days);
    let percents: Vec<f64> = validations
        .iter()
        .filter(|v| v.run_time() >= start && v.run_time() <= now)
        .filter_map(|v| v.statistics.success_percent)
        .collect();
    mean(&percents)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
