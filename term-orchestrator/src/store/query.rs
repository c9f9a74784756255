//! Query builder for validation history.

use chrono::{DateTime, Duration, Utc};

use crate::error::{Result, TermError};
use crate::model::Validation;

/// Default trailing window of [`ValidationQuery::recent`], in days.
pub const DEFAULT_PERIOD_DAYS: i64 = 14;

/// Default row limit of [`ValidationQuery::recent`].
pub const DEFAULT_QUERY_LIMIT: usize = 2000;

/// Sort order on `meta.run_id.run_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Oldest first.
    #[default]
    Ascending,
    /// Newest first.
    Descending,
}

/// Exact-match filter on run identifiers. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationFilter {
    pub dataset_id: Option<String>,
    pub datasource_id: Option<String>,
    /// Matches records with at least one result for this expectation.
    pub expectation_id: Option<String>,
}

impl ValidationFilter {
    pub fn dataset(dataset_id: impl Into<String>) -> Self {
        Self {
            dataset_id: Some(dataset_id.into()),
            ..Self::default()
        }
    }

    pub fn datasource(datasource_id: impl Into<String>) -> Self {
        Self {
            datasource_id: Some(datasource_id.into()),
            ..Self::default()
        }
    }

    pub fn expectation(expectation_id: impl Into<String>) -> Self {
        Self {
            expectation_id: Some(expectation_id.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dataset_id.is_none() && self.datasource_id.is_none() && self.expectation_id.is_none()
    }

    pub fn matches(&self, validation: &Validation) -> bool {
        self.dataset_id
            .as_deref()
            .map_or(true, |id| validation.meta.dataset_id == id)
            && self
                .datasource_id
                .as_deref()
                .map_or(true, |id| validation.meta.datasource_id == id)
            && self
                .expectation_id
                .as_deref()
                .map_or(true, |id| validation.mentions_expectation(id))
    }
}

/// Filtered, time-bounded read of validation records.
///
/// # Example
///
/// ```rust,ignore
/// let query = ValidationQuery::recent(7)
///     .dataset_id("orders")
///     .sort(SortOrder::Descending);
/// let runs = store.query_validations(&query).await?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationQuery {
    pub filter: ValidationFilter,
    /// Inclusive lower bound on run time.
    pub after: Option<DateTime<Utc>>,
    /// Inclusive upper bound on run time.
    pub before: Option<DateTime<Utc>>,
    pub sort_order: SortOrder,
    pub limit: Option<usize>,
}

impl ValidationQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs of the trailing `period_days` up to now, oldest first, capped at
    /// [`DEFAULT_QUERY_LIMIT`] rows.
    pub fn recent(period_days: i64) -> Self {
        Self::recent_at(period_days, Utc::now())
    }

    pub fn recent_at(period_days: i64, now: DateTime<Utc>) -> Self {
        Self::new()
            .after(now - Duration::days(period_days))
            .before(now)
            .limit(DEFAULT_QUERY_LIMIT)
    }

    pub fn dataset_id(mut self, dataset_id: impl Into<String>) -> Self {
        self.filter.dataset_id = Some(dataset_id.into());
        self
    }

    pub fn datasource_id(mut self, datasource_id: impl Into<String>) -> Self {
        self.filter.datasource_id = Some(datasource_id.into());
        self
    }

    pub fn expectation_id(mut self, expectation_id: impl Into<String>) -> Self {
        self.filter.expectation_id = Some(expectation_id.into());
        self
    }

    pub fn after(mut self, timestamp: DateTime<Utc>) -> Self {
        self.after = Some(timestamp);
        self
    }

    pub fn before(mut self, timestamp: DateTime<Utc>) -> Self {
        self.before = Some(timestamp);
        self
    }

    pub fn sort(mut self, order: SortOrder) -> Self {
        self.sort_order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Rejects inverted time ranges and a zero limit.
    pub fn validate(&self) -> Result<()> {
        if let (Some(after), Some(before)) = (self.after, self.before) {
            if after > before {
                return Err(TermError::repository(
                    "query_validations",
                    format!("'after' ({after}) is later than 'before' ({before})"),
                ));
            }
        }
        if self.limit == Some(0) {
            return Err(TermError::repository(
                "query_validations",
                "limit must be greater than 0",
            ));
        }
        Ok(())
    }

    pub fn matches(&self, validation: &Validation) -> bool {
        let run_time = validation.run_time();
        self.filter.matches(validation)
            && self.after.map_or(true, |after| run_time >= after)
            && self.before.map_or(true, |before| run_time <= before)
    }

    /// Filters, sorts and truncates `validations` the way a store would.
    pub fn apply<'a, I>(&self, validations: I) -> Vec<Validation>
    where
        I: IntoIterator<Item = &'a Validation>,
    {
        let mut selected: Vec<Validation> = validations
            .into_iter()
            .filter(|v| self.matches(v))
            .cloned()
            .collect();

        selected.sort_by_key(|v| v.run_time());
        if self.sort_order == SortOrder::Descending {
            selected.reverse();
        }
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::validation_with_success;

    fn run_at(dataset_id: &str, run_time: DateTime<Utc>) -> Validation {
        let mut validation = validation_with_success(true);
        validation.meta.dataset_id = dataset_id.to_string();
        validation.meta.run_id.run_time = run_time;
        validation
    }

    #[test]
    fn test_recent_defaults() {
        let now = Utc::now();
        let query = ValidationQuery::recent_at(DEFAULT_PERIOD_DAYS, now);
        assert_eq!(query.after, Some(now - Duration::days(14)));
        assert_eq!(query.before, Some(now));
        assert_eq!(query.limit, Some(2000));
        assert_eq!(query.sort_order, SortOrder::Ascending);
    }

    #[test]
    fn test_apply_filters_sorts_and_limits() {
        let now = Utc::now();
        let runs = vec![
            run_at("orders", now - Duration::days(1)),
            run_at("orders", now - Duration::days(20)),
            run_at("customers", now - Duration::hours(2)),
            run_at("orders", now - Duration::days(3)),
        ];

        let query = ValidationQuery::recent_at(14, now).dataset_id("orders");
        let selected = query.apply(&runs);
        assert_eq!(selected.len(), 2);
        assert!(selected[0].run_time() < selected[1].run_time());

        let newest = query.sort(SortOrder::Descending).limit(1).apply(&runs);
        assert_eq!(newest.len(), 1);
        assert_eq!(newest[0].run_time(), now - Duration::days(1));
    }

    #[test]
    fn test_expectation_filter_matches_results() {
        let validation = validation_with_success(true);
        let id = validation.results[0].expectation_id.clone();
        assert!(ValidationFilter::expectation(id).matches(&validation));
        assert!(!ValidationFilter::expectation("other").matches(&validation));
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let now = Utc::now();
        let query = ValidationQuery::new().after(now).before(now - Duration::days(1));
        assert!(query.validate().is_err());
        assert!(ValidationQuery::new().limit(0).validate().is_err());
        assert!(ValidationQuery::recent(14).validate().is_ok());
    }
}
