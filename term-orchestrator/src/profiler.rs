//! Sample profiling and expectation suggestion.
//!
//! The profiler pulls a sample of a dataset (materializing query-addressed
//! batches as a temp table first), computes a [`ColumnProfile`] per column
//! and runs a set of [`SuggestionRule`]s over the profiles. Every candidate
//! is emitted in stored shape: disabled, flagged as suggested, with kwargs
//! carrying the output options a reviewed suggestion would run with.
//!
//! ## Rules
//!
//! - [`CompletenessRule`] - null / not-null checks with an `objective`
//! - [`UniquenessRule`] - uniqueness for columns without repeated values
//! - [`ValueSetRule`] - in-set checks for low-cardinality columns
//! - [`NumericRangeRule`] - min / max / mean / value range checks
//! - [`StringLengthRule`] - value length bounds for text columns
//!
//! Table-level candidates (row count and column order) are always proposed.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, instrument};

use crate::config::ProfilerConfig;
use crate::engine::SampleData;
use crate::error::{Result, TermError};
use crate::executor::{SampleResponse, ValidationExecutor};
use crate::expectations::{self, ExpectationType, UNSUPPORTED_EXPECTATIONS};
use crate::model::{Dataset, Datasource, Expectation, Kwargs};

/// Type inferred from the non-null sample values of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectedDataType {
    Integer,
    Double,
    Boolean,
    String,
    /// More than one kind of value
    Mixed,
    /// Only nulls were sampled
    Unknown,
}

impl DetectedDataType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Double)
    }
}

/// Statistics of one sampled column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub column_name: String,
    pub data_type: DetectedDataType,
    pub row_count: usize,
    pub null_count: usize,
    pub distinct_count: usize,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub mean: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Sorted distinct values, kept only for low-cardinality columns
    pub value_set: Option<Vec<Value>>,
}

impl ColumnProfile {
    pub fn non_null_count(&self) -> usize {
        self.row_count - self.null_count
    }

    /// Fraction of non-null rows; 0 for an empty sample.
    pub fn completeness(&self) -> f64 {
        if self.row_count == 0 {
            0.0
        } else {
            self.non_null_count() as f64 / self.row_count as f64
        }
    }
}

/// Profiles of every column of a sample, in column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableProfile {
    pub row_count: usize,
    pub columns: Vec<ColumnProfile>,
}

/// Profiles sampled rows. Value sets are kept for columns with at most
/// `value_set_threshold` distinct non-null values.
pub fn profile_sample(sample: &SampleData, value_set_threshold: usize) -> TableProfile {
    let columns = sample
        .columns
        .iter()
        .map(|column| profile_column(column, &sample.rows, value_set_threshold))
        .collect();

    TableProfile {
        row_count: sample.rows.len(),
        columns,
    }
}

fn profile_column(
    column: &str,
    rows: &[Map<String, Value>],
    value_set_threshold: usize,
) -> ColumnProfile {
    let mut null_count = 0;
    // Keyed by the serialized value so numbers, strings and booleans share one set.
    let mut distinct: BTreeMap<String, Value> = BTreeMap::new();
    let mut kinds: HashSet<DetectedDataType> = HashSet::new();
    let mut numbers = Vec::new();
    let mut lengths = Vec::new();

    for row in rows {
        let value = row.get(column).unwrap_or(&Value::Null);
        match value {
            Value::Null => {
                null_count += 1;
                continue;
            }
            Value::Bool(_) => {
                kinds.insert(DetectedDataType::Boolean);
            }
            Value::Number(n) => {
                kinds.insert(if n.is_f64() {
                    DetectedDataType::Double
                } else {
                    DetectedDataType::Integer
                });
                if let Some(f) = n.as_f64() {
                    numbers.push(f);
                }
            }
            Value::String(s) => {
                kinds.insert(DetectedDataType::String);
                lengths.push(s.chars().count());
            }
            Value::Array(_) | Value::Object(_) => {
                kinds.insert(DetectedDataType::Mixed);
            }
        }
        distinct.insert(value.to_string(), value.clone());
    }

    let data_type = match kinds.len() {
        0 => DetectedDataType::Unknown,
        1 => kinds.into_iter().next().unwrap_or(DetectedDataType::Unknown),
        _ if kinds
            .iter()
            .all(|k| matches!(k, DetectedDataType::Integer | DetectedDataType::Double)) =>
        {
            DetectedDataType::Double
        }
        _ => DetectedDataType::Mixed,
    };

    let (min_value, max_value, mean) = if data_type.is_numeric() && !numbers.is_empty() {
        let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
        let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
        (Some(min), Some(max), Some(mean))
    } else {
        (None, None, None)
    };

    let (min_length, max_length) = if data_type == DetectedDataType::String {
        (lengths.iter().copied().min(), lengths.iter().copied().max())
    } else {
        (None, None)
    };

    let distinct_count = distinct.len();
    let value_set = (distinct_count > 0 && distinct_count <= value_set_threshold)
        .then(|| sorted_values(distinct.into_values().collect()));

    ColumnProfile {
        column_name: column.to_string(),
        data_type,
        row_count: rows.len(),
        null_count,
        distinct_count,
        min_value,
        max_value,
        mean,
        min_length,
        max_length,
        value_set,
    }
}

fn sorted_values(mut values: Vec<Value>) -> Vec<Value> {
    values.sort_by(|a, b| match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        _ => a.to_string().cmp(&b.to_string()),
    });
    values
}

/// A candidate expectation before it is put into stored shape.
/// Kwargs are in engine form (`mostly`).
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub expectation_type: ExpectationType,
    pub kwargs: Kwargs,
}

impl Suggestion {
    fn new(expectation_type: ExpectationType, kwargs: Kwargs) -> Self {
        Self {
            expectation_type,
            kwargs,
        }
    }

    fn column(expectation_type: ExpectationType, column: &str) -> Self {
        let mut kwargs = Kwargs::new();
        kwargs.insert("column".to_string(), Value::String(column.to_string()));
        Self::new(expectation_type, kwargs)
    }

    fn with(mut self, key: &str, value: Value) -> Self {
        self.kwargs.insert(key.to_string(), value);
        self
    }

    fn with_range(self, min: Value, max: Value) -> Self {
        self.with("min_value", min).with("max_value", max)
    }
}

/// Proposes candidate expectations for one column.
pub trait SuggestionRule: Send + Sync {
    fn apply(&self, profile: &ColumnProfile) -> Vec<Suggestion>;

    fn name(&self) -> &str;
}

/// Suggests not-null checks, with an `objective` when the sample has nulls,
/// and a null check when every sampled value is null.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletenessRule;

impl SuggestionRule for CompletenessRule {
    fn apply(&self, profile: &ColumnProfile) -> Vec<Suggestion> {
        if profile.row_count == 0 {
            return Vec::new();
        }

        let column = &profile.column_name;
        if profile.null_count == profile.row_count {
            return vec![Suggestion::column(ExpectationType::ColumnValuesToBeNull, column)];
        }

        let suggestion = Suggestion::column(ExpectationType::ColumnValuesToNotBeNull, column);
        if profile.null_count == 0 {
            vec![suggestion]
        } else {
            // Rounded down so the sample itself passes.
            let mostly = (profile.completeness() * 1000.0).floor() / 1000.0;
            vec![suggestion.with("mostly", Value::from(mostly))]
        }
    }

    fn name(&self) -> &str {
        "CompletenessRule"
    }
}

/// Suggests uniqueness for columns whose sampled values never repeat.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniquenessRule;

impl SuggestionRule for UniquenessRule {
    fn apply(&self, profile: &ColumnProfile) -> Vec<Suggestion> {
        let non_null = profile.non_null_count();
        if non_null < 2
            || profile.distinct_count != non_null
            || profile.data_type == DetectedDataType::Boolean
        {
            return Vec::new();
        }
        vec![Suggestion::column(
            ExpectationType::ColumnValuesToBeUnique,
            &profile.column_name,
        )]
    }

    fn name(&self) -> &str {
        "UniquenessRule"
    }
}

/// Suggests an in-set check when the column has only a few distinct values.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueSetRule;

impl SuggestionRule for ValueSetRule {
    fn apply(&self, profile: &ColumnProfile) -> Vec<Suggestion> {
        let Some(values) = &profile.value_set else {
            return Vec::new();
        };
        // A set as large as the sample says nothing about the domain.
        if profile.distinct_count == profile.non_null_count() && profile.non_null_count() > 1 {
            return Vec::new();
        }

        vec![
            Suggestion::column(ExpectationType::ColumnValuesToBeInSet, &profile.column_name)
                .with("value_set", Value::Array(values.clone())),
        ]
    }

    fn name(&self) -> &str {
        "ValueSetRule"
    }
}

/// Pins min, max and mean of numeric columns to their sampled values.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericRangeRule;

impl SuggestionRule for NumericRangeRule {
    fn apply(&self, profile: &ColumnProfile) -> Vec<Suggestion> {
        let (Some(min), Some(max), Some(mean)) =
            (profile.min_value, profile.max_value, profile.mean)
        else {
            return Vec::new();
        };
        let integer = profile.data_type == DetectedDataType::Integer;
        let column = &profile.column_name;

        vec![
            Suggestion::column(ExpectationType::ColumnMinToBeBetween, column)
                .with_range(number(min, integer), number(min, integer)),
            Suggestion::column(ExpectationType::ColumnMaxToBeBetween, column)
                .with_range(number(max, integer), number(max, integer)),
            Suggestion::column(ExpectationType::ColumnMeanToBeBetween, column)
                .with_range(Value::from(mean), Value::from(mean)),
            Suggestion::column(ExpectationType::ColumnValuesToBeBetween, column)
                .with_range(number(min, integer), number(max, integer)),
        ]
    }

    fn name(&self) -> &str {
        "NumericRangeRule"
    }
}

/// Bounds the length of text values by the sampled extremes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringLengthRule;

impl SuggestionRule for StringLengthRule {
    fn apply(&self, profile: &ColumnProfile) -> Vec<Suggestion> {
        match (profile.min_length, profile.max_length) {
            (Some(min), Some(max)) => vec![Suggestion::column(
                ExpectationType::ColumnValueLengthsToBeBetween,
                &profile.column_name,
            )
            .with_range(Value::from(min), Value::from(max))],
            _ => Vec::new(),
        }
    }

    fn name(&self) -> &str {
        "StringLengthRule"
    }
}

fn number(value: f64, integer: bool) -> Value {
    if integer {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

/// Runs the suggestion rules over a table profile.
pub struct SuggestionEngine {
    rules: Vec<Box<dyn SuggestionRule>>,
}

impl SuggestionEngine {
    /// An engine without rules; only table-level candidates are produced.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add_rule(mut self, rule: Box<dyn SuggestionRule>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Table-level candidates followed by the column candidates, in column order.
    #[instrument(skip_all, fields(columns = profile.columns.len(), rules = self.rules.len()))]
    pub fn suggest(&self, profile: &TableProfile) -> Vec<Suggestion> {
        let mut suggestions = vec![
            Suggestion::new(ExpectationType::TableRowCountToBeBetween, Kwargs::new())
                .with_range(Value::from(profile.row_count), Value::from(profile.row_count)),
            Suggestion::new(ExpectationType::TableColumnsToMatchOrderedList, Kwargs::new())
                .with(
                    "column_list",
                    Value::Array(
                        profile
                            .columns
                            .iter()
                            .map(|c| Value::String(c.column_name.clone()))
                            .collect(),
                    ),
                ),
        ];

        for column in &profile.columns {
            for rule in &self.rules {
                let proposed = rule.apply(column);
                debug!(
                    column = %column.column_name,
                    rule = rule.name(),
                    count = proposed.len(),
                    "Applied suggestion rule"
                );
                suggestions.extend(proposed);
            }
        }

        suggestions
    }
}

impl Default for SuggestionEngine {
    fn default() -> Self {
        Self::new()
            .add_rule(Box::new(CompletenessRule))
            .add_rule(Box::new(UniquenessRule))
            .add_rule(Box::new(ValueSetRule))
            .add_rule(Box::new(NumericRangeRule))
            .add_rule(Box::new(StringLengthRule))
    }
}

/// Types never suggested by default: everything the registry cannot run,
/// plus per-value range checks, which are too brittle to propose blindly.
pub fn default_exclusions() -> HashSet<String> {
    UNSUPPORTED_EXPECTATIONS
        .iter()
        .map(|name| name.to_string())
        .chain(std::iter::once(
            ExpectationType::ColumnValuesToBeBetween.as_str().to_string(),
        ))
        .collect()
}

/// Samples datasets and proposes candidate expectations.
pub struct Profiler {
    executor: ValidationExecutor,
    config: ProfilerConfig,
    engine: SuggestionEngine,
}

impl Profiler {
    pub fn new(executor: ValidationExecutor, config: ProfilerConfig) -> Self {
        Self {
            executor,
            config,
            engine: SuggestionEngine::default(),
        }
    }

    pub fn with_suggestion_engine(mut self, engine: SuggestionEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Samples `dataset` and profiles every column.
    ///
    /// An unreadable batch is reported as [`TermError::InvalidDataset`]
    /// carrying the user-facing sample message.
    #[instrument(skip_all, fields(dataset_id = %dataset.key))]
    pub async fn profile(&self, datasource: &Datasource, dataset: &Dataset) -> Result<TableProfile> {
        let response = self
            .executor
            .sample_batch(datasource, dataset, self.config.sample_rows, true)
            .await?;

        let sample = match response {
            SampleResponse::Data(sample) => sample,
            SampleResponse::Exception { exception } => {
                return Err(TermError::invalid_dataset(&dataset.dataset_name, exception))
            }
        };

        Ok(profile_sample(&sample, self.config.value_set_threshold))
    }

    /// Proposes candidate expectations for `dataset`, skipping every type in
    /// `excluded`. Nothing is persisted.
    #[instrument(skip_all, fields(dataset_id = %dataset.key, excluded = excluded.len()))]
    pub async fn suggest(
        &self,
        datasource: &Datasource,
        dataset: &Dataset,
        excluded: &HashSet<String>,
    ) -> Result<Vec<Expectation>> {
        let profile = self.profile(datasource, dataset).await?;
        let suggestions = self.engine.suggest(&profile);
        let proposed = suggestions.len();

        let candidates: Vec<Expectation> = suggestions
            .into_iter()
            .filter(|s| !excluded.contains(s.expectation_type.as_str()))
            .map(|s| self.to_stored(s, datasource, dataset))
            .collect();

        info!(
            rows = profile.row_count,
            proposed,
            kept = candidates.len(),
            "Profiled dataset"
        );
        Ok(candidates)
    }

    fn to_stored(&self, suggestion: Suggestion, datasource: &Datasource, dataset: &Dataset) -> Expectation {
        let mut kwargs = suggestion.kwargs;
        kwargs.insert(
            "result_format".to_string(),
            Value::String(self.config.result_format.as_str().to_string()),
        );
        kwargs.insert("include_config".to_string(), Value::Bool(true));
        kwargs.insert("catch_exceptions".to_string(), Value::Bool(true));

        let now = Utc::now();
        let mut expectation = Expectation::new(
            suggestion.expectation_type.as_str(),
            expectations::to_public(&kwargs),
            datasource.key.as_str(),
            dataset.key.as_str(),
        )
        .with_enabled(false);
        expectation.suggested = true;
        expectation.create_date = Some(now);
        expectation.modified_date = Some(now);
        expectation
    }
}
