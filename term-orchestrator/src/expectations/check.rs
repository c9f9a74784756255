//! Typed check specifications compiled from expectation kwargs.

use serde_json::Value;

use super::kwargs::KwargsReader;
use super::registry::ExpectationType;
use crate::config::ResultFormat;
use crate::error::Result;
use crate::model::Kwargs;
use crate::security::SqlSecurity;

/// An inclusive or strict numeric interval. At least one bound is set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub strict_min: bool,
    pub strict_max: bool,
}

impl ValueRange {
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            strict_min: false,
            strict_max: false,
        }
    }

    pub fn exactly(value: f64) -> Self {
        Self::between(value, value)
    }

    pub fn contains(&self, value: f64) -> bool {
        let above = match self.min {
            Some(min) if self.strict_min => value > min,
            Some(min) => value >= min,
            None => true,
        };
        let below = match self.max {
            Some(max) if self.strict_max => value < max,
            Some(max) => value <= max,
            None => true,
        };
        above && below
    }
}

/// Row-wise predicate evaluated by column map checks.
#[derive(Debug, Clone, PartialEq)]
pub enum RowCondition {
    NotNull,
    Null,
    Unique,
    InSet(Vec<Value>),
    NotInSet(Vec<Value>),
    Between(ValueRange),
    MatchRegex(String),
    LengthBetween(ValueRange),
}

impl RowCondition {
    /// Null values are ignored by every condition except the null checks.
    pub fn ignores_nulls(&self) -> bool {
        !matches!(self, RowCondition::NotNull | RowCondition::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Mean,
    Min,
    Max,
    Sum,
    Median,
    Stdev,
    UniqueCount,
    UniqueProportion,
}

/// How a column's distinct values must relate to the expected set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetComparison {
    /// Every distinct value is in the expected set.
    Subset,
    /// Every expected value occurs in the column.
    Superset,
    Equal,
}

/// A compiled, engine-independent description of one check.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckSpec {
    TableRowCount {
        range: ValueRange,
    },
    TableColumnCount {
        value: u64,
    },
    TableColumnsOrderedList {
        columns: Vec<String>,
    },
    TableColumnsSet {
        columns: Vec<String>,
        exact_match: bool,
    },
    ColumnExists {
        column: String,
    },
    ColumnValues {
        column: String,
        condition: RowCondition,
        mostly: Option<f64>,
    },
    ColumnAggregate {
        column: String,
        aggregate: Aggregate,
        range: ValueRange,
    },
    DistinctValues {
        column: String,
        values: Vec<Value>,
        comparison: SetComparison,
    },
}

impl CheckSpec {
    /// The column this check targets, if any.
    pub fn column(&self) -> Option<&str> {
        match self {
            CheckSpec::ColumnExists { column }
            | CheckSpec::ColumnValues { column, .. }
            | CheckSpec::ColumnAggregate { column, .. }
            | CheckSpec::DistinctValues { column, .. } => Some(column),
            _ => None,
        }
    }
}

/// Output options shared by every expectation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOptions {
    pub result_format: ResultFormat,
    pub catch_exceptions: bool,
    pub include_config: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            result_format: ResultFormat::Basic,
            catch_exceptions: false,
            include_config: true,
        }
    }
}

/// Validates engine-form kwargs and produces the typed check.
pub fn compile(expectation_type: ExpectationType, kwargs: &Kwargs) -> Result<CheckSpec> {
    use ExpectationType as T;

    let reader = KwargsReader::new(expectation_type.as_str(), kwargs);
    // Accepted by every kind; only column map checks act on it.
    let mostly = reader.mostly()?;

    let spec = match expectation_type {
        T::TableRowCountToBeBetween => CheckSpec::TableRowCount {
            range: read_range(&reader, "min_value", "max_value")?,
        },
        T::TableRowCountToEqual => CheckSpec::TableRowCount {
            range: ValueRange::exactly(read_count(&reader, "value")? as f64),
        },
        T::TableColumnCountToEqual => CheckSpec::TableColumnCount {
            value: read_count(&reader, "value")?,
        },
        T::TableColumnsToMatchOrderedList => CheckSpec::TableColumnsOrderedList {
            columns: reader.required_str_list("column_list")?,
        },
        T::TableColumnsToMatchSet => CheckSpec::TableColumnsSet {
            columns: reader.required_str_list("column_set")?,
            exact_match: reader.optional_bool("exact_match", true)?,
        },
        T::ColumnToExist => CheckSpec::ColumnExists {
            column: reader.required_str("column")?,
        },
        T::ColumnValuesToNotBeNull => column_values(&reader, RowCondition::NotNull, mostly)?,
        T::ColumnValuesToBeNull => column_values(&reader, RowCondition::Null, mostly)?,
        T::ColumnValuesToBeUnique => column_values(&reader, RowCondition::Unique, mostly)?,
        T::ColumnValuesToBeInSet => column_values(
            &reader,
            RowCondition::InSet(reader.required_list("value_set")?),
            mostly,
        )?,
        T::ColumnValuesToNotBeInSet => column_values(
            &reader,
            RowCondition::NotInSet(reader.required_list("value_set")?),
            mostly,
        )?,
        T::ColumnValuesToBeBetween => column_values(
            &reader,
            RowCondition::Between(read_range(&reader, "min_value", "max_value")?),
            mostly,
        )?,
        T::ColumnValuesToMatchRegex => {
            let regex = reader.required_str("regex")?;
            SqlSecurity::validate_regex_pattern(&regex)
                .map_err(|e| reader.error("regex", e.to_string()))?;
            column_values(&reader, RowCondition::MatchRegex(regex), mostly)?
        }
        T::ColumnValueLengthsToBeBetween => column_values(
            &reader,
            RowCondition::LengthBetween(read_range(&reader, "min_value", "max_value")?),
            mostly,
        )?,
        T::ColumnMeanToBeBetween => aggregate(&reader, Aggregate::Mean)?,
        T::ColumnMinToBeBetween => aggregate(&reader, Aggregate::Min)?,
        T::ColumnMaxToBeBetween => aggregate(&reader, Aggregate::Max)?,
        T::ColumnSumToBeBetween => aggregate(&reader, Aggregate::Sum)?,
        T::ColumnMedianToBeBetween => aggregate(&reader, Aggregate::Median)?,
        T::ColumnStdevToBeBetween => aggregate(&reader, Aggregate::Stdev)?,
        T::ColumnUniqueValueCountToBeBetween => aggregate(&reader, Aggregate::UniqueCount)?,
        T::ColumnProportionOfUniqueValuesToBeBetween => {
            aggregate(&reader, Aggregate::UniqueProportion)?
        }
        T::ColumnDistinctValuesToBeInSet => distinct(&reader, SetComparison::Subset)?,
        T::ColumnDistinctValuesToContainSet => distinct(&reader, SetComparison::Superset)?,
        T::ColumnDistinctValuesToEqualSet => distinct(&reader, SetComparison::Equal)?,
    };

    Ok(spec)
}

/// Reads the shared output options from engine-form kwargs.
pub fn compile_options(expectation_type: ExpectationType, kwargs: &Kwargs) -> Result<CheckOptions> {
    let reader = KwargsReader::new(expectation_type.as_str(), kwargs);
    let defaults = CheckOptions::default();

    let result_format = match kwargs.get("result_format").filter(|v| !v.is_null()) {
        None => defaults.result_format,
        Some(value) => ResultFormat::from_kwarg(value)
            .ok_or_else(|| reader.error("result_format", format!("unknown format {value}")))?,
    };

    Ok(CheckOptions {
        result_format,
        catch_exceptions: reader.optional_bool("catch_exceptions", defaults.catch_exceptions)?,
        include_config: reader.optional_bool("include_config", defaults.include_config)?,
    })
}

fn column_values(
    reader: &KwargsReader<'_>,
    condition: RowCondition,
    mostly: Option<f64>,
) -> Result<CheckSpec> {
    Ok(CheckSpec::ColumnValues {
        column: reader.required_str("column")?,
        condition,
        mostly,
    })
}

fn aggregate(reader: &KwargsReader<'_>, aggregate: Aggregate) -> Result<CheckSpec> {
    Ok(CheckSpec::ColumnAggregate {
        column: reader.required_str("column")?,
        aggregate,
        range: read_range(reader, "min_value", "max_value")?,
    })
}

fn distinct(reader: &KwargsReader<'_>, comparison: SetComparison) -> Result<CheckSpec> {
    Ok(CheckSpec::DistinctValues {
        column: reader.required_str("column")?,
        values: reader.required_list("value_set")?,
        comparison,
    })
}

fn read_count(reader: &KwargsReader<'_>, field: &str) -> Result<u64> {
    let value = reader.required_f64(field)?;
    if value < 0.0 || value.fract() != 0.0 {
        return Err(reader.error(field, format!("must be a non-negative integer, got {value}")));
    }
    Ok(value as u64)
}

fn read_range(reader: &KwargsReader<'_>, min_field: &str, max_field: &str) -> Result<ValueRange> {
    let min = reader.optional_f64(min_field)?;
    let max = reader.optional_f64(max_field)?;

    match (min, max) {
        (None, None) => {
            return Err(reader.error(
                min_field,
                format!("at least one of '{min_field}' or '{max_field}' is required"),
            ))
        }
        (Some(lo), Some(hi)) if lo > hi => {
            return Err(reader.error(
                min_field,
                format!("'{min_field}' ({lo}) is greater than '{max_field}' ({hi})"),
            ))
        }
        _ => {}
    }

    Ok(ValueRange {
        min,
        max,
        strict_min: reader.optional_bool("strict_min", false)?,
        strict_max: reader.optional_bool("strict_max", false)?,
    })
}
