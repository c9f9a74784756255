//! The closed set of supported expectation kinds.

use serde::Serialize;

use crate::error::{Result, TermError};

/// How an expectation evaluates the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectationCategory {
    /// Properties of the whole table (row count, column layout).
    Table,
    /// Presence of a single column.
    ColumnExistence,
    /// Row-wise predicate on one column; honours `mostly`.
    ColumnMap,
    /// A single aggregate statistic of one column.
    ColumnAggregate,
    /// Comparison of a column's distinct values with a set.
    DistinctSet,
}

macro_rules! expectation_types {
    ($( $variant:ident => ($name:literal, $category:ident) ),+ $(,)?) => {
        /// A registered expectation kind.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ExpectationType {
            $( $variant, )+
        }

        impl ExpectationType {
            /// Every registered kind, in registry order.
            pub const ALL: &'static [ExpectationType] = &[ $( ExpectationType::$variant, )+ ];

            /// The stored `expectation_type` name.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( ExpectationType::$variant => $name, )+
                }
            }

            pub fn category(&self) -> ExpectationCategory {
                match self {
                    $( ExpectationType::$variant => ExpectationCategory::$category, )+
                }
            }
        }
    };
}

expectation_types! {
    TableRowCountToBeBetween => ("expect_table_row_count_to_be_between", Table),
    TableRowCountToEqual => ("expect_table_row_count_to_equal", Table),
    TableColumnCountToEqual => ("expect_table_column_count_to_equal", Table),
    TableColumnsToMatchOrderedList => ("expect_table_columns_to_match_ordered_list", Table),
    TableColumnsToMatchSet => ("expect_table_columns_to_match_set", Table),
    ColumnToExist => ("expect_column_to_exist", ColumnExistence),
    ColumnValuesToNotBeNull => ("expect_column_values_to_not_be_null", ColumnMap),
    ColumnValuesToBeNull => ("expect_column_values_to_be_null", ColumnMap),
    ColumnValuesToBeUnique => ("expect_column_values_to_be_unique", ColumnMap),
    ColumnValuesToBeInSet => ("expect_column_values_to_be_in_set", ColumnMap),
    ColumnValuesToNotBeInSet => ("expect_column_values_to_not_be_in_set", ColumnMap),
    ColumnValuesToBeBetween => ("expect_column_values_to_be_between", ColumnMap),
    ColumnValuesToMatchRegex => ("expect_column_values_to_match_regex", ColumnMap),
    ColumnValueLengthsToBeBetween => ("expect_column_value_lengths_to_be_between", ColumnMap),
    ColumnMeanToBeBetween => ("expect_column_mean_to_be_between", ColumnAggregate),
    ColumnMinToBeBetween => ("expect_column_min_to_be_between", ColumnAggregate),
    ColumnMaxToBeBetween => ("expect_column_max_to_be_between", ColumnAggregate),
    ColumnSumToBeBetween => ("expect_column_sum_to_be_between", ColumnAggregate),
    ColumnMedianToBeBetween => ("expect_column_median_to_be_between", ColumnAggregate),
    ColumnStdevToBeBetween => ("expect_column_stdev_to_be_between", ColumnAggregate),
    ColumnUniqueValueCountToBeBetween => ("expect_column_unique_value_count_to_be_between", ColumnAggregate),
    ColumnProportionOfUniqueValuesToBeBetween => ("expect_column_proportion_of_unique_values_to_be_between", ColumnAggregate),
    ColumnDistinctValuesToBeInSet => ("expect_column_distinct_values_to_be_in_set", DistinctSet),
    ColumnDistinctValuesToContainSet => ("expect_column_distinct_values_to_contain_set", DistinctSet),
    ColumnDistinctValuesToEqualSet => ("expect_column_distinct_values_to_equal_set", DistinctSet),
}

/// Expectation kinds known to the wider ecosystem that this build does not evaluate.
pub const UNSUPPORTED_EXPECTATIONS: &[&str] = &[
    "expect_column_values_to_be_of_type",
    "expect_column_values_to_be_in_type_list",
    "expect_column_values_to_be_increasing",
    "expect_column_values_to_be_decreasing",
    "expect_column_values_to_not_match_regex",
    "expect_column_values_to_match_regex_list",
    "expect_column_values_to_not_match_regex_list",
    "expect_column_values_to_match_like_pattern",
    "expect_column_values_to_not_match_like_pattern",
    "expect_column_values_to_match_strftime_format",
    "expect_column_values_to_be_dateutil_parseable",
    "expect_column_values_to_be_json_parseable",
    "expect_column_values_to_match_json_schema",
    "expect_column_value_lengths_to_equal",
    "expect_column_value_z_scores_to_be_less_than",
    "expect_column_most_common_value_to_be_in_set",
    "expect_column_quantile_values_to_be_between",
    "expect_column_kl_divergence_to_be_less_than",
    "expect_column_pair_values_to_be_equal",
    "expect_column_pair_values_a_to_be_greater_than_b",
    "expect_column_pair_values_to_be_in_set",
    "expect_compound_columns_to_be_unique",
    "expect_multicolumn_sum_to_equal",
    "expect_select_column_values_to_be_unique_within_record",
    "expect_table_row_count_to_equal_other_table",
    "expect_table_column_count_to_be_between",
];

impl ExpectationType {
    /// Resolves a stored type name against the registry.
    pub fn parse(name: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == name)
            .ok_or_else(|| TermError::UnsupportedExpectationType {
                expectation_type: name.to_string(),
            })
    }

    /// True for row-wise checks that honour a `mostly` threshold.
    pub fn honours_mostly(&self) -> bool {
        self.category() == ExpectationCategory::ColumnMap
    }
}

impl std::fmt::Display for ExpectationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExpectationType {
    type Err = TermError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Registry listing served to callers and used to build profiler exclusions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupportedExpectations {
    pub supported_expectations: Vec<&'static str>,
    pub unsupported_expectations: Vec<&'static str>,
}

pub fn supported_unsupported_expectations() -> SupportedExpectations {
    SupportedExpectations {
        supported_expectations: ExpectationType::ALL.iter().map(|t| t.as_str()).collect(),
        unsupported_expectations: UNSUPPORTED_EXPECTATIONS.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parse_round_trips_every_type() {
        for t in ExpectationType::ALL {
            assert_eq!(ExpectationType::parse(t.as_str()).unwrap(), *t);
        }
    }

    #[test]
    fn test_unregistered_type() {
        let err = ExpectationType::parse("expect_column_to_be_purple").unwrap_err();
        assert!(matches!(err, TermError::UnsupportedExpectationType { .. }));
    }

    #[test]
    fn test_supported_and_unsupported_are_disjoint() {
        let listing = supported_unsupported_expectations();
        let supported: HashSet<_> = listing.supported_expectations.iter().collect();
        assert_eq!(supported.len(), ExpectationType::ALL.len());
        for name in &listing.unsupported_expectations {
            assert!(!supported.contains(name), "{name} listed twice");
            assert!(ExpectationType::parse(name).is_err());
        }
    }

    #[test]
    fn test_categories() {
        assert!(ExpectationType::ColumnValuesToNotBeNull.honours_mostly());
        assert!(!ExpectationType::ColumnMeanToBeBetween.honours_mostly());
        assert_eq!(
            ExpectationType::TableRowCountToEqual.category(),
            ExpectationCategory::Table
        );
    }
}
