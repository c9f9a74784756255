//! Property-based tests for kwarg renaming and outcome normalization.
//!
//! Stored expectations use `objective`; compiled checks and engine outcomes
//! use `mostly`. Whatever value a record carries, compiling it and then
//! normalizing the engine outcome must hand back the stored vocabulary with
//! the same value, and every normalized result must carry the record key.

use proptest::prelude::*;
use serde_json::{json, Map, Value};
use term_orchestrator::engine::RawOutcome;
use term_orchestrator::executor::normalize_outcome;
use term_orchestrator::expectations::{self, CheckSpec};
use term_orchestrator::model::{ExceptionInfo, Expectation, ExpectationConfig};
use term_orchestrator::suite::{compile_expectation, EXPECTATION_ID};

fn record(key: &str, column: &str, objective: f64) -> Expectation {
    let mut kwargs = Map::new();
    kwargs.insert("column".into(), json!(column));
    kwargs.insert("objective".into(), json!(objective));
    Expectation::new(
        "expect_column_values_to_not_be_null",
        kwargs,
        "ds-1",
        "orders",
    )
    .with_key(key)
}

fn outcome_for(record: &Expectation, result: Map<String, Value>) -> RawOutcome {
    let mut meta = Map::new();
    meta.insert(
        EXPECTATION_ID.into(),
        json!(record.key.clone().unwrap_or_default()),
    );
    let check = compile_expectation(record, meta).unwrap();

    RawOutcome {
        expectation_config: ExpectationConfig {
            expectation_type: check.expectation_type.as_str().to_string(),
            kwargs: check.kwargs,
            meta: check.meta,
        },
        success: true,
        result,
        exception_info: ExceptionInfo::default(),
    }
}

proptest! {
    #[test]
    fn prop_objective_survives_compile_and_normalize(
        objective in 0.0f64..=1.0,
        column in "[a-z][a-z_]{0,11}",
        key in "[a-f0-9]{8,20}",
    ) {
        let record = record(&key, &column, objective);

        let check = compile_expectation(&record, Map::new()).unwrap();
        prop_assert!(!check.kwargs.contains_key("objective"));
        prop_assert_eq!(&check.kwargs["mostly"], &json!(objective));
        match &check.spec {
            CheckSpec::ColumnValues { mostly, .. } => prop_assert_eq!(*mostly, Some(objective)),
            other => prop_assert!(false, "unexpected spec {:?}", other),
        }

        let normalized = normalize_outcome(outcome_for(&record, Map::new())).unwrap();
        prop_assert_eq!(&normalized.expectation_id, &key);
        prop_assert!(!normalized.expectation_config.kwargs.contains_key("mostly"));
        prop_assert_eq!(&normalized.expectation_config.kwargs["objective"], &json!(objective));
        prop_assert!(!normalized.expectation_config.meta.contains_key(EXPECTATION_ID));
    }

    #[test]
    fn prop_rename_is_symmetric(
        entries in prop::collection::btree_map("[a-z_]{1,10}", any::<i64>(), 0..8),
        objective in proptest::option::of(any::<i32>()),
    ) {
        let mut kwargs: Map<String, Value> = entries
            .into_iter()
            .filter(|(name, _)| name != "mostly")
            .map(|(name, value)| (name, json!(value)))
            .collect();
        if let Some(objective) = objective {
            kwargs.insert("objective".into(), json!(objective));
        }

        let engine = expectations::to_engine(&kwargs);
        prop_assert_eq!(engine.contains_key("mostly"), kwargs.contains_key("objective"));
        prop_assert!(!engine.contains_key("objective"));
        prop_assert_eq!(expectations::to_public(&engine), kwargs);
    }

    #[test]
    fn prop_list_observed_values_move(values in prop::collection::vec(any::<i64>(), 0..10)) {
        let record = record("e-1", "status", 0.5);
        let mut result = Map::new();
        result.insert("observed_value".into(), json!(values));

        let normalized = normalize_outcome(outcome_for(&record, result)).unwrap();
        prop_assert!(!normalized.result.contains_key("observed_value"));
        prop_assert_eq!(&normalized.result["observed_value_list"], &json!(values));
    }
}

#[test]
fn test_scalar_observed_value_stays() {
    let record = record("e-1", "amount", 1.0);
    let mut result = Map::new();
    result.insert("observed_value".into(), json!(12.5));

    let normalized = normalize_outcome(outcome_for(&record, result)).unwrap();
    assert_eq!(normalized.result["observed_value"], json!(12.5));
    assert!(!normalized.result.contains_key("observed_value_list"));
}
