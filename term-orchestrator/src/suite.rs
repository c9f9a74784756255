//! Compiles stored expectation records into an executable suite.

use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::error::{Result, TermError};
use crate::expectations::{self, CheckOptions, CheckSpec, ExpectationType};
use crate::model::{Dataset, Datasource, Expectation, Kwargs};

/// Per-check metadata key carrying the stored expectation key.
pub const EXPECTATION_ID: &str = "expectation_id";

/// One executable check.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledCheck {
    pub expectation_type: ExpectationType,
    /// Engine-form kwargs (`mostly`, not `objective`).
    pub kwargs: Kwargs,
    pub meta: Map<String, Value>,
    pub spec: CheckSpec,
    pub options: CheckOptions,
}

impl CompiledCheck {
    pub fn expectation_id(&self) -> Option<&str> {
        self.meta.get(EXPECTATION_ID).and_then(Value::as_str)
    }
}

/// Ordered checks for one run. Engine outcomes follow the same order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledSuite {
    pub checks: Vec<CompiledCheck>,
}

impl CompiledSuite {
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledCheck> {
        self.checks.iter()
    }
}

/// Datasource defaults plus the dataset name, shared by every check of a run.
pub fn meta_template(datasource: &Datasource, dataset: &Dataset) -> Map<String, Value> {
    let mut meta = datasource.expectation_meta();
    meta.insert(
        "dataset_name".to_string(),
        Value::String(dataset.dataset_name.clone()),
    );
    meta
}

/// Validates a single record against the registry and its parameter schema.
pub fn compile_expectation(record: &Expectation, meta: Map<String, Value>) -> Result<CompiledCheck> {
    let expectation_type = ExpectationType::parse(&record.expectation_type)?;
    let kwargs = expectations::to_engine(&record.kwargs);
    let spec = expectations::compile(expectation_type, &kwargs)?;
    let options = expectations::compile_options(expectation_type, &kwargs)?;

    Ok(CompiledCheck {
        expectation_type,
        kwargs,
        meta,
        spec,
        options,
    })
}

/// Compiles `records` in order.
///
/// Check metadata is the template plus the runtime query parameters of a
/// query-addressed dataset, unless the record carries its own `meta`, which
/// replaces it. The record key is always added as `expectation_id`.
#[instrument(skip_all, fields(dataset = %dataset.dataset_name, expectations = records.len()))]
pub fn compile_suite(
    records: &[Expectation],
    template: &Map<String, Value>,
    dataset: &Dataset,
) -> Result<CompiledSuite> {
    let mut checks = Vec::with_capacity(records.len());

    for record in records {
        let key = record
            .key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| TermError::MissingExpectationId {
                expectation_type: record.expectation_type.clone(),
            })?;

        let mut meta = match &record.meta {
            Some(explicit) => explicit.clone(),
            None => {
                let mut meta = template.clone();
                if let Some(params) = &dataset.runtime_parameters {
                    meta.extend(params.to_meta());
                }
                meta
            }
        };
        meta.insert(EXPECTATION_ID.to_string(), Value::String(key.to_string()));

        let check = compile_expectation(record, meta)?;
        debug!(expectation_id = key, expectation_type = %check.expectation_type, "Compiled expectation");
        checks.push(check);
    }

    Ok(CompiledSuite { checks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{expectation, postgres_datasource};
    use serde_json::json;

    #[test]
    fn test_meta_merges_template_and_runtime_parameters() {
        let ds = postgres_datasource("ds-1", "warehouse");
        let dataset = Dataset::query("ds-1", "recent", "select * from orders", Some("sales".into()));
        let template = meta_template(&ds, &dataset);

        let records = vec![expectation(
            "e-1",
            "expect_column_values_to_not_be_null",
            json!({"column": "id", "objective": 0.95}),
        )];
        let suite = compile_suite(&records, &template, &dataset).unwrap();
        let check = &suite.checks[0];

        assert_eq!(check.meta["datasource_name"], json!("warehouse"));
        assert_eq!(check.meta["dataset_name"], json!("recent"));
        assert_eq!(check.meta["query"], json!("select * from orders"));
        assert_eq!(check.meta["schema"], json!("sales"));
        assert_eq!(check.expectation_id(), Some("e-1"));
        assert_eq!(check.kwargs["mostly"], json!(0.95));
        assert!(!check.kwargs.contains_key("objective"));
    }

    #[test]
    fn test_explicit_meta_replaces_template() {
        let ds = postgres_datasource("ds-1", "warehouse");
        let dataset = Dataset::table("ds-1", "public.orders");
        let template = meta_template(&ds, &dataset);

        let mut explicit = Map::new();
        explicit.insert("owner".into(), json!("finance"));
        let records = vec![expectation(
            "e-1",
            "expect_column_to_exist",
            json!({"column": "id"}),
        )
        .with_meta(explicit)];

        let suite = compile_suite(&records, &template, &dataset).unwrap();
        let meta = &suite.checks[0].meta;
        assert_eq!(meta.len(), 2);
        assert_eq!(meta["owner"], json!("finance"));
        assert_eq!(meta[EXPECTATION_ID], json!("e-1"));
    }

    #[test]
    fn test_unregistered_type_fails_the_suite() {
        let ds = postgres_datasource("ds-1", "warehouse");
        let dataset = Dataset::table("ds-1", "public.orders");
        let records = vec![expectation(
            "e-1",
            "expect_column_to_be_purple",
            json!({"column": "id"}),
        )];

        let err = compile_suite(&records, &meta_template(&ds, &dataset), &dataset).unwrap_err();
        assert!(matches!(err, TermError::UnsupportedExpectationType { .. }));
    }

    #[test]
    fn test_record_without_key_is_rejected() {
        let dataset = Dataset::table("ds-1", "public.orders");
        let mut record = expectation("e-1", "expect_column_to_exist", json!({"column": "id"}));
        record.key = None;

        let err = compile_suite(&[record], &Map::new(), &dataset).unwrap_err();
        assert!(matches!(err, TermError::MissingExpectationId { .. }));
    }
}
