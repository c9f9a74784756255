//! Fixtures shared by unit tests.

use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::model::{
    Datasource, ExceptionInfo, ExpectationConfig, Expectation, RunId, Statistics, Validation,
    ValidationMeta, ValidationResult,
};

/// A PostgreSQL datasource on `db.internal`, database `sales`.
pub fn postgres_datasource(key: &str, name: &str) -> Datasource {
    Datasource::from_document(
        key,
        &json!({
            "datasource_name": name,
            "engine": "PostgreSQL",
            "host": "db.internal",
            "port": 5432,
            "username": "analyst",
            "password": "secret",
            "database": "sales"
        }),
    )
    .unwrap()
}

/// A Snowflake datasource on account `acme-eu`, database `ANALYTICS`.
pub fn snowflake_datasource(key: &str) -> Datasource {
    Datasource::from_document(
        key,
        &json!({
            "datasource_name": "snow",
            "engine": "Snowflake",
            "account": "acme-eu",
            "username": "loader",
            "password": "pw",
            "database": "ANALYTICS",
            "warehouse": "COMPUTE_WH"
        }),
    )
    .unwrap()
}

/// A BigQuery datasource in project `acme-prod`.
pub fn bigquery_datasource(key: &str) -> Datasource {
    Datasource::from_document(
        key,
        &json!({
            "datasource_name": "bq",
            "engine": "BigQuery",
            "gcp_project": "acme-prod"
        }),
    )
    .unwrap()
}

/// A stored expectation with key `key` on dataset `orders` of datasource `ds-1`.
pub fn expectation(key: &str, expectation_type: &str, kwargs: Value) -> Expectation {
    Expectation::new(
        expectation_type,
        kwargs.as_object().cloned().unwrap_or_default(),
        "ds-1",
        "orders",
    )
    .with_key(key)
}

/// A one-result validation of dataset `orders` run now.
pub fn validation_with_success(success: bool) -> Validation {
    let now = Utc::now();
    let results = vec![ValidationResult {
        expectation_id: "e-1".to_string(),
        expectation_config: ExpectationConfig {
            expectation_type: "expect_column_values_to_not_be_null".to_string(),
            kwargs: json!({"column": "id"}).as_object().cloned().unwrap_or_default(),
            meta: Map::new(),
        },
        success,
        result: Map::new(),
        exception_info: ExceptionInfo::default(),
    }];
    let statistics = Statistics::from_results(&results);

    Validation {
        meta: ValidationMeta {
            run_id: RunId {
                run_time: now,
                run_name: "test-run".to_string(),
            },
            datasource_id: "ds-1".to_string(),
            dataset_id: "orders".to_string(),
            dataset_name: "public.orders".to_string(),
            validation_time: now,
            tags: Map::new(),
        },
        results,
        statistics,
        success,
    }
}
