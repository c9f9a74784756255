//! Embedded reference engine backed by Apache DataFusion.
//!
//! Each datasource is a [`SessionContext`] registered under its
//! `datasource_name`. A run resolves the batch in that context, exposes it
//! as the table `batch` in a fresh per-run context, and evaluates every
//! check with generated SQL against it.

use arrow::array::{Array, Float64Array, Int64Array, RecordBatch};
use arrow::json::writer::{JsonArray, WriterBuilder};
use async_trait::async_trait;
use datafusion::datasource::{MemTable, TableProvider};
use datafusion::execution::context::SQLOptions;
use datafusion::prelude::*;
use datafusion::sql::TableReference;
use futures::future::try_join_all;
use serde_json::{Map, Number, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::{EngineError, EngineResult, ExecutionEngine, ExecutionOptions, RawOutcome, SampleData};
use crate::batch::BatchDescriptor;
use crate::config::ResultFormat;
use crate::connection::ConnectionDescriptor;
use crate::expectations::{Aggregate, CheckSpec, RowCondition, SetComparison, ValueRange};
use crate::model::{ExceptionInfo, ExpectationConfig};
use crate::security::SqlSecurity;
use crate::suite::{CompiledCheck, CompiledSuite};

/// Name under which the batch is visible to generated SQL.
const BATCH_TABLE: &str = "batch";

/// Maximum number of unexpected values reported per check.
const PARTIAL_UNEXPECTED_LIMIT: usize = 20;

/// DataFusion-backed [`ExecutionEngine`].
///
/// # Examples
///
/// ```rust,no_run
/// use datafusion::prelude::SessionContext;
/// use term_orchestrator::engine::DataFusionEngine;
///
/// # async fn example() -> datafusion::error::Result<()> {
/// let ctx = SessionContext::new();
/// ctx.sql("CREATE TABLE orders AS VALUES (1), (2)").await?.collect().await?;
///
/// let engine = DataFusionEngine::new();
/// engine.register("warehouse", ctx).await;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct DataFusionEngine {
    sessions: RwLock<HashMap<String, SessionContext>>,
}

impl DataFusionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`DataFusionEngine::register`].
    pub fn with_session(mut self, datasource_name: impl Into<String>, ctx: SessionContext) -> Self {
        self.sessions.get_mut().insert(datasource_name.into(), ctx);
        self
    }

    /// Registers the session holding a datasource's tables.
    pub async fn register(&self, datasource_name: impl Into<String>, ctx: SessionContext) {
        self.sessions
            .write()
            .await
            .insert(datasource_name.into(), ctx);
    }

    async fn session(&self, datasource_name: &str) -> EngineResult<SessionContext> {
        self.sessions
            .read()
            .await
            .get(datasource_name)
            .cloned()
            .ok_or_else(|| {
                EngineError::connection(datasource_name, "no session registered for datasource")
            })
    }

    /// Resolves the batch rows in the datasource session.
    async fn load(
        &self,
        connection: &ConnectionDescriptor,
        batch: &BatchDescriptor,
    ) -> EngineResult<DataFrame> {
        let source = self.session(&connection.datasource_name).await?;

        match batch {
            BatchDescriptor::NamedTable { table, .. } => {
                let reference = match (&connection.schema, table.contains('.')) {
                    (Some(schema), false) => TableReference::partial(schema.as_str(), table.as_str()),
                    _ => TableReference::from(table.as_str()),
                };
                source
                    .table(reference)
                    .await
                    .map_err(|e| EngineError::not_found(table, e.to_string()))
            }
            BatchDescriptor::AdHoc { query, .. } => {
                let options = SQLOptions::new()
                    .with_allow_ddl(false)
                    .with_allow_dml(false)
                    .with_allow_statements(false);
                source
                    .sql_with_options(query, options)
                    .await
                    .map_err(|e| EngineError::syntax(e.to_string()))
            }
        }
    }

    /// Exposes the batch as [`BATCH_TABLE`] in a fresh run-scoped context.
    async fn run_context(
        &self,
        df: DataFrame,
        batch: &BatchDescriptor,
        options: ExecutionOptions,
    ) -> EngineResult<SessionContext> {
        let partitions = if options.allow_concurrency {
            num_cpus::get()
        } else {
            1
        };
        let ctx = SessionContext::new_with_config(
            SessionConfig::new().with_target_partitions(partitions),
        );

        let provider: Arc<dyn TableProvider> = if batch.create_temp_table() {
            let schema = Arc::clone(df.schema().inner());
            let batches = df.collect().await.map_err(execution)?;
            Arc::new(MemTable::try_new(schema, vec![batches]).map_err(execution)?)
        } else {
            df.into_view()
        };

        ctx.register_table(BATCH_TABLE, provider)
            .map_err(execution)?;
        Ok(ctx)
    }

    async fn evaluate(&self, ctx: &SessionContext, check: &CompiledCheck) -> EngineResult<RawOutcome> {
        let expectation_config = ExpectationConfig {
            expectation_type: check.expectation_type.as_str().to_string(),
            kwargs: check.kwargs.clone(),
            meta: check.meta.clone(),
        };

        match evaluate_spec(ctx, &check.spec, check.options.result_format).await {
            Ok((success, mut result)) => {
                if check.options.result_format == ResultFormat::BooleanOnly {
                    result.clear();
                }
                Ok(RawOutcome {
                    expectation_config,
                    success,
                    result,
                    exception_info: ExceptionInfo::default(),
                })
            }
            Err(err) if check.options.catch_exceptions => {
                warn!(
                    expectation_type = %check.expectation_type,
                    column = check.spec.column().unwrap_or_default(),
                    error = %err,
                    "Check raised an exception"
                );
                Ok(RawOutcome {
                    expectation_config,
                    success: false,
                    result: Map::new(),
                    exception_info: ExceptionInfo::raised(err.to_string()),
                })
            }
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl ExecutionEngine for DataFusionEngine {
    #[instrument(skip_all, fields(
        datasource = %connection.datasource_name,
        batch = %batch.data_asset_name(),
        checks = suite.len()
    ))]
    async fn execute(
        &self,
        connection: &ConnectionDescriptor,
        batch: &BatchDescriptor,
        suite: &CompiledSuite,
        options: ExecutionOptions,
    ) -> EngineResult<Vec<RawOutcome>> {
        let df = self.load(connection, batch).await?;
        let ctx = self.run_context(df, batch, options).await?;

        let outcomes = if options.allow_concurrency {
            try_join_all(suite.iter().map(|check| self.evaluate(&ctx, check))).await?
        } else {
            let mut outcomes = Vec::with_capacity(suite.len());
            for check in suite.iter() {
                outcomes.push(self.evaluate(&ctx, check).await?);
            }
            outcomes
        };

        info!(
            evaluated = outcomes.len(),
            failed = outcomes.iter().filter(|o| !o.success).count(),
            "Suite evaluated"
        );
        Ok(outcomes)
    }

    #[instrument(skip_all, fields(
        datasource = %connection.datasource_name,
        batch = %batch.data_asset_name(),
        row_limit = row_limit
    ))]
    async fn sample(
        &self,
        connection: &ConnectionDescriptor,
        batch: &BatchDescriptor,
        row_limit: usize,
    ) -> EngineResult<SampleData> {
        let df = self.load(connection, batch).await?;
        let ctx = self
            .run_context(df, batch, ExecutionOptions::default())
            .await?;
        let df = ctx.table(BATCH_TABLE).await.map_err(execution)?;
        let columns = df
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect::<Vec<_>>();

        let batches = df
            .limit(0, Some(row_limit))
            .map_err(execution)?
            .collect()
            .await
            .map_err(execution)?;
        let rows = batches_to_rows(&batches)?;

        debug!(columns = columns.len(), rows = rows.len(), "Sampled batch");
        Ok(SampleData { columns, rows })
    }
}

fn execution(err: impl std::fmt::Display) -> EngineError {
    EngineError::execution(err.to_string())
}

fn quote(column: &str) -> EngineResult<String> {
    SqlSecurity::quote_identifier(column).map_err(execution)
}

/// Evaluates one check, returning its success flag and result metrics.
async fn evaluate_spec(
    ctx: &SessionContext,
    spec: &CheckSpec,
    format: ResultFormat,
) -> EngineResult<(bool, Map<String, Value>)> {
    let mut result = Map::new();

    let success = match spec {
        CheckSpec::TableRowCount { range } => {
            let batches = query(ctx, &format!("SELECT COUNT(*) FROM {BATCH_TABLE}")).await?;
            let count = int_at(&batches, 0).unwrap_or(0);
            result.insert("observed_value".into(), Value::from(count));
            range.contains(count as f64)
        }
        CheckSpec::TableColumnCount { value } => {
            let columns = batch_columns(ctx).await?;
            result.insert("observed_value".into(), Value::from(columns.len()));
            columns.len() as u64 == *value
        }
        CheckSpec::TableColumnsOrderedList { columns } => {
            let observed = batch_columns(ctx).await?;
            let success = &observed == columns;
            result.insert("observed_value".into(), string_list(&observed));
            success
        }
        CheckSpec::TableColumnsSet {
            columns,
            exact_match,
        } => {
            let observed = batch_columns(ctx).await?;
            let observed_set: BTreeSet<&String> = observed.iter().collect();
            let expected_set: BTreeSet<&String> = columns.iter().collect();
            let success = if *exact_match {
                observed_set == expected_set
            } else {
                expected_set.is_subset(&observed_set)
            };
            result.insert("observed_value".into(), string_list(&observed));
            success
        }
        CheckSpec::ColumnExists { column } => batch_columns(ctx).await?.contains(column),
        CheckSpec::ColumnValues {
            column,
            condition,
            mostly,
        } => evaluate_column_values(ctx, column, condition, *mostly, format, &mut result).await?,
        CheckSpec::ColumnAggregate {
            column,
            aggregate,
            range,
        } => {
            let expr = aggregate_expr(column, *aggregate)?;
            let batches = query(ctx, &format!("SELECT {expr} FROM {BATCH_TABLE}")).await?;
            let observed = float_at(&batches, 0);
            result.insert("observed_value".into(), float_value(observed));
            observed.is_some_and(|v| range.contains(v))
        }
        CheckSpec::DistinctValues {
            column,
            values,
            comparison,
        } => {
            let col = quote(column)?;
            let batches = query(
                ctx,
                &format!(
                    "SELECT DISTINCT {col} AS value FROM {BATCH_TABLE} WHERE {col} IS NOT NULL ORDER BY value"
                ),
            )
            .await?;
            let observed: Vec<Value> = batches_to_rows(&batches)?
                .into_iter()
                .filter_map(|mut row| row.remove("value"))
                .collect();

            let observed_keys: BTreeSet<String> = observed.iter().map(value_key).collect();
            let expected_keys: BTreeSet<String> =
                values.iter().filter(|v| !v.is_null()).map(value_key).collect();
            let success = match comparison {
                SetComparison::Subset => observed_keys.is_subset(&expected_keys),
                SetComparison::Superset => expected_keys.is_subset(&observed_keys),
                SetComparison::Equal => observed_keys == expected_keys,
            };

            if format != ResultFormat::BooleanOnly {
                let details = distinct_details(values, &observed);
                result.insert("details".into(), details);
            }
            result.insert("observed_value".into(), Value::Array(observed));
            success
        }
    };

    Ok((success, result))
}

async fn evaluate_column_values(
    ctx: &SessionContext,
    column: &str,
    condition: &RowCondition,
    mostly: Option<f64>,
    format: ResultFormat,
    result: &mut Map<String, Value>,
) -> EngineResult<bool> {
    let col = quote(column)?;

    let counts = query(
        ctx,
        &format!("SELECT COUNT(*), COUNT({col}) FROM {BATCH_TABLE}"),
    )
    .await?;
    let element_count = int_at(&counts, 0).unwrap_or(0);
    let non_null_count = int_at(&counts, 1).unwrap_or(0);
    let missing_count = element_count - non_null_count;

    let unexpected_filter = unexpected_filter(&col, condition)?;
    let unexpected = query(
        ctx,
        &format!("SELECT COUNT(*) FROM {BATCH_TABLE} WHERE {unexpected_filter}"),
    )
    .await?;
    let unexpected_count = int_at(&unexpected, 0).unwrap_or(0);

    let denominator = if condition.ignores_nulls() {
        non_null_count
    } else {
        element_count
    };
    let success = if denominator == 0 {
        true
    } else {
        let passing = (denominator - unexpected_count) as f64 / denominator as f64;
        passing >= mostly.unwrap_or(1.0)
    };

    result.insert("element_count".into(), Value::from(element_count));
    result.insert("unexpected_count".into(), Value::from(unexpected_count));
    result.insert(
        "unexpected_percent".into(),
        float_value(percent(unexpected_count, denominator)),
    );
    if condition.ignores_nulls() {
        result.insert("missing_count".into(), Value::from(missing_count));
        result.insert(
            "missing_percent".into(),
            float_value(percent(missing_count, element_count)),
        );
        result.insert(
            "unexpected_percent_nonmissing".into(),
            float_value(percent(unexpected_count, non_null_count)),
        );
    }

    if format == ResultFormat::Summary && condition.ignores_nulls() {
        let batches = query(
            ctx,
            &format!(
                "SELECT {col} AS value FROM {BATCH_TABLE} WHERE {unexpected_filter} LIMIT {PARTIAL_UNEXPECTED_LIMIT}"
            ),
        )
        .await?;
        let partial: Vec<Value> = batches_to_rows(&batches)?
            .into_iter()
            .map(|mut row| row.remove("value").unwrap_or(Value::Null))
            .collect();
        result.insert("partial_unexpected_list".into(), Value::Array(partial));
    }

    Ok(success)
}

/// SQL predicate selecting the rows that violate `condition`.
fn unexpected_filter(col: &str, condition: &RowCondition) -> EngineResult<String> {
    let filter = match condition {
        RowCondition::NotNull => format!("{col} IS NULL"),
        RowCondition::Null => format!("{col} IS NOT NULL"),
        RowCondition::Unique => format!(
            "{col} IN (SELECT {col} FROM {BATCH_TABLE} WHERE {col} IS NOT NULL GROUP BY {col} HAVING COUNT(*) > 1)"
        ),
        RowCondition::InSet(values) => match literal_list(values)? {
            Some(list) => format!("{col} IS NOT NULL AND {col} NOT IN ({list})"),
            None => format!("{col} IS NOT NULL"),
        },
        RowCondition::NotInSet(values) => match literal_list(values)? {
            Some(list) => format!("{col} IS NOT NULL AND {col} IN ({list})"),
            None => "FALSE".to_string(),
        },
        RowCondition::Between(range) => {
            format!("{col} IS NOT NULL AND NOT ({})", range_predicate(col, range))
        }
        RowCondition::MatchRegex(pattern) => {
            let pattern = SqlSecurity::validate_regex_pattern(pattern).map_err(execution)?;
            format!(
                "{col} IS NOT NULL AND NOT regexp_like(CAST({col} AS VARCHAR), {pattern})"
            )
        }
        RowCondition::LengthBetween(range) => {
            let length = format!("character_length(CAST({col} AS VARCHAR))");
            format!("{col} IS NOT NULL AND NOT ({})", range_predicate(&length, range))
        }
    };
    Ok(filter)
}

fn range_predicate(expr: &str, range: &ValueRange) -> String {
    let mut parts = Vec::with_capacity(2);
    if let Some(min) = range.min {
        let op = if range.strict_min { ">" } else { ">=" };
        parts.push(format!("{expr} {op} {}", float_literal(min)));
    }
    if let Some(max) = range.max {
        let op = if range.strict_max { "<" } else { "<=" };
        parts.push(format!("{expr} {op} {}", float_literal(max)));
    }
    if parts.is_empty() {
        "TRUE".to_string()
    } else {
        parts.join(" AND ")
    }
}

fn aggregate_expr(column: &str, aggregate: Aggregate) -> EngineResult<String> {
    let col = quote(column)?;
    let numeric = format!("CAST({col} AS DOUBLE)");
    let expr = match aggregate {
        Aggregate::Mean => format!("AVG({numeric})"),
        Aggregate::Min => format!("MIN({numeric})"),
        Aggregate::Max => format!("MAX({numeric})"),
        Aggregate::Sum => format!("SUM({numeric})"),
        Aggregate::Median => format!("MEDIAN({numeric})"),
        Aggregate::Stdev => format!("STDDEV({numeric})"),
        Aggregate::UniqueCount => format!("CAST(COUNT(DISTINCT {col}) AS DOUBLE)"),
        Aggregate::UniqueProportion => format!(
            "CAST(COUNT(DISTINCT {col}) AS DOUBLE) / NULLIF(CAST(COUNT({col}) AS DOUBLE), 0)"
        ),
    };
    Ok(expr)
}

/// Renders the non-null values as a SQL literal list, or `None` when empty.
fn literal_list(values: &[Value]) -> EngineResult<Option<String>> {
    let literals = values
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| match v {
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Value::String(s) => SqlSecurity::quote_literal(s).map_err(execution),
            other => Err(EngineError::execution(format!(
                "unsupported set member {other}"
            ))),
        })
        .collect::<EngineResult<Vec<_>>>()?;

    Ok((!literals.is_empty()).then(|| literals.join(", ")))
}

fn float_literal(value: f64) -> String {
    // DOUBLE literals keep integer columns comparable with fractional bounds.
    format!("CAST({value:?} AS DOUBLE)")
}

async fn query(ctx: &SessionContext, sql: &str) -> EngineResult<Vec<RecordBatch>> {
    debug!(sql, "Evaluating check query");
    ctx.sql(sql)
        .await
        .map_err(execution)?
        .collect()
        .await
        .map_err(execution)
}

async fn batch_columns(ctx: &SessionContext) -> EngineResult<Vec<String>> {
    let df = ctx.table(BATCH_TABLE).await.map_err(execution)?;
    Ok(df
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect())
}

fn first_row(batches: &[RecordBatch]) -> Option<&RecordBatch> {
    batches.iter().find(|b| b.num_rows() > 0)
}

fn int_at(batches: &[RecordBatch], column: usize) -> Option<i64> {
    let batch = first_row(batches)?;
    let array = batch.column(column).as_any().downcast_ref::<Int64Array>()?;
    (!array.is_null(0)).then(|| array.value(0))
}

fn float_at(batches: &[RecordBatch], column: usize) -> Option<f64> {
    let batch = first_row(batches)?;
    let array = batch.column(column).as_any().downcast_ref::<Float64Array>()?;
    (!array.is_null(0)).then(|| array.value(0))
}

fn float_value(value: Option<f64>) -> Value {
    value
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn percent(part: i64, whole: i64) -> Option<f64> {
    (whole > 0).then(|| part as f64 / whole as f64 * 100.0)
}

fn string_list(values: &[String]) -> Value {
    Value::Array(values.iter().cloned().map(Value::String).collect())
}

/// Comparison key that treats `1` and `1.0` as the same member.
fn value_key(value: &Value) -> String {
    match value {
        Value::Number(n) => n
            .as_f64()
            .map(|f| format!("n:{f:?}"))
            .unwrap_or_else(|| format!("n:{n}")),
        Value::String(s) => format!("s:{s}"),
        other => format!("v:{other}"),
    }
}

fn distinct_details(expected: &[Value], observed: &[Value]) -> Value {
    let observed_keys: BTreeSet<String> = observed.iter().map(value_key).collect();
    let expected_keys: BTreeSet<String> = expected.iter().map(value_key).collect();

    let missing: Vec<Value> = expected
        .iter()
        .filter(|v| !v.is_null() && !observed_keys.contains(&value_key(v)))
        .cloned()
        .collect();
    let unexpected: Vec<Value> = observed
        .iter()
        .filter(|v| !expected_keys.contains(&value_key(v)))
        .cloned()
        .collect();

    let mut details = Map::new();
    details.insert("missing_values".into(), Value::Array(missing));
    details.insert("unexpected_values".into(), Value::Array(unexpected));
    Value::Object(details)
}

/// Converts record batches into JSON rows with explicit nulls.
fn batches_to_rows(batches: &[RecordBatch]) -> EngineResult<Vec<Map<String, Value>>> {
    if batches.iter().all(|b| b.num_rows() == 0) {
        return Ok(Vec::new());
    }

    let mut writer = WriterBuilder::new()
        .with_explicit_nulls(true)
        .build::<_, JsonArray>(Vec::new());
    let refs: Vec<&RecordBatch> = batches.iter().collect();
    writer.write_batches(&refs).map_err(execution)?;
    writer.finish().map_err(execution)?;

    serde_json::from_slice(&writer.into_inner()).map_err(execution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expectations::CheckOptions;
    use crate::expectations::ExpectationType;
    use crate::model::EngineKind;
    use crate::security::SecureString;
    use serde_json::json;

    async fn orders_engine() -> DataFusionEngine {
        let ctx = SessionContext::new();
        ctx.sql("CREATE TABLE orders (id INT, status VARCHAR, amount DOUBLE)")
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();
        ctx.sql(
            "INSERT INTO orders VALUES
                (1, 'open', 10.0),
                (2, 'open', 20.0),
                (3, 'closed', 30.0),
                (NULL, 'closed', 40.0),
                (3, 'void', NULL)",
        )
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();
        DataFusionEngine::new().with_session("warehouse", ctx)
    }

    fn connection() -> ConnectionDescriptor {
        ConnectionDescriptor {
            datasource_name: "warehouse".into(),
            engine: EngineKind::Postgres,
            url: SecureString::new("postgresql://localhost/test"),
            schema: None,
        }
    }

    fn table_batch() -> BatchDescriptor {
        BatchDescriptor::NamedTable {
            data_asset_name: "orders".into(),
            table: "orders".into(),
        }
    }

    fn check(expectation_type: ExpectationType, spec: CheckSpec) -> CompiledCheck {
        let mut meta = Map::new();
        meta.insert("expectation_id".into(), json!("e-1"));
        CompiledCheck {
            expectation_type,
            kwargs: Map::new(),
            meta,
            spec,
            options: CheckOptions {
                result_format: ResultFormat::Summary,
                catch_exceptions: true,
                include_config: true,
            },
        }
    }

    async fn run(spec: CheckSpec, expectation_type: ExpectationType) -> RawOutcome {
        let engine = orders_engine().await;
        let suite = CompiledSuite {
            checks: vec![check(expectation_type, spec)],
        };
        let mut outcomes = engine
            .execute(
                &connection(),
                &table_batch(),
                &suite,
                ExecutionOptions::default(),
            )
            .await
            .unwrap();
        outcomes.remove(0)
    }

    #[tokio::test]
    async fn test_not_null_counts_missing_rows() {
        let outcome = run(
            CheckSpec::ColumnValues {
                column: "id".into(),
                condition: RowCondition::NotNull,
                mostly: Some(0.8),
            },
            ExpectationType::ColumnValuesToNotBeNull,
        )
        .await;

        assert!(outcome.success);
        assert_eq!(outcome.result["element_count"], json!(5));
        assert_eq!(outcome.result["unexpected_count"], json!(1));
    }

    #[tokio::test]
    async fn test_unique_reports_duplicates() {
        let outcome = run(
            CheckSpec::ColumnValues {
                column: "id".into(),
                condition: RowCondition::Unique,
                mostly: None,
            },
            ExpectationType::ColumnValuesToBeUnique,
        )
        .await;

        assert!(!outcome.success);
        assert_eq!(outcome.result["unexpected_count"], json!(2));
        assert_eq!(outcome.result["partial_unexpected_list"], json!([3, 3]));
    }

    #[tokio::test]
    async fn test_in_set_ignores_nulls() {
        let outcome = run(
            CheckSpec::ColumnValues {
                column: "status".into(),
                condition: RowCondition::InSet(vec![json!("open"), json!("closed")]),
                mostly: None,
            },
            ExpectationType::ColumnValuesToBeInSet,
        )
        .await;

        assert!(!outcome.success);
        assert_eq!(outcome.result["partial_unexpected_list"], json!(["void"]));
    }

    #[tokio::test]
    async fn test_mean_between() {
        let outcome = run(
            CheckSpec::ColumnAggregate {
                column: "amount".into(),
                aggregate: Aggregate::Mean,
                range: ValueRange::between(20.0, 30.0),
            },
            ExpectationType::ColumnMeanToBeBetween,
        )
        .await;

        assert!(outcome.success);
        assert_eq!(outcome.result["observed_value"], json!(25.0));
    }

    #[tokio::test]
    async fn test_distinct_values_observed_as_list() {
        let outcome = run(
            CheckSpec::DistinctValues {
                column: "status".into(),
                values: vec![json!("open"), json!("closed")],
                comparison: SetComparison::Subset,
            },
            ExpectationType::ColumnDistinctValuesToBeInSet,
        )
        .await;

        assert!(!outcome.success);
        assert_eq!(
            outcome.result["observed_value"],
            json!(["closed", "open", "void"])
        );
    }

    #[tokio::test]
    async fn test_missing_column_is_caught_as_exception() {
        let outcome = run(
            CheckSpec::ColumnAggregate {
                column: "ghost".into(),
                aggregate: Aggregate::Max,
                range: ValueRange::between(0.0, 1.0),
            },
            ExpectationType::ColumnMaxToBeBetween,
        )
        .await;

        assert!(!outcome.success);
        assert!(outcome.exception_info.raised_exception);
        assert_eq!(outcome.expectation_config.meta["expectation_id"], json!("e-1"));
    }

    #[tokio::test]
    async fn test_row_count_and_columns() {
        let outcome = run(
            CheckSpec::TableRowCount {
                range: ValueRange::exactly(5.0),
            },
            ExpectationType::TableRowCountToEqual,
        )
        .await;
        assert!(outcome.success);

        let outcome = run(
            CheckSpec::TableColumnsOrderedList {
                columns: vec!["id".into(), "status".into(), "amount".into()],
            },
            ExpectationType::TableColumnsToMatchOrderedList,
        )
        .await;
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn test_unknown_table_is_not_found() {
        let engine = orders_engine().await;
        let batch = BatchDescriptor::NamedTable {
            data_asset_name: "ghost_table".into(),
            table: "ghost_table".into(),
        };
        let err = engine.sample(&connection(), &batch, 10).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_malformed_query_is_syntax_error() {
        let engine = orders_engine().await;
        let batch = BatchDescriptor::AdHoc {
            data_asset_name: "broken".into(),
            query: "SELEC id FROM orders".into(),
            schema: None,
            batch_identifier: "broken".into(),
            create_temp_table: false,
        };
        let err = engine.sample(&connection(), &batch, 10).await.unwrap_err();
        assert!(matches!(err, EngineError::SyntaxError { .. }));
    }

    #[tokio::test]
    async fn test_ddl_is_rejected_in_queries() {
        let engine = orders_engine().await;
        let batch = BatchDescriptor::AdHoc {
            data_asset_name: "drop".into(),
            query: "DROP TABLE orders".into(),
            schema: None,
            batch_identifier: "drop".into(),
            create_temp_table: false,
        };
        assert!(engine.sample(&connection(), &batch, 10).await.is_err());
        assert!(engine.sample(&connection(), &table_batch(), 1).await.is_ok());
    }

    #[tokio::test]
    async fn test_sample_renders_nulls() {
        let engine = orders_engine().await;
        let sample = engine.sample(&connection(), &table_batch(), 10).await.unwrap();
        assert_eq!(sample.columns, vec!["id", "status", "amount"]);
        assert_eq!(sample.rows.len(), 5);
        assert!(sample.rows.iter().any(|row| row["id"].is_null()));
    }

    #[tokio::test]
    async fn test_materialized_sample_matches_query_rows() {
        let engine = orders_engine().await;
        let batch = |create_temp_table| BatchDescriptor::AdHoc {
            data_asset_name: "open_orders".into(),
            query: "SELECT id, status FROM orders WHERE status = 'open' ORDER BY id".into(),
            schema: None,
            batch_identifier: "open_orders".into(),
            create_temp_table,
        };

        let direct = engine.sample(&connection(), &batch(false), 10).await.unwrap();
        let materialized = engine.sample(&connection(), &batch(true), 10).await.unwrap();
        assert_eq!(materialized, direct);
        assert_eq!(materialized.columns, vec!["id", "status"]);
        assert_eq!(materialized.rows.len(), 2);

        let limited = engine.sample(&connection(), &batch(true), 1).await.unwrap();
        assert_eq!(limited.rows.len(), 1);
    }

    #[tokio::test]
    async fn test_unregistered_datasource_is_connection_error() {
        let engine = DataFusionEngine::new();
        let err = engine
            .sample(&connection(), &table_batch(), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Connection { .. }));
    }
}
