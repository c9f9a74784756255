//! Describes which rows of a dataset a run reads.

use crate::error::Result;
use crate::model::{Dataset, DatasetAddress};

/// A pure description of the rows to pull. Building one never touches the
/// datasource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchDescriptor {
    /// Rows produced by an ad-hoc query.
    AdHoc {
        data_asset_name: String,
        query: String,
        schema: Option<String>,
        batch_identifier: String,
        /// Materialize the query into a temporary table before evaluation.
        create_temp_table: bool,
    },
    /// Rows of a physical table.
    NamedTable {
        data_asset_name: String,
        table: String,
    },
}

impl BatchDescriptor {
    /// Builds the descriptor for `dataset`.
    ///
    /// `materialize` is only honoured for query-addressed datasets; profiling
    /// sets it because column types are only reliable on a materialized batch.
    pub fn for_dataset(dataset: &Dataset, materialize: bool) -> Result<Self> {
        let descriptor = match dataset.address()? {
            DatasetAddress::Query { query, schema } => BatchDescriptor::AdHoc {
                data_asset_name: dataset.dataset_name.clone(),
                query: query.to_string(),
                schema: schema.map(str::to_string),
                batch_identifier: dataset.dataset_name.clone(),
                create_temp_table: materialize,
            },
            DatasetAddress::Table { name } => BatchDescriptor::NamedTable {
                data_asset_name: dataset.dataset_name.clone(),
                table: name.to_string(),
            },
        };
        Ok(descriptor)
    }

    pub fn data_asset_name(&self) -> &str {
        match self {
            BatchDescriptor::AdHoc {
                data_asset_name, ..
            }
            | BatchDescriptor::NamedTable {
                data_asset_name, ..
            } => data_asset_name,
        }
    }

    pub fn create_temp_table(&self) -> bool {
        match self {
            BatchDescriptor::AdHoc {
                create_temp_table, ..
            } => *create_temp_table,
            BatchDescriptor::NamedTable { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TermError;
    use proptest::prelude::*;

    #[test]
    fn test_query_dataset_builds_adhoc() {
        let dataset = Dataset::query("ds", "recent", "select * from orders", Some("sales".into()));
        let batch = BatchDescriptor::for_dataset(&dataset, true).unwrap();

        assert_eq!(
            batch,
            BatchDescriptor::AdHoc {
                data_asset_name: "recent".into(),
                query: "select * from orders".into(),
                schema: Some("sales".into()),
                batch_identifier: "recent".into(),
                create_temp_table: true,
            }
        );
    }

    #[test]
    fn test_table_dataset_never_materializes() {
        let dataset = Dataset::table("ds", "public.orders");
        let batch = BatchDescriptor::for_dataset(&dataset, true).unwrap();

        assert!(!batch.create_temp_table());
        assert_eq!(batch.data_asset_name(), "public.orders");
    }

    #[test]
    fn test_empty_query_is_rejected() {
        let dataset = Dataset::query("ds", "broken", "", None);
        assert!(matches!(
            BatchDescriptor::for_dataset(&dataset, false),
            Err(TermError::InvalidDataset { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_blank_queries_never_produce_a_descriptor(
            blank in "[ \t\n]{0,8}",
            materialize in any::<bool>(),
        ) {
            let dataset = Dataset::query("ds", "name", blank, None);
            prop_assert!(BatchDescriptor::for_dataset(&dataset, materialize).is_err());
        }

        #[test]
        fn prop_query_descriptors_carry_the_query(
            query in "select [a-z]{1,10} from [a-z]{1,10}",
            materialize in any::<bool>(),
        ) {
            let dataset = Dataset::query("ds", "name", query.clone(), None);
            let batch = BatchDescriptor::for_dataset(&dataset, materialize).unwrap();
            prop_assert_eq!(batch.create_temp_table(), materialize);
            match batch {
                BatchDescriptor::AdHoc { query: q, .. } => prop_assert_eq!(q, query),
                other => prop_assert!(false, "unexpected descriptor {:?}", other),
            }
        }
    }
}
