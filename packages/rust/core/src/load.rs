//! Load orchestration: hands a typed table to the destination store under
//! the overwrite policy.

use async_trait::async_trait;
use sheetload_shared::{ColumnSchema, JobSpec, Result, SheetloadError, TableId, TypedTable};
use sheetload_storage::Warehouse;
use tracing::{error, info};

/// A destination that can replace a table's contents in one load.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Replace `table` with `data`, creating it from `schema` if absent.
    /// Returns the number of rows written.
    async fn overwrite(
        &self,
        job_key: &str,
        table: &TableId,
        schema: &ColumnSchema,
        data: &TypedTable,
    ) -> Result<u64>;
}

#[async_trait]
impl TableStore for Warehouse {
    async fn overwrite(
        &self,
        job_key: &str,
        table: &TableId,
        schema: &ColumnSchema,
        data: &TypedTable,
    ) -> Result<u64> {
        self.overwrite_table(job_key, table, schema, data).await
    }
}

/// Load `data` into the job's destination. Any store error surfaces as
/// [`SheetloadError::LoadFailed`] carrying the store's message.
pub async fn load_table(
    store: &dyn TableStore,
    spec: &JobSpec,
    schema: &ColumnSchema,
    data: &TypedTable,
) -> Result<u64> {
    match store
        .overwrite(&spec.key, &spec.destination, schema, data)
        .await
    {
        Ok(rows) => {
            info!(table = %spec.destination, rows, "load complete");
            Ok(rows)
        }
        Err(e) => {
            error!(table = %spec.destination, error = %e, "load failed");
            Err(match e {
                e @ SheetloadError::LoadFailed { .. } => e,
                other => SheetloadError::load_failed(&spec.destination, other.to_string()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetload_shared::{CellValue, ColumnDef, ColumnType, SheetLocation};

    struct RejectingStore;

    #[async_trait]
    impl TableStore for RejectingStore {
        async fn overwrite(
            &self,
            _job_key: &str,
            _table: &TableId,
            _schema: &ColumnSchema,
            _data: &TypedTable,
        ) -> Result<u64> {
            Err(SheetloadError::Storage("disk full".into()))
        }
    }

    fn spec() -> JobSpec {
        JobSpec {
            key: "members".into(),
            source: SheetLocation {
                sheet_id: "s".into(),
                worksheet: "w".into(),
                range: "A1:A".into(),
            },
            schema_file: "members_schema.csv".into(),
            destination: TableId::parse("p.crm.members").unwrap(),
        }
    }

    fn schema() -> ColumnSchema {
        ColumnSchema::new(vec![ColumnDef {
            original_name: "이름".into(),
            target_name: "name".into(),
            column_type: ColumnType::String,
        }])
        .unwrap()
    }

    #[tokio::test]
    async fn store_errors_become_load_failed() {
        let data = TypedTable {
            columns: vec!["name".into()],
            rows: vec![vec![CellValue::Text("Kim".into())]],
        };
        let err = load_table(&RejectingStore, &spec(), &schema(), &data)
            .await
            .unwrap_err();
        match err {
            SheetloadError::LoadFailed { table, message } => {
                assert_eq!(table, "p.crm.members");
                assert!(message.contains("disk full"));
            }
            other => panic!("expected LoadFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn warehouse_store_writes_rows() {
        let tmp = std::env::temp_dir().join(format!("sl_core_{}.db", uuid::Uuid::now_v7()));
        let warehouse = Warehouse::open(&tmp).await.unwrap();

        let data = TypedTable {
            columns: vec!["name".into()],
            rows: vec![
                vec![CellValue::Text("Kim".into())],
                vec![CellValue::Text("Lee".into())],
            ],
        };
        let rows = load_table(&warehouse, &spec(), &schema(), &data).await.unwrap();
        assert_eq!(rows, 2);
        assert_eq!(warehouse.row_count(&spec().destination).await.unwrap(), 2);
    }
}
