//! libSQL-backed analytical table store (the "warehouse").
//!
//! The [`Warehouse`] struct wraps a libSQL database holding destination
//! tables plus a `load_jobs` history table.
//!
//! **Load contract:** [`Warehouse::overwrite_table`] replaces the entire
//! destination table inside one transaction, creating it from the declared
//! column types when absent. A failed load leaves the previous contents in
//! place.
//!
//! **Access rules:**
//! - pipeline / `serve`: read-write via [`Warehouse::open`]
//! - inspection commands: read-only via [`Warehouse::open_readonly`]

mod migrations;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, Value, params};
use sheetload_shared::{CellValue, ColumnSchema, ColumnType, Result, SheetloadError, TableId, TypedTable};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// How long a connection waits on a lock held by another writer.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Primary warehouse handle wrapping a libSQL database.
///
/// Reads share one connection; every load opens its own connection.
/// Loads through one handle are serialized by `write_lock`; writers in
/// other processes are waited on for up to [`BUSY_TIMEOUT`].
pub struct Warehouse {
    db: Database,
    conn: Connection,
    write_lock: Mutex<()>,
    readonly: bool,
}

fn storage_err(e: impl std::fmt::Display) -> SheetloadError {
    SheetloadError::Storage(e.to_string())
}

/// Open a connection that waits on locks instead of failing at once.
fn connect(db: &Database) -> Result<Connection> {
    let conn = db.connect().map_err(storage_err)?;
    conn.busy_timeout(BUSY_TIMEOUT).map_err(storage_err)?;
    Ok(conn)
}

impl Warehouse {
    /// Open or create a warehouse at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SheetloadError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = connect(&db)?;

        let warehouse = Self {
            db,
            conn,
            write_lock: Mutex::new(()),
            readonly: false,
        };
        warehouse.run_migrations().await?;
        Ok(warehouse)
    }

    /// Open a warehouse at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SheetloadError::Storage(format!(
                "warehouse not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = connect(&db)?;

        Ok(Self {
            db,
            conn,
            write_lock: Mutex::new(()),
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        SheetloadError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(SheetloadError::Storage(
                "warehouse is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Loads
    // -----------------------------------------------------------------------

    /// Replace the contents of `table` with `data`, creating the table from
    /// `schema`'s declared types. Returns the number of rows written.
    ///
    /// Every attempt is recorded in `load_jobs`, including failed ones.
    #[instrument(skip_all, fields(job_key = %job_key, table = %table))]
    pub async fn overwrite_table(
        &self,
        job_key: &str,
        table: &TableId,
        schema: &ColumnSchema,
        data: &TypedTable,
    ) -> Result<u64> {
        self.check_writable()?;

        let _guard = self.write_lock.lock().await;
        let job_id = self.insert_load_job(job_key, table).await?;

        match self.write_table(table, schema, data).await {
            Ok(rows) => {
                self.finish_load_job(&job_id, LoadStatus::Succeeded, Some(rows), None)
                    .await?;
                info!(rows, "overwrite load committed");
                Ok(rows)
            }
            Err(e) => {
                if let Err(record_err) = self
                    .finish_load_job(&job_id, LoadStatus::Failed, None, Some(&e.to_string()))
                    .await
                {
                    warn!(error = %record_err, "failed to record load failure");
                }
                Err(e)
            }
        }
    }

    /// Drop, recreate and fill the table in one transaction on a dedicated
    /// connection.
    async fn write_table(
        &self,
        table: &TableId,
        schema: &ColumnSchema,
        data: &TypedTable,
    ) -> Result<u64> {
        let conn = connect(&self.db)?;
        let tx = conn.transaction().await.map_err(storage_err)?;

        match fill_table(&tx, table, schema, data).await {
            Ok(rows) => {
                tx.commit().await.map_err(storage_err)?;
                Ok(rows)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Load job history
    // -----------------------------------------------------------------------

    /// Insert a `running` load job. Returns the generated job ID.
    async fn insert_load_job(&self, job_key: &str, table: &TableId) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO load_jobs (id, job_key, table_id, started_at, status)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.as_str(),
                    job_key,
                    table.to_string(),
                    now.as_str(),
                    LoadStatus::Running.as_str()
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(id)
    }

    /// Mark a load job finished.
    async fn finish_load_job(
        &self,
        job_id: &str,
        status: LoadStatus,
        output_rows: Option<u64>,
        error: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE load_jobs SET finished_at = ?1, status = ?2, output_rows = ?3, error = ?4
                 WHERE id = ?5",
                params![
                    now.as_str(),
                    status.as_str(),
                    output_rows.map(|n| n as i64),
                    error,
                    job_id
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Most recent load jobs first.
    pub async fn list_load_jobs(&self, limit: u32) -> Result<Vec<LoadJobRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, job_key, table_id, started_at, finished_at, status, output_rows, error
                 FROM load_jobs ORDER BY started_at DESC, id DESC LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(row_to_load_job(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Whether the destination table exists.
    pub async fn table_exists(&self, table: &TableId) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table.to_string()],
            )
            .await
            .map_err(storage_err)?;
        Ok(rows.next().await.map_err(storage_err)?.is_some())
    }

    /// Number of rows currently in the destination table.
    pub async fn row_count(&self, table: &TableId) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_table(table));
        let mut rows = self.conn.query(&sql, ()).await.map_err(storage_err)?;
        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(storage_err)? as u64),
            None => Ok(0),
        }
    }

    /// First `limit` rows of the destination table, rendered as text.
    pub async fn preview_rows(&self, table: &TableId, limit: u32) -> Result<TablePreview> {
        let sql = format!("SELECT * FROM {} LIMIT ?1", quote_table(table));
        let mut rows = self
            .conn
            .query(&sql, params![limit])
            .await
            .map_err(storage_err)?;

        let columns: Vec<String> = (0..rows.column_count())
            .map(|i| rows.column_name(i).unwrap_or_default().to_string())
            .collect();

        let mut preview = TablePreview {
            columns,
            rows: Vec::new(),
        };
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let mut cells = Vec::with_capacity(preview.columns.len());
            for i in 0..preview.columns.len() {
                let value = row.get_value(i as i32).map_err(storage_err)?;
                cells.push(render_value(&value));
            }
            preview.rows.push(cells);
        }
        Ok(preview)
    }
}

// ---------------------------------------------------------------------------
// Table writing helpers
// ---------------------------------------------------------------------------

/// Drop, create and insert within an open transaction.
async fn fill_table(
    conn: &Connection,
    table: &TableId,
    schema: &ColumnSchema,
    data: &TypedTable,
) -> Result<u64> {
    let ident = quote_table(table);

    conn.execute(&format!("DROP TABLE IF EXISTS {ident}"), ())
        .await
        .map_err(storage_err)?;

    let column_defs: Vec<String> = schema
        .columns()
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.target_name), sql_type(c.column_type)))
        .collect();
    let create_sql = format!("CREATE TABLE {ident} ({})", column_defs.join(", "));
    debug!(sql = %create_sql, "creating destination table");
    conn.execute(&create_sql, ()).await.map_err(storage_err)?;

    let column_list: Vec<String> = schema
        .columns()
        .iter()
        .map(|c| quote_ident(&c.target_name))
        .collect();
    let placeholders: Vec<String> = (1..=schema.len()).map(|i| format!("?{i}")).collect();
    let insert_sql = format!(
        "INSERT INTO {ident} ({}) VALUES ({})",
        column_list.join(", "),
        placeholders.join(", ")
    );

    let mut written = 0u64;
    for (i, row) in data.rows.iter().enumerate() {
        if row.len() != schema.len() {
            return Err(SheetloadError::Storage(format!(
                "row {i} has {} values but {ident} has {} columns",
                row.len(),
                schema.len()
            )));
        }
        let values: Vec<Value> = row.iter().map(to_sql_value).collect();
        conn.execute(&insert_sql, libsql::params::Params::Positional(values))
            .await
            .map_err(storage_err)?;
        written += 1;
    }

    Ok(written)
}

/// Declared SQL column type for a schema type.
pub fn sql_type(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::String => "TEXT",
        ColumnType::Integer => "INTEGER",
        ColumnType::Float => "REAL",
        ColumnType::Boolean => "BOOLEAN",
        ColumnType::Date => "DATE",
        ColumnType::Time => "TIME",
        ColumnType::DateTime => "DATETIME",
        ColumnType::Timestamp => "TIMESTAMP",
    }
}

fn to_sql_value(cell: &CellValue) -> Value {
    match cell {
        CellValue::Text(s) => Value::Text(s.clone()),
        CellValue::Integer(i) => Value::Integer(*i),
        CellValue::Float(x) => Value::Real(*x),
        CellValue::Boolean(b) => Value::Integer(i64::from(*b)),
        CellValue::Date(d) => Value::Text(d.format("%Y-%m-%d").to_string()),
        CellValue::Time(t) => Value::Text(t.format("%H:%M:%S").to_string()),
        CellValue::DateTime(dt) => Value::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        CellValue::Missing => Value::Null,
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".into(),
        Value::Integer(i) => i.to_string(),
        Value::Real(x) => x.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("<blob {} bytes>", b.len()),
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// The whole `catalog.dataset.table` identifier as one quoted SQL name.
fn quote_table(table: &TableId) -> String {
    quote_ident(&table.to_string())
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Lifecycle state of a load job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Running,
    Succeeded,
    Failed,
}

impl LoadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for LoadStatus {
    type Err = SheetloadError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(SheetloadError::Storage(format!("unknown load status '{other}'"))),
        }
    }
}

/// One row of the load job history.
#[derive(Debug, Clone)]
pub struct LoadJobRecord {
    pub id: String,
    pub job_key: String,
    pub table_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: LoadStatus,
    pub output_rows: Option<u64>,
    pub error: Option<String>,
}

/// Rendered rows of a destination table.
#[derive(Debug, Clone)]
pub struct TablePreview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SheetloadError::Storage(format!("invalid date: {e}")))
}

/// Convert a database row to a [`LoadJobRecord`].
fn row_to_load_job(row: &libsql::Row) -> Result<LoadJobRecord> {
    Ok(LoadJobRecord {
        id: row.get::<String>(0).map_err(storage_err)?,
        job_key: row.get::<String>(1).map_err(storage_err)?,
        table_id: row.get::<String>(2).map_err(storage_err)?,
        started_at: parse_timestamp(&row.get::<String>(3).map_err(storage_err)?)?,
        finished_at: match row.get::<String>(4).ok() {
            Some(s) => Some(parse_timestamp(&s)?),
            None => None,
        },
        status: row.get::<String>(5).map_err(storage_err)?.parse()?,
        output_rows: row.get::<i64>(6).ok().map(|v| v as u64),
        error: row.get::<String>(7).ok(),
    })
}
