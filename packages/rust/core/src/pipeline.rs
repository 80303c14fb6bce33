//! End-to-end ingestion pipeline: job key → schema → grid → header check →
//! normalize → coerce → overwrite load.

use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, instrument};

use sheetload_shared::{
    ColumnSchema, JobSpec, PipelineWarning, Result, TableId, TypedTable,
};

use crate::coerce::coerce_table;
use crate::header::validate_header;
use crate::jobs::JobCatalog;
use crate::load::{TableStore, load_table};
use crate::normalize::normalize_rows;
use crate::schema::load_schema;
use crate::source::GridSource;

/// Everything a job run needs besides the job key.
#[derive(Clone, Copy)]
pub struct PipelineContext<'a> {
    /// Where job specs are resolved from.
    pub catalog: &'a JobCatalog,
    /// Directory schema files are resolved against.
    pub schemas_dir: &'a Path,
    /// Grid source.
    pub source: &'a dyn GridSource,
    /// Destination store.
    pub store: &'a dyn TableStore,
    /// Progress sink.
    pub progress: &'a dyn ProgressReporter,
}

/// How a job run ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    /// The destination was replaced.
    Loaded { rows_written: u64 },
    /// The grid held no data rows; nothing was loaded.
    NoRows,
}

/// Result of a successful job run.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_key: String,
    #[serde(serialize_with = "serialize_display")]
    pub destination: TableId,
    pub outcome: JobOutcome,
    /// Data-quality warnings recorded along the way.
    pub warnings: Vec<PipelineWarning>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl JobReport {
    /// Rows written, if a load happened.
    pub fn rows_written(&self) -> Option<u64> {
        match self.outcome {
            JobOutcome::Loaded { rows_written } => Some(rows_written),
            JobOutcome::NoRows => None,
        }
    }
}

fn serialize_display<S: serde::Serializer>(
    value: &TableId,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// A job's data taken as far as the load stage.
#[derive(Debug, Clone)]
pub enum Prepared {
    /// Empty or header-only grid.
    NoRows,
    /// Validated, normalized and coerced data ready to load.
    Ready {
        schema: ColumnSchema,
        table: TypedTable,
        warnings: Vec<PipelineWarning>,
    },
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once the grid has been fetched.
    fn rows_fetched(&self, rows: usize);
    /// Called when a job completes without error.
    fn done(&self, report: &JobReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn rows_fetched(&self, _rows: usize) {}
    fn done(&self, _report: &JobReport) {}
}

/// Resolve `key` and run the job.
pub async fn run_job(key: &str, ctx: &PipelineContext<'_>) -> Result<JobReport> {
    ctx.progress.phase("Resolving job");
    let spec = ctx.catalog.resolve(key)?;
    run_spec(&spec, ctx).await
}

/// Run an already resolved job through every stage, including the load.
#[instrument(skip_all, fields(job_key = %spec.key, table = %spec.destination))]
pub async fn run_spec(spec: &JobSpec, ctx: &PipelineContext<'_>) -> Result<JobReport> {
    let start = Instant::now();
    info!(range = %spec.source.qualified_range(), "starting job");

    let prepared = prepare(spec, ctx.schemas_dir, ctx.source, ctx.progress).await?;

    let (outcome, warnings) = match prepared {
        Prepared::NoRows => (JobOutcome::NoRows, Vec::new()),
        Prepared::Ready {
            schema,
            table,
            warnings,
        } => {
            // --- Load ---
            ctx.progress.phase("Loading destination table");
            let rows_written = load_table(ctx.store, spec, &schema, &table).await?;
            (JobOutcome::Loaded { rows_written }, warnings)
        }
    };

    let report = JobReport {
        job_key: spec.key.clone(),
        destination: spec.destination.clone(),
        outcome,
        warnings,
        elapsed: start.elapsed(),
    };

    ctx.progress.done(&report);

    info!(
        outcome = ?report.outcome,
        warnings = report.warnings.len(),
        elapsed_ms = report.elapsed.as_millis(),
        "job complete"
    );

    Ok(report)
}

/// Run every stage up to, but not including, the load.
pub async fn prepare(
    spec: &JobSpec,
    schemas_dir: &Path,
    source: &dyn GridSource,
    progress: &dyn ProgressReporter,
) -> Result<Prepared> {
    // --- Schema ---
    progress.phase("Loading schema");
    let schema = load_schema(schemas_dir, &spec.schema_file)?;

    // --- Fetch ---
    progress.phase("Fetching sheet");
    let grid = source.fetch_grid(&spec.source).await?;
    progress.rows_fetched(grid.data_rows().len());

    if !grid.has_data() {
        info!(rows = grid.rows.len(), "no data rows in sheet, nothing to load");
        return Ok(Prepared::NoRows);
    }

    // --- Header ---
    progress.phase("Validating header");
    validate_header(&grid.trimmed_header(), &schema)?;

    // --- Normalize ---
    progress.phase("Normalizing rows");
    let (normalized, mut warnings) = normalize_rows(&grid, &schema, spec.source.start_row());

    // --- Coerce ---
    progress.phase("Coercing types");
    let (table, coerce_warnings) = coerce_table(&normalized, &schema);
    warnings.extend(coerce_warnings);

    Ok(Prepared::Ready {
        schema,
        table,
        warnings,
    })
}
