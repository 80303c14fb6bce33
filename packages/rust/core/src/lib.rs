//! Core ingestion pipeline for SheetLoad.
//!
//! This crate turns a job key into a loaded table: resolve the job, load
//! its schema, fetch the sheet grid, validate the header, normalize rows,
//! coerce types and overwrite the destination table. Callers go through
//! [`runner::execute_job`], which also sends notifications.

pub mod coerce;
pub mod header;
pub mod jobs;
pub mod load;
pub mod normalize;
pub mod notify;
pub mod pipeline;
pub mod runner;
pub mod schema;
pub mod source;

#[cfg(test)]
mod testing;

pub use jobs::JobCatalog;
pub use load::TableStore;
pub use notify::{JobEvent, Notifiers, WebhookKind, WebhookSink};
pub use pipeline::{
    JobOutcome, JobReport, PipelineContext, Prepared, ProgressReporter, SilentProgress, prepare,
    run_job, run_spec,
};
pub use runner::{execute_job, execute_job_with};
pub use source::{CsvGridSource, GridSource};
