//! Job execution as seen by callers: run the pipeline, then notify.

use sheetload_shared::{NotifyConfig, Result};
use tracing::{debug, error};

use crate::notify::{JobEvent, Notifiers};
use crate::pipeline::{JobReport, PipelineContext, run_spec};

/// Table name used in failure notifications when the job never resolved.
pub const UNRESOLVED_TABLE: &str = "<unresolved>";

struct Finished {
    result: Result<JobReport>,
    table: String,
}

/// Run `key`, then notify the sinks enabled in the environment at the time
/// the job finishes.
pub async fn execute_job(
    key: &str,
    ctx: &PipelineContext<'_>,
    notify: &NotifyConfig,
) -> Result<JobReport> {
    let finished = run_tracked(key, ctx).await;
    announce(&Notifiers::from_env(notify), key, &finished).await;
    finished.result
}

/// Run `key`, then notify a fixed set of sinks.
pub async fn execute_job_with(
    key: &str,
    ctx: &PipelineContext<'_>,
    notifiers: &Notifiers,
) -> Result<JobReport> {
    let finished = run_tracked(key, ctx).await;
    announce(notifiers, key, &finished).await;
    finished.result
}

async fn run_tracked(key: &str, ctx: &PipelineContext<'_>) -> Finished {
    ctx.progress.phase("Resolving job");
    let spec = match ctx.catalog.resolve(key) {
        Ok(spec) => spec,
        Err(e) => {
            return Finished {
                result: Err(e),
                table: UNRESOLVED_TABLE.to_string(),
            };
        }
    };

    Finished {
        table: spec.destination.to_string(),
        result: run_spec(&spec, ctx).await,
    }
}

/// The event to report, if any. Runs that loaded nothing stay quiet.
fn event_for(key: &str, finished: &Finished) -> Option<JobEvent> {
    match &finished.result {
        Ok(report) => report.rows_written().map(|rows| JobEvent::Succeeded {
            job_key: key.to_string(),
            table: finished.table.clone(),
            rows,
        }),
        Err(e) => Some(JobEvent::Failed {
            job_key: key.to_string(),
            table: finished.table.clone(),
            error: e.to_string(),
        }),
    }
}

async fn announce(notifiers: &Notifiers, key: &str, finished: &Finished) {
    if let Err(e) = &finished.result {
        error!(job_key = key, table = %finished.table, error = %e, "job failed");
    }

    match event_for(key, finished) {
        Some(event) if !notifiers.is_empty() => {
            let delivered = notifiers.notify(&event).await;
            debug!(job_key = key, delivered, sinks = notifiers.len(), "notifications dispatched");
        }
        Some(_) => debug!(job_key = key, "no notification sinks configured"),
        None => debug!(job_key = key, "nothing loaded, skipping notification"),
    }
}
