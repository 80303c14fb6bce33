//! HTTP entrypoint for schedulers.
//!
//! - `POST /process` with `{"config_key": "<job key>"}` runs one job
//! - `GET /healthz` answers `ok`
//!
//! Config errors map to 400, every other failure to 500. Concurrent requests
//! run independent jobs. They share the job catalog and grid source, which
//! are read-only, and one warehouse handle, which serializes its loads.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use sheetload_core::{
    GridSource, JobCatalog, Notifiers, PipelineContext, SilentProgress, TableStore, execute_job,
    execute_job_with,
};
use sheetload_shared::NotifyConfig;
use tracing::{error, info};

/// Shared, read-only handles for request handlers.
#[derive(Clone)]
pub(crate) struct AppState {
    pub catalog: Arc<JobCatalog>,
    pub schemas_dir: Arc<PathBuf>,
    pub source: Arc<dyn GridSource>,
    pub store: Arc<dyn TableStore>,
    /// Webhook settings; `None` disables notifications.
    pub notify: Option<NotifyConfig>,
}

#[derive(Debug, Deserialize)]
struct ProcessRequest {
    #[serde(alias = "job_key")]
    config_key: Option<String>,
}

/// Build the router.
pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/process", post(process))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
pub(crate) async fn serve(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
}

async fn healthz() -> &'static str {
    "ok"
}

/// POST /process
async fn process(State(state): State<AppState>, body: Bytes) -> Response {
    let key = match serde_json::from_slice::<ProcessRequest>(&body) {
        Ok(ProcessRequest {
            config_key: Some(key),
        }) if !key.trim().is_empty() => key.trim().to_string(),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                "Bad Request: request body must include 'config_key'",
            )
                .into_response();
        }
    };

    info!(job_key = %key, "job requested");

    let ctx = PipelineContext {
        catalog: state.catalog.as_ref(),
        schemas_dir: state.schemas_dir.as_path(),
        source: state.source.as_ref(),
        store: state.store.as_ref(),
        progress: &SilentProgress,
    };

    let result = match &state.notify {
        Some(notify) => execute_job(&key, &ctx, notify).await,
        None => execute_job_with(&key, &ctx, &Notifiers::none()).await,
    };

    match result {
        Ok(report) => {
            let message = match report.rows_written() {
                Some(rows) => format!(
                    "Success: Job for config_key '{key}' completed ({rows} rows loaded into {}).",
                    report.destination
                ),
                None => format!(
                    "Success: Job for config_key '{key}' completed (sheet has no data rows)."
                ),
            };
            (StatusCode::OK, message).into_response()
        }
        Err(e) if e.is_client_error() => {
            (StatusCode::BAD_REQUEST, format!("Bad Request: {e}")).into_response()
        }
        Err(e) => {
            error!(job_key = %key, error = %e, "job failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal Server Error:\n{e}"),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use sheetload_core::CsvGridSource;
    use sheetload_shared::{ColumnSchema, Result, SheetloadError, TableId, TypedTable};
    use sheetload_storage::Warehouse;
    use tower::ServiceExt;

    /// Store that rejects every load.
    struct BrokenStore;

    #[async_trait]
    impl TableStore for BrokenStore {
        async fn overwrite(
            &self,
            _job_key: &str,
            _table: &TableId,
            _schema: &ColumnSchema,
            _data: &TypedTable,
        ) -> Result<u64> {
            Err(SheetloadError::Storage("disk quota exceeded".into()))
        }
    }

    fn state_with(sheet: &str, store: Arc<dyn TableStore>) -> AppState {
        AppState {
            catalog: Arc::new(JobCatalog::File(PathBuf::from(
                "../../fixtures/configs/main_configs.json",
            ))),
            schemas_dir: Arc::new(PathBuf::from("../../fixtures/schemas")),
            source: Arc::new(CsvGridSource::new(format!("../../fixtures/sheets/{sheet}"))),
            store,
            notify: None,
        }
    }

    async fn test_state() -> (AppState, Arc<Warehouse>) {
        let tmp = std::env::temp_dir().join(format!("sl_server_{}.db", uuid::Uuid::now_v7()));
        let warehouse = Arc::new(Warehouse::open(&tmp).await.unwrap());
        (state_with("members.csv", warehouse.clone()), warehouse)
    }

    async fn post_process(state: AppState, body: &str) -> (StatusCode, String) {
        let response = router(state)
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/process")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn process_loads_job() {
        let (state, warehouse) = test_state().await;

        let (status, body) = post_process(state, r#"{"config_key": "members"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("(3 rows loaded into my-project.crm.members)"));

        let table = TableId::parse("my-project.crm.members").unwrap();
        assert_eq!(warehouse.row_count(&table).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn missing_key_is_bad_request() {
        let (state, _) = test_state().await;
        let (status, body) = post_process(state, r#"{"other": 1}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("config_key"));
    }

    #[tokio::test]
    async fn invalid_json_is_bad_request() {
        let (state, _) = test_state().await;
        let (status, _) = post_process(state, "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_job_is_bad_request() {
        let (state, _) = test_state().await;
        let (status, body) = post_process(state, r#"{"config_key": "nope"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("nope"));
    }

    #[tokio::test]
    async fn header_mismatch_is_server_error() {
        let (state, _) = test_state().await;
        // The orders schema does not match the members sheet.
        let (status, body) = post_process(state, r#"{"config_key": "orders"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("header mismatch"));
    }

    #[tokio::test]
    async fn header_only_sheet_succeeds_without_loading() {
        let tmp = std::env::temp_dir().join(format!("sl_server_{}.db", uuid::Uuid::now_v7()));
        let warehouse = Arc::new(Warehouse::open(&tmp).await.unwrap());
        let state = state_with("members_header_only.csv", warehouse.clone());

        let (status, body) = post_process(state, r#"{"config_key": "members"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("no data rows"));

        let table = TableId::parse("my-project.crm.members").unwrap();
        assert!(!warehouse.table_exists(&table).await.unwrap());
    }

    #[tokio::test]
    async fn store_failure_is_server_error() {
        let state = state_with("members.csv", Arc::new(BrokenStore));

        let (status, body) = post_process(state, r#"{"config_key": "members"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.starts_with("Internal Server Error:\n"));
        assert!(body.contains("my-project.crm.members"));
        assert!(body.contains("disk quota exceeded"));
    }

    #[tokio::test]
    async fn healthz_answers() {
        let (state, _) = test_state().await;
        let response = router(state)
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
