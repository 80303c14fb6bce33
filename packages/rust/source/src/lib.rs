//! Spreadsheet source client.
//!
//! Fetches a worksheet range as a 2-D grid of formatted cell strings via the
//! spreadsheet values API
//! (`GET /v4/spreadsheets/{id}/values/{worksheet}!{range}`), or reads a local
//! CSV file with the same shape for offline runs.
//!
//! Access tokens are taken as-is from the configured environment variable;
//! acquiring them is the caller's concern.

mod grid;

use std::time::Duration;

use reqwest::Client;
use sheetload_shared::{RawGrid, Result, SheetLocation, SheetloadError, SourceConfig, env_value};
use tracing::{debug, info, instrument};
use url::Url;

pub use grid::read_csv_grid;

/// Maximum response size we consider valid (50 MB).
const MAX_RESPONSE_SIZE: u64 = 50 * 1024 * 1024;

/// Default timeout in seconds for a values request.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Longest slice of an error body carried into error messages.
const ERROR_BODY_LIMIT: usize = 300;

/// User-Agent string for source requests.
const USER_AGENT: &str = concat!("SheetLoad/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Client options
// ---------------------------------------------------------------------------

/// Configuration for the sheets client.
#[derive(Debug, Clone)]
pub struct SourceOptions {
    /// Base URL of the values API.
    pub base_url: String,
    /// Bearer token, if any.
    pub access_token: Option<String>,
    /// Timeout for HTTP requests in seconds.
    pub timeout_secs: u64,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            base_url: "https://sheets.googleapis.com".into(),
            access_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl From<&SourceConfig> for SourceOptions {
    fn from(config: &SourceConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            access_token: env_value(&config.token_env),
            timeout_secs: config.timeout_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// SheetsClient
// ---------------------------------------------------------------------------

/// HTTP client for the spreadsheet values API.
#[derive(Debug, Clone)]
pub struct SheetsClient {
    client: Client,
    base_url: Url,
    access_token: Option<String>,
}

impl SheetsClient {
    /// Build a client from options.
    pub fn new(opts: &SourceOptions) -> Result<Self> {
        let base_url = Url::parse(&opts.base_url).map_err(|e| {
            SheetloadError::config(format!("invalid source base_url '{}': {e}", opts.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(SheetloadError::config(format!(
                "source base_url '{base_url}' cannot carry a path"
            )));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| SheetloadError::Source(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            access_token: opts.access_token.clone(),
        })
    }

    /// Fetch the grid for `location`. Row 0 of the result is the header.
    #[instrument(skip_all, fields(sheet_id = %location.sheet_id, range = %location.qualified_range()))]
    pub async fn fetch_grid(&self, location: &SheetLocation) -> Result<RawGrid> {
        let url = self.values_url(location)?;
        info!(%url, "fetching sheet values");

        let mut request = self
            .client
            .get(url.clone())
            .query(&[("majorDimension", "ROWS"), ("valueRenderOption", "FORMATTED_VALUE")]);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SheetloadError::Source(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(SheetloadError::Source(format!(
                "{url}: HTTP {status}: {}",
                snippet.trim()
            )));
        }

        if let Some(len) = response.content_length() {
            if len > MAX_RESPONSE_SIZE {
                return Err(SheetloadError::Source(format!(
                    "{url}: response too large ({len} bytes, max {MAX_RESPONSE_SIZE})"
                )));
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| SheetloadError::Source(format!("{url}: failed to read body: {e}")))?;

        let grid = grid::parse_value_range(&body)?;
        debug!(rows = grid.rows.len(), "sheet values parsed");
        Ok(grid)
    }

    /// `{base}/v4/spreadsheets/{id}/values/{worksheet}!{range}`, each segment
    /// percent-encoded.
    fn values_url(&self, location: &SheetLocation) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SheetloadError::config("source base_url cannot carry a path"))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                location.sheet_id.as_str(),
                "values",
                location.qualified_range().as_str(),
            ]);
        Ok(url)
    }
}
