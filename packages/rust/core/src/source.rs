//! Grid sources the pipeline can fetch from.

use std::path::PathBuf;

use async_trait::async_trait;
use sheetload_shared::{RawGrid, Result, SheetLocation};
use sheetload_source::{SheetsClient, read_csv_grid};
use tracing::debug;

/// Anything that can produce the raw grid for a sheet location.
#[async_trait]
pub trait GridSource: Send + Sync {
    async fn fetch_grid(&self, location: &SheetLocation) -> Result<RawGrid>;
}

#[async_trait]
impl GridSource for SheetsClient {
    async fn fetch_grid(&self, location: &SheetLocation) -> Result<RawGrid> {
        SheetsClient::fetch_grid(self, location).await
    }
}

/// Serves every location from one local CSV file. Used for offline runs.
#[derive(Debug, Clone)]
pub struct CsvGridSource {
    path: PathBuf,
}

impl CsvGridSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl GridSource for CsvGridSource {
    async fn fetch_grid(&self, location: &SheetLocation) -> Result<RawGrid> {
        debug!(
            path = %self.path.display(),
            range = %location.qualified_range(),
            "reading grid from local CSV instead of sheet"
        );
        read_csv_grid(&self.path)
    }
}
