//! In-memory source and store doubles for pipeline tests.

use std::sync::Mutex;

use async_trait::async_trait;
use sheetload_shared::{
    ColumnSchema, RawGrid, Result, SheetLocation, SheetloadError, TableId, TypedTable,
};

use crate::load::TableStore;
use crate::source::GridSource;

/// Returns the same grid for every location.
pub(crate) struct StaticGrid(pub RawGrid);

impl StaticGrid {
    pub fn from_rows(rows: Vec<Vec<&str>>) -> Self {
        Self(rows.into_iter().collect())
    }
}

#[async_trait]
impl GridSource for StaticGrid {
    async fn fetch_grid(&self, _location: &SheetLocation) -> Result<RawGrid> {
        Ok(self.0.clone())
    }
}

/// Records loads instead of writing them, or fails every load.
#[derive(Default)]
pub(crate) struct RecordingStore {
    pub loads: Mutex<Vec<(TableId, TypedTable)>>,
    fail_with: Option<String>,
}

impl RecordingStore {
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn load_count(&self) -> usize {
        self.loads.lock().unwrap().len()
    }
}

#[async_trait]
impl TableStore for RecordingStore {
    async fn overwrite(
        &self,
        _job_key: &str,
        table: &TableId,
        _schema: &ColumnSchema,
        data: &TypedTable,
    ) -> Result<u64> {
        if let Some(message) = &self.fail_with {
            return Err(SheetloadError::Storage(message.clone()));
        }
        self.loads
            .lock()
            .unwrap()
            .push((table.clone(), data.clone()));
        Ok(data.row_count() as u64)
    }
}
