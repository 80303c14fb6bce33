//! Job configuration resolver: job key → [`JobSpec`].
//!
//! Two on-disk layouts are supported:
//! - a single JSON file mapping every job key to its record
//! - a directory holding one `<key>.json` record per job
//!
//! Records accept both the canonical field names and the original ones
//! (`google_sheet_id`, `sheet_name`, `column_range`, `bigquery_table_id`).

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use sheetload_shared::{JobSpec, PathsConfig, Result, SheetLocation, SheetloadError, TableId};

/// One job record as written in configuration.
#[derive(Debug, Deserialize)]
struct JobRecord {
    #[serde(alias = "google_sheet_id")]
    sheet_id: String,
    #[serde(alias = "sheet_name")]
    worksheet: String,
    #[serde(alias = "column_range")]
    range: String,
    schema_file: String,
    #[serde(alias = "bigquery_table_id")]
    destination: String,
}

impl JobRecord {
    fn into_spec(self, key: &str) -> Result<JobSpec> {
        for (field, value) in [
            ("sheet_id", &self.sheet_id),
            ("worksheet", &self.worksheet),
            ("range", &self.range),
            ("schema_file", &self.schema_file),
            ("destination", &self.destination),
        ] {
            if value.trim().is_empty() {
                return Err(SheetloadError::config_malformed(
                    key,
                    format!("field '{field}' is empty"),
                ));
            }
        }

        let destination = TableId::parse(&self.destination)
            .map_err(|e| SheetloadError::config_malformed(key, e))?;

        Ok(JobSpec {
            key: key.to_string(),
            source: SheetLocation {
                sheet_id: self.sheet_id.trim().to_string(),
                worksheet: self.worksheet,
                range: self.range.trim().to_string(),
            },
            schema_file: self.schema_file.trim().to_string(),
            destination,
        })
    }
}

/// Where job records are looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobCatalog {
    /// Single multi-job JSON file.
    File(PathBuf),
    /// Directory of per-job JSON files.
    Dir(PathBuf),
}

impl JobCatalog {
    /// Pick the layout from config; a `jobs_dir` takes precedence.
    pub fn from_paths(paths: &PathsConfig) -> Self {
        match &paths.jobs_dir {
            Some(dir) => Self::Dir(PathBuf::from(dir)),
            None => Self::File(PathBuf::from(&paths.jobs_file)),
        }
    }

    /// Resolve the job spec for `key`.
    pub fn resolve(&self, key: &str) -> Result<JobSpec> {
        let spec = match self {
            Self::File(path) => resolve_from_file(path, key)?,
            Self::Dir(dir) => resolve_from_dir(dir, key)?,
        };
        debug!(
            key,
            sheet_id = %spec.source.sheet_id,
            range = %spec.source.qualified_range(),
            destination = %spec.destination,
            "job config resolved"
        );
        Ok(spec)
    }

    /// All known job keys, sorted.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut keys = match self {
            Self::File(path) => read_jobs_file(path)?.keys().cloned().collect::<Vec<_>>(),
            Self::Dir(dir) => {
                let entries = std::fs::read_dir(dir).map_err(|e| SheetloadError::io(dir, e))?;
                let mut keys = Vec::new();
                for entry in entries {
                    let path = entry.map_err(|e| SheetloadError::io(dir, e))?.path();
                    if path.extension().is_some_and(|ext| ext == "json") {
                        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                            keys.push(stem.to_string());
                        }
                    }
                }
                keys
            }
        };
        keys.sort();
        Ok(keys)
    }
}

fn read_jobs_file(path: &Path) -> Result<serde_json::Map<String, serde_json::Value>> {
    if !path.is_file() {
        return Err(SheetloadError::config(format!(
            "jobs file not found: {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path).map_err(|e| SheetloadError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| {
        SheetloadError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

fn resolve_from_file(path: &Path, key: &str) -> Result<JobSpec> {
    let mut all = read_jobs_file(path)?;
    let value = all
        .remove(key)
        .ok_or_else(|| SheetloadError::ConfigNotFound { key: key.into() })?;

    let record: JobRecord = serde_json::from_value(value)
        .map_err(|e| SheetloadError::config_malformed(key, e.to_string()))?;
    record.into_spec(key)
}

fn resolve_from_dir(dir: &Path, key: &str) -> Result<JobSpec> {
    static KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]*$").expect("valid regex")
    });

    // Keys name files; anything that could escape the directory cannot exist.
    if !KEY_RE.is_match(key) {
        return Err(SheetloadError::ConfigNotFound { key: key.into() });
    }

    let path = dir.join(format!("{key}.json"));
    if !path.is_file() {
        return Err(SheetloadError::ConfigNotFound { key: key.into() });
    }

    let content = std::fs::read_to_string(&path).map_err(|e| SheetloadError::io(&path, e))?;
    let record: JobRecord = serde_json::from_str(&content)
        .map_err(|e| SheetloadError::config_malformed(key, e.to_string()))?;
    record.into_spec(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_catalog() -> JobCatalog {
        JobCatalog::File(PathBuf::from("../../../fixtures/configs/main_configs.json"))
    }

    fn dir_catalog() -> JobCatalog {
        JobCatalog::Dir(PathBuf::from("../../../fixtures/configs/jobs"))
    }

    #[test]
    fn resolves_original_field_names() {
        let spec = file_catalog().resolve("members").expect("resolve members");
        assert_eq!(spec.key, "members");
        assert_eq!(spec.source.sheet_id, "sheet123");
        assert_eq!(spec.source.worksheet, "Members");
        assert_eq!(spec.source.range, "A1:C");
        assert_eq!(spec.schema_file, "members_schema.csv");
        assert_eq!(spec.destination.to_string(), "my-project.crm.members");
    }

    #[test]
    fn resolves_canonical_field_names() {
        let spec = file_catalog().resolve("orders").expect("resolve orders");
        assert_eq!(spec.source.worksheet, "Orders 2024");
        assert_eq!(spec.source.start_row(), 3);
        assert_eq!(spec.destination.dataset, "sales");
    }

    #[test]
    fn unknown_key_is_not_found() {
        let err = file_catalog().resolve("nope").unwrap_err();
        assert!(matches!(err, SheetloadError::ConfigNotFound { ref key } if key == "nope"));
    }

    #[test]
    fn missing_fields_are_malformed() {
        let err = file_catalog().resolve("broken").unwrap_err();
        match err {
            SheetloadError::ConfigMalformed { key, message } => {
                assert_eq!(key, "broken");
                assert!(message.contains("missing field"));
            }
            other => panic!("expected ConfigMalformed, got {other:?}"),
        }
    }

    #[test]
    fn two_part_table_is_malformed() {
        let err = file_catalog().resolve("bad_table").unwrap_err();
        assert!(matches!(err, SheetloadError::ConfigMalformed { .. }));
        assert!(err.to_string().contains("three parts"));
    }

    #[test]
    fn missing_jobs_file_is_config_error() {
        let catalog = JobCatalog::File(PathBuf::from("/nonexistent/main_configs.json"));
        let err = catalog.resolve("members").unwrap_err();
        assert!(matches!(err, SheetloadError::Config { .. }));
    }

    #[test]
    fn per_job_directory_layout() {
        let spec = dir_catalog().resolve("orders").expect("resolve from dir");
        assert_eq!(spec.source.sheet_id, "sheet456");
        assert_eq!(spec.destination.table, "orders");

        let err = dir_catalog().resolve("members").unwrap_err();
        assert!(matches!(err, SheetloadError::ConfigNotFound { .. }));
    }

    #[test]
    fn per_job_directory_rejects_path_keys() {
        let err = dir_catalog().resolve("../main_configs").unwrap_err();
        assert!(matches!(err, SheetloadError::ConfigNotFound { .. }));
    }

    #[test]
    fn lists_keys_for_both_layouts() {
        let keys = file_catalog().keys().expect("file keys");
        assert_eq!(keys, vec!["bad_table", "broken", "members", "orders"]);

        let keys = dir_catalog().keys().expect("dir keys");
        assert_eq!(keys, vec!["orders"]);
    }

    #[test]
    fn jobs_dir_takes_precedence() {
        let mut paths = PathsConfig::default();
        assert!(matches!(JobCatalog::from_paths(&paths), JobCatalog::File(_)));
        paths.jobs_dir = Some("/srv/jobs".into());
        assert_eq!(
            JobCatalog::from_paths(&paths),
            JobCatalog::Dir(PathBuf::from("/srv/jobs"))
        );
    }
}
