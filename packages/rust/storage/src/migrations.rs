//! SQL migration definitions for the SheetLoad warehouse database.
//!
//! Migrations cover only the warehouse's own bookkeeping tables. Destination
//! tables are created and replaced by loads and are not versioned here.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: schema_migrations, load_jobs",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Load job history, one row per overwrite load attempt
CREATE TABLE IF NOT EXISTS load_jobs (
    id          TEXT PRIMARY KEY,
    job_key     TEXT NOT NULL,
    table_id    TEXT NOT NULL,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    status      TEXT NOT NULL,
    output_rows INTEGER,
    error       TEXT
);

CREATE INDEX IF NOT EXISTS idx_load_jobs_table ON load_jobs(table_id);
CREATE INDEX IF NOT EXISTS idx_load_jobs_job_key ON load_jobs(job_key);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
