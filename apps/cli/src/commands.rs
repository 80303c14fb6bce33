//! CLI command definitions, routing, and tracing setup.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use sheetload_core::schema::load_schema;
use sheetload_core::{
    CsvGridSource, GridSource, JobCatalog, JobReport, Notifiers, PipelineContext, Prepared,
    ProgressReporter, execute_job, execute_job_with, prepare,
};
use sheetload_shared::{AppConfig, TableId, init_config, load_config, load_config_from};
use sheetload_source::{SheetsClient, SourceOptions};
use sheetload_storage::Warehouse;
use tracing::info;

use crate::server::{self, AppState};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// SheetLoad: load spreadsheet ranges into analytical tables.
#[derive(Parser)]
#[command(
    name = "sheetload",
    version,
    about = "Validate, normalize and load spreadsheet ranges into analytical tables.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.sheetload/sheetload.toml).
    #[arg(long, global = true, env = "SHEETLOAD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run one job: fetch, validate, coerce and load.
    Run {
        /// Job key to run.
        key: String,

        /// Stop before loading and print what would be written.
        #[arg(long)]
        dry_run: bool,

        /// Read the grid from a local CSV file instead of the sheet.
        #[arg(long)]
        grid_csv: Option<PathBuf>,

        /// Skip webhook notifications.
        #[arg(long)]
        no_notify: bool,
    },

    /// Serve the HTTP entrypoint.
    Serve {
        /// Address to bind (overrides config).
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides config).
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },

    /// Inspect configured jobs.
    Jobs {
        #[command(subcommand)]
        action: JobsAction,
    },

    /// Show the column schema a job uses.
    Schema {
        /// Job key.
        key: String,
    },

    /// Show recent load history.
    History {
        /// Maximum number of loads to show.
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Show the first rows of a loaded table.
    Preview {
        /// Job key, or a `catalog.dataset.table` identifier.
        target: String,

        /// Number of rows to show.
        #[arg(long, default_value = "10")]
        limit: u32,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Job inspection subcommands.
#[derive(Subcommand)]
pub(crate) enum JobsAction {
    /// List job keys and their destinations.
    List,
    /// Show one resolved job.
    Show {
        /// Job key.
        key: String,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "sheetload=info",
        1 => "sheetload=debug",
        _ => "sheetload=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    if let Command::Config {
        action: ConfigAction::Init,
    } = cli.command
    {
        return cmd_config_init().await;
    }

    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::Run {
            key,
            dry_run,
            grid_csv,
            no_notify,
        } => cmd_run(&config, &key, dry_run, grid_csv.as_deref(), no_notify).await,
        Command::Serve { host, port } => cmd_serve(&config, host, port).await,
        Command::Jobs { action } => match action {
            JobsAction::List => cmd_jobs_list(&config).await,
            JobsAction::Show { key } => cmd_jobs_show(&config, &key).await,
        },
        Command::Schema { key } => cmd_schema(&config, &key).await,
        Command::History { limit } => cmd_history(&config, limit).await,
        Command::Preview { target, limit } => cmd_preview(&config, &target, limit).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(&config).await,
        },
    }
}

fn catalog(config: &AppConfig) -> JobCatalog {
    JobCatalog::from_paths(&config.paths)
}

fn grid_source(config: &AppConfig, grid_csv: Option<&Path>) -> Result<Arc<dyn GridSource>> {
    let source: Arc<dyn GridSource> = match grid_csv {
        Some(path) => Arc::new(CsvGridSource::new(path)),
        None => Arc::new(SheetsClient::new(&SourceOptions::from(&config.source))?),
    };
    Ok(source)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    config: &AppConfig,
    key: &str,
    dry_run: bool,
    grid_csv: Option<&Path>,
    no_notify: bool,
) -> Result<()> {
    let catalog = catalog(config);
    let schemas_dir = PathBuf::from(&config.paths.schemas_dir);
    let source = grid_source(config, grid_csv)?;

    info!(key, dry_run, "running job");

    if dry_run {
        let spec = catalog.resolve(key)?;
        let reporter = CliProgress::new();
        let prepared = prepare(&spec, &schemas_dir, source.as_ref(), &reporter).await;
        reporter.finish();
        print_prepared(&spec.destination.to_string(), &prepared?);
        return Ok(());
    }

    let warehouse = Warehouse::open(Path::new(&config.paths.warehouse_path)).await?;
    let reporter = CliProgress::new();
    let ctx = PipelineContext {
        catalog: &catalog,
        schemas_dir: &schemas_dir,
        source: source.as_ref(),
        store: &warehouse,
        progress: &reporter,
    };

    let result = if no_notify {
        execute_job_with(key, &ctx, &Notifiers::none()).await
    } else {
        execute_job(key, &ctx, &config.notify).await
    };
    reporter.finish();
    let report = result?;

    println!();
    match report.rows_written() {
        Some(rows) => {
            println!("  Job completed!");
            println!("  Job:      {}", report.job_key);
            println!("  Table:    {}", report.destination);
            println!("  Rows:     {rows}");
        }
        None => {
            println!("  Nothing to load: the sheet has no data rows.");
            println!("  Job:      {}", report.job_key);
        }
    }
    println!("  Warnings: {}", report.warnings.len());
    for warning in &report.warnings {
        println!("    - {warning}");
    }
    println!("  Time:     {:.1}s", report.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn print_prepared(destination: &str, prepared: &Prepared) {
    const PREVIEW_ROWS: usize = 10;

    println!();
    match prepared {
        Prepared::NoRows => println!("  Nothing to load: the sheet has no data rows."),
        Prepared::Ready {
            schema,
            table,
            warnings,
        } => {
            println!("  Dry run: {} rows would replace {destination}", table.row_count());
            println!();
            for column in schema.columns() {
                println!("  {:<24} {}", column.target_name, column.column_type);
            }
            println!();
            println!("  {}", table.columns.join(" | "));
            for row in table.rows.iter().take(PREVIEW_ROWS) {
                let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
                println!("  {}", cells.join(" | "));
            }
            if table.row_count() > PREVIEW_ROWS {
                println!("  ... {} more rows", table.row_count() - PREVIEW_ROWS);
            }
            if !warnings.is_empty() {
                println!();
                println!("  Warnings:");
                for warning in warnings {
                    println!("    - {warning}");
                }
            }
        }
    }
    println!();
}

async fn cmd_serve(config: &AppConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| eyre!("invalid bind address '{host}:{port}': {e}"))?;

    let warehouse = Warehouse::open(Path::new(&config.paths.warehouse_path)).await?;
    let state = AppState {
        catalog: Arc::new(catalog(config)),
        schemas_dir: Arc::new(PathBuf::from(&config.paths.schemas_dir)),
        source: grid_source(config, None)?,
        store: Arc::new(warehouse),
        notify: Some(config.notify.clone()),
    };

    println!("Serving on http://{addr} (POST /process)");
    server::serve(state, addr).await?;
    Ok(())
}

async fn cmd_jobs_list(config: &AppConfig) -> Result<()> {
    let catalog = catalog(config);
    let keys = catalog.keys()?;

    if keys.is_empty() {
        println!("No jobs configured.");
        return Ok(());
    }

    for key in keys {
        match catalog.resolve(&key) {
            Ok(spec) => println!("  {key:<24} {}", spec.destination),
            Err(e) => println!("  {key:<24} (invalid: {e})"),
        }
    }
    Ok(())
}

async fn cmd_jobs_show(config: &AppConfig, key: &str) -> Result<()> {
    let spec = catalog(config).resolve(key)?;
    println!("  Key:         {}", spec.key);
    println!("  Sheet:       {}", spec.source.sheet_id);
    println!("  Range:       {}", spec.source.qualified_range());
    println!("  Schema:      {}", spec.schema_file);
    println!("  Destination: {}", spec.destination);
    Ok(())
}

async fn cmd_schema(config: &AppConfig, key: &str) -> Result<()> {
    let spec = catalog(config).resolve(key)?;
    let schema = load_schema(Path::new(&config.paths.schemas_dir), &spec.schema_file)?;

    println!("  {:<24} {:<24} TYPE", "SHEET HEADER", "COLUMN");
    for column in schema.columns() {
        println!(
            "  {:<24} {:<24} {}",
            column.original_name, column.target_name, column.column_type
        );
    }
    Ok(())
}

async fn cmd_history(config: &AppConfig, limit: u32) -> Result<()> {
    let warehouse = Warehouse::open_readonly(Path::new(&config.paths.warehouse_path)).await?;
    let jobs = warehouse.list_load_jobs(limit).await?;

    if jobs.is_empty() {
        println!("No loads recorded.");
        return Ok(());
    }

    for job in jobs {
        let rows = job
            .output_rows
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "  {}  {:<10} {:<16} {:<32} rows={rows}",
            job.started_at.format("%Y-%m-%d %H:%M:%S"),
            job.status.as_str(),
            job.job_key,
            job.table_id,
        );
        if let Some(error) = &job.error {
            println!("      {error}");
        }
    }
    Ok(())
}

async fn cmd_preview(config: &AppConfig, target: &str, limit: u32) -> Result<()> {
    // Three dotted parts name a table directly; anything else is a job key.
    let table = match TableId::parse(target) {
        Ok(table) => table,
        Err(_) => catalog(config).resolve(target)?.destination,
    };
    let warehouse = Warehouse::open_readonly(Path::new(&config.paths.warehouse_path)).await?;

    if !warehouse.table_exists(&table).await? {
        return Err(eyre!("table {table} has not been loaded yet"));
    }

    let total = warehouse.row_count(&table).await?;
    let preview = warehouse.preview_rows(&table, limit).await?;

    println!("  {table} ({total} rows)");
    println!();
    println!("  {}", preview.columns.join(" | "));
    for row in &preview.rows {
        println!("  {}", row.join(" | "));
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn rows_fetched(&self, rows: usize) {
        self.spinner.set_message(format!("Fetched {rows} data rows"));
    }

    fn done(&self, _report: &JobReport) {
        self.spinner.finish_and_clear();
    }
}
