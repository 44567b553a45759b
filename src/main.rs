use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tabular_import::config::{ChunkPolicy, ExistingTablePolicy, ImportConfig};
use tabular_import::ingestion::discover_sources;
use tabular_import::observability::{
    CompositeObserver, ImportObserver, JsonLinesObserver, TracingObserver,
};
use tabular_import::orchestrator::Importer;
use tabular_import::store::SqliteStore;

#[derive(Parser, Debug)]
#[command(name = "tabular-import")]
#[command(version, about = "Load a CSV file or Excel workbook into a database table")]
struct Args {
    /// Input file (.csv, .xlsx, .xls, .xlsm, .xlsb, .ods)
    #[arg(long)]
    file: PathBuf,

    /// Target table (default: file stem; workbooks with several sheets get <table>_<sheet>)
    #[arg(long)]
    table: Option<String>,

    /// What to do when the target table already exists
    #[arg(long, default_value_t = ExistingTablePolicy::Fail)]
    if_exists: ExistingTablePolicy,

    /// Infer and plan only, never write
    #[arg(long)]
    dry_run: bool,

    /// Reject imports whose inferred types do not fit the existing table
    #[arg(long)]
    strict_schema: bool,

    /// Database connection string, e.g. sqlite://data.db
    #[arg(long, env = "DB_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Rows per chunk for large sources
    #[arg(long, env = "IMPORT_CHUNK_SIZE", default_value_t = ChunkPolicy::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Row count above which a source is chunked
    #[arg(long, env = "IMPORT_LARGE_FILE_ROWS", default_value_t = ChunkPolicy::DEFAULT_ROW_THRESHOLD)]
    large_file_rows: u64,

    /// Size in MiB above which a source is chunked
    #[arg(long, env = "IMPORT_LARGE_FILE_MB", default_value_t = 200)]
    large_file_mb: u64,

    /// Maximum table name length
    #[arg(long, default_value_t = 63)]
    max_identifier_len: usize,

    /// Classify at most this many rows per column
    #[arg(long)]
    sample_rows: Option<usize>,

    /// Append-only JSON lines import log
    #[arg(long, env = "IMPORT_LOG_FILE", default_value = "logs/import.log")]
    log_file: PathBuf,

    /// Print the report as JSON instead of text
    #[arg(long)]
    json: bool,
}

impl Args {
    fn to_config(&self) -> Result<ImportConfig> {
        let database_url = self
            .database_url
            .clone()
            .ok_or_else(|| anyhow!("no database configured: set DB_URL or pass --database-url"))?;
        let config = ImportConfig {
            database_url,
            if_exists: self.if_exists,
            strict_schema: self.strict_schema,
            dry_run: self.dry_run,
            chunking: ChunkPolicy {
                row_threshold: self.large_file_rows,
                byte_threshold: self.large_file_mb.saturating_mul(1024 * 1024),
                chunk_size: self.chunk_size,
            },
            max_identifier_len: self.max_identifier_len,
            sample_rows: self.sample_rows,
        };
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<ExitCode> {
    let config = args.to_config()?;
    let sources = discover_sources(&args.file, args.table.as_deref())
        .with_context(|| format!("cannot read {}", args.file.display()))?;
    let store = if config.dry_run {
        SqliteStore::connect_read_only(&config.database_url)
    } else {
        SqliteStore::connect(&config.database_url)
    }
    .context("cannot connect to database")?;

    let observer = CompositeObserver::new(vec![
        Arc::new(TracingObserver) as Arc<dyn ImportObserver>,
        Arc::new(JsonLinesObserver::new(&args.log_file)) as Arc<dyn ImportObserver>,
    ]);
    info!(
        file = %args.file.display(),
        sources = sources.len(),
        if_exists = %config.if_exists,
        strict = config.strict_schema,
        dry_run = config.dry_run,
        "starting import"
    );

    let report = Importer::new(store, &config)
        .with_observer(Arc::new(observer))
        .run(&sources);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }

    Ok(if report.has_aborts() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
