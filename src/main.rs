/*!
 * Ferry CLI - Command Line Interface
 *
 * Author: Shane Wall <shaneawall@gmail.com>
 */

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use ferry::{
    config::{FerryConfig, LogLevel},
    core::{inspect, DeliveryLoop, DeliveryOutcome, Progress},
    error::{FerryError, Result, EXIT_SUCCESS},
    logging,
    sink::{DryRunSink, EventSink, HttpsSink},
    source::HttpSearchClient,
};
use ferry_core_checkpoint::{source_key, FileStore};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "ferry")]
#[command(version, about = "Ship audit events to a log collector, resuming where the last run stopped", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deliver events until interrupted
    Run(RunArgs),

    /// Show the stored checkpoint for the configured source
    Status {
        /// Configuration file (TOML)
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },

    /// Forget the stored cursor and last delivered event (keeps the start time)
    Reset {
        /// Configuration file (TOML)
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log events instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// Scan start time (RFC 3339). Changing it resets progress.
    #[arg(long, value_name = "TIME")]
    start_time: Option<DateTime<Utc>>,

    /// Events requested per page
    #[arg(long, value_name = "N")]
    batch: Option<usize>,

    /// Seconds to wait when no events are available
    #[arg(long, value_name = "SECS")]
    poll_timeout: Option<u64>,

    /// Stop after delivering this many events
    #[arg(long, value_name = "N")]
    max_events: Option<u64>,

    /// Extra attempts for transient fetch/send failures
    #[arg(long, value_name = "N")]
    retry_attempts: Option<u32>,

    /// Log level
    #[arg(long, value_enum)]
    log_level: Option<LogLevelArg>,

    /// Write JSON logs to this file instead of stdout
    #[arg(long, value_name = "FILE")]
    log: Option<PathBuf>,

    /// Verbose output (debug level)
    #[arg(short, long)]
    verbose: bool,
}

impl RunArgs {
    /// CLI flags override file values
    fn apply(&self, config: &mut FerryConfig) {
        if self.dry_run {
            config.dry_run = true;
        }
        if let Some(start_time) = self.start_time {
            config.start_time = start_time;
        }
        if let Some(batch) = self.batch {
            config.batch_size = batch;
        }
        if let Some(secs) = self.poll_timeout {
            config.poll_timeout_secs = secs;
        }
        if let Some(max) = self.max_events {
            config.max_events = Some(max);
        }
        if let Some(attempts) = self.retry_attempts {
            config.retry_attempts = attempts;
        }
        if let Some(level) = self.log_level {
            config.log_level = level.into();
        }
        if self.log.is_some() {
            config.log_file = self.log.clone();
        }
        if self.verbose {
            config.verbose = true;
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_delivery(args),
        Commands::Status { config } => show_status(&config),
        Commands::Reset { config } => reset_checkpoint(&config),
        Commands::Completions { shell } => {
            use clap::CommandFactory;
            use clap_complete::generate;
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "ferry", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<FerryConfig> {
    match path {
        Some(path) => FerryConfig::from_file(path),
        None => Ok(FerryConfig::default()),
    }
}

fn open_store(config: &FerryConfig) -> Result<(FileStore, String)> {
    let store = FileStore::open(&config.storage_dir)?;
    let key = source_key(&config.source.endpoint, &config.namespace);
    Ok((store, key))
}

fn run_delivery(args: RunArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    args.apply(&mut config);

    if let Err(e) = logging::init_logging(&config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let (store, key) = open_store(&config)?;
        info!(
            version = ferry::VERSION,
            source = %config.source.endpoint,
            namespace = %config.namespace,
            source_key = %key,
            storage = %store.dir().display(),
            dry_run = config.dry_run,
            "Starting ferry"
        );

        let progress = Progress::load(store, &key, config.start_time)?;
        let client = HttpSearchClient::new(&config.source)?;
        let sink: Box<dyn EventSink> = if config.dry_run {
            Box::new(DryRunSink::new())
        } else {
            Box::new(HttpsSink::new(&config.sink)?)
        };

        let mut delivery = DeliveryLoop::from_config(client, sink, progress, &config);
        match delivery.run(shutdown_signal()).await? {
            DeliveryOutcome::Stopped => info!("Stopped on request"),
            DeliveryOutcome::Completed => info!(
                delivered = delivery.stats().delivered,
                "Delivered the requested number of events"
            ),
        }
        Ok::<(), FerryError>(())
    })
}

fn show_status(config_path: &Path) -> Result<()> {
    let config = FerryConfig::from_file(config_path)?;
    let (store, key) = open_store(&config)?;
    let stored = inspect(&store, &key)?;

    println!("Source:       {} (namespace {})", config.source.endpoint, config.namespace);
    println!("Source key:   {}", key);
    println!("Storage:      {}", store.dir().display());
    if stored.is_empty() {
        println!("Checkpoint:   none (next run starts a new scan)");
        return Ok(());
    }

    let show = |v: &Option<String>| match v.as_deref() {
        None | Some("") => "<none>".to_string(),
        Some(v) => v.to_string(),
    };
    println!("Start time:   {}", show(&stored.start_time));
    println!("Cursor:       {}", show(&stored.cursor));
    println!("Last event:   {}", show(&stored.last_delivered_id));

    let configured = config.start_time.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true);
    let stored_start = stored
        .start_time
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc));
    if stored_start != Some(config.start_time) {
        println!(
            "Note:         configured start time {} differs; next run resets progress",
            configured
        );
    }
    Ok(())
}

fn reset_checkpoint(config_path: &Path) -> Result<()> {
    let config = FerryConfig::from_file(config_path)?;
    let (store, key) = open_store(&config)?;
    let mut progress = Progress::load(store, &key, config.start_time)?;
    progress.reset()?;
    println!("Checkpoint for {} cleared", progress.source_key());
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Interrupt received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "ferry",
            "run",
            "--config",
            "ferry.toml",
            "--dry-run",
            "--start-time",
            "2024-01-01T00:00:00Z",
            "--batch",
            "50",
            "--max-events",
            "10",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let mut config = FerryConfig::default();
        args.apply(&mut config);
        assert!(config.dry_run);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.max_events, Some(10));
        assert_eq!(
            config.start_time,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_flags_left_unset_keep_file_values() {
        let cli = Cli::try_parse_from(["ferry", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let mut config = FerryConfig {
            batch_size: 7,
            poll_timeout_secs: 30,
            ..Default::default()
        };
        args.apply(&mut config);
        assert_eq!(config.batch_size, 7);
        assert_eq!(config.poll_timeout_secs, 30);
        assert!(!config.dry_run);
    }

    #[test]
    fn test_status_requires_config() {
        assert!(Cli::try_parse_from(["ferry", "status"]).is_err());
        assert!(Cli::try_parse_from(["ferry", "status", "-c", "ferry.toml"]).is_ok());
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_missing_config_file_is_config_error() {
        let err = load_config(Some(Path::new("/nonexistent/ferry.toml"))).unwrap_err();
        assert!(matches!(err, FerryError::Config(_)));
    }
}
