//! SigWatch CLI — run, once, and check commands.
//!
//! Commands:
//! - `run` — start the scheduled monitor from a TOML config file
//! - `once` — one-shot read and render of a single snapshot file
//! - `check` — parse and validate a config file, print the normalized form

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sigwatch_core::{
    shared_store, AxisGrouping, DataHandler, FieldOrder, JsonRenderer, LogRenderer,
    MonitorConfig, MonitorEngine, Renderer, ScheduleRunner, SnapshotHandler, SourceConfig,
    TimeSeriesHandler,
};

#[derive(Parser)]
#[command(
    name = "sigwatch",
    about = "SigWatch — scheduled monitor for trading signal files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the scheduled monitor from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,
    },
    /// Read a snapshot file once and render it immediately.
    Once {
        /// Path to the snapshot CSV file.
        #[arg(long)]
        input: PathBuf,

        /// Fields are `column,index,value` instead of `index,column,value`.
        #[arg(long, default_value_t = false)]
        column_first: bool,

        /// Drop index labels whose values are zero in every row.
        #[arg(long, default_value_t = false)]
        drop_zero: bool,

        /// List axes containing this column first.
        #[arg(long)]
        sort_by: Option<String>,

        /// Group everything under one axis of this name.
        #[arg(long)]
        group: Option<String>,

        /// Emit the snapshot as JSON instead of a log summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Parse and validate a config file.
    Check {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config } => cmd_run(&config),
        Commands::Once {
            input,
            column_first,
            drop_zero,
            sort_by,
            group,
            json,
        } => cmd_once(&input, column_first, drop_zero, sort_by, group, json),
        Commands::Check { config } => cmd_check(&config),
    }
}

fn cmd_run(config_path: &Path) -> Result<()> {
    let config = MonitorConfig::load(config_path)
        .with_context(|| format!("loading config '{}'", config_path.display()))?;

    let store = shared_store();
    let handler: Box<dyn DataHandler> = match &config.source {
        SourceConfig::TimeSeries { root } => Box::new(TimeSeriesHandler::new(
            root,
            store.clone(),
            config.grouping(),
            config.timestamp_format.clone(),
            config.refresh_on_rollover,
        )),
        SourceConfig::Snapshot {
            file,
            field_order,
            drop_zero_indexes,
        } => Box::new(SnapshotHandler::new(
            file,
            store.clone(),
            config.grouping(),
            *field_order,
            *drop_zero_indexes,
        )),
    };
    let renderer = Box::new(LogRenderer::new(config.max_axes, config.sort_by.clone()));

    let engine = MonitorEngine::new(
        handler,
        renderer,
        store,
        config.task_interval(),
        config.refresh_on_start,
    );
    engine.plot();

    info!(
        windows = config.windows.len(),
        check_interval_secs = config.check_interval_secs,
        task_interval_secs = config.task_interval_secs,
        "monitor starting"
    );
    let handle = ScheduleRunner::spawn(
        config.windows.clone(),
        config.check_interval(),
        Box::new(engine),
    );

    // The guard loop runs until the process is terminated.
    handle.join();
    Ok(())
}

fn cmd_once(
    input: &Path,
    column_first: bool,
    drop_zero: bool,
    sort_by: Option<String>,
    group: Option<String>,
    json: bool,
) -> Result<()> {
    let field_order = if column_first {
        FieldOrder::ColumnIndexValue
    } else {
        FieldOrder::IndexColumnValue
    };

    let store = shared_store();
    let mut handler = SnapshotHandler::new(
        input,
        store.clone(),
        AxisGrouping::from_option(group.as_deref()),
        field_order,
        drop_zero,
    );
    handler
        .handle()
        .with_context(|| format!("reading '{}'", input.display()))?;

    let snapshot = store
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .snapshot();
    let mut renderer: Box<dyn Renderer> = if json {
        Box::new(JsonRenderer { pretty: true })
    } else {
        Box::new(LogRenderer::new(None, sort_by))
    };
    renderer.update(&snapshot);
    Ok(())
}

fn cmd_check(config_path: &Path) -> Result<()> {
    let config = MonitorConfig::load(config_path)
        .with_context(|| format!("validating '{}'", config_path.display()))?;
    println!("config ok: {}", config_path.display());
    for window in &config.windows {
        println!(
            "  window {} - {}",
            window.start().format("%H:%M:%S"),
            window.end().format("%H:%M:%S")
        );
    }
    println!(
        "  check every {:?}, poll every {:?}",
        Duration::from_secs(config.check_interval_secs),
        Duration::from_secs(config.task_interval_secs)
    );
    match &config.source {
        SourceConfig::TimeSeries { root } => println!("  source: time series at {}", root.display()),
        SourceConfig::Snapshot { file, .. } => println!("  source: snapshot at {}", file.display()),
    }
    Ok(())
}
