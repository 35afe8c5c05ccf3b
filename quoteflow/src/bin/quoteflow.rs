//! quoteflow CLI - manage the quotes pipeline objects in the store

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use quoteflow::config::{AdapterArgs, StoreArgs};
use quoteflow::engine::backup_suffix;
use quoteflow::pipeline::PipelineMetrics;
use quoteflow::{
    CleanRequest, CleanTarget, HttpExecutionClient, ObjectCatalog, QuoteflowError, ScopeFilter,
    StateTransitionEngine, TimeRange, Visibility,
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "quoteflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(flatten)]
    store: StoreArgs,

    #[command(flatten)]
    adapter: AdapterArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create every missing object; consumers are left detached
    Init,

    /// Drop and recreate objects (all by default)
    Recreate {
        /// Adapter tables and the views reading from them
        #[arg(long)]
        only_adapter: bool,

        /// Raw and rollup tables and the rollup view
        #[arg(long)]
        only_storage: bool,

        /// Views only
        #[arg(long)]
        only_views: bool,

        /// Keep current storage data in timestamped `<table>_bak_*` copies
        #[arg(long)]
        backup: bool,
    },

    /// Delete a time range of raw and/or rollup rows
    Clean {
        /// Range start, inclusive (e.g. 2026-02-15T20:00:00)
        #[arg(long)]
        from: String,

        /// Range end, exclusive
        #[arg(long)]
        to: String,

        /// Symbol filter (default: all)
        #[arg(long, alias = "symbol")]
        key: Option<String>,

        /// Rollup timeframe filter (default: all)
        #[arg(long, alias = "timeframe")]
        granularity: Option<String>,

        /// Only delete from the raw table
        #[arg(long, alias = "only-ticks")]
        only_raw: bool,

        /// Only delete from the rollup table
        #[arg(long, alias = "only-ohlc")]
        only_rollup: bool,

        /// Count matching rows without deleting
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove every object
    Drop,

    /// Attach consumer adapters (start consuming)
    Enable,

    /// Detach consumer adapters (stop consuming)
    Disable,

    /// Show which objects are visible
    Status,
}

/// A command with its arguments validated. Built before any network call.
enum Action {
    Init,
    Recreate { scope: ScopeFilter, backup: bool },
    Clean(CleanRequest),
    Drop,
    Enable,
    Disable,
    Status,
}

fn validate(cli: &Cli) -> Result<(Action, ObjectCatalog)> {
    let action = match &cli.command {
        Commands::Init => Action::Init,
        Commands::Recreate {
            only_adapter,
            only_storage,
            only_views,
            backup,
        } => {
            let scope = ScopeFilter::from_flags(*only_adapter, *only_storage, *only_views)?;
            if *backup && !scope.includes_storage() {
                return Err(QuoteflowError::Validation(format!(
                    "--backup only applies when storage is recreated, scope is {scope}"
                ))
                .into());
            }
            Action::Recreate {
                scope,
                backup: *backup,
            }
        }
        Commands::Clean {
            from,
            to,
            key,
            granularity,
            only_raw,
            only_rollup,
            dry_run,
        } => Action::Clean(CleanRequest::new(
            TimeRange::parse(from, to)?,
            key.clone(),
            granularity.clone(),
            CleanTarget::from_flags(*only_raw, *only_rollup)?,
            *dry_run,
        )?),
        Commands::Drop => Action::Drop,
        Commands::Enable => Action::Enable,
        Commands::Disable => Action::Disable,
        Commands::Status => Action::Status,
    };

    let creates_adapters = match &action {
        Action::Init => true,
        Action::Recreate { scope, .. } => scope.includes_adapters(),
        _ => false,
    };
    let settings = if creates_adapters {
        cli.adapter.require_credentials()?
    } else {
        cli.adapter.settings()
    };

    Ok((action, ObjectCatalog::new(&settings)))
}

fn print_metrics(metrics: &PipelineMetrics) {
    for warning in &metrics.warnings {
        println!("WARNING: {warning}");
    }
    println!(
        "Done. {} steps in {} ms.",
        metrics.task_count(),
        metrics.total_duration_ms
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    quoteflow::logging::init(&cli.log_level);

    let (action, catalog) = validate(&cli)?;

    let connection = cli.store.connection_settings();
    let client = HttpExecutionClient::new(&connection)?;
    let engine = StateTransitionEngine::new(Arc::new(client), catalog);

    tracing::info!(url = %connection.base_url(), database = %connection.database, "Connecting");
    engine.probe().await?;

    match action {
        Action::Init => print_metrics(&engine.init().await?),
        Action::Recreate { scope, backup: false } => print_metrics(&engine.recreate(scope).await?),
        Action::Recreate { scope, backup: true } => {
            let suffix = backup_suffix(Utc::now());
            println!("  backup suffix : {suffix}");
            print_metrics(&engine.recreate_with_backup(scope, &suffix).await?);
        }
        Action::Drop => print_metrics(&engine.drop_pipeline().await?),
        Action::Enable => print_metrics(&engine.enable().await?),
        Action::Disable => print_metrics(&engine.disable().await?),
        Action::Clean(request) => {
            println!("  range     : {}", request.range);
            println!("  key       : {}", request.key.as_deref().unwrap_or("ALL"));
            println!(
                "  timeframe : {}",
                request.granularity.as_deref().unwrap_or("ALL")
            );
            println!("  target    : {}", request.target);

            let report = engine.clean(&request).await?;
            if let Some(rows) = report.raw_rows {
                println!("  raw rows    : {rows}");
            }
            if let Some(rows) = report.rollup_rows {
                println!("  rollup rows : {rows}");
            }
            if let Some(attempts) = report.reattach_attempts {
                println!("  reattached  : {attempts} attempt(s)");
            }
            println!("{report}");
        }
        Action::Status => {
            for status in engine.status().await? {
                let state = match status.visibility {
                    Visibility::Attached => "attached",
                    Visibility::Hidden => "absent/detached",
                };
                let rows = status
                    .total_rows
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "-".into());
                println!(
                    "{:<36} {:<14} {:<16} {:<22} {}",
                    status.name,
                    status.kind.to_string(),
                    state,
                    status.engine.as_deref().unwrap_or("-"),
                    rows
                );
            }
        }
    }

    Ok(())
}
