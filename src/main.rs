// 🧬 panel-reconcile CLI
//
//   panel-reconcile generate   reconcile sources, write fixture + dumps + report
//   panel-reconcile check      reconcile sources, diff against the database

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use panel_reconcile::config::{self, RunConfig, SourceEntry};
use panel_reconcile::report::REPORT_FILE_NAME;
use panel_reconcile::{
    create_run_directory, diff_against_database, emit, load_database_snapshot, load_source,
    open_database_readonly, reconcile, ArtifactFormat, LoadedSource, Reconciliation, RunReport,
    VERSION,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "panel-reconcile",
    version,
    about = "Reconcile gene-panel sources and generate import fixtures and reporting dumps."
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Reconcile sources and write the fixture, flat dumps and report.
    Generate(RunArgs),
    /// Reconcile sources and diff the result against the database.
    Check(RunArgs),
}

#[derive(Debug, Parser)]
struct RunArgs {
    /// Config file (default: ./panel-reconcile.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Extra source files, loaded after the configured ones.
    #[arg(long = "source")]
    sources: Vec<PathBuf>,

    /// Output root for run folders.
    #[arg(long)]
    output: Option<PathBuf>,

    /// SQLite database holding the current panel state.
    #[arg(long)]
    database: Option<PathBuf>,

    /// Run date used for folder and file names (YYYY-MM-DD, default today).
    #[arg(long)]
    run_date: Option<NaiveDate>,

    /// Only emit these panel ids.
    #[arg(long = "panel")]
    panels: Vec<String>,

    /// Only emit these clinical indication codes.
    #[arg(long = "indication")]
    indications: Vec<String>,
}

fn main() -> ExitCode {
    match real_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::from(1)
        }
    }
}

fn real_main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!(version = VERSION, "panel-reconcile starting");
    match cli.cmd {
        Command::Generate(args) => cmd_generate(args),
        Command::Check(args) => cmd_check(args),
    }
}

// ============================================================================
// SHARED
// ============================================================================

/// Config file merged with CLI flags (flags win)
fn resolve_config(args: &RunArgs) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => config::load_or_default(&std::env::current_dir().context("read current directory")?)?,
    };

    config
        .sources
        .extend(args.sources.iter().map(|path| SourceEntry { path: path.clone(), kind: None }));
    if let Some(output) = &args.output {
        config.output.root = output.clone();
    }
    if let Some(database) = &args.database {
        config.database.path = database.clone();
    }
    if !args.panels.is_empty() {
        config.filter.panels = args.panels.clone();
    }
    if !args.indications.is_empty() {
        config.filter.indications = args.indications.clone();
    }

    anyhow::ensure!(!config.sources.is_empty(), "no sources configured (use --source or {})", config::CONFIG_FILE_NAME);
    Ok(config)
}

fn load_and_reconcile(config: &RunConfig) -> Result<Reconciliation> {
    let sources = config
        .sources
        .iter()
        .map(|entry| {
            load_source(&entry.path, entry.kind)
                .with_context(|| format!("load source {}", entry.path.display()))
        })
        .collect::<Result<Vec<LoadedSource>>>()?;

    let reconciliation = reconcile(&sources)?;
    for warning in &reconciliation.warnings {
        warn!(source = %warning.source, "{}", warning);
    }
    for conflict in &reconciliation.conflicts {
        warn!("{}", conflict);
    }
    Ok(reconciliation)
}

fn run_date(args: &RunArgs) -> NaiveDate {
    args.run_date.unwrap_or_else(|| Local::now().date_naive())
}

// ============================================================================
// COMMANDS
// ============================================================================

fn cmd_generate(args: RunArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let date = run_date(&args);
    let policy = config.filter.to_policy();

    let reconciliation = load_and_reconcile(&config)?;
    let mut run = create_run_directory(&config.output.root, date)?;

    for format in ArtifactFormat::ALL {
        let artifact = emit(&reconciliation.snapshot, format, &policy, date)?;
        run.write(&artifact)?;
    }

    let report = RunReport::from_reconciliation(&reconciliation);
    run.write_bytes(REPORT_FILE_NAME, &report.to_jsonl()?)?;
    run.write_checksums()?;

    info!(path = %run.path.display(), "{}", report.summary());
    println!("{}", run.path.display());
    Ok(())
}

fn cmd_check(args: RunArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let date = run_date(&args);

    anyhow::ensure!(
        config.database.path.exists(),
        "database not found at {}",
        config.database.path.display()
    );

    let reconciliation = load_and_reconcile(&config)?;
    let conn = open_database_readonly(&config.database.path)
        .with_context(|| format!("open database {}", config.database.path.display()))?;
    let database = load_database_snapshot(&conn)?;

    let diffs = diff_against_database(&reconciliation.snapshot, &database);
    let report = RunReport::from_reconciliation(&reconciliation).with_diffs(diffs);

    let mut run = create_run_directory(&config.output.root, date)?;
    run.write_bytes(REPORT_FILE_NAME, &report.to_jsonl()?)?;
    run.write_checksums()?;

    let summary = report.summary();
    info!(path = %run.path.display(), "{}", summary);
    if report.is_clean() {
        info!("sources and database agree");
    }
    println!("{}", summary);
    Ok(())
}
