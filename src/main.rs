use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use binrepo_collector::cli::{Args, Commands};
use binrepo_collector::client::{HttpGateway, RepoServerClient};
use binrepo_collector::config::{load_or_create_settings, CollectorSettings};
use binrepo_collector::orchestrator::{CollectionOrchestrator, CollectorState, Stores};
use binrepo_collector::patterns::PatternResolver;
use binrepo_collector::store::{InMemoryItemStore, InMemoryRecordStore, InMemoryRepoStore};
use binrepo_collector::window::WindowPlanner;

fn main() -> Result<()> {
    let args = Args::parse();

    initialize_logging(args.verbose)?;

    if let Some(cmd) = &args.command {
        return handle_subcommand(cmd);
    }

    info!("Starting artifact metadata collection");

    let mut settings = load_or_create_settings(args.config.as_deref())?;
    if let Some(mode) = args.mode {
        settings.mode = mode.into();
    }

    // No usable patterns is fatal: every downstream decision depends on them
    let resolver = PatternResolver::from_settings(&settings)?;
    // Same for an unparseable build-event capture pattern
    settings.capture_regex()?;
    let planner = WindowPlanner::from_settings(&settings);
    let gateway = HttpGateway::new()?;
    let client = RepoServerClient::new(gateway, &settings);

    // In-memory stores; a deployment substitutes persistent implementations
    // at the store trait boundary
    let mut items = InMemoryItemStore::new();
    let mut records = InMemoryRecordStore::new();
    let mut repos = InMemoryRepoStore::new();
    let mut state = CollectorState::default();

    let orchestrator = CollectionOrchestrator::new(&settings, &resolver, planner, &client);
    let summary = orchestrator.run(
        &mut Stores {
            items: &mut items,
            records: &mut records,
            repos: &mut repos,
        },
        &mut state,
    )?;

    let json = summary.to_json()?;
    match &args.summary {
        Some(path) => {
            fs::write(path, &json).context("Failed to write cycle summary")?;
            info!("Cycle summary written to {}", path.display());
        }
        None => println!("{}", json),
    }

    info!("Collection completed successfully");
    Ok(())
}

/// Initialize logging with the specified verbosity level
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context("Failed to initialize logger")?;
    Ok(())
}

/// Handle subcommands
fn handle_subcommand(cmd: &Commands) -> Result<()> {
    match cmd {
        Commands::InitConfig { path } => {
            info!("Creating default settings file at {}", path.display());
            let settings = CollectorSettings::default();
            settings.save_to_yaml_file(path)?;
            info!("Settings created successfully");
            Ok(())
        }
    }
}
