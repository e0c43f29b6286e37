//! Overseer CLI - command-line interface
//!
//! This binary provides a command-line interface to the overseer
//! library.
//!
//! # Architecture
//!
//! The CLI is organized into:
//! - `Cli` / `Commands`: Argument parsing (clap)
//! - `CliRunner`: Common setup (logging, config, store, registry)
//! - `CliError`: Centralized error handling with user-friendly messages
//!
//! # Configuration
//!
//! Settings are loaded from `~/.overseer/config.ini` on startup.
//! CLI arguments override config file values when specified.

mod error;
mod runner;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use overseer::catalog::{Catalog, CatalogConfig};
use overseer::config::ConfigFile;
use overseer::minion::{ClassifierRegistry, KvMinion, KvMinionConfig, Minion};
use overseer::module;

use error::CliError;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "overseer")]
#[command(version = overseer::VERSION)]
#[command(about = "Declarative configuration management", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration file at ~/.overseer/config.ini
    Init,

    /// Load the catalog and converge resources to their declared state
    Apply {
        /// Main module to load
        #[arg(long)]
        main: String,

        /// Module path directory (default: from config)
        #[arg(long)]
        modules: Option<PathBuf>,

        /// Report what would be done without taking any action
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the module import graph as DOT
    Graph {
        /// Main module to root the graph at
        #[arg(long)]
        main: String,

        /// Module path directory (default: from config)
        #[arg(long)]
        modules: Option<PathBuf>,
    },

    /// Run a minion until interrupted
    Serve {
        /// Minion name (default: from config)
        #[arg(long)]
        name: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => run_init(),
        Commands::Apply {
            main,
            modules,
            dry_run,
        } => run_apply(main, modules, dry_run),
        Commands::Graph { main, modules } => run_graph(main, modules),
        Commands::Serve { name } => run_serve(name),
    };

    if let Err(e) = result {
        e.exit();
    }
}

/// Initialize configuration file.
fn run_init() -> Result<(), CliError> {
    let (path, created) =
        ConfigFile::ensure_exists().map_err(|e| CliError::Config(e.to_string()))?;
    if created {
        println!("Created configuration file: {}", path.display());
    } else {
        println!("Configuration file already exists: {}", path.display());
    }
    println!();
    println!("Edit this file to customize overseer settings.");
    println!("CLI arguments override config file values when specified.");
    Ok(())
}

/// Resolve the module path from CLI args and config.
fn resolve_module_path(cli_modules: Option<PathBuf>, config: &ConfigFile) -> PathBuf {
    cli_modules.unwrap_or_else(|| config.modules.path.clone())
}

fn run_apply(main: String, modules: Option<PathBuf>, dry_run: bool) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("apply");

    let module_path = resolve_module_path(modules, runner.config());
    let registry = runner.registry();

    let config = CatalogConfig::new(&main, &module_path).with_dry_run(dry_run);
    let catalog = Catalog::load(config, &registry)?;

    println!("Overseer v{}", overseer::VERSION);
    println!("Main module: {}", main);
    println!("Module path: {}", module_path.display());
    if dry_run {
        println!("Dry run: no changes will be made");
    }
    println!();

    let summary = catalog.run(&mut io::stdout())?;

    println!();
    println!(
        "Applied: {}  Up-to-date: {}  Failed: {}  Skipped: {}",
        summary.applied, summary.up_to_date, summary.failed, summary.skipped
    );
    Ok(())
}

fn run_graph(main: String, modules: Option<PathBuf>) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("graph");

    let module_path = resolve_module_path(modules, runner.config());
    let registry = runner.registry();

    module::import_graph_as_dot(&main, &module_path, &registry, &mut io::stdout())
        .map_err(CliError::Graph)
}

fn run_serve(name: Option<String>) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("serve");

    let name = name.unwrap_or_else(|| runner.config().minion.name.clone());
    let store = runner.store()?;
    let classifiers = Arc::new(ClassifierRegistry::with_builtin());

    let minion = KvMinion::new(&name, store, classifiers, KvMinionConfig::default());

    println!("Overseer minion v{}", overseer::VERSION);
    println!("Name: {}", name);
    println!("ID:   {}", minion.id());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::Config(format!("failed to create runtime: {}", e)))?;
    runtime.block_on(minion.serve())?;

    println!("Minion stopped.");
    Ok(())
}
