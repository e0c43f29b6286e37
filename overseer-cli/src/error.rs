//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent
//! formatting and appropriate exit codes.

use std::fmt;
use std::process;

use overseer::catalog::CatalogError;
use overseer::graph::GraphError;
use overseer::minion::MinionError;
use overseer::module::ModuleError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Catalog load or run failed
    Catalog(CatalogError),
    /// Module graph inspection failed
    Graph(ModuleError),
    /// Minion runtime failed
    Serve(MinionError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        match self {
            CliError::Catalog(CatalogError::Graph(GraphError::CircularDependency { .. }))
            | CliError::Catalog(CatalogError::Module(ModuleError::Graph(
                GraphError::CircularDependency { .. },
            ))) => {
                eprintln!();
                eprintln!("Run 'overseer graph --main <module>' to render the cycle as DOT.");
            }
            CliError::Config(_) => {
                eprintln!();
                eprintln!("Run 'overseer init' to create a default configuration file.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Catalog(e) => write!(f, "Catalog error: {}", e),
            CliError::Graph(e) => write!(f, "Graph error: {}", e),
            CliError::Serve(e) => write!(f, "Minion error: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Catalog(e) => Some(e),
            CliError::Graph(e) => Some(e),
            CliError::Serve(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CatalogError> for CliError {
    fn from(e: CatalogError) -> Self {
        CliError::Catalog(e)
    }
}

impl From<MinionError> for CliError {
    fn from(e: MinionError) -> Self {
        CliError::Serve(e)
    }
}
