//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading, logging initialization and the
//! construction of the store client and resource registry, to reduce
//! duplication across command handlers.

use std::sync::Arc;

use tracing::info;

use overseer::config::ConfigFile;
use overseer::kv::{KvClient, MemoryKv};
use overseer::logging::{init_logging, LoggingGuard};
use overseer::resource::Registry;

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while the runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Create a new CLI runner, loading config and initializing
    /// logging.
    pub fn new() -> Result<Self, CliError> {
        let config = ConfigFile::load().map_err(|e| CliError::Config(e.to_string()))?;

        let log_path = &config.logging.file;
        let log_dir = log_path
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());
        let log_file = log_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "overseer.log".to_string());

        let logging_guard = init_logging(&log_dir, &log_file, false)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("overseer v{}", overseer::VERSION);
        info!("overseer CLI: {} command", command);
    }

    /// Build the resource registry with the built-in kinds.
    pub fn registry(&self) -> Registry {
        Registry::with_builtin()
    }

    /// Build the coordination store client named by the configuration.
    pub fn store(&self) -> Result<Arc<dyn KvClient>, CliError> {
        match self.config.store.backend.as_str() {
            "memory" => Ok(Arc::new(MemoryKv::new())),
            other => Err(CliError::Config(format!(
                "unknown store backend '{}'; embed overseer as a library to \
                 supply a custom store client",
                other
            ))),
        }
    }
}
