//! Settings structs and their defaults.

use std::path::PathBuf;

/// Default directory scanned for module documents.
pub const DEFAULT_MODULE_PATH: &str = "/etc/overseer/modules";

/// Default coordination store backend.
pub const DEFAULT_STORE_BACKEND: &str = "memory";

/// `[modules]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulesSettings {
    /// Directory containing module documents.
    pub path: PathBuf,
}

impl Default for ModulesSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_MODULE_PATH),
        }
    }
}

/// `[minion]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinionSettings {
    /// Human-readable minion name; the stable identity derives from it.
    pub name: String,
}

impl Default for MinionSettings {
    fn default() -> Self {
        Self {
            name: std::env::var("HOSTNAME").unwrap_or_else(|_| "overseer".to_string()),
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// Coordination store backend name.
    pub backend: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_STORE_BACKEND.to_string(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Log file path.
    pub file: PathBuf,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file: super::log_directory().join("overseer.log"),
        }
    }
}

/// The parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub modules: ModulesSettings,
    pub minion: MinionSettings,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
}
