//! Loading and saving the configuration file.
//!
//! A missing config file is never an error in this module: defaults
//! apply until `overseer init` materializes them on disk. Everything
//! else - an unreadable file, malformed INI, a value that fails
//! validation - is reported distinctly, carrying the offending path so
//! the operator knows which file to fix.

use std::io;
use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use super::settings::ConfigFile;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The config file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The config file is not valid INI.
    #[error("{} is not valid INI: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: ini::ParseError,
    },

    /// A well-formed file carried a value that fails validation.
    #[error("invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// The config file or its parent directory could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ConfigFile {
    /// Loads the user configuration from the default location.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Loads the configuration from `path`.
    ///
    /// A file that is not there yields the defaults; a file that is
    /// there must read, parse and validate.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ConfigFileError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        let ini = Ini::load_from_str(&content).map_err(|e| ConfigFileError::Malformed {
            path: path.to_path_buf(),
            source: e,
        })?;

        super::parser::parse_ini(&ini)
    }

    /// Saves the configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigFileError> {
        self.save_to(&config_file_path())
    }

    /// Saves the configuration to `path`, creating missing parent
    /// directories on the way.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path, super::writer::to_config_string(self)).map_err(|e| {
            ConfigFileError::Write {
                path: path.to_path_buf(),
                source: e,
            }
        })
    }

    /// Writes a default config file at the default location unless one
    /// is already present.
    ///
    /// Returns the path and whether this call created the file, so
    /// `overseer init` can tell the operator which of the two
    /// happened.
    pub fn ensure_exists() -> Result<(PathBuf, bool), ConfigFileError> {
        let path = config_file_path();
        if path.exists() {
            return Ok((path, false));
        }

        Self::default().save_to(&path)?;
        Ok((path, true))
    }
}

/// Per-user overseer directory; the config file and the default log
/// directory both live under it.
pub fn config_directory() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(".overseer"),
        // No resolvable home: fall back to a relative dotdir.
        None => PathBuf::from(".overseer"),
    }
}

/// Path to the config file (~/.overseer/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

/// Default directory for log files (~/.overseer/logs).
pub fn log_directory() -> PathBuf {
    config_directory().join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("absent.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_to_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("config.ini");

        let mut config = ConfigFile::default();
        config.minion.name = "kevin".to_string();
        config.modules.path = PathBuf::from("/srv/modules");
        config.save_to(&path).unwrap();

        let reloaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_malformed_ini_is_rejected_with_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        fs::write(&path, "[unclosed\nbackend = memory\n").unwrap();

        let err = ConfigFile::load_from(&path).unwrap_err();
        match err {
            ConfigFileError::Malformed { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("expected malformed INI error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_value_surfaces_through_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        fs::write(&path, "[store]\nbackend =\n").unwrap();

        let err = ConfigFile::load_from(&path).unwrap_err();
        match err {
            ConfigFileError::InvalidValue { section, key, .. } => {
                assert_eq!(section, "store");
                assert_eq!(key, "backend");
            }
            other => panic!("expected invalid value error, got {:?}", other),
        }
    }

    #[test]
    fn test_log_directory_is_under_config_directory() {
        assert_eq!(log_directory(), config_directory().join("logs"));
    }
}
