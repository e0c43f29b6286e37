//! INI parsing logic for converting `Ini` -> `ConfigFile`.
//!
//! The single place where INI key names are mapped to struct fields.

use std::path::PathBuf;

use ini::Ini;

use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found
/// in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some("modules")) {
        if let Some(v) = section.get("path") {
            let v = v.trim();
            if !v.is_empty() {
                config.modules.path = PathBuf::from(v);
            }
        }
    }

    if let Some(section) = ini.section(Some("minion")) {
        if let Some(v) = section.get("name") {
            let v = v.trim();
            if !v.is_empty() {
                config.minion.name = v.to_string();
            }
        }
    }

    if let Some(section) = ini.section(Some("store")) {
        if let Some(v) = section.get("backend") {
            let v = v.trim().to_lowercase();
            if v.is_empty() {
                return Err(ConfigFileError::InvalidValue {
                    section: "store".to_string(),
                    key: "backend".to_string(),
                    value: v,
                    reason: "backend name must not be empty".to_string(),
                });
            }
            config.store.backend = v;
        }
    }

    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = PathBuf::from(v);
            }
        }
    }

    Ok(config)
}
