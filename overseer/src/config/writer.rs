//! INI serialization logic for converting `ConfigFile` -> INI string.

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[modules]
; Directory scanned for module documents (*.toml)
path = {}

[minion]
; Human-readable minion name; the stable minion id derives from it,
; so renaming a minion gives it a fresh subtree in the store
name = {}

[store]
; Coordination store backend:
;   memory - in-process store, for local runs and tests
backend = {}

[logging]
; Log file path; the directory is created on startup
file = {}
"#,
        config.modules.path.display(),
        config.minion.name,
        config.store.backend,
        config.logging.file.display(),
    )
}
