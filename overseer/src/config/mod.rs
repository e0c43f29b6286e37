//! Configuration for the overseer daemon and CLI.
//!
//! Settings live in `~/.overseer/config.ini`. Use [`ConfigFile::load`]
//! to read them (missing file yields defaults) and
//! [`ConfigFile::ensure_exists`] to create a commented default file.
//! CLI arguments override config file values when specified.
//!
//! Settings structs live in [`settings`], loading and saving in
//! `file`, INI mapping in `parser`/`writer`.

mod file;
mod parser;
mod settings;
mod writer;

pub use file::{config_directory, config_file_path, log_directory, ConfigFileError};
pub use settings::{
    ConfigFile, LoggingSettings, MinionSettings, ModulesSettings, StoreSettings,
    DEFAULT_MODULE_PATH, DEFAULT_STORE_BACKEND,
};
