//! Overseer - declarative configuration management
//!
//! This library provides the two core subsystems of the overseer
//! orchestrator:
//!
//! - The **catalog engine** ([`catalog`], [`module`], [`resource`],
//!   [`graph`]): discovers declarative modules, resolves their import
//!   graph, collects resources, orders them by dependency and drives
//!   each one toward its declared state.
//! - The **minion runtime** ([`minion`], [`kv`]): a long-running worker
//!   that registers itself in a coordination store, consumes command
//!   tasks from its queue subtree and persists the results.
//!
//! # High-Level API
//!
//! ```ignore
//! use overseer::catalog::{Catalog, CatalogConfig};
//! use overseer::resource::Registry;
//!
//! let registry = Registry::with_builtin();
//! let config = CatalogConfig::new("site", "/etc/overseer/modules");
//! let catalog = Catalog::load(config, &registry)?;
//! let summary = catalog.run(&mut std::io::stdout())?;
//! ```

pub mod catalog;
pub mod config;
pub mod graph;
pub mod kv;
pub mod logging;
pub mod minion;
pub mod module;
pub mod resource;

/// Version of the overseer library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
