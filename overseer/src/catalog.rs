//! Catalog engine.
//!
//! A catalog is the fully resolved, ordered set of resources derived
//! from a module path and a chosen main module. [`Catalog::load`]
//! performs the whole resolution pipeline and fails fast on any
//! construction error; [`Catalog::run`] walks the sorted resources and
//! drives each one toward its declared state.
//!
//! ```text
//! module path ──► modules ──► import graph ──► sorted modules
//!                                                   │
//!                              resource map ◄───────┘
//!                                    │
//!                       dependency graph ──► sorted resources ──► run
//! ```
//!
//! Construction errors abort the load; evaluation and actuation errors
//! never abort a run. The operator wants maximum progress per pass,
//! and failures are reported for the next one. A resource whose
//! dependency failed actuation is skipped, as are its own dependents.

use std::io::{self, Write};
use std::path::PathBuf;

use thiserror::Error;
use tracing::{error, info};

use crate::graph::{Graph, GraphError};
use crate::module::{self, ModuleError};
use crate::resource::{Registry, Resource, ResourceId};

/// Errors that can occur while loading or running a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Failed to write the run report.
    #[error("failed to write report: {0}")]
    Report(#[from] io::Error),
}

/// Settings for creating and processing a catalog.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Name of the main module to load.
    pub main: String,
    /// Directory containing the module documents.
    pub module_path: PathBuf,
    /// Report what would be done without taking any action.
    pub dry_run: bool,
}

impl CatalogConfig {
    pub fn new(main: impl Into<String>, module_path: impl Into<PathBuf>) -> Self {
        Self {
            main: main.into(),
            module_path: module_path.into(),
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Outcome counters of a catalog run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Resources that were actuated successfully.
    pub applied: usize,
    /// Resources already in their declared state.
    pub up_to_date: usize,
    /// Resources whose actuation failed.
    pub failed: usize,
    /// Resources skipped because a dependency failed.
    pub skipped: usize,
}

/// A loaded catalog: sorted modules and sorted resources.
pub struct Catalog {
    config: CatalogConfig,
    module_names: Vec<String>,
    resources: Vec<Box<dyn Resource>>,
    dependency_graph: Graph,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("config", &self.config)
            .field("module_names", &self.module_names)
            .field(
                "resources",
                &self
                    .resources
                    .iter()
                    .map(|r| r.resource_id())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Catalog {
    /// Resolves a catalog from the configured module path.
    ///
    /// Discovery, import resolution, module sorting, resource
    /// collection and dependency sorting all happen here; any failure
    /// aborts the load and no partial catalog is returned.
    pub fn load(config: CatalogConfig, registry: &Registry) -> Result<Self, CatalogError> {
        let mut modules = module::discover_and_load(&config.module_path, registry)?;

        let import_graph = module::import_graph_over(&config.main, &modules)?;
        let module_names = import_graph.sort()?;

        // Only modules reachable from main contribute resources, in
        // import order.
        let sorted_modules = module_names
            .iter()
            .filter_map(|name| modules.remove(name))
            .collect();

        let mut collection = module::resource_collection(sorted_modules)?;
        let dependency_graph = module::dependency_graph(&collection)?;
        let resource_ids = dependency_graph.sort()?;

        let resources = resource_ids
            .into_iter()
            .filter_map(|id| collection.remove(&ResourceId::from(id)))
            .collect();

        Ok(Self {
            config,
            module_names,
            resources,
            dependency_graph,
        })
    }

    /// Names of the loaded modules, in import order.
    pub fn module_names(&self) -> &[String] {
        &self.module_names
    }

    /// Number of resources in the catalog.
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Processes the catalog, one resource at a time in dependency
    /// order, writing a report line per observation to `out`.
    ///
    /// Evaluation and actuation errors are reported and the loop
    /// continues. When a resource's actuation fails, every resource
    /// that transitively depends on it is skipped for the rest of the
    /// run. With `dry_run` set, divergence is reported but no
    /// `create`/`delete`/`update` is invoked.
    pub fn run<W: Write>(&self, out: &mut W) -> Result<RunSummary, CatalogError> {
        writeln!(
            out,
            "Loaded {} resources from {} modules",
            self.resources.len(),
            self.module_names.len()
        )?;
        info!(
            resources = self.resources.len(),
            modules = self.module_names.len(),
            dry_run = self.config.dry_run,
            "catalog run starting"
        );

        let mut summary = RunSummary::default();
        let mut unusable: Vec<ResourceId> = Vec::new();

        for resource in &self.resources {
            let id = resource.resource_id();

            if let Some(dep) = self
                .dependency_graph
                .dependencies(id.as_str())
                .into_iter()
                .find(|dep| unusable.iter().any(|u| u.as_str() == dep.as_str()))
            {
                writeln!(out, "{} skipping, dependency {} failed", id, dep)?;
                unusable.push(id);
                summary.skipped += 1;
                continue;
            }

            let state = match resource.evaluate() {
                Ok(state) => state,
                Err(e) => {
                    writeln!(out, "{} {}", id, e)?;
                    error!(resource = %id, "evaluation failed: {}", e);
                    continue;
                }
            };

            let mut acted = false;
            let mut errored = false;

            if state.want == state.current {
                // Resource is in the desired life state.
            } else if state.want.is_up() && state.current.is_down() {
                writeln!(out, "{} is {}, should be {}", id, state.current, state.want)?;
                acted = true;
                if !self.config.dry_run {
                    if let Err(e) = resource.create() {
                        writeln!(out, "{} {}", id, e)?;
                        errored = true;
                    }
                }
            } else if state.want.is_down() && state.current.is_up() {
                writeln!(out, "{} is {}, should be {}", id, state.current, state.want)?;
                acted = true;
                if !self.config.dry_run {
                    if let Err(e) = resource.delete() {
                        writeln!(out, "{} {}", id, e)?;
                        errored = true;
                    }
                }
            } else {
                // Unknown or unexpected pair; no safe action exists.
                writeln!(
                    out,
                    "{} unknown state(s): want {}, current {}",
                    id, state.want, state.current
                )?;
                continue;
            }

            if state.update {
                writeln!(out, "{} resource is out of date, will be updated", id)?;
                acted = true;
                if !self.config.dry_run {
                    if let Err(e) = resource.update() {
                        writeln!(out, "{} {}", id, e)?;
                        errored = true;
                    }
                }
            }

            if errored {
                error!(resource = %id, "actuation failed");
                unusable.push(id);
                summary.failed += 1;
            } else if acted && !self.config.dry_run {
                summary.applied += 1;
            } else {
                summary.up_to_date += 1;
            }
        }

        info!(
            applied = summary.applied,
            up_to_date = summary.up_to_date,
            failed = summary.failed,
            skipped = summary.skipped,
            "catalog run finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{LifeState, ResourceError, State};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Scripted resource recording every capability call.
    struct ScriptedResource {
        id: ResourceId,
        after: Vec<ResourceId>,
        state: State,
        fail_create: bool,
        calls: Arc<Calls>,
    }

    #[derive(Default)]
    struct Calls {
        create: AtomicUsize,
        delete: AtomicUsize,
        update: AtomicUsize,
    }

    impl Resource for ScriptedResource {
        fn resource_id(&self) -> ResourceId {
            self.id.clone()
        }
        fn want_before(&self) -> &[ResourceId] {
            &[]
        }
        fn want_after(&self) -> &[ResourceId] {
            &self.after
        }
        fn evaluate(&self) -> Result<State, ResourceError> {
            Ok(self.state)
        }
        fn create(&self) -> Result<(), ResourceError> {
            self.calls.create.fetch_add(1, Ordering::SeqCst);
            if self.fail_create {
                Err(ResourceError::Provider("create refused".to_string()))
            } else {
                Ok(())
            }
        }
        fn delete(&self) -> Result<(), ResourceError> {
            self.calls.delete.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn update(&self) -> Result<(), ResourceError> {
            self.calls.update.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn scripted_registry(calls: Arc<Calls>) -> Registry {
        let mut registry = Registry::new();
        registry.register(
            "mock",
            Box::new(move |name, body| {
                let want = match body.get("state").and_then(|v| v.as_str()) {
                    Some("absent") => LifeState::Absent,
                    _ => LifeState::Present,
                };
                let current = match body.get("current").and_then(|v| v.as_str()) {
                    Some("present") => LifeState::Present,
                    Some("unknown") => LifeState::Unknown,
                    _ => LifeState::Absent,
                };
                let after = body
                    .get("after")
                    .and_then(|v| v.as_array())
                    .map(|a| {
                        a.iter()
                            .filter_map(|v| v.as_str())
                            .map(ResourceId::from)
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(Box::new(ScriptedResource {
                    id: ResourceId::new("mock", name),
                    after,
                    state: State {
                        want,
                        current,
                        update: body
                            .get("update")
                            .and_then(|v| v.as_bool())
                            .unwrap_or(false),
                    },
                    fail_create: body
                        .get("fail_create")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false),
                    calls: Arc::clone(&calls),
                }) as Box<dyn Resource>)
            }),
        );
        registry
    }

    fn write_module(dir: &TempDir, name: &str, body: &str) {
        fs::write(dir.path().join(format!("{}.toml", name)), body).unwrap();
    }

    fn load_catalog(dir: &TempDir, calls: &Arc<Calls>, dry_run: bool) -> Catalog {
        let registry = scripted_registry(Arc::clone(calls));
        let config = CatalogConfig::new("site", dir.path()).with_dry_run(dry_run);
        Catalog::load(config, &registry).unwrap()
    }

    #[test]
    fn test_load_orders_resources_by_dependency() {
        let dir = TempDir::new().unwrap();
        write_module(
            &dir,
            "site",
            r#"
[mock.A]
after = ["mock[B]"]

[mock.B]
after = ["mock[C]"]

[mock.C]
"#,
        );

        let calls = Arc::new(Calls::default());
        let catalog = load_catalog(&dir, &calls, false);
        assert_eq!(catalog.resource_count(), 3);

        let ids: Vec<ResourceId> = catalog.resources.iter().map(|r| r.resource_id()).collect();
        assert_eq!(
            ids,
            vec![
                ResourceId::from("mock[C]"),
                ResourceId::from("mock[B]"),
                ResourceId::from("mock[A]"),
            ]
        );
    }

    #[test]
    fn test_duplicate_resource_across_modules_fails_load() {
        let dir = TempDir::new().unwrap();
        write_module(
            &dir,
            "site",
            "[[import]]\nname = \"m1\"\npath = \"m1.toml\"\n\n[[import]]\nname = \"m2\"\npath = \"m2.toml\"\n",
        );
        write_module(&dir, "m1", "[mock.nginx]\n");
        write_module(&dir, "m2", "[mock.nginx]\n");

        let registry = scripted_registry(Arc::new(Calls::default()));
        let config = CatalogConfig::new("site", dir.path());
        let err = match Catalog::load(config, &registry) {
            Err(e) => e,
            Ok(_) => panic!("duplicate resource must fail the load"),
        };

        let message = err.to_string();
        assert!(message.contains("nginx"));
        assert!(message.contains("m1"));
        assert!(message.contains("m2"));
    }

    #[test]
    fn test_converged_resource_is_not_actuated() {
        let dir = TempDir::new().unwrap();
        write_module(&dir, "site", "[mock.done]\ncurrent = \"present\"\n");

        let calls = Arc::new(Calls::default());
        let catalog = load_catalog(&dir, &calls, false);
        let summary = catalog.run(&mut Vec::new()).unwrap();

        assert_eq!(summary.up_to_date, 1);
        assert_eq!(calls.create.load(Ordering::SeqCst), 0);
        assert_eq!(calls.delete.load(Ordering::SeqCst), 0);
        assert_eq!(calls.update.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_absent_resource_is_created() {
        let dir = TempDir::new().unwrap();
        write_module(&dir, "site", "[mock.web]\n");

        let calls = Arc::new(Calls::default());
        let catalog = load_catalog(&dir, &calls, false);
        let mut report = Vec::new();
        let summary = catalog.run(&mut report).unwrap();

        assert_eq!(summary.applied, 1);
        assert_eq!(calls.create.load(Ordering::SeqCst), 1);
        let report = String::from_utf8(report).unwrap();
        assert!(report.contains("mock[web] is absent, should be present"));
    }

    #[test]
    fn test_present_unwanted_resource_is_deleted() {
        let dir = TempDir::new().unwrap();
        write_module(
            &dir,
            "site",
            "[mock.old]\nstate = \"absent\"\ncurrent = \"present\"\n",
        );

        let calls = Arc::new(Calls::default());
        let catalog = load_catalog(&dir, &calls, false);
        catalog.run(&mut Vec::new()).unwrap();

        assert_eq!(calls.delete.load(Ordering::SeqCst), 1);
        assert_eq!(calls.create.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_update_called_when_out_of_date() {
        let dir = TempDir::new().unwrap();
        write_module(
            &dir,
            "site",
            "[mock.conf]\ncurrent = \"present\"\nupdate = true\n",
        );

        let calls = Arc::new(Calls::default());
        let catalog = load_catalog(&dir, &calls, false);
        let mut report = Vec::new();
        catalog.run(&mut report).unwrap();

        assert_eq!(calls.update.load(Ordering::SeqCst), 1);
        let report = String::from_utf8(report).unwrap();
        assert!(report.contains("mock[conf] resource is out of date, will be updated"));
    }

    #[test]
    fn test_unknown_state_is_reported_and_skipped() {
        let dir = TempDir::new().unwrap();
        write_module(
            &dir,
            "site",
            "[mock.weird]\nstate = \"absent\"\ncurrent = \"unknown\"\nupdate = true\n",
        );

        let calls = Arc::new(Calls::default());
        let catalog = load_catalog(&dir, &calls, false);
        let mut report = Vec::new();
        catalog.run(&mut report).unwrap();

        // want=absent, current=unknown: no actuation, and the update
        // branch is skipped too.
        assert_eq!(calls.delete.load(Ordering::SeqCst), 0);
        assert_eq!(calls.update.load(Ordering::SeqCst), 0);
        let report = String::from_utf8(report).unwrap();
        assert!(report.contains("mock[weird] unknown state(s): want absent, current unknown"));
    }

    #[test]
    fn test_dry_run_reports_without_actuating() {
        let dir = TempDir::new().unwrap();
        write_module(&dir, "site", "[mock.web]\n");

        let calls = Arc::new(Calls::default());
        let catalog = load_catalog(&dir, &calls, true);
        let mut report = Vec::new();
        let summary = catalog.run(&mut report).unwrap();

        assert_eq!(calls.create.load(Ordering::SeqCst), 0);
        assert_eq!(summary.applied, 0);
        let report = String::from_utf8(report).unwrap();
        let divergence_lines = report
            .lines()
            .filter(|l| l.contains("is absent, should be present"))
            .count();
        assert_eq!(divergence_lines, 1);
    }

    #[test]
    fn test_failed_dependency_skips_dependents() {
        let dir = TempDir::new().unwrap();
        write_module(
            &dir,
            "site",
            r#"
[mock.base]
fail_create = true

[mock.mid]
after = ["mock[base]"]

[mock.top]
after = ["mock[mid]"]

[mock.other]
"#,
        );

        let calls = Arc::new(Calls::default());
        let catalog = load_catalog(&dir, &calls, false);
        let mut report = Vec::new();
        let summary = catalog.run(&mut report).unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.applied, 1); // mock[other] is unaffected

        let report = String::from_utf8(report).unwrap();
        assert!(report.contains("mock[mid] skipping, dependency mock[base] failed"));
        assert!(report.contains("mock[top] skipping, dependency mock[mid] failed"));
        // Only base and other were ever actuated.
        assert_eq!(calls.create.load(Ordering::SeqCst), 2);
    }
}
