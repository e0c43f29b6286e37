//! Module documents and the module loader.
//!
//! A module is a named TOML document declaring imports and resources:
//!
//! ```toml
//! [[import]]
//! name = "nginx"
//! path = "nginx.toml"
//!
//! [file."/etc/motd"]
//! content = "managed by overseer\n"
//! ```
//!
//! Top-level `import` entries pull in sibling modules; every other
//! recognized top-level key is a resource kind whose entries dispatch
//! to the kind's registered provider. Unknown top-level keys are
//! collected for diagnostics rather than failing the parse.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::graph::{Graph, GraphError};
use crate::resource::{Registry, Resource, ResourceError, ResourceId};

/// Mapping from resource id to resource, unique across a module set.
pub type ResourceMap = BTreeMap<ResourceId, Box<dyn Resource>>;

/// Errors that can occur while loading modules and assembling their
/// graphs. All of them are fatal to catalog load.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Module document failed to parse; the underlying error carries
    /// line and column context.
    #[error("failed to parse module {module}: {source}")]
    Parse {
        module: String,
        #[source]
        source: Box<toml::de::Error>,
    },

    /// Module file could not be read.
    #[error("failed to read module {module}: {source}")]
    Io {
        module: String,
        #[source]
        source: io::Error,
    },

    /// A resource entry's body was not an attribute table.
    #[error("invalid resource declaration {key} in module {module}")]
    InvalidResource { module: String, key: String },

    /// The main module is not in the module path.
    #[error("module {0} not found in module path")]
    MainNotFound(String),

    /// An import names a module that is not in the module path.
    #[error("module {module} imports {import}, which is not in the module path")]
    UnknownImport { module: String, import: String },

    /// The same resource id was declared by two modules.
    #[error("duplicate resource {id} in {module}, previous declaration was in {previous}")]
    DuplicateResource {
        id: ResourceId,
        module: String,
        previous: String,
    },

    /// A resource wants a dependency that no module declares.
    #[error("resource {resource} wants {dependency}, which does not exist")]
    UnknownDependency {
        resource: ResourceId,
        dependency: ResourceId,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// An import declaration inside a module document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Import {
    /// Name of the imported module.
    pub name: String,
    /// Path to the module file, relative to the module path.
    pub path: String,
}

/// A named collection of resources and imports.
#[derive(Debug)]
pub struct Module {
    /// Module name, unique within the module path.
    pub name: String,
    /// Resources instantiated from the document.
    pub resources: Vec<Box<dyn Resource>>,
    /// Import declarations.
    pub imports: Vec<Import>,
    /// Top-level keys that are neither `import` nor a registered kind.
    pub unknown_keys: Vec<String>,
}

impl Module {
    /// Creates a new empty module.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            resources: Vec::new(),
            imports: Vec::new(),
            unknown_keys: Vec::new(),
        }
    }
}

/// Loads one module document.
///
/// Resource entries dispatch to the kind's provider from `registry`;
/// unknown top-level keys are collected and warned about, not fatal.
pub fn load(name: &str, input: &str, registry: &Registry) -> Result<Module, ModuleError> {
    let root: toml::Table = toml::from_str(input).map_err(|e| ModuleError::Parse {
        module: name.to_string(),
        source: Box::new(e),
    })?;

    let mut module = Module::new(name);

    for (key, value) in &root {
        if key == "import" {
            let imports =
                Vec::<Import>::deserialize(value.clone()).map_err(|e| ModuleError::Parse {
                    module: name.to_string(),
                    source: Box::new(e),
                })?;
            module.imports.extend(imports);
            continue;
        }

        let Some(provider) = registry.provider(key) else {
            module.unknown_keys.push(key.clone());
            continue;
        };

        let entries = value
            .as_table()
            .ok_or_else(|| ModuleError::InvalidResource {
                module: name.to_string(),
                key: key.clone(),
            })?;

        for (resource_name, body) in entries {
            let body = body.as_table().ok_or_else(|| ModuleError::InvalidResource {
                module: name.to_string(),
                key: format!("{}.{}", key, resource_name),
            })?;
            module.resources.push(provider(resource_name, body)?);
        }
    }

    if !module.unknown_keys.is_empty() {
        warn!(
            module = %module.name,
            keys = ?module.unknown_keys,
            "module contains unknown top-level keys"
        );
    }

    Ok(module)
}

/// Loads a module document from a file; the file stem becomes the
/// module name.
pub fn load_file(path: &Path, registry: &Registry) -> Result<Module, ModuleError> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());

    let input = fs::read_to_string(path).map_err(|e| ModuleError::Io {
        module: name.clone(),
        source: e,
    })?;

    load(&name, &input, registry)
}

/// Walks the module path and loads every `.toml` document found,
/// keyed by module name.
pub fn discover_and_load(
    path: &Path,
    registry: &Registry,
) -> Result<BTreeMap<String, Module>, ModuleError> {
    let mut modules = BTreeMap::new();

    let entries = fs::read_dir(path).map_err(|e| ModuleError::Io {
        module: path.to_string_lossy().into_owned(),
        source: e,
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ModuleError::Io {
            module: path.to_string_lossy().into_owned(),
            source: e,
        })?;
        let file_path = entry.path();
        if file_path.extension().and_then(|e| e.to_str()) != Some("toml") {
            continue;
        }

        let module = load_file(&file_path, registry)?;
        modules.insert(module.name.clone(), module);
    }

    Ok(modules)
}

/// Builds the import graph rooted at `main` over an already loaded
/// module set.
///
/// Every import edge `M -> X` reads "M depends on X". Modules are
/// visited recursively with a reentry guard, so shared imports are
/// added once and circular imports surface later, at sort time.
pub fn import_graph_over(
    main: &str,
    modules: &BTreeMap<String, Module>,
) -> Result<Graph, ModuleError> {
    if !modules.contains_key(main) {
        return Err(ModuleError::MainNotFound(main.to_string()));
    }

    fn visit(
        name: &str,
        modules: &BTreeMap<String, Module>,
        graph: &mut Graph,
    ) -> Result<(), ModuleError> {
        if graph.contains(name) {
            return Ok(());
        }
        graph.add_node(name);

        let module = &modules[name];
        for import in &module.imports {
            if !modules.contains_key(&import.name) {
                return Err(ModuleError::UnknownImport {
                    module: name.to_string(),
                    import: import.name.clone(),
                });
            }
            visit(&import.name, modules, graph)?;
            graph.add_edge(name, &import.name)?;
        }
        Ok(())
    }

    let mut graph = Graph::new();
    visit(main, modules, &mut graph)?;
    Ok(graph)
}

/// Discovers the module path and builds the import graph rooted at
/// `main`.
pub fn import_graph(main: &str, path: &Path, registry: &Registry) -> Result<Graph, ModuleError> {
    let modules = discover_and_load(path, registry)?;
    import_graph_over(main, &modules)
}

/// Writes the module import graph as a DOT document.
///
/// When the imports are circular, a second digraph of the residual
/// nodes follows, naming the modules that cause the cycle.
pub fn import_graph_as_dot<W: io::Write>(
    main: &str,
    path: &Path,
    registry: &Registry,
    w: &mut W,
) -> Result<(), ModuleError> {
    let graph = import_graph(main, path, registry)?;
    graph.as_dot("modules", w).map_err(|e| ModuleError::Io {
        module: main.to_string(),
        source: e,
    })?;

    if let Err(GraphError::CircularDependency { residual }) = graph.sort() {
        graph
            .residual_graph(&residual)
            .as_dot("modules_circular", w)
            .map_err(|e| ModuleError::Io {
                module: main.to_string(),
                source: e,
            })?;
    }

    Ok(())
}

/// Collects the unique resources of the given modules into one map.
///
/// A resource id declared by two modules is fatal; the error names
/// both declaring modules.
pub fn resource_collection(modules: Vec<Module>) -> Result<ResourceMap, ModuleError> {
    let mut declared_in: BTreeMap<ResourceId, String> = BTreeMap::new();
    let mut collection = ResourceMap::new();

    for module in modules {
        for resource in module.resources {
            let id = resource.resource_id();
            if let Some(previous) = declared_in.get(&id) {
                return Err(ModuleError::DuplicateResource {
                    id,
                    module: module.name,
                    previous: previous.clone(),
                });
            }
            declared_in.insert(id.clone(), module.name.clone());
            collection.insert(id, resource);
        }
    }

    Ok(collection)
}

/// Builds the dependency graph for a resource collection.
///
/// For every `after` target D of resource R the edge `R -> D` is added
/// (R runs after D); for every `before` target D the edge `D -> R` is
/// added (R runs before D). A target that is not in the collection is
/// fatal.
pub fn dependency_graph(resources: &ResourceMap) -> Result<Graph, ModuleError> {
    let mut graph = Graph::new();
    for id in resources.keys() {
        graph.add_node(id.as_str());
    }

    for (id, resource) in resources {
        for dep in resource.want_after() {
            if !resources.contains_key(dep) {
                return Err(ModuleError::UnknownDependency {
                    resource: id.clone(),
                    dependency: dep.clone(),
                });
            }
            graph.add_edge(id.as_str(), dep.as_str())?;
        }
        for dep in resource.want_before() {
            if !resources.contains_key(dep) {
                return Err(ModuleError::UnknownDependency {
                    resource: id.clone(),
                    dependency: dep.clone(),
                });
            }
            graph.add_edge(dep.as_str(), id.as_str())?;
        }
    }

    Ok(graph)
}
