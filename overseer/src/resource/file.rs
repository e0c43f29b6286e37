//! Built-in `file` resource.
//!
//! Manages a plain file on the local filesystem:
//!
//! ```toml
//! [file."/etc/motd"]
//! state = "present"
//! content = "managed by overseer\n"
//! ```
//!
//! The resource name doubles as the target path unless `path` is set
//! explicitly. Only the `present`/`absent` life states apply.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use super::{LifeState, Resource, ResourceError, ResourceId, State};

/// Declaration body of a `file` resource.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct FileAttrs {
    path: Option<PathBuf>,
    state: Option<LifeState>,
    content: Option<String>,
    before: Vec<String>,
    after: Vec<String>,
}

/// A file managed toward presence, absence or declared content.
pub struct FileResource {
    name: String,
    path: PathBuf,
    want: LifeState,
    content: Option<String>,
    before: Vec<ResourceId>,
    after: Vec<ResourceId>,
}

/// Provider for the `file` kind, registered under that name in
/// [`super::Registry::with_builtin`].
pub fn file_provider(name: &str, body: &toml::Table) -> Result<Box<dyn Resource>, ResourceError> {
    let attrs = FileAttrs::deserialize(toml::Value::Table(body.clone())).map_err(|e| {
        ResourceError::InvalidAttribute {
            resource: ResourceId::new("file", name).to_string(),
            reason: e.to_string(),
        }
    })?;

    let want = attrs.state.unwrap_or(LifeState::Present);
    if !matches!(want, LifeState::Present | LifeState::Absent) {
        return Err(ResourceError::InvalidAttribute {
            resource: ResourceId::new("file", name).to_string(),
            reason: format!("state must be present or absent, got {}", want),
        });
    }

    Ok(Box::new(FileResource {
        name: name.to_string(),
        path: attrs.path.unwrap_or_else(|| PathBuf::from(name)),
        want,
        content: attrs.content,
        before: attrs.before.into_iter().map(ResourceId::from).collect(),
        after: attrs.after.into_iter().map(ResourceId::from).collect(),
    }))
}

impl Resource for FileResource {
    fn resource_id(&self) -> ResourceId {
        ResourceId::new("file", &self.name)
    }

    fn want_before(&self) -> &[ResourceId] {
        &self.before
    }

    fn want_after(&self) -> &[ResourceId] {
        &self.after
    }

    fn evaluate(&self) -> Result<State, ResourceError> {
        let exists = self.path.is_file();
        let current = if exists {
            LifeState::Present
        } else {
            LifeState::Absent
        };

        // Content divergence only matters for a file that should and
        // does exist.
        let update = match (&self.content, self.want, exists) {
            (Some(want_content), LifeState::Present, true) => {
                fs::read_to_string(&self.path)? != *want_content
            }
            _ => false,
        };

        Ok(State {
            want: self.want,
            current,
            update,
        })
    }

    fn create(&self) -> Result<(), ResourceError> {
        fs::write(&self.path, self.content.as_deref().unwrap_or(""))?;
        Ok(())
    }

    fn delete(&self) -> Result<(), ResourceError> {
        fs::remove_file(&self.path)?;
        Ok(())
    }

    fn update(&self) -> Result<(), ResourceError> {
        fs::write(&self.path, self.content.as_deref().unwrap_or(""))?;
        Ok(())
    }
}
