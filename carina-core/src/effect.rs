//! Effect - A side effect described as a value
//!
//! Effects are produced by the differ and executed by the Interpreter.

use crate::resource::{Resource, ResourceId, State};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Read a data source
    Read { resource: Resource },
    /// Create a new resource
    Create(Resource),
    /// Update a resource in place
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Delete and re-create a resource (a force-new attribute changed)
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Delete a resource
    Delete { id: ResourceId, identifier: String },
}

impl Effect {
    /// Whether this effect changes infrastructure
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Effect::Read { .. })
    }

    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Effect::Read { resource } | Effect::Create(resource) => &resource.id,
            Effect::Update { id, .. } | Effect::Replace { id, .. } | Effect::Delete { id, .. } => {
                id
            }
        }
    }

    /// Short verb used in output ("Create", "Update", ...)
    pub fn kind(&self) -> &'static str {
        match self {
            Effect::Read { .. } => "Read",
            Effect::Create(_) => "Create",
            Effect::Update { .. } => "Update",
            Effect::Replace { .. } => "Replace",
            Effect::Delete { .. } => "Delete",
        }
    }
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind(), self.resource_id())
    }
}
