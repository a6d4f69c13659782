//! State file structures for persisting infrastructure state

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use carina_core::resource::{ResourceId, State, Value};

/// The main state file structure that persists to the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State file format version
    pub version: u32,
    /// Monotonically increasing number for each state modification
    pub serial: u64,
    /// Unique identifier for this state lineage (prevents accidental overwrites)
    pub lineage: String,
    /// Version of Carina that last modified this state
    pub carina_version: String,
    pub resources: Vec<ResourceState>,
}

impl StateFile {
    /// Current state file format version
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            lineage: uuid::Uuid::new_v4().to_string(),
            carina_version: env!("CARGO_PKG_VERSION").to_string(),
            resources: Vec::new(),
        }
    }

    /// Increment serial and update carina version for a new state write
    pub fn increment_serial(&mut self) {
        self.serial += 1;
        self.carina_version = env!("CARGO_PKG_VERSION").to_string();
    }

    pub fn find_resource(&self, id: &ResourceId) -> Option<&ResourceState> {
        self.resources
            .iter()
            .find(|r| r.resource_type == id.resource_type && r.name == id.name)
    }

    /// Add or replace the entry of `resource`
    pub fn upsert_resource(&mut self, resource: ResourceState) {
        let id = resource.id();
        match self
            .resources
            .iter_mut()
            .find(|r| r.resource_type == id.resource_type && r.name == id.name)
        {
            Some(existing) => *existing = resource,
            None => self.resources.push(resource),
        }
    }

    pub fn remove_resource(&mut self, id: &ResourceId) -> Option<ResourceState> {
        let pos = self
            .resources
            .iter()
            .position(|r| r.resource_type == id.resource_type && r.name == id.name)?;
        Some(self.resources.remove(pos))
    }

    /// Record the outcome of an operation: existing states are upserted, gone ones removed
    pub fn record(&mut self, provider: &str, state: &State) {
        if state.exists {
            self.upsert_resource(ResourceState::from_state(provider, state));
        } else {
            self.remove_resource(&state.id);
        }
    }

    /// Managed resources as provider states, keyed by id
    pub fn states(&self) -> HashMap<ResourceId, State> {
        self.resources
            .iter()
            .map(|r| (r.id(), r.to_state()))
            .collect()
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

/// State of a single managed resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource type (e.g., "elbv2.load_balancer")
    pub resource_type: String,
    pub name: String,
    /// Provider name (e.g., "elbv2")
    pub provider: String,
    /// Provider-side identifier (the ARN for most resources)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// All attributes of the resource as JSON values
    pub attributes: HashMap<String, serde_json::Value>,
}

impl ResourceState {
    pub fn new(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            provider: provider.into(),
            identifier: None,
            attributes: HashMap::new(),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn id(&self) -> ResourceId {
        ResourceId::new(&self.resource_type, &self.name)
    }

    pub fn from_state(provider: &str, state: &State) -> Self {
        let mut resource = Self::new(&state.id.resource_type, &state.id.name, provider);
        resource.identifier = state.identifier.clone();
        resource.attributes = state
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        resource
    }

    pub fn to_state(&self) -> State {
        let attributes: HashMap<String, Value> = self
            .attributes
            .iter()
            .filter_map(|(k, v)| Some((k.clone(), Value::from_json(v)?)))
            .collect();
        let state = State::existing(self.id(), attributes);
        match &self.identifier {
            Some(identifier) => state.with_identifier(identifier),
            None => state,
        }
    }
}
