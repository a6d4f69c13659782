//! Configuration file: provider settings, state backend, data sources and resources
//!
//! ```json
//! {
//!   "provider": { "region": "us-east-1" },
//!   "data": [{ "type": "load_balancer", "name": "shared", "attributes": { "name": "shared" } }],
//!   "resources": [
//!     { "type": "listener", "name": "http",
//!       "attributes": { "load_balancer_arn": "${shared.arn}", "port": 80 } }
//!   ]
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;

use carina_core::resolver::dependencies;
use carina_core::resource::{Resource, Value};
use carina_core::schema::ResourceSchema;
use carina_provider_elbv2::ProviderConfig;
use carina_provider_elbv2::schemas::{data_source_schemas, resource_schemas};
use carina_state::BackendConfig;

const TYPE_PREFIX: &str = "elbv2.";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub data: Vec<Block>,
    #[serde(default)]
    pub resources: Vec<Block>,
}

/// One `data` or `resources` entry
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Block {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl Block {
    fn to_resource(&self, read_only: bool) -> Resource {
        let mut resource = Resource::new(qualified_type(&self.resource_type), &self.name)
            .with_read_only(read_only);
        for (key, value) in &self.attributes {
            if let Some(value) = Value::from_json(value) {
                resource.attributes.insert(key.clone(), value);
            }
        }
        resource
            .attributes
            .insert("_binding".to_string(), Value::String(self.name.clone()));
        resource
    }
}

/// `load_balancer` and `elbv2.load_balancer` name the same type
pub fn qualified_type(resource_type: &str) -> String {
    if resource_type.starts_with(TYPE_PREFIX) {
        resource_type.to_string()
    } else {
        format!("{}{}", TYPE_PREFIX, resource_type)
    }
}

/// A parsed and validated configuration
#[derive(Debug)]
pub struct Loaded {
    pub provider: ProviderConfig,
    pub backend: BackendConfig,
    /// Data sources followed by resources, with defaults applied
    pub resources: Vec<Resource>,
}

impl Loaded {
    pub fn data_sources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(|r| r.is_data_source())
    }

    pub fn managed(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(|r| !r.is_data_source())
    }
}

pub fn resource_schema_map() -> HashMap<String, ResourceSchema> {
    resource_schemas()
        .into_iter()
        .map(|s| (s.resource_type.clone(), s))
        .collect()
}

pub fn data_source_schema_map() -> HashMap<String, ResourceSchema> {
    data_source_schemas()
        .into_iter()
        .map(|s| (s.resource_type.clone(), s))
        .collect()
}

pub fn load(path: &Path) -> Result<Loaded, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    parse(&content).map_err(|e| format!("{}: {}", path.display(), e))
}

pub fn parse(content: &str) -> Result<Loaded, String> {
    let config: Configuration =
        serde_json::from_str(content).map_err(|e| format!("Parse error: {}", e))?;

    let mut resources: Vec<Resource> = config
        .data
        .iter()
        .map(|b| b.to_resource(true))
        .chain(config.resources.iter().map(|b| b.to_resource(false)))
        .collect();

    check(&mut resources)?;

    Ok(Loaded {
        provider: config.provider,
        backend: config.backend,
        resources,
    })
}

/// Validate every entry against its schema and fill in defaults.
/// All problems are reported at once.
fn check(resources: &mut [Resource]) -> Result<(), String> {
    let resource_schemas = resource_schema_map();
    let data_schemas = data_source_schema_map();
    let mut errors = Vec::new();

    let mut bindings = HashSet::new();
    for resource in resources.iter() {
        if !bindings.insert(resource.id.name.clone()) {
            errors.push(format!("{}: name '{}' is used twice", resource.id, resource.id.name));
        }
    }

    for resource in resources.iter_mut() {
        let schemas = if resource.is_data_source() {
            &data_schemas
        } else {
            &resource_schemas
        };
        let Some(schema) = schemas.get(&resource.id.resource_type) else {
            let kind = if resource.is_data_source() {
                "data source"
            } else {
                "resource"
            };
            errors.push(format!("{}: unknown {} type", resource.id, kind));
            continue;
        };

        match schema.validate(&resource.attributes) {
            Ok(()) => schema.apply_defaults(&mut resource.attributes),
            Err(type_errors) => {
                errors.extend(type_errors.iter().map(|e| format!("{}: {}", resource.id, e)));
            }
        }

        let mut missing: Vec<String> = dependencies(resource)
            .into_iter()
            .filter(|b| !bindings.contains(b))
            .collect();
        missing.sort();
        for binding in missing {
            errors.push(format!("{}: reference to unknown name '{}'", resource.id, binding));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("\n"))
    }
}
