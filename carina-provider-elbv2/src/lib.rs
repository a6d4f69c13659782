//! Carina ELBv2 Provider
//!
//! Elastic Load Balancing v2 provider: application, network and gateway load
//! balancers with their listeners, rules, target groups and trust stores.
//!
//! ## Module Structure
//!
//! - `api` - The ELBv2 API surface the resources are written against
//! - `sdk` - `api` implemented with the AWS SDK
//! - `resources` - Resource type definitions and CRUD operations
//! - `data_sources` - Read-only lookups
//! - `schemas` - Resource and data source schemas
//! - `provider` - Elbv2Provider implementation

pub mod api;
pub mod arn;
pub mod attributes;
pub mod config;
pub mod data_sources;
pub mod model;
pub mod naming;
pub mod provider;
pub mod resources;
pub mod schemas;
pub mod sdk;
pub mod tags;
pub mod utils;

#[cfg(test)]
mod testing;

// Re-export main types
pub use config::{ProviderConfig, Timeouts};
pub use provider::Elbv2Provider;

use carina_core::provider::{BoxFuture, Provider, ProviderResult};
use carina_core::resource::{Resource, ResourceId, State};
use carina_core::schema::ResourceSchema;

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl Provider for Elbv2Provider {
    fn name(&self) -> &'static str {
        "elbv2"
    }

    fn schemas(&self) -> Vec<ResourceSchema> {
        schemas::resource_schemas()
    }

    fn data_source_schemas(&self) -> Vec<ResourceSchema> {
        schemas::data_source_schemas()
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(|s| s.to_string());
        Box::pin(async move { self.read_resource(&id, identifier.as_deref()).await })
    }

    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.lookup(&resource).await })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.create_resource(&resource).await })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move { self.update_resource(&id, &identifier, &from, &to).await })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move { self.delete_resource(&id, &identifier).await })
    }
}
