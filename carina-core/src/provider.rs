//! Provider - The boundary between planning and a cloud API
//!
//! The interpreter only talks to infrastructure through [`Provider`]: reads by
//! provider-side identifier, data source lookups, and the create/update/delete
//! calls each effect turns into. A provider also publishes the schemas of the
//! types it handles.

use std::future::Future;
use std::pin::Pin;

use crate::resource::{Resource, ResourceId, State};
use crate::schema::ResourceSchema;

/// Error returned by a provider operation
///
/// Displays as `[type.name] message` when it belongs to a resource.
#[derive(Debug, thiserror::Error)]
#[error("{}{message}", .resource_id.as_ref().map(|id| format!("[{}] ", id)).unwrap_or_default())]
pub struct ProviderError {
    pub message: String,
    pub resource_id: Option<ResourceId>,
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            resource_id: None,
            cause: None,
        }
    }

    /// The provider has no resource or data source of this type
    pub fn unsupported(id: &ResourceId, kind: &str) -> Self {
        Self::new(format!("Unknown {} type: {}", kind, id.resource_type)).for_resource(id.clone())
    }

    pub fn for_resource(mut self, id: ResourceId) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Main Provider trait
///
/// Each infrastructure provider implements this trait.
/// All operations are async and involve side effects.
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "elbv2")
    fn name(&self) -> &'static str;

    /// Schemas of the managed resource types
    fn schemas(&self) -> Vec<ResourceSchema>;

    /// Schemas of the read-only data source types
    fn data_source_schemas(&self) -> Vec<ResourceSchema>;

    /// Whether `resource` names a type this provider knows
    fn supports(&self, resource: &Resource) -> bool {
        let schemas = if resource.is_data_source() {
            self.data_source_schemas()
        } else {
            self.schemas()
        };
        schemas.iter().any(|s| s.resource_type == resource.id.resource_type)
    }

    /// Get the current state of a resource
    ///
    /// The identifier is the one returned by `create` (usually an ARN).
    /// Returns `State::not_found()` if the resource does not exist or no
    /// identifier is known yet.
    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Look up an existing object matching the data source's arguments
    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>>;

    /// Create a resource
    ///
    /// Returns State with identifier set to the provider-side ID (e.g., an ARN)
    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>>;

    /// Update a resource in place
    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Delete a resource
    ///
    /// Deleting a resource that no longer exists succeeds
    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>>;
}

/// Lets a `Box<dyn Provider>` drive the interpreter
impl Provider for Box<dyn Provider> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn schemas(&self) -> Vec<ResourceSchema> {
        (**self).schemas()
    }

    fn data_source_schemas(&self) -> Vec<ResourceSchema> {
        (**self).data_source_schemas()
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).read(id, identifier)
    }

    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).read_data_source(resource)
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).create(resource)
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).update(id, identifier, from, to)
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        (**self).delete(id, identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Value;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Keeps created objects in memory, keyed by a generated ARN
    #[derive(Default)]
    struct InMemory {
        objects: Mutex<HashMap<String, State>>,
    }

    impl Provider for InMemory {
        fn name(&self) -> &'static str {
            "memory"
        }

        fn schemas(&self) -> Vec<ResourceSchema> {
            vec![ResourceSchema::new("test.target_group")]
        }

        fn data_source_schemas(&self) -> Vec<ResourceSchema> {
            vec![]
        }

        fn read(
            &self,
            id: &ResourceId,
            identifier: Option<&str>,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let found = identifier.and_then(|arn| self.objects.lock().unwrap().get(arn).cloned());
            let id = id.clone();
            Box::pin(async move { Ok(found.unwrap_or_else(|| State::not_found(id))) })
        }

        fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            let id = resource.id.clone();
            Box::pin(async move {
                Err(ProviderError::new("no matching object found").for_resource(id))
            })
        }

        fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            let arn = format!("arn:test:{}", resource.id.name);
            let state = State::existing(resource.id.clone(), resource.attributes.clone())
                .with_identifier(&arn);
            self.objects.lock().unwrap().insert(arn, state.clone());
            Box::pin(async move { Ok(state) })
        }

        fn update(
            &self,
            id: &ResourceId,
            identifier: &str,
            _from: &State,
            to: &Resource,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let state = State::existing(id.clone(), to.attributes.clone()).with_identifier(identifier);
            self.objects
                .lock()
                .unwrap()
                .insert(identifier.to_string(), state.clone());
            Box::pin(async move { Ok(state) })
        }

        fn delete(&self, _id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
            self.objects.lock().unwrap().remove(identifier);
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn unknown_identifier_reads_as_not_found() {
        let provider = InMemory::default();
        let id = ResourceId::new("test.target_group", "web");
        assert!(!provider.read(&id, None).await.unwrap().exists);
        assert!(!provider.read(&id, Some("arn:test:other")).await.unwrap().exists);
    }

    #[tokio::test]
    async fn boxed_provider_delegates() {
        let provider: Box<dyn Provider> = Box::new(InMemory::default());
        let resource = Resource::new("test.target_group", "web")
            .with_attribute("port", Value::Int(80));

        let created = provider.create(&resource).await.unwrap();
        let arn = created.identifier.clone().unwrap();
        assert_eq!(arn, "arn:test:web");

        let changed = Resource::new("test.target_group", "web").with_attribute("port", Value::Int(81));
        provider.update(&resource.id, &arn, &created, &changed).await.unwrap();
        let read = provider.read(&resource.id, Some(&arn)).await.unwrap();
        assert_eq!(read.attributes.get("port"), Some(&Value::Int(81)));

        provider.delete(&resource.id, &arn).await.unwrap();
        assert!(!provider.read(&resource.id, Some(&arn)).await.unwrap().exists);
        assert_eq!(provider.name(), "memory");
    }

    #[tokio::test]
    async fn supports_checks_the_matching_schema_list() {
        let provider: Box<dyn Provider> = Box::new(InMemory::default());
        let managed = Resource::new("test.target_group", "web");
        let lookup = Resource::new("test.target_group", "shared").with_read_only(true);

        assert!(provider.supports(&managed));
        assert!(!provider.supports(&lookup));
        let err = provider.read_data_source(&lookup).await.unwrap_err();
        assert_eq!(err.to_string(), "[test.target_group.shared] no matching object found");
    }

    #[test]
    fn errors_name_their_resource() {
        let id = ResourceId::new("elbv2.nope", "x");
        let err = ProviderError::unsupported(&id, "resource");
        assert_eq!(err.to_string(), "[elbv2.nope.x] Unknown resource type: elbv2.nope");

        let cause = std::io::Error::other("connection reset");
        let err = ProviderError::new("describing load balancers").with_cause(cause);
        assert_eq!(err.to_string(), "describing load balancers");
        assert!(std::error::Error::source(&err).is_some());
    }
}
