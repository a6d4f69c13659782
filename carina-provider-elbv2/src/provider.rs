//! ELBv2 provider: client construction and dispatch by resource type

use std::sync::Arc;
use std::time::Duration;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_elasticloadbalancingv2::Client;
use carina_core::provider::{ProviderError, ProviderResult};
use carina_core::resource::{Resource, ResourceId, State};
use carina_core::retry::RetryPolicy;

use crate::api::ElbV2Api;
use crate::config::{ProviderConfig, Timeouts};
use crate::data_sources;
use crate::resources::{
    listener, listener_rule, load_balancer, target_group, target_group_attachment,
    target_group_registration, trust_store, trust_store_revocation,
};
use crate::sdk::SdkApi;

/// Elastic Load Balancing v2 provider
pub struct Elbv2Provider {
    pub(crate) api: Arc<dyn ElbV2Api>,
    pub(crate) region: String,
    pub(crate) timeouts: Timeouts,
}

impl Elbv2Provider {
    /// Create a provider talking to the AWS API
    pub async fn new(config: &ProviderConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if let Some(endpoint_url) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        let sdk_config = loader.load().await;

        Self {
            api: Arc::new(SdkApi::new(Client::new(&sdk_config))),
            region: config.region.clone(),
            timeouts: config.timeouts,
        }
    }

    /// Create with a specific API implementation (for testing)
    pub fn with_api(api: Arc<dyn ElbV2Api>, region: impl Into<String>, timeouts: Timeouts) -> Self {
        Self {
            api,
            region: region.into(),
            timeouts,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Retry policy bounded by `timeout`
    pub(crate) fn policy(&self, timeout: Duration) -> RetryPolicy {
        RetryPolicy::new(timeout).with_interval(self.timeouts.retry_interval)
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    pub async fn read_resource(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> ProviderResult<State> {
        match id.resource_type.as_str() {
            load_balancer::TYPE => load_balancer::read(self, id, identifier).await,
            target_group::TYPE => target_group::read(self, id, identifier).await,
            listener::TYPE => listener::read(self, id, identifier).await,
            listener_rule::TYPE => listener_rule::read(self, id, identifier).await,
            target_group_attachment::TYPE => target_group_attachment::read(self, id, identifier).await,
            target_group_registration::TYPE => {
                target_group_registration::read(self, id, identifier).await
            }
            trust_store::TYPE => trust_store::read(self, id, identifier).await,
            trust_store_revocation::TYPE => trust_store_revocation::read(self, id, identifier).await,
            _ => Err(unknown_type(id)),
        }
    }

    pub async fn create_resource(&self, resource: &Resource) -> ProviderResult<State> {
        match resource.id.resource_type.as_str() {
            load_balancer::TYPE => load_balancer::create(self, resource).await,
            target_group::TYPE => target_group::create(self, resource).await,
            listener::TYPE => listener::create(self, resource).await,
            listener_rule::TYPE => listener_rule::create(self, resource).await,
            target_group_attachment::TYPE => target_group_attachment::create(self, resource).await,
            target_group_registration::TYPE => target_group_registration::create(self, resource).await,
            trust_store::TYPE => trust_store::create(self, resource).await,
            trust_store_revocation::TYPE => trust_store_revocation::create(self, resource).await,
            _ => Err(unknown_type(&resource.id)),
        }
    }

    pub async fn update_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        match id.resource_type.as_str() {
            load_balancer::TYPE => load_balancer::update(self, id, identifier, from, to).await,
            target_group::TYPE => target_group::update(self, id, identifier, from, to).await,
            listener::TYPE => listener::update(self, id, identifier, from, to).await,
            listener_rule::TYPE => listener_rule::update(self, id, identifier, from, to).await,
            target_group_attachment::TYPE => {
                // Every attribute forces replacement
                target_group_attachment::read(self, id, Some(identifier)).await
            }
            target_group_registration::TYPE => {
                target_group_registration::update(self, id, identifier, from, to).await
            }
            trust_store::TYPE => trust_store::update(self, id, identifier, from, to).await,
            trust_store_revocation::TYPE => {
                trust_store_revocation::read(self, id, Some(identifier)).await
            }
            _ => Err(unknown_type(id)),
        }
    }

    pub async fn delete_resource(&self, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
        match id.resource_type.as_str() {
            load_balancer::TYPE => load_balancer::delete(self, id, identifier).await,
            target_group::TYPE => target_group::delete(self, id, identifier).await,
            listener::TYPE => listener::delete(self, id, identifier).await,
            listener_rule::TYPE => listener_rule::delete(self, id, identifier).await,
            target_group_attachment::TYPE => target_group_attachment::delete(self, id, identifier).await,
            target_group_registration::TYPE => {
                target_group_registration::delete(self, id, identifier).await
            }
            trust_store::TYPE => trust_store::delete(self, id, identifier).await,
            trust_store_revocation::TYPE => trust_store_revocation::delete(self, id, identifier).await,
            _ => Err(unknown_type(id)),
        }
    }

    pub async fn lookup(&self, resource: &Resource) -> ProviderResult<State> {
        let id = &resource.id;
        let attrs = &resource.attributes;
        match id.resource_type.as_str() {
            "elbv2.load_balancer" => data_sources::load_balancer::read(self, id, attrs).await,
            "elbv2.listener" => data_sources::listener::read(self, id, attrs).await,
            "elbv2.target_group" => data_sources::target_group::read(self, id, attrs).await,
            "elbv2.trust_store" => data_sources::trust_store::read(self, id, attrs).await,
            "elbv2.hosted_zone_id" => data_sources::hosted_zone_id::read(self, id, attrs),
            _ => Err(ProviderError::unsupported(id, "data source")),
        }
    }
}

fn unknown_type(id: &ResourceId) -> ProviderError {
    ProviderError::unsupported(id, "resource")
}
