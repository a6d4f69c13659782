//! ELBv2 API abstraction
//!
//! Resources talk to Elastic Load Balancing through [`ElbV2Api`]. The
//! production implementation is [`crate::sdk::SdkApi`]; tests use an
//! in-memory implementation.

use async_trait::async_trait;

use crate::model::{
    Action, Attributes, CreateListenerInput, CreateLoadBalancerInput, CreateRuleInput,
    CreateTargetGroupInput, HealthCheck, Listener, LoadBalancer, ModifyListenerInput, Rule,
    RuleCondition, S3Location, SubnetMapping, Tags, TargetDescription, TargetGroup, TargetHealth,
    TrustStore, TrustStoreRevocation,
};

/// Error codes returned by the ELBv2 API that the provider reacts to
pub mod codes {
    pub const LOAD_BALANCER_NOT_FOUND: &str = "LoadBalancerNotFound";
    pub const LISTENER_NOT_FOUND: &str = "ListenerNotFound";
    pub const RULE_NOT_FOUND: &str = "RuleNotFound";
    pub const TARGET_GROUP_NOT_FOUND: &str = "TargetGroupNotFound";
    pub const TRUST_STORE_NOT_FOUND: &str = "TrustStoreNotFound";
    pub const REVOCATION_ID_NOT_FOUND: &str = "RevocationIdNotFound";
    pub const CERTIFICATE_NOT_FOUND: &str = "CertificateNotFound";
    pub const PRIORITY_IN_USE: &str = "PriorityInUse";
    pub const INVALID_TARGET: &str = "InvalidTarget";
    pub const RESOURCE_IN_USE: &str = "ResourceInUse";
    pub const TRUST_STORE_IN_USE: &str = "TrustStoreInUse";
    pub const DUPLICATE_TARGET_GROUP_NAME: &str = "DuplicateTargetGroupName";
    pub const VALIDATION_ERROR: &str = "ValidationError";
    pub const OPERATION_NOT_PERMITTED: &str = "OperationNotPermitted";
}

/// Error reported by the ELBv2 API
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }

    /// True for every "<object> not found" error code
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.code.as_str(),
            codes::LOAD_BALANCER_NOT_FOUND
                | codes::LISTENER_NOT_FOUND
                | codes::RULE_NOT_FOUND
                | codes::TARGET_GROUP_NOT_FOUND
                | codes::TRUST_STORE_NOT_FOUND
                | codes::REVOCATION_ID_NOT_FOUND
        )
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Which objects a describe call should return
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Everything in the region
    All,
    Arns(Vec<String>),
    Names(Vec<String>),
    /// Children of a parent object (listeners of a load balancer, rules of a listener,
    /// target groups of a load balancer)
    Parent(String),
}

impl Lookup {
    pub fn arn(arn: &str) -> Self {
        Lookup::Arns(vec![arn.to_string()])
    }

    pub fn name(name: &str) -> Self {
        Lookup::Names(vec![name.to_string()])
    }
}

#[async_trait]
pub trait ElbV2Api: Send + Sync {
    // Load balancers
    async fn create_load_balancer(&self, input: CreateLoadBalancerInput) -> ApiResult<LoadBalancer>;
    async fn describe_load_balancers(&self, lookup: Lookup) -> ApiResult<Vec<LoadBalancer>>;
    async fn delete_load_balancer(&self, arn: &str) -> ApiResult<()>;
    async fn set_security_groups(&self, arn: &str, security_groups: &[String]) -> ApiResult<()>;
    async fn set_subnets(
        &self,
        arn: &str,
        subnets: &[String],
        subnet_mappings: &[SubnetMapping],
    ) -> ApiResult<()>;
    async fn set_ip_address_type(&self, arn: &str, ip_address_type: &str) -> ApiResult<()>;
    async fn describe_load_balancer_attributes(&self, arn: &str) -> ApiResult<Attributes>;
    async fn modify_load_balancer_attributes(
        &self,
        arn: &str,
        attributes: &Attributes,
    ) -> ApiResult<()>;

    // Target groups
    async fn create_target_group(&self, input: CreateTargetGroupInput) -> ApiResult<TargetGroup>;
    async fn describe_target_groups(&self, lookup: Lookup) -> ApiResult<Vec<TargetGroup>>;
    async fn modify_target_group(
        &self,
        arn: &str,
        health_check: &HealthCheck,
    ) -> ApiResult<TargetGroup>;
    async fn delete_target_group(&self, arn: &str) -> ApiResult<()>;
    async fn describe_target_group_attributes(&self, arn: &str) -> ApiResult<Attributes>;
    async fn modify_target_group_attributes(
        &self,
        arn: &str,
        attributes: &Attributes,
    ) -> ApiResult<()>;
    async fn register_targets(&self, arn: &str, targets: &[TargetDescription]) -> ApiResult<()>;
    async fn deregister_targets(&self, arn: &str, targets: &[TargetDescription]) -> ApiResult<()>;
    /// Health of the given targets, or of every registered target when `targets` is empty
    async fn describe_target_health(
        &self,
        arn: &str,
        targets: &[TargetDescription],
    ) -> ApiResult<Vec<TargetHealth>>;

    // Listeners
    async fn create_listener(&self, input: CreateListenerInput) -> ApiResult<Listener>;
    async fn describe_listeners(&self, lookup: Lookup) -> ApiResult<Vec<Listener>>;
    async fn modify_listener(&self, input: ModifyListenerInput) -> ApiResult<Listener>;
    async fn delete_listener(&self, arn: &str) -> ApiResult<()>;
    async fn describe_listener_attributes(&self, arn: &str) -> ApiResult<Attributes>;
    async fn modify_listener_attributes(&self, arn: &str, attributes: &Attributes)
    -> ApiResult<()>;

    // Listener rules
    async fn create_rule(&self, input: CreateRuleInput) -> ApiResult<Rule>;
    async fn describe_rules(&self, lookup: Lookup) -> ApiResult<Vec<Rule>>;
    async fn modify_rule(
        &self,
        arn: &str,
        conditions: &[RuleCondition],
        actions: &[Action],
    ) -> ApiResult<Rule>;
    async fn set_rule_priority(&self, arn: &str, priority: i32) -> ApiResult<()>;
    async fn delete_rule(&self, arn: &str) -> ApiResult<()>;

    // Trust stores
    async fn create_trust_store(
        &self,
        name: &str,
        bundle: &S3Location,
        tags: &Tags,
    ) -> ApiResult<TrustStore>;
    async fn describe_trust_stores(&self, lookup: Lookup) -> ApiResult<Vec<TrustStore>>;
    async fn modify_trust_store(&self, arn: &str, bundle: &S3Location) -> ApiResult<()>;
    async fn delete_trust_store(&self, arn: &str) -> ApiResult<()>;
    async fn add_trust_store_revocation(
        &self,
        arn: &str,
        revocations: &S3Location,
    ) -> ApiResult<TrustStoreRevocation>;
    async fn describe_trust_store_revocations(
        &self,
        arn: &str,
        revocation_ids: &[i64],
    ) -> ApiResult<Vec<TrustStoreRevocation>>;
    async fn remove_trust_store_revocations(
        &self,
        arn: &str,
        revocation_ids: &[i64],
    ) -> ApiResult<()>;

    // Tags
    async fn describe_tags(&self, arn: &str) -> ApiResult<Tags>;
    async fn add_tags(&self, arn: &str, tags: &Tags) -> ApiResult<()>;
    async fn remove_tags(&self, arn: &str, keys: &[String]) -> ApiResult<()>;
}
