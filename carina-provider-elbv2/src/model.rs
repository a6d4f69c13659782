//! Plain data types exchanged with the ELBv2 API
//!
//! These mirror the shapes of the Elastic Load Balancing v2 API without
//! depending on the SDK, so resources can be expanded, flattened and tested
//! against an in-memory implementation.

use std::collections::BTreeMap;

pub type Tags = BTreeMap<String, String>;
pub type Attributes = BTreeMap<String, String>;

// =============================================================================
// Load balancers
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubnetMapping {
    pub subnet_id: String,
    pub allocation_id: Option<String>,
    pub private_ipv4_address: Option<String>,
    pub ipv6_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadBalancerAddress {
    pub ip_address: Option<String>,
    pub allocation_id: Option<String>,
    pub private_ipv4_address: Option<String>,
    pub ipv6_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AvailabilityZone {
    pub zone_name: Option<String>,
    pub subnet_id: Option<String>,
    pub outpost_id: Option<String>,
    pub addresses: Vec<LoadBalancerAddress>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadBalancer {
    pub arn: String,
    pub name: String,
    pub dns_name: Option<String>,
    pub canonical_hosted_zone_id: Option<String>,
    /// internet-facing | internal
    pub scheme: Option<String>,
    /// application | network | gateway
    pub load_balancer_type: Option<String>,
    /// provisioning | active | active_impaired | failed
    pub state: Option<String>,
    pub state_reason: Option<String>,
    pub vpc_id: Option<String>,
    pub ip_address_type: Option<String>,
    pub security_groups: Vec<String>,
    pub availability_zones: Vec<AvailabilityZone>,
    pub customer_owned_ipv4_pool: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateLoadBalancerInput {
    pub name: String,
    pub load_balancer_type: Option<String>,
    pub scheme: Option<String>,
    pub subnets: Vec<String>,
    pub subnet_mappings: Vec<SubnetMapping>,
    pub security_groups: Vec<String>,
    pub ip_address_type: Option<String>,
    pub customer_owned_ipv4_pool: Option<String>,
    pub tags: Tags,
}

// =============================================================================
// Target groups
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matcher {
    pub http_code: Option<String>,
    pub grpc_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthCheck {
    pub enabled: Option<bool>,
    pub interval_seconds: Option<i32>,
    pub path: Option<String>,
    pub port: Option<String>,
    pub protocol: Option<String>,
    pub timeout_seconds: Option<i32>,
    pub healthy_threshold: Option<i32>,
    pub unhealthy_threshold: Option<i32>,
    pub matcher: Option<Matcher>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetGroup {
    pub arn: String,
    pub name: String,
    pub port: Option<i32>,
    pub protocol: Option<String>,
    pub protocol_version: Option<String>,
    pub vpc_id: Option<String>,
    pub target_type: Option<String>,
    pub ip_address_type: Option<String>,
    pub health_check: HealthCheck,
    pub load_balancer_arns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateTargetGroupInput {
    pub name: String,
    pub port: Option<i32>,
    pub protocol: Option<String>,
    pub protocol_version: Option<String>,
    pub vpc_id: Option<String>,
    pub target_type: Option<String>,
    pub ip_address_type: Option<String>,
    pub health_check: HealthCheck,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetDescription {
    pub id: String,
    pub port: Option<i32>,
    pub availability_zone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetHealth {
    pub target: TargetDescription,
    /// initial | healthy | unhealthy | unused | draining | unavailable
    pub state: Option<String>,
    pub reason: Option<String>,
}

// =============================================================================
// Listeners, rules and actions
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Certificate {
    pub arn: String,
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutualAuthentication {
    pub mode: Option<String>,
    pub trust_store_arn: Option<String>,
    pub ignore_client_certificate_expiry: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetGroupTuple {
    pub arn: String,
    pub weight: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForwardConfig {
    pub target_groups: Vec<TargetGroupTuple>,
    pub stickiness_enabled: Option<bool>,
    pub stickiness_duration: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RedirectConfig {
    pub host: Option<String>,
    pub path: Option<String>,
    pub port: Option<String>,
    pub protocol: Option<String>,
    pub query: Option<String>,
    /// HTTP_301 | HTTP_302
    pub status_code: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixedResponseConfig {
    pub content_type: Option<String>,
    pub message_body: Option<String>,
    pub status_code: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthenticateCognitoConfig {
    pub user_pool_arn: String,
    pub user_pool_client_id: String,
    pub user_pool_domain: String,
    pub authentication_request_extra_params: BTreeMap<String, String>,
    pub on_unauthenticated_request: Option<String>,
    pub scope: Option<String>,
    pub session_cookie_name: Option<String>,
    pub session_timeout: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthenticateOidcConfig {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub user_info_endpoint: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub authentication_request_extra_params: BTreeMap<String, String>,
    pub on_unauthenticated_request: Option<String>,
    pub scope: Option<String>,
    pub session_cookie_name: Option<String>,
    pub session_timeout: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Action {
    /// forward | redirect | fixed-response | authenticate-cognito | authenticate-oidc
    pub action_type: String,
    pub order: Option<i32>,
    pub target_group_arn: Option<String>,
    pub forward: Option<ForwardConfig>,
    pub redirect: Option<RedirectConfig>,
    pub fixed_response: Option<FixedResponseConfig>,
    pub authenticate_cognito: Option<AuthenticateCognitoConfig>,
    pub authenticate_oidc: Option<AuthenticateOidcConfig>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listener {
    pub arn: String,
    pub load_balancer_arn: String,
    pub port: Option<i32>,
    pub protocol: Option<String>,
    pub ssl_policy: Option<String>,
    pub certificates: Vec<Certificate>,
    pub default_actions: Vec<Action>,
    pub alpn_policy: Vec<String>,
    pub mutual_authentication: Option<MutualAuthentication>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateListenerInput {
    pub load_balancer_arn: String,
    pub port: Option<i32>,
    pub protocol: Option<String>,
    pub ssl_policy: Option<String>,
    pub certificates: Vec<Certificate>,
    pub default_actions: Vec<Action>,
    pub alpn_policy: Vec<String>,
    pub mutual_authentication: Option<MutualAuthentication>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModifyListenerInput {
    pub listener_arn: String,
    pub port: Option<i32>,
    pub protocol: Option<String>,
    pub ssl_policy: Option<String>,
    pub certificates: Vec<Certificate>,
    pub default_actions: Vec<Action>,
    pub alpn_policy: Vec<String>,
    pub mutual_authentication: Option<MutualAuthentication>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryStringPair {
    pub key: Option<String>,
    pub value: String,
}

/// One rule condition; exactly one of the fields is set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleCondition {
    pub host_header: Vec<String>,
    pub path_pattern: Vec<String>,
    pub http_header: Option<(String, Vec<String>)>,
    pub http_request_method: Vec<String>,
    pub query_string: Vec<QueryStringPair>,
    pub source_ip: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rule {
    pub arn: String,
    /// Numeric priority or "default"
    pub priority: String,
    pub conditions: Vec<RuleCondition>,
    pub actions: Vec<Action>,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateRuleInput {
    pub listener_arn: String,
    pub priority: i32,
    pub conditions: Vec<RuleCondition>,
    pub actions: Vec<Action>,
    pub tags: Tags,
}

// =============================================================================
// Trust stores
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct S3Location {
    pub bucket: String,
    pub key: String,
    pub object_version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrustStore {
    pub arn: String,
    pub name: String,
    /// CREATING | ACTIVE
    pub status: Option<String>,
    pub number_of_ca_certificates: Option<i32>,
    pub total_revoked_entries: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrustStoreRevocation {
    pub trust_store_arn: String,
    pub revocation_id: i64,
    pub revocation_type: Option<String>,
    pub number_of_revoked_entries: Option<i64>,
}
