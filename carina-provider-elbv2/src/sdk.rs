//! [`ElbV2Api`] backed by the AWS SDK
//!
//! Converts between the plain model types and the SDK shapes, follows
//! `NextMarker` pagination on describe calls and maps SDK errors to
//! [`ApiError`] by their service error code.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;

use async_trait::async_trait;
use aws_sdk_elasticloadbalancingv2::Client;
use aws_sdk_elasticloadbalancingv2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_elasticloadbalancingv2::types as sdk;

use crate::api::{ApiError, ApiResult, ElbV2Api, Lookup, codes};
use crate::model::{
    Action, Attributes, AuthenticateCognitoConfig, AuthenticateOidcConfig, AvailabilityZone,
    Certificate, CreateListenerInput, CreateLoadBalancerInput, CreateRuleInput,
    CreateTargetGroupInput, FixedResponseConfig, ForwardConfig, HealthCheck, Listener,
    LoadBalancer, LoadBalancerAddress, Matcher, ModifyListenerInput, MutualAuthentication,
    QueryStringPair, RedirectConfig, Rule, RuleCondition, S3Location, SubnetMapping, Tags,
    TargetDescription, TargetGroup, TargetGroupTuple, TargetHealth, TrustStore,
    TrustStoreRevocation,
};

/// ELBv2 API client
pub struct SdkApi {
    client: Client,
}

impl SdkApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

// =============================================================================
// Errors
// =============================================================================

fn sdk_error<E, R>(err: SdkError<E, R>) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: Debug,
{
    let code = err.code().unwrap_or("Unknown").to_string();
    let message = match err.message() {
        Some(message) => message.to_string(),
        None => DisplayErrorContext(&err).to_string(),
    };
    ApiError::new(code, message)
}

fn empty_response(what: &str) -> ApiError {
    ApiError::new("EmptyResponse", format!("response contained no {}", what))
}

fn owned(s: Option<&str>) -> Option<String> {
    s.map(str::to_string)
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

// =============================================================================
// Conversions
// =============================================================================

fn to_sdk_tags(tags: &Tags) -> Option<Vec<sdk::Tag>> {
    non_empty(
        tags.iter()
            .map(|(k, v)| sdk::Tag::builder().key(k).value(v).build())
            .collect(),
    )
}

fn to_sdk_subnet_mapping(m: &SubnetMapping) -> sdk::SubnetMapping {
    sdk::SubnetMapping::builder()
        .subnet_id(&m.subnet_id)
        .set_allocation_id(m.allocation_id.clone())
        .set_private_ipv4_address(m.private_ipv4_address.clone())
        .set_ipv6_address(m.ipv6_address.clone())
        .build()
}

fn from_sdk_load_balancer(lb: &sdk::LoadBalancer) -> LoadBalancer {
    LoadBalancer {
        arn: lb.load_balancer_arn().unwrap_or_default().to_string(),
        name: lb.load_balancer_name().unwrap_or_default().to_string(),
        dns_name: owned(lb.dns_name()),
        canonical_hosted_zone_id: owned(lb.canonical_hosted_zone_id()),
        scheme: lb.scheme().map(|s| s.as_str().to_string()),
        load_balancer_type: lb.r#type().map(|t| t.as_str().to_string()),
        state: lb
            .state()
            .and_then(|s| s.code())
            .map(|c| c.as_str().to_string()),
        state_reason: lb.state().and_then(|s| owned(s.reason())),
        vpc_id: owned(lb.vpc_id()),
        ip_address_type: lb.ip_address_type().map(|t| t.as_str().to_string()),
        security_groups: lb.security_groups().to_vec(),
        availability_zones: lb
            .availability_zones()
            .iter()
            .map(|az| AvailabilityZone {
                zone_name: owned(az.zone_name()),
                subnet_id: owned(az.subnet_id()),
                outpost_id: owned(az.outpost_id()),
                addresses: az
                    .load_balancer_addresses()
                    .iter()
                    .map(|a| LoadBalancerAddress {
                        ip_address: owned(a.ip_address()),
                        allocation_id: owned(a.allocation_id()),
                        private_ipv4_address: owned(a.private_ipv4_address()),
                        ipv6_address: owned(a.ipv6_address()),
                    })
                    .collect(),
            })
            .collect(),
        customer_owned_ipv4_pool: owned(lb.customer_owned_ipv4_pool()),
    }
}

fn from_sdk_target_group(tg: &sdk::TargetGroup) -> TargetGroup {
    TargetGroup {
        arn: tg.target_group_arn().unwrap_or_default().to_string(),
        name: tg.target_group_name().unwrap_or_default().to_string(),
        port: tg.port(),
        protocol: tg.protocol().map(|p| p.as_str().to_string()),
        protocol_version: owned(tg.protocol_version()),
        vpc_id: owned(tg.vpc_id()),
        target_type: tg.target_type().map(|t| t.as_str().to_string()),
        ip_address_type: tg.ip_address_type().map(|t| t.as_str().to_string()),
        health_check: HealthCheck {
            enabled: tg.health_check_enabled(),
            interval_seconds: tg.health_check_interval_seconds(),
            path: owned(tg.health_check_path()),
            port: owned(tg.health_check_port()),
            protocol: tg.health_check_protocol().map(|p| p.as_str().to_string()),
            timeout_seconds: tg.health_check_timeout_seconds(),
            healthy_threshold: tg.healthy_threshold_count(),
            unhealthy_threshold: tg.unhealthy_threshold_count(),
            matcher: tg.matcher().map(|m| Matcher {
                http_code: owned(m.http_code()),
                grpc_code: owned(m.grpc_code()),
            }),
        },
        load_balancer_arns: tg.load_balancer_arns().to_vec(),
    }
}

fn to_sdk_matcher(matcher: &Option<Matcher>) -> Option<sdk::Matcher> {
    matcher.as_ref().map(|m| {
        sdk::Matcher::builder()
            .set_http_code(m.http_code.clone())
            .set_grpc_code(m.grpc_code.clone())
            .build()
    })
}

fn to_sdk_target(t: &TargetDescription) -> sdk::TargetDescription {
    sdk::TargetDescription::builder()
        .id(&t.id)
        .set_port(t.port)
        .set_availability_zone(t.availability_zone.clone())
        .build()
}

fn to_sdk_targets(targets: &[TargetDescription]) -> Vec<sdk::TargetDescription> {
    targets.iter().map(to_sdk_target).collect()
}

fn from_sdk_target(t: &sdk::TargetDescription) -> TargetDescription {
    TargetDescription {
        id: t.id().unwrap_or_default().to_string(),
        port: t.port(),
        availability_zone: owned(t.availability_zone()),
    }
}

fn to_sdk_certificate(c: &Certificate) -> sdk::Certificate {
    sdk::Certificate::builder()
        .certificate_arn(&c.arn)
        .set_is_default(c.is_default)
        .build()
}

fn from_sdk_certificate(c: &sdk::Certificate) -> Certificate {
    Certificate {
        arn: c.certificate_arn().unwrap_or_default().to_string(),
        is_default: c.is_default(),
    }
}

fn to_sdk_mutual_authentication(m: &MutualAuthentication) -> sdk::MutualAuthenticationAttributes {
    sdk::MutualAuthenticationAttributes::builder()
        .set_mode(m.mode.clone())
        .set_trust_store_arn(m.trust_store_arn.clone())
        .set_ignore_client_certificate_expiry(m.ignore_client_certificate_expiry)
        .build()
}

fn extra_params(params: &BTreeMap<String, String>) -> Option<HashMap<String, String>> {
    (!params.is_empty()).then(|| params.clone().into_iter().collect())
}

fn to_sdk_action(a: &Action) -> sdk::Action {
    let forward = a.forward.as_ref().map(|f| {
        let stickiness = (f.stickiness_enabled.is_some() || f.stickiness_duration.is_some()).then(|| {
            sdk::TargetGroupStickinessConfig::builder()
                .set_enabled(f.stickiness_enabled)
                .set_duration_seconds(f.stickiness_duration)
                .build()
        });
        sdk::ForwardActionConfig::builder()
            .set_target_groups(Some(
                f.target_groups
                    .iter()
                    .map(|tg| {
                        sdk::TargetGroupTuple::builder()
                            .target_group_arn(&tg.arn)
                            .set_weight(tg.weight)
                            .build()
                    })
                    .collect(),
            ))
            .set_target_group_stickiness_config(stickiness)
            .build()
    });

    let redirect = a.redirect.as_ref().map(|r| {
        sdk::RedirectActionConfig::builder()
            .set_host(r.host.clone())
            .set_path(r.path.clone())
            .set_port(r.port.clone())
            .set_protocol(r.protocol.clone())
            .set_query(r.query.clone())
            .status_code(sdk::RedirectActionStatusCodeEnum::from(r.status_code.as_str()))
            .build()
    });

    let fixed_response = a.fixed_response.as_ref().map(|f| {
        sdk::FixedResponseActionConfig::builder()
            .set_content_type(f.content_type.clone())
            .set_message_body(f.message_body.clone())
            .status_code(&f.status_code)
            .build()
    });

    let cognito = a.authenticate_cognito.as_ref().map(|c| {
        sdk::AuthenticateCognitoActionConfig::builder()
            .user_pool_arn(&c.user_pool_arn)
            .user_pool_client_id(&c.user_pool_client_id)
            .user_pool_domain(&c.user_pool_domain)
            .set_authentication_request_extra_params(extra_params(&c.authentication_request_extra_params))
            .set_on_unauthenticated_request(c.on_unauthenticated_request.as_deref().map(
                sdk::AuthenticateCognitoActionConditionalBehaviorEnum::from,
            ))
            .set_scope(c.scope.clone())
            .set_session_cookie_name(c.session_cookie_name.clone())
            .set_session_timeout(c.session_timeout)
            .build()
});

let oidc = a.authenticate_oidc.as_ref().map(|o| {
        sdk::AuthenticateOidcActionConfig::builder()
            .issuer(&o.issuer)
            .authorization_endpoint(&o.authorization_endpoint)
            .token_endpoint(&o.token_endpoint)
            .user_info_endpoint(&o.user_info_endpoint)
            .client_id(&o.client_id)
            .set_client_secret(o.client_secret.clone())
            // Without a secret the service keeps the one it already has
            .set_use_existing_client_secret(o.client_secret.is_none().then_some(true))
            .set_authentication_request_extra_params(extra_params(&o.authentication_request_extra_params))
            .set_on_unauthenticated_request(
                o.on_unauthenticated_request
                    .as_deref()
                    .map(sdk::AuthenticateOidcActionConditionalBehaviorEnum::from),
            )
            .set_scope(o.scope.clone())
            .set_session_cookie_name(o.session_cookie_name.clone())
            .set_session_timeout(o.session_timeout)
            .build()
    });

    sdk::Action::builder()
        .r#type(sdk::ActionTypeEnum::from(a.action_type.as_str()))
        .set_order(a.order)
        .set_target_group_arn(a.target_group_arn.clone())
        .set_forward_config(forward)
        .set_redirect_config(redirect)
        .set_fixed_response_config(fixed_response)
        .set_authenticate_cognito_config(cognito)
        .set_authenticate_oidc_config(oidc)
        .build()
}

fn to_sdk_actions(actions: &[Action]) -> Vec<sdk::Action> {
    actions.iter().map(to_sdk_action).collect()
}

fn from_sdk_action(a: &sdk::Action) -> Action {
    Action {
        action_type: a.r#type().map(|t| t.as_str()).unwrap_or_default().to_string(),
        order: a.order(),
        target_group_arn: owned(a.target_group_arn()),
        forward: a.forward_config().map(|f| ForwardConfig {
            target_groups: f
                .target_groups()
                .iter()
                .map(|tg| TargetGroupTuple {
                    arn: tg.target_group_arn().unwrap_or_default().to_string(),
                    weight: tg.weight(),
                })
                .collect(),
            stickiness_enabled: f.target_group_stickiness_config().and_then(|s| s.enabled()),
            stickiness_duration: f
                .target_group_stickiness_config()
                .and_then(|s| s.duration_seconds()),
        }),
        redirect: a.redirect_config().map(|r| RedirectConfig {
            host: owned(r.host()),
            path: owned(r.path()),
            port: owned(r.port()),
            protocol: owned(r.protocol()),
            query: owned(r.query()),
            status_code: r.status_code().map(|c| c.as_str()).unwrap_or_default().to_string(),
        }),
        fixed_response: a.fixed_response_config().map(|f| FixedResponseConfig {
            content_type: owned(f.content_type()),
            message_body: owned(f.message_body()),
            status_code: f.status_code().unwrap_or_default().to_string(),
        }),
        authenticate_cognito: a.authenticate_cognito_config().map(|c| AuthenticateCognitoConfig {
            user_pool_arn: c.user_pool_arn().unwrap_or_default().to_string(),
            user_pool_client_id: c.user_pool_client_id().unwrap_or_default().to_string(),
            user_pool_domain: c.user_pool_domain().unwrap_or_default().to_string(),
            authentication_request_extra_params: c
                .authentication_request_extra_params()
                .map(|p| p.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default(),
            on_unauthenticated_request: c.on_unauthenticated_request().map(|b| b.as_str().to_string()),
            scope: owned(c.scope()),
            session_cookie_name: owned(c.session_cookie_name()),
            session_timeout: c.session_timeout(),
        }),
        authenticate_oidc: a.authenticate_oidc_config().map(|o| AuthenticateOidcConfig {
            issuer: o.issuer().unwrap_or_default().to_string(),
            authorization_endpoint: o.authorization_endpoint().unwrap_or_default().to_string(),
            token_endpoint: o.token_endpoint().unwrap_or_default().to_string(),
            user_info_endpoint: o.user_info_endpoint().unwrap_or_default().to_string(),
            client_id: o.client_id().unwrap_or_default().to_string(),
            client_secret: owned(o.client_secret()),
            authentication_request_extra_params: o
                .authentication_request_extra_params()
                .map(|p| p.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default(),
            on_unauthenticated_request: o.on_unauthenticated_request().map(|b| b.as_str().to_string()),
            scope: owned(o.scope()),
            session_cookie_name: owned(o.session_cookie_name()),
            session_timeout: o.session_timeout(),
        }),
    }
}

fn from_sdk_listener(l: &sdk::Listener) -> Listener {
    Listener {
        arn: l.listener_arn().unwrap_or_default().to_string(),
        load_balancer_arn: l.load_balancer_arn().unwrap_or_default().to_string(),
        port: l.port(),
        protocol: l.protocol().map(|p| p.as_str().to_string()),
        ssl_policy: owned(l.ssl_policy()),
        certificates: l.certificates().iter().map(from_sdk_certificate).collect(),
        default_actions: l.default_actions().iter().map(from_sdk_action).collect(),
        alpn_policy: l.alpn_policy().to_vec(),
        mutual_authentication: l.mutual_authentication().map(|m| MutualAuthentication {
            mode: owned(m.mode()),
            trust_store_arn: owned(m.trust_store_arn()),
            ignore_client_certificate_expiry: m.ignore_client_certificate_expiry(),
        }),
    }
}

fn to_sdk_condition(c: &RuleCondition) -> sdk::RuleCondition {
    let builder = sdk::RuleCondition::builder();
    let builder = if !c.host_header.is_empty() {
        builder.field("host-header").host_header_config(
            sdk::HostHeaderConditionConfig::builder()
                .set_values(Some(c.host_header.clone()))
                .build(),
        )
    } else if !c.path_pattern.is_empty() {
        builder.field("path-pattern").path_pattern_config(
            sdk::PathPatternConditionConfig::builder()
                .set_values(Some(c.path_pattern.clone()))
                .build(),
        )
    } else if let Some((name, values)) = &c.http_header {
        builder.field("http-header").http_header_config(
            sdk::HttpHeaderConditionConfig::builder()
                .http_header_name(name)
                .set_values(Some(values.clone()))
                .build(),
        )
    } else if !c.http_request_method.is_empty() {
        builder.field("http-request-method").http_request_method_config(
            sdk::HttpRequestMethodConditionConfig::builder()
                .set_values(Some(c.http_request_method.clone()))
                .build(),
        )
    } else if !c.query_string.is_empty() {
        builder.field("query-string").query_string_config(
            sdk::QueryStringConditionConfig::builder()
                .set_values(Some(
                    c.query_string
                        .iter()
                        .map(|q| {
                            sdk::QueryStringKeyValuePair::builder()
                                .set_key(q.key.clone())
                                .value(&q.value)
                                .build()
                        })
                        .collect(),
                ))
                .build(),
        )
    } else {
        builder.field("source-ip").source_ip_config(
            sdk::SourceIpConditionConfig::builder()
                .set_values(Some(c.source_ip.clone()))
                .build(),
        )
    };
    builder.build()
}

fn from_sdk_condition(c: &sdk::RuleCondition) -> RuleCondition {
    let mut condition = RuleCondition::default();
    match c.field().unwrap_or_default() {
        "host-header" => {
            condition.host_header = c
                .host_header_config()
                .map(|h| h.values().to_vec())
                .unwrap_or_else(|| c.values().to_vec());
        }
        "path-pattern" => {
            condition.path_pattern = c
                .path_pattern_config()
                .map(|p| p.values().to_vec())
                .unwrap_or_else(|| c.values().to_vec());
        }
        "http-header" => {
            condition.http_header = c.http_header_config().map(|h| {
                (
                    h.http_header_name().unwrap_or_default().to_string(),
                    h.values().to_vec(),
                )
            });
        }
        "http-request-method" => {
            condition.http_request_method = c
                .http_request_method_config()
                .map(|m| m.values().to_vec())
                .unwrap_or_default();
        }
        "query-string" => {
            condition.query_string = c
                .query_string_config()
                .map(|q| {
                    q.values()
                        .iter()
                        .map(|pair| QueryStringPair {
                            key: owned(pair.key()),
                            value: pair.value().unwrap_or_default().to_string(),
                        })
                        .collect()
                })
                .unwrap_or_default();
        }
        "source-ip" => {
            condition.source_ip = c
                .source_ip_config()
                .map(|s| s.values().to_vec())
                .unwrap_or_default();
        }
        other => log::warn!("ignoring unsupported rule condition field '{}'", other),
    }
    condition
}

fn from_sdk_rule(r: &sdk::Rule) -> Rule {
    Rule {
        arn: r.rule_arn().unwrap_or_default().to_string(),
        priority: r.priority().unwrap_or_default().to_string(),
        conditions: r.conditions().iter().map(from_sdk_condition).collect(),
        actions: r.actions().iter().map(from_sdk_action).collect(),
        is_default: r.is_default().unwrap_or(false),
    }
}

fn from_sdk_trust_store(ts: &sdk::TrustStore) -> TrustStore {
    TrustStore {
        arn: ts.trust_store_arn().unwrap_or_default().to_string(),
        name: ts.name().unwrap_or_default().to_string(),
        status: ts.status().map(|s| s.as_str().to_string()),
        number_of_ca_certificates: ts.number_of_ca_certificates(),
        total_revoked_entries: ts.total_revoked_entries(),
    }
}

fn to_attributes<'a>(pairs: impl Iterator<Item = (Option<&'a str>, Option<&'a str>)>) -> Attributes {
    pairs
        .filter_map(|(k, v)| Some((k?.to_string(), v.unwrap_or_default().to_string())))
        .collect()
}

// =============================================================================
// ElbV2Api
// =============================================================================

#[async_trait]
impl ElbV2Api for SdkApi {
    async fn create_load_balancer(&self, input: CreateLoadBalancerInput) -> ApiResult<LoadBalancer> {
        let out = self
            .client
            .create_load_balancer()
            .name(&input.name)
            .set_type(input.load_balancer_type.as_deref().map(sdk::LoadBalancerTypeEnum::from))
            .set_scheme(input.scheme.as_deref().map(sdk::LoadBalancerSchemeEnum::from))
            .set_subnets(non_empty(input.subnets))
            .set_subnet_mappings(non_empty(
                input.subnet_mappings.iter().map(to_sdk_subnet_mapping).collect(),
            ))
            .set_security_groups(non_empty(input.security_groups))
            .set_ip_address_type(input.ip_address_type.as_deref().map(sdk::IpAddressType::from))
            .set_customer_owned_ipv4_pool(input.customer_owned_ipv4_pool)
            .set_tags(to_sdk_tags(&input.tags))
            .send()
            .await
            .map_err(sdk_error)?;
        out.load_balancers()
            .first()
            .map(from_sdk_load_balancer)
            .ok_or_else(|| empty_response("load balancer"))
    }

    async fn describe_load_balancers(&self, lookup: Lookup) -> ApiResult<Vec<LoadBalancer>> {
        let mut found = Vec::new();
        let mut marker = None;
        loop {
            let mut req = self.client.describe_load_balancers().set_marker(marker);
            req = match &lookup {
                Lookup::Arns(arns) => req.set_load_balancer_arns(Some(arns.clone())),
                Lookup::Names(names) => req.set_names(Some(names.clone())),
                Lookup::All | Lookup::Parent(_) => req,
            };
            let out = req.send().await.map_err(sdk_error)?;
            found.extend(out.load_balancers().iter().map(from_sdk_load_balancer));
            marker = owned(out.next_marker());
            if marker.is_none() {
                return Ok(found);
            }
        }
    }

    async fn delete_load_balancer(&self, arn: &str) -> ApiResult<()> {
        self.client
            .delete_load_balancer()
            .load_balancer_arn(arn)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn set_security_groups(&self, arn: &str, security_groups: &[String]) -> ApiResult<()> {
        self.client
            .set_security_groups()
            .load_balancer_arn(arn)
            .set_security_groups(Some(security_groups.to_vec()))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn set_subnets(
        &self,
        arn: &str,
        subnets: &[String],
        subnet_mappings: &[SubnetMapping],
    ) -> ApiResult<()> {
        self.client
            .set_subnets()
            .load_balancer_arn(arn)
            .set_subnets(non_empty(subnets.to_vec()))
            .set_subnet_mappings(non_empty(
                subnet_mappings.iter().map(to_sdk_subnet_mapping).collect(),
            ))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn set_ip_address_type(&self, arn: &str, ip_address_type: &str) -> ApiResult<()> {
        self.client
            .set_ip_address_type()
            .load_balancer_arn(arn)
            .ip_address_type(sdk::IpAddressType::from(ip_address_type))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn describe_load_balancer_attributes(&self, arn: &str) -> ApiResult<Attributes> {
        let out = self
            .client
            .describe_load_balancer_attributes()
            .load_balancer_arn(arn)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(to_attributes(out.attributes().iter().map(|a| (a.key(), a.value()))))
    }

    async fn modify_load_balancer_attributes(
        &self,
        arn: &str,
        attributes: &Attributes,
    ) -> ApiResult<()> {
        self.client
            .modify_load_balancer_attributes()
            .load_balancer_arn(arn)
            .set_attributes(Some(
                attributes
                    .iter()
                    .map(|(k, v)| sdk::LoadBalancerAttribute::builder().key(k).value(v).build())
                    .collect(),
            ))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn create_target_group(&self, input: CreateTargetGroupInput) -> ApiResult<TargetGroup> {
        let hc = &input.health_check;
        let out = self
            .client
            .create_target_group()
            .name(&input.name)
            .set_port(input.port)
            .set_protocol(input.protocol.as_deref().map(sdk::ProtocolEnum::from))
            .set_protocol_version(input.protocol_version.clone())
            .set_vpc_id(input.vpc_id.clone())
            .set_target_type(input.target_type.as_deref().map(sdk::TargetTypeEnum::from))
            .set_ip_address_type(
                input
                    .ip_address_type
                    .as_deref()
                    .map(sdk::TargetGroupIpAddressTypeEnum::from),
            )
            .set_health_check_enabled(hc.enabled)
            .set_health_check_interval_seconds(hc.interval_seconds)
            .set_health_check_path(hc.path.clone())
            .set_health_check_port(hc.port.clone())
            .set_health_check_protocol(hc.protocol.as_deref().map(sdk::ProtocolEnum::from))
            .set_health_check_timeout_seconds(hc.timeout_seconds)
            .set_healthy_threshold_count(hc.healthy_threshold)
            .set_unhealthy_threshold_count(hc.unhealthy_threshold)
            .set_matcher(to_sdk_matcher(&hc.matcher))
            .set_tags(to_sdk_tags(&input.tags))
            .send()
            .await
            .map_err(sdk_error)?;
        out.target_groups()
            .first()
            .map(from_sdk_target_group)
            .ok_or_else(|| empty_response("target group"))
    }

    async fn describe_target_groups(&self, lookup: Lookup) -> ApiResult<Vec<TargetGroup>> {
        let mut found = Vec::new();
        let mut marker = None;
        loop {
            let mut req = self.client.describe_target_groups().set_marker(marker);
            req = match &lookup {
                Lookup::Arns(arns) => req.set_target_group_arns(Some(arns.clone())),
                Lookup::Names(names) => req.set_names(Some(names.clone())),
                Lookup::Parent(lb_arn) => req.load_balancer_arn(lb_arn),
                Lookup::All => req,
            };
            let out = req.send().await.map_err(sdk_error)?;
            found.extend(out.target_groups().iter().map(from_sdk_target_group));
            marker = owned(out.next_marker());
            if marker.is_none() {
                return Ok(found);
            }
        }
    }

    async fn modify_target_group(
        &self,
        arn: &str,
        health_check: &HealthCheck,
    ) -> ApiResult<TargetGroup> {
        let out = self
            .client
            .modify_target_group()
            .target_group_arn(arn)
            .set_health_check_enabled(health_check.enabled)
            .set_health_check_interval_seconds(health_check.interval_seconds)
            .set_health_check_path(health_check.path.clone())
            .set_health_check_port(health_check.port.clone())
            .set_health_check_protocol(health_check.protocol.as_deref().map(sdk::ProtocolEnum::from))
            .set_health_check_timeout_seconds(health_check.timeout_seconds)
            .set_healthy_threshold_count(health_check.healthy_threshold)
            .set_unhealthy_threshold_count(health_check.unhealthy_threshold)
            .set_matcher(to_sdk_matcher(&health_check.matcher))
            .send()
            .await
            .map_err(sdk_error)?;
        out.target_groups()
            .first()
            .map(from_sdk_target_group)
            .ok_or_else(|| empty_response("target group"))
    }

    async fn delete_target_group(&self, arn: &str) -> ApiResult<()> {
        self.client
            .delete_target_group()
            .target_group_arn(arn)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn describe_target_group_attributes(&self, arn: &str) -> ApiResult<Attributes> {
        let out = self
            .client
            .describe_target_group_attributes()
            .target_group_arn(arn)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(to_attributes(out.attributes().iter().map(|a| (a.key(), a.value()))))
    }

    async fn modify_target_group_attributes(
        &self,
        arn: &str,
        attributes: &Attributes,
    ) -> ApiResult<()> {
        self.client
            .modify_target_group_attributes()
            .target_group_arn(arn)
            .set_attributes(Some(
                attributes
                    .iter()
                    .map(|(k, v)| sdk::TargetGroupAttribute::builder().key(k).value(v).build())
                    .collect(),
            ))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn register_targets(&self, arn: &str, targets: &[TargetDescription]) -> ApiResult<()> {
        self.client
            .register_targets()
            .target_group_arn(arn)
            .set_targets(Some(to_sdk_targets(targets)))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn deregister_targets(&self, arn: &str, targets: &[TargetDescription]) -> ApiResult<()> {
        self.client
            .deregister_targets()
            .target_group_arn(arn)
            .set_targets(Some(to_sdk_targets(targets)))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn describe_target_health(
        &self,
        arn: &str,
        targets: &[TargetDescription],
    ) -> ApiResult<Vec<TargetHealth>> {
        let out = self
            .client
            .describe_target_health()
            .target_group_arn(arn)
            .set_targets(non_empty(to_sdk_targets(targets)))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(out
            .target_health_descriptions()
            .iter()
            .map(|d| TargetHealth {
                target: d.target().map(from_sdk_target).unwrap_or_default(),
                state: d
                    .target_health()
                    .and_then(|h| h.state())
                    .map(|s| s.as_str().to_string()),
                reason: d
                    .target_health()
                    .and_then(|h| h.reason())
                    .map(|r| r.as_str().to_string()),
            })
            .collect())
    }

    async fn create_listener(&self, input: CreateListenerInput) -> ApiResult<Listener> {
        let out = self
            .client
            .create_listener()
            .load_balancer_arn(&input.load_balancer_arn)
            .set_port(input.port)
            .set_protocol(input.protocol.as_deref().map(sdk::ProtocolEnum::from))
            .set_ssl_policy(input.ssl_policy.clone())
            .set_certificates(non_empty(input.certificates.iter().map(to_sdk_certificate).collect()))
            .set_default_actions(Some(to_sdk_actions(&input.default_actions)))
            .set_alpn_policy(non_empty(input.alpn_policy.clone()))
            .set_mutual_authentication(
                input.mutual_authentication.as_ref().map(to_sdk_mutual_authentication),
            )
            .set_tags(to_sdk_tags(&input.tags))
            .send()
            .await
            .map_err(sdk_error)?;
        out.listeners()
            .first()
            .map(from_sdk_listener)
            .ok_or_else(|| empty_response("listener"))
    }

    async fn describe_listeners(&self, lookup: Lookup) -> ApiResult<Vec<Listener>> {
        let mut found = Vec::new();
        let mut marker = None;
        loop {
            let mut req = self.client.describe_listeners().set_marker(marker);
            req = match &lookup {
                Lookup::Arns(arns) => req.set_listener_arns(Some(arns.clone())),
                Lookup::Parent(lb_arn) => req.load_balancer_arn(lb_arn),
                Lookup::All | Lookup::Names(_) => {
                    return Err(ApiError::new(
                        codes::VALIDATION_ERROR,
                        "listeners can only be described by ARN or load balancer",
                    ));
                }
            };
            let out = req.send().await.map_err(sdk_error)?;
            found.extend(out.listeners().iter().map(from_sdk_listener));
            marker = owned(out.next_marker());
            if marker.is_none() {
                return Ok(found);
            }
        }
    }

    async fn modify_listener(&self, input: ModifyListenerInput) -> ApiResult<Listener> {
        let out = self
            .client
            .modify_listener()
            .listener_arn(&input.listener_arn)
            .set_port(input.port)
            .set_protocol(input.protocol.as_deref().map(sdk::ProtocolEnum::from))
            .set_ssl_policy(input.ssl_policy.clone())
            .set_certificates(non_empty(input.certificates.iter().map(to_sdk_certificate).collect()))
            .set_default_actions(non_empty(to_sdk_actions(&input.default_actions)))
            .set_alpn_policy(non_empty(input.alpn_policy.clone()))
            .set_mutual_authentication(
                input.mutual_authentication.as_ref().map(to_sdk_mutual_authentication),
            )
            .send()
            .await
            .map_err(sdk_error)?;
        out.listeners()
            .first()
            .map(from_sdk_listener)
            .ok_or_else(|| empty_response("listener"))
    }

    async fn delete_listener(&self, arn: &str) -> ApiResult<()> {
        self.client
            .delete_listener()
            .listener_arn(arn)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn describe_listener_attributes(&self, arn: &str) -> ApiResult<Attributes> {
        let out = self
            .client
            .describe_listener_attributes()
            .listener_arn(arn)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(to_attributes(out.attributes().iter().map(|a| (a.key(), a.value()))))
    }

    async fn modify_listener_attributes(&self, arn: &str, attributes: &Attributes) -> ApiResult<()> {
        self.client
            .modify_listener_attributes()
            .listener_arn(arn)
            .set_attributes(Some(
                attributes
                    .iter()
                    .map(|(k, v)| sdk::ListenerAttribute::builder().key(k).value(v).build())
                    .collect(),
            ))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn create_rule(&self, input: CreateRuleInput) -> ApiResult<Rule> {
        let out = self
            .client
            .create_rule()
            .listener_arn(&input.listener_arn)
            .priority(input.priority)
            .set_conditions(Some(input.conditions.iter().map(to_sdk_condition).collect()))
            .set_actions(Some(to_sdk_actions(&input.actions)))
            .set_tags(to_sdk_tags(&input.tags))
            .send()
            .await
            .map_err(sdk_error)?;
        out.rules()
            .first()
            .map(from_sdk_rule)
            .ok_or_else(|| empty_response("rule"))
    }

    async fn describe_rules(&self, lookup: Lookup) -> ApiResult<Vec<Rule>> {
        let mut found = Vec::new();
        let mut marker = None;
        loop {
            let mut req = self.client.describe_rules().set_marker(marker);
            req = match &lookup {
                Lookup::Arns(arns) => req.set_rule_arns(Some(arns.clone())),
                Lookup::Parent(listener_arn) => req.listener_arn(listener_arn),
                Lookup::All | Lookup::Names(_) => {
                    return Err(ApiError::new(
                        codes::VALIDATION_ERROR,
                        "rules can only be described by ARN or listener",
                    ));
                }
            };
            let out = req.send().await.map_err(sdk_error)?;
            found.extend(out.rules().iter().map(from_sdk_rule));
            marker = owned(out.next_marker());
            if marker.is_none() {
                return Ok(found);
            }
        }
    }

    async fn modify_rule(
        &self,
        arn: &str,
        conditions: &[RuleCondition],
        actions: &[Action],
    ) -> ApiResult<Rule> {
        let out = self
            .client
            .modify_rule()
            .rule_arn(arn)
            .set_conditions(Some(conditions.iter().map(to_sdk_condition).collect()))
            .set_actions(Some(to_sdk_actions(actions)))
            .send()
            .await
            .map_err(sdk_error)?;
        out.rules()
            .first()
            .map(from_sdk_rule)
            .ok_or_else(|| empty_response("rule"))
    }

    async fn set_rule_priority(&self, arn: &str, priority: i32) -> ApiResult<()> {
        self.client
            .set_rule_priorities()
            .rule_priorities(
                sdk::RulePriorityPair::builder()
                    .rule_arn(arn)
                    .priority(priority)
                    .build(),
            )
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn delete_rule(&self, arn: &str) -> ApiResult<()> {
        self.client
            .delete_rule()
            .rule_arn(arn)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn create_trust_store(
        &self,
        name: &str,
        bundle: &S3Location,
        tags: &Tags,
    ) -> ApiResult<TrustStore> {
        let out = self
            .client
            .create_trust_store()
            .name(name)
            .ca_certificates_bundle_s3_bucket(&bundle.bucket)
            .ca_certificates_bundle_s3_key(&bundle.key)
            .set_ca_certificates_bundle_s3_object_version(bundle.object_version.clone())
            .set_tags(to_sdk_tags(tags))
            .send()
            .await
            .map_err(sdk_error)?;
        out.trust_stores()
            .first()
            .map(from_sdk_trust_store)
            .ok_or_else(|| empty_response("trust store"))
    }

    async fn describe_trust_stores(&self, lookup: Lookup) -> ApiResult<Vec<TrustStore>> {
        let mut found = Vec::new();
        let mut marker = None;
        loop {
            let mut req = self.client.describe_trust_stores().set_marker(marker);
            req = match &lookup {
                Lookup::Arns(arns) => req.set_trust_store_arns(Some(arns.clone())),
                Lookup::Names(names) => req.set_names(Some(names.clone())),
                Lookup::All | Lookup::Parent(_) => req,
            };
            let out = req.send().await.map_err(sdk_error)?;
            found.extend(out.trust_stores().iter().map(from_sdk_trust_store));
            marker = owned(out.next_marker());
            if marker.is_none() {
                return Ok(found);
            }
        }
    }

    async fn modify_trust_store(&self, arn: &str, bundle: &S3Location) -> ApiResult<()> {
        self.client
            .modify_trust_store()
            .trust_store_arn(arn)
            .ca_certificates_bundle_s3_bucket(&bundle.bucket)
            .ca_certificates_bundle_s3_key(&bundle.key)
            .set_ca_certificates_bundle_s3_object_version(bundle.object_version.clone())
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn delete_trust_store(&self, arn: &str) -> ApiResult<()> {
        self.client
            .delete_trust_store()
            .trust_store_arn(arn)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn add_trust_store_revocation(
        &self,
        arn: &str,
        revocations: &S3Location,
    ) -> ApiResult<TrustStoreRevocation> {
        let out = self
            .client
            .add_trust_store_revocations()
            .trust_store_arn(arn)
            .revocation_contents(
                sdk::RevocationContent::builder()
                    .s3_bucket(&revocations.bucket)
                    .s3_key(&revocations.key)
                    .set_s3_object_version(revocations.object_version.clone())
                    .revocation_type(sdk::RevocationType::Crl)
                    .build(),
            )
            .send()
            .await
            .map_err(sdk_error)?;
        out.trust_store_revocations()
            .first()
            .map(|r| TrustStoreRevocation {
                trust_store_arn: r.trust_store_arn().unwrap_or(arn).to_string(),
                revocation_id: r.revocation_id().unwrap_or_default(),
                revocation_type: r.revocation_type().map(|t| t.as_str().to_string()),
                number_of_revoked_entries: r.number_of_revoked_entries(),
            })
            .ok_or_else(|| empty_response("revocation"))
    }

    async fn describe_trust_store_revocations(
        &self,
        arn: &str,
        revocation_ids: &[i64],
    ) -> ApiResult<Vec<TrustStoreRevocation>> {
        let mut found = Vec::new();
        let mut marker = None;
        loop {
            let out = self
                .client
                .describe_trust_store_revocations()
                .trust_store_arn(arn)
                .set_revocation_ids(non_empty(revocation_ids.to_vec()))
                .set_marker(marker)
                .send()
                .await
                .map_err(sdk_error)?;
            found.extend(out.trust_store_revocations().iter().map(|r| TrustStoreRevocation {
                trust_store_arn: r.trust_store_arn().unwrap_or(arn).to_string(),
                revocation_id: r.revocation_id().unwrap_or_default(),
                revocation_type: r.revocation_type().map(|t| t.as_str().to_string()),
                number_of_revoked_entries: r.number_of_revoked_entries(),
            }));
            marker = owned(out.next_marker());
            if marker.is_none() {
                return Ok(found);
            }
        }
    }

    async fn remove_trust_store_revocations(
        &self,
        arn: &str,
        revocation_ids: &[i64],
    ) -> ApiResult<()> {
        self.client
            .remove_trust_store_revocations()
            .trust_store_arn(arn)
            .set_revocation_ids(Some(revocation_ids.to_vec()))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn describe_tags(&self, arn: &str) -> ApiResult<Tags> {
        let out = self
            .client
            .describe_tags()
            .resource_arns(arn)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(out
            .tag_descriptions()
            .iter()
            .flat_map(|d| d.tags())
            .filter_map(|t| Some((t.key()?.to_string(), t.value().unwrap_or_default().to_string())))
            .collect())
    }

    async fn add_tags(&self, arn: &str, tags: &Tags) -> ApiResult<()> {
        self.client
            .add_tags()
            .resource_arns(arn)
            .set_tags(to_sdk_tags(tags))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn remove_tags(&self, arn: &str, keys: &[String]) -> ApiResult<()> {
        self.client
            .remove_tags()
            .resource_arns(arn)
            .set_tag_keys(Some(keys.to_vec()))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }
}
