//! Attribute key tables
//!
//! Load balancers, target groups and listeners carry most of their settings
//! as string key/value attributes (`idle_timeout.timeout_seconds = "60"`).
//! Each table maps a configuration attribute (possibly inside a block) to its
//! API key, and says to which kind of object the key applies.

use std::collections::HashMap;

use carina_core::resource::Value;

use crate::model::Attributes;
use crate::utils::Attrs;

/// What an attribute value looks like in the API map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Bool,
    Int,
    String,
}

/// The object an attribute table is evaluated against
#[derive(Debug, Clone, Copy, Default)]
pub struct Scope<'a> {
    pub load_balancer_type: Option<&'a str>,
    pub protocol: Option<&'a str>,
    pub target_type: Option<&'a str>,
}

/// Mapping of one configuration attribute to one API key
#[derive(Debug, Clone, Copy)]
pub struct AttributeKey {
    /// Attribute name, optionally followed by a field of a nested block
    pub path: &'static [&'static str],
    pub api_key: &'static str,
    pub kind: Kind,
    pub applies: fn(&Scope<'_>) -> bool,
}

impl AttributeKey {
    const fn new(
        path: &'static [&'static str],
        api_key: &'static str,
        kind: Kind,
        applies: fn(&Scope<'_>) -> bool,
    ) -> Self {
        Self {
            path,
            api_key,
            kind,
            applies,
        }
    }
}

// =============================================================================
// Applicability
// =============================================================================

fn any(_: &Scope<'_>) -> bool {
    true
}

fn application(s: &Scope<'_>) -> bool {
    s.load_balancer_type == Some("application")
}

fn network(s: &Scope<'_>) -> bool {
    s.load_balancer_type == Some("network")
}

fn application_or_network(s: &Scope<'_>) -> bool {
    application(s) || network(s)
}

fn network_or_gateway(s: &Scope<'_>) -> bool {
    network(s) || s.load_balancer_type == Some("gateway")
}

fn http(s: &Scope<'_>) -> bool {
    matches!(s.protocol, Some("HTTP" | "HTTPS"))
}

fn https(s: &Scope<'_>) -> bool {
    s.protocol == Some("HTTPS")
}

fn tcp(s: &Scope<'_>) -> bool {
    s.protocol == Some("TCP")
}

fn lambda(s: &Scope<'_>) -> bool {
    s.target_type == Some("lambda")
}

fn not_lambda(s: &Scope<'_>) -> bool {
    !lambda(s)
}

fn http_targets(s: &Scope<'_>) -> bool {
    http(s) && not_lambda(s)
}

fn layer4_targets(s: &Scope<'_>) -> bool {
    matches!(s.protocol, Some("TCP" | "TLS" | "UDP" | "TCP_UDP")) && not_lambda(s)
}

fn connection_termination(s: &Scope<'_>) -> bool {
    matches!(s.protocol, Some("TCP" | "TLS" | "UDP" | "TCP_UDP" | "GENEVE")) && not_lambda(s)
}

fn geneve(s: &Scope<'_>) -> bool {
    s.protocol == Some("GENEVE")
}

// =============================================================================
// Tables
// =============================================================================

pub static LOAD_BALANCER: &[AttributeKey] = &[
    AttributeKey::new(&["access_logs", "bucket"], "access_logs.s3.bucket", Kind::String, application_or_network),
    AttributeKey::new(&["access_logs", "prefix"], "access_logs.s3.prefix", Kind::String, application_or_network),
    AttributeKey::new(&["access_logs", "enabled"], "access_logs.s3.enabled", Kind::Bool, application_or_network),
    AttributeKey::new(&["connection_logs", "bucket"], "connection_logs.s3.bucket", Kind::String, application),
    AttributeKey::new(&["connection_logs", "prefix"], "connection_logs.s3.prefix", Kind::String, application),
    AttributeKey::new(&["connection_logs", "enabled"], "connection_logs.s3.enabled", Kind::Bool, application),
    AttributeKey::new(&["idle_timeout"], "idle_timeout.timeout_seconds", Kind::Int, application),
    AttributeKey::new(&["enable_deletion_protection"], "deletion_protection.enabled", Kind::Bool, any),
    AttributeKey::new(&["enable_http2"], "routing.http2.enabled", Kind::Bool, application),
    AttributeKey::new(&["enable_cross_zone_load_balancing"], "load_balancing.cross_zone.enabled", Kind::Bool, network_or_gateway),
    AttributeKey::new(&["drop_invalid_header_fields"], "routing.http.drop_invalid_header_fields.enabled", Kind::Bool, application),
    AttributeKey::new(&["preserve_host_header"], "routing.http.preserve_host_header.enabled", Kind::Bool, application),
    AttributeKey::new(&["desync_mitigation_mode"], "routing.http.desync_mitigation_mode", Kind::String, application),
    AttributeKey::new(&["enable_tls_version_and_cipher_suite_headers"], "routing.http.x_amzn_tls_version_and_cipher_suite.enabled", Kind::Bool, application),
    AttributeKey::new(&["enable_waf_fail_open"], "waf.fail_open.enabled", Kind::Bool, application),
    AttributeKey::new(&["enable_xff_client_port"], "routing.http.xff_client_port.enabled", Kind::Bool, application),
    AttributeKey::new(&["xff_header_processing_mode"], "routing.http.xff_header_processing.mode", Kind::String, application),
    AttributeKey::new(&["client_keep_alive"], "client_keep_alive.seconds", Kind::Int, application),
    AttributeKey::new(&["dns_record_client_routing_policy"], "dns_record.client_routing_policy", Kind::String, network),
    AttributeKey::new(&["enable_zonal_shift"], "zonal_shift.config.enabled", Kind::Bool, application_or_network),
];

/// Stickiness keys depend on the stickiness type and are handled by the target group
pub static TARGET_GROUP: &[AttributeKey] = &[
    AttributeKey::new(&["deregistration_delay"], "deregistration_delay.timeout_seconds", Kind::Int, not_lambda),
    AttributeKey::new(&["slow_start"], "slow_start.duration_seconds", Kind::Int, http_targets),
    AttributeKey::new(&["proxy_protocol_v2"], "proxy_protocol_v2.enabled", Kind::Bool, layer4_targets),
    AttributeKey::new(&["connection_termination"], "deregistration_delay.connection_termination.enabled", Kind::Bool, connection_termination),
    AttributeKey::new(&["lambda_multi_value_headers_enabled"], "lambda.multi_value_headers.enabled", Kind::Bool, lambda),
    AttributeKey::new(&["load_balancing_algorithm_type"], "load_balancing.algorithm.type", Kind::String, http_targets),
    AttributeKey::new(&["load_balancing_cross_zone_enabled"], "load_balancing.cross_zone.enabled", Kind::String, not_lambda),
    AttributeKey::new(&["preserve_client_ip"], "preserve_client_ip.enabled", Kind::Bool, layer4_targets),
    AttributeKey::new(&["target_failover", "on_deregistration"], "target_failover.on_deregistration", Kind::String, geneve),
    AttributeKey::new(&["target_failover", "on_unhealthy"], "target_failover.on_unhealthy", Kind::String, geneve),
];

pub static LISTENER: &[AttributeKey] = &[
    AttributeKey::new(&["tcp_idle_timeout_seconds"], "tcp.idle_timeout.seconds", Kind::Int, tcp),
    AttributeKey::new(&["routing_http_request_x_amzn_mtls_clientcert_header_name"], "routing.http.request.x_amzn_mtls_clientcert.header_name", Kind::String, https),
    AttributeKey::new(&["routing_http_request_x_amzn_mtls_clientcert_serial_number_header_name"], "routing.http.request.x_amzn_mtls_clientcert_serial_number.header_name", Kind::String, https),
    AttributeKey::new(&["routing_http_request_x_amzn_mtls_clientcert_issuer_header_name"], "routing.http.request.x_amzn_mtls_clientcert_issuer.header_name", Kind::String, https),
    AttributeKey::new(&["routing_http_request_x_amzn_mtls_clientcert_subject_header_name"], "routing.http.request.x_amzn_mtls_clientcert_subject.header_name", Kind::String, https),
    AttributeKey::new(&["routing_http_request_x_amzn_tls_version_header_name"], "routing.http.request.x_amzn_tls_version.header_name", Kind::String, https),
    AttributeKey::new(&["routing_http_request_x_amzn_tls_cipher_suite_header_name"], "routing.http.request.x_amzn_tls_cipher_suite.header_name", Kind::String, https),
    AttributeKey::new(&["routing_http_response_server_enabled"], "routing.http.response.server.enabled", Kind::Bool, http),
    AttributeKey::new(&["routing_http_response_strict_transport_security_header_value"], "routing.http.response.strict_transport_security.header_value", Kind::String, https),
    AttributeKey::new(&["routing_http_response_access_control_allow_origin_header_value"], "routing.http.response.access_control_allow_origin.header_value", Kind::String, http),
    AttributeKey::new(&["routing_http_response_x_content_type_options_header_value"], "routing.http.response.x_content_type_options.header_value", Kind::String, http),
    AttributeKey::new(&["routing_http_response_x_frame_options_header_value"], "routing.http.response.x_frame_options.header_value", Kind::String, http),
    AttributeKey::new(&["routing_http_response_content_security_policy_header_value"], "routing.http.response.content_security_policy.header_value", Kind::String, http),
];

// =============================================================================
// Expand / flatten
// =============================================================================

fn lookup<'a>(attrs: &'a Attrs, path: &[&str]) -> Option<&'a Value> {
    let (last, blocks) = path.split_last()?;
    let mut current = attrs;
    for block in blocks {
        current = crate::utils::get_block(current, block)?;
    }
    current.get(*last)
}

fn render(value: &Value, kind: Kind) -> Option<String> {
    match (kind, value) {
        (Kind::Bool, Value::Bool(b)) => Some(b.to_string()),
        (Kind::Int, Value::Int(n)) => Some(n.to_string()),
        (Kind::String, Value::String(s)) => Some(s.clone()),
        (Kind::String, Value::Bool(b)) => Some(b.to_string()),
        (Kind::String, Value::Int(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn parse(raw: &str, kind: Kind) -> Option<Value> {
    match kind {
        Kind::Bool => raw.parse::<bool>().ok().map(Value::Bool),
        Kind::Int => raw.parse::<i64>().ok().map(Value::Int),
        Kind::String => Some(Value::String(raw.to_string())),
    }
}

/// API attributes for the configured values that apply to `scope`
pub fn expand(table: &[AttributeKey], attrs: &Attrs, scope: &Scope<'_>) -> Attributes {
    table
        .iter()
        .filter(|key| (key.applies)(scope))
        .filter_map(|key| {
            let value = lookup(attrs, key.path)?;
            render(value, key.kind).map(|v| (key.api_key.to_string(), v))
        })
        .collect()
}

/// Configuration attributes for the API values that apply to `scope`
pub fn flatten(table: &[AttributeKey], api: &Attributes, scope: &Scope<'_>) -> Attrs {
    let mut result = Attrs::new();
    for key in table.iter().filter(|key| (key.applies)(scope)) {
        let Some(value) = api.get(key.api_key).and_then(|raw| parse(raw, key.kind)) else {
            continue;
        };
        match key.path {
            [name] => {
                result.insert(name.to_string(), value);
            }
            [block, field] => {
                let entry = result
                    .entry(block.to_string())
                    .or_insert_with(|| Value::Map(HashMap::new()));
                if let Value::Map(map) = entry {
                    map.insert(field.to_string(), value);
                }
            }
            _ => {}
        }
    }
    result
}

/// Keys of `desired` whose values differ from `current`
pub fn changes(desired: &Attributes, current: &Attributes) -> Attributes {
    desired
        .iter()
        .filter(|(k, v)| current.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Whether the top-level attribute `name` applies to `scope`
///
/// Attributes that are not in the table always apply.
pub fn applies(table: &[AttributeKey], name: &str, scope: &Scope<'_>) -> bool {
    let mut keys = table.iter().filter(|key| key.path.first() == Some(&name)).peekable();
    if keys.peek().is_none() {
        return true;
    }
    keys.any(|key| (key.applies)(scope))
}
