//! elbv2.listener schema

use carina_core::resource::Value;
use carina_core::schema::{AttributeSchema, AttributeType, ResourceSchema, SuppressContext, types};

use super::action::{actions_attribute, validate_actions};
use super::{int_range, with_common};
use crate::attributes::{self, LISTENER, Scope};
use crate::utils::{Attrs, get_block, get_str};

pub const PROTOCOLS: &[&str] = &["GENEVE", "HTTP", "HTTPS", "TCP", "TCP_UDP", "TLS", "UDP"];

pub const ALPN_POLICIES: &[&str] = &["HTTP1Only", "HTTP2Only", "HTTP2Optional", "HTTP2Preferred", "None"];

/// Protocol a listener ends up with when none is configured
pub fn effective_protocol(attrs: &Attrs) -> &str {
    match get_str(attrs, "protocol") {
        Some(protocol) => protocol,
        None if attrs.contains_key("certificate_arn") => "HTTPS",
        None => "HTTP",
    }
}

fn not_applicable(ctx: &SuppressContext<'_>) -> bool {
    let scope = Scope {
        protocol: Some(effective_protocol(ctx.root)),
        ..Default::default()
    };
    !attributes::applies(LISTENER, ctx.key, &scope)
}

fn table_attribute(name: &str, attr_type: AttributeType) -> AttributeSchema {
    AttributeSchema::new(name, attr_type).with_diff_suppress(not_applicable)
}

fn mutual_authentication_block() -> AttributeType {
    AttributeType::block(
        "MutualAuthentication",
        vec![
            AttributeSchema::new("mode", AttributeType::enum_of(&["off", "verify", "passthrough"]))
                .required(),
            AttributeSchema::new("trust_store_arn", types::arn()),
            AttributeSchema::new("ignore_client_certificate_expiry", AttributeType::Bool),
        ],
    )
}

pub fn listener_schema() -> ResourceSchema {
    let mut schema = ResourceSchema::new("elbv2.listener")
        .with_description("Load balancer listener")
        .attribute(
            AttributeSchema::new("load_balancer_arn", types::arn())
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("port", types::port()))
        .attribute(
            AttributeSchema::new("protocol", AttributeType::enum_of(PROTOCOLS)).with_description(
                "Defaults to HTTPS with a certificate and HTTP otherwise (application), GENEVE (gateway)",
            ),
        )
        .attribute(AttributeSchema::new("ssl_policy", AttributeType::String))
        .attribute(
            AttributeSchema::new("certificate_arn", types::arn())
                .with_description("Default server certificate"),
        )
        .attribute(AttributeSchema::new("alpn_policy", AttributeType::enum_of(ALPN_POLICIES)))
        .attribute(AttributeSchema::new("mutual_authentication", mutual_authentication_block()))
        .attribute(actions_attribute("default_action"))
        .attribute(table_attribute("tcp_idle_timeout_seconds", int_range!(60, 6000)))
        .with_validator(validate);

    for key in LISTENER.iter().filter(|k| k.path[0] != "tcp_idle_timeout_seconds") {
        let attr_type = match key.kind {
            attributes::Kind::Bool => AttributeType::Bool,
            attributes::Kind::Int => AttributeType::Int,
            attributes::Kind::String => AttributeType::String,
        };
        schema = schema.attribute(table_attribute(key.path[0], attr_type));
    }
    with_common(schema)
}

fn validate(attrs: &Attrs) -> Result<(), String> {
    validate_actions(attrs, "default_action")?;

    let protocol = get_str(attrs, "protocol");
    if matches!(protocol, Some("HTTP" | "TCP" | "UDP" | "TCP_UDP" | "GENEVE")) {
        for key in ["certificate_arn", "ssl_policy", "alpn_policy"] {
            if attrs.contains_key(key) {
                return Err(format!("{} cannot be set on a {} listener", key, protocol.unwrap_or_default()));
            }
        }
    }
    if attrs.contains_key("alpn_policy") && protocol != Some("TLS") {
        return Err("alpn_policy is only supported on TLS listeners".to_string());
    }
    if let Some(mutual) = get_block(attrs, "mutual_authentication")
        && get_str(mutual, "mode") == Some("verify")
        && !mutual.contains_key("trust_store_arn")
    {
        return Err("mutual_authentication.trust_store_arn is required in verify mode".to_string());
    }
    Ok(())
}
