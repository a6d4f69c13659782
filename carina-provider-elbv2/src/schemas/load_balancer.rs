//! elbv2.load_balancer schema

use carina_core::resource::Value;
use carina_core::schema::{AttributeSchema, AttributeType, ResourceSchema, SuppressContext};

use super::{computed, int_range, string_set, with_common, with_name};
use crate::attributes::{self, LOAD_BALANCER, Scope};
use crate::utils::{Attrs, get_str, get_strings};

pub const LOAD_BALANCER_TYPES: &[&str] = &["application", "network", "gateway"];

pub const IP_ADDRESS_TYPES: &[&str] = &["ipv4", "dualstack", "dualstack-without-public-ipv4"];

/// Attribute that does not apply to the configured load balancer type
fn not_applicable(ctx: &SuppressContext<'_>) -> bool {
    let scope = Scope {
        load_balancer_type: Some(ctx.root_str("load_balancer_type").unwrap_or("application")),
        ..Default::default()
    };
    !attributes::applies(LOAD_BALANCER, ctx.key, &scope)
}

fn logs_block(name: &str) -> AttributeType {
    AttributeType::block(
        name,
        vec![
            AttributeSchema::new("bucket", AttributeType::String).required(),
            AttributeSchema::new("prefix", AttributeType::String),
            AttributeSchema::new("enabled", AttributeType::Bool).with_default(Value::Bool(false)),
        ],
    )
}

fn subnet_mapping_block() -> AttributeType {
    AttributeType::block(
        "SubnetMapping",
        vec![
            AttributeSchema::new("subnet_id", AttributeType::String).required(),
            AttributeSchema::new("allocation_id", AttributeType::String),
            AttributeSchema::new("private_ipv4_address", AttributeType::String),
            AttributeSchema::new("ipv6_address", AttributeType::String),
            AttributeSchema::new("outpost_id", AttributeType::String).computed(),
        ],
    )
}

fn table_attribute(name: &str, attr_type: AttributeType) -> AttributeSchema {
    AttributeSchema::new(name, attr_type).with_diff_suppress(not_applicable)
}

pub fn load_balancer_schema() -> ResourceSchema {
    let schema = ResourceSchema::new("elbv2.load_balancer")
        .with_description("Application, Network or Gateway Load Balancer")
        .attribute(
            AttributeSchema::new("internal", AttributeType::Bool)
                .force_new()
                .with_default(Value::Bool(false))
                .with_description("Internal (true) or internet-facing (false) scheme"),
        )
        .attribute(
            AttributeSchema::new("load_balancer_type", AttributeType::enum_of(LOAD_BALANCER_TYPES))
                .force_new()
                .with_default(Value::String("application".to_string())),
        )
        .attribute(
            AttributeSchema::new("security_groups", string_set())
                .with_description("Security group IDs (not supported by gateway load balancers)"),
        )
        .attribute(
            AttributeSchema::new("subnets", string_set())
                .conflicts_with(&["subnet_mapping"])
                .with_description("Subnet IDs to attach"),
        )
        .attribute(
            AttributeSchema::new(
                "subnet_mapping",
                AttributeType::Set(Box::new(subnet_mapping_block())),
            )
            .conflicts_with(&["subnets"])
            .with_description("Subnets with optional Elastic IP or private address"),
        )
        .attribute(AttributeSchema::new(
            "ip_address_type",
            AttributeType::enum_of(IP_ADDRESS_TYPES),
        ))
        .attribute(AttributeSchema::new("customer_owned_ipv4_pool", AttributeType::String).force_new())
        .attribute(table_attribute("access_logs", logs_block("AccessLogs")))
        .attribute(table_attribute("connection_logs", logs_block("ConnectionLogs")))
        .attribute(
            table_attribute("idle_timeout", int_range!(1, 4000)).with_default(Value::Int(60)),
        )
        .attribute(
            table_attribute("enable_deletion_protection", AttributeType::Bool)
                .with_default(Value::Bool(false)),
        )
        .attribute(table_attribute("enable_http2", AttributeType::Bool).with_default(Value::Bool(true)))
        .attribute(table_attribute("enable_cross_zone_load_balancing", AttributeType::Bool))
        .attribute(table_attribute("drop_invalid_header_fields", AttributeType::Bool))
        .attribute(table_attribute("preserve_host_header", AttributeType::Bool))
        .attribute(
            table_attribute(
                "desync_mitigation_mode",
                AttributeType::enum_of(&["monitor", "defensive", "strictest"]),
            )
            .with_default(Value::String("defensive".to_string())),
        )
        .attribute(table_attribute(
            "enable_tls_version_and_cipher_suite_headers",
            AttributeType::Bool,
        ))
        .attribute(table_attribute("enable_waf_fail_open", AttributeType::Bool))
        .attribute(table_attribute("enable_xff_client_port", AttributeType::Bool))
        .attribute(table_attribute(
            "xff_header_processing_mode",
            AttributeType::enum_of(&["append", "preserve", "remove"]),
        ))
        .attribute(table_attribute("client_keep_alive", int_range!(60, 604800)))
        .attribute(table_attribute(
            "dns_record_client_routing_policy",
            AttributeType::enum_of(&[
                "any_availability_zone",
                "availability_zone_affinity",
                "partial_availability_zone_affinity",
            ]),
        ))
        .attribute(table_attribute("enable_zonal_shift", AttributeType::Bool))
        .attribute(computed("arn_suffix", "ARN suffix for use with CloudWatch metrics"))
        .attribute(computed("dns_name", "DNS name of the load balancer"))
        .attribute(computed("zone_id", "Canonical hosted zone ID (for alias records)"))
        .attribute(computed("vpc_id", "VPC the load balancer lives in"))
        .with_validator(validate);

    with_common(with_name(schema, "load balancer"))
}

fn validate(attrs: &Attrs) -> Result<(), String> {
    let lb_type = get_str(attrs, "load_balancer_type").unwrap_or("application");

    if lb_type == "gateway" && !get_strings(attrs, "security_groups").is_empty() {
        return Err("security_groups cannot be set on a gateway load balancer".to_string());
    }
    if lb_type != "application" && attrs.contains_key("connection_logs") {
        return Err("connection_logs are only supported by application load balancers".to_string());
    }
    if !attrs.contains_key("subnets") && !attrs.contains_key("subnet_mapping") {
        return Err("one of subnets or subnet_mapping is required".to_string());
    }
    Ok(())
}
