//! elbv2.target_group schema

use carina_core::resource::Value;
use carina_core::schema::{AttributeSchema, AttributeType, ResourceSchema, SuppressContext, types};

use super::{computed, int_range, string_set, with_common, with_name};
use crate::attributes::{self, Scope, TARGET_GROUP};
use crate::utils::{Attrs, get_block, get_str};

pub const PROTOCOLS: &[&str] = &["GENEVE", "HTTP", "HTTPS", "TCP", "TCP_UDP", "TLS", "UDP"];

pub const TARGET_TYPES: &[&str] = &["instance", "ip", "lambda", "alb"];

pub const STICKINESS_TYPES: &[&str] = &[
    "lb_cookie",
    "app_cookie",
    "source_ip",
    "source_ip_dest_ip",
    "source_ip_dest_ip_proto",
];

fn not_applicable(ctx: &SuppressContext<'_>) -> bool {
    let scope = Scope {
        protocol: ctx.root_str("protocol"),
        target_type: Some(ctx.root_str("target_type").unwrap_or("instance")),
        ..Default::default()
    };
    !attributes::applies(TARGET_GROUP, ctx.key, &scope)
}

fn table_attribute(name: &str, attr_type: AttributeType) -> AttributeSchema {
    AttributeSchema::new(name, attr_type).with_diff_suppress(not_applicable)
}

fn slow_start() -> AttributeType {
    AttributeType::Custom {
        name: "SlowStart".to_string(),
        base: Box::new(AttributeType::Int),
        validate: |value| match value {
            Value::Int(0) => Ok(()),
            Value::Int(n) if (30..=900).contains(n) => Ok(()),
            Value::Int(n) => Err(format!("slow_start must be 0 or 30-900 seconds, got {}", n)),
            _ => Err("Expected integer".to_string()),
        },
    }
}

fn health_check_block() -> AttributeType {
    AttributeType::block(
        "HealthCheck",
        vec![
            AttributeSchema::new("enabled", AttributeType::Bool).with_default(Value::Bool(true)),
            AttributeSchema::new("healthy_threshold", int_range!(2, 10)).with_default(Value::Int(3)),
            AttributeSchema::new("interval", int_range!(5, 300)).with_default(Value::Int(30)),
            AttributeSchema::new("matcher", AttributeType::String)
                .with_description("HTTP codes (\"200-299\") or, with protocol_version GRPC, gRPC codes"),
            AttributeSchema::new("path", AttributeType::String),
            AttributeSchema::new("port", AttributeType::String)
                .with_default(Value::String("traffic-port".to_string())),
            AttributeSchema::new("protocol", AttributeType::enum_of(&["HTTP", "HTTPS", "TCP"]))
                .with_default(Value::String("HTTP".to_string())),
            AttributeSchema::new("timeout", int_range!(2, 120)),
            AttributeSchema::new("unhealthy_threshold", int_range!(2, 10)).with_default(Value::Int(3)),
        ],
    )
}

fn stickiness_block() -> AttributeType {
    AttributeType::block(
        "Stickiness",
        vec![
            AttributeSchema::new("type", AttributeType::enum_of(STICKINESS_TYPES)).required(),
            AttributeSchema::new("cookie_duration", int_range!(1, 604800))
                .with_default(Value::Int(86400))
                .with_diff_suppress(|ctx| {
                    !matches!(ctx.sibling_str("type"), Some("lb_cookie" | "app_cookie"))
                }),
            AttributeSchema::new("cookie_name", AttributeType::String),
            AttributeSchema::new("enabled", AttributeType::Bool).with_default(Value::Bool(true)),
        ],
    )
}

fn target_failover_block() -> AttributeType {
    let mode = || AttributeType::enum_of(&["rebalance", "no_rebalance"]);
    AttributeType::block(
        "TargetFailover",
        vec![
            AttributeSchema::new("on_deregistration", mode()).required(),
            AttributeSchema::new("on_unhealthy", mode()).required(),
        ],
    )
}

pub fn target_group_schema() -> ResourceSchema {
    let schema = ResourceSchema::new("elbv2.target_group")
        .with_description("Target group routing requests to registered targets")
        .attribute(AttributeSchema::new("port", types::port()).force_new())
        .attribute(AttributeSchema::new("protocol", AttributeType::enum_of(PROTOCOLS)).force_new())
        .attribute(
            AttributeSchema::new("protocol_version", AttributeType::enum_of(&["GRPC", "HTTP1", "HTTP2"]))
                .force_new(),
        )
        .attribute(AttributeSchema::new("vpc_id", AttributeType::String).force_new())
        .attribute(
            AttributeSchema::new("target_type", AttributeType::enum_of(TARGET_TYPES))
                .force_new()
                .with_default(Value::String("instance".to_string())),
        )
        .attribute(
            AttributeSchema::new("ip_address_type", AttributeType::enum_of(&["ipv4", "ipv6"])).force_new(),
        )
        .attribute(AttributeSchema::new("health_check", health_check_block()))
        .attribute(AttributeSchema::new("stickiness", stickiness_block()))
        .attribute(table_attribute("target_failover", target_failover_block()))
        .attribute(
            table_attribute("deregistration_delay", int_range!(0, 3600)).with_default(Value::Int(300)),
        )
        .attribute(table_attribute("slow_start", slow_start()))
        .attribute(table_attribute("proxy_protocol_v2", AttributeType::Bool))
        .attribute(table_attribute("connection_termination", AttributeType::Bool))
        .attribute(table_attribute("lambda_multi_value_headers_enabled", AttributeType::Bool))
        .attribute(table_attribute(
            "load_balancing_algorithm_type",
            AttributeType::enum_of(&["round_robin", "least_outstanding_requests", "weighted_random"]),
        ))
        .attribute(table_attribute(
            "load_balancing_cross_zone_enabled",
            AttributeType::enum_of(&["true", "false", "use_load_balancer_configuration"]),
        ))
        .attribute(table_attribute("preserve_client_ip", AttributeType::Bool))
        .attribute(computed("arn_suffix", "ARN suffix for use with CloudWatch metrics"))
        .attribute(
            AttributeSchema::new("load_balancer_arns", string_set())
                .computed()
                .with_description("Load balancers routing to this target group"),
        )
        .with_validator(validate);

    with_common(with_name(schema, "target group"))
}

fn is_http(protocol: Option<&str>) -> bool {
    matches!(protocol, Some("HTTP" | "HTTPS"))
}

fn validate(attrs: &Attrs) -> Result<(), String> {
    let target_type = get_str(attrs, "target_type").unwrap_or("instance");
    let protocol = get_str(attrs, "protocol");

    if target_type == "lambda" {
        for key in ["port", "protocol", "vpc_id", "protocol_version"] {
            if attrs.contains_key(key) {
                return Err(format!("{} cannot be set for target_type lambda", key));
            }
        }
    } else {
        for key in ["port", "protocol", "vpc_id"] {
            if !attrs.contains_key(key) {
                return Err(format!("{} is required for target_type {}", key, target_type));
            }
        }
    }

    if attrs.contains_key("protocol_version") && protocol.is_some() && !is_http(protocol) {
        return Err("protocol_version is only supported with HTTP and HTTPS".to_string());
    }

    if let Some(stickiness) = get_block(attrs, "stickiness")
        && let Some(kind) = get_str(stickiness, "type")
        && matches!(kind, "lb_cookie" | "app_cookie")
        && protocol.is_some()
        && !is_http(protocol)
    {
        return Err(format!("stickiness type {} is only supported with HTTP and HTTPS", kind));
    }
    if let Some(stickiness) = get_block(attrs, "stickiness")
        && get_str(stickiness, "type") == Some("app_cookie")
        && !stickiness.contains_key("cookie_name")
    {
        return Err("stickiness.cookie_name is required for app_cookie stickiness".to_string());
    }

    if let Some(health_check) = get_block(attrs, "health_check")
        && get_str(health_check, "protocol") == Some("TCP")
    {
        for key in ["path", "matcher"] {
            if health_check.contains_key(key) {
                return Err(format!("health_check.{} is not supported with a TCP health check", key));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn attrs(pairs: Vec<(&str, Value)>) -> Attrs {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    fn s(v: &str) -> Value {
        Value::String(v.to_string())
    }

    fn http_group() -> Attrs {
        attrs(vec![
            ("port", Value::Int(80)),
            ("protocol", s("HTTP")),
            ("vpc_id", s("vpc-1")),
        ])
    }

    #[test]
    fn instance_groups_need_port_protocol_and_vpc() {
        let schema = target_group_schema();
        assert!(schema.validate(&http_group()).is_ok());

        let errors = schema.validate(&attrs(vec![("port", Value::Int(80))])).unwrap_err();
        assert!(errors[0].to_string().contains("protocol is required"));
    }

    #[test]
    fn lambda_groups_take_no_port() {
        let schema = target_group_schema();
        let lambda = attrs(vec![("target_type", s("lambda"))]);
        assert!(schema.validate(&lambda).is_ok());

        let mut with_port = lambda.clone();
        with_port.insert("port".to_string(), Value::Int(80));
        assert!(schema.validate(&with_port).is_err());
    }

    #[test]
    fn cookie_stickiness_needs_http() {
        let schema = target_group_schema();
        let mut stickiness = HashMap::new();
        stickiness.insert("type".to_string(), s("lb_cookie"));
        let mut desired = attrs(vec![
            ("port", Value::Int(80)),
            ("protocol", s("TCP")),
            ("vpc_id", s("vpc-1")),
            ("stickiness", Value::Map(stickiness.clone())),
        ]);
        assert!(schema.validate(&desired).is_err());

        stickiness.insert("type".to_string(), s("source_ip"));
        desired.insert("stickiness".to_string(), Value::Map(stickiness));
        assert!(schema.validate(&desired).is_ok());
    }

    #[test]
    fn slow_start_range() {
        let t = slow_start();
        assert!(t.validate(&Value::Int(0)).is_ok());
        assert!(t.validate(&Value::Int(10)).is_err());
        assert!(t.validate(&Value::Int(30)).is_ok());
    }

    #[test]
    fn tcp_health_checks_take_no_path() {
        let schema = target_group_schema();
        let mut health_check = HashMap::new();
        health_check.insert("protocol".to_string(), s("TCP"));
        health_check.insert("path".to_string(), s("/health"));
        let mut desired = http_group();
        desired.insert("health_check".to_string(), Value::Map(health_check));
        assert!(schema.validate(&desired).is_err());
    }

    #[test]
    fn defaults_reach_into_health_check() {
        let schema = target_group_schema();
        let mut desired = http_group();
        desired.insert("health_check".to_string(), Value::Map(HashMap::new()));
        schema.apply_defaults(&mut desired);
        let health_check = get_block(&desired, "health_check").unwrap();
        assert_eq!(health_check.get("interval"), Some(&Value::Int(30)));
        assert_eq!(health_check.get("port"), Some(&s("traffic-port")));
        assert_eq!(desired.get("deregistration_delay"), Some(&Value::Int(300)));
    }
}
