//! Data source schemas
//!
//! Lookup arguments are plain attributes; everything a lookup returns is
//! computed.

use carina_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{string_set, tags_type};

fn outputs(schema: ResourceSchema, fields: &[(&str, AttributeType)]) -> ResourceSchema {
    fields.iter().fold(schema, |schema, (name, attr_type)| {
        schema.attribute(AttributeSchema::new(*name, attr_type.clone()).computed())
    })
}

fn lookup_arn() -> AttributeSchema {
    AttributeSchema::new("arn", types::arn()).conflicts_with(&["name"])
}

fn lookup_name() -> AttributeSchema {
    AttributeSchema::new("name", AttributeType::String).conflicts_with(&["arn"])
}

pub fn load_balancer_schema() -> ResourceSchema {
    let schema = ResourceSchema::new("elbv2.load_balancer")
        .with_description("Looks up an existing load balancer")
        .attribute(lookup_arn())
        .attribute(lookup_name())
        .attribute(AttributeSchema::new("tags", tags_type()).with_description("Tags the load balancer must carry"));
    outputs(
        schema,
        &[
            ("id", AttributeType::String),
            ("arn_suffix", AttributeType::String),
            ("dns_name", AttributeType::String),
            ("zone_id", AttributeType::String),
            ("vpc_id", AttributeType::String),
            ("internal", AttributeType::Bool),
            ("load_balancer_type", AttributeType::String),
            ("ip_address_type", AttributeType::String),
            ("security_groups", string_set()),
            ("subnets", string_set()),
            ("customer_owned_ipv4_pool", AttributeType::String),
        ],
    )
}

pub fn listener_schema() -> ResourceSchema {
    let schema = ResourceSchema::new("elbv2.listener")
        .with_description("Looks up an existing listener by ARN, or by load balancer and port")
        .attribute(AttributeSchema::new("arn", types::arn()).conflicts_with(&["load_balancer_arn", "port"]))
        .attribute(AttributeSchema::new("load_balancer_arn", types::arn()))
        .attribute(AttributeSchema::new("port", types::port()));
    outputs(
        schema,
        &[
            ("id", AttributeType::String),
            ("protocol", AttributeType::String),
            ("ssl_policy", AttributeType::String),
            ("certificate_arn", AttributeType::String),
            ("alpn_policy", AttributeType::String),
            ("tags", tags_type()),
        ],
    )
    .with_validator(|attrs| {
        if attrs.contains_key("arn")
            || (attrs.contains_key("load_balancer_arn") && attrs.contains_key("port"))
        {
            Ok(())
        } else {
            Err("either arn or both load_balancer_arn and port are required".to_string())
        }
    })
}

pub fn target_group_schema() -> ResourceSchema {
    let schema = ResourceSchema::new("elbv2.target_group")
        .with_description("Looks up an existing target group")
        .attribute(lookup_arn())
        .attribute(lookup_name())
        .attribute(AttributeSchema::new("tags", tags_type()).with_description("Tags the target group must carry"));
    outputs(
        schema,
        &[
            ("id", AttributeType::String),
            ("arn_suffix", AttributeType::String),
            ("port", AttributeType::Int),
            ("protocol", AttributeType::String),
            ("protocol_version", AttributeType::String),
            ("vpc_id", AttributeType::String),
            ("target_type", AttributeType::String),
            ("load_balancer_arns", string_set()),
        ],
    )
}

pub fn trust_store_schema() -> ResourceSchema {
    let schema = ResourceSchema::new("elbv2.trust_store")
        .with_description("Looks up an existing trust store")
        .attribute(lookup_arn())
        .attribute(lookup_name());
    outputs(
        schema,
        &[
            ("id", AttributeType::String),
            ("arn_suffix", AttributeType::String),
            ("status", AttributeType::String),
        ],
    )
    .with_validator(|attrs| {
        if attrs.contains_key("arn") || attrs.contains_key("name") {
            Ok(())
        } else {
            Err("one of arn or name is required".to_string())
        }
    })
}

pub fn hosted_zone_id_schema() -> ResourceSchema {
    let schema = ResourceSchema::new("elbv2.hosted_zone_id")
        .with_description("Canonical hosted zone ID of load balancers in a region")
        .attribute(
            AttributeSchema::new("region", AttributeType::String)
                .with_description("Defaults to the provider region"),
        )
        .attribute(AttributeSchema::new(
            "load_balancer_type",
            AttributeType::enum_of(&["application", "network"]),
        ));
    outputs(schema, &[("id", AttributeType::String)])
}
