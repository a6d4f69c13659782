//! ELBv2 resource and data source schema definitions

pub mod action;
pub mod data_sources;
pub mod listener;
pub mod listener_rule;
pub mod load_balancer;
pub mod target_group;
pub mod target_group_attachment;
pub mod trust_store;

use carina_core::resource::Value;
use carina_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

/// Integer constrained to an inclusive range
macro_rules! int_range {
    ($min:expr, $max:expr) => {
        carina_core::schema::AttributeType::Custom {
            name: format!("Int({}..={})", $min, $max),
            base: Box::new(carina_core::schema::AttributeType::Int),
            validate: |value| match value {
                carina_core::resource::Value::Int(n) if ($min..=$max).contains(n) => Ok(()),
                carina_core::resource::Value::Int(n) => {
                    Err(format!("{} is out of range {}-{}", n, $min, $max))
                }
                _ => Err("Expected integer".to_string()),
            },
        }
    };
}

pub(crate) use int_range;

/// Returns all resource schemas
pub fn resource_schemas() -> Vec<ResourceSchema> {
    vec![
        load_balancer::load_balancer_schema(),
        target_group::target_group_schema(),
        listener::listener_schema(),
        listener_rule::listener_rule_schema(),
        target_group_attachment::target_group_attachment_schema(),
        target_group_attachment::target_group_registration_schema(),
        trust_store::trust_store_schema(),
        trust_store::trust_store_revocation_schema(),
    ]
}

/// Returns all data source schemas
pub fn data_source_schemas() -> Vec<ResourceSchema> {
    vec![
        data_sources::load_balancer_schema(),
        data_sources::listener_schema(),
        data_sources::target_group_schema(),
        data_sources::trust_store_schema(),
        data_sources::hosted_zone_id_schema(),
    ]
}

/// Tags type (string map)
pub fn tags_type() -> AttributeType {
    AttributeType::Map(Box::new(AttributeType::String))
}

pub fn string_set() -> AttributeType {
    AttributeType::Set(Box::new(AttributeType::String))
}

/// `tags` plus the computed `arn` and `id` every ARN-identified resource has
pub fn with_common(schema: ResourceSchema) -> ResourceSchema {
    schema
        .attribute(AttributeSchema::new("tags", tags_type()).with_description("Resource tags"))
        .attribute(computed("arn", "ARN of the resource"))
        .attribute(computed("id", "Provider-side identifier (the ARN)"))
}

pub fn computed(name: &str, description: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::String)
        .computed()
        .with_description(description)
}

fn check_name(s: &str, max: usize, allow_trailing_hyphen: bool) -> Result<(), String> {
    if s.is_empty() || s.len() > max {
        return Err(format!("'{}' must be 1-{} characters long", s, max));
    }
    if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(format!(
            "'{}' may only contain alphanumeric characters and hyphens",
            s
        ));
    }
    if s.starts_with('-') || (!allow_trailing_hyphen && s.ends_with('-')) {
        return Err(format!("'{}' cannot begin or end with a hyphen", s));
    }
    Ok(())
}

/// Name of a load balancer, target group or trust store
pub fn elb_name() -> AttributeType {
    AttributeType::Custom {
        name: "ElbName".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| match value {
            Value::String(s) => {
                check_name(s, 32, false)?;
                if s.starts_with("internal-") {
                    return Err(format!("'{}' cannot begin with \"internal-\"", s));
                }
                Ok(())
            }
            _ => Err("Expected string".to_string()),
        },
    }
}

/// Prefix of a generated name
pub fn elb_name_prefix() -> AttributeType {
    AttributeType::Custom {
        name: "ElbNamePrefix".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| match value {
            Value::String(s) => check_name(s, 6, true),
            _ => Err("Expected string".to_string()),
        },
    }
}

/// `name` and `name_prefix`, mutually exclusive and force-new
pub fn with_name(schema: ResourceSchema, what: &str) -> ResourceSchema {
    schema
        .attribute(
            AttributeSchema::new("name", elb_name())
                .force_new()
                .conflicts_with(&["name_prefix"])
                .with_description(format!("Name of the {}; generated when omitted", what)),
        )
        .attribute(
            AttributeSchema::new("name_prefix", elb_name_prefix())
                .force_new()
                .conflicts_with(&["name"])
                .with_description("Creates a unique name beginning with this prefix"),
        )
}
