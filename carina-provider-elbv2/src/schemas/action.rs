//! Action and condition blocks shared by listeners and listener rules

use std::sync::LazyLock;

use carina_core::resource::Value;
use carina_core::schema::{AttributeSchema, AttributeType, SuppressContext, types};
use regex::Regex;

use super::{int_range, string_set};
use crate::utils::{Attrs, get_block, get_blocks, get_str};

pub const ACTION_TYPES: &[&str] = &[
    "forward",
    "redirect",
    "fixed-response",
    "authenticate-cognito",
    "authenticate-oidc",
];

static STATUS_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[245]\d\d$").expect("static status code pattern"));

fn unless_type(ctx: &SuppressContext<'_>, action_type: &str) -> bool {
    ctx.sibling_str("type") != Some(action_type)
}

fn fixed_response_status() -> AttributeType {
    AttributeType::Custom {
        name: "FixedResponseStatusCode".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| match value {
            Value::String(s) if STATUS_CODE_RE.is_match(s) => Ok(()),
            Value::String(s) => Err(format!("'{}' is not a 2XX, 4XX or 5XX status code", s)),
            _ => Err("Expected string".to_string()),
        },
    }
}

fn forward_block() -> AttributeType {
    AttributeType::block(
        "Forward",
        vec![
            AttributeSchema::new(
                "target_group",
                AttributeType::Set(Box::new(AttributeType::block(
                    "WeightedTargetGroup",
                    vec![
                        AttributeSchema::new("arn", types::arn()).required(),
                        AttributeSchema::new("weight", int_range!(0, 999))
                            .with_default(Value::Int(1)),
                    ],
                ))),
            )
            .required()
            .with_min_items(1)
            .with_max_items(5),
            AttributeSchema::new(
                "stickiness",
                AttributeType::block(
                    "ForwardStickiness",
                    vec![
                        AttributeSchema::new("duration", int_range!(1, 604800)).required(),
                        AttributeSchema::new("enabled", AttributeType::Bool)
                            .with_default(Value::Bool(false)),
                    ],
                ),
            ),
        ],
    )
}

fn redirect_block() -> AttributeType {
    let placeholder = |name: &str, default: &str| {
        AttributeSchema::new(name, AttributeType::String).with_default(Value::String(default.to_string()))
    };
    AttributeType::block(
        "Redirect",
        vec![
            placeholder("host", "#{host}"),
            placeholder("path", "/#{path}"),
            placeholder("port", "#{port}"),
            AttributeSchema::new("protocol", AttributeType::enum_of(&["#{protocol}", "HTTP", "HTTPS"]))
                .with_default(Value::String("#{protocol}".to_string())),
            placeholder("query", "#{query}"),
            AttributeSchema::new("status_code", AttributeType::enum_of(&["HTTP_301", "HTTP_302"]))
                .required(),
        ],
    )
}

fn fixed_response_block() -> AttributeType {
    AttributeType::block(
        "FixedResponse",
        vec![
            AttributeSchema::new(
                "content_type",
                AttributeType::enum_of(&[
                    "text/plain",
                    "text/css",
                    "text/html",
                    "application/javascript",
                    "application/json",
                ]),
            )
            .required(),
            AttributeSchema::new("message_body", AttributeType::String),
            AttributeSchema::new("status_code", fixed_response_status()),
        ],
    )
}

/// Fields both authentication actions share
fn authenticate_common() -> Vec<AttributeSchema> {
    vec![
        AttributeSchema::new(
            "authentication_request_extra_params",
            AttributeType::Map(Box::new(AttributeType::String)),
        ),
        AttributeSchema::new(
            "on_unauthenticated_request",
            AttributeType::enum_of(&["deny", "allow", "authenticate"]),
        ),
        AttributeSchema::new("scope", AttributeType::String),
        AttributeSchema::new("session_cookie_name", AttributeType::String),
        AttributeSchema::new("session_timeout", AttributeType::Int),
    ]
}

fn authenticate_cognito_block() -> AttributeType {
    let mut fields = vec![
        AttributeSchema::new("user_pool_arn", types::arn()).required(),
        AttributeSchema::new("user_pool_client_id", AttributeType::String).required(),
        AttributeSchema::new("user_pool_domain", AttributeType::String).required(),
    ];
    fields.extend(authenticate_common());
    AttributeType::block("AuthenticateCognito", fields)
}

fn authenticate_oidc_block() -> AttributeType {
    let mut fields = vec![
        AttributeSchema::new("authorization_endpoint", AttributeType::String).required(),
        AttributeSchema::new("client_id", AttributeType::String).required(),
        AttributeSchema::new("client_secret", AttributeType::String)
            .required()
            .write_only(),
        AttributeSchema::new("issuer", AttributeType::String).required(),
        AttributeSchema::new("token_endpoint", AttributeType::String).required(),
        AttributeSchema::new("user_info_endpoint", AttributeType::String).required(),
    ];
    fields.extend(authenticate_common());
    AttributeType::block("AuthenticateOidc", fields)
}

/// Schema of one action block
pub fn action_type() -> AttributeType {
    AttributeType::block(
        "Action",
        vec![
            AttributeSchema::new("type", AttributeType::enum_of(ACTION_TYPES)).required(),
            AttributeSchema::new("order", int_range!(1, 50000))
                .with_description("Defaults to the position of the action (1-based)"),
            AttributeSchema::new("target_group_arn", types::arn())
                .with_diff_suppress(|ctx| unless_type(ctx, "forward")),
            AttributeSchema::new("forward", forward_block())
                .with_diff_suppress(|ctx| unless_type(ctx, "forward")),
            AttributeSchema::new("redirect", redirect_block())
                .with_diff_suppress(|ctx| unless_type(ctx, "redirect")),
            AttributeSchema::new("fixed_response", fixed_response_block())
                .with_diff_suppress(|ctx| unless_type(ctx, "fixed-response")),
            AttributeSchema::new("authenticate_cognito", authenticate_cognito_block())
                .with_diff_suppress(|ctx| unless_type(ctx, "authenticate-cognito")),
            AttributeSchema::new("authenticate_oidc", authenticate_oidc_block())
                .with_diff_suppress(|ctx| unless_type(ctx, "authenticate-oidc")),
        ],
    )
}

/// Ordered list of actions, at least one
pub fn actions_attribute(name: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::List(Box::new(action_type())))
        .required()
        .with_min_items(1)
}

// =============================================================================
// Conditions
// =============================================================================

pub const CONDITION_FIELDS: &[&str] = &[
    "host_header",
    "http_header",
    "http_request_method",
    "path_pattern",
    "query_string",
    "source_ip",
];

fn values_block(name: &str, values: AttributeType) -> AttributeType {
    AttributeType::block(
        name,
        vec![AttributeSchema::new("values", values).required().with_min_items(1)],
    )
}

/// Schema of one rule condition block
pub fn condition_type() -> AttributeType {
    AttributeType::block(
        "Condition",
        vec![
            AttributeSchema::new("host_header", values_block("HostHeader", string_set())),
            AttributeSchema::new(
                "http_header",
                AttributeType::block(
                    "HttpHeader",
                    vec![
                        AttributeSchema::new("http_header_name", AttributeType::String).required(),
                        AttributeSchema::new("values", string_set())
                            .required()
                            .with_min_items(1),
                    ],
                ),
            ),
            AttributeSchema::new(
                "http_request_method",
                values_block("HttpRequestMethod", string_set()),
            ),
            AttributeSchema::new("path_pattern", values_block("PathPattern", string_set())),
            AttributeSchema::new(
                "query_string",
                AttributeType::Set(Box::new(AttributeType::block(
                    "QueryString",
                    vec![
                        AttributeSchema::new("key", AttributeType::String),
                        AttributeSchema::new("value", AttributeType::String).required(),
                    ],
                ))),
            )
            .with_min_items(1),
            AttributeSchema::new(
                "source_ip",
                values_block("SourceIp", AttributeType::Set(Box::new(types::cidr()))),
            ),
        ],
    )
}

// =============================================================================
// Validation
// =============================================================================

/// Checks the action blocks of `key` for consistency between `type` and its sub-blocks
pub fn validate_actions(attrs: &Attrs, key: &str) -> Result<(), String> {
    for (index, action) in get_blocks(attrs, key).into_iter().enumerate() {
        validate_action(action).map_err(|e| format!("{}[{}]: {}", key, index, e))?;
    }
    Ok(())
}

fn validate_action(action: &Attrs) -> Result<(), String> {
    let Some(action_type) = get_str(action, "type") else {
        return Ok(());
    };

    let blocks = [
        ("forward", "forward"),
        ("redirect", "redirect"),
        ("fixed-response", "fixed_response"),
        ("authenticate-cognito", "authenticate_cognito"),
        ("authenticate-oidc", "authenticate_oidc"),
    ];
    for (block_type, block) in blocks {
        let present = action.contains_key(block);
        if block_type == action_type {
            if !present && block_type != "forward" {
                return Err(format!("{} is required for action type \"{}\"", block, action_type));
            }
        } else if present {
            return Err(format!(
                "{} cannot be specified for action type \"{}\"",
                block, action_type
            ));
        }
    }

    if action_type == "forward" {
        let target_group_arn = action.get("target_group_arn");
        let forward = get_block(action, "forward");
        match (target_group_arn, forward) {
            (None, None) => {
                return Err(
                    "forward actions need either target_group_arn or a forward block".to_string(),
                );
            }
            (Some(arn), Some(forward)) => {
                let groups = get_blocks(forward, "target_group");
                let same = groups.len() == 1 && groups[0].get("arn") == Some(arn);
                if !same {
                    return Err(
                        "target_group_arn and forward must name the same single target group"
                            .to_string(),
                    );
                }
            }
            _ => {}
        }
    } else if action.contains_key("target_group_arn") {
        return Err(format!(
            "target_group_arn cannot be specified for action type \"{}\"",
            action_type
        ));
    }

    Ok(())
}

/// Each condition block sets exactly one kind of condition
pub fn validate_conditions(attrs: &Attrs, key: &str) -> Result<(), String> {
    for (index, condition) in get_blocks(attrs, key).into_iter().enumerate() {
        let set: Vec<&str> = CONDITION_FIELDS
            .iter()
            .copied()
            .filter(|f| condition.contains_key(*f))
            .collect();
        if set.len() != 1 {
            return Err(format!(
                "{}[{}]: exactly one of {} must be set, got {}",
                key,
                index,
                CONDITION_FIELDS.join(", "),
                if set.is_empty() {
                    "none".to_string()
                } else {
                    set.join(", ")
                }
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn map(pairs: Vec<(&str, Value)>) -> Value {
        Value::Map(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    fn s(v: &str) -> Value {
        Value::String(v.to_string())
    }

    const TG: &str = "arn:aws:elasticloadbalancing:us-east-1:123456789012:targetgroup/web/1";

    fn with_actions(actions: Vec<Value>) -> Attrs {
        let mut attrs = HashMap::new();
        attrs.insert("default_action".to_string(), Value::List(actions));
        attrs
    }

    #[test]
    fn forward_needs_a_target() {
        let attrs = with_actions(vec![map(vec![("type", s("forward"))])]);
        let err = validate_actions(&attrs, "default_action").unwrap_err();
        assert!(err.starts_with("default_action[0]:"));

        let attrs = with_actions(vec![map(vec![("type", s("forward")), ("target_group_arn", s(TG))])]);
        assert!(validate_actions(&attrs, "default_action").is_ok());
    }

    #[test]
    fn forward_block_must_agree_with_target_group_arn() {
        let forward = |arn: &str| {
            map(vec![(
                "target_group",
                Value::List(vec![map(vec![("arn", s(arn))])]),
            )])
        };
        let ok = with_actions(vec![map(vec![
            ("type", s("forward")),
            ("target_group_arn", s(TG)),
            ("forward", forward(TG)),
        ])]);
        assert!(validate_actions(&ok, "default_action").is_ok());

        let bad = with_actions(vec![map(vec![
            ("type", s("forward")),
            ("target_group_arn", s(TG)),
            ("forward", forward("arn:aws:elasticloadbalancing:us-east-1:123456789012:targetgroup/other/2")),
        ])]);
        assert!(validate_actions(&bad, "default_action").is_err());
    }

    #[test]
    fn blocks_must_match_type() {
        let attrs = with_actions(vec![map(vec![
            ("type", s("redirect")),
            ("fixed_response", map(vec![("content_type", s("text/plain"))])),
        ])]);
        let err = validate_actions(&attrs, "default_action").unwrap_err();
        assert!(err.contains("redirect is required"));

        let attrs = with_actions(vec![map(vec![
            ("type", s("fixed-response")),
            ("fixed_response", map(vec![("content_type", s("text/plain"))])),
            ("target_group_arn", s(TG)),
        ])]);
        let err = validate_actions(&attrs, "default_action").unwrap_err();
        assert!(err.contains("target_group_arn cannot be specified"));
    }

    #[test]
    fn conditions_need_exactly_one_kind() {
        let mut attrs = HashMap::new();
        attrs.insert(
            "condition".to_string(),
            Value::List(vec![map(vec![
                ("host_header", map(vec![("values", Value::List(vec![s("a.example.com")]))])),
                ("path_pattern", map(vec![("values", Value::List(vec![s("/api/*")]))])),
            ])]),
        );
        let err = validate_conditions(&attrs, "condition").unwrap_err();
        assert!(err.contains("host_header, path_pattern"));
    }

    #[test]
    fn status_code_pattern() {
        let t = fixed_response_status();
        assert!(t.validate(&s("503")).is_ok());
        assert!(t.validate(&s("302")).is_err());
    }
}
