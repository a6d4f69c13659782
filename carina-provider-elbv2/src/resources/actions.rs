//! Expand and flatten listener actions and rule conditions

use std::collections::HashMap;

use carina_core::resource::Value;

use crate::model::{
    Action, AuthenticateCognitoConfig, AuthenticateOidcConfig, FixedResponseConfig, ForwardConfig,
    QueryStringPair, RedirectConfig, RuleCondition, TargetGroupTuple,
};
use crate::utils::{
    Attrs, get_block, get_blocks, get_bool, get_i32, get_int, get_str, get_string, get_string_map,
    get_strings, put, string_list, string_map,
};

// =============================================================================
// Actions
// =============================================================================

/// Actions in configuration order; `order` defaults to the 1-based position
pub fn expand_actions(attrs: &Attrs, key: &str) -> Vec<Action> {
    get_blocks(attrs, key)
        .into_iter()
        .enumerate()
        .map(|(index, block)| expand_action(block, index as i32 + 1))
        .collect()
}

fn expand_action(block: &Attrs, position: i32) -> Action {
    let action_type = get_string(block, "type").unwrap_or_default();
    let mut action = Action {
        order: Some(get_i32(block, "order").unwrap_or(position)),
        ..Default::default()
    };

    match action_type.as_str() {
        "forward" => {
            action.target_group_arn = get_string(block, "target_group_arn");
            action.forward = get_block(block, "forward").map(expand_forward);
        }
        "redirect" => {
            action.redirect = get_block(block, "redirect").map(|b| RedirectConfig {
                host: get_string(b, "host"),
                path: get_string(b, "path"),
                port: get_string(b, "port"),
                protocol: get_string(b, "protocol"),
                query: get_string(b, "query"),
                status_code: get_string(b, "status_code").unwrap_or_default(),
            });
        }
        "fixed-response" => {
            action.fixed_response = get_block(block, "fixed_response").map(|b| FixedResponseConfig {
                content_type: get_string(b, "content_type"),
                message_body: get_string(b, "message_body"),
                status_code: get_string(b, "status_code").unwrap_or_default(),
            });
        }
        "authenticate-cognito" => {
            action.authenticate_cognito =
                get_block(block, "authenticate_cognito").map(|b| AuthenticateCognitoConfig {
                    user_pool_arn: get_string(b, "user_pool_arn").unwrap_or_default(),
                    user_pool_client_id: get_string(b, "user_pool_client_id").unwrap_or_default(),
                    user_pool_domain: get_string(b, "user_pool_domain").unwrap_or_default(),
                    authentication_request_extra_params: get_string_map(
                        b,
                        "authentication_request_extra_params",
                    ),
                    on_unauthenticated_request: get_string(b, "on_unauthenticated_request"),
                    scope: get_string(b, "scope"),
                    session_cookie_name: get_string(b, "session_cookie_name"),
                    session_timeout: get_int(b, "session_timeout"),
                });
        }
        "authenticate-oidc" => {
            action.authenticate_oidc =
                get_block(block, "authenticate_oidc").map(|b| AuthenticateOidcConfig {
                    issuer: get_string(b, "issuer").unwrap_or_default(),
                    authorization_endpoint: get_string(b, "authorization_endpoint")
                        .unwrap_or_default(),
                    token_endpoint: get_string(b, "token_endpoint").unwrap_or_default(),
                    user_info_endpoint: get_string(b, "user_info_endpoint").unwrap_or_default(),
                    client_id: get_string(b, "client_id").unwrap_or_default(),
                    client_secret: get_string(b, "client_secret"),
                    authentication_request_extra_params: get_string_map(
                        b,
                        "authentication_request_extra_params",
                    ),
                    on_unauthenticated_request: get_string(b, "on_unauthenticated_request"),
                    scope: get_string(b, "scope"),
                    session_cookie_name: get_string(b, "session_cookie_name"),
                    session_timeout: get_int(b, "session_timeout"),
                });
        }
        _ => {}
    }

    action.action_type = action_type;
    action
}

fn expand_forward(block: &Attrs) -> ForwardConfig {
    let stickiness = get_block(block, "stickiness");
    ForwardConfig {
        target_groups: get_blocks(block, "target_group")
            .into_iter()
            .map(|tg| TargetGroupTuple {
                arn: get_string(tg, "arn").unwrap_or_default(),
                weight: get_i32(tg, "weight"),
            })
            .collect(),
        stickiness_enabled: stickiness.and_then(|s| get_bool(s, "enabled")),
        stickiness_duration: stickiness.and_then(|s| get_i32(s, "duration")),
    }
}

/// Actions as state, sorted by order
pub fn flatten_actions(actions: &[Action]) -> Value {
    let mut sorted: Vec<&Action> = actions.iter().collect();
    sorted.sort_by_key(|a| a.order.unwrap_or(i32::MAX));
    Value::List(sorted.into_iter().map(flatten_action).collect())
}

fn flatten_action(action: &Action) -> Value {
    let mut attrs = Attrs::new();
    attrs.insert("type".to_string(), Value::from(action.action_type.as_str()));
    put(&mut attrs, "order", action.order);
    put(&mut attrs, "target_group_arn", action.target_group_arn.clone());

    if let Some(forward) = &action.forward {
        let mut block = Attrs::new();
        block.insert(
            "target_group".to_string(),
            Value::List(
                forward
                    .target_groups
                    .iter()
                    .map(|tg| {
                        let mut t = Attrs::new();
                        t.insert("arn".to_string(), Value::from(tg.arn.as_str()));
                        t.insert("weight".to_string(), Value::from(tg.weight.unwrap_or(1)));
                        Value::Map(t)
                    })
                    .collect(),
            ),
        );
        if let Some(duration) = forward.stickiness_duration {
            let mut stickiness = Attrs::new();
            stickiness.insert("duration".to_string(), Value::from(duration));
            stickiness.insert(
                "enabled".to_string(),
                Value::from(forward.stickiness_enabled.unwrap_or(false)),
            );
            block.insert("stickiness".to_string(), Value::Map(stickiness));
        }
        attrs.insert("forward".to_string(), Value::Map(block));
    }

    if let Some(redirect) = &action.redirect {
        let mut block = Attrs::new();
        put(&mut block, "host", redirect.host.clone());
        put(&mut block, "path", redirect.path.clone());
        put(&mut block, "port", redirect.port.clone());
        put(&mut block, "protocol", redirect.protocol.clone());
        put(&mut block, "query", redirect.query.clone());
        block.insert("status_code".to_string(), Value::from(redirect.status_code.as_str()));
        attrs.insert("redirect".to_string(), Value::Map(block));
    }

    if let Some(fixed) = &action.fixed_response {
        let mut block = Attrs::new();
        put(&mut block, "content_type", fixed.content_type.clone());
        put(&mut block, "message_body", fixed.message_body.clone());
        block.insert("status_code".to_string(), Value::from(fixed.status_code.as_str()));
        attrs.insert("fixed_response".to_string(), Value::Map(block));
    }

    if let Some(cognito) = &action.authenticate_cognito {
        let mut block = authenticate_common(
            &cognito.authentication_request_extra_params,
            &cognito.on_unauthenticated_request,
            &cognito.scope,
            &cognito.session_cookie_name,
            cognito.session_timeout,
        );
        block.insert("user_pool_arn".to_string(), Value::from(cognito.user_pool_arn.as_str()));
        block.insert(
            "user_pool_client_id".to_string(),
            Value::from(cognito.user_pool_client_id.as_str()),
        );
        block.insert(
            "user_pool_domain".to_string(),
            Value::from(cognito.user_pool_domain.as_str()),
        );
        attrs.insert("authenticate_cognito".to_string(), Value::Map(block));
    }

    if let Some(oidc) = &action.authenticate_oidc {
        let mut block = authenticate_common(
            &oidc.authentication_request_extra_params,
            &oidc.on_unauthenticated_request,
            &oidc.scope,
            &oidc.session_cookie_name,
            oidc.session_timeout,
        );
        for (key, value) in [
            ("issuer", &oidc.issuer),
            ("authorization_endpoint", &oidc.authorization_endpoint),
            ("token_endpoint", &oidc.token_endpoint),
            ("user_info_endpoint", &oidc.user_info_endpoint),
            ("client_id", &oidc.client_id),
        ] {
            block.insert(key.to_string(), Value::from(value.as_str()));
        }
        // client_secret is never returned
        attrs.insert("authenticate_oidc".to_string(), Value::Map(block));
    }

    Value::Map(attrs)
}

fn authenticate_common(
    extra_params: &std::collections::BTreeMap<String, String>,
    on_unauthenticated_request: &Option<String>,
    scope: &Option<String>,
    session_cookie_name: &Option<String>,
    session_timeout: Option<i64>,
) -> Attrs {
    let mut block = Attrs::new();
    if !extra_params.is_empty() {
        block.insert(
            "authentication_request_extra_params".to_string(),
            string_map(extra_params),
        );
    }
    put(&mut block, "on_unauthenticated_request", on_unauthenticated_request.clone());
    put(&mut block, "scope", scope.clone());
    put(&mut block, "session_cookie_name", session_cookie_name.clone());
    put(&mut block, "session_timeout", session_timeout);
    block
}

/// Target groups an action list routes to
pub fn target_group_arns(actions: &[Action]) -> Vec<String> {
    let mut arns: Vec<String> = actions
        .iter()
        .flat_map(|a| {
            a.target_group_arn.iter().cloned().chain(
                a.forward
                    .iter()
                    .flat_map(|f| f.target_groups.iter().map(|t| t.arn.clone())),
            )
        })
        .collect();
    arns.sort();
    arns.dedup();
    arns
}

// =============================================================================
// Conditions
// =============================================================================

fn values(block: Option<&Attrs>) -> Vec<String> {
    block.map(|b| get_strings(b, "values")).unwrap_or_default()
}

pub fn expand_conditions(attrs: &Attrs, key: &str) -> Vec<RuleCondition> {
    get_blocks(attrs, key)
        .into_iter()
        .map(|block| RuleCondition {
            host_header: values(get_block(block, "host_header")),
            path_pattern: values(get_block(block, "path_pattern")),
            http_header: get_block(block, "http_header").map(|b| {
                (
                    get_string(b, "http_header_name").unwrap_or_default(),
                    get_strings(b, "values"),
                )
            }),
            http_request_method: values(get_block(block, "http_request_method")),
            query_string: get_blocks(block, "query_string")
                .into_iter()
                .map(|q| QueryStringPair {
                    key: get_string(q, "key"),
                    value: get_string(q, "value").unwrap_or_default(),
                })
                .collect(),
            source_ip: values(get_block(block, "source_ip")),
        })
        .collect()
}

fn values_block(values: &[String]) -> Value {
    let mut block = HashMap::new();
    block.insert("values".to_string(), string_list(values.iter().cloned()));
    Value::Map(block)
}

pub fn flatten_conditions(conditions: &[RuleCondition]) -> Value {
    Value::List(
        conditions
            .iter()
            .map(|c| {
                let mut attrs = Attrs::new();
                if !c.host_header.is_empty() {
                    attrs.insert("host_header".to_string(), values_block(&c.host_header));
                }
                if !c.path_pattern.is_empty() {
                    attrs.insert("path_pattern".to_string(), values_block(&c.path_pattern));
                }
                if let Some((name, values)) = &c.http_header {
                    let mut block = HashMap::new();
                    block.insert("http_header_name".to_string(), Value::from(name.as_str()));
                    block.insert("values".to_string(), string_list(values.iter().cloned()));
                    attrs.insert("http_header".to_string(), Value::Map(block));
                }
                if !c.http_request_method.is_empty() {
                    attrs.insert(
                        "http_request_method".to_string(),
                        values_block(&c.http_request_method),
                    );
                }
                if !c.query_string.is_empty() {
                    attrs.insert(
                        "query_string".to_string(),
                        Value::List(
                            c.query_string
                                .iter()
                                .map(|q| {
                                    let mut pair = HashMap::new();
                                    put(&mut pair, "key", q.key.clone());
                                    pair.insert("value".to_string(), Value::from(q.value.as_str()));
                                    Value::Map(pair)
                                })
                                .collect(),
                        ),
                    );
                }
                if !c.source_ip.is_empty() {
                    attrs.insert("source_ip".to_string(), values_block(&c.source_ip));
                }
                Value::Map(attrs)
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(pairs: Vec<(&str, Value)>) -> Value {
        Value::Map(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    fn s(v: &str) -> Value {
        Value::String(v.to_string())
    }

    fn config(actions: Vec<Value>) -> Attrs {
        let mut attrs = Attrs::new();
        attrs.insert("action".to_string(), Value::List(actions));
        attrs
    }

    #[test]
    fn order_defaults_to_position() {
        let attrs = config(vec![
            block(vec![
                ("type", s("authenticate-oidc")),
                (
                    "authenticate_oidc",
                    block(vec![
                        ("issuer", s("https://idp.example.com")),
                        ("authorization_endpoint", s("https://idp.example.com/auth")),
                        ("token_endpoint", s("https://idp.example.com/token")),
                        ("user_info_endpoint", s("https://idp.example.com/userinfo")),
                        ("client_id", s("client")),
                        ("client_secret", s("secret")),
                    ]),
                ),
            ]),
            block(vec![("type", s("forward")), ("target_group_arn", s("tg-arn"))]),
        ]);
        let actions = expand_actions(&attrs, "action");
        assert_eq!(actions[0].order, Some(1));
        assert_eq!(actions[1].order, Some(2));
        assert_eq!(
            actions[0].authenticate_oidc.as_ref().and_then(|o| o.client_secret.as_deref()),
            Some("secret")
        );
        assert_eq!(actions[1].target_group_arn.as_deref(), Some("tg-arn"));
    }

    #[test]
    fn flatten_sorts_by_order_and_hides_secret() {
        let actions = vec![
            Action {
                action_type: "forward".to_string(),
                order: Some(2),
                target_group_arn: Some("tg".to_string()),
                ..Default::default()
            },
            Action {
                action_type: "authenticate-oidc".to_string(),
                order: Some(1),
                authenticate_oidc: Some(AuthenticateOidcConfig {
                    client_secret: Some("secret".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ];
        let Value::List(items) = flatten_actions(&actions) else {
            panic!("expected list");
        };
        let first = items[0].as_map().unwrap();
        assert_eq!(first.get("type"), Some(&s("authenticate-oidc")));
        let oidc = first.get("authenticate_oidc").and_then(Value::as_map).unwrap();
        assert!(!oidc.contains_key("client_secret"));
    }

    #[test]
    fn weighted_forward_round_trips() {
        let attrs = config(vec![block(vec![
            ("type", s("forward")),
            (
                "forward",
                block(vec![
                    (
                        "target_group",
                        Value::List(vec![
                            block(vec![("arn", s("tg-a")), ("weight", Value::Int(80))]),
                            block(vec![("arn", s("tg-b")), ("weight", Value::Int(20))]),
                        ]),
                    ),
                    (
                        "stickiness",
                        block(vec![("duration", Value::Int(3600)), ("enabled", Value::Bool(true))]),
                    ),
                ]),
            ),
        ])]);
        let actions = expand_actions(&attrs, "action");
        let forward = actions[0].forward.as_ref().unwrap();
        assert_eq!(forward.target_groups.len(), 2);
        assert_eq!(forward.stickiness_duration, Some(3600));
        assert_eq!(target_group_arns(&actions), vec!["tg-a".to_string(), "tg-b".to_string()]);

        let Value::List(flat) = flatten_actions(&actions) else {
            panic!("expected list");
        };
        let original = attrs.get("action").and_then(Value::as_list).unwrap();
        let want = original[0].as_map().unwrap().get("forward");
        let have = flat[0].as_map().unwrap().get("forward");
        assert_eq!(want, have);
    }

    #[test]
    fn conditions_round_trip() {
        let mut attrs = Attrs::new();
        let conditions = Value::List(vec![
            block(vec![(
                "http_header",
                block(vec![
                    ("http_header_name", s("X-Env")),
                    ("values", Value::List(vec![s("prod")])),
                ]),
            )]),
            block(vec![(
                "query_string",
                Value::List(vec![block(vec![("key", s("v")), ("value", s("2"))])]),
            )]),
        ]);
        attrs.insert("condition".to_string(), conditions.clone());
        let expanded = expand_conditions(&attrs, "condition");
        assert_eq!(expanded[0].http_header, Some(("X-Env".to_string(), vec!["prod".to_string()])));
        assert_eq!(flatten_conditions(&expanded), conditions);
    }
}
