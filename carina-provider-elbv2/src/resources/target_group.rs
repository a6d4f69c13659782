//! elbv2.target_group

use std::collections::HashMap;

use carina_core::provider::{ProviderError, ProviderResult};
use carina_core::resource::{Resource, ResourceId, State, Value};
use carina_core::retry::{retry_when, retry_when_not_found};

use super::{desired_tags, existing};
use crate::api::{ApiResult, Lookup, codes};
use crate::arn::arn_suffix;
use crate::attributes::{self, Scope, TARGET_GROUP};
use crate::model::{Attributes, CreateTargetGroupInput, HealthCheck, Matcher, TargetGroup, Tags};
use crate::naming;
use crate::provider::Elbv2Provider;
use crate::tags;
use crate::utils::{
    Attrs, api_error, get_block, get_bool, get_i32, get_int, get_str, get_string, get_string_map,
    put, string_list, string_map,
};

pub const TYPE: &str = "elbv2.target_group";

const NAME_MAX: usize = 32;

fn scope<'a>(protocol: Option<&'a str>, target_type: &'a str) -> Scope<'a> {
    Scope {
        protocol,
        target_type: Some(target_type),
        ..Default::default()
    }
}

fn expand_health_check(attrs: &Attrs) -> HealthCheck {
    let Some(block) = get_block(attrs, "health_check") else {
        return HealthCheck::default();
    };
    let grpc = get_str(attrs, "protocol_version") == Some("GRPC");
    let matcher = get_string(block, "matcher").map(|code| {
        if grpc {
            Matcher {
                grpc_code: Some(code),
                ..Default::default()
            }
        } else {
            Matcher {
                http_code: Some(code),
                ..Default::default()
            }
        }
    });
    HealthCheck {
        enabled: get_bool(block, "enabled"),
        interval_seconds: get_i32(block, "interval"),
        path: get_string(block, "path"),
        port: get_string(block, "port"),
        protocol: get_string(block, "protocol"),
        timeout_seconds: get_i32(block, "timeout"),
        healthy_threshold: get_i32(block, "healthy_threshold"),
        unhealthy_threshold: get_i32(block, "unhealthy_threshold"),
        matcher,
    }
}

fn flatten_health_check(health_check: &HealthCheck) -> Value {
    let mut block = HashMap::new();
    put(&mut block, "enabled", health_check.enabled);
    put(&mut block, "interval", health_check.interval_seconds);
    put(&mut block, "path", health_check.path.clone());
    put(&mut block, "port", health_check.port.clone());
    put(&mut block, "protocol", health_check.protocol.clone());
    put(&mut block, "timeout", health_check.timeout_seconds);
    put(&mut block, "healthy_threshold", health_check.healthy_threshold);
    put(&mut block, "unhealthy_threshold", health_check.unhealthy_threshold);
    if let Some(matcher) = &health_check.matcher {
        put(
            &mut block,
            "matcher",
            matcher.http_code.clone().or_else(|| matcher.grpc_code.clone()),
        );
    }
    Value::Map(block)
}

/// Stickiness keys of the target group attributes
fn expand_stickiness(attrs: &Attrs, target_type: &str) -> Attributes {
    let mut result = Attributes::new();
    if target_type == "lambda" {
        return result;
    }
    let Some(block) = get_block(attrs, "stickiness") else {
        return result;
    };

    let enabled = get_bool(block, "enabled").unwrap_or(true);
    result.insert("stickiness.enabled".to_string(), enabled.to_string());
    let Some(kind) = get_str(block, "type") else {
        return result;
    };
    result.insert("stickiness.type".to_string(), kind.to_string());
    let duration = get_int(block, "cookie_duration").map(|d| d.to_string());
    match kind {
        "lb_cookie" => {
            if let Some(duration) = duration {
                result.insert("stickiness.lb_cookie.duration_seconds".to_string(), duration);
            }
        }
        "app_cookie" => {
            if let Some(name) = get_string(block, "cookie_name") {
                result.insert("stickiness.app_cookie.cookie_name".to_string(), name);
            }
            if let Some(duration) = duration {
                result.insert("stickiness.app_cookie.duration_seconds".to_string(), duration);
            }
        }
        _ => {}
    }
    result
}

fn flatten_stickiness(api_attributes: &Attributes) -> Option<Value> {
    let kind = api_attributes.get("stickiness.type")?;
    let mut block = HashMap::new();
    block.insert("type".to_string(), Value::from(kind.as_str()));
    put(
        &mut block,
        "enabled",
        api_attributes
            .get("stickiness.enabled")
            .and_then(|v| v.parse::<bool>().ok()),
    );
    let (duration_key, cookie_name) = if kind == "app_cookie" {
        (
            "stickiness.app_cookie.duration_seconds",
            api_attributes.get("stickiness.app_cookie.cookie_name"),
        )
    } else {
        ("stickiness.lb_cookie.duration_seconds", None)
    };
    put(
        &mut block,
        "cookie_duration",
        api_attributes.get(duration_key).and_then(|v| v.parse::<i64>().ok()),
    );
    put(&mut block, "cookie_name", cookie_name.map(String::as_str));
    Some(Value::Map(block))
}

pub(crate) async fn find(provider: &Elbv2Provider, lookup: Lookup) -> ApiResult<Option<TargetGroup>> {
    match provider.api.describe_target_groups(lookup).await {
        Ok(found) => Ok(found.into_iter().next()),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

pub async fn create(provider: &Elbv2Provider, resource: &Resource) -> ProviderResult<State> {
    let id = &resource.id;
    let attrs = &resource.attributes;
    let target_type = get_str(attrs, "target_type").unwrap_or("instance");

    let configured_name = get_str(attrs, "name");
    let name = naming::truncate(
        naming::name_or_prefix(configured_name, get_str(attrs, "name_prefix"), "tf-"),
        NAME_MAX,
    );

    // The API returns an existing group with identical settings instead of failing
    if let Some(configured_name) = configured_name
        && find(provider, Lookup::name(configured_name))
            .await
            .map_err(api_error(id, "looking up target group by name"))?
            .is_some()
    {
        return Err(ProviderError::new(format!(
            "a target group named '{}' already exists",
            configured_name
        ))
        .for_resource(id.clone()));
    }

    let mut input = CreateTargetGroupInput {
        name: name.clone(),
        target_type: Some(target_type.to_string()),
        ip_address_type: get_string(attrs, "ip_address_type"),
        health_check: expand_health_check(attrs),
        tags: get_string_map(attrs, "tags"),
        ..Default::default()
    };
    if target_type != "lambda" {
        input.port = get_i32(attrs, "port");
        input.protocol = get_string(attrs, "protocol");
        input.protocol_version = get_string(attrs, "protocol_version");
        input.vpc_id = get_string(attrs, "vpc_id");
    }

    log::info!("creating target group {}", name);
    let created = provider
        .api
        .create_target_group(input)
        .await
        .map_err(api_error(id, format!("creating target group {}", name)))?;
    let arn = created.arn.as_str();

    retry_when_not_found(&provider.policy(provider.timeouts.propagation), move || async move {
        find(provider, Lookup::arn(arn)).await
    })
    .await
    .map_err(api_error(id, "waiting for target group"))?
    .ok_or_else(|| {
        ProviderError::new(format!("target group {} did not become visible", arn))
            .for_resource(id.clone())
    })?;

    let mut desired = attributes::expand(
        TARGET_GROUP,
        attrs,
        &scope(get_str(attrs, "protocol"), target_type),
    );
    desired.extend(expand_stickiness(attrs, target_type));
    if !desired.is_empty() {
        provider
            .api
            .modify_target_group_attributes(arn, &desired)
            .await
            .map_err(api_error(id, "setting target group attributes"))?;
    }

    read(provider, id, Some(arn)).await
}

pub async fn read(
    provider: &Elbv2Provider,
    id: &ResourceId,
    identifier: Option<&str>,
) -> ProviderResult<State> {
    let Some(arn) = identifier else {
        return Ok(State::not_found(id.clone()));
    };
    let Some(tg) = find(provider, Lookup::arn(arn))
        .await
        .map_err(api_error(id, "describing target group"))?
    else {
        log::warn!("target group {} not found, removing from state", arn);
        return Ok(State::not_found(id.clone()));
    };

    let api_attributes = provider
        .api
        .describe_target_group_attributes(arn)
        .await
        .map_err(api_error(id, "describing target group attributes"))?;
    let tags = provider
        .api
        .describe_tags(arn)
        .await
        .map_err(api_error(id, "listing target group tags"))?;

    Ok(existing(id, arn, flatten_target_group(&tg, &api_attributes, &tags)))
}

/// State attributes of a target group (shared with the data source)
pub fn flatten_target_group(tg: &TargetGroup, api_attributes: &Attributes, tags: &Tags) -> Attrs {
    let target_type = tg.target_type.as_deref().unwrap_or("instance");
    let mut attrs = attributes::flatten(
        TARGET_GROUP,
        api_attributes,
        &scope(tg.protocol.as_deref(), target_type),
    );

    attrs.insert("arn".to_string(), Value::from(tg.arn.as_str()));
    attrs.insert("id".to_string(), Value::from(tg.arn.as_str()));
    attrs.insert("arn_suffix".to_string(), Value::from(arn_suffix(&tg.arn)));
    attrs.insert("name".to_string(), Value::from(tg.name.as_str()));
    put(&mut attrs, "name_prefix", naming::prefix_from_name(&tg.name));
    attrs.insert("target_type".to_string(), Value::from(target_type));
    put(&mut attrs, "port", tg.port);
    put(&mut attrs, "protocol", tg.protocol.clone());
    put(&mut attrs, "protocol_version", tg.protocol_version.clone());
    put(&mut attrs, "vpc_id", tg.vpc_id.clone());
    put(&mut attrs, "ip_address_type", tg.ip_address_type.clone());
    attrs.insert("health_check".to_string(), flatten_health_check(&tg.health_check));
    put(&mut attrs, "stickiness", flatten_stickiness(api_attributes));
    attrs.insert(
        "load_balancer_arns".to_string(),
        string_list(tg.load_balancer_arns.iter().cloned()),
    );
    attrs.insert("tags".to_string(), string_map(tags));
    attrs
}

/// Whether any configured field of a block differs from the stored one
fn block_changed(from: &Attrs, to: &Attrs, key: &str) -> bool {
    let Some(desired) = get_block(to, key) else {
        return false;
    };
    let current = get_block(from, key);
    desired
        .iter()
        .any(|(k, v)| current.and_then(|c| c.get(k)) != Some(v))
}

pub async fn update(
    provider: &Elbv2Provider,
    id: &ResourceId,
    arn: &str,
    from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    let attrs = &to.attributes;
    let target_type = get_str(attrs, "target_type").unwrap_or("instance");

    if block_changed(&from.attributes, attrs, "health_check") {
        log::info!("modifying health check of {}", arn);
        provider
            .api
            .modify_target_group(arn, &expand_health_check(attrs))
            .await
            .map_err(api_error(id, "modifying health check"))?;
    }

    let mut desired = attributes::expand(
        TARGET_GROUP,
        attrs,
        &scope(get_str(attrs, "protocol"), target_type),
    );
    desired.extend(expand_stickiness(attrs, target_type));
    let was_sticky = get_block(&from.attributes, "stickiness")
        .and_then(|b| get_bool(b, "enabled"))
        .unwrap_or(false);
    if was_sticky && !attrs.contains_key("stickiness") && target_type != "lambda" {
        desired.insert("stickiness.enabled".to_string(), "false".to_string());
    }

    let current = provider
        .api
        .describe_target_group_attributes(arn)
        .await
        .map_err(api_error(id, "describing target group attributes"))?;
    let changes = attributes::changes(&desired, &current);
    if !changes.is_empty() {
        log::info!(
            "modifying target group attributes of {}: {:?}",
            arn,
            changes.keys().collect::<Vec<_>>()
        );
        provider
            .api
            .modify_target_group_attributes(arn, &changes)
            .await
            .map_err(api_error(id, "modifying target group attributes"))?;
    }

    if let Some(desired) = desired_tags(attrs) {
        tags::update(
            provider.api.as_ref(),
            arn,
            &get_string_map(&from.attributes, "tags"),
            &desired,
        )
        .await
        .map_err(api_error(id, "updating tags"))?;
    }

    read(provider, id, Some(arn)).await
}

/// Deleting fails with `ResourceInUse` until listeners and rules stop forwarding to the group
pub async fn delete(provider: &Elbv2Provider, id: &ResourceId, arn: &str) -> ProviderResult<()> {
    log::info!("deleting target group {}", arn);
    retry_when(
        &provider.policy(provider.timeouts.target_group_delete),
        move || async move { provider.api.delete_target_group(arn).await },
        |e| e.is(codes::RESOURCE_IN_USE),
    )
    .await
    .map_err(api_error(id, "deleting target group"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support::{block, provider, resource, s, tags};

    fn http_group(pairs: Vec<(&str, Value)>) -> Resource {
        let mut r = resource(
            TYPE,
            "web",
            vec![
                ("name", s("web")),
                ("port", Value::Int(80)),
                ("protocol", s("HTTP")),
                ("vpc_id", s("vpc-1")),
                ("target_type", s("instance")),
                ("deregistration_delay", Value::Int(30)),
            ],
        );
        for (k, v) in pairs {
            r.attributes.insert(k.to_string(), v);
        }
        r
    }

    #[tokio::test]
    async fn create_sets_attributes_and_stickiness() {
        let (fake, provider) = provider();
        let r = http_group(vec![
            (
                "stickiness",
                block(vec![
                    ("type", s("lb_cookie")),
                    ("cookie_duration", Value::Int(3600)),
                    ("enabled", Value::Bool(true)),
                ]),
            ),
            ("proxy_protocol_v2", Value::Bool(true)),
        ]);

        let state = create(&provider, &r).await.unwrap();
        let arn = state.identifier.clone().unwrap();
        let api = fake.target_group_attributes(&arn);

        assert_eq!(api.get("deregistration_delay.timeout_seconds").map(String::as_str), Some("30"));
        assert_eq!(api.get("stickiness.type").map(String::as_str), Some("lb_cookie"));
        assert_eq!(api.get("stickiness.lb_cookie.duration_seconds").map(String::as_str), Some("3600"));
        // TCP only
        assert!(!api.contains_key("proxy_protocol_v2.enabled"));

        let stickiness = state.attributes.get("stickiness").and_then(Value::as_map).unwrap();
        assert_eq!(stickiness.get("cookie_duration"), Some(&Value::Int(3600)));
        assert_eq!(state.attributes.get("deregistration_delay"), Some(&Value::Int(30)));
        assert!(state.attributes.get("arn_suffix").and_then(Value::as_str).unwrap().starts_with("targetgroup/web/"));
    }

    #[tokio::test]
    async fn lambda_groups_skip_network_settings() {
        let (fake, provider) = provider();
        let r = resource(
            TYPE,
            "fn",
            vec![
                ("name", s("fn")),
                ("target_type", s("lambda")),
                ("deregistration_delay", Value::Int(300)),
                ("lambda_multi_value_headers_enabled", Value::Bool(true)),
            ],
        );
        let state = create(&provider, &r).await.unwrap();
        let api = fake.target_group_attributes(state.identifier.as_deref().unwrap());
        assert!(!api.contains_key("deregistration_delay.timeout_seconds"));
        assert_eq!(api.get("lambda.multi_value_headers.enabled").map(String::as_str), Some("true"));
        assert!(state.attributes.get("port").is_none());
    }

    #[tokio::test]
    async fn grpc_matcher_uses_grpc_codes() {
        let (_, provider) = provider();
        let r = http_group(vec![
            ("protocol_version", s("GRPC")),
            ("health_check", block(vec![("matcher", s("0-99")), ("path", s("/grpc.health.v1.Health/Check"))])),
        ]);
        let health_check = expand_health_check(&r.attributes);
        assert_eq!(health_check.matcher.as_ref().and_then(|m| m.grpc_code.as_deref()), Some("0-99"));

        let state = create(&provider, &r).await.unwrap();
        let flattened = state.attributes.get("health_check").and_then(Value::as_map).unwrap();
        assert_eq!(flattened.get("matcher"), Some(&s("0-99")));
    }

    #[tokio::test]
    async fn explicit_name_must_be_unused() {
        let (fake, provider) = provider();
        create(&provider, &http_group(vec![])).await.unwrap();
        let err = create(&provider, &http_group(vec![])).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(fake.count("create_target_group"), 1);
    }

    #[tokio::test]
    async fn removing_stickiness_disables_it() {
        let (fake, provider) = provider();
        let created = create(
            &provider,
            &http_group(vec![("stickiness", block(vec![("type", s("lb_cookie")), ("enabled", Value::Bool(true))]))]),
        )
        .await
        .unwrap();
        let arn = created.identifier.clone().unwrap();

        let to = http_group(vec![("tags", tags(&[("team", "web")]))]);
        update(&provider, &to.id, &arn, &created, &to).await.unwrap();

        assert_eq!(
            fake.target_group_attributes(&arn).get("stickiness.enabled").map(String::as_str),
            Some("false")
        );
        assert_eq!(fake.count("modify_target_group"), 0);
        assert_eq!(fake.tags_of(&arn).get("team").map(String::as_str), Some("web"));
    }

    #[tokio::test]
    async fn health_check_changes_modify_the_group() {
        let (fake, provider) = provider();
        let created = create(&provider, &http_group(vec![("health_check", block(vec![("path", s("/"))]))]))
            .await
            .unwrap();
        let arn = created.identifier.clone().unwrap();

        let to = http_group(vec![("health_check", block(vec![("path", s("/healthz"))]))]);
        let state = update(&provider, &to.id, &arn, &created, &to).await.unwrap();

        assert_eq!(fake.count("modify_target_group"), 1);
        let health_check = state.attributes.get("health_check").and_then(Value::as_map).unwrap();
        assert_eq!(health_check.get("path"), Some(&s("/healthz")));
    }

    #[tokio::test]
    async fn delete_retries_while_in_use() {
        let (fake, provider) = provider();
        let created = create(&provider, &http_group(vec![])).await.unwrap();
        fake.fail_next("delete_target_group", codes::RESOURCE_IN_USE, 2);

        delete(&provider, &created.id, created.identifier.as_deref().unwrap())
            .await
            .unwrap();
        assert_eq!(fake.count("delete_target_group"), 3);
    }

    #[tokio::test]
    async fn delete_gives_up_with_the_api_error() {
        let (fake, provider) = provider();
        let created = create(&provider, &http_group(vec![])).await.unwrap();
        fake.fail_next("delete_target_group", codes::RESOURCE_IN_USE, 10_000);

        let err = delete(&provider, &created.id, created.identifier.as_deref().unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains(codes::RESOURCE_IN_USE));
    }
}
