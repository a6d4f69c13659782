//! elbv2.listener_rule

use carina_core::differ::changed_attributes;
use carina_core::provider::{ProviderError, ProviderResult};
use carina_core::resource::{Resource, ResourceId, State, Value};
use carina_core::retry::{RetryError, RetryFailure, retry, retry_when_not_found};

use super::actions::{expand_actions, expand_conditions, flatten_actions, flatten_conditions};
use super::{desired_tags, existing};
use crate::api::{ApiResult, Lookup, codes};
use crate::arn::listener_arn_from_rule_arn;
use crate::model::{CreateRuleInput, Rule, Tags};
use crate::provider::Elbv2Provider;
use crate::schemas::listener_rule::listener_rule_schema;
use crate::tags;
use crate::utils::{Attrs, api_error, get_i32, get_string_map, put, required_str, string_map};

pub const TYPE: &str = "elbv2.listener_rule";

pub(crate) async fn find(provider: &Elbv2Provider, arn: &str) -> ApiResult<Option<Rule>> {
    match provider.api.describe_rules(Lookup::arn(arn)).await {
        Ok(found) => Ok(found.into_iter().next()),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// One past the highest numbered priority on the listener
async fn next_priority(provider: &Elbv2Provider, listener_arn: &str) -> ApiResult<i32> {
    let rules = provider
        .api
        .describe_rules(Lookup::Parent(listener_arn.to_string()))
        .await?;
    let highest = rules
        .iter()
        .filter_map(|r| r.priority.parse::<i32>().ok())
        .max()
        .unwrap_or(0);
    Ok(highest + 1)
}

pub async fn create(provider: &Elbv2Provider, resource: &Resource) -> ProviderResult<State> {
    let id = &resource.id;
    let attrs = &resource.attributes;
    let listener_arn = required_str(id, attrs, "listener_arn")?;
    let configured_priority = get_i32(attrs, "priority");

    let template = CreateRuleInput {
        listener_arn: listener_arn.clone(),
        priority: configured_priority.unwrap_or_default(),
        conditions: expand_conditions(attrs, "condition"),
        actions: expand_actions(attrs, "action"),
        tags: get_string_map(attrs, "tags"),
    };
    let template = &template;

    let rule = match configured_priority {
        Some(priority) => {
            log::info!("creating rule with priority {} on {}", priority, listener_arn);
            provider
                .api
                .create_rule(template.clone())
                .await
                .map_err(api_error(id, "creating listener rule"))?
        }
        // Another rule may take the computed priority before ours is created
        None => retry(
            &provider.policy(provider.timeouts.rule_priority),
            move || async move {
                let classify = |e: crate::api::ApiError| {
                    if e.is(codes::PRIORITY_IN_USE) {
                        RetryError::Retryable(e)
                    } else {
                        RetryError::NonRetryable(e)
                    }
                };
                let priority = next_priority(provider, &template.listener_arn)
                    .await
                    .map_err(RetryError::NonRetryable)?;
                log::info!(
                    "creating rule with next free priority {} on {}",
                    priority,
                    template.listener_arn
                );
                provider
                    .api
                    .create_rule(CreateRuleInput {
                        priority,
                        ..template.clone()
                    })
                    .await
                    .map_err(classify)
            },
        )
        .await
        .map_err(|failure| match failure {
            RetryFailure::Permanent(e) => api_error(id, "creating listener rule")(e),
            timeout => ProviderError::new(format!("creating listener rule: {}", timeout))
                .for_resource(id.clone()),
        })?,
    };
    let arn = rule.arn.as_str();

    retry_when_not_found(&provider.policy(provider.timeouts.propagation), move || async move {
        find(provider, arn).await
    })
    .await
    .map_err(api_error(id, "waiting for listener rule"))?
    .ok_or_else(|| {
        ProviderError::new(format!("listener rule {} did not become visible", arn))
            .for_resource(id.clone())
    })?;

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
    let Some(rule) = find(provider, arn)
        .await
        .map_err(api_error(id, "describing listener rule"))?
    else {
        log::warn!("listener rule {} not found, removing from state", arn);
        return Ok(State::not_found(id.clone()));
    };
    if rule.is_default {
        return Err(ProviderError::new(format!(
            "{} is the default rule of its listener and cannot be managed as a listener rule",
            arn
        ))
        .for_resource(id.clone()));
    }

    let tags = provider
        .api
        .describe_tags(arn)
        .await
        .map_err(api_error(id, "listing listener rule tags"))?;

    Ok(existing(id, arn, flatten_rule(&rule, &tags)?))
}

fn flatten_rule(rule: &Rule, tags: &Tags) -> ProviderResult<Attrs> {
    let priority: i64 = rule.priority.parse().map_err(|_| {
        ProviderError::new(format!(
            "unexpected priority '{}' on listener rule {}",
            rule.priority, rule.arn
        ))
    })?;

    let mut attrs = Attrs::new();
    attrs.insert("arn".to_string(), Value::from(rule.arn.as_str()));
    attrs.insert("id".to_string(), Value::from(rule.arn.as_str()));
    put(&mut attrs, "listener_arn", listener_arn_from_rule_arn(&rule.arn));
    attrs.insert("priority".to_string(), Value::Int(priority));
    attrs.insert("action".to_string(), flatten_actions(&rule.actions));
    attrs.insert("condition".to_string(), flatten_conditions(&rule.conditions));
    attrs.insert("tags".to_string(), string_map(tags));
    Ok(attrs)
}

pub async fn update(
    provider: &Elbv2Provider,
    id: &ResourceId,
    arn: &str,
    from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    let attrs = &to.attributes;

    if let Some(priority) = get_i32(attrs, "priority")
        && get_i32(&from.attributes, "priority") != Some(priority)
    {
        log::info!("moving rule {} to priority {}", arn, priority);
        provider
            .api
            .set_rule_priority(arn, priority)
            .await
            .map_err(api_error(id, "setting rule priority"))?;
    }

    let changed = changed_attributes(attrs, &from.attributes, Some(&listener_rule_schema()));
    if changed.iter().any(|name| name == "condition" || name == "action") {
        let conditions = expand_conditions(attrs, "condition");
        let actions = expand_actions(attrs, "action");
        log::info!("modifying rule {}", arn);
        provider
            .api
            .modify_rule(arn, &conditions, &actions)
            .await
            .map_err(api_error(id, "modifying listener rule"))?;
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

pub async fn delete(provider: &Elbv2Provider, id: &ResourceId, arn: &str) -> ProviderResult<()> {
    log::info!("deleting listener rule {}", arn);
    match provider.api.delete_rule(arn).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(api_error(id, "deleting listener rule")(e)),
    }
}
