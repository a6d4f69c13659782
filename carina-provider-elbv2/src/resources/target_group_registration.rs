//! elbv2.target_group_registration
//!
//! Owns the complete target set of one target group, identified by the group's ARN.

use carina_core::provider::ProviderResult;
use carina_core::resource::{Resource, ResourceId, State, Value};

use super::target_group_attachment::{expand_target, flatten_target, register, target_gone};
use crate::model::TargetDescription;
use crate::provider::Elbv2Provider;
use crate::utils::{Attrs, api_error, get_blocks, required_str};

pub const TYPE: &str = "elbv2.target_group_registration";

fn expand_targets(attrs: &Attrs) -> Vec<TargetDescription> {
    get_blocks(attrs, "target").into_iter().map(expand_target).collect()
}

/// A configured target without a port is registered on the group's port,
/// so it matches a registered target with the same id on any port.
fn covers(wanted: &TargetDescription, registered: &TargetDescription) -> bool {
    wanted.id == registered.id && (wanted.port.is_none() || wanted.port == registered.port)
}

/// Registered targets that no configured target covers
fn unwanted(current: &[TargetDescription], desired: &[TargetDescription]) -> Vec<TargetDescription> {
    current
        .iter()
        .filter(|t| !desired.iter().any(|d| covers(d, t)))
        .cloned()
        .collect()
}

/// Configured targets not yet registered
fn unregistered(desired: &[TargetDescription], current: &[TargetDescription]) -> Vec<TargetDescription> {
    desired
        .iter()
        .filter(|d| !current.iter().any(|t| covers(d, t)))
        .cloned()
        .collect()
}

/// Registered targets, without those already draining; `None` when the group is gone
async fn registered(
    provider: &Elbv2Provider,
    id: &ResourceId,
    tg_arn: &str,
) -> ProviderResult<Option<Vec<TargetDescription>>> {
    match provider.api.describe_target_health(tg_arn, &[]).await {
        Ok(health) => Ok(Some(
            health
                .into_iter()
                .filter(|h| h.state.as_deref() != Some("draining"))
                .map(|h| h.target)
                .collect(),
        )),
        Err(e) if target_gone(&e) => Ok(None),
        Err(e) => Err(api_error(id, "describing target health")(e)),
    }
}

pub async fn create(provider: &Elbv2Provider, resource: &Resource) -> ProviderResult<State> {
    let id = &resource.id;
    let tg_arn = required_str(id, &resource.attributes, "target_group_arn")?;
    let targets = expand_targets(&resource.attributes);

    if !targets.is_empty() {
        log::info!("registering {} targets with {}", targets.len(), tg_arn);
        register(provider, &tg_arn, &targets)
            .await
            .map_err(api_error(id, "registering targets"))?;
    }

    read(provider, id, Some(&tg_arn)).await
}

pub async fn read(
    provider: &Elbv2Provider,
    id: &ResourceId,
    identifier: Option<&str>,
) -> ProviderResult<State> {
    let Some(tg_arn) = identifier else {
        return Ok(State::not_found(id.clone()));
    };
    let Some(targets) = registered(provider, id, tg_arn).await? else {
        log::warn!("target group {} not found, removing registration from state", tg_arn);
        return Ok(State::not_found(id.clone()));
    };

    let mut attrs = Attrs::new();
    attrs.insert("target_group_arn".to_string(), Value::from(tg_arn));
    attrs.insert("id".to_string(), Value::from(tg_arn));
    attrs.insert(
        "target".to_string(),
        Value::List(targets.iter().map(|t| Value::Map(flatten_target(t))).collect()),
    );
    Ok(State::existing(id.clone(), attrs).with_identifier(tg_arn))
}

pub async fn update(
    provider: &Elbv2Provider,
    id: &ResourceId,
    tg_arn: &str,
    from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    let desired = expand_targets(&to.attributes);
    let current = expand_targets(&from.attributes);

    let removed = unwanted(&current, &desired);
    if !removed.is_empty() {
        log::info!("deregistering {} targets from {}", removed.len(), tg_arn);
        provider
            .api
            .deregister_targets(tg_arn, &removed)
            .await
            .map_err(api_error(id, "deregistering targets"))?;
    }

    let added = unregistered(&desired, &current);
    if !added.is_empty() {
        log::info!("registering {} targets with {}", added.len(), tg_arn);
        register(provider, tg_arn, &added)
            .await
            .map_err(api_error(id, "registering targets"))?;
    }

    read(provider, id, Some(tg_arn)).await
}

pub async fn delete(provider: &Elbv2Provider, id: &ResourceId, tg_arn: &str) -> ProviderResult<()> {
    let Some(targets) = registered(provider, id, tg_arn).await? else {
        return Ok(());
    };
    if targets.is_empty() {
        return Ok(());
    }
    log::info!("deregistering {} targets from {}", targets.len(), tg_arn);
    match provider.api.deregister_targets(tg_arn, &targets).await {
        Ok(()) => Ok(()),
        Err(e) if target_gone(&e) => Ok(()),
        Err(e) => Err(api_error(id, "deregistering targets")(e)),
    }
}
