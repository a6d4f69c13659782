//! elbv2.target_group_attachment
//!
//! The identifier packs the registration: `target_group_arn,target_id[,port[,availability_zone]]`.

use std::collections::HashMap;

use carina_core::provider::{ProviderError, ProviderResult};
use carina_core::resource::{Resource, ResourceId, State, Value};
use carina_core::retry::retry_when;

use crate::api::{ApiError, codes};
use crate::model::TargetDescription;
use crate::provider::Elbv2Provider;
use crate::utils::{Attrs, api_error, get_i32, get_string, put, required_str};

pub const TYPE: &str = "elbv2.target_group_attachment";

pub(crate) fn expand_target(attrs: &Attrs) -> TargetDescription {
    TargetDescription {
        id: get_string(attrs, "target_id").unwrap_or_default(),
        port: get_i32(attrs, "port"),
        availability_zone: get_string(attrs, "availability_zone"),
    }
}

pub(crate) fn flatten_target(target: &TargetDescription) -> Attrs {
    let mut attrs = HashMap::new();
    attrs.insert("target_id".to_string(), Value::from(target.id.as_str()));
    put(&mut attrs, "port", target.port);
    put(&mut attrs, "availability_zone", target.availability_zone.clone());
    attrs
}

/// Errors meaning the target is gone: its group was deleted, or the target itself was
pub(crate) fn target_gone(e: &ApiError) -> bool {
    e.is(codes::TARGET_GROUP_NOT_FOUND) || e.is(codes::INVALID_TARGET)
}

/// Register targets, retrying while Lambda invoke permissions propagate
pub(crate) async fn register(
    provider: &Elbv2Provider,
    tg_arn: &str,
    targets: &[TargetDescription],
) -> Result<(), ApiError> {
    retry_when(
        &provider.policy(provider.timeouts.target_registration),
        move || async move { provider.api.register_targets(tg_arn, targets).await },
        |e| e.is(codes::INVALID_TARGET),
    )
    .await
}

fn format_identifier(tg_arn: &str, target: &TargetDescription) -> String {
    let mut parts = vec![tg_arn.to_string(), target.id.clone()];
    match (target.port, &target.availability_zone) {
        (Some(port), Some(az)) => {
            parts.push(port.to_string());
            parts.push(az.clone());
        }
        (Some(port), None) => parts.push(port.to_string()),
        (None, Some(az)) => {
            parts.push(String::new());
            parts.push(az.clone());
        }
        (None, None) => {}
    }
    parts.join(",")
}

fn parse_identifier(id: &ResourceId, identifier: &str) -> ProviderResult<(String, TargetDescription)> {
    let invalid = || {
        ProviderError::new(format!(
            "invalid attachment identifier '{}', expected target_group_arn,target_id[,port[,availability_zone]]",
            identifier
        ))
        .for_resource(id.clone())
    };
    let mut parts = identifier.split(',');
    let tg_arn = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
    let target_id = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
    let port = match parts.next().filter(|s| !s.is_empty()) {
        Some(port) => Some(port.parse::<i32>().map_err(|_| invalid())?),
        None => None,
    };
    let availability_zone = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
    if parts.next().is_some() {
        return Err(invalid());
    }
    Ok((
        tg_arn.to_string(),
        TargetDescription {
            id: target_id.to_string(),
            port,
            availability_zone,
        },
    ))
}

pub async fn create(provider: &Elbv2Provider, resource: &Resource) -> ProviderResult<State> {
    let id = &resource.id;
    let tg_arn = required_str(id, &resource.attributes, "target_group_arn")?;
    let target = expand_target(&resource.attributes);

    log::info!("registering {} with {}", target.id, tg_arn);
    register(provider, &tg_arn, std::slice::from_ref(&target))
        .await
        .map_err(api_error(id, format!("registering target {}", target.id)))?;

    read(provider, id, Some(&format_identifier(&tg_arn, &target))).await
}

pub async fn read(
    provider: &Elbv2Provider,
    id: &ResourceId,
    identifier: Option<&str>,
) -> ProviderResult<State> {
    let Some(identifier) = identifier else {
        return Ok(State::not_found(id.clone()));
    };
    let (tg_arn, target) = parse_identifier(id, identifier)?;

    let health = match provider
        .api
        .describe_target_health(&tg_arn, std::slice::from_ref(&target))
        .await
    {
        Ok(health) => health,
        Err(e) if target_gone(&e) => {
            log::warn!("target {} of {} not found, removing from state", target.id, tg_arn);
            return Ok(State::not_found(id.clone()));
        }
        Err(e) => return Err(api_error(id, "describing target health")(e)),
    };

    let registered = health.iter().any(|h| {
        !(h.state.as_deref() == Some("unused")
            && h.reason.as_deref() == Some("Target.NotRegistered"))
    });
    if !registered {
        log::warn!("target {} is no longer registered with {}", target.id, tg_arn);
        return Ok(State::not_found(id.clone()));
    }

    let mut attrs = flatten_target(&target);
    attrs.insert("target_group_arn".to_string(), Value::from(tg_arn.as_str()));
    attrs.insert("id".to_string(), Value::from(identifier));
    Ok(State::existing(id.clone(), attrs).with_identifier(identifier))
}

pub async fn delete(provider: &Elbv2Provider, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
    let (tg_arn, target) = parse_identifier(id, identifier)?;
    log::info!("deregistering {} from {}", target.id, tg_arn);
    match provider
        .api
        .deregister_targets(&tg_arn, std::slice::from_ref(&target))
        .await
    {
        Ok(()) => Ok(()),
        Err(e) if target_gone(&e) => Ok(()),
        Err(e) => Err(api_error(id, "deregistering target")(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::listener::tests::target_group;
    use crate::resources::test_support::{provider, resource, s};

    #[test]
    fn identifiers_round_trip_optional_parts() {
        let id = ResourceId::new(TYPE, "a");
        let tg = "arn:aws:elasticloadbalancing:us-east-1:123456789012:targetgroup/web/1";
        for target in [
            TargetDescription { id: "i-1".to_string(), port: None, availability_zone: None },
            TargetDescription { id: "10.0.0.1".to_string(), port: Some(8080), availability_zone: None },
            TargetDescription {
                id: "10.0.0.1".to_string(),
                port: None,
                availability_zone: Some("all".to_string()),
            },
        ] {
            let identifier = format_identifier(tg, &target);
            assert_eq!(parse_identifier(&id, &identifier).unwrap(), (tg.to_string(), target));
        }
        assert!(parse_identifier(&id, "only-arn").is_err());
        assert!(parse_identifier(&id, &format!("{},i-1,http", tg)).is_err());
    }

    #[tokio::test]
    async fn attach_read_detach() {
        let (fake, provider) = provider();
        let tg = target_group(&fake, "web").await;
        let r = resource(
            TYPE,
            "web1",
            vec![("target_group_arn", s(&tg)), ("target_id", s("i-0abc")), ("port", Value::Int(8080))],
        );

        let state = create(&provider, &r).await.unwrap();
        let identifier = state.identifier.clone().unwrap();
        assert_eq!(identifier, format!("{},i-0abc,8080", tg));
        assert_eq!(fake.registered_targets(&tg).len(), 1);

        delete(&provider, &r.id, &identifier).await.unwrap();
        assert!(fake.registered_targets(&tg).is_empty());
        let state = read(&provider, &r.id, Some(&identifier)).await.unwrap();
        assert!(!state.exists);
    }

    #[tokio::test]
    async fn lambda_permission_propagation_is_retried() {
        let (fake, provider) = provider();
        let tg = target_group(&fake, "fn").await;
        fake.fail_next("register_targets", codes::INVALID_TARGET, 2);
        let r = resource(
            TYPE,
            "fn",
            vec![
                ("target_group_arn", s(&tg)),
                ("target_id", s("arn:aws:lambda:us-east-1:123456789012:function:handler")),
            ],
        );
        let state = create(&provider, &r).await.unwrap();
        assert!(state.exists);
        assert_eq!(fake.count("register_targets"), 3);
    }

    #[tokio::test]
    async fn deleted_target_group_means_not_found() {
        let (fake, provider) = provider();
        let tg = target_group(&fake, "web").await;
        let r = resource(TYPE, "web1", vec![("target_group_arn", s(&tg)), ("target_id", s("i-0abc"))]);
        let state = create(&provider, &r).await.unwrap();
        let identifier = state.identifier.unwrap();

        let tg_id = ResourceId::new(crate::resources::target_group::TYPE, "web");
        crate::resources::target_group::delete(&provider, &tg_id, &tg).await.unwrap();

        assert!(!read(&provider, &r.id, Some(&identifier)).await.unwrap().exists);
        delete(&provider, &r.id, &identifier).await.unwrap();
    }
}
