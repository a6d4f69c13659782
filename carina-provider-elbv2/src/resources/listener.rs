//! elbv2.listener

use std::collections::HashMap;

use carina_core::provider::{ProviderError, ProviderResult};
use carina_core::resource::{Resource, ResourceId, State, Value};
use carina_core::retry::{retry_when, retry_when_not_found};

use super::actions::{expand_actions, flatten_actions};
use super::{desired_tags, existing};
use crate::api::{ApiResult, Lookup, codes};
use crate::arn;
use crate::attributes::{self, LISTENER, Scope};
use crate::model::{
    Attributes, Certificate, CreateListenerInput, Listener, ModifyListenerInput,
    MutualAuthentication, Tags,
};
use crate::provider::Elbv2Provider;
use crate::tags;
use crate::utils::{
    Attrs, api_error, get_block, get_bool, get_i32, get_str, get_string, get_string_map, put,
    required_str, string_map,
};

pub const TYPE: &str = "elbv2.listener";

/// Configured protocol, or the default for the load balancer type
fn protocol_for(attrs: &Attrs, load_balancer_arn: &str) -> Option<String> {
    if let Some(protocol) = get_str(attrs, "protocol") {
        return Some(protocol.to_string());
    }
    match arn::load_balancer_type(load_balancer_arn) {
        Some("gateway") => Some("GENEVE".to_string()),
        Some("network") => Some("TCP".to_string()),
        _ if attrs.contains_key("certificate_arn") => Some("HTTPS".to_string()),
        _ => Some("HTTP".to_string()),
    }
}

/// TLS and GENEVE listeners have no listener attributes
pub(crate) fn has_attributes(protocol: Option<&str>) -> bool {
    !matches!(protocol, Some("TLS" | "GENEVE") | None)
}

fn expand_certificates(attrs: &Attrs) -> Vec<Certificate> {
    get_string(attrs, "certificate_arn")
        .map(|arn| Certificate { arn, is_default: None })
        .into_iter()
        .collect()
}

fn expand_mutual_authentication(attrs: &Attrs) -> Option<MutualAuthentication> {
    get_block(attrs, "mutual_authentication").map(|block| MutualAuthentication {
        mode: get_string(block, "mode"),
        trust_store_arn: get_string(block, "trust_store_arn"),
        ignore_client_certificate_expiry: get_bool(block, "ignore_client_certificate_expiry"),
    })
}

pub(crate) async fn find(provider: &Elbv2Provider, arn: &str) -> ApiResult<Option<Listener>> {
    match provider.api.describe_listeners(Lookup::arn(arn)).await {
        Ok(found) => Ok(found.into_iter().next()),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

pub async fn create(provider: &Elbv2Provider, resource: &Resource) -> ProviderResult<State> {
    let id = &resource.id;
    let attrs = &resource.attributes;
    let load_balancer_arn = required_str(id, attrs, "load_balancer_arn")?;
    let protocol = protocol_for(attrs, &load_balancer_arn);

    let input = CreateListenerInput {
        load_balancer_arn: load_balancer_arn.clone(),
        port: get_i32(attrs, "port"),
        protocol: protocol.clone(),
        ssl_policy: get_string(attrs, "ssl_policy"),
        certificates: expand_certificates(attrs),
        default_actions: expand_actions(attrs, "default_action"),
        alpn_policy: get_string(attrs, "alpn_policy").into_iter().collect(),
        mutual_authentication: expand_mutual_authentication(attrs),
        tags: get_string_map(attrs, "tags"),
    };
    let input = &input;

    log::info!("creating listener on {}", load_balancer_arn);
    let listener = retry_when(
        &provider.policy(provider.timeouts.certificate),
        move || async move { provider.api.create_listener(input.clone()).await },
        |e| e.is(codes::CERTIFICATE_NOT_FOUND),
    )
    .await
    .map_err(api_error(id, "creating listener"))?;
    let arn = listener.arn.as_str();

    retry_when_not_found(&provider.policy(provider.timeouts.propagation), move || async move {
        find(provider, arn).await
    })
    .await
    .map_err(api_error(id, "waiting for listener"))?
    .ok_or_else(|| {
        ProviderError::new(format!("listener {} did not become visible", arn)).for_resource(id.clone())
    })?;

    let effective = listener.protocol.as_deref().or(protocol.as_deref());
    if has_attributes(effective) {
        let desired = attributes::expand(LISTENER, attrs, &scope(effective));
        if !desired.is_empty() {
            provider
                .api
                .modify_listener_attributes(arn, &desired)
                .await
                .map_err(api_error(id, "setting listener attributes"))?;
        }
    }

    read(provider, id, Some(arn)).await
}

fn scope(protocol: Option<&str>) -> Scope<'_> {
    Scope {
        protocol,
        ..Default::default()
    }
}

pub async fn read(
    provider: &Elbv2Provider,
    id: &ResourceId,
    identifier: Option<&str>,
) -> ProviderResult<State> {
    let Some(arn) = identifier else {
        return Ok(State::not_found(id.clone()));
    };
    let Some(listener) = find(provider, arn)
        .await
        .map_err(api_error(id, "describing listener"))?
    else {
        log::warn!("listener {} not found, removing from state", arn);
        return Ok(State::not_found(id.clone()));
    };

    let api_attributes = if has_attributes(listener.protocol.as_deref()) {
        provider
            .api
            .describe_listener_attributes(arn)
            .await
            .map_err(api_error(id, "describing listener attributes"))?
    } else {
        Attributes::new()
    };
    let tags = provider
        .api
        .describe_tags(arn)
        .await
        .map_err(api_error(id, "listing listener tags"))?;

    Ok(existing(id, arn, flatten_listener(&listener, &api_attributes, &tags)))
}

/// State attributes of a listener (shared with the data source)
pub fn flatten_listener(listener: &Listener, api_attributes: &Attributes, tags: &Tags) -> Attrs {
    let mut attrs = attributes::flatten(LISTENER, api_attributes, &scope(listener.protocol.as_deref()));

    attrs.insert("arn".to_string(), Value::from(listener.arn.as_str()));
    attrs.insert("id".to_string(), Value::from(listener.arn.as_str()));
    attrs.insert(
        "load_balancer_arn".to_string(),
        Value::from(listener.load_balancer_arn.as_str()),
    );
    put(&mut attrs, "port", listener.port);
    put(&mut attrs, "protocol", listener.protocol.clone());
    put(&mut attrs, "ssl_policy", listener.ssl_policy.clone());
    let certificate = listener
        .certificates
        .iter()
        .find(|c| c.is_default == Some(true))
        .or_else(|| listener.certificates.first());
    put(&mut attrs, "certificate_arn", certificate.map(|c| c.arn.clone()));
    put(&mut attrs, "alpn_policy", listener.alpn_policy.first().cloned());
    if let Some(mutual) = &listener.mutual_authentication {
        let mut block = HashMap::new();
        put(&mut block, "mode", mutual.mode.clone());
        put(&mut block, "trust_store_arn", mutual.trust_store_arn.clone());
        put(
            &mut block,
            "ignore_client_certificate_expiry",
            mutual.ignore_client_certificate_expiry,
        );
        attrs.insert("mutual_authentication".to_string(), Value::Map(block));
    }
    attrs.insert(
        "default_action".to_string(),
        flatten_actions(&listener.default_actions),
    );
    attrs.insert("tags".to_string(), string_map(tags));
    attrs
}

pub async fn update(
    provider: &Elbv2Provider,
    id: &ResourceId,
    arn: &str,
    from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    let attrs = &to.attributes;
    let load_balancer_arn = required_str(id, attrs, "load_balancer_arn")?;
    let protocol = protocol_for(attrs, &load_balancer_arn);

    let input = ModifyListenerInput {
        listener_arn: arn.to_string(),
        port: get_i32(attrs, "port"),
        protocol: protocol.clone(),
        ssl_policy: get_string(attrs, "ssl_policy"),
        certificates: expand_certificates(attrs),
        default_actions: expand_actions(attrs, "default_action"),
        alpn_policy: get_string(attrs, "alpn_policy").into_iter().collect(),
        mutual_authentication: expand_mutual_authentication(attrs),
    };
    let input = &input;

    log::info!("modifying listener {}", arn);
    let listener = retry_when(
        &provider.policy(provider.timeouts.certificate),
        move || async move { provider.api.modify_listener(input.clone()).await },
        |e| e.is(codes::CERTIFICATE_NOT_FOUND),
    )
    .await
    .map_err(api_error(id, "modifying listener"))?;

    let effective = listener.protocol.as_deref().or(protocol.as_deref());
    if has_attributes(effective) {
        let desired = attributes::expand(LISTENER, attrs, &scope(effective));
        let current = provider
            .api
            .describe_listener_attributes(arn)
            .await
            .map_err(api_error(id, "describing listener attributes"))?;
        let changes = attributes::changes(&desired, &current);
        if !changes.is_empty() {
            provider
                .api
                .modify_listener_attributes(arn, &changes)
                .await
                .map_err(api_error(id, "modifying listener attributes"))?;
        }
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
    log::info!("deleting listener {}", arn);
    match provider.api.delete_listener(arn).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(api_error(id, "deleting listener")(e)),
    }
}
