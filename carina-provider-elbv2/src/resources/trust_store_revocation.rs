//! elbv2.trust_store_revocation
//!
//! Identified by `trust_store_arn,revocation_id`.

use carina_core::provider::{ProviderError, ProviderResult};
use carina_core::resource::{Resource, ResourceId, State, Value};

use crate::model::S3Location;
use crate::provider::Elbv2Provider;
use crate::utils::{Attrs, api_error, get_string, required_str};

pub const TYPE: &str = "elbv2.trust_store_revocation";

fn parse_identifier(id: &ResourceId, identifier: &str) -> ProviderResult<(String, i64)> {
    identifier
        .rsplit_once(',')
        .and_then(|(arn, revocation)| Some((arn.to_string(), revocation.parse().ok()?)))
        .ok_or_else(|| {
            ProviderError::new(format!(
                "invalid revocation identifier '{}', expected trust_store_arn,revocation_id",
                identifier
            ))
            .for_resource(id.clone())
        })
}

pub async fn create(provider: &Elbv2Provider, resource: &Resource) -> ProviderResult<State> {
    let id = &resource.id;
    let attrs = &resource.attributes;
    let trust_store_arn = required_str(id, attrs, "trust_store_arn")?;
    let location = S3Location {
        bucket: required_str(id, attrs, "revocations_s3_bucket")?,
        key: required_str(id, attrs, "revocations_s3_key")?,
        object_version: get_string(attrs, "revocations_s3_object_version"),
    };

    log::info!(
        "adding revocations from s3://{}/{} to {}",
        location.bucket,
        location.key,
        trust_store_arn
    );
    let revocation = provider
        .api
        .add_trust_store_revocation(&trust_store_arn, &location)
        .await
        .map_err(api_error(id, "adding trust store revocation"))?;

    let identifier = format!("{},{}", trust_store_arn, revocation.revocation_id);
    read(provider, id, Some(&identifier)).await
}

pub async fn read(
    provider: &Elbv2Provider,
    id: &ResourceId,
    identifier: Option<&str>,
) -> ProviderResult<State> {
    let Some(identifier) = identifier else {
        return Ok(State::not_found(id.clone()));
    };
    let (trust_store_arn, revocation_id) = parse_identifier(id, identifier)?;

    let found = match provider
        .api
        .describe_trust_store_revocations(&trust_store_arn, &[revocation_id])
        .await
    {
        Ok(found) => found,
        Err(e) if e.is_not_found() => Vec::new(),
        Err(e) => return Err(api_error(id, "describing trust store revocations")(e)),
    };
    if !found.iter().any(|r| r.revocation_id == revocation_id) {
        log::warn!("revocation {} not found, removing from state", identifier);
        return Ok(State::not_found(id.clone()));
    }

    let mut attrs = Attrs::new();
    attrs.insert("trust_store_arn".to_string(), Value::from(trust_store_arn.as_str()));
    attrs.insert("revocation_id".to_string(), Value::Int(revocation_id));
    attrs.insert("id".to_string(), Value::from(identifier));
    Ok(State::existing(id.clone(), attrs).with_identifier(identifier))
}

pub async fn delete(provider: &Elbv2Provider, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
    let (trust_store_arn, revocation_id) = parse_identifier(id, identifier)?;
    log::info!("removing revocation {} from {}", revocation_id, trust_store_arn);
    match provider
        .api
        .remove_trust_store_revocations(&trust_store_arn, &[revocation_id])
        .await
    {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(api_error(id, "removing trust store revocation")(e)),
    }
}
