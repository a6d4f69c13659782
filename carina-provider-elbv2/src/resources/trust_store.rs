//! elbv2.trust_store

use carina_core::provider::{ProviderError, ProviderResult};
use carina_core::resource::{Resource, ResourceId, State, Value};
use carina_core::retry::retry_when;
use carina_core::wait::StateWaiter;

use super::{desired_tags, existing, wait_error};
use crate::api::{ApiResult, Lookup, codes};
use crate::arn::arn_suffix;
use crate::model::{S3Location, Tags, TrustStore};
use crate::naming;
use crate::provider::Elbv2Provider;
use crate::tags;
use crate::utils::{Attrs, api_error, get_str, get_string, get_string_map, put, required_str, string_map};

pub const TYPE: &str = "elbv2.trust_store";

const NAME_MAX: usize = 32;

const BUNDLE_KEYS: [&str; 3] = [
    "ca_certificates_bundle_s3_bucket",
    "ca_certificates_bundle_s3_key",
    "ca_certificates_bundle_s3_object_version",
];

fn expand_bundle(id: &ResourceId, attrs: &Attrs) -> ProviderResult<S3Location> {
    Ok(S3Location {
        bucket: required_str(id, attrs, "ca_certificates_bundle_s3_bucket")?,
        key: required_str(id, attrs, "ca_certificates_bundle_s3_key")?,
        object_version: get_string(attrs, "ca_certificates_bundle_s3_object_version"),
    })
}

pub(crate) async fn find(provider: &Elbv2Provider, lookup: Lookup) -> ApiResult<Option<TrustStore>> {
    match provider.api.describe_trust_stores(lookup).await {
        Ok(found) => Ok(found.into_iter().next()),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

pub async fn create(provider: &Elbv2Provider, resource: &Resource) -> ProviderResult<State> {
    let id = &resource.id;
    let attrs = &resource.attributes;
    let name = naming::truncate(
        naming::name_or_prefix(get_str(attrs, "name"), get_str(attrs, "name_prefix"), "tf-"),
        NAME_MAX,
    );
    let bundle = expand_bundle(id, attrs)?;

    log::info!("creating trust store {} from s3://{}/{}", name, bundle.bucket, bundle.key);
    let created = provider
        .api
        .create_trust_store(&name, &bundle, &get_string_map(attrs, "tags"))
        .await
        .map_err(api_error(id, format!("creating trust store {}", name)))?;
    let arn = created.arn.as_str();

    StateWaiter::new(&["CREATING"], &["ACTIVE"], provider.timeouts.trust_store_active)
        .with_poll_interval(provider.timeouts.poll_interval)
        .wait(move || async move {
            let found = find(provider, Lookup::arn(arn))
                .await
                .map_err(api_error(id, "describing trust store"))?;
            Ok::<_, ProviderError>(found.map(|ts| {
                let status = ts.status.clone().unwrap_or_default();
                (ts, status)
            }))
        })
        .await
        .map_err(|e| wait_error(id, "waiting for trust store to become active", e))?;

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
    let Some(ts) = find(provider, Lookup::arn(arn))
        .await
        .map_err(api_error(id, "describing trust store"))?
    else {
        log::warn!("trust store {} not found, removing from state", arn);
        return Ok(State::not_found(id.clone()));
    };
    let tags = provider
        .api
        .describe_tags(arn)
        .await
        .map_err(api_error(id, "listing trust store tags"))?;

    Ok(existing(id, arn, flatten_trust_store(&ts, &tags)))
}

/// State attributes of a trust store (shared with the data source)
pub fn flatten_trust_store(ts: &TrustStore, tags: &Tags) -> Attrs {
    let mut attrs = Attrs::new();
    attrs.insert("arn".to_string(), Value::from(ts.arn.as_str()));
    attrs.insert("id".to_string(), Value::from(ts.arn.as_str()));
    attrs.insert("arn_suffix".to_string(), Value::from(arn_suffix(&ts.arn)));
    attrs.insert("name".to_string(), Value::from(ts.name.as_str()));
    put(&mut attrs, "name_prefix", naming::prefix_from_name(&ts.name));
    put(&mut attrs, "number_of_ca_certificates", ts.number_of_ca_certificates);
    put(&mut attrs, "total_revoked_entries", ts.total_revoked_entries);
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

    if BUNDLE_KEYS
        .iter()
        .any(|key| from.attributes.get(*key) != attrs.get(*key))
    {
        let bundle = expand_bundle(id, attrs)?;
        log::info!("replacing CA bundle of {} with s3://{}/{}", arn, bundle.bucket, bundle.key);
        provider
            .api
            .modify_trust_store(arn, &bundle)
            .await
            .map_err(api_error(id, "modifying trust store"))?;
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

/// Deleting fails with `TrustStoreInUse` while a listener still verifies clients against it
pub async fn delete(provider: &Elbv2Provider, id: &ResourceId, arn: &str) -> ProviderResult<()> {
    log::info!("deleting trust store {}", arn);
    let deleted = retry_when(
        &provider.policy(provider.timeouts.trust_store_delete),
        move || async move { provider.api.delete_trust_store(arn).await },
        |e| e.is(codes::TRUST_STORE_IN_USE),
    )
    .await;
    match deleted {
        Ok(()) => {}
        Err(e) if e.is_not_found() => return Ok(()),
        Err(e) => return Err(api_error(id, "deleting trust store")(e)),
    }

    StateWaiter::new(&["ACTIVE", "CREATING"], &[], provider.timeouts.trust_store_delete)
        .with_poll_interval(provider.timeouts.poll_interval)
        .wait(move || async move {
            let found = find(provider, Lookup::arn(arn))
                .await
                .map_err(api_error(id, "describing trust store"))?;
            Ok::<_, ProviderError>(found.map(|ts| ((), ts.status.unwrap_or_default())))
        })
        .await
        .map_err(|e| wait_error(id, "waiting for trust store deletion", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ElbV2Api;
    use crate::model::{CreateListenerInput, MutualAuthentication};
    use crate::resources::listener::tests::load_balancer;
    use crate::resources::test_support::{provider, resource, s, tags};

    fn store(pairs: Vec<(&str, Value)>) -> Resource {
        let mut r = resource(
            TYPE,
            "clients",
            vec![
                ("name", s("clients")),
                ("ca_certificates_bundle_s3_bucket", s("certs")),
                ("ca_certificates_bundle_s3_key", s("bundle.pem")),
            ],
        );
        for (k, v) in pairs {
            r.attributes.insert(k.to_string(), v);
        }
        r
    }

    #[tokio::test]
    async fn create_waits_for_active() {
        let (fake, provider) = provider();
        fake.set_trust_store_polls(2);

        let state = create(&provider, &store(vec![])).await.unwrap();

        assert!(state.exists);
        assert!(fake.count("describe_trust_stores") >= 3);
        assert_eq!(state.attributes.get("number_of_ca_certificates"), Some(&Value::Int(1)));
        assert!(
            state.attributes.get("arn_suffix").and_then(Value::as_str).unwrap().starts_with("truststore/clients/")
        );
        // The bundle location is never read back
        assert!(!state.attributes.contains_key("ca_certificates_bundle_s3_key"));
    }

    #[tokio::test]
    async fn new_bundle_modifies_in_place() {
        let (fake, provider) = provider();
        let mut created = create(&provider, &store(vec![])).await.unwrap();
        created.attributes.insert("ca_certificates_bundle_s3_bucket".to_string(), s("certs"));
        created.attributes.insert("ca_certificates_bundle_s3_key".to_string(), s("bundle.pem"));
        let arn = created.identifier.clone().unwrap();

        let unchanged = store(vec![("tags", tags(&[("env", "prod")]))]);
        update(&provider, &unchanged.id, &arn, &created, &unchanged).await.unwrap();
        assert_eq!(fake.count("modify_trust_store"), 0);

        let rotated = store(vec![("ca_certificates_bundle_s3_key", s("bundle-2.pem"))]);
        update(&provider, &rotated.id, &arn, &created, &rotated).await.unwrap();
        assert_eq!(fake.count("modify_trust_store"), 1);
    }

    #[tokio::test]
    async fn in_use_store_cannot_be_deleted() {
        let (fake, provider) = provider();
        let created = create(&provider, &store(vec![])).await.unwrap();
        let arn = created.identifier.clone().unwrap();
        let lb = load_balancer(&fake, "application").await;
        fake.create_listener(CreateListenerInput {
            load_balancer_arn: lb,
            port: Some(443),
            protocol: Some("HTTPS".to_string()),
            mutual_authentication: Some(MutualAuthentication {
                mode: Some("verify".to_string()),
                trust_store_arn: Some(arn.clone()),
                ignore_client_certificate_expiry: None,
            }),
            ..Default::default()
        })
        .await
        .unwrap();

        let err = delete(&provider, &created.id, &arn).await.unwrap_err();
        assert!(err.to_string().contains(codes::TRUST_STORE_IN_USE));
        assert!(fake.count("delete_trust_store") > 1);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (_, provider) = provider();
        let created = create(&provider, &store(vec![])).await.unwrap();
        let arn = created.identifier.clone().unwrap();
        delete(&provider, &created.id, &arn).await.unwrap();
        delete(&provider, &created.id, &arn).await.unwrap();
        assert!(!read(&provider, &created.id, Some(&arn)).await.unwrap().exists);
    }
}
