//! elbv2.trust_store data source

use carina_core::provider::ProviderResult;
use carina_core::resource::{ResourceId, State};

use super::{arn_or_name, found, single};
use crate::provider::Elbv2Provider;
use crate::resources::{existing, trust_store::flatten_trust_store};
use crate::utils::{Attrs, api_error, put};

pub async fn read(provider: &Elbv2Provider, id: &ResourceId, attrs: &Attrs) -> ProviderResult<State> {
    let candidates = found(
        provider.api.describe_trust_stores(arn_or_name(attrs)).await,
        id,
        "trust store",
    )?;
    let ts = single(candidates, id, "trust store")?;
    let tags = provider
        .api
        .describe_tags(&ts.arn)
        .await
        .map_err(api_error(id, "listing trust store tags"))?;

    let mut state = flatten_trust_store(&ts, &tags);
    put(&mut state, "status", ts.status.clone());
    Ok(existing(id, &ts.arn, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ElbV2Api;
    use crate::model::S3Location;
    use crate::resources::test_support::{provider, s};

    #[tokio::test]
    async fn finds_by_name_with_status() {
        let (fake, provider) = provider();
        let bundle = S3Location {
            bucket: "certs".to_string(),
            key: "bundle.pem".to_string(),
            object_version: None,
        };
        fake.create_trust_store("clients", &bundle, &Default::default()).await.unwrap();

        let id = ResourceId::new("elbv2.trust_store", "clients");
        let attrs: Attrs = [("name".to_string(), s("clients"))].into_iter().collect();
        let state = read(&provider, &id, &attrs).await.unwrap();
        assert_eq!(state.attributes.get("status"), Some(&s("ACTIVE")));
    }
}
