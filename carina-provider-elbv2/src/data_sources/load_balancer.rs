//! elbv2.load_balancer data source

use carina_core::provider::ProviderResult;
use carina_core::resource::{ResourceId, State};

use super::{arn_or_name, found, has_tags, single};
use crate::provider::Elbv2Provider;
use crate::resources::{existing, load_balancer::flatten_load_balancer};
use crate::utils::{Attrs, api_error};

pub async fn read(provider: &Elbv2Provider, id: &ResourceId, attrs: &Attrs) -> ProviderResult<State> {
    let candidates = found(
        provider.api.describe_load_balancers(arn_or_name(attrs)).await,
        id,
        "load balancer",
    )?;

    let mut matches = Vec::new();
    for lb in candidates {
        let tags = provider
            .api
            .describe_tags(&lb.arn)
            .await
            .map_err(api_error(id, "listing load balancer tags"))?;
        if has_tags(attrs, &tags) {
            matches.push((lb, tags));
        }
    }
    let (lb, tags) = single(matches, id, "load balancer")?;

    let api_attributes = provider
        .api
        .describe_load_balancer_attributes(&lb.arn)
        .await
        .map_err(api_error(id, "describing load balancer attributes"))?;
    Ok(existing(id, &lb.arn, flatten_load_balancer(&lb, &api_attributes, &tags)))
}
