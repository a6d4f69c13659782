//! elbv2.target_group data source

use carina_core::provider::ProviderResult;
use carina_core::resource::{ResourceId, State};

use super::{arn_or_name, found, has_tags, single};
use crate::provider::Elbv2Provider;
use crate::resources::{existing, target_group::flatten_target_group};
use crate::utils::{Attrs, api_error};

pub async fn read(provider: &Elbv2Provider, id: &ResourceId, attrs: &Attrs) -> ProviderResult<State> {
    let candidates = found(
        provider.api.describe_target_groups(arn_or_name(attrs)).await,
        id,
        "target group",
    )?;

    let mut matches = Vec::new();
    for tg in candidates {
        let tags = provider
            .api
            .describe_tags(&tg.arn)
            .await
            .map_err(api_error(id, "listing target group tags"))?;
        if has_tags(attrs, &tags) {
            matches.push((tg, tags));
        }
    }
    let (tg, tags) = single(matches, id, "target group")?;

    let api_attributes = provider
        .api
        .describe_target_group_attributes(&tg.arn)
        .await
        .map_err(api_error(id, "describing target group attributes"))?;
    Ok(existing(id, &tg.arn, flatten_target_group(&tg, &api_attributes, &tags)))
}
