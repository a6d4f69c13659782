//! elbv2.listener data source

use carina_core::provider::{ProviderError, ProviderResult};
use carina_core::resource::{ResourceId, State};

use super::{found, single};
use crate::api::Lookup;
use crate::model::Attributes;
use crate::provider::Elbv2Provider;
use crate::resources::existing;
use crate::resources::listener::{flatten_listener, has_attributes};
use crate::utils::{Attrs, api_error, get_i32, get_str};

pub async fn read(provider: &Elbv2Provider, id: &ResourceId, attrs: &Attrs) -> ProviderResult<State> {
    let listener = match get_str(attrs, "arn") {
        Some(arn) => {
            let candidates = found(
                provider.api.describe_listeners(Lookup::arn(arn)).await,
                id,
                "listener",
            )?;
            single(candidates, id, "listener")?
        }
        None => {
            let (Some(load_balancer_arn), Some(port)) =
                (get_str(attrs, "load_balancer_arn"), get_i32(attrs, "port"))
            else {
                return Err(ProviderError::new(
                    "either arn or both load_balancer_arn and port are required",
                )
                .for_resource(id.clone()));
            };
            let candidates = found(
                provider
                    .api
                    .describe_listeners(Lookup::Parent(load_balancer_arn.to_string()))
                    .await,
                id,
                "listener",
            )?;
            single(
                candidates.into_iter().filter(|l| l.port == Some(port)).collect(),
                id,
                "listener",
            )?
        }
    };

    let api_attributes = if !has_attributes(listener.protocol.as_deref()) {
        Attributes::new()
    } else {
        provider
            .api
            .describe_listener_attributes(&listener.arn)
            .await
            .map_err(api_error(id, "describing listener attributes"))?
    };
    let tags = provider
        .api
        .describe_tags(&listener.arn)
        .await
        .map_err(api_error(id, "listing listener tags"))?;

    Ok(existing(id, &listener.arn, flatten_listener(&listener, &api_attributes, &tags)))
}
