//! Tag handling shared by every taggable resource

use crate::api::{ApiResult, ElbV2Api};
use crate::model::Tags;

/// Tags to add or overwrite, and keys to remove
pub fn diff(desired: &Tags, current: &Tags) -> (Tags, Vec<String>) {
    let upsert: Tags = desired
        .iter()
        .filter(|(k, v)| current.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let remove: Vec<String> = current
        .keys()
        .filter(|k| !desired.contains_key(*k))
        .cloned()
        .collect();
    (upsert, remove)
}

/// Bring the tags of `arn` from `current` to `desired`
pub async fn update(api: &dyn ElbV2Api, arn: &str, current: &Tags, desired: &Tags) -> ApiResult<()> {
    let (upsert, remove) = diff(desired, current);
    if !remove.is_empty() {
        log::info!("removing tags {:?} from {}", remove, arn);
        api.remove_tags(arn, &remove).await?;
    }
    if !upsert.is_empty() {
        log::info!("tagging {} with {:?}", arn, upsert.keys().collect::<Vec<_>>());
        api.add_tags(arn, &upsert).await?;
    }
    Ok(())
}
