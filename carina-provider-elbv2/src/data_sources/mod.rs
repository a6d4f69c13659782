//! Data sources: read-only lookups of existing objects
//!
//! A lookup must match exactly one object; its attributes are returned as the
//! data source's state.

pub mod hosted_zone_id;
pub mod listener;
pub mod load_balancer;
pub mod target_group;
pub mod trust_store;

use carina_core::provider::{ProviderError, ProviderResult};
use carina_core::resource::ResourceId;

use crate::api::{ApiError, Lookup};
use crate::model::Tags;
use crate::utils::{Attrs, get_str, get_string_map};

/// Describe lookup for the `arn` / `name` arguments; everything when neither is set
pub(crate) fn arn_or_name(attrs: &Attrs) -> Lookup {
    match (get_str(attrs, "arn"), get_str(attrs, "name")) {
        (Some(arn), _) => Lookup::arn(arn),
        (None, Some(name)) => Lookup::name(name),
        (None, None) => Lookup::All,
    }
}

/// Whether `tags` carries every tag the lookup asks for
pub(crate) fn has_tags(attrs: &Attrs, tags: &Tags) -> bool {
    get_string_map(attrs, "tags")
        .iter()
        .all(|(k, v)| tags.get(k) == Some(v))
}

/// Describe results, with "not found" meaning no match
pub(crate) fn found<T>(result: Result<Vec<T>, ApiError>, id: &ResourceId, what: &str) -> ProviderResult<Vec<T>> {
    match result {
        Ok(items) => Ok(items),
        Err(e) if e.is_not_found() => Ok(Vec::new()),
        Err(e) => Err(crate::utils::api_error(id, format!("looking up {}", what))(e)),
    }
}

/// The single match of a lookup
pub(crate) fn single<T>(mut matches: Vec<T>, id: &ResourceId, what: &str) -> ProviderResult<T> {
    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => Err(ProviderError::new(format!("no {} matches the given arguments", what))
            .for_resource(id.clone())),
        n => Err(ProviderError::new(format!(
            "{} {}s match the given arguments; narrow the lookup",
            n, what
        ))
        .for_resource(id.clone())),
    }
}
