//! Resource types and their CRUD operations
//!
//! Each module expands the desired attributes into API requests, performs the
//! calls (with the retries and waits the service needs) and flattens the API
//! response back into state.

pub mod actions;
pub mod listener;
pub mod listener_rule;
pub mod load_balancer;
pub mod target_group;
pub mod target_group_attachment;
pub mod target_group_registration;
pub mod trust_store;
pub mod trust_store_revocation;

use carina_core::provider::ProviderError;
use carina_core::resource::{ResourceId, State};
use carina_core::wait::WaitError;

use crate::model::Tags;
use crate::utils::{Attrs, get_string_map, get_strings};

// =============================================================================
// Shared helpers
// =============================================================================

/// State of an object identified by its ARN
pub(crate) fn existing(id: &ResourceId, arn: &str, attrs: Attrs) -> State {
    State::existing(id.clone(), attrs).with_identifier(arn)
}

pub(crate) fn wait_error(
    id: &ResourceId,
    what: &str,
    error: WaitError<ProviderError>,
) -> ProviderError {
    match error {
        WaitError::Refresh(e) => e,
        other => ProviderError::new(format!("{}: {}", what, other))
            .for_resource(id.clone())
            .with_cause(other),
    }
}

/// Whether a string set differs between the stored state and the configuration
pub(crate) fn set_changed(from: &Attrs, to: &Attrs, key: &str) -> bool {
    let mut old = get_strings(from, key);
    let mut new = get_strings(to, key);
    old.sort();
    new.sort();
    old != new
}

/// Configured tags, if the configuration manages tags at all
pub(crate) fn desired_tags(attrs: &Attrs) -> Option<Tags> {
    attrs.contains_key("tags").then(|| get_string_map(attrs, "tags"))
}
