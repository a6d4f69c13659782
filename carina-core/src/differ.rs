//! Differ - Compare desired state with current state to generate a Plan
//!
//! Compares the "desired state" declared in configuration with the "current state"
//! fetched from the Provider, and generates a list of required Effects (Plan).
//!
//! Only attributes present in the desired tree are compared. Anything the
//! configuration leaves out is owned by the provider (server-side defaults,
//! computed outputs) and never produces a diff.

use std::collections::{HashMap, HashSet};

use crate::effect::Effect;
use crate::plan::Plan;
use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::{AttributeSchema, AttributeType, ResourceSchema, SuppressContext};

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists but a force-new attribute changed -> needs replacement
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
    /// Resource exists but not in desired state -> needs deletion
    Delete(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(desired: &Resource, current: &State, schema: Option<&ResourceSchema>) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = changed_attributes(&desired.attributes, &current.attributes, schema);

    if changed.is_empty() {
        return Diff::NoChange(desired.id.clone());
    }

    let replace = schema.is_some_and(|s| {
        changed
            .iter()
            .any(|name| s.attributes.get(name).is_some_and(|a| a.force_new))
    });

    if replace {
        Diff::Replace {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Names of the desired attributes that differ from the current ones, sorted
///
/// Providers use this during an update to decide which API calls are needed.
pub fn changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
    schema: Option<&ResourceSchema>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired {
        // Skip internal attributes (starting with _)
        if key.starts_with('_') {
            continue;
        }

        let attr_schema = schema.and_then(|s| s.attributes.get(key));
        if attribute_changed(attr_schema, key, desired_value, current.get(key), desired, desired)
        {
            changed.push(key.clone());
        }
    }

    changed.sort();
    changed
}

fn attribute_changed(
    schema: Option<&AttributeSchema>,
    key: &str,
    desired: &Value,
    current: Option<&Value>,
    block: &HashMap<String, Value>,
    root: &HashMap<String, Value>,
) -> bool {
    if let Some(schema) = schema {
        if let Some(suppress) = schema.diff_suppress {
            let ctx = SuppressContext {
                key,
                old: current,
                new: Some(desired),
                block,
                root,
            };
            if suppress(&ctx) {
                return false;
            }
        }
        if schema.write_only && current.is_none() {
            return false;
        }
    }

    match current {
        None => true,
        Some(current) => !values_equal(schema.map(|s| &s.attr_type), desired, current, root),
    }
}

fn values_equal(
    attr_type: Option<&AttributeType>,
    desired: &Value,
    current: &Value,
    root: &HashMap<String, Value>,
) -> bool {
    match (attr_type, desired, current) {
        (Some(AttributeType::Custom { base, .. }), _, _) => {
            values_equal(Some(base.as_ref()), desired, current, root)
        }
        (Some(AttributeType::Set(inner)), Value::List(want), Value::List(have)) => {
            if want.len() != have.len() {
                return false;
            }
            let mut used = vec![false; have.len()];
            want.iter().all(|w| {
                let found = have
                    .iter()
                    .enumerate()
                    .find(|(i, h)| !used[*i] && values_equal(Some(inner.as_ref()), w, h, root));
                match found {
                    Some((i, _)) => {
                        used[i] = true;
                        true
                    }
                    None => false,
                }
            })
        }
        (Some(AttributeType::List(inner)), Value::List(want), Value::List(have)) => {
            want.len() == have.len()
                && want
                    .iter()
                    .zip(have)
                    .all(|(w, h)| values_equal(Some(inner.as_ref()), w, h, root))
        }
        (Some(AttributeType::Map(inner)), Value::Map(want), Value::Map(have)) => {
            want.len() == have.len()
                && want.iter().all(|(k, w)| {
                    have.get(k)
                        .is_some_and(|h| values_equal(Some(inner.as_ref()), w, h, root))
                })
        }
        (Some(AttributeType::Struct { fields, .. }), Value::Map(want), Value::Map(have)) => {
            want.iter().all(|(k, w)| {
                if k.starts_with('_') {
                    return true;
                }
                let field = fields.iter().find(|f| &f.name == k);
                !attribute_changed(field, k, w, have.get(k), want, root)
            })
        }
        _ => desired == current,
    }
}

/// Compute Diff for multiple resources and generate a Plan
///
/// Data sources are skipped; they are read before planning.
pub fn create_plan(
    desired: &[Resource],
    current_states: &HashMap<ResourceId, State>,
    schemas: &HashMap<String, ResourceSchema>,
) -> Plan {
    let mut plan = Plan::new();

    for resource in desired {
        if resource.is_data_source() {
            continue;
        }

        let current = current_states
            .get(&resource.id)
            .cloned()
            .unwrap_or_else(|| State::not_found(resource.id.clone()));

        let d = diff(resource, &current, schemas.get(&resource.id.resource_type));

        match d {
            Diff::Create(r) => plan.add(Effect::Create(r)),
            Diff::Update {
                id,
                from,
                to,
                changed_attributes,
            } => plan.add(Effect::Update {
                id,
                from,
                to,
                changed_attributes,
            }),
            Diff::Replace {
                id,
                from,
                to,
                changed_attributes,
            } => plan.add(Effect::Replace {
                id,
                from,
                to,
                changed_attributes,
            }),
            Diff::NoChange(_) => {}
            Diff::Delete(id) => {
                let identifier = current.identifier.clone().unwrap_or_default();
                plan.add(Effect::Delete { id, identifier });
            }
        }
    }

    plan
}

/// Append deletions for managed resources that are no longer configured
///
/// `managed` is in creation order; deletions are added in reverse.
pub fn plan_orphans(plan: &mut Plan, desired: &[Resource], managed: &[State]) {
    let wanted: HashSet<&ResourceId> = desired.iter().map(|r| &r.id).collect();

    for state in managed.iter().rev() {
        if wanted.contains(&state.id) || !state.exists {
            continue;
        }
        if let Some(identifier) = &state.identifier {
            plan.add(Effect::Delete {
                id: state.id.clone(),
                identifier: identifier.clone(),
            });
        }
    }
}
