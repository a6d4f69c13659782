//! Resolver - Reference resolution and dependency ordering
//!
//! Resources refer to each other with `${binding.attr}` references. Bindings
//! map a binding name to the attributes known so far (configuration merged
//! with whatever state the provider returned).

use std::collections::{HashMap, HashSet};

use crate::resource::{Resource, State, Value};

/// Binding name -> known attributes
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: HashMap<String, HashMap<String, Value>>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource with whatever state is known for it.
    /// Configured attributes win over state attributes.
    pub fn insert(&mut self, resource: &Resource, state: Option<&State>) {
        let Some(binding) = resource.binding() else {
            return;
        };
        let mut attrs = resource.attributes.clone();
        if let Some(state) = state
            && state.exists
        {
            for (k, v) in &state.attributes {
                attrs.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
        self.values.insert(binding.to_string(), attrs);
    }

    /// Record the state returned by a create/update. State attributes win.
    pub fn record(&mut self, resource: &Resource, state: &State) {
        let Some(binding) = resource.binding() else {
            return;
        };
        let mut attrs = resource.attributes.clone();
        for (k, v) in &state.attributes {
            attrs.insert(k.clone(), v.clone());
        }
        self.values.insert(binding.to_string(), attrs);
    }

    pub fn get(&self, binding: &str, attr: &str) -> Option<&Value> {
        self.values.get(binding).and_then(|attrs| attrs.get(attr))
    }

    pub fn contains(&self, binding: &str) -> bool {
        self.values.contains_key(binding)
    }

    /// Resolve references in a value. Unknown references stay as they are.
    pub fn resolve_value(&self, value: &Value) -> Value {
        self.resolve_depth(value, 0)
    }

    fn resolve_depth(&self, value: &Value, depth: usize) -> Value {
        // Reference chains longer than this are cycles
        const MAX_DEPTH: usize = 32;

        match value {
            Value::ResourceRef(binding, attr) if depth < MAX_DEPTH => match self.get(binding, attr)
            {
                Some(v) => self.resolve_depth(v, depth + 1),
                None => value.clone(),
            },
            Value::List(items) => Value::List(
                items
                    .iter()
                    .map(|v| self.resolve_depth(v, depth))
                    .collect(),
            ),
            Value::Map(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve_depth(v, depth)))
                    .collect(),
            ),
            _ => value.clone(),
        }
    }

    /// Resolve all references in a resource's attributes
    pub fn resolve_resource(&self, resource: &Resource) -> Resource {
        let mut resolved = resource.clone();
        resolved.attributes = resource
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), self.resolve_value(v)))
            .collect();
        resolved
    }
}

/// Extract binding names that a resource depends on
pub fn dependencies(resource: &Resource) -> HashSet<String> {
    let mut deps = HashSet::new();
    for value in resource.attributes.values() {
        collect_dependencies(value, &mut deps);
    }
    deps
}

fn collect_dependencies(value: &Value, deps: &mut HashSet<String>) {
    match value {
        Value::ResourceRef(binding_name, _) => {
            deps.insert(binding_name.clone());
        }
        Value::List(items) => {
            for item in items {
                collect_dependencies(item, deps);
            }
        }
        Value::Map(map) => {
            for v in map.values() {
                collect_dependencies(v, deps);
            }
        }
        _ => {}
    }
}

/// Sort resources topologically based on dependencies
///
/// Cycles are broken at the point they are detected; the declaration order is
/// kept for independent resources.
pub fn sort_by_dependencies(resources: &[Resource]) -> Vec<Resource> {
    let mut binding_to_resource: HashMap<String, &Resource> = HashMap::new();
    for resource in resources {
        if let Some(binding) = resource.binding() {
            binding_to_resource.insert(binding.to_string(), resource);
        }
    }

    let mut sorted = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut visiting: HashSet<String> = HashSet::new();

    fn visit<'a>(
        resource: &'a Resource,
        binding_to_resource: &HashMap<String, &'a Resource>,
        visited: &mut HashSet<String>,
        visiting: &mut HashSet<String>,
        sorted: &mut Vec<Resource>,
    ) {
        let key = resource
            .binding()
            .map(str::to_string)
            .unwrap_or_else(|| resource.id.to_string());

        if visited.contains(&key) || visiting.contains(&key) {
            return;
        }

        visiting.insert(key.clone());

        let mut deps: Vec<String> = dependencies(resource).into_iter().collect();
        deps.sort();
        for dep in deps {
            if let Some(dep_resource) = binding_to_resource.get(&dep) {
                visit(dep_resource, binding_to_resource, visited, visiting, sorted);
            }
        }

        visiting.remove(&key);
        visited.insert(key);
        sorted.push(resource.clone());
    }

    for resource in resources {
        visit(
            resource,
            &binding_to_resource,
            &mut visited,
            &mut visiting,
            &mut sorted,
        );
    }

    sorted
}
