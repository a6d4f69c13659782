//! Helpers for reading configuration values and building state values

use std::collections::{BTreeMap, HashMap};

use carina_core::provider::ProviderError;
use carina_core::resource::{ResourceId, Value};

use crate::api::ApiError;

pub type Attrs = HashMap<String, Value>;

pub fn get_str<'a>(attrs: &'a Attrs, key: &str) -> Option<&'a str> {
    attrs.get(key).and_then(Value::as_str)
}

pub fn get_string(attrs: &Attrs, key: &str) -> Option<String> {
    get_str(attrs, key).map(str::to_string)
}

pub fn get_int(attrs: &Attrs, key: &str) -> Option<i64> {
    attrs.get(key).and_then(Value::as_int)
}

pub fn get_i32(attrs: &Attrs, key: &str) -> Option<i32> {
    get_int(attrs, key).and_then(|n| i32::try_from(n).ok())
}

pub fn get_bool(attrs: &Attrs, key: &str) -> Option<bool> {
    attrs.get(key).and_then(Value::as_bool)
}

/// Strings of a list or set attribute
pub fn get_strings(attrs: &Attrs, key: &str) -> Vec<String> {
    attrs
        .get(key)
        .and_then(Value::as_list)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// A single nested block
pub fn get_block<'a>(attrs: &'a Attrs, key: &str) -> Option<&'a Attrs> {
    match attrs.get(key)? {
        Value::Map(map) => Some(map),
        Value::List(items) => items.first().and_then(Value::as_map),
        _ => None,
    }
}

/// Repeated nested blocks
pub fn get_blocks<'a>(attrs: &'a Attrs, key: &str) -> Vec<&'a Attrs> {
    match attrs.get(key) {
        Some(Value::List(items)) => items.iter().filter_map(Value::as_map).collect(),
        Some(Value::Map(map)) => vec![map],
        _ => Vec::new(),
    }
}

/// String map attribute (tags, extra request parameters)
pub fn get_string_map(attrs: &Attrs, key: &str) -> BTreeMap<String, String> {
    attrs
        .get(key)
        .and_then(Value::as_map)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

pub fn required_str(id: &ResourceId, attrs: &Attrs, key: &str) -> Result<String, ProviderError> {
    match attrs.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::ResourceRef(binding, attr)) => Err(ProviderError::new(format!(
            "'{}' refers to ${{{}.{}}}, which is not known yet",
            key, binding, attr
        ))
        .for_resource(id.clone())),
        _ => Err(ProviderError::new(format!("'{}' is required", key)).for_resource(id.clone())),
    }
}

pub fn string(s: impl Into<String>) -> Value {
    Value::String(s.into())
}

pub fn string_list<I, S>(items: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Value::List(items.into_iter().map(|s| Value::String(s.into())).collect())
}

pub fn string_map(map: &BTreeMap<String, String>) -> Value {
    Value::Map(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

/// Insert `value` when it is present
pub fn put<T: Into<Value>>(attrs: &mut Attrs, key: &str, value: Option<T>) {
    if let Some(value) = value {
        attrs.insert(key.to_string(), value.into());
    }
}

/// Attach resource context to an API error
pub fn api_error(id: &ResourceId, what: impl Into<String>) -> impl FnOnce(ApiError) -> ProviderError {
    let id = id.clone();
    let what = what.into();
    move |e| {
        ProviderError::new(format!("{}: {}", what, e))
            .for_resource(id)
            .with_cause(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_accept_map_or_list() {
        let mut inner = HashMap::new();
        inner.insert("enabled".to_string(), Value::Bool(true));
        let mut attrs = Attrs::new();
        attrs.insert("a".to_string(), Value::Map(inner.clone()));
        attrs.insert("b".to_string(), Value::List(vec![Value::Map(inner)]));

        assert_eq!(get_block(&attrs, "a").and_then(|b| get_bool(b, "enabled")), Some(true));
        assert_eq!(get_block(&attrs, "b").and_then(|b| get_bool(b, "enabled")), Some(true));
        assert_eq!(get_blocks(&attrs, "a").len(), 1);
        assert!(get_block(&attrs, "c").is_none());
    }

    #[test]
    fn required_str_reports_unresolved_reference() {
        let id = ResourceId::new("elbv2.listener", "http");
        let mut attrs = Attrs::new();
        attrs.insert(
            "load_balancer_arn".to_string(),
            Value::ResourceRef("lb".to_string(), "arn".to_string()),
        );
        let err = required_str(&id, &attrs, "load_balancer_arn").unwrap_err();
        assert!(err.to_string().contains("${lb.arn}"));
        let err = required_str(&id, &attrs, "port").unwrap_err();
        assert_eq!(err.to_string(), "[elbv2.listener.http] 'port' is required");
    }

    #[test]
    fn i32_out_of_range_is_none() {
        let mut attrs = Attrs::new();
        attrs.insert("n".to_string(), Value::Int(i64::MAX));
        assert_eq!(get_i32(&attrs, "n"), None);
    }
}
