//! Schema - Define type schemas for resources
//!
//! Providers define schemas for each resource type and data source,
//! enabling validation, default filling and schema-aware diffing.

use std::collections::HashMap;
use std::fmt;

use crate::resource::Value;

/// Decides whether a difference on one attribute should be ignored
pub type DiffSuppressFn = fn(&SuppressContext<'_>) -> bool;

/// Resource-level validation over the whole attribute map
pub type ResourceValidator = fn(&HashMap<String, Value>) -> Result<(), String>;

/// What a diff-suppress function gets to look at
#[derive(Debug, Clone, Copy)]
pub struct SuppressContext<'a> {
    /// Attribute name within its block
    pub key: &'a str,
    /// Value currently stored (as read back from the provider)
    pub old: Option<&'a Value>,
    /// Value from the configuration
    pub new: Option<&'a Value>,
    /// The desired block the attribute lives in (the resource root for top-level attributes)
    pub block: &'a HashMap<String, Value>,
    /// The desired resource root
    pub root: &'a HashMap<String, Value>,
}

impl SuppressContext<'_> {
    /// String value of a sibling attribute in the desired block
    pub fn sibling_str(&self, key: &str) -> Option<&str> {
        self.block.get(key).and_then(Value::as_str)
    }

    /// String value of a top-level attribute in the desired resource
    pub fn root_str(&self, key: &str) -> Option<&str> {
        self.root.get(key).and_then(Value::as_str)
    }
}

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Boolean
    Bool,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
    /// Ordered list
    List(Box<AttributeType>),
    /// Unordered collection; compared without regard to order
    Set(Box<AttributeType>),
    /// Map
    Map(Box<AttributeType>),
    /// Nested block with its own attribute schemas
    Struct {
        name: String,
        fields: Vec<AttributeSchema>,
    },
}

impl AttributeType {
    /// Enum over string slices
    pub fn enum_of(values: &[&str]) -> Self {
        AttributeType::Enum(values.iter().map(|v| v.to_string()).collect())
    }

    /// Nested block type
    pub fn block(name: impl Into<String>, fields: Vec<AttributeSchema>) -> Self {
        AttributeType::Struct {
            name: name.into(),
            fields,
        }
    }

    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match self.check(value).into_iter().next() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Collect every error for a value
    fn check(&self, value: &Value) -> Vec<TypeError> {
        match (self, value) {
            // References resolve at apply time
            (_, Value::ResourceRef(_, _)) => Vec::new(),
            (AttributeType::String, Value::String(_)) => Vec::new(),
            (AttributeType::Int, Value::Int(_)) => Vec::new(),
            (AttributeType::Bool, Value::Bool(_)) => Vec::new(),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Vec::new()
                } else {
                    vec![TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    }]
                }
            }

            (AttributeType::Custom { validate, base, .. }, v) => {
                let base_errors = base.check(v);
                if !base_errors.is_empty() {
                    return base_errors;
                }
                match validate(v) {
                    Ok(()) => Vec::new(),
                    Err(message) => vec![TypeError::ValidationFailed { message }],
                }
            }

            (AttributeType::List(inner) | AttributeType::Set(inner), Value::List(items)) => items
                .iter()
                .enumerate()
                .flat_map(|(index, item)| {
                    inner
                        .check(item)
                        .into_iter()
                        .map(move |e| TypeError::ListItemError {
                            index,
                            inner: Box::new(e),
                        })
                })
                .collect(),

            (AttributeType::Map(inner), Value::Map(map)) => map
                .iter()
                .flat_map(|(k, v)| {
                    inner
                        .check(v)
                        .into_iter()
                        .map(move |e| TypeError::MapValueError {
                            key: k.clone(),
                            inner: Box::new(e),
                        })
                })
                .collect(),

            (AttributeType::Struct { fields, .. }, Value::Map(map)) => {
                validate_block(fields.iter(), map)
            }

            _ => vec![TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }],
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Set(inner) => format!("Set<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
            AttributeType::Struct { name, .. } => name.clone(),
        }
    }

    /// Field schemas of a struct type (looking through lists and sets)
    pub fn struct_fields(&self) -> Option<&[AttributeSchema]> {
        match self {
            AttributeType::Struct { fields, .. } => Some(fields),
            AttributeType::List(inner) | AttributeType::Set(inner) => inner.struct_fields(),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("Attribute '{name}' is computed and cannot be set")]
    ComputedAttribute { name: String },

    #[error("Attribute '{name}' conflicts with '{other}'")]
    Conflict { name: String, other: String },

    #[error("Attribute '{name}' allows at most {max} items, got {got}")]
    TooManyItems { name: String, max: usize, got: usize },

    #[error("Attribute '{name}' requires at least {min} items, got {got}")]
    TooFewItems { name: String, min: usize, got: usize },

    #[error("Attribute '{name}': {inner}")]
    AttributeError { name: String, inner: Box<TypeError> },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },
}

/// Validate one block (resource root or nested struct) against its field schemas
fn validate_block<'a>(
    fields: impl Iterator<Item = &'a AttributeSchema> + Clone,
    attributes: &HashMap<String, Value>,
) -> Vec<TypeError> {
    let mut errors = Vec::new();

    for schema in fields.clone() {
        let name = &schema.name;
        let value = attributes.get(name);

        if schema.required && value.is_none() && schema.default.is_none() {
            errors.push(TypeError::MissingRequired { name: name.clone() });
        }

        let Some(value) = value else { continue };

        if schema.computed {
            errors.push(TypeError::ComputedAttribute { name: name.clone() });
            continue;
        }

        for other in &schema.conflicts_with {
            if attributes.contains_key(other) {
                errors.push(TypeError::Conflict {
                    name: name.clone(),
                    other: other.clone(),
                });
            }
        }

        if let Value::List(items) = value {
            if let Some(max) = schema.max_items
                && items.len() > max
            {
                errors.push(TypeError::TooManyItems {
                    name: name.clone(),
                    max,
                    got: items.len(),
                });
            }
            if let Some(min) = schema.min_items
                && items.len() < min
            {
                errors.push(TypeError::TooFewItems {
                    name: name.clone(),
                    min,
                    got: items.len(),
                });
            }
        }

        for e in schema.attr_type.check(value) {
            errors.push(TypeError::AttributeError {
                name: name.clone(),
                inner: Box::new(e),
            });
        }
    }

    for name in attributes.keys() {
        if name.starts_with('_') {
            continue;
        }
        if !fields.clone().any(|s| &s.name == name) {
            errors.push(TypeError::UnknownAttribute { name: name.clone() });
        }
    }

    errors
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
    /// Set by the provider only; configuring it is an error
    pub computed: bool,
    /// A change to this attribute forces the resource to be replaced
    pub force_new: bool,
    /// Never returned by reads (secrets); absence in the current state is not a diff
    pub write_only: bool,
    pub conflicts_with: Vec<String>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub diff_suppress: Option<DiffSuppressFn>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            default: None,
            description: None,
            computed: false,
            force_new: false,
            write_only: false,
            conflicts_with: Vec::new(),
            min_items: None,
            max_items: None,
            diff_suppress: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    pub fn conflicts_with(mut self, names: &[&str]) -> Self {
        self.conflicts_with = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_min_items(mut self, min: usize) -> Self {
        self.min_items = Some(min);
        self
    }

    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    pub fn with_diff_suppress(mut self, f: DiffSuppressFn) -> Self {
        self.diff_suppress = Some(f);
        self
    }
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
    pub validators: Vec<ResourceValidator>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
            validators: Vec::new(),
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_validator(mut self, validator: ResourceValidator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Validate resource attributes
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let mut errors = validate_block(self.attributes.values(), attributes);

        // Cross-attribute checks only make sense on a well-typed tree
        if errors.is_empty() {
            for validator in &self.validators {
                if let Err(message) = validator(attributes) {
                    errors.push(TypeError::ValidationFailed { message });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Fill in defaults, including inside nested blocks that are present
    pub fn apply_defaults(&self, attributes: &mut HashMap<String, Value>) {
        apply_block_defaults(self.attributes.values(), attributes);
    }
}

fn apply_block_defaults<'a>(
    fields: impl Iterator<Item = &'a AttributeSchema>,
    attributes: &mut HashMap<String, Value>,
) {
    for schema in fields {
        match attributes.get_mut(&schema.name) {
            Some(value) => apply_nested_defaults(&schema.attr_type, value),
            None => {
                if let Some(default) = &schema.default {
                    attributes.insert(schema.name.clone(), default.clone());
                }
            }
        }
    }
}

fn apply_nested_defaults(attr_type: &AttributeType, value: &mut Value) {
    match (attr_type, value) {
        (AttributeType::Struct { fields, .. }, Value::Map(map)) => {
            apply_block_defaults(fields.iter(), map);
        }
        (AttributeType::List(inner) | AttributeType::Set(inner), Value::List(items)) => {
            for item in items {
                apply_nested_defaults(inner, item);
            }
        }
        _ => {}
    }
}

/// Helper functions for common types
pub mod types {
    use std::sync::LazyLock;

    use regex::Regex;

    use super::*;

    static ARN_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^arn:aws(-[a-z]+)*:[a-z0-9-]+:[a-z0-9-]*:(\d{12})?:.+$")
            .expect("static ARN pattern")
    });

    /// Positive integer type
    pub fn positive_int() -> AttributeType {
        AttributeType::Custom {
            name: "PositiveInt".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| {
                if let Value::Int(n) = value {
                    if *n > 0 {
                        Ok(())
                    } else {
                        Err("Value must be positive".to_string())
                    }
                } else {
                    Err("Expected integer".to_string())
                }
            },
        }
    }

    /// TCP/UDP port number
    pub fn port() -> AttributeType {
        AttributeType::Custom {
            name: "Port".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| match value {
                Value::Int(n) if (1..=65535).contains(n) => Ok(()),
                Value::Int(n) => Err(format!("Port {} out of range 1-65535", n)),
                _ => Err("Expected integer".to_string()),
            },
        }
    }

    /// Amazon Resource Name
    pub fn arn() -> AttributeType {
        AttributeType::Custom {
            name: "Arn".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| match value {
                Value::String(s) if is_arn(s) => Ok(()),
                Value::String(s) => Err(format!("'{}' is not a valid ARN", s)),
                _ => Err("Expected string".to_string()),
            },
        }
    }

    /// CIDR block type (e.g., "10.0.0.0/16" or "2001:db8::/32")
    pub fn cidr() -> AttributeType {
        AttributeType::Custom {
            name: "Cidr".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| {
                if let Value::String(s) = value {
                    validate_cidr(s)
                } else {
                    Err("Expected string".to_string())
                }
            },
        }
    }

    pub fn is_arn(s: &str) -> bool {
        ARN_RE.is_match(s)
    }
}

/// Validate CIDR block format (IPv4 or IPv6)
pub fn validate_cidr(cidr: &str) -> Result<(), String> {
    let Some((ip, prefix)) = cidr.split_once('/') else {
        return Err(format!(
            "Invalid CIDR format '{}': expected IP/prefix",
            cidr
        ));
    };

    let max_prefix = if ip.parse::<std::net::Ipv4Addr>().is_ok() {
        32
    } else if ip.parse::<std::net::Ipv6Addr>().is_ok() {
        128
    } else {
        return Err(format!("Invalid IP address '{}'", ip));
    };

    match prefix.parse::<u8>() {
        Ok(p) if p <= max_prefix => Ok(()),
        Ok(p) => Err(format!(
            "Invalid prefix length '{}': must be 0-{}",
            p, max_prefix
        )),
        Err(_) => Err(format!(
            "Invalid prefix length '{}': must be a number",
            prefix
        )),
    }
}
