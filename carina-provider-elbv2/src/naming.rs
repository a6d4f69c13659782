//! Name generation for resources with `name` / `name_prefix`

use std::sync::LazyLock;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::Utc;
use regex::Regex;

/// Length of the suffix appended to a prefix
pub const UNIQUE_SUFFIX_LENGTH: usize = 26;

static COUNTER: AtomicU32 = AtomicU32::new(0);

static UNIQUE_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{18}[0-9a-f]{8}$").expect("static suffix pattern"));

/// Timestamp with 100µs resolution followed by a process-wide counter
pub fn unique_suffix() -> String {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S%f").to_string();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}{:08x}", &timestamp[..18], counter)
}

/// Configured name, or `prefix` (falling back to `default_prefix`) plus a unique suffix
pub fn name_or_prefix(name: Option<&str>, prefix: Option<&str>, default_prefix: &str) -> String {
    if let Some(name) = name {
        return name.to_string();
    }
    format!("{}{}", prefix.unwrap_or(default_prefix), unique_suffix())
}

/// Prefix of a generated name, if the name ends with a unique suffix
pub fn prefix_from_name(name: &str) -> Option<&str> {
    if name.len() < UNIQUE_SUFFIX_LENGTH || !name.is_char_boundary(name.len() - UNIQUE_SUFFIX_LENGTH)
    {
        return None;
    }
    let (prefix, suffix) = name.split_at(name.len() - UNIQUE_SUFFIX_LENGTH);
    UNIQUE_SUFFIX_RE.is_match(suffix).then_some(prefix)
}

/// Truncate a generated name to the service limit
pub fn truncate(name: String, max: usize) -> String {
    if name.len() <= max {
        name
    } else {
        name.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_shape() {
        let a = unique_suffix();
        let b = unique_suffix();
        assert_eq!(a.len(), UNIQUE_SUFFIX_LENGTH);
        assert_ne!(a, b);
        assert!(UNIQUE_SUFFIX_RE.is_match(&a));
    }

    #[test]
    fn configured_name_wins() {
        assert_eq!(name_or_prefix(Some("web"), Some("x-"), "tf-"), "web");
    }

    #[test]
    fn generated_names_round_trip_prefix() {
        let name = name_or_prefix(None, None, "tf-lb-");
        assert_eq!(name.len(), 32);
        assert_eq!(prefix_from_name(&name), Some("tf-lb-"));

        let name = name_or_prefix(None, Some("api-"), "tf-");
        assert_eq!(prefix_from_name(&name), Some("api-"));
    }

    #[test]
    fn plain_names_have_no_prefix() {
        assert_eq!(prefix_from_name("web"), None);
        assert_eq!(prefix_from_name("a-name-that-is-long-but-not-generated"), None);
    }

    #[test]
    fn truncates_long_names() {
        assert_eq!(truncate("abcdef".to_string(), 4), "abcd");
        assert_eq!(truncate("abc".to_string(), 4), "abc");
    }
}
