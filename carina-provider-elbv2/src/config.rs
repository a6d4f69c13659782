//! Provider configuration
//!
//! Durations are written in seconds in configuration files
//! (`"load_balancer_create": 600`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Provider block of the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub region: String,
    /// Custom endpoint (LocalStack and similar)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    /// Named profile from the shared AWS config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default)]
    pub timeouts: Timeouts,
}

impl ProviderConfig {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            endpoint_url: None,
            profile: None,
            timeouts: Timeouts::default(),
        }
    }
}

/// Timeouts of the retry and wait loops
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    #[serde(with = "seconds")]
    pub load_balancer_create: Duration,
    #[serde(with = "seconds")]
    pub load_balancer_update: Duration,
    #[serde(with = "seconds")]
    pub load_balancer_delete: Duration,
    /// Wait before the first load balancer state check
    #[serde(with = "seconds")]
    pub load_balancer_delay: Duration,
    #[serde(with = "seconds")]
    pub load_balancer_poll: Duration,
    /// Newly issued certificates can take a while to become usable by listeners
    #[serde(with = "seconds")]
    pub certificate: Duration,
    /// Retrying `PriorityInUse` when the rule priority is computed
    #[serde(with = "seconds")]
    pub rule_priority: Duration,
    /// Describe calls right after a create
    #[serde(with = "seconds")]
    pub propagation: Duration,
    /// Retrying `ResourceInUse` while listeners and rules detach
    #[serde(with = "seconds")]
    pub target_group_delete: Duration,
    /// Retrying `InvalidTarget` while Lambda permissions propagate
    #[serde(with = "seconds")]
    pub target_registration: Duration,
    #[serde(with = "seconds")]
    pub trust_store_active: Duration,
    #[serde(with = "seconds")]
    pub trust_store_delete: Duration,
    /// First interval of the retry loops
    #[serde(with = "seconds")]
    pub retry_interval: Duration,
    /// Poll interval of waits other than the load balancer one
    #[serde(with = "seconds")]
    pub poll_interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            load_balancer_create: Duration::from_secs(10 * 60),
            load_balancer_update: Duration::from_secs(10 * 60),
            load_balancer_delete: Duration::from_secs(10 * 60),
            load_balancer_delay: Duration::from_secs(30),
            load_balancer_poll: Duration::from_secs(10),
            certificate: Duration::from_secs(5 * 60),
            rule_priority: Duration::from_secs(5 * 60),
            propagation: Duration::from_secs(2 * 60),
            target_group_delete: Duration::from_secs(2 * 60),
            target_registration: Duration::from_secs(10 * 60),
            trust_store_active: Duration::from_secs(2 * 60),
            trust_store_delete: Duration::from_secs(2 * 60),
            retry_interval: Duration::from_secs(1),
            poll_interval: Duration::from_secs(5),
        }
    }
}

impl Timeouts {
    /// Millisecond timings for tests against the in-memory API
    #[cfg(test)]
    pub(crate) fn fast() -> Self {
        let ms = Duration::from_millis;
        Self {
            load_balancer_create: ms(500),
            load_balancer_update: ms(500),
            load_balancer_delete: ms(500),
            load_balancer_delay: ms(1),
            load_balancer_poll: ms(1),
            certificate: ms(200),
            rule_priority: ms(200),
            propagation: ms(200),
            target_group_delete: ms(50),
            target_registration: ms(200),
            trust_store_active: ms(200),
            trust_store_delete: ms(200),
            retry_interval: ms(1),
            poll_interval: ms(1),
        }
    }
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let config: ProviderConfig = serde_json::from_str(r#"{"region": "eu-west-1"}"#).unwrap();
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.endpoint_url, None);
        assert_eq!(config.timeouts, Timeouts::default());
    }

    #[test]
    fn timeouts_override_in_seconds() {
        let config: ProviderConfig = serde_json::from_str(
            r#"{
                "region": "us-east-1",
                "endpoint_url": "http://localhost:4566",
                "timeouts": {"load_balancer_create": 90, "retry_interval": 0.25}
            }"#,
        )
        .unwrap();
        assert_eq!(config.timeouts.load_balancer_create, Duration::from_secs(90));
        assert_eq!(config.timeouts.retry_interval, Duration::from_millis(250));
        assert_eq!(
            config.timeouts.load_balancer_delete,
            Timeouts::default().load_balancer_delete
        );
    }

    #[test]
    fn negative_duration_is_rejected() {
        let result: Result<Timeouts, _> = serde_json::from_str(r#"{"certificate": -1}"#);
        assert!(result.is_err());
    }
}
