//! Lock information for state backend locking

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default lock timeout in seconds (15 minutes)
pub const DEFAULT_LOCK_TIMEOUT_SECS: i64 = 900;

/// Information about a state lock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Random ID, needed to release or force-unlock this lock
    pub id: String,
    /// The operation being performed (e.g., "apply", "destroy", "import")
    pub operation: String,
    /// Who acquired the lock (username@hostname)
    pub who: String,
    /// When the lock was taken
    pub created: DateTime<Utc>,
    /// After this the lock may be taken over by another run
    pub expires: DateTime<Utc>,
}

impl LockInfo {
    /// Lock for `operation` with the default timeout
    pub fn new(operation: impl Into<String>) -> Self {
        Self::with_timeout(operation, DEFAULT_LOCK_TIMEOUT_SECS)
    }

    /// Lock for `operation` expiring after `timeout_secs`
    pub fn with_timeout(operation: impl Into<String>, timeout_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation: operation.into(),
            who: lock_owner(),
            created: now,
            expires: now + Duration::seconds(timeout_secs),
        }
    }

    /// Whether the holder has run past its timeout
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires
    }

    /// Time until expiry; negative once expired
    pub fn time_remaining(&self) -> Duration {
        self.expires - Utc::now()
    }
}

impl std::fmt::Display for LockInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} by {} since {} (lock ID: {})",
            self.operation,
            self.who,
            self.created.format("%Y-%m-%d %H:%M:%S UTC"),
            self.id
        )
    }
}

/// Lock owner as username@hostname, "unknown" for parts that cannot be read
fn lock_owner() -> String {
    let username = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    format!("{}@{}", username, hostname)
}
