//! Cache generation identifiers
//!
//! A generation is minted once per worker instantiation from the
//! instantiation time and never changes afterwards. The next instantiation
//! supersedes it; nothing is destroyed until that worker's activate handler
//! deletes every generation other than its own.

use chrono::Utc;
use std::fmt;

/// Identifier for one generation of the cache namespace
///
/// Rendered as `{prefix}-{millis}`, e.g. `pulse-cache-1754550000123`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheGeneration {
    stamp_millis: i64,
    label: String,
}

impl CacheGeneration {
    /// Mint a generation from the current time
    pub fn now(prefix: &str) -> Self {
        Self::from_stamp(prefix, Utc::now().timestamp_millis())
    }

    /// Build a generation from an explicit millisecond stamp
    pub fn from_stamp(prefix: &str, stamp_millis: i64) -> Self {
        Self {
            stamp_millis,
            label: format!("{prefix}-{stamp_millis}"),
        }
    }

    /// The cache name this generation owns in the store
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The instantiation stamp in milliseconds since the epoch
    pub fn stamp_millis(&self) -> i64 {
        self.stamp_millis
    }

    /// Whether a store cache name belongs to this generation
    pub fn matches(&self, name: &str) -> bool {
        self.label == name
    }

    /// Parse a cache name minted with the given prefix
    ///
    /// Returns `None` for names from a different namespace or with a
    /// malformed stamp.
    pub fn parse(prefix: &str, name: &str) -> Option<Self> {
        let stamp = name
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('-'))?;
        let stamp_millis: i64 = stamp.parse().ok()?;
        Some(Self::from_stamp(prefix, stamp_millis))
    }
}

impl fmt::Display for CacheGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}
