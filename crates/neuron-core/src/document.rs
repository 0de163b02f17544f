//! The document model.
//!
//! A document is created once and never updated. It is removed only by the
//! retention sweeper once its `created_at` falls behind the retention cutoff.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Number of random bytes appended to a document name to form its id.
const ID_SUFFIX_BYTES: usize = 16;

/// Wall-clock time in microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The Unix epoch.
    pub const EPOCH: Self = Self(0);

    /// Create from microseconds since the epoch.
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Microseconds since the epoch.
    pub const fn as_micros(&self) -> i64 {
        self.0
    }

    /// This timestamp moved back by `age`, clamped at `i64::MIN`.
    pub fn saturating_sub(self, age: Duration) -> Self {
        let micros = i64::try_from(age.as_micros()).unwrap_or(i64::MAX);
        Self(self.0.saturating_sub(micros))
    }

    /// This timestamp moved forward by `delta`, clamped at `i64::MAX`.
    pub fn saturating_add(self, delta: Duration) -> Self {
        let micros = i64::try_from(delta.as_micros()).unwrap_or(i64::MAX);
        Self(self.0.saturating_add(micros))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}us", self.0)
    }
}

/// Source of the current time.
///
/// Stores stamp `created_at` and the sweeper computes its cutoff through this
/// trait, so tests can drive both with a manual clock.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> Timestamp;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_micros()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Timestamp(micros)
    }
}

/// Mint a fresh document id: `name` followed by 32 hex characters of randomness.
pub fn mint_document_id(name: &str) -> String {
    let mut suffix = [0u8; ID_SUFFIX_BYTES];
    rand::thread_rng().fill_bytes(&mut suffix);
    format!("{}{}", name, hex::encode(suffix))
}

/// A stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Globally unique id, prefixed with the caller-supplied name.
    pub id: String,
    /// The owning user or namespace.
    pub owner: String,
    /// Opaque payload.
    pub content: String,
    /// Assigned by the store at insert time.
    pub created_at: Timestamp,
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Document(id={}, owner={})", self.id, self.owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minted_id_has_name_prefix() {
        let id = mint_document_id("report");
        assert!(id.starts_with("report"));
        assert_eq!(id.len(), "report".len() + ID_SUFFIX_BYTES * 2);
    }

    #[test]
    fn test_minted_ids_are_unique() {
        let a = mint_document_id("same-name");
        let b = mint_document_id("same-name");
        assert_ne!(a, b);
    }

    #[test]
    fn test_timestamp_saturating_sub() {
        let ts = Timestamp::from_micros(5_000_000);
        assert_eq!(
            ts.saturating_sub(Duration::from_secs(2)),
            Timestamp::from_micros(3_000_000)
        );
        assert_eq!(
            Timestamp::from_micros(i64::MIN).saturating_sub(Duration::from_secs(1)),
            Timestamp::from_micros(i64::MIN)
        );
    }

    #[test]
    fn test_system_clock_is_after_epoch() {
        assert!(SystemClock.now() > Timestamp::EPOCH);
    }

    #[test]
    fn test_display_omits_content() {
        let doc = Document {
            id: "doc0011".into(),
            owner: "alice".into(),
            content: "secret body".into(),
            created_at: Timestamp::from_micros(1),
        };
        let shown = doc.to_string();
        assert_eq!(shown, "Document(id=doc0011, owner=alice)");
        assert!(!shown.contains("secret"));
    }
}
