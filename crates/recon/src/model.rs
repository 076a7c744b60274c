use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One flat record as produced by a loader. Field order follows the source
/// (header order for tabular rows, document order for JSON lines).
pub type RawRecord = Map<String, Value>;

/// Normalized identity used to correlate a user across both sources.
///
/// Always trimmed and non-empty. Ordering is plain lexicographic byte order
/// of the string, which is the ordering every artifact is sorted by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    /// Normalize a raw string. `None` when nothing is left after trimming.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Read `field` from a record. Only string values count as identities.
    pub fn from_field(record: &RawRecord, field: &str) -> Option<Self> {
        match record.get(field) {
            Some(Value::String(s)) => Self::new(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Which side of the reconciliation a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceSide {
    A,
    B,
}

impl fmt::Display for SourceSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

/// Three disjoint identity sets derived from the two primary indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchSets {
    pub matched: BTreeSet<IdentityKey>,
    pub source_a_only: BTreeSet<IdentityKey>,
    pub source_b_only: BTreeSet<IdentityKey>,
}

impl MatchSets {
    pub fn total_unique(&self) -> usize {
        self.matched.len() + self.source_a_only.len() + self.source_b_only.len()
    }
}

// ---------------------------------------------------------------------------
// Assembled output
// ---------------------------------------------------------------------------

/// Merged view of one identity present in both sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedUserRecord {
    pub identity: IdentityKey,
    /// Document id of the source B profile, if it carried one.
    pub source_b_document_id: Option<Value>,
    pub profile_a: Option<RawRecord>,
    pub profile_b: Option<RawRecord>,
    pub points_history: Vec<RawRecord>,
    pub referrals_made: Vec<RawRecord>,
    pub referred_by: Option<RawRecord>,
    pub mini_game_progress: Vec<RawRecord>,
    pub total_points_earned: Number,
    pub total_referrals_made: usize,
    pub has_profile_a: bool,
    pub has_profile_b: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnmatchReason {
    #[serde(rename = "missing_in_A")]
    MissingInA,
    #[serde(rename = "missing_in_B")]
    MissingInB,
}

impl UnmatchReason {
    /// The reason attached to a record that only exists on `side`.
    pub fn for_side(side: SourceSide) -> Self {
        match side {
            SourceSide::A => Self::MissingInB,
            SourceSide::B => Self::MissingInA,
        }
    }
}

impl fmt::Display for UnmatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingInA => write!(f, "missing_in_A"),
            Self::MissingInB => write!(f, "missing_in_B"),
        }
    }
}

/// A profile present in exactly one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedUserRecord {
    pub source: SourceSide,
    pub identity: IdentityKey,
    pub data: RawRecord,
    pub reason: UnmatchReason,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub total_source_a_users: usize,
    pub total_source_b_users: usize,
    pub source_a_duplicates: usize,
    pub source_b_duplicates: usize,
    pub total_points_records: usize,
    pub total_referral_records: usize,
    pub total_mini_game_records: usize,
    pub skipped_lines: usize,
    pub matched_users: usize,
    pub source_a_only: usize,
    pub source_b_only: usize,
    pub match_rate_percent: f64,
    pub total_unique_users: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_is_trimmed_and_non_empty() {
        assert_eq!(IdentityKey::new("  user_1 ").unwrap().as_str(), "user_1");
        assert!(IdentityKey::new("   ").is_none());
        assert!(IdentityKey::new("").is_none());
    }

    #[test]
    fn identity_ignores_non_string_fields() {
        let record = json!({"userId": 42, "id": null, "other": " x "});
        let record = record.as_object().unwrap();
        assert!(IdentityKey::from_field(record, "userId").is_none());
        assert!(IdentityKey::from_field(record, "id").is_none());
        assert!(IdentityKey::from_field(record, "missing").is_none());
        assert_eq!(IdentityKey::from_field(record, "other").unwrap().as_str(), "x");
    }

    #[test]
    fn unmatched_wire_format() {
        let rec = UnmatchedUserRecord {
            source: SourceSide::B,
            identity: IdentityKey::new("u1").unwrap(),
            data: Map::new(),
            reason: UnmatchReason::for_side(SourceSide::B),
        };
        let line = serde_json::to_string(&rec).unwrap();
        assert_eq!(
            line,
            r#"{"source":"B","identity":"u1","data":{},"reason":"missing_in_A"}"#
        );
    }
}
