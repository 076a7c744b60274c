use std::collections::{BTreeMap, HashMap};

use crate::model::{IdentityKey, RawRecord};

// ---------------------------------------------------------------------------
// Primary (profile) index
// ---------------------------------------------------------------------------

/// One profile per identity. A later record with the same key replaces the
/// earlier one.
#[derive(Debug, Clone, Default)]
pub struct PrimaryIndex {
    records: BTreeMap<IdentityKey, RawRecord>,
    duplicates: usize,
}

impl PrimaryIndex {
    /// Index `records` by `key_field`. Records without a usable key are dropped.
    pub fn build(records: Vec<RawRecord>, key_field: &str) -> Self {
        let mut index = Self::default();
        for record in records {
            let Some(key) = IdentityKey::from_field(&record, key_field) else {
                continue;
            };
            if index.records.insert(key, record).is_some() {
                index.duplicates += 1;
            }
        }
        index
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&RawRecord> {
        self.records.get(key)
    }

    pub fn contains_key(&self, key: &IdentityKey) -> bool {
        self.records.contains_key(key)
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &IdentityKey> {
        self.records.keys()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records that replaced an earlier record with the same key.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}

// ---------------------------------------------------------------------------
// Activity index
// ---------------------------------------------------------------------------

/// Identity → every related record, in the order the records were read.
#[derive(Debug, Clone, Default)]
pub struct ActivityIndex {
    groups: HashMap<IdentityKey, Vec<RawRecord>>,
    record_count: usize,
}

impl ActivityIndex {
    pub fn build(records: Vec<RawRecord>, key_field: &str) -> Self {
        let mut index = Self::default();
        for record in records {
            if let Some(key) = IdentityKey::from_field(&record, key_field) {
                index.push(key, record);
            }
        }
        index
    }

    fn push(&mut self, key: IdentityKey, record: RawRecord) {
        self.groups.entry(key).or_default().push(record);
        self.record_count += 1;
    }

    /// Records for `key`; empty when the identity has none.
    pub fn get(&self, key: &IdentityKey) -> &[RawRecord] {
        self.groups.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total records accepted into the index.
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Distinct identities with at least one record.
    pub fn identity_count(&self) -> usize {
        self.groups.len()
    }
}

// ---------------------------------------------------------------------------
// Referrals
// ---------------------------------------------------------------------------

/// Referred identity → the referral that brought them in.
///
/// Only the first referral naming an identity is kept; later ones are
/// ignored so every user has at most one referrer.
#[derive(Debug, Clone, Default)]
pub struct ReferredByIndex {
    by_referred: HashMap<IdentityKey, RawRecord>,
}

impl ReferredByIndex {
    fn insert_first(&mut self, key: IdentityKey, record: &RawRecord) {
        self.by_referred.entry(key).or_insert_with(|| record.clone());
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&RawRecord> {
        self.by_referred.get(key)
    }

    pub fn len(&self) -> usize {
        self.by_referred.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_referred.is_empty()
    }
}

/// Both views of the referral stream, built in one pass.
#[derive(Debug, Clone, Default)]
pub struct ReferralIndex {
    /// Keyed by referrer.
    pub made: ActivityIndex,
    pub referred_by: ReferredByIndex,
}

impl ReferralIndex {
    pub fn build(records: Vec<RawRecord>, referrer_field: &str, referred_field: &str) -> Self {
        let mut index = Self::default();
        for record in records {
            if let Some(referred) = IdentityKey::from_field(&record, referred_field) {
                index.referred_by.insert_first(referred, &record);
            }
            if let Some(referrer) = IdentityKey::from_field(&record, referrer_field) {
                index.made.push(referrer, record);
            }
        }
        index
    }
}

// ---------------------------------------------------------------------------
// All indices for one run
// ---------------------------------------------------------------------------

/// Every index a run builds. Owned by the run, read-only once loading ends.
#[derive(Debug, Clone, Default)]
pub struct SyncIndices {
    pub profiles_a: PrimaryIndex,
    pub profiles_b: PrimaryIndex,
    pub points: ActivityIndex,
    pub referrals: ReferralIndex,
    pub mini_games: ActivityIndex,
}
