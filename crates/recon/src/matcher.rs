use crate::index::PrimaryIndex;
use crate::model::MatchSets;

/// Partition the identities of both profile indices by exact key.
pub fn match_identities(a: &PrimaryIndex, b: &PrimaryIndex) -> MatchSets {
    let mut sets = MatchSets::default();

    for key in a.keys() {
        if b.contains_key(key) {
            sets.matched.insert(key.clone());
        } else {
            sets.source_a_only.insert(key.clone());
        }
    }

    for key in b.keys() {
        if !a.contains_key(key) {
            sets.source_b_only.insert(key.clone());
        }
    }

    sets
}

/// Matched share of all distinct identities, in percent, rounded to two
/// decimals. Exactly `0.0` when there are no identities at all.
pub fn match_rate_percent(matched: usize, total_unique: usize) -> f64 {
    if total_unique == 0 {
        return 0.0;
    }
    let rate = matched as f64 / total_unique as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}
