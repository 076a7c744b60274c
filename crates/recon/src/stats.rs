use crate::index::SyncIndices;
use crate::matcher::match_rate_percent;
use crate::model::{MatchSets, SyncReport};

/// Counters gathered while a run loads and matches.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    source_a_users: usize,
    source_b_users: usize,
    source_a_duplicates: usize,
    source_b_duplicates: usize,
    points_records: usize,
    referral_records: usize,
    mini_game_records: usize,
    skipped_lines: usize,
    matched: usize,
    source_a_only: usize,
    source_b_only: usize,
}

impl SyncStats {
    pub fn record_skipped_lines(&mut self, count: usize) {
        self.skipped_lines += count;
    }

    pub fn record_indices(&mut self, indices: &SyncIndices) {
        self.source_a_users = indices.profiles_a.len();
        self.source_b_users = indices.profiles_b.len();
        self.source_a_duplicates = indices.profiles_a.duplicates();
        self.source_b_duplicates = indices.profiles_b.duplicates();
        self.points_records = indices.points.record_count();
        self.referral_records = indices.referrals.made.record_count();
        self.mini_game_records = indices.mini_games.record_count();
    }

    pub fn record_matches(&mut self, sets: &MatchSets) {
        self.matched = sets.matched.len();
        self.source_a_only = sets.source_a_only.len();
        self.source_b_only = sets.source_b_only.len();
    }

    pub fn finalize(&self) -> SyncReport {
        let total_unique_users = self.matched + self.source_a_only + self.source_b_only;
        SyncReport {
            total_source_a_users: self.source_a_users,
            total_source_b_users: self.source_b_users,
            source_a_duplicates: self.source_a_duplicates,
            source_b_duplicates: self.source_b_duplicates,
            total_points_records: self.points_records,
            total_referral_records: self.referral_records,
            total_mini_game_records: self.mini_game_records,
            skipped_lines: self.skipped_lines,
            matched_users: self.matched,
            source_a_only: self.source_a_only,
            source_b_only: self.source_b_only,
            match_rate_percent: match_rate_percent(self.matched, total_unique_users),
            total_unique_users,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::PrimaryIndex;
    use crate::matcher::match_identities;
    use crate::model::RawRecord;
    use serde_json::Value;

    fn profiles(field: &str, ids: &[&str]) -> PrimaryIndex {
        let records = ids
            .iter()
            .map(|id| {
                let mut r = RawRecord::new();
                r.insert(field.into(), Value::String((*id).into()));
                r
            })
            .collect();
        PrimaryIndex::build(records, field)
    }

    #[test]
    fn report_counts() {
        let indices = SyncIndices {
            profiles_a: profiles("id", &["A", "B", "C", "C"]),
            profiles_b: profiles("userId", &["B", "C", "D"]),
            ..Default::default()
        };
        let sets = match_identities(&indices.profiles_a, &indices.profiles_b);

        let mut stats = SyncStats::default();
        stats.record_indices(&indices);
        stats.record_matches(&sets);
        stats.record_skipped_lines(2);
        let report = stats.finalize();

        assert_eq!(report.total_source_a_users, 3);
        assert_eq!(report.source_a_duplicates, 1);
        assert_eq!(report.total_source_b_users, 3);
        assert_eq!(report.matched_users, 2);
        assert_eq!(report.source_a_only, 1);
        assert_eq!(report.source_b_only, 1);
        assert_eq!(report.total_unique_users, 4);
        assert_eq!(report.match_rate_percent, 50.0);
        assert_eq!(report.skipped_lines, 2);
        assert_eq!(report.matched_users + report.source_a_only, report.total_source_a_users);
        assert_eq!(report.matched_users + report.source_b_only, report.total_source_b_users);
    }

    #[test]
    fn empty_run_report() {
        let report = SyncStats::default().finalize();
        assert_eq!(report.total_unique_users, 0);
        assert_eq!(report.match_rate_percent, 0.0);
    }
}
