use std::cmp::Ordering;

use serde_json::{Number, Value};

use crate::config::FieldConfig;
use crate::index::{PrimaryIndex, SyncIndices};
use crate::model::{
    IdentityKey, LinkedUserRecord, MatchSets, RawRecord, SourceSide, UnmatchReason,
    UnmatchedUserRecord,
};

/// Build the merged record for every matched identity, in key order.
pub fn assemble_matched(
    sets: &MatchSets,
    indices: &SyncIndices,
    fields: &FieldConfig,
) -> Vec<LinkedUserRecord> {
    let mut linked = Vec::with_capacity(sets.matched.len());

    for key in &sets.matched {
        // Matched keys come from both indices.
        let (Some(profile_a), Some(profile_b)) =
            (indices.profiles_a.get(key), indices.profiles_b.get(key))
        else {
            log::error!("matched identity '{key}' lost a profile, skipping");
            continue;
        };
        linked.push(link_user(key, profile_a, profile_b, indices, fields));
    }

    linked
}

fn link_user(
    key: &IdentityKey,
    profile_a: &RawRecord,
    profile_b: &RawRecord,
    indices: &SyncIndices,
    fields: &FieldConfig,
) -> LinkedUserRecord {
    let points = indices.points.get(key);
    let referrals = indices.referrals.made.get(key);

    LinkedUserRecord {
        identity: key.clone(),
        source_b_document_id: profile_b.get(&fields.document_id_field).cloned(),
        profile_a: Some(profile_a.clone()),
        profile_b: Some(profile_b.clone()),
        points_history: sorted_by_creation(points, &fields.time_fields),
        referrals_made: sorted_by_creation(referrals, &fields.time_fields),
        referred_by: indices.referrals.referred_by.get(key).cloned(),
        mini_game_progress: indices.mini_games.get(key).to_vec(),
        total_points_earned: sum_field(points, &fields.points_field),
        total_referrals_made: referrals.len(),
        has_profile_a: true,
        has_profile_b: true,
    }
}

/// Wrap every single-source profile: all source A records first, then all
/// source B records, each group in key order. Activity data is never attached.
pub fn assemble_unmatched(sets: &MatchSets, indices: &SyncIndices) -> Vec<UnmatchedUserRecord> {
    let mut unmatched = Vec::with_capacity(sets.source_a_only.len() + sets.source_b_only.len());
    wrap_unmatched(&mut unmatched, &sets.source_a_only, &indices.profiles_a, SourceSide::A);
    wrap_unmatched(&mut unmatched, &sets.source_b_only, &indices.profiles_b, SourceSide::B);
    unmatched
}

fn wrap_unmatched<'a>(
    out: &mut Vec<UnmatchedUserRecord>,
    keys: impl IntoIterator<Item = &'a IdentityKey>,
    index: &PrimaryIndex,
    side: SourceSide,
) {
    for key in keys {
        let Some(data) = index.get(key) else {
            continue;
        };
        out.push(UnmatchedUserRecord {
            source: side,
            identity: key.clone(),
            data: data.clone(),
            reason: UnmatchReason::for_side(side),
        });
    }
}

// ---------------------------------------------------------------------------
// Derived values
// ---------------------------------------------------------------------------

/// Creation time of a record: the first numeric field among `time_fields`,
/// or 0 when none is present.
pub fn creation_time(record: &RawRecord, time_fields: &[String]) -> f64 {
    time_fields
        .iter()
        .find_map(|f| record.get(f).and_then(Value::as_f64))
        .unwrap_or(0.0)
}

/// Stable ascending sort by creation time. Records with equal times keep
/// their load order.
fn sorted_by_creation(records: &[RawRecord], time_fields: &[String]) -> Vec<RawRecord> {
    let mut keyed: Vec<(f64, &RawRecord)> = records
        .iter()
        .map(|r| (creation_time(r, time_fields), r))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| a.total_cmp(b));
    keyed.into_iter().map(|(_, r)| r.clone()).collect()
}

/// Running total that stays integral until a fractional value shows up.
#[derive(Debug, Clone, Copy)]
enum Total {
    Int(i64),
    Float(f64),
}

impl Total {
    fn add(self, n: &Number) -> Self {
        match (self, n.as_i64()) {
            (Self::Int(acc), Some(v)) => match acc.checked_add(v) {
                Some(sum) => Self::Int(sum),
                None => Self::Float(acc as f64 + v as f64),
            },
            (acc, _) => Self::Float(acc.as_f64() + n.as_f64().unwrap_or(0.0)),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    fn into_number(self) -> Number {
        match self {
            Self::Int(v) => Number::from(v),
            Self::Float(v) => Number::from_f64(v).unwrap_or_else(|| Number::from(0)),
        }
    }
}

/// Sum a numeric field over `records`. Missing or non-numeric values count as 0.
pub fn sum_field(records: &[RawRecord], field: &str) -> Number {
    records
        .iter()
        .filter_map(|r| match r.get(field) {
            Some(Value::Number(n)) => Some(n),
            _ => None,
        })
        .fold(Total::Int(0), |acc, n| acc.add(n))
        .into_number()
}

/// Ordering helper for callers checking the sort contract.
pub fn compare_creation(a: &RawRecord, b: &RawRecord, time_fields: &[String]) -> Ordering {
    creation_time(a, time_fields).total_cmp(&creation_time(b, time_fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{ActivityIndex, ReferralIndex};
    use crate::matcher::match_identities;
    use serde_json::json;

    fn rec(value: Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    fn fixture() -> (SyncIndices, FieldConfig) {
        let fields = FieldConfig::default();
        let indices = SyncIndices {
            profiles_a: PrimaryIndex::build(
                vec![
                    rec(json!({"id": "u1", "email": "one@example.com"})),
                    rec(json!({"id": "u2", "email": "two@example.com"})),
                ],
                "id",
            ),
            profiles_b: PrimaryIndex::build(
                vec![
                    rec(json!({"_id": "doc_1", "userId": "u1", "points": 50})),
                    rec(json!({"_id": "doc_3", "userId": "u3"})),
                ],
                "userId",
            ),
            points: ActivityIndex::build(
                vec![
                    rec(json!({"userId": "u1", "pointsEarned": 10, "_creationTime": 300.0})),
                    rec(json!({"userId": "u1", "pointsEarned": 5, "_creationTime": 100.0})),
                    rec(json!({"userId": "u1", "pointsEarned": 7})),
                    rec(json!({"userId": "u1", "_creationTime": 100.0, "tag": "late-tie"})),
                    rec(json!({"userId": "u2", "pointsEarned": 99})),
                ],
                "userId",
            ),
            referrals: ReferralIndex::build(
                vec![
                    rec(json!({"referrerId": "u1", "referredId": "x", "_creationTime": 20})),
                    rec(json!({"referrerId": "u1", "referredId": "y", "createdAt": 10})),
                    rec(json!({"referrerId": "z", "referredId": "u1", "_creationTime": 5})),
                ],
                "referrerId",
                "referredId",
            ),
            mini_games: ActivityIndex::build(
                vec![
                    rec(json!({"userId": "u1", "level": 2})),
                    rec(json!({"userId": "u1", "level": 1})),
                    rec(json!({"userId": "u3", "level": 9})),
                ],
                "userId",
            ),
        };
        (indices, fields)
    }

    #[test]
    fn linked_record_joins_everything() {
        let (indices, fields) = fixture();
        let sets = match_identities(&indices.profiles_a, &indices.profiles_b);
        let linked = assemble_matched(&sets, &indices, &fields);
        assert_eq!(linked.len(), 1);

        let u1 = &linked[0];
        assert_eq!(u1.identity.as_str(), "u1");
        assert_eq!(u1.source_b_document_id, Some(json!("doc_1")));
        assert_eq!(u1.profile_a.as_ref().unwrap()["email"], json!("one@example.com"));
        assert_eq!(u1.profile_b.as_ref().unwrap()["points"], json!(50));
        assert!(u1.has_profile_a && u1.has_profile_b);

        // Missing time sorts first; ties keep load order
        let times: Vec<f64> = u1
            .points_history
            .iter()
            .map(|r| creation_time(r, &fields.time_fields))
            .collect();
        assert_eq!(times, vec![0.0, 100.0, 100.0, 300.0]);
        assert_eq!(u1.points_history[1]["pointsEarned"], json!(5));
        assert_eq!(u1.points_history[2]["tag"], json!("late-tie"));

        assert_eq!(u1.total_points_earned, Number::from(22));
        assert_eq!(u1.total_referrals_made, 2);
        // createdAt is the fallback time field
        assert_eq!(u1.referrals_made[0]["referredId"], json!("y"));
        assert_eq!(u1.referred_by.as_ref().unwrap()["referrerId"], json!("z"));

        // Mini-game progress keeps append order
        let levels: Vec<&Value> = u1.mini_game_progress.iter().map(|r| &r["level"]).collect();
        assert_eq!(levels, vec![&json!(2), &json!(1)]);
    }

    #[test]
    fn unmatched_records_carry_no_activity() {
        let (indices, _) = fixture();
        let sets = match_identities(&indices.profiles_a, &indices.profiles_b);
        let unmatched = assemble_unmatched(&sets, &indices);
        assert_eq!(unmatched.len(), 2);

        assert_eq!(unmatched[0].source, SourceSide::A);
        assert_eq!(unmatched[0].identity.as_str(), "u2");
        assert_eq!(unmatched[0].reason, UnmatchReason::MissingInB);
        assert_eq!(unmatched[0].data, rec(json!({"id": "u2", "email": "two@example.com"})));

        // u3 has mini-game progress but only its profile is emitted
        assert_eq!(unmatched[1].source, SourceSide::B);
        assert_eq!(unmatched[1].identity.as_str(), "u3");
        assert_eq!(unmatched[1].reason, UnmatchReason::MissingInA);
        assert_eq!(unmatched[1].data, rec(json!({"_id": "doc_3", "userId": "u3"})));
    }

    #[test]
    fn sum_stays_integral_until_fraction() {
        let ints = vec![rec(json!({"p": 1})), rec(json!({"p": -4})), rec(json!({"q": 8}))];
        assert_eq!(sum_field(&ints, "p"), Number::from(-3));

        let mixed = vec![rec(json!({"p": 1})), rec(json!({"p": 2.5})), rec(json!({"p": "7"}))];
        assert_eq!(sum_field(&mixed, "p"), Number::from_f64(3.5).unwrap());

        assert_eq!(sum_field(&[], "p"), Number::from(0));
    }

    #[test]
    fn creation_time_prefers_first_numeric_field() {
        let fields = vec!["_creationTime".to_string(), "createdAt".to_string()];
        assert_eq!(creation_time(&rec(json!({"_creationTime": 5, "createdAt": 9})), &fields), 5.0);
        let fallback = rec(json!({"_creationTime": "soon", "createdAt": 9}));
        assert_eq!(creation_time(&fallback, &fields), 9.0);
        assert_eq!(creation_time(&rec(json!({})), &fields), 0.0);
    }
}
