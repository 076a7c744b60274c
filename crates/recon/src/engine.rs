use std::path::{Path, PathBuf};

use crate::artifact::{write_artifacts, ArtifactPaths};
use crate::assemble::{assemble_matched, assemble_unmatched};
use crate::config::{FieldConfig, SyncConfig};
use crate::error::SyncError;
use crate::index::{ActivityIndex, PrimaryIndex, ReferralIndex, SyncIndices};
use crate::loader::{load_line_records, load_tabular, StreamStatus};
use crate::matcher::match_identities;
use crate::model::{LinkedUserRecord, MatchSets, RawRecord, SyncReport, UnmatchedUserRecord};
use crate::stats::SyncStats;

/// What happened to one document stream during loading.
#[derive(Debug, Clone)]
pub struct StreamSummary {
    pub name: &'static str,
    pub path: PathBuf,
    pub status: StreamStatus,
    pub records: usize,
    pub skipped: usize,
}

/// Everything loaded and indexed, before matching.
#[derive(Debug, Clone)]
pub struct LoadedSources {
    pub indices: SyncIndices,
    pub stats: SyncStats,
    pub streams: Vec<StreamSummary>,
}

/// Result of matching and assembly, not yet written.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub sets: MatchSets,
    pub linked: Vec<LinkedUserRecord>,
    pub unmatched: Vec<UnmatchedUserRecord>,
    pub report: SyncReport,
    pub streams: Vec<StreamSummary>,
}

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub reconciliation: Reconciliation,
    pub artifacts: ArtifactPaths,
}

/// Load, match, assemble and write. Each phase finishes before the next
/// starts; nothing is written unless every source loaded.
pub fn run(config: &SyncConfig) -> Result<SyncOutcome, SyncError> {
    let loaded = load(config)?;
    let reconciliation = reconcile(loaded, &config.fields);
    let artifacts = write_artifacts(
        &config.output.dir,
        &reconciliation.linked,
        &reconciliation.unmatched,
        &reconciliation.report,
    )?;
    Ok(SyncOutcome {
        reconciliation,
        artifacts,
    })
}

/// Read both sources and build every index.
pub fn load(config: &SyncConfig) -> Result<LoadedSources, SyncError> {
    let mut stats = SyncStats::default();
    let mut streams = Vec::with_capacity(4);

    let tabular = load_tabular(&config.source_a.file, &config.source_a)?;
    let profiles_a = PrimaryIndex::build(tabular, &config.source_a.id_field);
    log::info!(
        "loaded {} source A profiles from {}",
        profiles_a.len(),
        config.source_a.file.display()
    );

    let snapshot = &config.source_b.snapshot_dir;
    if !snapshot.is_dir() {
        return Err(SyncError::SourceMissing {
            what: "snapshot directory",
            path: snapshot.clone(),
        });
    }

    let files = &config.source_b.streams;
    let fields = &config.fields;

    let profiles = load_stream(config, "profiles", &files.profiles, &mut stats, &mut streams)?;
    let profiles_b = PrimaryIndex::build(profiles, &config.source_b.profile_key);
    log::info!("loaded {} source B profiles", profiles_b.len());

    let points =
        load_stream(config, "points history", &files.points_history, &mut stats, &mut streams)?;
    let points = ActivityIndex::build(points, &fields.activity_user_field);
    log::info!(
        "loaded {} points records for {} users",
        points.record_count(),
        points.identity_count()
    );

    let referrals =
        load_stream(config, "referral history", &files.referral_history, &mut stats, &mut streams)?;
    let referrals = ReferralIndex::build(referrals, &fields.referrer_field, &fields.referred_field);
    log::info!(
        "loaded {} referral records for {} referrers, {} referred users",
        referrals.made.record_count(),
        referrals.made.identity_count(),
        referrals.referred_by.len()
    );

    let mini_games = load_stream(
        config,
        "mini-game progress",
        &files.mini_game_progress,
        &mut stats,
        &mut streams,
    )?;
    let mini_games = ActivityIndex::build(mini_games, &fields.activity_user_field);
    log::info!(
        "loaded {} mini-game records for {} users",
        mini_games.record_count(),
        mini_games.identity_count()
    );

    let indices = SyncIndices {
        profiles_a,
        profiles_b,
        points,
        referrals,
        mini_games,
    };
    stats.record_indices(&indices);

    Ok(LoadedSources {
        indices,
        stats,
        streams,
    })
}

fn load_stream(
    config: &SyncConfig,
    name: &'static str,
    file: &Path,
    stats: &mut SyncStats,
    streams: &mut Vec<StreamSummary>,
) -> Result<Vec<RawRecord>, SyncError> {
    let path = config.stream_path(file);
    let load = load_line_records(&path)?;
    stats.record_skipped_lines(load.skipped.len());
    streams.push(StreamSummary {
        name,
        path,
        status: load.status,
        records: load.records.len(),
        skipped: load.skipped.len(),
    });
    Ok(load.records)
}

/// Match the two profile indices and assemble both output collections.
pub fn reconcile(loaded: LoadedSources, fields: &FieldConfig) -> Reconciliation {
    let LoadedSources {
        indices,
        mut stats,
        streams,
    } = loaded;

    let sets = match_identities(&indices.profiles_a, &indices.profiles_b);
    stats.record_matches(&sets);
    let report = stats.finalize();
    log::info!(
        "matched {} users, {} source A only, {} source B only, match rate {:.2}%",
        report.matched_users,
        report.source_a_only,
        report.source_b_only,
        report.match_rate_percent
    );

    let linked = assemble_matched(&sets, &indices, fields);
    let unmatched = assemble_unmatched(&sets, &indices);

    Reconciliation {
        sets,
        linked,
        unmatched,
        report,
        streams,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn missing_streams_are_informational() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("users.csv"), "id,email\nu1,a@example.com\n");
        std::fs::create_dir_all(dir.path().join("snap")).unwrap();

        let config = SyncConfig::from_paths(
            dir.path().join("users.csv"),
            dir.path().join("snap"),
            dir.path().join("out"),
        );
        let loaded = load(&config).unwrap();
        assert_eq!(loaded.streams.len(), 4);
        assert!(loaded.streams.iter().all(|s| s.status == StreamStatus::Absent));

        let rec = reconcile(loaded, &config.fields);
        assert_eq!(rec.report.source_a_only, 1);
        assert_eq!(rec.unmatched.len(), 1);
    }

    #[test]
    fn missing_snapshot_dir_is_fatal() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("users.csv"), "id\nu1\n");
        let config = SyncConfig::from_paths(
            dir.path().join("users.csv"),
            dir.path().join("nope"),
            dir.path().join("out"),
        );
        let err = load(&config).unwrap_err();
        assert!(matches!(err, SyncError::SourceMissing { what: "snapshot directory", .. }));
    }

    #[test]
    fn nothing_written_when_tabular_missing() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("snap")).unwrap();
        let config = SyncConfig::from_paths(
            dir.path().join("users.csv"),
            dir.path().join("snap"),
            dir.path().join("out"),
        );
        let err = run(&config).unwrap_err();
        assert!(matches!(err, SyncError::SourceMissing { what: "tabular source", .. }));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn skipped_lines_reach_the_report() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("users.csv"), "id\nu1\n");
        write(
            &dir.path().join("snap/users/documents.jsonl"),
            "{\"userId\":\"u1\"}\nnot json\n",
        );
        write(
            &dir.path().join("snap/pointsHistory/documents.jsonl"),
            "{\"userId\":\"u1\",\"pointsEarned\":3}\n{\"userId\":\n",
        );
        let config = SyncConfig::from_paths(
            dir.path().join("users.csv"),
            dir.path().join("snap"),
            dir.path().join("out"),
        );
        let outcome = run(&config).unwrap();
        let report = &outcome.reconciliation.report;
        assert_eq!(report.skipped_lines, 2);
        assert_eq!(report.matched_users, 1);
        assert_eq!(report.total_points_records, 1);
        assert!(outcome.artifacts.report.is_file());
    }
}
