//! `usersync run | validate | summary`.

use std::path::{Path, PathBuf};

use usersync_recon::artifact::{read_linked, read_report, read_unmatched, ArtifactPaths};
use usersync_recon::loader::StreamStatus;
use usersync_recon::model::SourceSide;
use usersync_recon::{SyncConfig, SyncError, SyncReport};

use crate::exit_codes::{
    sync_exit_code, SyncErrorOutput, EXIT_ARTIFACT, EXIT_INVALID_CONFIG, EXIT_WRITE,
};
use crate::CliError;

/// Paths given on the command line. Each one overrides the config file.
pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub tabular: Option<PathBuf>,
    pub snapshot: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub json: bool,
}

fn sync_err(err: SyncError, json: bool) -> CliError {
    if json {
        let out = SyncErrorOutput::from_sync_error(&err);
        if let Ok(line) = serde_json::to_string(&out) {
            eprintln!("{line}");
            return CliError { code: out.exit_code, message: String::new(), hint: None };
        }
    }
    CliError::sync(err)
}

fn read_config(path: &Path) -> Result<SyncConfig, CliError> {
    let text = std::fs::read_to_string(path).map_err(|e| CliError {
        code: EXIT_INVALID_CONFIG,
        message: format!("cannot read config {}: {e}", path.display()),
        hint: None,
    })?;
    let mut config = SyncConfig::from_toml(&text).map_err(CliError::sync)?;

    // Resolve file paths relative to the config file's directory
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    config.resolve_relative_to(base_dir);
    Ok(config)
}

fn build_config(args: &RunArgs) -> Result<SyncConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => {
            let (Some(tabular), Some(snapshot)) = (&args.tabular, &args.snapshot) else {
                return Err(CliError::args(
                    "either a config file or both --tabular and --snapshot are required",
                )
                .with_hint("usersync run --tabular users.csv --snapshot snapshot/"));
            };
            SyncConfig::from_paths(
                tabular.clone(),
                snapshot.clone(),
                args.output.clone().unwrap_or_else(|| PathBuf::from("output")),
            )
        }
    };

    if let Some(p) = &args.tabular {
        config.source_a.file = p.clone();
    }
    if let Some(p) = &args.snapshot {
        config.source_b.snapshot_dir = p.clone();
    }
    if let Some(p) = &args.output {
        config.output.dir = p.clone();
    }
    Ok(config)
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let config = build_config(&args)?;
    log::debug!("running '{}'", config.name);

    let outcome = usersync_recon::run(&config).map_err(|e| sync_err(e, args.json))?;
    let rec = &outcome.reconciliation;

    for stream in &rec.streams {
        if stream.status == StreamStatus::Absent {
            eprintln!(
                "note: {} not found at {}, treated as empty",
                stream.name,
                stream.path.display()
            );
        } else if stream.skipped > 0 {
            eprintln!(
                "warning: {} malformed line(s) skipped in {}",
                stream.skipped,
                stream.path.display()
            );
        }
    }

    if args.json {
        let json_str = serde_json::to_string_pretty(&rec.report).map_err(|e| CliError {
            code: EXIT_WRITE,
            message: format!("JSON serialization error: {e}"),
            hint: None,
        })?;
        println!("{json_str}");
    }

    print_summary(&rec.report);
    eprintln!("output: {}", config.output.dir.display());
    Ok(())
}

pub fn cmd_validate(config: PathBuf) -> Result<(), CliError> {
    let parsed = read_config(&config)?;
    eprintln!("config OK: \"{}\"", parsed.name);
    eprintln!("  source A: {}", parsed.source_a.file.display());
    eprintln!("  source B: {}", parsed.source_b.snapshot_dir.display());
    eprintln!("  output:   {}", parsed.output.dir.display());
    Ok(())
}

pub fn cmd_summary(dir: PathBuf, json: bool) -> Result<(), CliError> {
    let paths = ArtifactPaths::in_dir(&dir);
    let report = read_report(&paths.report).map_err(|e| sync_err(e, json))?;
    let linked = read_linked(&paths.linked).map_err(|e| sync_err(e, json))?;
    let unmatched = read_unmatched(&paths.unmatched).map_err(|e| sync_err(e, json))?;

    let a_only = unmatched.iter().filter(|u| u.source == SourceSide::A).count();
    let b_only = unmatched.len() - a_only;
    if linked.len() != report.matched_users
        || a_only != report.source_a_only
        || b_only != report.source_b_only
    {
        return Err(CliError {
            code: EXIT_ARTIFACT,
            message: format!(
                "artifacts disagree with report: {} linked / {} A-only / {} B-only on disk, \
                 report says {} / {} / {}",
                linked.len(),
                a_only,
                b_only,
                report.matched_users,
                report.source_a_only,
                report.source_b_only,
            ),
            hint: Some("the last run may have been interrupted; re-run usersync".into()),
        });
    }

    if json {
        let json_str = serde_json::to_string_pretty(&report).map_err(|e| CliError {
            code: EXIT_ARTIFACT,
            message: format!("JSON serialization error: {e}"),
            hint: None,
        })?;
        println!("{json_str}");
    }

    let points: usize = linked.iter().map(|l| l.points_history.len()).sum();
    let referred = linked.iter().filter(|l| l.referred_by.is_some()).count();
    print_summary(&report);
    eprintln!("linked users carry {points} points records; {referred} were referred by someone");
    Ok(())
}

fn print_summary(r: &SyncReport) {
    eprintln!(
        "sync: {} matched, {} source A only, {} source B only; match rate {:.2}% of {} users",
        r.matched_users,
        r.source_a_only,
        r.source_b_only,
        r.match_rate_percent,
        r.total_unique_users,
    );
    eprintln!(
        "      A: {} profiles ({} duplicate rows), B: {} profiles ({} duplicate documents)",
        r.total_source_a_users,
        r.source_a_duplicates,
        r.total_source_b_users,
        r.source_b_duplicates,
    );
    eprintln!(
        "      activity: {} points, {} referrals, {} mini-game records; \
         {} malformed lines skipped",
        r.total_points_records,
        r.total_referral_records,
        r.total_mini_game_records,
        r.skipped_lines,
    );
}

impl CliError {
    pub fn sync(err: SyncError) -> Self {
        let hint = match &err {
            SyncError::SourceMissing { what: "tabular source", .. } => {
                Some("check source_a.file in the config or pass --tabular".to_string())
            }
            SyncError::SourceMissing { .. } => {
                Some("check source_b.snapshot_dir in the config or pass --snapshot".to_string())
            }
            SyncError::MissingIdentityColumn { column, .. } => {
                Some(format!("set source_a.id_field if the identity column is not '{column}'"))
            }
            _ => None,
        };
        Self { code: sync_exit_code(&err), message: err.to_string(), hint }
    }
}
