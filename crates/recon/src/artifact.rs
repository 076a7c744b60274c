//! The three output artifacts: writing them, and reading them back.
//!
//! File names and layout are the contract with anything downstream that
//! displays the results, so they are fixed here rather than configurable.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::SyncError;
use crate::model::{LinkedUserRecord, SyncReport, UnmatchedUserRecord};

pub const LINKED_FILE: &str = "linked_users.jsonl";
pub const UNMATCHED_FILE: &str = "unmatched_users.jsonl";
pub const REPORT_FILE: &str = "sync_report.json";

/// Locations of the three artifacts inside one output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub linked: PathBuf,
    pub unmatched: PathBuf,
    pub report: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            linked: dir.join(LINKED_FILE),
            unmatched: dir.join(UNMATCHED_FILE),
            report: dir.join(REPORT_FILE),
        }
    }
}

// ---------------------------------------------------------------------------
// Write
// ---------------------------------------------------------------------------

/// Write all three artifacts into `dir`, creating it if needed.
///
/// Each file is written on its own; if a later write fails the earlier
/// files stay on disk.
pub fn write_artifacts(
    dir: &Path,
    linked: &[LinkedUserRecord],
    unmatched: &[UnmatchedUserRecord],
    report: &SyncReport,
) -> Result<ArtifactPaths, SyncError> {
    std::fs::create_dir_all(dir).map_err(|source| SyncError::Write {
        path: dir.to_path_buf(),
        source,
    })?;

    let paths = ArtifactPaths::in_dir(dir);
    write_lines(&paths.linked, "linked users", linked)?;
    log::info!("wrote {} linked user records to {}", linked.len(), paths.linked.display());
    write_lines(&paths.unmatched, "unmatched users", unmatched)?;
    log::info!(
        "wrote {} unmatched user records to {}",
        unmatched.len(),
        paths.unmatched.display()
    );
    write_report(&paths.report, report)?;
    log::info!("wrote sync report to {}", paths.report.display());

    Ok(paths)
}

/// One compact JSON document per line, in slice order.
pub fn write_lines<T: Serialize>(
    path: &Path,
    artifact: &'static str,
    records: &[T],
) -> Result<(), SyncError> {
    let io_err = |source| SyncError::Write {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);

    for record in records {
        serde_json::to_writer(&mut writer, record)
            .map_err(|source| SyncError::Serialize { artifact, source })?;
        writer.write_all(b"\n").map_err(io_err)?;
    }
    writer.flush().map_err(io_err)
}

/// Pretty-printed report with a trailing newline.
pub fn write_report(path: &Path, report: &SyncReport) -> Result<(), SyncError> {
    let mut json = serde_json::to_string_pretty(report).map_err(|source| SyncError::Serialize {
        artifact: "sync report",
        source,
    })?;
    json.push('\n');
    std::fs::write(path, json).map_err(|source| SyncError::Write {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

pub fn read_linked(path: &Path) -> Result<Vec<LinkedUserRecord>, SyncError> {
    read_lines(path)
}

pub fn read_unmatched(path: &Path) -> Result<Vec<UnmatchedUserRecord>, SyncError> {
    read_lines(path)
}

pub fn read_report(path: &Path) -> Result<SyncReport, SyncError> {
    let content = std::fs::read_to_string(path).map_err(|e| SyncError::ArtifactRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| SyncError::ArtifactRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Artifacts are written by this crate, so unlike source snapshots a bad
/// line here is an error rather than something to skip.
fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, SyncError> {
    let read_err = |message: String| SyncError::ArtifactRead {
        path: path.to_path_buf(),
        message,
    };
    let file = File::open(path).map_err(|e| read_err(e.to_string()))?;

    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| read_err(e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .map_err(|e| read_err(format!("line {}: {e}", idx + 1)))?;
        records.push(record);
    }
    Ok(records)
}
