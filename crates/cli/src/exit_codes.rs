//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Meaning                                                 |
//! |------|---------------------------------------------------------|
//! | 0    | Success                                                 |
//! | 2    | CLI usage error (bad args, missing required input)      |
//! | 3    | Config could not be read, parsed or validated           |
//! | 4    | A mandatory source is missing, unreadable or malformed  |
//! | 5    | An artifact could not be written                        |
//! | 6    | An existing artifact could not be read back             |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `sync_exit_code` or the relevant command

use usersync_recon::{ErrorKind, SyncError};

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Config file unreadable, not valid TOML, or failed validation.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Tabular source or snapshot directory missing, unreadable or structurally broken.
/// Missing stream files inside the snapshot are not errors.
pub const EXIT_SOURCE: u8 = 4;

/// Output directory or one of the three artifacts could not be written.
/// Artifacts written before the failure are left in place.
pub const EXIT_WRITE: u8 = 5;

/// `summary` could not read or parse an artifact.
pub const EXIT_ARTIFACT: u8 = 6;

/// Map a SyncError to its exit code.
pub fn sync_exit_code(err: &SyncError) -> u8 {
    match err.kind() {
        ErrorKind::Config => EXIT_INVALID_CONFIG,
        ErrorKind::Source => EXIT_SOURCE,
        ErrorKind::Write => EXIT_WRITE,
        ErrorKind::Artifact => EXIT_ARTIFACT,
    }
}

/// Structured error output for `--json` mode, printed to stderr.
#[derive(Debug, serde::Serialize)]
pub struct SyncErrorOutput {
    pub error: &'static str,
    pub message: String,
    pub exit_code: u8,
}

impl SyncErrorOutput {
    pub fn from_sync_error(err: &SyncError) -> Self {
        let error = match err.kind() {
            ErrorKind::Config => "invalid_config",
            ErrorKind::Source => "source_error",
            ErrorKind::Write => "write_error",
            ErrorKind::Artifact => "artifact_error",
        };
        Self {
            error,
            message: err.to_string(),
            exit_code: sync_exit_code(err),
        }
    }
}
