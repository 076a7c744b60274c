use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (empty field name, bad delimiter, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// A mandatory source (tabular export or snapshot directory) does not exist.
    #[error("{what} not found: {}", path.display())]
    SourceMissing { what: &'static str, path: PathBuf },
    /// A source exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The tabular source is structurally broken (no header row, bad quoting).
    #[error("cannot parse {}: {message}", path.display())]
    TabularParse { path: PathBuf, message: String },
    /// The tabular header has no identity column.
    #[error("{}: missing identity column '{column}'", path.display())]
    MissingIdentityColumn { path: PathBuf, column: String },
    /// Creating the output directory or writing an artifact failed.
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot serialize {artifact}: {source}")]
    Serialize {
        artifact: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// A previously written artifact could not be read back.
    #[error("cannot read artifact {}: {message}", path.display())]
    ArtifactRead { path: PathBuf, message: String },
}

/// Coarse classification of [`SyncError`] for callers that only need to
/// decide how to react (block, retry with other paths, report).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Source,
    Write,
    Artifact,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigParse(_) | Self::ConfigValidation(_) => ErrorKind::Config,
            Self::SourceMissing { .. }
            | Self::SourceRead { .. }
            | Self::TabularParse { .. }
            | Self::MissingIdentityColumn { .. } => ErrorKind::Source,
            Self::Write { .. } | Self::Serialize { .. } => ErrorKind::Write,
            Self::ArtifactRead { .. } => ErrorKind::Artifact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinguishable() {
        let missing = SyncError::SourceMissing {
            what: "tabular source",
            path: PathBuf::from("users.csv"),
        };
        assert_eq!(missing.kind(), ErrorKind::Source);
        assert_eq!(missing.to_string(), "tabular source not found: users.csv");

        let write = SyncError::Write {
            path: PathBuf::from("out/sync_report.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(write.kind(), ErrorKind::Write);
        assert!(write.to_string().contains("sync_report.json"));

        assert_eq!(SyncError::ConfigParse("x".into()).kind(), ErrorKind::Config);
    }
}
