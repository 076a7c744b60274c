use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::SyncError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    pub name: String,
    pub source_a: TabularSourceConfig,
    pub source_b: DocumentSourceConfig,
    #[serde(default)]
    pub fields: FieldConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// The tabular identity export (source A).
#[derive(Debug, Clone, Deserialize)]
pub struct TabularSourceConfig {
    pub file: PathBuf,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Field delimiter. Sniffed from the first lines when unset.
    #[serde(default)]
    pub delimiter: Option<char>,
}

/// The document snapshot (source B): one directory, four line-delimited files.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentSourceConfig {
    pub snapshot_dir: PathBuf,
    #[serde(default = "default_user_field")]
    pub profile_key: String,
    #[serde(default)]
    pub streams: StreamFiles,
}

/// Stream file locations, relative to the snapshot directory.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamFiles {
    #[serde(default = "default_profiles_file")]
    pub profiles: PathBuf,
    #[serde(default = "default_points_file")]
    pub points_history: PathBuf,
    #[serde(default = "default_referrals_file")]
    pub referral_history: PathBuf,
    #[serde(default = "default_mini_game_file")]
    pub mini_game_progress: PathBuf,
}

impl Default for StreamFiles {
    fn default() -> Self {
        Self {
            profiles: default_profiles_file(),
            points_history: default_points_file(),
            referral_history: default_referrals_file(),
            mini_game_progress: default_mini_game_file(),
        }
    }
}

// ---------------------------------------------------------------------------
// Field names + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct FieldConfig {
    /// Foreign key on points and mini-game records.
    #[serde(default = "default_user_field")]
    pub activity_user_field: String,
    /// Creation-time candidates, first numeric one wins.
    #[serde(default = "default_time_fields")]
    pub time_fields: Vec<String>,
    #[serde(default = "default_points_field")]
    pub points_field: String,
    #[serde(default = "default_referrer_field")]
    pub referrer_field: String,
    #[serde(default = "default_referred_field")]
    pub referred_field: String,
    #[serde(default = "default_document_id_field")]
    pub document_id_field: String,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            activity_user_field: default_user_field(),
            time_fields: default_time_fields(),
            points_field: default_points_field(),
            referrer_field: default_referrer_field(),
            referred_field: default_referred_field(),
            document_id_field: default_document_id_field(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_id_field() -> String {
    "id".into()
}

fn default_user_field() -> String {
    "userId".into()
}

fn default_profiles_file() -> PathBuf {
    PathBuf::from("users/documents.jsonl")
}

fn default_points_file() -> PathBuf {
    PathBuf::from("pointsHistory/documents.jsonl")
}

fn default_referrals_file() -> PathBuf {
    PathBuf::from("referralHistory/documents.jsonl")
}

fn default_mini_game_file() -> PathBuf {
    PathBuf::from("userMiniGameProgress/documents.jsonl")
}

fn default_time_fields() -> Vec<String> {
    vec!["_creationTime".into(), "createdAt".into()]
}

fn default_points_field() -> String {
    "pointsEarned".into()
}

fn default_referrer_field() -> String {
    "referrerId".into()
}

fn default_referred_field() -> String {
    "referredId".into()
}

fn default_document_id_field() -> String {
    "_id".into()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl SyncConfig {
    pub fn from_toml(input: &str) -> Result<Self, SyncError> {
        let config: SyncConfig =
            toml::from_str(input).map_err(|e| SyncError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Config for a run described only by paths, with every other setting
    /// at its default.
    pub fn from_paths(tabular: PathBuf, snapshot_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            name: "adhoc".into(),
            source_a: TabularSourceConfig {
                file: tabular,
                id_field: default_id_field(),
                delimiter: None,
            },
            source_b: DocumentSourceConfig {
                snapshot_dir,
                profile_key: default_user_field(),
                streams: StreamFiles::default(),
            },
            fields: FieldConfig::default(),
            output: OutputConfig { dir: output_dir },
        }
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.name.trim().is_empty() {
            return Err(SyncError::ConfigValidation("name must not be empty".into()));
        }

        let key_fields = [
            ("source_a.id_field", &self.source_a.id_field),
            ("source_b.profile_key", &self.source_b.profile_key),
            ("fields.activity_user_field", &self.fields.activity_user_field),
            ("fields.points_field", &self.fields.points_field),
            ("fields.referrer_field", &self.fields.referrer_field),
            ("fields.referred_field", &self.fields.referred_field),
            ("fields.document_id_field", &self.fields.document_id_field),
        ];
        for (label, value) in key_fields {
            if value.trim().is_empty() {
                return Err(SyncError::ConfigValidation(format!("{label} must not be empty")));
            }
        }

        if self.fields.time_fields.is_empty() {
            return Err(SyncError::ConfigValidation(
                "fields.time_fields needs at least one entry".into(),
            ));
        }
        if self.fields.time_fields.iter().any(|f| f.trim().is_empty()) {
            return Err(SyncError::ConfigValidation(
                "fields.time_fields must not contain empty names".into(),
            ));
        }

        if let Some(d) = self.source_a.delimiter {
            if !d.is_ascii() || d == '"' || d == '\n' || d == '\r' {
                return Err(SyncError::ConfigValidation(format!(
                    "source_a.delimiter must be a single ASCII character \
                     other than a quote or newline, got {d:?}"
                )));
            }
        }

        let paths = [
            ("source_a.file", &self.source_a.file),
            ("source_b.snapshot_dir", &self.source_b.snapshot_dir),
            ("source_b.streams.profiles", &self.source_b.streams.profiles),
            ("source_b.streams.points_history", &self.source_b.streams.points_history),
            ("source_b.streams.referral_history", &self.source_b.streams.referral_history),
            ("source_b.streams.mini_game_progress", &self.source_b.streams.mini_game_progress),
            ("output.dir", &self.output.dir),
        ];
        for (label, path) in paths {
            if path.as_os_str().is_empty() {
                return Err(SyncError::ConfigValidation(format!("{label} must not be empty")));
            }
        }

        Ok(())
    }

    /// Resolve relative source and output paths against `base` (normally the
    /// directory holding the config file). Stream files stay relative to the
    /// snapshot directory.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        for path in [
            &mut self.source_a.file,
            &mut self.source_b.snapshot_dir,
            &mut self.output.dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    pub fn stream_path(&self, stream: &Path) -> PathBuf {
        self.source_b.snapshot_dir.join(stream)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
