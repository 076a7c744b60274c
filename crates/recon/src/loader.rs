use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::Value;

use crate::config::TabularSourceConfig;
use crate::error::SyncError;
use crate::model::RawRecord;

// ---------------------------------------------------------------------------
// Tabular source
// ---------------------------------------------------------------------------

/// Load the tabular export. Every cell is trimmed and empty cells become
/// `null`, so a present field never holds an empty string.
pub fn load_tabular(
    path: &Path,
    source: &TabularSourceConfig,
) -> Result<Vec<RawRecord>, SyncError> {
    if !path.is_file() {
        return Err(SyncError::SourceMissing {
            what: "tabular source",
            path: path.to_path_buf(),
        });
    }
    let content = read_file_as_utf8(path)?;
    let delimiter = match source.delimiter {
        Some(c) => c as u8,
        None => sniff_delimiter(&content),
    };
    parse_tabular(path, &content, delimiter, &source.id_field)
}

/// Parse tabular text. `path` is only used for error messages.
pub fn parse_tabular(
    path: &Path,
    content: &str,
    delimiter: u8,
    id_column: &str,
) -> Result<Vec<RawRecord>, SyncError> {
    let parse_err = |message: String| SyncError::TabularParse {
        path: path.to_path_buf(),
        message,
    };

    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| parse_err(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(parse_err("missing header row".into()));
    }
    if !headers.iter().any(|h| h == id_column) {
        return Err(SyncError::MissingIdentityColumn {
            path: path.to_path_buf(),
            column: id_column.into(),
        });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| parse_err(e.to_string()))?;

        let mut row = RawRecord::new();
        for (i, h) in headers.iter().enumerate() {
            let value = match record.get(i).map(str::trim) {
                Some(v) if !v.is_empty() => Value::String(v.to_string()),
                _ => Value::Null,
            };
            row.insert(h.clone(), value);
        }
        rows.push(row);
    }

    log::debug!("{}: {} rows", path.display(), rows.len());
    Ok(rows)
}

/// Read file and convert to UTF-8 if needed. Exports opened and re-saved in
/// spreadsheet tools are often Windows-1252.
fn read_file_as_utf8(path: &Path) -> Result<String, SyncError> {
    let bytes = std::fs::read(path).map_err(|source| SyncError::SourceRead {
        path: path.to_path_buf(),
        source,
    })?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            log::warn!("{} is not valid UTF-8, decoding as Windows-1252", path.display());
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

/// Detect the most likely field delimiter by checking consistency across the
/// first few lines. The candidate producing the most consistent field count
/// (>1 field) wins; comma when nothing qualifies.
pub fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content
        .trim_start_matches('\u{feff}')
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(10)
        .collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        let target = counts[0];
        if target <= 1 {
            continue;
        }

        // Consistent lines weighted by field count; more columns breaks ties.
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

// ---------------------------------------------------------------------------
// Line-delimited documents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Present,
    /// The file does not exist. Streams are optional, so this is not an error.
    Absent,
}

/// A line that could not be parsed and was left out of the load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based.
    pub line: usize,
    pub message: String,
}

impl SkippedLine {
    /// The warning logged for this line of `file_name`.
    pub fn warning(&self, file_name: &str) -> String {
        format!("skipping malformed line {} of {file_name}: {}", self.line, self.message)
    }
}

#[derive(Debug, Clone)]
pub struct LineLoad {
    pub status: StreamStatus,
    pub records: Vec<RawRecord>,
    pub skipped: Vec<SkippedLine>,
}

impl LineLoad {
    fn absent() -> Self {
        Self {
            status: StreamStatus::Absent,
            records: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

/// Load a file holding one JSON object per line.
///
/// Blank lines are ignored. Lines that fail to parse, or parse to something
/// other than an object, are logged and skipped; the rest of the file still
/// loads. Only I/O failures on an existing file are errors.
pub fn load_line_records(path: &Path) -> Result<LineLoad, SyncError> {
    if !path.exists() {
        log::info!("{} not present, treating as empty", path.display());
        return Ok(LineLoad::absent());
    }

    let read_err = |source| SyncError::SourceRead {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(read_err)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mut load = LineLoad {
        status: StreamStatus::Present,
        records: Vec::new(),
        skipped: Vec::new(),
    };

    for (idx, line) in BufReader::new(file).split(b'\n').enumerate() {
        let line = line.map_err(read_err)?;
        let line = line.trim_ascii();
        if line.is_empty() {
            continue;
        }
        let line_no = idx + 1;

        let message = match serde_json::from_slice::<Value>(line) {
            Ok(Value::Object(record)) => {
                load.records.push(record);
                continue;
            }
            Ok(other) => format!("expected a JSON object, found {}", json_type_name(&other)),
            Err(e) => e.to_string(),
        };

        let skipped = SkippedLine {
            line: line_no,
            message,
        };
        log::warn!("{}", skipped.warning(&file_name));
        load.skipped.push(skipped);
    }

    Ok(load)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
