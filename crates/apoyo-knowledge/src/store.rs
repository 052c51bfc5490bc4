//! Flat-file Knowledge Store.
//!
//! Maps a binary key to a [`KnowledgeRecord`] and persists the mapping in a
//! line-oriented text file:
//!
//! ```text
//! 00001111: Hi || Hello there
//! 00010000:
//! ```
//!
//! | line shape                 | meaning                                   |
//! |----------------------------|-------------------------------------------|
//! | `key: short \|\| detailed` | answered record                           |
//! | `key:`                     | reserved key, both answers empty          |
//! | anything else              | ignored on load, kept verbatim on rewrite |
//!
//! Lines that are not valid UTF-8 count as "anything else".
//!
//! The whole file is loaded into memory by [`KnowledgeStore::open`]; the only
//! mutators are [`KnowledgeStore::reload`] and [`KnowledgeStore::upsert`].
//!
//! # Example
//!
//! ```rust
//! use apoyo_knowledge::store::KnowledgeStore;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let mut store = KnowledgeStore::open(dir.path().join("kb.txt")).unwrap();
//! assert!(store.lookup("00001111").is_none());
//!
//! store.upsert("00001111", "Hi", "Hello there").unwrap();
//! assert_eq!(store.lookup("00001111").unwrap().short_answer, "Hi");
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use apoyo_types::{KnowledgeRecord, QuestionTable};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from knowledge store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read knowledge file {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("Failed to write knowledge file {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("Invalid key {0:?}: keys must be non-empty and contain no ':', '||' or whitespace")]
    InvalidKey(String),
    #[error("Answer text cannot contain line breaks or '||': {0:?}")]
    InvalidField(String),
}

/// What [`KnowledgeStore::upsert`] did to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// An existing line for the key was rewritten.
    Replaced,
    /// No line carried the key; a new one was appended.
    Appended,
}

/// How many of a question table's keys have content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coverage {
    pub total: usize,
    pub answered: usize,
    /// Keys present in the file with empty answers.
    pub reserved: usize,
    /// Keys with no content at all (reserved or absent), in table order.
    pub missing: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Line format
// ─────────────────────────────────────────────────────────────────────────────

/// Parse one knowledge-file line.  Returns `None` for lines to skip.
pub fn parse_line(line: &str) -> Option<KnowledgeRecord> {
    let line = line.trim();
    let (key, rest) = line.split_once(':')?;
    let key = key.trim();
    if !is_valid_key(key) {
        return None;
    }
    match rest.split_once("||") {
        Some((short, detailed)) => {
            if detailed.contains("||") {
                return None;
            }
            Some(KnowledgeRecord::new(key, short.trim(), detailed.trim()))
        }
        None => Some(KnowledgeRecord::reserved(key)),
    }
}

/// Render a record the way [`parse_line`] reads it back (no line ending).
pub fn format_line(key: &str, short: &str, detailed: &str) -> String {
    format!("{key}: {short} || {detailed}")
}

/// Bytes before the first `:`, trimmed.  Used to find the line to rewrite.
fn line_key(line: &[u8]) -> Option<&[u8]> {
    let colon = line.iter().position(|&b| b == b':')?;
    Some(line[..colon].trim_ascii())
}

fn line_ending(line: &[u8]) -> &'static [u8] {
    if line.ends_with(b"\r\n") {
        b"\r\n"
    } else if line.ends_with(b"\n") {
        b"\n"
    } else {
        b""
    }
}

/// Ending of the last terminated line, `\n` when there is none.
fn file_ending(content: &[u8]) -> &'static [u8] {
    match content.iter().rposition(|&b| b == b'\n') {
        Some(i) if i > 0 && content[i - 1] == b'\r' => b"\r\n",
        _ => b"\n",
    }
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && !key.contains(':') && !key.contains("||") && !key.chars().any(char::is_whitespace)
}

pub(crate) fn clean_field(field: &str) -> Result<&str, StoreError> {
    let field = field.trim();
    if field.contains('\n') || field.contains('\r') || field.contains("||") {
        return Err(StoreError::InvalidField(field.to_string()));
    }
    Ok(field)
}

/// Replace the first line carrying `key` with `new_line`, or append it using
/// the file's line ending.  Other lines are copied byte for byte.
fn rewrite(content: &[u8], key: &str, new_line: &str) -> (Vec<u8>, UpsertOutcome) {
    let mut out = Vec::with_capacity(content.len() + new_line.len() + 2);
    let mut outcome = UpsertOutcome::Appended;
    for line in content.split_inclusive(|&b| b == b'\n') {
        if outcome == UpsertOutcome::Appended && line_key(line) == Some(key.as_bytes()) {
            out.extend_from_slice(new_line.as_bytes());
            out.extend_from_slice(line_ending(line));
            outcome = UpsertOutcome::Replaced;
        } else {
            out.extend_from_slice(line);
        }
    }
    if outcome == UpsertOutcome::Appended {
        let ending = file_ending(content);
        if !out.is_empty() && !out.ends_with(b"\n") {
            out.extend_from_slice(ending);
        }
        out.extend_from_slice(new_line.as_bytes());
        out.extend_from_slice(ending);
    }
    (out, outcome)
}

// ─────────────────────────────────────────────────────────────────────────────
// Load
// ─────────────────────────────────────────────────────────────────────────────

/// Read every record from `path`.
///
/// A missing file yields an empty mapping.  Malformed lines, including
/// lines that are not valid UTF-8, are skipped.  When a key appears on
/// several lines the first one wins, since that is the line
/// [`KnowledgeStore::upsert`] rewrites; later duplicates would otherwise
/// shadow a freshly saved answer.
pub fn load(path: &Path) -> Result<BTreeMap<String, KnowledgeRecord>, StoreError> {
    let content = match fs::read(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Knowledge file not found; starting with an empty store");
            return Ok(BTreeMap::new());
        }
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut records = BTreeMap::new();
    for (n, raw) in content.split(|&b| b == b'\n').enumerate() {
        let Ok(line) = std::str::from_utf8(raw) else {
            trace!(line = n + 1, "Skipping knowledge line that is not valid UTF-8");
            continue;
        };
        let Some(record) = parse_line(line) else {
            if !line.trim().is_empty() {
                trace!(line = n + 1, "Skipping malformed knowledge line");
            }
            continue;
        };
        if records.contains_key(&record.key) {
            debug!(key = %record.key, line = n + 1, "Duplicate key ignored; first occurrence wins");
            continue;
        }
        records.insert(record.key.clone(), record);
    }
    Ok(records)
}

// ─────────────────────────────────────────────────────────────────────────────
// KnowledgeStore
// ─────────────────────────────────────────────────────────────────────────────

/// Knowledge file plus its in-memory copy.
#[derive(Debug)]
pub struct KnowledgeStore {
    path: PathBuf,
    records: BTreeMap<String, KnowledgeRecord>,
}

impl KnowledgeStore {
    /// Load `path` into a new store.  A missing file gives an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = load(&path)?;
        info!(path = %path.display(), records = records.len(), "Knowledge store loaded");
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lookup(&self, key: &str) -> Option<&KnowledgeRecord> {
        self.records.get(key)
    }

    /// All records, ordered by key.
    pub fn records(&self) -> impl Iterator<Item = &KnowledgeRecord> {
        self.records.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Re-read the file, discarding the in-memory copy.
    pub fn reload(&mut self) -> Result<(), StoreError> {
        self.records = load(&self.path)?;
        Ok(())
    }

    /// Write `key: short || detailed` into the file and refresh the store.
    ///
    /// The first line carrying `key` is replaced; all other lines keep their
    /// bytes and order.  A key with no line is appended, and a missing file
    /// is created.  Writing the same values twice leaves the file unchanged.
    pub fn upsert(&mut self, key: &str, short: &str, detailed: &str) -> Result<UpsertOutcome, StoreError> {
        if !is_valid_key(key) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        let short = clean_field(short)?;
        let detailed = clean_field(detailed)?;

        let content = match fs::read(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let (rewritten, outcome) = rewrite(&content, key, &format_line(key, short, detailed));
        if rewritten != content {
            write_replace(&self.path, &rewritten)?;
        }
        self.reload()?;
        info!(key, ?outcome, "Knowledge entry saved");
        Ok(outcome)
    }

    /// Tally how many keys of `table` have an answered record.
    pub fn coverage(&self, table: &QuestionTable) -> Coverage {
        let keys = table.combinations();
        let mut answered = 0;
        let mut reserved = 0;
        let mut missing = Vec::new();
        for key in &keys {
            match self.records.get(key) {
                Some(rec) if rec.is_answered() => answered += 1,
                Some(_) => {
                    reserved += 1;
                    missing.push(key.clone());
                }
                None => missing.push(key.clone()),
            }
        }
        Coverage {
            total: keys.len(),
            answered,
            reserved,
            missing,
        }
    }
}

/// Write through a sibling temporary file renamed over `path`.
fn write_replace(path: &Path, content: &[u8]) -> Result<(), StoreError> {
    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    let written = fs::write(&tmp, content).and_then(|()| fs::rename(&tmp, path));
    if let Err(source) = written {
        if let Err(e) = fs::remove_file(&tmp)
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!(path = %tmp.display(), error = %e, "Failed to remove temporary knowledge file");
        }
        return Err(write_err(source));
    }
    Ok(())
}
