//! Per-directory fingerprint index for skip-if-unchanged generation.
//!
//! Each report directory carries a hidden `.report_hashes.json` holding the
//! fingerprints of every input that already produced a report there. The
//! file is a JSON list; a mapping is also accepted on read (its keys are the
//! fingerprints). Writes always produce a sorted list.
//!
//! Read-modify-write cycles hold an exclusive advisory lock on a sidecar
//! `.report_hashes.json.lock`, so concurrent writers on one host merge
//! instead of losing each other's entries.
//!
//! All index I/O is blocking; async callers go through [`off_runtime`].

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::error::ReportError;
use crate::config::paths::index_path;
use crate::domain::frontmatter::embedded_fingerprint;
use crate::domain::{ContentFingerprint, SkipReason};

/// In-memory view of one directory's index
#[derive(Debug, Clone)]
pub struct FingerprintIndex {
    dir: PathBuf,
    path: PathBuf,
    entries: BTreeSet<ContentFingerprint>,
}

impl FingerprintIndex {
    /// Load the index for `dir`. A missing, unreadable or malformed file is
    /// an empty index.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let path = index_path(&dir);
        let entries = read_entries(&path);
        debug!(path = %path.display(), count = entries.len(), "Loaded fingerprint index");
        Self { dir, path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, fingerprint: &ContentFingerprint) -> bool {
        self.entries.contains(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fingerprints(&self) -> impl Iterator<Item = &ContentFingerprint> {
        self.entries.iter()
    }

    /// Whether generation for `fingerprint` can be skipped.
    ///
    /// Checks the index first, then the `input_hash` embedded in
    /// `existing_output`. A match found only in the document is written back
    /// into the index.
    pub fn should_skip(
        &mut self,
        fingerprint: &ContentFingerprint,
        existing_output: &Path,
    ) -> Result<Option<SkipReason>, ReportError> {
        if self.contains(fingerprint) {
            return Ok(Some(SkipReason::IndexHit));
        }

        let existing = match fs::read_to_string(existing_output) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!(path = %existing_output.display(), error = %e, "Could not read existing report");
                return Ok(None);
            }
        };

        if embedded_fingerprint(&existing).as_ref() != Some(fingerprint) {
            return Ok(None);
        }

        info!(path = %existing_output.display(), "Embedded hash matched, reconciling index");
        self.record(fingerprint)?;
        Ok(Some(SkipReason::EmbeddedHashMatch))
    }

    /// Add a fingerprint and persist. Creates the directory if needed.
    pub fn record(&mut self, fingerprint: &ContentFingerprint) -> Result<(), ReportError> {
        let fingerprint = fingerprint.clone();
        self.entries = locked_update(&self.dir, &self.path, move |entries| {
            entries.insert(fingerprint);
        })?;
        Ok(())
    }

    /// Remove a fingerprint and persist. Returns whether it was present.
    pub fn forget(&mut self, fingerprint: &ContentFingerprint) -> Result<bool, ReportError> {
        if !self.path.exists() {
            return Ok(false);
        }
        let mut removed = false;
        self.entries = locked_update(&self.dir, &self.path, |entries| {
            removed = entries.remove(fingerprint);
        })?;
        Ok(removed)
    }

    /// Recompute the index from the embedded fingerprints of every report in
    /// `dir`, replacing whatever was recorded.
    pub fn rebuild(dir: impl Into<PathBuf>) -> Result<Self, ReportError> {
        let dir = dir.into();
        let path = index_path(&dir);
        let found = scan_embedded(&dir)?;
        info!(dir = %dir.display(), count = found.len(), "Rebuilding fingerprint index");
        let entries = locked_update(&dir, &path, move |entries| {
            *entries = found;
        })?;
        Ok(Self { dir, path, entries })
    }
}

/// Parse index content: a list of strings or a mapping keyed by fingerprint.
pub fn parse_entries(raw: &str) -> Option<BTreeSet<ContentFingerprint>> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let entries = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => ContentFingerprint::parse(s),
                Value::Null => None,
                other => ContentFingerprint::parse(&other.to_string()),
            })
            .collect(),
        Value::Object(map) => map.keys().filter_map(|k| ContentFingerprint::parse(k)).collect(),
        _ => return None,
    };
    Some(entries)
}

/// Read an index file. Failures degrade to an empty set.
pub fn read_entries(path: &Path) -> BTreeSet<ContentFingerprint> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return BTreeSet::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable fingerprint index, treating as empty");
            return BTreeSet::new();
        }
    };
    parse_entries(&raw).unwrap_or_else(|| {
        warn!(path = %path.display(), "Malformed fingerprint index, treating as empty");
        BTreeSet::new()
    })
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

/// Re-read, modify and rewrite the index while holding the sidecar lock.
fn locked_update<F>(
    dir: &Path,
    path: &Path,
    modify: F,
) -> Result<BTreeSet<ContentFingerprint>, ReportError>
where
    F: FnOnce(&mut BTreeSet<ContentFingerprint>),
{
    fs::create_dir_all(dir).map_err(|e| ReportError::io("Failed to create directory", dir, e))?;

    let lock_file = lock_path(path);
    let lock = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_file)
        .map_err(|e| ReportError::io("Failed to open index lock", &lock_file, e))?;
    lock.lock_exclusive()
        .map_err(|e| ReportError::io("Failed to lock fingerprint index", &lock_file, e))?;

    let mut entries = read_entries(path);
    modify(&mut entries);
    let result = write_entries(path, &entries);

    // Dropping the handle also releases the lock; unlock explicitly first
    if let Err(e) = FileExt::unlock(&lock) {
        debug!(path = %lock_file.display(), error = %e, "Index unlock failed");
    }
    result.map(|_| entries)
}

fn write_entries(path: &Path, entries: &BTreeSet<ContentFingerprint>) -> Result<(), ReportError> {
    let list: Vec<&str> = entries.iter().map(ContentFingerprint::as_str).collect();
    let json = serde_json::to_string(&list).map_err(|e| {
        ReportError::io("Failed to serialize fingerprint index", path, e.into())
    })?;
    fs::write(path, json).map_err(|e| ReportError::io("Failed to write fingerprint index", path, e))
}

/// Embedded fingerprints of every `.md` file directly in `dir`
fn scan_embedded(dir: &Path) -> Result<BTreeSet<ContentFingerprint>, ReportError> {
    let mut found = BTreeSet::new();
    if !dir.exists() {
        return Ok(found);
    }
    let entries = fs::read_dir(dir).map_err(|e| ReportError::io("Failed to list directory", dir, e))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        match fs::read_to_string(&path) {
            Ok(text) => found.extend(embedded_fingerprint(&text)),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable report"),
        }
    }
    Ok(found)
}

/// Index of the directory that holds `output`
pub fn open_for(output: &Path) -> FingerprintIndex {
    FingerprintIndex::open(output.parent().map(Path::to_path_buf).unwrap_or_default())
}

/// Run blocking index work (file reads, lock waits, writes) on the blocking pool
pub async fn off_runtime<T, F>(work: F) -> Result<T, ReportError>
where
    F: FnOnce() -> Result<T, ReportError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        ReportError::io(
            "Fingerprint index task failed",
            PathBuf::new(),
            std::io::Error::new(ErrorKind::Other, e),
        )
    })?
}
