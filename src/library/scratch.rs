//! Scratch notes: creation and cleanup after reporting.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::paths::INDEX_FILE;
use crate::core::index::read_entries;
use crate::domain::frontmatter::embedded_fingerprint;
use crate::domain::ContentFingerprint;

/// `scratch/<YYYY-MM-DD>.md`
pub fn today_note_path(scratch_dir: &Path, date: NaiveDate) -> PathBuf {
    scratch_dir.join(format!("{}.md", date.format("%Y-%m-%d")))
}

/// Create the day's note with a heading unless it already exists.
pub async fn ensure_note(scratch_dir: &Path, date: NaiveDate) -> Result<PathBuf> {
    let path = today_note_path(scratch_dir, date);
    if fs::try_exists(&path).await.unwrap_or(false) {
        return Ok(path);
    }

    fs::create_dir_all(scratch_dir)
        .await
        .with_context(|| format!("Failed to create scratch directory: {}", scratch_dir.display()))?;
    fs::write(&path, format!("# Notes for {}\n\n", date.format("%Y-%m-%d")))
        .await
        .with_context(|| format!("Failed to create note: {}", path.display()))?;

    info!(path = %path.display(), "Created note");
    Ok(path)
}

fn glob_tree(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = format!("{}/{}", glob::Pattern::escape(&dir.to_string_lossy()), pattern);
    let paths = glob::glob(&full)
        .with_context(|| format!("Invalid glob pattern: {}", full))?
        .filter_map(|entry| entry.map_err(|e| warn!(error = %e, "Skipping path")).ok())
        .collect();
    Ok(paths)
}

/// Every fingerprint that already produced a report under `daily_dir`:
/// all index files in the tree plus every embedded `input_hash`.
pub async fn collect_report_fingerprints(daily_dir: &Path) -> Result<BTreeSet<ContentFingerprint>> {
    let mut found = BTreeSet::new();
    if !daily_dir.exists() {
        return Ok(found);
    }

    for index in glob_tree(daily_dir, &format!("**/{}", INDEX_FILE))? {
        found.extend(read_entries(&index));
    }

    for report in glob_tree(daily_dir, "**/*.md")? {
        match fs::read_to_string(&report).await {
            Ok(text) => found.extend(embedded_fingerprint(&text)),
            Err(e) => debug!(path = %report.display(), error = %e, "Skipping unreadable report"),
        }
    }

    debug!(count = found.len(), "Collected report fingerprints");
    Ok(found)
}

/// Delete scratch files whose content fingerprint is in `fingerprints`.
///
/// Returns the matching files; with `dry_run` nothing is removed.
pub async fn cleanup(
    scratch_dir: &Path,
    fingerprints: &BTreeSet<ContentFingerprint>,
    dry_run: bool,
) -> Result<Vec<PathBuf>> {
    let mut matched = Vec::new();
    if !scratch_dir.exists() {
        return Ok(matched);
    }

    for path in glob_tree(scratch_dir, "**/*")? {
        if !path.is_file() {
            continue;
        }
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable scratch file");
                continue;
            }
        };
        let fingerprint = ContentFingerprint::of_bytes(&bytes);
        if !fingerprints.contains(&fingerprint) {
            continue;
        }

        if !dry_run {
            fs::remove_file(&path)
                .await
                .with_context(|| format!("Failed to delete scratch file: {}", path.display()))?;
            info!(path = %path.display(), "Deleted reported scratch file");
        }
        matched.push(path);
    }

    Ok(matched)
}
