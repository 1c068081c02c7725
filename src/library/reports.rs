//! Removing written reports.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::info;

use crate::core::index::{off_runtime, FingerprintIndex};
use crate::domain::frontmatter::embedded_fingerprint;
use crate::domain::ContentFingerprint;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedReport {
    pub path: PathBuf,
    pub fingerprint: Option<ContentFingerprint>,
    /// The fingerprint was present in the directory index
    pub forgotten: bool,
}

/// Delete a report and drop its input fingerprint from the directory index,
/// so the same notes can be regenerated.
pub async fn delete_report(path: &Path) -> Result<DeletedReport> {
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read report: {}", path.display()))?;
    let fingerprint = embedded_fingerprint(&text);

    fs::remove_file(path)
        .await
        .with_context(|| format!("Failed to delete report: {}", path.display()))?;

    let forgotten = match (fingerprint.clone(), path.parent()) {
        (Some(fp), Some(dir)) => {
            let index_dir = dir.to_path_buf();
            off_runtime(move || FingerprintIndex::open(index_dir).forget(&fp))
                .await
                .with_context(|| format!("Failed to update index in {}", dir.display()))?
        }
        _ => false,
    };

    info!(path = %path.display(), forgotten, "Deleted report");
    Ok(DeletedReport {
        path: path.to_path_buf(),
        fingerprint,
        forgotten,
    })
}
