//! Canonical workspace layout.
//!
//! Single source of truth - import this instead of hardcoding paths.
//!
//! ```text
//! <root>/
//! ├── .env.secrets                  # local override store
//! ├── scratch/                      # raw daily notes (YYYY-MM-DD.md)
//! └── content/
//!     ├── daily/<YYYY>/<M>/         # daily reports + .report_hashes.json
//!     └── weekly/                   # weekly reports + .report_hashes.json
//! ```

use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};

/// Hidden fingerprint index file kept next to the reports of a directory
pub const INDEX_FILE: &str = ".report_hashes.json";

/// Local override store file name
pub const SECRETS_FILE: &str = ".env.secrets";

/// Resolved directories under a workspace root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn daily_dir(&self) -> PathBuf {
        self.root.join("content").join("daily")
    }

    pub fn weekly_dir(&self) -> PathBuf {
        self.root.join("content").join("weekly")
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.root.join("scratch")
    }

    pub fn secrets_file(&self) -> PathBuf {
        self.root.join(SECRETS_FILE)
    }

    /// Date-partitioned directory for a day's reports (`daily/<year>/<month>`)
    pub fn daily_partition(&self, date: NaiveDate) -> PathBuf {
        self.daily_dir()
            .join(date.year().to_string())
            .join(date.month().to_string())
    }

    /// Default output path handed to the pipeline before slug renaming
    pub fn default_daily_output(&self, date: NaiveDate) -> PathBuf {
        self.daily_partition(date)
            .join(format!("{}-generated.md", date.format("%Y-%m-%d")))
    }
}

/// Index file for a report directory
pub fn index_path(dir: &Path) -> PathBuf {
    dir.join(INDEX_FILE)
}
