//! Report kinds, provenance and the fixed section layout.

use serde::{Deserialize, Serialize};

/// Placeholder marker written into skeleton sections
pub const PLACEHOLDER: &str = "N/A";

/// Tag written when no real tag survived normalization
pub const SENTINEL_TAG: &str = "untagged";

/// Heading under which the model's text is kept when the skeleton is used
pub const RAW_OUTPUT_HEADING: &str = "### Raw Model Output";

/// Which report is being produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Daily,
    Weekly,
}

impl ReportKind {
    /// Required section headings, in the order they must appear
    pub fn required_sections(&self) -> &'static [&'static str] {
        match self {
            ReportKind::Daily => &[
                "## What I Did Today",
                "## Problems / Blockers",
                "## Root Cause",
                "## Attempts & Fixes",
                "## Key Learnings",
                "## Metrics",
                "## Next Steps (Tomorrow)",
            ],
            ReportKind::Weekly => &[
                "## Weekly Highlights",
                "## Progress by Area",
                "## Problems / Blockers",
                "## Risks",
                "## Key Learnings",
                "## Next Week Plan",
                "## Metrics",
            ],
        }
    }

    /// Slug used when nothing better could be derived
    pub fn default_slug(&self) -> &'static str {
        match self {
            ReportKind::Daily => "daily-report",
            ReportKind::Weekly => "weekly-report",
        }
    }

    /// Title used when the model gave none. `label` is the date or week slug.
    pub fn default_title(&self, label: &str) -> String {
        match self {
            ReportKind::Daily => format!("Daily Report - {}", label),
            ReportKind::Weekly => format!("Weekly Report - {}", label),
        }
    }

    /// Body line for a skeleton section
    pub(crate) fn placeholder_line(&self, heading: &str) -> String {
        if *self == ReportKind::Daily && heading == "## Next Steps (Tomorrow)" {
            format!("- [ ] {}", PLACEHOLDER)
        } else {
            format!("- {}", PLACEHOLDER)
        }
    }
}

/// Slugs that mean "no meaningful slug was found"
pub fn is_placeholder_slug(slug: &str) -> bool {
    matches!(slug, "" | "note" | "daily-report" | "weekly-report")
}

/// Where the raw notes came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Manual,
    Commit,
    Issue,
    Weekly,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Manual => write!(f, "manual"),
            SourceType::Commit => write!(f, "commit"),
            SourceType::Issue => write!(f, "issue"),
            SourceType::Weekly => write!(f, "weekly"),
        }
    }
}
