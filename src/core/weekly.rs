//! Weekly rollup: schedule gate, reporting window, daily collection and
//! prompt assembly.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use tokio::process::Command;
use tracing::{debug, warn};

use super::error::ReportError;
use crate::config::WeeklySettings;

/// Reporting window of one weekly run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// `{iso_year}-W{iso_week:02}` of `start`
    pub slug: String,
}

impl WeekWindow {
    /// Seven days ending today, or yesterday unless `include_today`
    pub fn ending(today: NaiveDate, include_today: bool) -> Self {
        let end = if include_today {
            today
        } else {
            today - Duration::days(1)
        };
        let start = end - Duration::days(6);
        Self {
            start,
            end,
            slug: week_slug(start),
        }
    }

    /// `2023-W01 (2023-01-02 to 2023-01-08)`
    pub fn label(&self) -> String {
        format!("{} ({} to {})", self.slug, self.start, self.end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// ISO week slug of a date
pub fn week_slug(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// Whether a scheduled weekly run should proceed at `now`.
pub fn should_run_now(settings: &WeeklySettings, now: DateTime<Utc>) -> bool {
    if !settings.enforce_schedule {
        return true;
    }
    let Some(day) = settings.weekday else {
        return false;
    };
    if let Some(hour) = settings.hour_utc {
        if hour != now.hour() {
            return false;
        }
    }
    now.weekday() == day
}

/// Date prefix of a `YYYY-MM-DD-<slug>.md` report filename
pub fn parse_day_from_filename(path: &Path) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(".md")?;
    let (date, rest) = (stem.get(..10)?, stem.get(10..)?);
    if !rest.starts_with('-') || rest.len() < 2 {
        return None;
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Every daily report under `daily_dir` dated inside the window, sorted by path.
pub fn collect_daily_reports(daily_dir: &Path, window: &WeekWindow) -> Result<Vec<PathBuf>, ReportError> {
    if !daily_dir.exists() {
        return Ok(Vec::new());
    }
    let pattern = format!("{}/**/*.md", glob::Pattern::escape(&daily_dir.to_string_lossy()));
    let entries = glob::glob(&pattern)
        .map_err(|e| ReportError::invalid("daily directory", e))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable path");
                None
            }
        })
        .filter(|path| parse_day_from_filename(path).is_some_and(|d| window.contains(d)))
        .collect();
    paths.sort();
    Ok(paths)
}

/// A daily report loaded for the rollup
#[derive(Debug, Clone)]
pub struct DailyEntry {
    pub path: PathBuf,
    pub date: Option<NaiveDate>,
    pub content: String,
}

impl DailyEntry {
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

pub async fn load_dailies(paths: &[PathBuf]) -> Result<Vec<DailyEntry>, ReportError> {
    let mut entries = Vec::with_capacity(paths.len());
    for path in paths {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ReportError::io("Failed to read daily report", path, e))?;
        entries.push(DailyEntry {
            path: path.clone(),
            date: parse_day_from_filename(path),
            content,
        });
    }
    Ok(entries)
}

fn metric_bullets(content: &str) -> Vec<&str> {
    let mut bullets = Vec::new();
    let mut inside = false;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            inside = trimmed == "## Metrics";
            continue;
        }
        if inside && (trimmed.starts_with("- ") || trimmed.starts_with("* ")) {
            bullets.push(trimmed);
        }
    }
    bullets
}

/// Metrics bullets of every daily, grouped under `**YYYY-MM-DD**`
pub fn extract_metrics(entries: &[DailyEntry]) -> String {
    let mut blocks = Vec::new();
    for entry in entries {
        let bullets = metric_bullets(&entry.content);
        if bullets.is_empty() {
            continue;
        }
        let label = entry
            .date
            .map(|d| d.to_string())
            .unwrap_or_else(|| entry.name());
        blocks.push(format!("**{}**\n{}", label, bullets.join("\n")));
    }
    if blocks.is_empty() {
        return "No metrics recorded.".to_string();
    }
    blocks.join("\n\n")
}

/// One-line-per-commit log for the window. Never fails: problems come back
/// as a marker line for the prompt.
pub async fn git_activity(repo_root: &Path, window: &WeekWindow) -> String {
    let output = Command::new("git")
        .arg("log")
        .arg(format!("--since={}T00:00:00", window.start))
        .arg(format!("--until={}T23:59:59", window.end))
        .arg("--pretty=format:%h %s (%an)")
        .current_dir(repo_root)
        .stdin(Stdio::null())
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => {
            let log = String::from_utf8_lossy(&out.stdout).trim().to_string();
            if log.is_empty() {
                "No commits in range.".to_string()
            } else {
                log
            }
        }
        Ok(out) => {
            let stderr = String::from_utf8_lossy(&out.stderr);
            debug!(status = ?out.status, %stderr, "git log failed");
            format!("git log unavailable: {}", stderr.trim())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => "git log not found: git is not installed".to_string(),
        Err(e) => format!("git log unavailable: {}", e),
    }
}

/// User prompt for the weekly rollup
pub fn build_weekly_prompt(window: &WeekWindow, entries: &[DailyEntry], git_log: &str) -> String {
    let mut parts = vec![
        format!("Week: {}", window.slug),
        format!("Range: {} to {}", window.start, window.end),
        String::new(),
        "### Aggregated Metrics".to_string(),
        extract_metrics(entries),
        String::new(),
        "### Git Activity".to_string(),
        git_log.to_string(),
        String::new(),
        "Daily reports:".to_string(),
    ];
    for entry in entries {
        parts.push(format!("\n---\nFile: {}\n{}\n", entry.name(), entry.content));
    }
    parts.push("\nPlease generate a structured weekly report in Markdown.".to_string());
    parts.push("At the very top, include two single-line fields:".to_string());
    parts.push("Title: <short, specific title>".to_string());
    parts.push("Tags: <comma-separated, 2-6 tags>".to_string());
    parts.push(format!(
        "Add a title line after that: '# Weekly Report - {}'.",
        window.label()
    ));
    parts.push("Use the required section order exactly.".to_string());
    parts.push("Use bullet lists in each section.".to_string());
    parts.join("\n")
}
