//! Pipeline Integration Tests
//!
//! End-to-end runs of the daily and weekly pipelines against a scripted
//! generator, covering output naming, the review gate and missing inputs.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;

use daylog::config::paths::{index_path, Layout};
use daylog::config::WeeklySettings;
use daylog::core::{ReportRequest, WeeklyRequest};
use daylog::domain::frontmatter::parse_block;
use daylog::domain::{ReportOutcome, ReportState, SkipReason};
use daylog::{
    ContentFingerprint, FingerprintIndex, Generator, PromptPair, ReportError, ReportOrchestrator,
    ResponseExtractor, SourceType,
};

const PARSER_FIX_RESPONSE: &str = "---\ntitle: \"Parser Fix\"\ntags: [\"bugfix\"]\n---\n## What I Did Today\n- Fixed parser\n\n## Problems / Blockers\n- Tokenizer dropped quotes\n\n## Root Cause\n- Off-by-one in lookahead\n\n## Attempts & Fixes\n- Rewrote lookahead\n\n## Key Learnings\n- Fuzz the tokenizer\n\n## Metrics\n- 1 bug fixed\n\n## Next Steps (Tomorrow)\n- [ ] Add regression test\n";

/// Generator that returns a fixed response and records every prompt
struct Scripted {
    response: Value,
    prompts: Mutex<Vec<PromptPair>>,
}

impl Scripted {
    fn content(text: &str) -> Self {
        Self {
            response: json!({"choices": [{"message": {"content": text}}]}),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Generator for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompts: &PromptPair) -> Result<Value, ReportError> {
        self.prompts.lock().unwrap().push(prompts.clone());
        Ok(self.response.clone())
    }
}

fn orchestrator(generator: Scripted) -> ReportOrchestrator<Scripted> {
    ReportOrchestrator::new(
        generator,
        ResponseExtractor::new(&["choices.0.message.content"], true),
        "system prompt",
    )
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
}

fn write_notes(layout: &Layout, text: &str) -> PathBuf {
    let input = layout.scratch_dir().join("2023-01-01.md");
    std::fs::create_dir_all(layout.scratch_dir()).unwrap();
    std::fs::write(&input, text).unwrap();
    input
}

fn request(layout: &Layout, input: PathBuf) -> ReportRequest {
    ReportRequest {
        input,
        output: layout.default_daily_output(date()),
        date: date(),
        source_type: SourceType::Issue,
        source_id: "42".to_string(),
        force: false,
    }
}

fn written_path(outcome: &Option<ReportOutcome>) -> &Path {
    outcome
        .as_ref()
        .and_then(|o| o.written_path())
        .expect("run wrote a report")
}

#[tokio::test]
async fn test_parser_fix_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let layout = Layout::new(temp_dir.path());
    let input = write_notes(&layout, "Fixed a bug in parser");
    let orch = orchestrator(Scripted::content(PARSER_FIX_RESPONSE));

    let run = orch.run(&request(&layout, input)).await.unwrap();

    assert_eq!(run.exit_code(), 0);
    assert_eq!(run.state, ReportState::Done);
    let path = written_path(&run.outcome);
    assert_eq!(path, layout.daily_partition(date()).join("2023-01-01-parser-fix.md"));

    let document = std::fs::read_to_string(path).unwrap();
    let (meta, body) = parse_block(&document).unwrap();
    assert_eq!(meta.title.as_deref(), Some("Parser Fix"));
    assert_eq!(meta.slug.as_deref(), Some("parser-fix"));
    assert_eq!(meta.date.as_deref(), Some("2023-01-01"));
    assert_eq!(meta.source_type.as_deref(), Some("issue"));
    assert_eq!(meta.source_id.as_deref(), Some("42"));
    assert_eq!(meta.tags.iter().cloned().collect::<Vec<_>>(), vec!["bugfix"]);
    assert_eq!(
        meta.fingerprint(),
        Some(ContentFingerprint::of_text("Fixed a bug in parser"))
    );
    assert!(body.starts_with("## What I Did Today\n- Fixed parser"));
    assert!(!body.contains("Raw Model Output"));

    // The prompt carried the notes and provenance
    let prompts = orch.generator().prompts.lock().unwrap();
    assert_eq!(prompts[0].system, "system prompt");
    assert!(prompts[0].user.contains("Source: issue:42"));
    assert!(prompts[0].user.contains("Fixed a bug in parser"));
}

#[tokio::test]
async fn test_review_gate_for_unstructured_response() {
    let temp_dir = TempDir::new().unwrap();
    let layout = Layout::new(temp_dir.path());
    let input = write_notes(&layout, "did some things");
    let orch = orchestrator(Scripted::content("I did some things today."));

    let req = request(&layout, input);
    let run = orch.run(&req).await.unwrap();

    assert_eq!(run.exit_code(), 2);
    assert_eq!(run.state, ReportState::NeedsReview);
    // No slug: the caller's default path is used unchanged
    assert_eq!(written_path(&run.outcome), req.output.as_path());

    let document = std::fs::read_to_string(&req.output).unwrap();
    let (meta, body) = parse_block(&document).unwrap();
    assert_eq!(meta.tags.iter().cloned().collect::<Vec<_>>(), vec!["untagged"]);
    assert!(body.starts_with("# Daily Report - 2023-01-01\n"));
    assert!(body.ends_with("### Raw Model Output\nI did some things today.\n"));

    // Still recorded: the file was written
    assert!(FingerprintIndex::open(req.output.parent().unwrap())
        .contains(&ContentFingerprint::of_text("did some things")));
}

#[tokio::test]
async fn test_skeleton_lists_sections_in_order() {
    let temp_dir = TempDir::new().unwrap();
    let layout = Layout::new(temp_dir.path());
    let input = write_notes(&layout, "notes");
    let partial = "---\ntitle: Half Day\ntags: [wip]\n---\n## What I Did Today\n- half\n\n## Metrics\n- 1\n";
    let orch = orchestrator(Scripted::content(partial));

    let run = orch.run(&request(&layout, input)).await.unwrap();
    let document = std::fs::read_to_string(written_path(&run.outcome)).unwrap();

    let (skeleton, _) = document.split_once("### Raw Model Output").unwrap();
    let headings: Vec<&str> = skeleton.lines().filter(|l| l.starts_with("## ")).collect();
    assert_eq!(headings, daylog::ReportKind::Daily.required_sections().to_vec());
    // The appendix holds the model text exactly as received
    assert!(document.ends_with(&format!("### Raw Model Output\n{}", partial)));
    // Real title and tags still count as standardized
    assert_eq!(run.exit_code(), 0);
}

#[tokio::test]
async fn test_missing_input_exits_two() {
    let temp_dir = TempDir::new().unwrap();
    let layout = Layout::new(temp_dir.path());
    let orch = orchestrator(Scripted::content(PARSER_FIX_RESPONSE));

    let run = orch
        .run(&request(&layout, layout.scratch_dir().join("absent.md")))
        .await
        .unwrap();

    assert_eq!(run.exit_code(), 2);
    assert_eq!(orch.generator().calls(), 0);
    assert!(!layout.daily_dir().exists());
}

#[tokio::test]
async fn test_reasoning_is_stripped_before_normalizing() {
    let temp_dir = TempDir::new().unwrap();
    let layout = Layout::new(temp_dir.path());
    let input = write_notes(&layout, "notes");
    let response = format!("<think>plan the report</think>{}", PARSER_FIX_RESPONSE);
    let orch = orchestrator(Scripted::content(&response));

    let run = orch.run(&request(&layout, input)).await.unwrap();
    let document = std::fs::read_to_string(written_path(&run.outcome)).unwrap();

    assert_eq!(run.exit_code(), 0);
    assert!(!document.contains("plan the report"));
}

fn write_daily(layout: &Layout, name: &str, metrics: &str) {
    let dir = layout.daily_dir().join("2024/1");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join(name),
        format!("---\ntitle: x\n---\n\n## What I Did Today\n- work\n\n## Metrics\n{}\n", metrics),
    )
    .unwrap();
}

fn weekly_settings() -> WeeklySettings {
    WeeklySettings {
        enforce_schedule: false,
        weekday: None,
        hour_utc: None,
        include_today: false,
        system_prompt: "weekly system".to_string(),
    }
}

#[tokio::test]
async fn test_weekly_rollup_writes_requested_output() {
    let temp_dir = TempDir::new().unwrap();
    let layout = Layout::new(temp_dir.path());
    write_daily(&layout, "2024-01-02-alpha.md", "- commits: 3");
    write_daily(&layout, "2024-01-05-beta.md", "- commits: 5");
    write_daily(&layout, "2023-12-20-old.md", "- commits: 99");

    let weekly_text = "Title: Steady Week\nTags: parser, release\n# Weekly Report - 2024-W01\n\n## Weekly Highlights\n- shipped\n\n## Progress by Area\n- parser\n\n## Problems / Blockers\n- none\n\n## Risks\n- none\n\n## Key Learnings\n- fuzzing\n\n## Next Week Plan\n- release\n\n## Metrics\n- 8 commits\n";
    let orch = orchestrator(Scripted::content(weekly_text));
    let output = layout.weekly_dir().join("2024-W01.md");
    let request = WeeklyRequest {
        output: output.clone(),
        daily_dir: layout.daily_dir(),
        repo_root: temp_dir.path().to_path_buf(),
        now: Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap(),
        force: false,
    };

    let run = orch.run_weekly(&request, &weekly_settings()).await.unwrap();
    assert_eq!(run.exit_code(), 0);
    // Weekly output is never renamed
    assert_eq!(written_path(&run.outcome), output.as_path());

    let document = std::fs::read_to_string(&output).unwrap();
    let (meta, _) = parse_block(&document).unwrap();
    assert_eq!(meta.source_type.as_deref(), Some("weekly"));
    assert_eq!(meta.source_id.as_deref(), Some("2024-W01"));
    assert_eq!(meta.slug.as_deref(), Some("steady-week"));

    let prompts = orch.generator().prompts.lock().unwrap();
    assert_eq!(prompts[0].system, "weekly system");
    assert!(prompts[0].user.contains("**2024-01-02**\n- commits: 3"));
    assert!(prompts[0].user.contains("File: 2024-01-05-beta.md"));
    assert!(!prompts[0].user.contains("2023-12-20-old.md"));
    assert!(index_path(&layout.weekly_dir()).exists());
}

#[tokio::test]
async fn test_weekly_without_dailies_skips() {
    let temp_dir = TempDir::new().unwrap();
    let layout = Layout::new(temp_dir.path());
    let orch = orchestrator(Scripted::content("unused"));
    let request = WeeklyRequest {
        output: layout.weekly_dir().join("2024-W01.md"),
        daily_dir: layout.daily_dir(),
        repo_root: temp_dir.path().to_path_buf(),
        now: Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap(),
        force: false,
    };

    let run = orch.run_weekly(&request, &weekly_settings()).await.unwrap();
    assert_eq!(run.exit_code(), 0);
    assert!(matches!(
        run.outcome,
        Some(ReportOutcome::Skipped { reason: SkipReason::NoInput, .. })
    ));
    assert_eq!(orch.generator().calls(), 0);
}
