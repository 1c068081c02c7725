//! Report orchestrator.
//!
//! Drives one invocation through the run state machine: fingerprint the
//! input, consult the index, generate, extract, normalize, write, record.
//! Every fatal failure aborts the run; nothing is retried.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{error, info, instrument, warn};

use crate::adapters::Generator;
use crate::config::WeeklySettings;
use crate::domain::prompt::daily_user_prompt;
use crate::domain::{
    ContentFingerprint, PromptPair, ReportKind, ReportOutcome, ReportRun, ReportState, SkipReason,
    SourceType,
};

use super::error::ReportError;
use super::extract::ResponseExtractor;
use super::index::{off_runtime, open_for};
use super::normalize::{normalize, NormalizeContext};
use super::weekly::{
    build_weekly_prompt, collect_daily_reports, git_activity, load_dailies, should_run_now, WeekWindow,
};

/// One daily generation request
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub input: PathBuf,
    /// Default output path; the filename may be replaced by a slug-derived one
    pub output: PathBuf,
    pub date: NaiveDate,
    pub source_type: SourceType,
    pub source_id: String,
    pub force: bool,
}

/// One weekly rollup request
#[derive(Debug, Clone)]
pub struct WeeklyRequest {
    /// Written as-is, never renamed
    pub output: PathBuf,
    pub daily_dir: PathBuf,
    /// Working directory for `git log`
    pub repo_root: PathBuf,
    pub now: DateTime<Utc>,
    pub force: bool,
}

/// Everything the shared tail of a run needs
struct Job<'a> {
    prompts: PromptPair,
    fingerprint: ContentFingerprint,
    context: NormalizeContext,
    default_output: &'a Path,
    force: bool,
}

/// Report pipeline over a pluggable generator
pub struct ReportOrchestrator<G: Generator> {
    generator: G,
    extractor: ResponseExtractor,
    system_prompt: String,
}

impl<G: Generator> ReportOrchestrator<G> {
    pub fn new(generator: G, extractor: ResponseExtractor, system_prompt: impl Into<String>) -> Self {
        Self {
            generator,
            extractor,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Generate the daily report for `request`.
    #[instrument(skip(self, request), fields(input = %request.input.display()))]
    pub async fn run(&self, request: &ReportRequest) -> Result<ReportRun, ReportError> {
        let mut run = ReportRun::new();
        info!(run_id = %run.id, generator = self.generator.name(), "Starting daily report");

        let bytes = match tokio::fs::read(&request.input).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %request.input.display(), "Input not found");
                run.finish(ReportOutcome::InputMissing {
                    path: request.input.clone(),
                });
                return Ok(run);
            }
            Err(e) => {
                run.advance(ReportState::Error);
                return Err(ReportError::io("Failed to read input", &request.input, e));
            }
        };

        let fingerprint = ContentFingerprint::of_bytes(&bytes);
        let raw_notes = String::from_utf8_lossy(&bytes);
        let user = daily_user_prompt(&raw_notes, request.source_type, &request.source_id, request.date);
        let job = Job {
            prompts: PromptPair::new(self.system_prompt.clone(), user),
            context: NormalizeContext::daily(
                request.date,
                request.source_type,
                request.source_id.clone(),
                fingerprint.clone(),
            ),
            fingerprint,
            default_output: &request.output,
            force: request.force,
        };

        self.execute(run, job).await
    }

    /// Generate the weekly rollup. The system prompt comes from `settings`.
    #[instrument(skip(self, request, settings), fields(output = %request.output.display()))]
    pub async fn run_weekly(
        &self,
        request: &WeeklyRequest,
        settings: &WeeklySettings,
    ) -> Result<ReportRun, ReportError> {
        let mut run = ReportRun::new();
        info!(run_id = %run.id, generator = self.generator.name(), "Starting weekly report");

        if !should_run_now(settings, request.now) {
            info!("Weekly schedule not matched");
            run.finish(ReportOutcome::Skipped {
                reason: SkipReason::OffSchedule,
                path: request.output.clone(),
            });
            return Ok(run);
        }

        let window = WeekWindow::ending(request.now.date_naive(), settings.include_today);
        let paths = collect_daily_reports(&request.daily_dir, &window)?;
        if paths.is_empty() {
            info!(week = %window.slug, "No daily reports found");
            run.finish(ReportOutcome::Skipped {
                reason: SkipReason::NoInput,
                path: request.output.clone(),
            });
            return Ok(run);
        }

        let entries = load_dailies(&paths).await?;
        let git_log = git_activity(&request.repo_root, &window).await;
        let user = build_weekly_prompt(&window, &entries, &git_log);
        let fingerprint = ContentFingerprint::of_text(&user);

        let job = Job {
            prompts: PromptPair::new(settings.system_prompt.clone(), user),
            context: NormalizeContext {
                kind: ReportKind::Weekly,
                date: window.start,
                label: window.label(),
                source_type: SourceType::Weekly,
                source_id: window.slug.clone(),
                input_hash: fingerprint.clone(),
                generated_at: Utc::now(),
            },
            fingerprint,
            default_output: &request.output,
            force: request.force,
        };

        self.execute(run, job).await
    }

    async fn execute(&self, mut run: ReportRun, job: Job<'_>) -> Result<ReportRun, ReportError> {
        match self.try_execute(&mut run, job).await {
            Ok(()) => Ok(run),
            Err(e) => {
                error!(run_id = %run.id, from = ?run.state, error = %e, "Report run failed");
                run.advance(ReportState::Error);
                Err(e)
            }
        }
    }

    async fn try_execute(&self, run: &mut ReportRun, job: Job<'_>) -> Result<(), ReportError> {
        run.fingerprint = Some(job.fingerprint.clone());

        run.advance(ReportState::HashCheck);
        if job.force {
            info!("Forced regeneration, skipping hash check");
        }
        let output = job.default_output.to_path_buf();
        let fingerprint = job.fingerprint.clone();
        let force = job.force;
        let (mut index, skip) = off_runtime(move || {
            let mut index = open_for(&output);
            let skip = if force {
                None
            } else {
                index.should_skip(&fingerprint, &output)?
            };
            Ok((index, skip))
        })
        .await?;
        if let Some(reason) = skip {
            info!(%reason, path = %job.default_output.display(), "No changes detected");
            run.finish(ReportOutcome::Skipped {
                reason,
                path: job.default_output.to_path_buf(),
            });
            return Ok(());
        }

        run.advance(ReportState::Generating);
        let response = self.generator.generate(&job.prompts).await?;

        run.advance(ReportState::Extracting);
        let text = self.extractor.extract(&response)?;

        run.advance(ReportState::Normalizing);
        let normalized = normalize(&text, &job.context);
        let path = match job.context.kind {
            ReportKind::Daily => normalized.output_path(job.default_output),
            ReportKind::Weekly => job.default_output.to_path_buf(),
        };

        run.advance(ReportState::Writing);
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| ReportError::io("Failed to create directory", dir, e))?;
        }
        tokio::fs::write(&path, &normalized.document)
            .await
            .map_err(|e| ReportError::io("Failed to write report", &path, e))?;
        let fingerprint = job.fingerprint.clone();
        off_runtime(move || index.record(&fingerprint)).await?;

        if normalized.standardized {
            info!(path = %path.display(), slug = normalized.slug(), "Report written");
        } else {
            warn!(path = %path.display(), skeleton = normalized.skeleton, "Report written but needs review");
        }
        run.finish(ReportOutcome::Written {
            path,
            standardized: normalized.standardized,
        });
        Ok(())
    }
}
