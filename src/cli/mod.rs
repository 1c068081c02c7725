//! Command-line interface for daylog.
//!
//! Provides commands for generating daily and weekly reports, cleaning up
//! scratch notes, deleting reports, and managing the local override store.
//!
//! Machine-readable results go to stdout; logs go to stderr.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};

use crate::adapters::HttpGenerator;
use crate::config::paths::Layout;
use crate::config::{daily_system_prompt, ApiSettings, EnvResolver, WeeklySettings, KNOWN_KEYS};
use crate::core::{
    FingerprintIndex, ReportError, ReportOrchestrator, ReportRequest, ResponseExtractor, WeekWindow,
    WeeklyRequest,
};
use crate::domain::run::{EXIT_FAILURE, EXIT_INPUT_MISSING};
use crate::domain::{ReportOutcome, ReportRun, SkipReason, SourceType};
use crate::library;

/// daylog - turn rough daily notes into structured reports
#[derive(Parser, Debug)]
#[command(name = "daylog")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Workspace root holding scratch/, content/ and .env.secrets
    #[arg(long, global = true, env = "DAYLOG_ROOT", default_value = ".")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a daily report from a notes file
    Daily {
        /// Rough notes file
        #[arg(short, long)]
        input: PathBuf,

        /// Default output path; renamed to <date>-<slug>.md when a slug is found
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long, value_enum, default_value = "manual")]
        source_type: CliSourceType,

        #[arg(long, default_value = "local")]
        source_id: String,

        /// Regenerate even if the notes were already reported
        #[arg(long)]
        force: bool,
    },

    /// Generate the weekly rollup from recent daily reports
    Weekly {
        /// Output path, written as-is
        #[arg(short, long)]
        output: PathBuf,

        /// Regenerate even if the inputs were already reported
        #[arg(long)]
        force: bool,
    },

    /// Create today's scratch note if missing and print its path
    Note {
        /// Note date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Remove scratch notes that already have generated reports
    Cleanup {
        /// Show deletions without removing
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete reports and forget their fingerprints
    Delete {
        /// Report files
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Manage the local override store
    Env {
        #[command(subcommand)]
        command: EnvCommands,
    },

    /// Maintain fingerprint indexes
    Index {
        #[command(subcommand)]
        command: IndexCommands,
    },

    /// Show resolved configuration (debug)
    Config,
}

#[derive(Subcommand, Debug)]
pub enum EnvCommands {
    /// List all configured variables
    List,

    /// Get a variable value
    Get {
        /// Variable name
        key: String,
    },

    /// Set a variable in the override store
    Set {
        /// Variable name (e.g. REPORT_API_KEY)
        key: String,

        /// Value
        value: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum IndexCommands {
    /// Recompute a directory's index from report frontmatter
    Rebuild {
        /// Report directory
        dir: PathBuf,
    },
}

/// Source type accepted on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliSourceType {
    Manual,
    Commit,
    Issue,
}

impl From<CliSourceType> for SourceType {
    fn from(t: CliSourceType) -> Self {
        match t {
            CliSourceType::Manual => SourceType::Manual,
            CliSourceType::Commit => SourceType::Commit,
            CliSourceType::Issue => SourceType::Issue,
        }
    }
}

impl Cli {
    /// Execute the CLI command, returning the process exit code
    pub async fn execute(self) -> Result<u8> {
        let layout = Layout::new(self.root);
        match self.command {
            Commands::Daily {
                input,
                output,
                date,
                source_type,
                source_id,
                force,
            } => {
                let date = date.unwrap_or_else(|| Local::now().date_naive());
                let request = ReportRequest {
                    input,
                    output: output.unwrap_or_else(|| layout.default_daily_output(date)),
                    date,
                    source_type: source_type.into(),
                    source_id,
                    force,
                };
                run_daily(&layout, request).await
            }
            Commands::Weekly { output, force } => {
                run_weekly(&layout, output, force).await
            }
            Commands::Note { date } => {
                let date = date.unwrap_or_else(|| Local::now().date_naive());
                let path = library::ensure_note(&layout.scratch_dir(), date).await?;
                println!("{}", path.display());
                Ok(0)
            }
            Commands::Cleanup { dry_run } => {
                cleanup(&layout, dry_run).await
            }
            Commands::Delete { paths } => {
                for path in &paths {
                    let deleted = library::delete_report(path).await?;
                    println!("Deleted: {}", deleted.path.display());
                }
                Ok(0)
            }
            Commands::Env { command } => {
                execute_env(&layout, command)
            }
            Commands::Index { command } => {
                execute_index(command)
            }
            Commands::Config => {
                show_config(&layout)
            }
        }
    }
}

/// Map a pipeline result to the exit code, reporting fatal errors on stderr
fn finish(result: Result<ReportRun, ReportError>) -> Result<ReportRun, u8> {
    result.map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code()
    })
}

fn orchestrator(env: &EnvResolver, system_prompt: String) -> Result<ReportOrchestrator<HttpGenerator>, ReportError> {
    let settings = ApiSettings::from_resolver(env)?;
    let extractor = ResponseExtractor::new(&settings.response_paths, settings.strip_reasoning);
    let generator = HttpGenerator::new(settings)?;
    Ok(ReportOrchestrator::new(generator, extractor, system_prompt))
}

async fn run_daily(layout: &Layout, request: ReportRequest) -> Result<u8> {
    if !request.input.exists() {
        eprintln!("Input not found: {}", request.input.display());
        return Ok(EXIT_INPUT_MISSING);
    }

    let env = EnvResolver::load(layout.secrets_file());
    let orch = match orchestrator(&env, daily_system_prompt(&env)) {
        Ok(orch) => orch,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(e.exit_code());
        }
    };
    let run = match finish(orch.run(&request).await) {
        Ok(run) => run,
        Err(code) => return Ok(code),
    };

    match &run.outcome {
        Some(ReportOutcome::Skipped { reason, path }) => {
            println!(
                "No changes detected for: {} ({}). Use --force to override.",
                path.display(),
                reason
            );
        }
        Some(ReportOutcome::Written { path, standardized }) => {
            println!("REPORT_PATH={}", path.display());
            println!("Wrote report: {}", path.display());
            if !standardized {
                println!("::warning::Generated report missing standard tags/title. Review recommended.");
            }
        }
        // Missing input is reported before the orchestrator is built
        Some(ReportOutcome::InputMissing { .. }) | None => {}
    }
    Ok(run.exit_code())
}

async fn run_weekly(layout: &Layout, output: PathBuf, force: bool) -> Result<u8> {
    let env = EnvResolver::load(layout.secrets_file());
    let prepared = WeeklySettings::from_resolver(&env)
        .and_then(|settings| Ok((orchestrator(&env, settings.system_prompt.clone())?, settings)));
    let (orch, settings) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(e.exit_code());
        }
    };

    let request = WeeklyRequest {
        output,
        daily_dir: layout.daily_dir(),
        repo_root: layout.root.clone(),
        now: Utc::now(),
        force,
    };
    let run = match finish(orch.run_weekly(&request, &settings).await) {
        Ok(run) => run,
        Err(code) => return Ok(code),
    };

    match &run.outcome {
        Some(ReportOutcome::Skipped { reason: SkipReason::OffSchedule, .. }) => {
            println!("Weekly schedule not matched. Skipping.");
        }
        Some(ReportOutcome::Skipped { reason: SkipReason::NoInput, .. }) => {
            let window = WeekWindow::ending(request.now.date_naive(), settings.include_today);
            println!("No daily reports found for week {}", window.slug);
        }
        Some(ReportOutcome::Skipped { reason, path }) => {
            println!(
                "No changes detected for: {} ({}). Use --force to override.",
                path.display(),
                reason
            );
        }
        Some(ReportOutcome::Written { path, standardized }) => {
            println!("REPORT_PATH={}", path.display());
            println!("Wrote weekly report: {}", path.display());
            if !standardized {
                println!("::warning::Generated report missing standard tags/title. Review recommended.");
            }
        }
        Some(ReportOutcome::InputMissing { .. }) | None => {}
    }
    Ok(run.exit_code())
}

async fn cleanup(layout: &Layout, dry_run: bool) -> Result<u8> {
    let fingerprints = library::collect_report_fingerprints(&layout.daily_dir()).await?;
    if fingerprints.is_empty() {
        println!("No report hashes found; nothing to clean.");
        return Ok(0);
    }

    let matched = library::cleanup(&layout.scratch_dir(), &fingerprints, dry_run).await?;
    let verb = if dry_run { "Would delete" } else { "Deleted" };
    for path in &matched {
        println!("{}: {}", verb, path.display());
    }
    println!("{} {} scratch file(s).", verb, matched.len());
    Ok(0)
}

fn execute_env(layout: &Layout, command: EnvCommands) -> Result<u8> {
    let mut env = EnvResolver::load(layout.secrets_file());
    match command {
        EnvCommands::List => {
            for (key, value) in env.list() {
                println!("{}={}", key, value);
            }
        }
        EnvCommands::Get { key } => {
            println!("{}", env.get(&key).unwrap_or_default());
        }
        EnvCommands::Set { key, value } => {
            env.set(&key, &value)?;
            println!("Saved {} to {}", key, display_store(env.store_path()));
        }
    }
    Ok(0)
}

fn execute_index(command: IndexCommands) -> Result<u8> {
    match command {
        IndexCommands::Rebuild { dir } => {
            let index = FingerprintIndex::rebuild(&dir)
                .with_context(|| format!("Failed to rebuild index in {}", dir.display()))?;
            println!("Indexed {} fingerprint(s) in {}", index.len(), index.path().display());
        }
    }
    Ok(0)
}

fn display_store(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "(no store)".to_string())
}

fn show_config(layout: &Layout) -> Result<u8> {
    let env = EnvResolver::load(layout.secrets_file());

    println!("daylog configuration");
    println!();
    println!("Override store: {}", display_store(env.store_path()));
    println!();
    println!("Paths:");
    println!("  Root:     {}", layout.root.display());
    println!("  Scratch:  {}", layout.scratch_dir().display());
    println!("  Daily:    {}", layout.daily_dir().display());
    println!("  Weekly:   {}", layout.weekly_dir().display());
    println!();
    println!("API:");
    match ApiSettings::from_resolver(&env) {
        Ok(api) => {
            println!("  Endpoint:       {}", api.endpoint);
            println!("  Model:          {}", api.model.as_deref().unwrap_or("(unset)"));
            println!("  Key:            {}", if api.api_key.is_some() { "(set)" } else { "(unset)" });
            println!("  Timeout:        {}s", api.timeout.as_secs());
            println!("  Response paths: {}", api.response_paths.join(", "));
            let extractor = ResponseExtractor::new(&api.response_paths, api.strip_reasoning);
            println!("  Tried in order: {}", extractor.paths().join(", "));
            println!("  Strip thinking: {}", api.strip_reasoning);
        }
        Err(e) => println!("  {}", e),
    }
    println!();
    println!("Weekly schedule:");
    match WeeklySettings::from_resolver(&env) {
        Ok(weekly) => {
            println!("  Enforced:      {}", weekly.enforce_schedule);
            println!(
                "  Day:           {}",
                weekly.weekday.map(|d| d.to_string()).unwrap_or_else(|| "(invalid)".to_string())
            );
            println!(
                "  Hour (UTC):    {}",
                weekly.hour_utc.map(|h| h.to_string()).unwrap_or_else(|| "any".to_string())
            );
            println!("  Include today: {}", weekly.include_today);
        }
        Err(e) => println!("  {}", e),
    }
    println!();
    println!("Known keys:");
    for (key, description) in KNOWN_KEYS {
        println!("  {:<22} {}", key, description);
    }

    Ok(0)
}

/// Exit code for an error that escaped a command
pub fn exit_code_for(error: &anyhow::Error) -> u8 {
    error
        .downcast_ref::<ReportError>()
        .map(ReportError::exit_code)
        .unwrap_or(EXIT_FAILURE)
}
