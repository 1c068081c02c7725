//! State of a single report generation run.
//!
//! A run walks `Start -> HashCheck -> {Skipped | Generating} -> Extracting ->
//! Normalizing -> Writing -> {Done | NeedsReview}`, with `Error` reachable
//! from anywhere.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::fingerprint::ContentFingerprint;

/// Exit status for a run that wrote a document needing human attention
pub const EXIT_NEEDS_REVIEW: u8 = 2;

/// Exit status for a missing input file (shares the review code)
pub const EXIT_INPUT_MISSING: u8 = 2;

/// Exit status for fatal errors
pub const EXIT_FAILURE: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportState {
    Start,
    HashCheck,
    Skipped,
    Generating,
    Extracting,
    Normalizing,
    Writing,
    Done,
    NeedsReview,
    Error,
}

impl ReportState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReportState::Skipped | ReportState::Done | ReportState::NeedsReview | ReportState::Error
        )
    }

    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(&self, next: ReportState) -> bool {
        use ReportState::*;
        if next == Error {
            return !self.is_terminal();
        }
        matches!(
            (*self, next),
            (Start, HashCheck)
                | (Start, Skipped)
                | (HashCheck, Skipped)
                | (HashCheck, Generating)
                | (Generating, Extracting)
                | (Extracting, Normalizing)
                | (Normalizing, Writing)
                | (Writing, Done)
                | (Writing, NeedsReview)
        )
    }
}

/// Why a run was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Fingerprint present in the directory index
    IndexHit,
    /// Fingerprint embedded in the existing output's frontmatter
    EmbeddedHashMatch,
    /// Weekly schedule did not match the current time
    OffSchedule,
    /// Nothing to summarize
    NoInput,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::IndexHit => write!(f, "Hash match in index"),
            SkipReason::EmbeddedHashMatch => write!(f, "Hash match"),
            SkipReason::OffSchedule => write!(f, "Weekly schedule not matched"),
            SkipReason::NoInput => write!(f, "No input found"),
        }
    }
}

/// Final result of a run that did not hit a fatal error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportOutcome {
    Skipped { reason: SkipReason, path: PathBuf },
    Written { path: PathBuf, standardized: bool },
    InputMissing { path: PathBuf },
}

impl ReportOutcome {
    /// Process exit code for this outcome.
    ///
    /// A missing input and a non-standardized document share code 2.
    pub fn exit_code(&self) -> u8 {
        match self {
            ReportOutcome::Skipped { .. } => 0,
            ReportOutcome::Written { standardized: true, .. } => 0,
            ReportOutcome::Written { standardized: false, .. } => EXIT_NEEDS_REVIEW,
            ReportOutcome::InputMissing { .. } => EXIT_INPUT_MISSING,
        }
    }

    pub fn written_path(&self) -> Option<&PathBuf> {
        match self {
            ReportOutcome::Written { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// One pipeline invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRun {
    pub id: Uuid,
    pub state: ReportState,
    /// Every state entered, in order, starting with `Start`
    pub transitions: Vec<ReportState>,
    pub fingerprint: Option<ContentFingerprint>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub outcome: Option<ReportOutcome>,
}

impl Default for ReportRun {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportRun {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: ReportState::Start,
            transitions: vec![ReportState::Start],
            fingerprint: None,
            started_at: Utc::now(),
            completed_at: None,
            outcome: None,
        }
    }

    /// Move to `next`. Illegal transitions are logged and still applied so
    /// the history reflects what actually happened.
    pub fn advance(&mut self, next: ReportState) {
        if !self.state.can_transition_to(next) {
            tracing::warn!(run_id = %self.id, from = ?self.state, to = ?next, "Unexpected state transition");
        }
        tracing::debug!(run_id = %self.id, from = ?self.state, to = ?next, "State transition");
        self.state = next;
        self.transitions.push(next);
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
    }

    /// Enter the terminal state matching `outcome` and record it
    pub fn finish(&mut self, outcome: ReportOutcome) {
        let terminal = match &outcome {
            ReportOutcome::Skipped { .. } => ReportState::Skipped,
            ReportOutcome::Written { standardized: true, .. } => ReportState::Done,
            ReportOutcome::Written { standardized: false, .. } => ReportState::NeedsReview,
            ReportOutcome::InputMissing { .. } => ReportState::Error,
        };
        self.advance(terminal);
        self.outcome = Some(outcome);
    }

    pub fn exit_code(&self) -> u8 {
        self.outcome
            .as_ref()
            .map(ReportOutcome::exit_code)
            .unwrap_or(EXIT_FAILURE)
    }
}
