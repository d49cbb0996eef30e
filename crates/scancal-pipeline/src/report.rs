//! Run report emitted once per calibration run.

use scancal_core::{CameraId, PairId};
use serde::{Deserialize, Serialize};

/// Orchestrator stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Intrinsic,
    Stereo,
    Propagation,
}

/// What a stage entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Camera(CameraId),
    Pair(PairId),
}

/// Outcome of one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Succeeded,
    Failed,
    /// Not attempted because an upstream result is missing.
    Skipped,
}

/// Log entry for one camera or pair in one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageLogEntry {
    /// Unix timestamp (seconds since epoch).
    pub timestamp: u64,
    pub stage: Stage,
    pub subject: Subject,
    pub outcome: Outcome,
    /// Optional notes or error message.
    pub notes: Option<String>,
}

impl StageLogEntry {
    pub fn success(stage: Stage, subject: Subject) -> Self {
        Self::new(stage, subject, Outcome::Succeeded, None)
    }

    pub fn success_with_notes(stage: Stage, subject: Subject, notes: impl Into<String>) -> Self {
        Self::new(stage, subject, Outcome::Succeeded, Some(notes.into()))
    }

    pub fn failure(stage: Stage, subject: Subject, error: impl Into<String>) -> Self {
        Self::new(stage, subject, Outcome::Failed, Some(error.into()))
    }

    pub fn skipped(stage: Stage, subject: Subject, reason: impl Into<String>) -> Self {
        Self::new(stage, subject, Outcome::Skipped, Some(reason.into()))
    }

    fn new(stage: Stage, subject: Subject, outcome: Outcome, notes: Option<String>) -> Self {
        Self {
            timestamp: current_timestamp(),
            stage,
            subject,
            outcome,
            notes,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == Outcome::Succeeded
    }
}

/// Summary of a finished calibration run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: u64,
    pub finished_at: u64,
    /// Number of pool tasks submitted by the run.
    pub submitted_tasks: usize,
    pub entries: Vec<StageLogEntry>,
}

impl RunReport {
    pub(crate) fn start() -> Self {
        Self {
            started_at: current_timestamp(),
            ..Self::default()
        }
    }

    pub(crate) fn record(&mut self, entry: StageLogEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = current_timestamp();
        self
    }

    /// Entries of one stage, in recording order.
    pub fn stage(&self, stage: Stage) -> impl Iterator<Item = &StageLogEntry> {
        self.entries.iter().filter(move |e| e.stage == stage)
    }

    pub fn entry(&self, stage: Stage, subject: Subject) -> Option<&StageLogEntry> {
        self.entries
            .iter()
            .find(|e| e.stage == stage && e.subject == subject)
    }

    /// True when every recorded unit of work succeeded.
    pub fn is_success(&self) -> bool {
        self.entries.iter().all(StageLogEntry::succeeded)
    }

    pub fn failures(&self) -> impl Iterator<Item = &StageLogEntry> {
        self.entries.iter().filter(|e| !e.succeeded())
    }
}

fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
