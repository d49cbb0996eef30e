//! Validity tracking and staged calibration for multi-camera scanner rigs.
//!
//! This crate wires the data model of `scancal-core` to threads:
//!
//! ## State store
//!
//! A single coordinator thread owns every calibration set. Lifecycle
//! notifications and validation results are sent to it as events; it
//! submits validation tasks for pending images and publishes changes.
//!
//! ```no_run
//! use std::sync::Arc;
//! use scancal_core::{ProjectLayout, WorkingCountMode};
//! use scancal_pipeline::{
//!     DetectionFileAnalyzer, StateEvent, StateMachine, StateStore, WorkerPool,
//! };
//! # fn main() -> anyhow::Result<()> {
//! let layout = ProjectLayout::new("/data/scan-project");
//! let pool = Arc::new(WorkerPool::new(4)?);
//! let machine = StateMachine::new(Arc::new(layout.clone()), WorkingCountMode::Snapshot);
//! let store = StateStore::spawn(machine, pool, Arc::new(DetectionFileAnalyzer), layout.clone())?;
//!
//! let changes = store.subscribe();
//! store.send(StateEvent::ProjectSelected(layout.load_project()?))?;
//! # let _ = changes;
//! # Ok(())
//! # }
//! ```
//!
//! ## Calibration run
//!
//! [`CalibrationOrchestrator::trigger`] runs intrinsic, stereo and
//! propagation stages on a dedicated thread, sharing the worker pool.

// Shared infrastructure
pub mod collaborators;
pub mod pool;
pub mod report;

// State tracking
pub mod analyzer;
pub mod state;
pub mod validation;

// Calibration run
pub mod align;
pub mod artifacts;
pub mod orchestrator;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports
// ─────────────────────────────────────────────────────────────────────────────

pub use crate::align::{
    AlignedStereo, CameraObservations, DetectionSource, PointAligner, Side, SkipReason,
    SkippedIndex,
};
pub use crate::analyzer::DetectionFileAnalyzer;
pub use crate::artifacts::ArtifactStore;
pub use crate::collaborators::{
    CalibrationBackend, DeviceChannel, ImageAnalyzer, IntrinsicsInput, StereoInput,
    ValidationRequest,
};
pub use crate::orchestrator::{
    CalibrationOrchestrator, CalibrationPlan, CameraPlan, RunHandle, TriggerOutcome,
};
pub use crate::pool::{TaskHandle, WorkerPool, join_all};
pub use crate::report::{Outcome, RunReport, Stage, StageLogEntry, Subject};
pub use crate::state::{
    PairStatus, SetStatus, StateChange, StateEvent, StateMachine, StateSnapshot, StateStore,
};
pub use crate::validation::{TaskKey, ValidationRunner};
