use std::path::PathBuf;

use crossbeam_channel::Sender;
use scancal_core::{
    CalibrationImage, CameraId, CameraPair, ProjectDescription, SetId, Validity,
};
use serde::{Deserialize, Serialize};

use crate::validation::TaskKey;

/// Input to the state coordinator.
///
/// Every mutation of calibration state arrives as one of these, so the
/// coordinator thread is the only writer.
#[derive(Debug)]
pub enum StateEvent {
    /// Replace every set with the sets of a newly selected project.
    ProjectSelected(ProjectDescription),
    /// Append sets whose id is not known yet.
    ProjectUpdated(ProjectDescription),
    /// Replace the configured camera pairs.
    PairsChanged(Vec<CameraPair>),
    /// The device link went away; drop pairs and sets.
    Disconnected,
    /// A new image file was written for one camera of a set.
    ImageTransferred { set_id: SetId, camera_id: CameraId },
    /// A validation task finished. `Ok` carries the detection record path.
    ValidationFinished {
        key: TaskKey,
        outcome: Result<PathBuf, String>,
    },
    /// Submit validation for every image still pending.
    Revalidate,
    /// Reply with the current state.
    Snapshot(Sender<StateSnapshot>),
    Shutdown,
}

/// Notification published to subscribers after the state changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateChange {
    /// All sets were dropped (project switch or disconnect).
    CollectionReset,
    /// One image received its validation result.
    ImageValidated {
        set_id: SetId,
        camera_id: CameraId,
        validity: Validity,
    },
    /// A set's pair vector was recomputed.
    SetEvaluated {
        set_id: SetId,
        pairs: Vec<Validity>,
        rollup: Validity,
        working_counts: Vec<u32>,
    },
}

/// A configured pair and how many sets currently support it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairStatus {
    pub pair: CameraPair,
    pub working_count: u32,
}

/// Read-only view of one set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetStatus {
    pub set_id: SetId,
    pub name: String,
    pub images: Vec<CalibrationImage>,
    pub pairs: Vec<Validity>,
    pub rollup: Validity,
    /// Pair indices that can be opened for inspection.
    pub selectable: Vec<usize>,
}

/// Point-in-time copy of the whole calibration state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub pairs: Vec<PairStatus>,
    pub sets: Vec<SetStatus>,
    /// Validation tasks submitted but not yet consumed.
    pub in_flight: usize,
    /// At least one image validation has succeeded.
    pub any_validated: bool,
}

impl StateSnapshot {
    /// Calibration can be configured once an image has been validated.
    pub fn can_configure(&self) -> bool {
        self.any_validated
    }

    pub fn set(&self, set_id: SetId) -> Option<&SetStatus> {
        self.sets.iter().find(|s| s.set_id == set_id)
    }

    /// No validation task is outstanding.
    pub fn is_settled(&self) -> bool {
        self.in_flight == 0
    }
}
