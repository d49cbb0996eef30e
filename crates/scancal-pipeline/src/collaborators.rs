//! Contracts of the external collaborators driven by the pipeline.
//!
//! The numeric solver, the image analyzer and the device link live outside
//! this crate. They are consumed through these traits so that the state
//! machine and the orchestrator can be exercised with fakes.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use scancal_core::{
    CameraId, CameraPair, IntrinsicArtifact, PairId, Pt2, Pt3, SetId, StereoArtifact,
};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Image validation
// ─────────────────────────────────────────────────────────────────────────────

/// One image to validate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRequest {
    pub set_id: SetId,
    pub camera_id: CameraId,
    /// Captured image.
    pub image_path: PathBuf,
    /// Directory that receives the detection record.
    pub output_dir: PathBuf,
    /// Expected location of the detection record inside `output_dir`.
    pub detection_path: PathBuf,
}

/// Content validation of a captured calibration image.
pub trait ImageAnalyzer: Send + Sync {
    /// Detect the calibration target.
    ///
    /// On success a detection record has been written and its path is
    /// returned. On failure nothing is written.
    fn validate(&self, request: &ValidationRequest) -> Result<PathBuf>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Calibration backend
// ─────────────────────────────────────────────────────────────────────────────

/// Observations for one camera's intrinsic calibration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrinsicsInput {
    pub camera_id: CameraId,
    pub camera_name: String,
    /// Image used to determine the sensor size.
    pub sample_image: Option<PathBuf>,
    /// Set index of each view.
    pub indices: Vec<SetId>,
    pub object_points: Vec<Vec<Pt3>>,
    pub image_points: Vec<Vec<Pt2>>,
}

/// Aligned observations for one pair's stereo calibration.
#[derive(Debug, Clone)]
pub struct StereoInput {
    pub pair: CameraPair,
    pub left_intrinsics: Arc<IntrinsicArtifact>,
    pub right_intrinsics: Arc<IntrinsicArtifact>,
    /// Image used to determine the sensor size.
    pub sample_image: Option<PathBuf>,
    /// Set index of each view.
    pub indices: Vec<SetId>,
    pub object_points: Vec<Vec<Pt3>>,
    pub left_points: Vec<Vec<Pt2>>,
    pub right_points: Vec<Vec<Pt2>>,
}

/// Numeric calibration solver.
pub trait CalibrationBackend: Send + Sync {
    /// Estimate the camera matrix and distortion coefficients.
    fn calibrate_intrinsics(&self, input: &IntrinsicsInput) -> Result<IntrinsicArtifact>;

    /// Estimate the relative pose with fixed intrinsics, then rectify.
    fn calibrate_stereo(&self, input: &StereoInput) -> Result<StereoArtifact>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Device configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Link to the scanner that receives pair configurations.
pub trait DeviceChannel: Send + Sync {
    fn push(&self, pair_id: PairId, config: &str) -> Result<()>;
}
