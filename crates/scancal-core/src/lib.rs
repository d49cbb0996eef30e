//! Core data model and file formats for scanner rig calibration.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Pt2`, `Pt3`, `Mat3`, ...),
//! - the calibration set model and the pair validity rules ([`validity`]),
//! - project, camera pair and point-detection JSON formats,
//! - the calibration target geometry ([`BoardGeometry`]),
//! - persisted calibration artifacts (intrinsic and stereo),
//! - workspace configuration ([`ScanCalConfig`]) and the [`ScanError`] type.
//!
//! Validity flow:
//! `image validity + file existence → pair validity → set rollup`

/// Calibration target geometry.
pub mod board;
/// Workspace configuration.
pub mod config;
/// Point-detection records.
pub mod detection;
/// Error type shared by the loaders.
pub mod error;
/// JSON file helpers.
pub mod io;
/// Linear algebra type aliases.
pub mod math;
/// Persisted calibration results.
pub mod artifacts;
/// Calibration sets, images and camera pairs.
pub mod model;
/// Project description, pair list and on-disk layout.
pub mod project;
/// Pair validity rules and set rollup.
pub mod validity;

pub use artifacts::{IntrinsicArtifact, StereoArtifact};
pub use board::BoardGeometry;
pub use config::{ScanCalConfig, WorkingCountMode};
pub use detection::{DetectionPoint, DetectionRecord};
pub use error::ScanError;
pub use math::*;
pub use model::{CalibrationImage, CalibrationSet, CameraId, CameraPair, PairId, SetId};
pub use project::{
    CameraEntry, ImageEntry, ImageSetEntry, ProjectDescription, ProjectLayout,
    detection_file_name, parse_camera_pairs,
};
pub use validity::{ImageObservation, ImageProbe, Validity, pair_validity, roll_up};
