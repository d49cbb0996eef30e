//! Calibration results handed between stages and to the device.
//!
//! Field names follow the device's configuration format (`K`, `D`, `K1`, ...).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::io::{load_json_file, write_json_file};
use crate::{Mat3, Mat34, Mat4, Real, Vec3};

/// Per-camera intrinsic calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntrinsicArtifact {
    /// Camera matrix.
    #[serde(rename = "K")]
    pub k: Mat3,
    /// Distortion coefficients.
    #[serde(rename = "D")]
    pub d: Vec<Real>,
}

/// Joint calibration and rectification of a camera pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StereoArtifact {
    #[serde(rename = "K1")]
    pub k1: Mat3,
    #[serde(rename = "K2")]
    pub k2: Mat3,
    #[serde(rename = "D1")]
    pub d1: Vec<Real>,
    #[serde(rename = "D2")]
    pub d2: Vec<Real>,
    /// Rectification rotation, left camera.
    #[serde(rename = "R1")]
    pub r1: Mat3,
    /// Rectification rotation, right camera.
    #[serde(rename = "R2")]
    pub r2: Mat3,
    /// Rectified projection, left camera.
    #[serde(rename = "P1")]
    pub p1: Mat34,
    /// Rectified projection, right camera.
    #[serde(rename = "P2")]
    pub p2: Mat34,
    /// Rotation from left to right camera.
    #[serde(rename = "R")]
    pub r: Mat3,
    /// Translation from left to right camera.
    #[serde(rename = "T")]
    pub t: Vec3,
    /// Essential matrix.
    #[serde(rename = "E")]
    pub e: Mat3,
    /// Fundamental matrix.
    #[serde(rename = "F")]
    pub f: Mat3,
    /// Disparity-to-depth mapping.
    #[serde(rename = "Q")]
    pub q: Mat4,
}

macro_rules! impl_artifact_io {
    ($ty:ty) => {
        impl $ty {
            pub fn load(path: &Path) -> Result<Self, ScanError> {
                load_json_file(path)
            }

            pub fn save(&self, path: &Path) -> Result<(), ScanError> {
                write_json_file(self, path)
            }
        }
    };
}

impl_artifact_io!(IntrinsicArtifact);
impl_artifact_io!(StereoArtifact);

impl StereoArtifact {
    /// Serialized form pushed to the device as one configuration blob.
    pub fn to_config_blob(&self) -> Result<String, ScanError> {
        Ok(serde_json::to_string(self)?)
    }
}
