//! Project description, camera pair list and on-disk project layout.
//!
//! ```text
//! <root>/project.scan                              project description
//! <root>/<set>/<image>                             captured image
//! <root>/<set>/calibration/<image stem>.conf       detection record
//! <root>/calibration/<camera name>-calibration.json  intrinsic artifact
//! <root>/calibration/<pair id>.json                stereo artifact
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::io::load_json_file;
use crate::model::{CalibrationImage, CalibrationSet, CameraId, CameraPair, PairId, SetId};
use crate::validity::{ImageProbe, Validity};

/// A camera known to the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraEntry {
    pub id: CameraId,
    pub name: String,
}

/// One image reference inside a set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEntry {
    /// Camera that captured the image.
    pub id: CameraId,
    pub path: String,
}

/// One image set (scan session).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSetEntry {
    pub id: SetId,
    /// Directory name relative to the project root.
    pub path: String,
    #[serde(default)]
    pub images: Vec<ImageEntry>,
}

/// Project metadata as stored in `project.scan`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDescription {
    #[serde(rename = "Cameras", default)]
    pub cameras: Vec<CameraEntry>,
    #[serde(rename = "ImageSets", default)]
    pub image_sets: Vec<ImageSetEntry>,
}

impl ProjectDescription {
    pub fn load(path: &Path) -> Result<Self, ScanError> {
        load_json_file(path)
    }

    pub fn from_json(json: &str) -> Result<Self, ScanError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn camera_name(&self, id: CameraId) -> Option<&str> {
        self.cameras
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.as_str())
    }

    /// Build the calibration set for one entry.
    ///
    /// Images whose file is absent start as `Missing`, the rest as `Pending`.
    /// Pairs are left unevaluated.
    pub fn build_set(entry: &ImageSetEntry, probe: &dyn ImageProbe) -> CalibrationSet {
        let images = entry
            .images
            .iter()
            .map(|img| CalibrationImage {
                camera_id: img.id,
                file_name: img.path.clone(),
                validity: if probe.image_exists(&entry.path, &img.path) {
                    Validity::Pending
                } else {
                    Validity::Missing
                },
            })
            .collect();
        CalibrationSet::new(entry.id, entry.path.clone(), images)
    }
}

/// Parse the device's camera pair list.
///
/// The device answers `Fail...` when it cannot provide the list.
pub fn parse_camera_pairs(payload: &str) -> Result<Vec<CameraPair>, ScanError> {
    let trimmed = payload.trim_start();
    if trimmed.starts_with("Fail") {
        return Err(ScanError::DeviceRefused(trimmed.to_string()));
    }
    Ok(serde_json::from_str(trimmed)?)
}

/// Detection file name for an image: everything before the first `.`
/// followed by `.conf`.
pub fn detection_file_name(image_file: &str) -> String {
    let stem = image_file.split('.').next().unwrap_or(image_file);
    format!("{stem}.conf")
}

/// Paths inside a project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_file(&self) -> PathBuf {
        self.root.join("project.scan")
    }

    pub fn load_project(&self) -> Result<ProjectDescription, ScanError> {
        ProjectDescription::load(&self.project_file())
    }

    pub fn set_dir(&self, set_name: &str) -> PathBuf {
        self.root.join(set_name)
    }

    pub fn image_path(&self, set_name: &str, file_name: &str) -> PathBuf {
        self.set_dir(set_name).join(file_name)
    }

    /// Directory receiving detection records for a set.
    pub fn detection_dir(&self, set_name: &str) -> PathBuf {
        self.set_dir(set_name).join("calibration")
    }

    pub fn detection_path(&self, set_name: &str, image_file: &str) -> PathBuf {
        self.detection_dir(set_name)
            .join(detection_file_name(image_file))
    }

    pub fn calibration_dir(&self) -> PathBuf {
        self.root.join("calibration")
    }

    pub fn intrinsic_artifact_path(&self, camera_name: &str) -> PathBuf {
        self.calibration_dir()
            .join(format!("{camera_name}-calibration.json"))
    }

    pub fn stereo_artifact_path(&self, pair_id: PairId) -> PathBuf {
        self.calibration_dir().join(format!("{pair_id}.json"))
    }
}

impl ImageProbe for ProjectLayout {
    fn image_exists(&self, set_name: &str, file_name: &str) -> bool {
        self.image_path(set_name, file_name).is_file()
    }
}
