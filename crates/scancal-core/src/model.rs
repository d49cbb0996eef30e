//! Calibration sets, their images and the configured camera pairs.

use serde::{Deserialize, Serialize};

use crate::validity::{ImageObservation, ImageProbe, Validity, pair_validity, roll_up};

pub type CameraId = u32;
pub type SetId = u32;
pub type PairId = u32;

/// A left/right camera combination used for stereo reconstruction.
///
/// Deserializes from the device's pair list format
/// (`{"pairId", "LeftCamera", "RightCamera"}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CameraPair {
    #[serde(rename = "pairId")]
    pub pair_id: PairId,
    #[serde(rename = "LeftCamera")]
    pub left_id: CameraId,
    #[serde(rename = "RightCamera")]
    pub right_id: CameraId,
}

impl CameraPair {
    pub fn new(pair_id: PairId, left_id: CameraId, right_id: CameraId) -> Self {
        Self {
            pair_id,
            left_id,
            right_id,
        }
    }

    pub fn label(&self) -> String {
        format!("{} - {}", self.left_id, self.right_id)
    }
}

/// One camera's image inside a calibration set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationImage {
    pub camera_id: CameraId,
    pub file_name: String,
    pub validity: Validity,
}

/// One captured batch of images across all cameras.
///
/// The pair vector holds one entry per configured camera pair and is only
/// ever written by [`CalibrationSet::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationSet {
    pub set_id: SetId,
    pub name: String,
    pub images: Vec<CalibrationImage>,
    pairs: Vec<Validity>,
}

impl CalibrationSet {
    /// Create a set with no evaluated pairs.
    pub fn new(set_id: SetId, name: impl Into<String>, images: Vec<CalibrationImage>) -> Self {
        Self {
            set_id,
            name: name.into(),
            images,
            pairs: Vec::new(),
        }
    }

    /// Pair validities, in configured pair order.
    pub fn pairs(&self) -> &[Validity] {
        &self.pairs
    }

    pub fn image(&self, camera_id: CameraId) -> Option<&CalibrationImage> {
        self.images.iter().find(|img| img.camera_id == camera_id)
    }

    pub fn image_mut(&mut self, camera_id: CameraId) -> Option<&mut CalibrationImage> {
        self.images.iter_mut().find(|img| img.camera_id == camera_id)
    }

    /// Images waiting for content validation.
    pub fn pending_images(&self) -> impl Iterator<Item = &CalibrationImage> {
        self.images
            .iter()
            .filter(|img| img.validity == Validity::Pending)
    }

    /// Recompute every pair's validity from the current image states.
    ///
    /// The result depends only on image validity and file existence, so
    /// repeated calls without intervening changes produce the same vector.
    pub fn evaluate(&mut self, pairs: &[CameraPair], probe: &dyn ImageProbe) -> &[Validity] {
        let observe = |camera_id: CameraId| {
            self.image(camera_id).map(|img| ImageObservation {
                validity: img.validity,
                file_exists: probe.image_exists(&self.name, &img.file_name),
            })
        };

        let evaluated: Vec<Validity> = pairs
            .iter()
            .map(|pair| pair_validity(observe(pair.left_id), observe(pair.right_id)))
            .collect();
        self.pairs = evaluated;
        &self.pairs
    }

    /// Overall status shown for the set.
    pub fn rollup(&self) -> Validity {
        roll_up(&self.pairs)
    }

    /// Indices of pairs that have both images on disk.
    pub fn selectable_pairs(&self) -> Vec<usize> {
        self.pairs
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_selectable())
            .map(|(idx, _)| idx)
            .collect()
    }
}
