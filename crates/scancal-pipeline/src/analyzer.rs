//! Image validation backed by point-detection files on disk.

use std::path::PathBuf;

use anyhow::{Context, Result, ensure};
use scancal_core::DetectionRecord;

use crate::collaborators::{ImageAnalyzer, ValidationRequest};

/// Treats an image as valid when its detection record already exists.
///
/// Used for offline inspection of a project whose images were analyzed
/// earlier: the record must parse, belong to the request's set and list at
/// least one point.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectionFileAnalyzer;

impl ImageAnalyzer for DetectionFileAnalyzer {
    fn validate(&self, request: &ValidationRequest) -> Result<PathBuf> {
        let record = DetectionRecord::load_for_set(&request.detection_path, request.set_id)
            .with_context(|| {
                format!(
                    "no usable detection for camera {} in set {}",
                    request.camera_id, request.set_id
                )
            })?;
        ensure!(
            !record.is_empty(),
            "detection record {} lists no points",
            request.detection_path.display()
        );
        Ok(request.detection_path.clone())
    }
}
