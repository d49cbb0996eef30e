//! Per-image point-detection records.
//!
//! A detection record lists the pixel coordinates of the chessboard corners
//! found in one image. Records written by the validation step carry the set
//! index they belong to, so alignment never depends on path naming.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::io::load_json_file;
use crate::model::SetId;
use crate::{Pt2, Real};

/// Pixel coordinate of one detected corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionPoint {
    pub x: Real,
    pub y: Real,
}

/// Contents of a detection file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// Set the detection belongs to. Older records omit it.
    #[serde(rename = "setIndex", default, skip_serializing_if = "Option::is_none")]
    pub set_index: Option<SetId>,
    pub points: Vec<DetectionPoint>,
}

impl DetectionRecord {
    pub fn new(set_index: SetId, points: impl IntoIterator<Item = Pt2>) -> Self {
        Self {
            set_index: Some(set_index),
            points: points
                .into_iter()
                .map(|p| DetectionPoint { x: p.x, y: p.y })
                .collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ScanError> {
        load_json_file(path)
    }

    /// Load a record and check that it belongs to `expected` set.
    ///
    /// Records without an embedded index are accepted as-is.
    pub fn load_for_set(path: &Path, expected: SetId) -> Result<Self, ScanError> {
        let record = Self::load(path)?;
        match record.set_index {
            Some(found) if found != expected => Err(ScanError::SetIndexMismatch {
                path: path.to_path_buf(),
                expected,
                found,
            }),
            _ => Ok(record),
        }
    }

    pub fn image_points(&self) -> Vec<Pt2> {
        self.points.iter().map(|p| Pt2::new(p.x, p.y)).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::write_json_file;

    #[test]
    fn parses_legacy_record_without_index() {
        let record: DetectionRecord =
            serde_json::from_str(r#"{"points":[{"x":1.5,"y":2.0},{"x":3.0,"y":4.25}]}"#).unwrap();
        assert_eq!(record.set_index, None);
        assert_eq!(
            record.image_points(),
            vec![Pt2::new(1.5, 2.0), Pt2::new(3.0, 4.25)]
        );
    }

    #[test]
    fn set_index_mismatch_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cam.conf");
        write_json_file(&DetectionRecord::new(3, [Pt2::new(0.0, 0.0)]), &path).unwrap();

        assert!(DetectionRecord::load_for_set(&path, 3).is_ok());
        let err = DetectionRecord::load_for_set(&path, 4).unwrap_err();
        assert!(matches!(
            err,
            ScanError::SetIndexMismatch {
                expected: 4,
                found: 3,
                ..
            }
        ));
    }

    #[test]
    fn malformed_record_is_not_empty_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.conf");
        std::fs::write(&path, r#"{"points":[{"x":1.0}]}"#).unwrap();
        assert!(matches!(
            DetectionRecord::load(&path),
            Err(ScanError::Json { .. })
        ));
    }
}
