use std::path::PathBuf;

use thiserror::Error;

use crate::model::{CameraId, SetId};

/// Errors raised while reading project metadata, pair lists, detection
/// records and artifacts.
///
/// Malformed input is always reported; loaders never fall back to an empty
/// result.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed JSON payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("device refused request: {0}")]
    DeviceRefused(String),
    #[error("detection record {} declares set index {found}, expected {expected}", path.display())]
    SetIndexMismatch {
        path: PathBuf,
        expected: SetId,
        found: SetId,
    },
    #[error("unknown calibration set {0}")]
    UnknownSet(SetId),
    #[error("set {set_id} has no image for camera {camera_id}")]
    UnknownCamera { set_id: SetId, camera_id: CameraId },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ScanError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    /// True when the error is a missing file rather than unreadable content.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
