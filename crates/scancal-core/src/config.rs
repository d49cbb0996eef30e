use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::board::BoardGeometry;
use crate::error::ScanError;
use crate::io::load_json_file;

/// How the per-pair working count is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkingCountMode {
    /// Number of sets in which the pair is currently `Valid`.
    ///
    /// Recomputed from the current snapshot, so re-evaluating an unchanged
    /// set never changes the count.
    #[default]
    Snapshot,
    /// Tally of every evaluation that produced `Valid`, including repeated
    /// evaluations of an unchanged set. Reset when a project is selected or
    /// the pair list changes.
    Cumulative,
}

/// Configuration for the calibration workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanCalConfig {
    /// Calibration target geometry.
    pub board: BoardGeometry,
    /// Worker pool size shared by validation and calibration tasks.
    pub workers: usize,
    /// Working count semantics.
    pub working_count: WorkingCountMode,
    /// Write intrinsic/stereo artifacts under `<project>/calibration/`.
    pub persist_artifacts: bool,
}

impl Default for ScanCalConfig {
    fn default() -> Self {
        Self {
            board: BoardGeometry::default(),
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            working_count: WorkingCountMode::default(),
            persist_artifacts: true,
        }
    }
}

impl ScanCalConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ScanError> {
        let config: Self = load_json_file(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ScanError> {
        if self.board.width == 0 || self.board.height == 0 {
            return Err(ScanError::InvalidConfig(format!(
                "board must have at least one interior corner, got {}x{}",
                self.board.width, self.board.height
            )));
        }
        if !(self.board.square_size.is_finite() && self.board.square_size > 0.0) {
            return Err(ScanError::InvalidConfig(format!(
                "square size must be positive, got {}",
                self.board.square_size
            )));
        }
        if self.workers == 0 {
            return Err(ScanError::InvalidConfig("workers must be >= 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ScanCalConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.workers >= 1);
        assert_eq!(config.working_count, WorkingCountMode::Snapshot);
    }

    #[test]
    fn partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "workers": 2, "working_count": "cumulative" }"#).unwrap();

        let config = ScanCalConfig::load(&path).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.working_count, WorkingCountMode::Cumulative);
        assert_eq!(config.board, BoardGeometry::default());
    }

    #[test]
    fn rejects_degenerate_board() {
        let mut config = ScanCalConfig::default();
        config.board.square_size = 0.0;
        assert!(matches!(config.validate(), Err(ScanError::InvalidConfig(_))));

        let mut config = ScanCalConfig::default();
        config.workers = 0;
        assert!(config.validate().is_err());
    }
}
