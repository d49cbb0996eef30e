//! Planar calibration target geometry.
//!
//! The rig is calibrated against a chessboard with a fixed number of interior
//! corners. Object points are regenerated from this description whenever a
//! view is accepted; they are never cached between runs.

use serde::{Deserialize, Serialize};

use crate::{Pt3, Real};

/// Interior-corner grid of the calibration target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoardGeometry {
    /// Interior corners along a row.
    pub width: usize,
    /// Interior corners along a column.
    pub height: usize,
    /// Physical spacing between corners (millimetres).
    pub square_size: Real,
}

impl Default for BoardGeometry {
    fn default() -> Self {
        Self {
            width: 9,
            height: 6,
            square_size: 24.23,
        }
    }
}

impl BoardGeometry {
    pub fn new(width: usize, height: usize, square_size: Real) -> Self {
        Self {
            width,
            height,
            square_size,
        }
    }

    /// Number of interior corners a complete detection contains.
    pub fn corner_count(&self) -> usize {
        self.width * self.height
    }

    /// Planar object points (Z=0) for one view.
    ///
    /// Points are ordered in row-major order (Y major), matching the order
    /// in which corners are reported by the detector.
    pub fn object_points(&self) -> Vec<Pt3> {
        let mut points = Vec::with_capacity(self.corner_count());
        for row in 0..self.height {
            for col in 0..self.width {
                points.push(Pt3::new(
                    col as Real * self.square_size,
                    row as Real * self.square_size,
                    0.0,
                ));
            }
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_board_matches_scanner_target() {
        let board = BoardGeometry::default();
        assert_eq!(board.corner_count(), 54);
        assert_eq!(board.object_points().len(), 54);
    }

    #[test]
    fn grid_is_row_major_and_planar() {
        let board = BoardGeometry::new(3, 2, 10.0);
        let pts = board.object_points();
        assert_eq!(pts[0], Pt3::new(0.0, 0.0, 0.0));
        assert_eq!(pts[1], Pt3::new(10.0, 0.0, 0.0));
        assert_eq!(pts[2], Pt3::new(20.0, 0.0, 0.0));
        assert_eq!(pts[3], Pt3::new(0.0, 10.0, 0.0));
        assert!(pts.iter().all(|p| p.z == 0.0));
    }
}
