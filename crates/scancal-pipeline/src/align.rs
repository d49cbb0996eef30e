//! Correspondence-safe assembly of solver inputs from detection records.
//!
//! Left and right detections of the same capture can have gaps, because
//! validation fails independently per camera. Views are therefore matched
//! by their explicit set index, never by position in a list:
//!
//! 1. build `index → source` maps for both sides,
//! 2. scan `1..=max index seen on either side` (numbering may skip values),
//! 3. keep an index only when both sides load, are non-empty and have the
//!    same number of points,
//! 4. emit one freshly generated object grid per kept index.
//!
//! Skipped indices are reported with a reason. Nothing is ever padded or
//! interpolated.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use scancal_core::{BoardGeometry, DetectionRecord, Pt2, Pt3, ScanError, SetId};
use serde::{Deserialize, Serialize};

/// Location of one detection record and the set it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionSource {
    pub set_index: SetId,
    pub path: PathBuf,
}

impl DetectionSource {
    pub fn new(set_index: SetId, path: impl Into<PathBuf>) -> Self {
        Self {
            set_index,
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

/// Why a set index was left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SkipReason {
    /// No detection record on this side.
    Missing(Side),
    /// The record exists but could not be read or parsed.
    Unreadable { side: Side, error: String },
    /// The record lists no points.
    Empty(Side),
    /// Both sides loaded but disagree on the number of points.
    PointCountMismatch { left: usize, right: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Missing(side) => write!(f, "no {side} detection"),
            SkipReason::Unreadable { side, error } => {
                write!(f, "{side} detection unreadable: {error}")
            }
            SkipReason::Empty(side) => write!(f, "{side} detection is empty"),
            SkipReason::PointCountMismatch { left, right } => {
                write!(f, "point count mismatch (left {left}, right {right})")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedIndex {
    pub index: SetId,
    pub reason: SkipReason,
}

/// Equal-length, index-aligned stereo observations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignedStereo {
    /// Set index of each accepted view, ascending.
    pub indices: Vec<SetId>,
    pub left_points: Vec<Vec<Pt2>>,
    pub right_points: Vec<Vec<Pt2>>,
    pub object_points: Vec<Vec<Pt3>>,
    pub skipped: Vec<SkippedIndex>,
}

impl AlignedStereo {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Observations of a single camera, ordered by set index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraObservations {
    pub indices: Vec<SetId>,
    pub image_points: Vec<Vec<Pt2>>,
    pub object_points: Vec<Vec<Pt3>>,
    pub skipped: Vec<SkippedIndex>,
}

impl CameraObservations {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Builds solver inputs for a fixed calibration target.
#[derive(Debug, Clone, Copy)]
pub struct PointAligner {
    board: BoardGeometry,
}

impl PointAligner {
    pub fn new(board: BoardGeometry) -> Self {
        Self { board }
    }

    pub fn board(&self) -> &BoardGeometry {
        &self.board
    }

    /// Match left and right detections by set index.
    pub fn align_stereo(
        &self,
        left: &[DetectionSource],
        right: &[DetectionSource],
    ) -> AlignedStereo {
        let left_map = index_map(left);
        let right_map = index_map(right);
        let upper = upper_bound(&left_map, &right_map);

        let mut out = AlignedStereo::default();
        for index in 1..=upper {
            let left_pts = match self.load_side(left_map.get(&index).copied(), index, Side::Left) {
                Ok(pts) => pts,
                Err(reason) => {
                    out.skip(index, reason);
                    continue;
                }
            };
            let right_pts =
                match self.load_side(right_map.get(&index).copied(), index, Side::Right) {
                    Ok(pts) => pts,
                    Err(reason) => {
                        out.skip(index, reason);
                        continue;
                    }
                };
            if left_pts.len() != right_pts.len() {
                out.skip(
                    index,
                    SkipReason::PointCountMismatch {
                        left: left_pts.len(),
                        right: right_pts.len(),
                    },
                );
                continue;
            }

            out.indices.push(index);
            out.left_points.push(left_pts);
            out.right_points.push(right_pts);
            out.object_points.push(self.board.object_points());
        }

        debug_assert_eq!(out.left_points.len(), out.right_points.len());
        debug_assert_eq!(out.left_points.len(), out.object_points.len());
        out
    }

    /// Collect one camera's detections in ascending set-index order.
    pub fn collect_camera(&self, sources: &[DetectionSource]) -> CameraObservations {
        let map = index_map(sources);
        let upper = map.keys().next_back().copied().unwrap_or(0);

        let mut out = CameraObservations::default();
        for index in 1..=upper {
            // Gaps in the numbering are not views; only report real failures.
            let Some(&source) = map.get(&index) else {
                continue;
            };
            match self.load_side(Some(source), index, Side::Left) {
                Ok(pts) => {
                    out.indices.push(index);
                    out.image_points.push(pts);
                    out.object_points.push(self.board.object_points());
                }
                Err(reason) => {
                    log_skip(index, &reason);
                    out.skipped.push(SkippedIndex { index, reason });
                }
            }
        }
        out
    }

    fn load_side(
        &self,
        source: Option<&DetectionSource>,
        index: SetId,
        side: Side,
    ) -> Result<Vec<Pt2>, SkipReason> {
        let Some(source) = source else {
            return Err(SkipReason::Missing(side));
        };
        let record = match DetectionRecord::load_for_set(&source.path, index) {
            Ok(record) => record,
            Err(err) if err.is_not_found() => return Err(SkipReason::Missing(side)),
            Err(err) => return Err(unreadable(side, err)),
        };
        if record.is_empty() {
            return Err(SkipReason::Empty(side));
        }
        Ok(record.image_points())
    }
}

impl AlignedStereo {
    fn skip(&mut self, index: SetId, reason: SkipReason) {
        log_skip(index, &reason);
        self.skipped.push(SkippedIndex { index, reason });
    }
}

fn log_skip(index: SetId, reason: &SkipReason) {
    match reason {
        SkipReason::Unreadable { .. } => log::warn!("set {index}: {reason}"),
        _ => log::debug!("set {index}: {reason}"),
    }
}

fn unreadable(side: Side, err: ScanError) -> SkipReason {
    SkipReason::Unreadable {
        side,
        error: err.to_string(),
    }
}

/// First source wins when an index appears twice.
fn index_map(sources: &[DetectionSource]) -> BTreeMap<SetId, &DetectionSource> {
    let mut map = BTreeMap::new();
    for source in sources {
        map.entry(source.set_index).or_insert(source);
    }
    map
}

fn upper_bound(
    left: &BTreeMap<SetId, &DetectionSource>,
    right: &BTreeMap<SetId, &DetectionSource>,
) -> SetId {
    let l = left.keys().next_back().copied().unwrap_or(0);
    let r = right.keys().next_back().copied().unwrap_or(0);
    l.max(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scancal_core::io::write_json_file;
    use std::path::Path;

    fn board() -> BoardGeometry {
        BoardGeometry::new(2, 2, 10.0)
    }

    fn write_record(
        dir: &Path,
        name: &str,
        index: SetId,
        n: usize,
        offset: f64,
    ) -> DetectionSource {
        let path = dir.join(name);
        let points = (0..n).map(|i| Pt2::new(offset + i as f64, offset * 2.0 + i as f64));
        write_json_file(&DetectionRecord::new(index, points), &path).unwrap();
        DetectionSource::new(index, path)
    }

    #[test]
    fn keeps_only_indices_present_on_both_sides() {
        let dir = tempfile::tempdir().unwrap();
        let left: Vec<_> = [1, 2, 4]
            .iter()
            .map(|&i| write_record(dir.path(), &format!("l{i}.conf"), i, 4, i as f64))
            .collect();
        let right: Vec<_> = [1, 3, 4]
            .iter()
            .map(|&i| write_record(dir.path(), &format!("r{i}.conf"), i, 4, 100.0 + i as f64))
            .collect();

        let aligned = PointAligner::new(board()).align_stereo(&left, &right);
        assert_eq!(aligned.indices, vec![1, 4]);
        assert_eq!(aligned.left_points.len(), 2);
        assert_eq!(aligned.right_points.len(), 2);
        assert_eq!(aligned.object_points.len(), 2);
        // correspondence: view k on both sides comes from the same index
        assert_eq!(aligned.left_points[1][0], Pt2::new(4.0, 8.0));
        assert_eq!(aligned.right_points[1][0], Pt2::new(104.0, 208.0));
        assert_eq!(
            aligned.skipped,
            vec![
                SkippedIndex {
                    index: 2,
                    reason: SkipReason::Missing(Side::Right)
                },
                SkippedIndex {
                    index: 3,
                    reason: SkipReason::Missing(Side::Left)
                },
            ]
        );
    }

    #[test]
    fn scans_up_to_highest_index_not_map_size() {
        let dir = tempfile::tempdir().unwrap();
        let left = vec![write_record(dir.path(), "l7.conf", 7, 4, 0.0)];
        let right = vec![write_record(dir.path(), "r7.conf", 7, 4, 1.0)];

        let aligned = PointAligner::new(board()).align_stereo(&left, &right);
        assert_eq!(aligned.indices, vec![7]);
    }

    #[test]
    fn shared_index_with_different_counts_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let left = vec![
            write_record(dir.path(), "l1.conf", 1, 4, 0.0),
            write_record(dir.path(), "l2.conf", 2, 4, 0.0),
        ];
        let right = vec![
            write_record(dir.path(), "r1.conf", 1, 4, 0.0),
            write_record(dir.path(), "r2.conf", 2, 3, 0.0),
        ];

        let aligned = PointAligner::new(board()).align_stereo(&left, &right);
        assert_eq!(aligned.indices, vec![1]);
        assert_eq!(
            aligned.skipped,
            vec![SkippedIndex {
                index: 2,
                reason: SkipReason::PointCountMismatch { left: 4, right: 3 }
            }]
        );
    }

    #[test]
    fn unreadable_file_is_reported_not_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("l1.conf");
        std::fs::write(&bad, "not json").unwrap();
        let left = vec![DetectionSource::new(1, &bad)];
        let right = vec![write_record(dir.path(), "r1.conf", 1, 4, 0.0)];

        let aligned = PointAligner::new(board()).align_stereo(&left, &right);
        assert!(aligned.is_empty());
        assert!(matches!(
            aligned.skipped[0].reason,
            SkipReason::Unreadable {
                side: Side::Left,
                ..
            }
        ));
    }

    #[test]
    fn absent_file_counts_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let left = vec![DetectionSource::new(1, dir.path().join("nope.conf"))];
        let right = vec![write_record(dir.path(), "r1.conf", 1, 4, 0.0)];

        let aligned = PointAligner::new(board()).align_stereo(&left, &right);
        assert_eq!(aligned.skipped[0].reason, SkipReason::Missing(Side::Left));
    }

    #[test]
    fn record_for_another_set_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut left = write_record(dir.path(), "l1.conf", 2, 4, 0.0);
        left.set_index = 1;
        let right = vec![write_record(dir.path(), "r1.conf", 1, 4, 0.0)];

        let aligned = PointAligner::new(board()).align_stereo(&[left], &right);
        assert!(aligned.is_empty());
    }

    #[test]
    fn collect_camera_orders_by_index_and_skips_gaps_silently() {
        let dir = tempfile::tempdir().unwrap();
        let sources = vec![
            write_record(dir.path(), "c5.conf", 5, 4, 5.0),
            write_record(dir.path(), "c2.conf", 2, 4, 2.0),
            write_record(dir.path(), "c3.conf", 3, 0, 0.0),
        ];

        let obs = PointAligner::new(board()).collect_camera(&sources);
        assert_eq!(obs.indices, vec![2, 5]);
        assert_eq!(obs.image_points[0][0], Pt2::new(2.0, 4.0));
        assert_eq!(obs.object_points.len(), 2);
        assert_eq!(
            obs.skipped,
            vec![SkippedIndex {
                index: 3,
                reason: SkipReason::Empty(Side::Left)
            }]
        );
    }
}
