#![allow(dead_code)]

use std::collections::HashSet;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use scancal_core::{
    CameraEntry, CameraId, DetectionRecord, ImageEntry, ImageSetEntry, IntrinsicArtifact, Mat3,
    Mat34, Mat4, PairId, ProjectDescription, ProjectLayout, Pt2, SetId, StereoArtifact, Vec3,
};
use scancal_pipeline::{CalibrationBackend, DeviceChannel, IntrinsicsInput, StereoInput};
use tempfile::TempDir;

pub const TIMEOUT: Duration = Duration::from_secs(10);

// ─────────────────────────────────────────────────────────────────────────────
// Project fixture
// ─────────────────────────────────────────────────────────────────────────────

pub struct ProjectFixture {
    pub dir: TempDir,
    pub layout: ProjectLayout,
    pub project: ProjectDescription,
}

pub fn set_name(set_id: SetId) -> String {
    format!("scan{set_id}")
}

pub fn image_name(camera_id: CameraId) -> String {
    format!("cam{camera_id}.png")
}

impl ProjectFixture {
    /// Project with the given cameras where every set captured every camera.
    pub fn new(cameras: &[CameraId], sets: &[SetId]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        let project = ProjectDescription {
            cameras: cameras
                .iter()
                .map(|&id| CameraEntry {
                    id,
                    name: format!("camera{id}"),
                })
                .collect(),
            image_sets: sets
                .iter()
                .map(|&id| ImageSetEntry {
                    id,
                    path: set_name(id),
                    images: cameras
                        .iter()
                        .map(|&cam| ImageEntry {
                            id: cam,
                            path: image_name(cam),
                        })
                        .collect(),
                })
                .collect(),
        };
        std::fs::write(
            layout.project_file(),
            serde_json::to_string_pretty(&project).unwrap(),
        )
        .unwrap();
        for &set_id in sets {
            std::fs::create_dir_all(layout.set_dir(&set_name(set_id))).unwrap();
            for &cam in cameras {
                write_image(&layout, set_id, cam);
            }
        }
        Self {
            dir,
            layout,
            project,
        }
    }

    pub fn write_image(&self, set_id: SetId, camera_id: CameraId) {
        write_image(&self.layout, set_id, camera_id);
    }

    pub fn remove_image(&self, set_id: SetId, camera_id: CameraId) {
        std::fs::remove_file(
            self.layout
                .image_path(&set_name(set_id), &image_name(camera_id)),
        )
        .unwrap();
    }

    /// Write a detection record with `points` corners.
    pub fn write_detection(&self, set_id: SetId, camera_id: CameraId, points: usize) {
        let path = self
            .layout
            .detection_path(&set_name(set_id), &image_name(camera_id));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let record = DetectionRecord::new(
            set_id,
            (0..points).map(|i| Pt2::new(i as f64 * 10.0, camera_id as f64)),
        );
        std::fs::write(path, serde_json::to_string(&record).unwrap()).unwrap();
    }
}

fn write_image(layout: &ProjectLayout, set_id: SetId, camera_id: CameraId) {
    std::fs::write(
        layout.image_path(&set_name(set_id), &image_name(camera_id)),
        b"png",
    )
    .unwrap();
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend fakes
// ─────────────────────────────────────────────────────────────────────────────

pub fn intrinsics_for(camera_id: CameraId) -> IntrinsicArtifact {
    let f = 500.0 + camera_id as f64;
    IntrinsicArtifact {
        k: Mat3::new(f, 0.0, 320.0, 0.0, f, 240.0, 0.0, 0.0, 1.0),
        d: vec![0.0; 5],
    }
}

pub fn stereo_from(input: &StereoInput) -> StereoArtifact {
    StereoArtifact {
        k1: input.left_intrinsics.k,
        k2: input.right_intrinsics.k,
        d1: input.left_intrinsics.d.clone(),
        d2: input.right_intrinsics.d.clone(),
        r1: Mat3::identity(),
        r2: Mat3::identity(),
        p1: Mat34::zeros(),
        p2: Mat34::zeros(),
        r: Mat3::identity(),
        t: Vec3::new(-0.1, 0.0, 0.0),
        e: Mat3::zeros(),
        f: Mat3::zeros(),
        q: Mat4::identity(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Intrinsic(CameraId),
    Stereo(PairId),
}

#[derive(Debug, Clone, Copy)]
pub struct Call {
    pub kind: CallKind,
    pub start: Instant,
    pub end: Instant,
    pub views: usize,
}

/// Backend that records when each call started and ended.
#[derive(Default)]
pub struct InstrumentedBackend {
    pub calls: Mutex<Vec<Call>>,
    pub failing_cameras: HashSet<CameraId>,
    pub delay: Duration,
}

impl InstrumentedBackend {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn failing(mut self, camera_id: CameraId) -> Self {
        self.failing_cameras.insert(camera_id);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn record<T>(&self, kind: CallKind, views: usize, body: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        thread::sleep(self.delay);
        let out = body();
        self.calls.lock().push(Call {
            kind,
            start,
            end: Instant::now(),
            views,
        });
        out
    }
}

impl CalibrationBackend for InstrumentedBackend {
    fn calibrate_intrinsics(&self, input: &IntrinsicsInput) -> Result<IntrinsicArtifact> {
        let camera_id = input.camera_id;
        self.record(CallKind::Intrinsic(camera_id), input.image_points.len(), || {
            if self.failing_cameras.contains(&camera_id) {
                bail!("solver did not converge");
            }
            Ok(intrinsics_for(camera_id))
        })
    }

    fn calibrate_stereo(&self, input: &StereoInput) -> Result<StereoArtifact> {
        self.record(CallKind::Stereo(input.pair.pair_id), input.left_points.len(), || {
            Ok(stereo_from(input))
        })
    }
}

/// Backend whose intrinsic calls block until the gate is opened.
pub struct GatedBackend {
    pub gate: Receiver<()>,
}

impl CalibrationBackend for GatedBackend {
    fn calibrate_intrinsics(&self, input: &IntrinsicsInput) -> Result<IntrinsicArtifact> {
        if self.gate.recv_timeout(TIMEOUT).is_err() {
            bail!("gate never opened");
        }
        Ok(intrinsics_for(input.camera_id))
    }

    fn calibrate_stereo(&self, input: &StereoInput) -> Result<StereoArtifact> {
        Ok(stereo_from(input))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Device fake
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingDevice {
    pub pushed: Mutex<Vec<(PairId, String)>>,
    pub refuse: HashSet<PairId>,
}

impl RecordingDevice {
    pub fn pushed(&self) -> Vec<(PairId, String)> {
        self.pushed.lock().clone()
    }
}

impl DeviceChannel for RecordingDevice {
    fn push(&self, pair_id: PairId, config: &str) -> Result<()> {
        if self.refuse.contains(&pair_id) {
            bail!("device rejected configuration for pair {pair_id}");
        }
        self.pushed.lock().push((pair_id, config.to_string()));
        Ok(())
    }
}
