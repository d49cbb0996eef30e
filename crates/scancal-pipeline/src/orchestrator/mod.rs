//! Three-stage calibration run.
//!
//! 1. **Intrinsic**: one pool task per camera. Each task collects the
//!    camera's detections, calls the backend and publishes `{K, D}`.
//! 2. **Stereo**: starts only after every intrinsic task has finished. One
//!    pool task per pair aligns left/right detections by set index and
//!    publishes the stereo artifact.
//! 3. **Propagation**: sequentially pushes each pair's stereo artifact to
//!    the device.
//!
//! A failure is recorded in the [`RunReport`] and never aborts the run.
//! Only one run can be active at a time.

mod plan;

pub use plan::{CalibrationPlan, CameraPlan};

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, anyhow, ensure};
use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::Mutex;
use scancal_core::{BoardGeometry, CameraId, CameraPair, IntrinsicArtifact, PairId};

use crate::align::{DetectionSource, PointAligner};
use crate::artifacts::ArtifactStore;
use crate::collaborators::{CalibrationBackend, DeviceChannel, IntrinsicsInput, StereoInput};
use crate::pool::{TaskHandle, WorkerPool, join_all};
use crate::report::{RunReport, Stage, StageLogEntry, Subject};

/// Result of [`CalibrationOrchestrator::trigger`].
pub enum TriggerOutcome {
    Started(RunHandle),
    /// A run is already active; nothing was submitted.
    AlreadyRunning,
}

impl TriggerOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, TriggerOutcome::Started(_))
    }
}

/// Handle of a started run.
pub struct RunHandle {
    report: Receiver<RunReport>,
    thread: JoinHandle<()>,
}

impl RunHandle {
    /// Block until the run completes.
    ///
    /// When this returns the orchestrator accepts a new trigger.
    pub fn wait(self) -> Result<RunReport> {
        let report = self
            .report
            .recv()
            .map_err(|_| anyhow!("calibration run ended without a report"));
        self.thread
            .join()
            .map_err(|_| anyhow!("calibration run thread panicked"))?;
        report
    }
}

/// Clears the running flag when the run thread finishes.
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drives calibration runs on a dedicated thread.
pub struct CalibrationOrchestrator {
    pool: Arc<WorkerPool>,
    backend: Arc<dyn CalibrationBackend>,
    device: Arc<dyn DeviceChannel>,
    aligner: PointAligner,
    artifacts: Arc<ArtifactStore>,
    running: Arc<AtomicBool>,
    listeners: Arc<Mutex<Vec<Sender<RunReport>>>>,
}

impl CalibrationOrchestrator {
    pub fn new(
        pool: Arc<WorkerPool>,
        backend: Arc<dyn CalibrationBackend>,
        device: Arc<dyn DeviceChannel>,
        board: BoardGeometry,
        artifacts: Arc<ArtifactStore>,
    ) -> Self {
        Self {
            pool,
            backend,
            device,
            aligner: PointAligner::new(board),
            artifacts,
            running: Arc::new(AtomicBool::new(false)),
            listeners: Arc::default(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn artifacts(&self) -> &Arc<ArtifactStore> {
        &self.artifacts
    }

    /// Receive the report of every run completed from now on.
    pub fn subscribe(&self) -> Receiver<RunReport> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.listeners.lock().push(tx);
        rx
    }

    /// Start a run unless one is already active.
    pub fn trigger(&self, plan: CalibrationPlan) -> Result<TriggerOutcome> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::info!("calibration already running, trigger ignored");
            return Ok(TriggerOutcome::AlreadyRunning);
        }
        let guard = RunGuard(Arc::clone(&self.running));

        let run = Run {
            pool: Arc::clone(&self.pool),
            backend: Arc::clone(&self.backend),
            device: Arc::clone(&self.device),
            aligner: self.aligner,
            artifacts: Arc::clone(&self.artifacts),
            plan,
        };
        let listeners = Arc::clone(&self.listeners);
        let (tx, rx) = bounded(1);

        let thread = thread::Builder::new()
            .name("scancal-orchestrator".into())
            .spawn(move || {
                let report = run.execute();
                // Listeners may trigger the next run as soon as they see the report.
                drop(guard);
                listeners
                    .lock()
                    .retain(|listener| listener.send(report.clone()).is_ok());
                let _ = tx.send(report);
            })
            .context("failed to spawn orchestrator thread")?;

        Ok(TriggerOutcome::Started(RunHandle { report: rx, thread }))
    }
}

struct Run {
    pool: Arc<WorkerPool>,
    backend: Arc<dyn CalibrationBackend>,
    device: Arc<dyn DeviceChannel>,
    aligner: PointAligner,
    artifacts: Arc<ArtifactStore>,
    plan: CalibrationPlan,
}

impl Run {
    fn execute(&self) -> RunReport {
        let mut report = RunReport::start();
        self.artifacts.reset();

        self.intrinsic_stage(&mut report);
        self.stereo_stage(&mut report);
        self.propagation_stage(&mut report);

        let report = report.finish();
        log::info!(
            "calibration run finished: {} task(s), {} failure(s)",
            report.submitted_tasks,
            report.failures().count()
        );
        report
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Stage 1: intrinsics
    // ─────────────────────────────────────────────────────────────────────────

    fn intrinsic_stage(&self, report: &mut RunReport) {
        log::info!("intrinsic stage: {} camera(s)", self.plan.cameras.len());
        let mut handles: Vec<(CameraId, TaskHandle<Result<String>>)> = Vec::new();

        for camera in &self.plan.cameras {
            let id = camera.camera_id;
            let camera = camera.clone();
            let aligner = self.aligner;
            let backend = Arc::clone(&self.backend);
            let artifacts = Arc::clone(&self.artifacts);
            let submitted = self.pool.submit(move || {
                let result = calibrate_camera(&aligner, backend.as_ref(), &artifacts, &camera);
                if let Err(err) = &result {
                    artifacts.fail_intrinsics(camera.camera_id, format!("{err:#}"));
                }
                result
            });
            match submitted {
                Ok(handle) => {
                    report.submitted_tasks += 1;
                    handles.push((id, handle));
                }
                Err(err) => {
                    self.artifacts.fail_intrinsics(id, format!("{err:#}"));
                    record_failure(report, Stage::Intrinsic, Subject::Camera(id), &err);
                }
            }
        }

        // Barrier: stage 2 reads what every camera task published.
        for (id, joined) in join_all(handles) {
            let subject = Subject::Camera(id);
            match joined.and_then(|result| result) {
                Ok(notes) => report.record(StageLogEntry::success_with_notes(
                    Stage::Intrinsic,
                    subject,
                    notes,
                )),
                Err(err) => {
                    self.artifacts.fail_intrinsics(id, format!("{err:#}"));
                    record_failure(report, Stage::Intrinsic, subject, &err);
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Stage 2: stereo
    // ─────────────────────────────────────────────────────────────────────────

    fn stereo_stage(&self, report: &mut RunReport) {
        log::info!("stereo stage: {} pair(s)", self.plan.pairs.len());
        let mut handles: Vec<(PairId, TaskHandle<Result<String>>)> = Vec::new();

        for pair in &self.plan.pairs {
            let id = pair.pair_id;
            let (left, right) = match self.pair_intrinsics(pair) {
                Ok(found) => found,
                Err(reason) => {
                    log::warn!("pair {id}: {reason:#}");
                    self.artifacts.fail_stereo(id, format!("{reason:#}"));
                    report.record(StageLogEntry::skipped(
                        Stage::Stereo,
                        Subject::Pair(id),
                        format!("{reason:#}"),
                    ));
                    continue;
                }
            };

            let job = StereoJob {
                pair: *pair,
                left_sources: self.plan.sources(pair.left_id).to_vec(),
                right_sources: self.plan.sources(pair.right_id).to_vec(),
                sample_image: self
                    .plan
                    .camera(pair.left_id)
                    .and_then(|c| c.sample_image.clone()),
                left,
                right,
            };
            let aligner = self.aligner;
            let backend = Arc::clone(&self.backend);
            let artifacts = Arc::clone(&self.artifacts);
            let submitted = self.pool.submit(move || {
                let result = calibrate_pair(&aligner, backend.as_ref(), &artifacts, job);
                if let Err(err) = &result {
                    artifacts.fail_stereo(id, format!("{err:#}"));
                }
                result
            });
            match submitted {
                Ok(handle) => {
                    report.submitted_tasks += 1;
                    handles.push((id, handle));
                }
                Err(err) => {
                    self.artifacts.fail_stereo(id, format!("{err:#}"));
                    record_failure(report, Stage::Stereo, Subject::Pair(id), &err);
                }
            }
        }

        for (id, joined) in join_all(handles) {
            let subject = Subject::Pair(id);
            match joined.and_then(|result| result) {
                Ok(notes) => {
                    report.record(StageLogEntry::success_with_notes(Stage::Stereo, subject, notes))
                }
                Err(err) => {
                    self.artifacts.fail_stereo(id, format!("{err:#}"));
                    record_failure(report, Stage::Stereo, subject, &err);
                }
            }
        }
    }

    fn pair_intrinsics(
        &self,
        pair: &CameraPair,
    ) -> Result<(Arc<IntrinsicArtifact>, Arc<IntrinsicArtifact>)> {
        // Every planned camera's slot was resolved before the barrier.
        let lookup = |camera_id: CameraId| {
            if self.plan.camera(camera_id).is_none() {
                return Err(anyhow!("camera {camera_id} was not calibrated"))
                    .with_context(|| format!("no intrinsics for camera {camera_id}"));
            }
            self.artifacts.wait_intrinsics(camera_id)
        };
        Ok((lookup(pair.left_id)?, lookup(pair.right_id)?))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Stage 3: propagation
    // ─────────────────────────────────────────────────────────────────────────

    fn propagation_stage(&self, report: &mut RunReport) {
        log::info!("propagation stage: {} pair(s)", self.plan.pairs.len());
        for pair in &self.plan.pairs {
            let subject = Subject::Pair(pair.pair_id);
            // Stage 2 resolved a stereo slot for every planned pair.
            let artifact = match self.artifacts.wait_stereo(pair.pair_id) {
                Ok(artifact) => artifact,
                Err(err) => {
                    report.record(StageLogEntry::skipped(
                        Stage::Propagation,
                        subject,
                        format!("no stereo artifact: {err:#}"),
                    ));
                    continue;
                }
            };

            let pushed = artifact
                .to_config_blob()
                .context("failed to encode stereo artifact")
                .and_then(|blob| self.device.push(pair.pair_id, &blob));
            match pushed {
                Ok(()) => report.record(StageLogEntry::success(Stage::Propagation, subject)),
                Err(err) => record_failure(report, Stage::Propagation, subject, &err),
            }
        }
    }
}

struct StereoJob {
    pair: CameraPair,
    left_sources: Vec<DetectionSource>,
    right_sources: Vec<DetectionSource>,
    sample_image: Option<PathBuf>,
    left: Arc<IntrinsicArtifact>,
    right: Arc<IntrinsicArtifact>,
}

fn calibrate_camera(
    aligner: &PointAligner,
    backend: &dyn CalibrationBackend,
    artifacts: &ArtifactStore,
    camera: &CameraPlan,
) -> Result<String> {
    let observations = aligner.collect_camera(&camera.sources);
    ensure!(
        !observations.is_empty(),
        "camera {} has no usable detections",
        camera.name
    );
    let views = observations.len();
    let skipped = observations.skipped.len();
    let input = IntrinsicsInput {
        camera_id: camera.camera_id,
        camera_name: camera.name.clone(),
        sample_image: camera.sample_image.clone(),
        indices: observations.indices,
        object_points: observations.object_points,
        image_points: observations.image_points,
    };
    let artifact = backend
        .calibrate_intrinsics(&input)
        .with_context(|| format!("intrinsic calibration of camera {} failed", camera.name))?;
    artifacts.publish_intrinsics(camera.camera_id, &camera.name, artifact)?;
    log::debug!("camera {}: intrinsics published", camera.name);
    Ok(format!("{views} view(s), {skipped} skipped"))
}

fn calibrate_pair(
    aligner: &PointAligner,
    backend: &dyn CalibrationBackend,
    artifacts: &ArtifactStore,
    job: StereoJob,
) -> Result<String> {
    let pair_id = job.pair.pair_id;
    let aligned = aligner.align_stereo(&job.left_sources, &job.right_sources);
    ensure!(
        !aligned.is_empty(),
        "pair {} has no view seen by both cameras",
        job.pair.label()
    );
    let views = aligned.len();
    let skipped = aligned.skipped.len();
    let input = StereoInput {
        pair: job.pair,
        left_intrinsics: job.left,
        right_intrinsics: job.right,
        sample_image: job.sample_image,
        indices: aligned.indices,
        object_points: aligned.object_points,
        left_points: aligned.left_points,
        right_points: aligned.right_points,
    };
    let artifact = backend
        .calibrate_stereo(&input)
        .with_context(|| format!("stereo calibration of pair {pair_id} failed"))?;
    artifacts.publish_stereo(pair_id, artifact)?;
    log::debug!("pair {pair_id}: stereo artifact published");
    Ok(format!("{views} view(s), {skipped} skipped"))
}

fn record_failure(report: &mut RunReport, stage: Stage, subject: Subject, err: &anyhow::Error) {
    log::warn!("{stage:?} {subject:?} failed: {err:#}");
    report.record(StageLogEntry::failure(stage, subject, format!("{err:#}")));
}
