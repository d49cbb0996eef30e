//! Keyed store for artifacts handed from one calibration stage to the next.
//!
//! Intrinsic results are keyed by camera id and stereo results by pair id.
//! Each key has a ready signal: readers can block until the producing task
//! has either published an artifact or recorded a failure. Files under
//! `<project>/calibration/` are written as a side effect when persistence is
//! enabled; later stages never rediscover artifacts through paths.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use parking_lot::{Condvar, Mutex};
use scancal_core::{
    CameraId, IntrinsicArtifact, PairId, ProjectLayout, ScanCalConfig, StereoArtifact,
};

enum SlotState<T> {
    Waiting,
    Ready(Arc<T>),
    Failed(String),
}

struct Slot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Waiting),
            ready: Condvar::new(),
        }
    }

    fn resolve(&self, state: SlotState<T>) {
        *self.state.lock() = state;
        self.ready.notify_all();
    }

    fn peek(&self) -> Option<Result<Arc<T>>> {
        match &*self.state.lock() {
            SlotState::Waiting => None,
            SlotState::Ready(value) => Some(Ok(Arc::clone(value))),
            SlotState::Failed(reason) => Some(Err(anyhow!("{reason}"))),
        }
    }

    fn wait(&self) -> Result<Arc<T>> {
        let mut state = self.state.lock();
        loop {
            match &*state {
                SlotState::Waiting => self.ready.wait(&mut state),
                SlotState::Ready(value) => return Ok(Arc::clone(value)),
                SlotState::Failed(reason) => return Err(anyhow!("{reason}")),
            }
        }
    }
}

struct SlotMap<T> {
    kind: &'static str,
    slots: Mutex<HashMap<u32, Arc<Slot<T>>>>,
}

impl<T> SlotMap<T> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, key: u32) -> Arc<Slot<T>> {
        Arc::clone(
            self.slots
                .lock()
                .entry(key)
                .or_insert_with(|| Arc::new(Slot::new())),
        )
    }

    fn peek(&self, key: u32) -> Option<Result<Arc<T>>> {
        let slot = self.slots.lock().get(&key).cloned()?;
        slot.peek()
    }

    fn wait(&self, key: u32) -> Result<Arc<T>> {
        self.slot(key)
            .wait()
            .with_context(|| format!("{} artifact {key} unavailable", self.kind))
    }

    fn reset(&self) {
        let drained: Vec<_> = self.slots.lock().drain().collect();
        for (_, slot) in drained {
            let waiting = matches!(*slot.state.lock(), SlotState::Waiting);
            if waiting {
                slot.resolve(SlotState::Failed("artifact store was reset".into()));
            }
        }
    }
}

/// Artifacts of the current calibration run.
pub struct ArtifactStore {
    intrinsics: SlotMap<IntrinsicArtifact>,
    stereo: SlotMap<StereoArtifact>,
    persistence: Option<ProjectLayout>,
}

impl ArtifactStore {
    /// In-memory store.
    pub fn new() -> Self {
        Self {
            intrinsics: SlotMap::new("intrinsic"),
            stereo: SlotMap::new("stereo"),
            persistence: None,
        }
    }

    /// Store that also writes every published artifact into the project.
    pub fn persisted(layout: ProjectLayout) -> Self {
        Self {
            persistence: Some(layout),
            ..Self::new()
        }
    }

    /// Persisted or in-memory store, depending on `persist_artifacts`.
    pub fn for_config(config: &ScanCalConfig, layout: ProjectLayout) -> Self {
        if config.persist_artifacts {
            Self::persisted(layout)
        } else {
            Self::new()
        }
    }

    pub fn layout(&self) -> Option<&ProjectLayout> {
        self.persistence.as_ref()
    }

    /// Drop all artifacts; blocked readers are woken with an error.
    pub fn reset(&self) {
        self.intrinsics.reset();
        self.stereo.reset();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Intrinsics (keyed by camera id)
    // ─────────────────────────────────────────────────────────────────────────

    pub fn publish_intrinsics(
        &self,
        camera_id: CameraId,
        camera_name: &str,
        artifact: IntrinsicArtifact,
    ) -> Result<Arc<IntrinsicArtifact>> {
        if let Some(layout) = &self.persistence {
            let path = layout.intrinsic_artifact_path(camera_name);
            if let Err(err) = artifact.save(&path) {
                self.fail_intrinsics(camera_id, err.to_string());
                return Err(err).context("failed to persist intrinsic artifact");
            }
        }
        let artifact = Arc::new(artifact);
        self.intrinsics
            .slot(camera_id)
            .resolve(SlotState::Ready(Arc::clone(&artifact)));
        Ok(artifact)
    }

    pub fn fail_intrinsics(&self, camera_id: CameraId, reason: impl Into<String>) {
        self.intrinsics
            .slot(camera_id)
            .resolve(SlotState::Failed(reason.into()));
    }

    /// Non-blocking lookup; `None` while the camera is still being calibrated.
    pub fn intrinsics(&self, camera_id: CameraId) -> Option<Result<Arc<IntrinsicArtifact>>> {
        self.intrinsics.peek(camera_id)
    }

    /// Block until the camera's intrinsics are published or have failed.
    pub fn wait_intrinsics(&self, camera_id: CameraId) -> Result<Arc<IntrinsicArtifact>> {
        self.intrinsics.wait(camera_id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Stereo (keyed by pair id)
    // ─────────────────────────────────────────────────────────────────────────

    pub fn publish_stereo(
        &self,
        pair_id: PairId,
        artifact: StereoArtifact,
    ) -> Result<Arc<StereoArtifact>> {
        if let Some(layout) = &self.persistence {
            let path = layout.stereo_artifact_path(pair_id);
            if let Err(err) = artifact.save(&path) {
                self.fail_stereo(pair_id, err.to_string());
                return Err(err).context("failed to persist stereo artifact");
            }
        }
        let artifact = Arc::new(artifact);
        self.stereo
            .slot(pair_id)
            .resolve(SlotState::Ready(Arc::clone(&artifact)));
        Ok(artifact)
    }

    pub fn fail_stereo(&self, pair_id: PairId, reason: impl Into<String>) {
        self.stereo
            .slot(pair_id)
            .resolve(SlotState::Failed(reason.into()));
    }

    pub fn stereo(&self, pair_id: PairId) -> Option<Result<Arc<StereoArtifact>>> {
        self.stereo.peek(pair_id)
    }

    pub fn wait_stereo(&self, pair_id: PairId) -> Result<Arc<StereoArtifact>> {
        self.stereo.wait(pair_id)
    }
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}
