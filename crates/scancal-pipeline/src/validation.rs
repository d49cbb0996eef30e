//! Submission of image validation tasks to the shared worker pool.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crossbeam_channel::Sender;
use scancal_core::{CalibrationSet, CameraId, ProjectLayout, SetId};
use serde::{Deserialize, Serialize};

use crate::collaborators::{ImageAnalyzer, ValidationRequest};
use crate::pool::WorkerPool;
use crate::state::StateEvent;

/// Identity of a submitted validation task.
///
/// The generation changes whenever the set collection is reset, so results
/// of tasks submitted for a previous project are recognized and dropped. The
/// revision changes whenever a new capture replaces the image, so a result
/// computed from the previous file is dropped as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    pub generation: u64,
    pub set_id: SetId,
    pub camera_id: CameraId,
    pub revision: u64,
}

/// Tracks in-flight validation tasks and submits new ones.
///
/// Lives on the coordinator thread. Tasks never touch state: each reports a
/// [`StateEvent::ValidationFinished`] back to the coordinator.
pub struct ValidationRunner {
    pool: Arc<WorkerPool>,
    analyzer: Arc<dyn ImageAnalyzer>,
    layout: ProjectLayout,
    events: Sender<StateEvent>,
    in_flight: HashSet<(SetId, CameraId)>,
    revisions: HashMap<(SetId, CameraId), u64>,
    generation: u64,
}

impl ValidationRunner {
    pub fn new(
        pool: Arc<WorkerPool>,
        analyzer: Arc<dyn ImageAnalyzer>,
        layout: ProjectLayout,
        events: Sender<StateEvent>,
    ) -> Self {
        Self {
            pool,
            analyzer,
            layout,
            events,
            in_flight: HashSet::new(),
            revisions: HashMap::new(),
            generation: 0,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_in_flight(&self, set_id: SetId, camera_id: CameraId) -> bool {
        self.in_flight.contains(&(set_id, camera_id))
    }

    fn revision(&self, set_id: SetId, camera_id: CameraId) -> u64 {
        self.revisions
            .get(&(set_id, camera_id))
            .copied()
            .unwrap_or(0)
    }

    /// A new capture replaced the image: the running task, if any, no longer
    /// counts and its result will be dropped.
    pub fn invalidate(&mut self, set_id: SetId, camera_id: CameraId) {
        *self.revisions.entry((set_id, camera_id)).or_insert(0) += 1;
        if self.in_flight.remove(&(set_id, camera_id)) {
            log::debug!("set {set_id} camera {camera_id}: in-flight validation superseded");
        }
    }

    /// Submit one task per pending image that is not already in flight.
    ///
    /// Returns the number of tasks submitted.
    pub fn submit_pending(&mut self, set: &CalibrationSet) -> usize {
        let mut submitted = 0;
        for image in set.pending_images() {
            let slot = (set.set_id, image.camera_id);
            if self.in_flight.contains(&slot) {
                continue;
            }
            let key = TaskKey {
                generation: self.generation,
                set_id: set.set_id,
                camera_id: image.camera_id,
                revision: self.revision(set.set_id, image.camera_id),
            };
            let request = ValidationRequest {
                set_id: set.set_id,
                camera_id: image.camera_id,
                image_path: self.layout.image_path(&set.name, &image.file_name),
                output_dir: self.layout.detection_dir(&set.name),
                detection_path: self.layout.detection_path(&set.name, &image.file_name),
            };
            let analyzer = Arc::clone(&self.analyzer);
            let events = self.events.clone();
            let result = self.pool.execute(move || {
                let outcome = analyzer
                    .validate(&request)
                    .map_err(|err| format!("{err:#}"));
                // The coordinator may already be gone during shutdown.
                let _ = events.send(StateEvent::ValidationFinished { key, outcome });
            });
            match result {
                Ok(()) => {
                    self.in_flight.insert(slot);
                    submitted += 1;
                }
                Err(err) => log::warn!(
                    "set {}: cannot submit validation for camera {}: {err:#}",
                    set.set_id,
                    image.camera_id
                ),
            }
        }
        if submitted > 0 {
            log::debug!("set {}: submitted {submitted} validation task(s)", set.set_id);
        }
        submitted
    }

    /// Release a finished task.
    ///
    /// Returns false for results that belong to an earlier generation or to
    /// a replaced capture; those must not be applied.
    pub fn complete(&mut self, key: &TaskKey) -> bool {
        if key.generation != self.generation
            || key.revision != self.revision(key.set_id, key.camera_id)
        {
            return false;
        }
        self.in_flight.remove(&(key.set_id, key.camera_id))
    }

    /// Forget every in-flight task; their results will be ignored.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.in_flight.clear();
        self.revisions.clear();
    }
}
