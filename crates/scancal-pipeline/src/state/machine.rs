use std::sync::Arc;

use scancal_core::{
    CalibrationSet, CameraId, CameraPair, ImageProbe, ProjectDescription, ScanError, SetId,
    Validity, WorkingCountMode,
};

use super::events::{PairStatus, SetStatus, StateSnapshot};

/// Calibration sets, camera pairs and working counts.
///
/// Owned by exactly one thread (see [`super::StateStore`]); nothing here is
/// synchronized.
pub struct StateMachine {
    probe: Arc<dyn ImageProbe>,
    mode: WorkingCountMode,
    pairs: Vec<CameraPair>,
    sets: Vec<CalibrationSet>,
    /// Per-pair tally, only maintained in cumulative mode.
    tally: Vec<u32>,
    any_validated: bool,
}

impl StateMachine {
    pub fn new(probe: Arc<dyn ImageProbe>, mode: WorkingCountMode) -> Self {
        Self {
            probe,
            mode,
            pairs: Vec::new(),
            sets: Vec::new(),
            tally: Vec::new(),
            any_validated: false,
        }
    }

    pub fn pairs(&self) -> &[CameraPair] {
        &self.pairs
    }

    pub fn sets(&self) -> &[CalibrationSet] {
        &self.sets
    }

    pub fn set(&self, set_id: SetId) -> Option<&CalibrationSet> {
        self.sets.iter().find(|s| s.set_id == set_id)
    }

    pub fn set_ids(&self) -> Vec<SetId> {
        self.sets.iter().map(|s| s.set_id).collect()
    }

    pub fn any_validated(&self) -> bool {
        self.any_validated
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the pair list and re-evaluate every set.
    pub fn set_pairs(&mut self, pairs: Vec<CameraPair>) {
        self.pairs = pairs;
        self.reset_tally();
        self.evaluate_all();
    }

    /// Drop all sets and load the project's sets from scratch.
    pub fn load_project(&mut self, project: &ProjectDescription) {
        self.sets.clear();
        self.any_validated = false;
        self.reset_tally();
        self.update_project(project);
    }

    /// Add the project's sets whose id is not known yet.
    ///
    /// Returns the ids of the added sets, in project order.
    pub fn update_project(&mut self, project: &ProjectDescription) -> Vec<SetId> {
        let mut added = Vec::new();
        for entry in &project.image_sets {
            if self.set(entry.id).is_some() || added.contains(&entry.id) {
                continue;
            }
            self.sets
                .push(ProjectDescription::build_set(entry, self.probe.as_ref()));
            added.push(entry.id);
        }
        for &set_id in &added {
            // Freshly inserted, cannot be unknown.
            let _ = self.evaluate(set_id);
        }
        added
    }

    /// Forget pairs and sets.
    pub fn clear(&mut self) {
        self.pairs.clear();
        self.sets.clear();
        self.tally.clear();
        self.any_validated = false;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Image updates
    // ─────────────────────────────────────────────────────────────────────────

    /// A new file was written for `camera_id` in `set_id`.
    ///
    /// If the file is on disk the image goes back to `Pending`; the set is
    /// re-evaluated either way.
    pub fn image_transferred(
        &mut self,
        set_id: SetId,
        camera_id: CameraId,
    ) -> Result<(), ScanError> {
        let probe = Arc::clone(&self.probe);
        let set = self.set_mut(set_id)?;
        let name = set.name.clone();
        let image = set
            .image_mut(camera_id)
            .ok_or(ScanError::UnknownCamera { set_id, camera_id })?;
        if probe.image_exists(&name, &image.file_name) {
            image.validity = Validity::Pending;
        }
        self.evaluate(set_id)?;
        Ok(())
    }

    /// Apply a validation result and re-evaluate the set.
    pub fn record_validation(
        &mut self,
        set_id: SetId,
        camera_id: CameraId,
        valid: bool,
    ) -> Result<Validity, ScanError> {
        let validity = if valid {
            Validity::Valid
        } else {
            Validity::Invalid
        };
        let image = self
            .set_mut(set_id)?
            .image_mut(camera_id)
            .ok_or(ScanError::UnknownCamera { set_id, camera_id })?;
        image.validity = validity;
        if valid {
            self.any_validated = true;
        }
        self.evaluate(set_id)?;
        Ok(validity)
    }

    /// Recompute one set's pair vector.
    pub fn evaluate(&mut self, set_id: SetId) -> Result<&[Validity], ScanError> {
        let idx = self.index_of(set_id)?;
        let set = &mut self.sets[idx];
        set.evaluate(&self.pairs, self.probe.as_ref());
        if self.mode == WorkingCountMode::Cumulative {
            for (count, validity) in self.tally.iter_mut().zip(set.pairs()) {
                if *validity == Validity::Valid {
                    *count += 1;
                }
            }
        }
        Ok(self.sets[idx].pairs())
    }

    fn evaluate_all(&mut self) {
        for set_id in self.set_ids() {
            let _ = self.evaluate(set_id);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Per-pair working count, in pair order.
    pub fn working_counts(&self) -> Vec<u32> {
        match self.mode {
            WorkingCountMode::Cumulative => self.tally.clone(),
            WorkingCountMode::Snapshot => (0..self.pairs.len())
                .map(|idx| {
                    let valid = self
                        .sets
                        .iter()
                        .filter(|s| s.pairs().get(idx) == Some(&Validity::Valid))
                        .count();
                    u32::try_from(valid).unwrap_or(u32::MAX)
                })
                .collect(),
        }
    }

    pub fn snapshot(&self, in_flight: usize) -> StateSnapshot {
        let pairs = self
            .pairs
            .iter()
            .zip(self.working_counts())
            .map(|(pair, working_count)| PairStatus {
                pair: *pair,
                working_count,
            })
            .collect();
        let sets = self
            .sets
            .iter()
            .map(|set| SetStatus {
                set_id: set.set_id,
                name: set.name.clone(),
                images: set.images.clone(),
                pairs: set.pairs().to_vec(),
                rollup: set.rollup(),
                selectable: set.selectable_pairs(),
            })
            .collect();
        StateSnapshot {
            pairs,
            sets,
            in_flight,
            any_validated: self.any_validated,
        }
    }

    fn reset_tally(&mut self) {
        self.tally = vec![0; self.pairs.len()];
    }

    fn index_of(&self, set_id: SetId) -> Result<usize, ScanError> {
        self.sets
            .iter()
            .position(|s| s.set_id == set_id)
            .ok_or(ScanError::UnknownSet(set_id))
    }

    fn set_mut(&mut self, set_id: SetId) -> Result<&mut CalibrationSet, ScanError> {
        let idx = self.index_of(set_id)?;
        Ok(&mut self.sets[idx])
    }
}
