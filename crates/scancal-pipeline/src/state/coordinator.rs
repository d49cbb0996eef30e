use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use parking_lot::Mutex;
use scancal_core::{ProjectLayout, SetId};

use super::events::{StateChange, StateEvent, StateSnapshot};
use super::machine::StateMachine;
use crate::collaborators::ImageAnalyzer;
use crate::pool::WorkerPool;
use crate::validation::ValidationRunner;

type Subscribers = Arc<Mutex<Vec<Sender<StateChange>>>>;

/// Handle to the thread that owns all calibration state.
///
/// Events are processed strictly in arrival order. Dropping the store stops
/// the thread.
pub struct StateStore {
    events: Sender<StateEvent>,
    subscribers: Subscribers,
    thread: Option<JoinHandle<()>>,
}

impl StateStore {
    /// Start the coordinator thread.
    pub fn spawn(
        machine: StateMachine,
        pool: Arc<WorkerPool>,
        analyzer: Arc<dyn ImageAnalyzer>,
        layout: ProjectLayout,
    ) -> Result<Self> {
        let (tx, rx) = unbounded();
        let subscribers: Subscribers = Arc::default();
        let coordinator = Coordinator {
            machine,
            runner: ValidationRunner::new(pool, analyzer, layout, tx.clone()),
            subscribers: Arc::clone(&subscribers),
        };
        let thread = thread::Builder::new()
            .name("scancal-state".into())
            .spawn(move || coordinator.run(rx))
            .context("failed to spawn state coordinator")?;

        Ok(Self {
            events: tx,
            subscribers,
            thread: Some(thread),
        })
    }

    pub fn send(&self, event: StateEvent) -> Result<()> {
        self.events
            .send(event)
            .map_err(|_| anyhow!("state coordinator has stopped"))
    }

    /// Sender for producers that outlive a borrow of the store.
    pub fn sender(&self) -> Sender<StateEvent> {
        self.events.clone()
    }

    /// Receive every change published from now on.
    pub fn subscribe(&self) -> Receiver<StateChange> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Current state, after all previously sent events were applied.
    pub fn snapshot(&self) -> Result<StateSnapshot> {
        let (tx, rx) = bounded(1);
        self.send(StateEvent::Snapshot(tx))?;
        rx.recv()
            .map_err(|_| anyhow!("state coordinator has stopped"))
    }
}

impl Drop for StateStore {
    fn drop(&mut self) {
        let _ = self.events.send(StateEvent::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

struct Coordinator {
    machine: StateMachine,
    runner: ValidationRunner,
    subscribers: Subscribers,
}

impl Coordinator {
    fn run(mut self, events: Receiver<StateEvent>) {
        while let Ok(event) = events.recv() {
            if matches!(event, StateEvent::Shutdown) {
                break;
            }
            self.handle(event);
        }
        log::debug!("state coordinator stopped");
    }

    fn handle(&mut self, event: StateEvent) {
        match event {
            StateEvent::ProjectSelected(project) => {
                self.runner.reset();
                self.machine.load_project(&project);
                self.publish(StateChange::CollectionReset);
                log::info!("project selected with {} set(s)", self.machine.sets().len());
                for set_id in self.machine.set_ids() {
                    self.publish_set(set_id);
                    self.submit_pending(set_id);
                }
            }
            StateEvent::ProjectUpdated(project) => {
                let added = self.machine.update_project(&project);
                if !added.is_empty() {
                    log::info!("project update added set(s) {added:?}");
                }
                for set_id in added {
                    self.publish_set(set_id);
                    self.submit_pending(set_id);
                }
            }
            StateEvent::PairsChanged(pairs) => {
                log::info!("camera pair list changed ({} pair(s))", pairs.len());
                self.machine.set_pairs(pairs);
                for set_id in self.machine.set_ids() {
                    self.publish_set(set_id);
                }
            }
            StateEvent::Disconnected => {
                self.runner.reset();
                self.machine.clear();
                self.publish(StateChange::CollectionReset);
            }
            StateEvent::ImageTransferred { set_id, camera_id } => {
                match self.machine.image_transferred(set_id, camera_id) {
                    Ok(()) => {
                        self.runner.invalidate(set_id, camera_id);
                        self.publish_set(set_id);
                        self.submit_pending(set_id);
                    }
                    Err(err) => log::warn!("ignoring image transfer: {err}"),
                }
            }
            StateEvent::ValidationFinished { key, outcome } => {
                if !self.runner.complete(&key) {
                    log::debug!("dropping stale validation result for {key:?}");
                    return;
                }
                if let Err(reason) = &outcome {
                    log::warn!(
                        "set {} camera {}: validation failed: {reason}",
                        key.set_id,
                        key.camera_id
                    );
                }
                match self
                    .machine
                    .record_validation(key.set_id, key.camera_id, outcome.is_ok())
                {
                    Ok(validity) => {
                        self.publish(StateChange::ImageValidated {
                            set_id: key.set_id,
                            camera_id: key.camera_id,
                            validity,
                        });
                        self.publish_set(key.set_id);
                    }
                    Err(err) => log::warn!("ignoring validation result: {err}"),
                }
            }
            StateEvent::Revalidate => {
                for set_id in self.machine.set_ids() {
                    self.submit_pending(set_id);
                }
            }
            StateEvent::Snapshot(reply) => {
                let _ = reply.send(self.machine.snapshot(self.runner.in_flight()));
            }
            StateEvent::Shutdown => {}
        }
    }

    fn submit_pending(&mut self, set_id: SetId) {
        if let Some(set) = self.machine.set(set_id) {
            self.runner.submit_pending(set);
        }
    }

    fn publish_set(&self, set_id: SetId) {
        let Some(set) = self.machine.set(set_id) else {
            return;
        };
        self.publish(StateChange::SetEvaluated {
            set_id,
            pairs: set.pairs().to_vec(),
            rollup: set.rollup(),
            working_counts: self.machine.working_counts(),
        });
    }

    fn publish(&self, change: StateChange) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(change.clone()).is_ok());
    }
}
