//! Calibration state: sets, pair validity and working counts.
//!
//! [`StateMachine`] holds the data and the evaluation rules. [`StateStore`]
//! runs it on a dedicated thread and accepts [`StateEvent`]s, which makes
//! the coordinator the single writer for image validity, pair vectors and
//! working counts. Observers subscribe to [`StateChange`] notifications or
//! request a [`StateSnapshot`].

mod coordinator;
mod events;
mod machine;

pub use coordinator::StateStore;
pub use events::{PairStatus, SetStatus, StateChange, StateEvent, StateSnapshot};
pub use machine::StateMachine;
