//! Query submission, task polling and the view coordinator.

pub mod controller;
pub mod machine;
pub mod poll;
pub mod state;

pub use controller::{ControllerOptions, SearchHandle};
pub use machine::{AppState, Effect, Event, SubmitMode, TASK_FAILED};
pub use poll::{PollHandle, PollSlot};
pub use state::{Message, PhaseKind, QaPair, Role, SearchState, Tab, ViewSnapshot};
