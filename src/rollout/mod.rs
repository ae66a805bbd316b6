//! Rollout decision core: durations, control flags, state and the engine.

pub mod duration;
pub mod engine;
pub mod errors;
pub mod flags;
pub mod state;

pub use duration::{parse_duration, parse_schedule};
pub use engine::{decide, ABORTED_BY_OPERATOR, VALIDATION_FAILED};
pub use errors::RolloutError;
pub use flags::ControlFlags;
pub use state::{Action, Decision, RolloutState};
