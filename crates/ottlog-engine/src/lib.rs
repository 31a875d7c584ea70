//! Event generation engine: the per-user state machine, the detail
//! generator with playback pattern expansion, and the pipeline that wires
//! timestamps, users, and sinks together.

pub mod decider;
pub mod detail;
pub mod pipeline;
pub mod playback;

pub use decider::{Decision, EventDecider, EventKind, SideEffect};
pub use detail::{DetailError, DetailGenerator};
pub use pipeline::{Pipeline, RunSummary, SkipReason, StepOutcome};
pub use playback::{PlaybackPlan, WatchPattern};
