//! Delayed transitions: rules, conditional application, side effects, and
//! the two timers (durable sweep and in-process countdown) that drive them.

pub mod apply;
pub mod countdown;
pub mod draw;
pub mod intents;
pub mod rules;
pub mod sweep;

pub use apply::{Applied, DeleteTrigger, EndTrigger, SharedTransitionApplier, TransitionApplier};
pub use countdown::{CancelOutcome, CountdownEvent, CountdownHandler, CountdownScheduler, StartOutcome};
pub use intents::{ExecutionReport, Intent, IntentExecutor};
pub use sweep::{SweepCoordinator, SweepKind, SweepReport};
