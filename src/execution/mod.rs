//! Turns trade intents into venue mutations.

pub mod executor;
pub mod lanes;
pub mod orchestrator;
pub mod report;

pub use executor::{CancelSummary, CloseSummary, EntryPlacement, Flatten, MutationExecutor};
pub use lanes::IntentLanes;
pub use orchestrator::Orchestrator;
pub use report::{ExecutionReport, IntentOutcome, Step, StepRecord, StepStatus};
