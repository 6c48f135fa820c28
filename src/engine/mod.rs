//! Signal interpretation and position reconciliation

pub mod alert;
pub mod dedup;
pub mod intent;
pub mod ledger;
pub mod mode;
pub mod orchestrator;
pub mod params;

pub use alert::{Alert, ParsedAlert};
pub use dedup::DedupWindow;
pub use ledger::{Ledger, PositionKey, PositionState};
pub use orchestrator::{AlertOutcome, ExecutionSummary, SignalOrchestrator, StopUpdate};
pub use params::ParamRegistry;
