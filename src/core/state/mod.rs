// Run state machine and run history access

pub mod manager;
pub mod run;

pub use manager::RunManager;
pub use run::{RunCounters, RunStats, RunStatus, SyncErrorEntry, SyncRun};
