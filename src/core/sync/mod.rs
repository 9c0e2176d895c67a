//! Bulk synchronization pipeline
//!
//! Decoder → diff engine → batch writer, driven by the coordinator with the
//! progress tracker settling counters along the way.

pub mod batch;
pub mod coordinator;
pub mod decoder;
pub mod diff;
pub mod progress;
pub mod scheduler;
pub mod summary;

pub use batch::{BatchConfig, BatchCounters, BatchWriter};
pub use coordinator::{SyncCoordinator, SyncSettings};
pub use decoder::{DecodedRecord, MalformedRecord, RecordDecoder};
pub use diff::{Classification, DiffEngine};
pub use progress::ProgressTracker;
pub use scheduler::{Scheduler, SchedulerStats, TickOutcome};
pub use summary::SyncSummary;
