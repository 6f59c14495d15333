//! Run orchestration
//!
//! # Architecture
//!
//! - [`batch_store`]: stage batch and result files in the work directory
//! - [`checkpoint`]: completed-stage record for `--resume`
//! - [`orchestrator`]: drives the stage chain (full run or single stage)

pub mod batch_store;
pub mod checkpoint;
pub mod orchestrator;

pub use batch_store::BatchStore;
pub use checkpoint::Checkpoint;
pub use orchestrator::{Orchestrator, RunOptions, RunSummary, StageOutcome, StageStatus};
