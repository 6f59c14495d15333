//! Pipeline stages
//!
//! # Architecture
//!
//! Each stage implements [`crate::types::Stage`]; the orchestrator chains them
//! and persists every output. Stages never read or write batch files
//! themselves.

pub mod ingest;
pub mod load;
pub mod merge;
pub mod normalize;
pub mod report;
pub mod resolve;
pub mod validate;

pub use ingest::IngestStage;
pub use load::{LoadStage, LoadSummary};
pub use merge::MergeStage;
pub use normalize::NormalizeStage;
pub use report::{PipelineReport, ReportInput, ReportStage};
pub use resolve::ResolveStage;
pub use validate::ValidateStage;
