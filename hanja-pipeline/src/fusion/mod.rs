//! Evidence fusion for element classification
//!
//! # Architecture
//!
//! - [`evidence`]: weighting, optional derived evidence and fingerprints
//! - [`element_resolver`]: the pure weighted-vote resolver
//!
//! Resolve stage flow per character:
//! ```text
//! candidates ─→ reweigh (active ruleset) ─→ derive (stroke/sound, optional)
//!            ─→ resolve_evidence ─→ Resolution
//! ```

pub mod element_resolver;
pub mod evidence;

pub use element_resolver::resolve_evidence;
pub use evidence::{derive_evidence, evidence_fingerprint, mechanism_weight, reweigh};
