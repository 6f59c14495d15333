//! Resolve: pick a final element per character
//!
//! Tuples are re-weighed with the active ruleset and, when enabled, extended
//! with rule-derived evidence before the pure resolver runs. Records that end
//! up in review are listed as warnings.

use crate::error::PipelineError;
use crate::fusion::{derive_evidence, resolve_evidence, reweigh};
use crate::types::{DecidedBy, MergedRecord, RecordIssue, ResolvedRecord, ReviewStatus, Stage, StageKind, StageRun};
use crate::utils::map_ordered;
use async_trait::async_trait;
use hanja_common::config::RulesetConfig;
use std::sync::Arc;
use tracing::info;

pub struct ResolveStage {
    workers: usize,
    ruleset: Arc<RulesetConfig>,
}

impl ResolveStage {
    pub fn new(workers: usize, ruleset: RulesetConfig) -> Self {
        Self {
            workers,
            ruleset: Arc::new(ruleset),
        }
    }
}

/// Resolve one merged record under `ruleset`
pub fn resolve_record(mut merged: MergedRecord, ruleset: &RulesetConfig) -> ResolvedRecord {
    reweigh(&mut merged.candidates, &ruleset.weights);
    let derived = derive_evidence(&merged, ruleset);
    merged.candidates.extend(derived);

    let resolution = resolve_evidence(&merged.candidates, ruleset);
    ResolvedRecord { merged, resolution }
}

#[async_trait]
impl Stage for ResolveStage {
    type Input = Vec<MergedRecord>;
    type Output = Vec<ResolvedRecord>;

    fn kind(&self) -> StageKind {
        StageKind::Resolve
    }

    /// `success_count` is the number of automatically resolved records.
    async fn run(&self, input: Vec<MergedRecord>) -> Result<StageRun<Vec<ResolvedRecord>>, PipelineError> {
        let total = input.len();
        let ruleset = Arc::clone(&self.ruleset);
        let resolved = map_ordered(input, self.workers, move |merged| resolve_record(merged, &ruleset)).await?;

        let auto = resolved
            .iter()
            .filter(|r| r.resolution.decided_by == DecidedBy::Auto)
            .count();

        let warnings: Vec<RecordIssue> = resolved
            .iter()
            .filter(|r| r.resolution.review_status == ReviewStatus::NeedsReview)
            .map(|r| {
                RecordIssue::new(format!(
                    "needs review (evidence score {}, provisional element {})",
                    r.resolution.evidence_score,
                    r.resolution
                        .element
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "none".to_string())
                ))
                .character(r.merged.character.clone())
                .field("element")
            })
            .collect();

        info!(
            total,
            auto_resolved = auto,
            needs_review = warnings.len(),
            ruleset = %self.ruleset.version,
            "Resolution complete"
        );

        let mut run = StageRun::new(resolved, total, auto);
        run.warnings = warnings;
        Ok(run)
    }
}
