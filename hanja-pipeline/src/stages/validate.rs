//! Validate: annotate every record with rule results

use crate::error::PipelineError;
use crate::types::{RecordIssue, ResolvedRecord, Stage, StageKind, StageRun, ValidatedRecord};
use crate::utils::map_ordered;
use crate::validators::validate_record;
use async_trait::async_trait;
use tracing::info;

pub struct ValidateStage {
    workers: usize,
}

impl ValidateStage {
    pub fn new(workers: usize) -> Self {
        Self { workers }
    }
}

#[async_trait]
impl Stage for ValidateStage {
    type Input = Vec<ResolvedRecord>;
    type Output = Vec<ValidatedRecord>;

    fn kind(&self) -> StageKind {
        StageKind::Validate
    }

    /// `success_count` is the number of valid records.
    async fn run(&self, input: Vec<ResolvedRecord>) -> Result<StageRun<Vec<ValidatedRecord>>, PipelineError> {
        let total = input.len();
        let validated = map_ordered(input, self.workers, validate_record).await?;

        let warnings: Vec<RecordIssue> = validated
            .iter()
            .filter(|r| !r.is_valid)
            .map(|r| {
                let rules: Vec<&str> = r.failed_rules.iter().map(|f| f.rule.as_str()).collect();
                RecordIssue::new(format!("failed rules: {}", rules.join(", ")))
                    .character(r.character())
            })
            .collect();

        let valid = total - warnings.len();
        info!(total, valid, invalid = warnings.len(), "Validation complete");

        let mut run = StageRun::new(validated, total, valid);
        run.warnings = warnings;
        Ok(run)
    }
}
