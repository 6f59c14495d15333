//! Load: persist validated records
//!
//! # Algorithm
//! 1. Select records to load (valid ones, plus invalid ones when
//!    `include_invalid` is set; skipped records become warnings)
//! 2. Sort by character and chunk into fixed-size batches, so each batch
//!    covers a disjoint character range
//! 3. Each batch runs in one transaction (upsert entry, replace readings)
//! 4. A failed batch is rolled back and retried record by record, each in
//!    its own transaction; records that still fail become hard errors
//!
//! Every transaction is wrapped in [`retry_on_lock`]. Statistics are
//! collected before and after.

use crate::db::{dictionary_stats, upsert_entry, DictionaryStats};
use crate::error::PipelineError;
use crate::types::{RecordIssue, Stage, StageKind, StageRun, ValidatedRecord};
use crate::utils::retry_on_lock;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Load stage output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummary {
    pub before: DictionaryStats,
    pub after: DictionaryStats,
    pub loaded: usize,
    pub skipped_invalid: usize,
    pub failed: usize,
    pub batches: usize,
    /// Batches that fell back to per-record transactions
    pub retried_batches: usize,
}

pub struct LoadStage {
    pool: SqlitePool,
    batch_size: usize,
    include_invalid: bool,
    max_lock_wait_ms: u64,
}

impl LoadStage {
    pub fn new(pool: SqlitePool, batch_size: usize, include_invalid: bool, max_lock_wait_ms: u64) -> Self {
        Self {
            pool,
            batch_size: batch_size.max(1),
            include_invalid,
            max_lock_wait_ms,
        }
    }

    async fn load_batch(&self, batch: &[ValidatedRecord]) -> hanja_common::Result<()> {
        let pool = &self.pool;
        retry_on_lock("load batch", self.max_lock_wait_ms, || async move {
            let mut tx = pool.begin().await?;
            for record in batch {
                upsert_entry(&mut tx, record).await?;
            }
            tx.commit().await?;
            Ok(())
        })
        .await
    }

    async fn load_one(&self, record: &ValidatedRecord) -> hanja_common::Result<()> {
        self.load_batch(std::slice::from_ref(record)).await
    }

    async fn stats(&self) -> hanja_common::Result<DictionaryStats> {
        let pool = &self.pool;
        retry_on_lock("dictionary stats", self.max_lock_wait_ms, || dictionary_stats(pool)).await
    }
}

#[async_trait]
impl Stage for LoadStage {
    type Input = Vec<ValidatedRecord>;
    type Output = LoadSummary;

    fn kind(&self) -> StageKind {
        StageKind::Load
    }

    /// `success_count` is the number of records written.
    async fn run(&self, input: Vec<ValidatedRecord>) -> Result<StageRun<LoadSummary>, PipelineError> {
        let total = input.len();
        let before = self.stats().await?;

        let mut warnings = Vec::new();
        let mut to_load = Vec::with_capacity(total);
        for record in input {
            if record.is_valid || self.include_invalid {
                to_load.push(record);
            } else {
                warnings.push(
                    RecordIssue::new("skipped: record failed validation").character(record.character()),
                );
            }
        }
        to_load.sort_by(|a, b| a.character().cmp(b.character()));

        let mut summary = LoadSummary {
            skipped_invalid: warnings.len(),
            ..LoadSummary::default()
        };
        let mut errors = Vec::new();

        for batch in to_load.chunks(self.batch_size) {
            summary.batches += 1;
            match self.load_batch(batch).await {
                Ok(()) => summary.loaded += batch.len(),
                Err(batch_err) => {
                    summary.retried_batches += 1;
                    warn!(
                        first = batch.first().map(|r| r.character()).unwrap_or(""),
                        records = batch.len(),
                        error = %batch_err,
                        "Batch failed, retrying records individually"
                    );
                    for record in batch {
                        match self.load_one(record).await {
                            Ok(()) => summary.loaded += 1,
                            Err(e) => {
                                summary.failed += 1;
                                errors.push(
                                    RecordIssue::new(e.to_string()).character(record.character()),
                                );
                            }
                        }
                    }
                }
            }
        }

        if !to_load.is_empty() && summary.loaded == 0 {
            return Err(PipelineError::NoOutput {
                stage: StageKind::Load,
                reason: format!("none of {} records could be written", to_load.len()),
                issues: errors,
            });
        }

        summary.before = before;
        summary.after = self.stats().await?;

        info!(
            loaded = summary.loaded,
            skipped = summary.skipped_invalid,
            failed = summary.failed,
            batches = summary.batches,
            entries_before = summary.before.total_entries,
            entries_after = summary.after.total_entries,
            "Load complete"
        );

        let loaded = summary.loaded;
        let mut run = StageRun::new(summary, total, loaded);
        run.errors = errors;
        run.warnings = warnings;
        Ok(run)
    }
}
