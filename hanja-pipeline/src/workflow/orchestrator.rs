//! Pipeline orchestrator
//!
//! # Stage Progression
//! INGEST → NORMALIZE → DEDUP → RESOLVE → VALIDATE → LOAD → REPORT
//!
//! # Architecture
//! Every stage goes through [`Orchestrator::execute`], which decides between
//! reusing the stage's batch from disk (skip / resume) and running it, then
//! persists the batch, the processing result and the checkpoint.
//!
//! On a fatal stage failure the run stops in abort mode. In continue mode the
//! failure is recorded and later stages run on empty input; the failure still
//! shows up in the report and in [`RunSummary::exit_success`].

use crate::error::PipelineError;
use crate::sources::build_sources;
use crate::stages::merge::MergePolicy;
use crate::stages::report::render_markdown;
use crate::stages::{
    IngestStage, LoadStage, LoadSummary, MergeStage, NormalizeStage, PipelineReport, ReportInput,
    ReportStage, ResolveStage, ValidateStage,
};
use crate::types::{ProcessingResult, Stage, StageKind};
use crate::workflow::{BatchStore, Checkpoint};
use chrono::Utc;
use hanja_common::config::{ErrorMode, PipelineConfig};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::{error, info, info_span, warn, Instrument};

/// Options for a full run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub error_mode: ErrorMode,
    /// Stages whose existing batch should be reused instead of recomputed
    pub skip: Vec<StageKind>,
    /// Reuse the leading completed stages recorded in the checkpoint
    pub resume: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Completed,
    Reused,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageOutcome {
    pub stage: StageKind,
    pub status: StageStatus,
    pub result: ProcessingResult,
}

/// What happened during a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub outcomes: Vec<StageOutcome>,
    /// Stage that stopped the run (abort mode)
    pub aborted_at: Option<StageKind>,
    pub report: Option<PipelineReport>,
}

impl RunSummary {
    pub fn failed_stages(&self) -> Vec<StageKind> {
        self.outcomes
            .iter()
            .filter(|o| o.status == StageStatus::Failed)
            .map(|o| o.stage)
            .collect()
    }

    /// True when no stage failed fatally
    pub fn exit_success(&self) -> bool {
        self.aborted_at.is_none() && self.failed_stages().is_empty()
    }

    pub fn outcome(&self, stage: StageKind) -> Option<&StageOutcome> {
        self.outcomes.iter().find(|o| o.stage == stage)
    }
}

/// Mutable state of one run
struct RunContext {
    checkpoint: Checkpoint,
    reuse: HashSet<StageKind>,
    error_mode: ErrorMode,
    outcomes: Vec<StageOutcome>,
    aborted_at: Option<StageKind>,
}

impl RunContext {
    fn into_summary(self, report: Option<PipelineReport>) -> RunSummary {
        RunSummary {
            run_id: self.checkpoint.run_id,
            outcomes: self.outcomes,
            aborted_at: self.aborted_at,
            report,
        }
    }
}

pub struct Orchestrator {
    config: PipelineConfig,
    pool: SqlitePool,
    store: BatchStore,
}

impl Orchestrator {
    /// Create an orchestrator over an open dictionary pool
    ///
    /// The pool's lifecycle stays with the caller.
    pub fn new(config: PipelineConfig, pool: SqlitePool) -> Self {
        let store = BatchStore::new(config.work_dir.clone());
        Self { config, pool, store }
    }

    pub fn store(&self) -> &BatchStore {
        &self.store
    }

    /// Run the full chain
    pub async fn run_all(&self, options: RunOptions) -> Result<RunSummary, PipelineError> {
        self.store.ensure_dir().await?;

        let checkpoint = if options.resume {
            match Checkpoint::load(self.store.dir()).await? {
                Some(checkpoint) => checkpoint,
                None => {
                    warn!("No checkpoint found, starting a fresh run");
                    Checkpoint::new()
                }
            }
        } else {
            Checkpoint::new()
        };

        let mut reuse: HashSet<StageKind> = options.skip.iter().copied().collect();
        if options.resume {
            if let Some(last) = checkpoint.last_completed() {
                info!(last_completed = %last, "Resuming after last completed stage");
                reuse.extend(StageKind::ALL.iter().copied().filter(|s| *s <= last));
            }
        }

        let mut ctx = RunContext {
            checkpoint,
            reuse,
            error_mode: options.error_mode,
            outcomes: Vec::new(),
            aborted_at: None,
        };

        let span = info_span!("pipeline_run", run_id = %ctx.checkpoint.run_id);
        async move {
            info!(error_mode = ?ctx.error_mode, skip = ?options.skip, resume = options.resume, "Starting pipeline run");

            let ingest = self.ingest_stage()?;
            let Some(raw) = self.execute(&mut ctx, &ingest, ()).await? else {
                return Ok(ctx.into_summary(None));
            };
            let Some(normalized) = self.execute(&mut ctx, &self.normalize_stage(), raw).await? else {
                return Ok(ctx.into_summary(None));
            };
            let Some(merged) = self.execute(&mut ctx, &self.merge_stage(), normalized).await? else {
                return Ok(ctx.into_summary(None));
            };
            let Some(resolved) = self.execute(&mut ctx, &self.resolve_stage(), merged).await? else {
                return Ok(ctx.into_summary(None));
            };
            let Some(validated) = self.execute(&mut ctx, &self.validate_stage(), resolved).await? else {
                return Ok(ctx.into_summary(None));
            };
            if self.execute(&mut ctx, &self.load_stage(), validated).await?.is_none() {
                return Ok(ctx.into_summary(None));
            }

            let report_input = self.report_input(Some(ctx.checkpoint.run_id.clone())).await?;
            let report = self.execute(&mut ctx, &ReportStage, report_input).await?;
            if let Some(report) = &report {
                self.write_report(report).await?;
            }

            let summary = ctx.into_summary(report);
            info!(
                success = summary.exit_success(),
                failed_stages = ?summary.failed_stages(),
                "Pipeline run finished"
            );
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    /// Run one stage in isolation from the previous stage's batch file
    pub async fn run_single(&self, stage: StageKind) -> Result<RunSummary, PipelineError> {
        self.store.ensure_dir().await?;
        let checkpoint = Checkpoint::load(self.store.dir()).await?.unwrap_or_default();

        let mut ctx = RunContext {
            checkpoint,
            reuse: HashSet::new(),
            error_mode: ErrorMode::Abort,
            outcomes: Vec::new(),
            aborted_at: None,
        };

        info!(stage = %stage, "Running single stage");

        let mut report = None;
        match stage {
            StageKind::Ingest => {
                let ingest = self.ingest_stage()?;
                self.execute(&mut ctx, &ingest, ()).await?;
            }
            StageKind::Normalize => {
                let input = self.store.read_batch(StageKind::Ingest).await?;
                self.execute(&mut ctx, &self.normalize_stage(), input).await?;
            }
            StageKind::Merge => {
                let input = self.store.read_batch(StageKind::Normalize).await?;
                self.execute(&mut ctx, &self.merge_stage(), input).await?;
            }
            StageKind::Resolve => {
                let input = self.store.read_batch(StageKind::Merge).await?;
                self.execute(&mut ctx, &self.resolve_stage(), input).await?;
            }
            StageKind::Validate => {
                let input = self.store.read_batch(StageKind::Resolve).await?;
                self.execute(&mut ctx, &self.validate_stage(), input).await?;
            }
            StageKind::Load => {
                let input = self.store.read_batch(StageKind::Validate).await?;
                self.execute(&mut ctx, &self.load_stage(), input).await?;
            }
            StageKind::Report => {
                let input = self.report_input(Some(ctx.checkpoint.run_id.clone())).await?;
                report = self.execute(&mut ctx, &ReportStage, input).await?;
                if let Some(report) = &report {
                    self.write_report(report).await?;
                }
            }
        }

        Ok(ctx.into_summary(report))
    }

    // ========================================================================
    // Stage execution
    // ========================================================================

    /// Run (or reuse) one stage and persist everything it produced
    ///
    /// Returns `Ok(None)` when the run must stop (abort mode failure).
    async fn execute<S>(
        &self,
        ctx: &mut RunContext,
        stage: &S,
        input: S::Input,
    ) -> Result<Option<S::Output>, PipelineError>
    where
        S: Stage,
        S::Output: Serialize + DeserializeOwned + Default,
    {
        let kind = stage.kind();

        if ctx.reuse.contains(&kind) {
            if self.store.has_batch(kind) {
                let output: S::Output = self.store.read_batch(kind).await?;
                let mut result = match self.store.read_result(kind).await? {
                    Some(result) => result,
                    None => {
                        let now = Utc::now();
                        ProcessingResult::failed(kind, 0, Vec::new(), now, now)
                    }
                };
                result.success = true;
                result.reused = true;

                info!(stage = %kind, "Reusing existing stage output");
                ctx.checkpoint.mark_completed(kind);
                ctx.checkpoint.save(self.store.dir()).await?;
                ctx.outcomes.push(StageOutcome {
                    stage: kind,
                    status: StageStatus::Reused,
                    result,
                });
                return Ok(Some(output));
            }
            warn!(stage = %kind, "No existing output to reuse, running stage");
        }

        info!(stage = %kind, "Stage starting");
        let start_time = Utc::now();
        let outcome = stage
            .run(input)
            .instrument(info_span!("stage", stage = %kind))
            .await;
        let end_time = Utc::now();

        match outcome {
            Ok(run) => {
                let result = ProcessingResult::completed(kind, &run, start_time, end_time);
                self.store.write_batch(kind, &run.output).await?;
                self.store.write_result(&result).await?;
                ctx.checkpoint.mark_completed(kind);
                ctx.checkpoint.save(self.store.dir()).await?;

                info!(
                    stage = %kind,
                    processed = result.processed_count,
                    succeeded = result.success_count,
                    errors = result.error_count,
                    warnings = result.warnings.len(),
                    elapsed_ms = result.metrics.processing_time_ms,
                    "Stage completed"
                );
                ctx.outcomes.push(StageOutcome {
                    stage: kind,
                    status: StageStatus::Completed,
                    result,
                });
                Ok(Some(run.output))
            }
            Err(err) => {
                error!(stage = %kind, error = %err, "Stage failed");
                let result = ProcessingResult::failed(kind, 0, err.issues(), start_time, end_time);
                self.store.remove_batch(kind).await?;
                self.store.write_result(&result).await?;
                ctx.checkpoint.mark_failed(kind);
                ctx.checkpoint.save(self.store.dir()).await?;
                ctx.outcomes.push(StageOutcome {
                    stage: kind,
                    status: StageStatus::Failed,
                    result,
                });

                match ctx.error_mode {
                    ErrorMode::Abort => {
                        let aborted = PipelineError::Aborted {
                            stage: kind,
                            reason: err.to_string(),
                        };
                        error!("{}", aborted);
                        ctx.aborted_at = Some(kind);

                        // Downstream files from an earlier run no longer match upstream
                        let cleared = self.store.clear_after(kind).await?;
                        if !cleared.is_empty() {
                            let names: Vec<&str> = cleared.iter().map(|s| s.as_str()).collect();
                            warn!(stages = ?names, "Removed stale downstream batches after abort");
                        }
                        ctx.checkpoint.forget_after(kind);
                        ctx.checkpoint.save(self.store.dir()).await?;
                        Ok(None)
                    }
                    ErrorMode::Continue => {
                        warn!(stage = %kind, "Continuing with empty input after stage failure");
                        Ok(Some(S::Output::default()))
                    }
                }
            }
        }
    }

    /// Collect the latest stage results from disk for the report
    async fn report_input(&self, run_id: Option<String>) -> Result<ReportInput, PipelineError> {
        let mut results = Vec::new();
        for stage in StageKind::ALL.iter().copied().filter(|s| *s != StageKind::Report) {
            if let Some(result) = self.store.read_result(stage).await? {
                results.push(result);
            }
        }

        let load = if self.store.has_batch(StageKind::Load) {
            Some(self.store.read_batch::<LoadSummary>(StageKind::Load).await?)
        } else {
            None
        };

        Ok(ReportInput { run_id, results, load })
    }

    async fn write_report(&self, report: &PipelineReport) -> Result<(), PipelineError> {
        self.store.write_document("report.json", report).await?;
        self.store.write_text("report.md", &render_markdown(report)).await?;
        info!(dir = %self.store.dir().display(), "Report written");
        Ok(())
    }

    // ========================================================================
    // Stage construction
    // ========================================================================

    fn ingest_stage(&self) -> Result<IngestStage, PipelineError> {
        let sources = build_sources(&self.config.sources)
            .map_err(|e| hanja_common::Error::Config(format!("{:#}", e)))?;
        Ok(IngestStage::new(sources))
    }

    fn normalize_stage(&self) -> NormalizeStage {
        NormalizeStage::new(self.config.workers)
    }

    fn merge_stage(&self) -> MergeStage {
        MergeStage::new(
            self.config.workers,
            MergePolicy::new(&self.config.sources, self.config.ruleset.weights),
        )
    }

    fn resolve_stage(&self) -> ResolveStage {
        ResolveStage::new(self.config.workers, self.config.ruleset.clone())
    }

    fn validate_stage(&self) -> ValidateStage {
        ValidateStage::new(self.config.workers)
    }

    fn load_stage(&self) -> LoadStage {
        LoadStage::new(
            self.pool.clone(),
            self.config.batch_size,
            self.config.include_invalid,
            self.config.max_lock_wait_ms,
        )
    }
}
