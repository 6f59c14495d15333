//! Report: funnel, quality indicators and performance for one run
//!
//! Reads only stage results; never touches the dictionary.

use crate::db::DictionaryStats;
use crate::error::PipelineError;
use crate::stages::LoadSummary;
use crate::types::{ProcessingResult, Stage, StageKind, StageRun};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tracing::info;

/// Everything the report is computed from
#[derive(Debug, Clone, Default)]
pub struct ReportInput {
    pub run_id: Option<String>,
    /// Latest result of each stage that has run (any order)
    pub results: Vec<ProcessingResult>,
    pub load: Option<LoadSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Funnel {
    pub ingested: usize,
    pub normalized: usize,
    pub merged: usize,
    pub resolved: usize,
    pub valid: usize,
    pub loaded: usize,
}

/// Ratios in [0, 1]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityIndicators {
    /// loaded / ingested
    pub completeness: f64,
    /// 1 - record errors / ingested
    pub accuracy: f64,
    /// valid / ingested
    pub validity: f64,
    /// auto-resolved / merged
    pub consistency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagePerformance {
    pub stage: StageKind,
    pub success: bool,
    pub reused: bool,
    pub processing_time_ms: u64,
    pub throughput_per_second: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    pub stages: Vec<StagePerformance>,
    pub total_time_ms: u64,
    /// ingested / total seconds
    pub overall_throughput: f64,
    pub slowest_stage: Option<StageKind>,
    pub recommendation: Option<String>,
}

/// Report stage output (`report.json`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    pub generated_at: DateTime<Utc>,
    pub run_id: Option<String>,
    pub funnel: Funnel,
    pub quality: QualityIndicators,
    pub performance: Performance,
    pub failed_stages: Vec<StageKind>,
    pub total_errors: usize,
    pub total_warnings: usize,
    pub dictionary: Option<DictionaryStats>,
}

pub struct ReportStage;

#[async_trait]
impl Stage for ReportStage {
    type Input = ReportInput;
    type Output = PipelineReport;

    fn kind(&self) -> StageKind {
        StageKind::Report
    }

    async fn run(&self, input: ReportInput) -> Result<StageRun<PipelineReport>, PipelineError> {
        let report = build_report(&input);

        info!(
            ingested = report.funnel.ingested,
            loaded = report.funnel.loaded,
            completeness = report.quality.completeness,
            accuracy = report.quality.accuracy,
            validity = report.quality.validity,
            consistency = report.quality.consistency,
            failed_stages = report.failed_stages.len(),
            "Pipeline report"
        );
        if let Some(recommendation) = &report.performance.recommendation {
            info!("Recommendation: {}", recommendation);
        }

        let processed = input.results.len();
        Ok(StageRun::new(report, processed, processed))
    }
}

/// Compute the report from stage results
pub fn build_report(input: &ReportInput) -> PipelineReport {
    let mut results: Vec<&ProcessingResult> = input
        .results
        .iter()
        .filter(|r| r.stage != StageKind::Report)
        .collect();
    results.sort_by_key(|r| r.stage);

    let find = |stage: StageKind| results.iter().find(|r| r.stage == stage && r.success);
    let success_of = |stage: StageKind| find(stage).map(|r| r.success_count).unwrap_or(0);

    let funnel = Funnel {
        ingested: success_of(StageKind::Ingest),
        normalized: success_of(StageKind::Normalize),
        merged: success_of(StageKind::Merge),
        resolved: find(StageKind::Resolve).map(|r| r.processed_count).unwrap_or(0),
        valid: success_of(StageKind::Validate),
        loaded: success_of(StageKind::Load),
    };
    let auto_resolved = success_of(StageKind::Resolve);

    let total_errors: usize = results.iter().map(|r| r.error_count).sum();
    let total_warnings: usize = results.iter().map(|r| r.warnings.len()).sum();

    let quality = QualityIndicators {
        completeness: ratio(funnel.loaded, funnel.ingested),
        accuracy: if funnel.ingested == 0 {
            0.0
        } else {
            (1.0 - total_errors as f64 / funnel.ingested as f64).clamp(0.0, 1.0)
        },
        validity: ratio(funnel.valid, funnel.ingested),
        consistency: ratio(auto_resolved, funnel.merged),
    };

    let stages: Vec<StagePerformance> = results
        .iter()
        .map(|r| StagePerformance {
            stage: r.stage,
            success: r.success,
            reused: r.reused,
            processing_time_ms: r.metrics.processing_time_ms,
            throughput_per_second: r.metrics.throughput_per_second,
        })
        .collect();
    let total_time_ms: u64 = stages.iter().map(|s| s.processing_time_ms).sum();
    let overall_throughput = if total_time_ms == 0 {
        0.0
    } else {
        funnel.ingested as f64 / (total_time_ms as f64 / 1000.0)
    };
    let slowest_stage = stages
        .iter()
        .filter(|s| s.processing_time_ms > 0)
        .max_by_key(|s| s.processing_time_ms)
        .map(|s| s.stage);

    let failed_stages = results.iter().filter(|r| !r.success).map(|r| r.stage).collect();

    PipelineReport {
        generated_at: Utc::now(),
        run_id: input.run_id.clone(),
        funnel,
        quality,
        performance: Performance {
            stages,
            total_time_ms,
            overall_throughput,
            slowest_stage,
            recommendation: slowest_stage.and_then(recommendation_for),
        },
        failed_stages,
        total_errors,
        total_warnings,
        dictionary: input.load.as_ref().map(|l| l.after.clone()),
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    (numerator as f64 / denominator as f64).clamp(0.0, 1.0)
}

fn recommendation_for(stage: StageKind) -> Option<String> {
    let text = match stage {
        StageKind::Ingest => {
            "Ingest is the bottleneck: mirror remote sources to local json_file sources or raise their timeouts"
        }
        StageKind::Normalize | StageKind::Merge | StageKind::Resolve | StageKind::Validate => {
            "Record processing is the bottleneck: raise `workers` to use more cores"
        }
        StageKind::Load => {
            "Load is the bottleneck: raise `batch_size` to commit fewer, larger transactions"
        }
        StageKind::Report => return None,
    };
    Some(text.to_string())
}

/// Human-readable rendering (`report.md`)
pub fn render_markdown(report: &PipelineReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Hanja Pipeline Report");
    let _ = writeln!(out);
    let _ = writeln!(out, "Generated: {}", report.generated_at.to_rfc3339());
    if let Some(run_id) = &report.run_id {
        let _ = writeln!(out, "Run: `{}`", run_id);
    }

    let _ = writeln!(out, "\n## Funnel\n");
    let _ = writeln!(out, "| Step | Records |");
    let _ = writeln!(out, "|------|---------|");
    let f = &report.funnel;
    for (name, count) in [
        ("Ingested", f.ingested),
        ("Normalized", f.normalized),
        ("Merged", f.merged),
        ("Resolved", f.resolved),
        ("Valid", f.valid),
        ("Loaded", f.loaded),
    ] {
        let _ = writeln!(out, "| {} | {} |", name, count);
    }

    let _ = writeln!(out, "\n## Quality\n");
    let q = &report.quality;
    let _ = writeln!(out, "- Completeness: {:.1}%", q.completeness * 100.0);
    let _ = writeln!(out, "- Accuracy: {:.1}%", q.accuracy * 100.0);
    let _ = writeln!(out, "- Validity: {:.1}%", q.validity * 100.0);
    let _ = writeln!(out, "- Consistency: {:.1}%", q.consistency * 100.0);
    let _ = writeln!(
        out,
        "- Errors: {}, warnings: {}",
        report.total_errors, report.total_warnings
    );

    let _ = writeln!(out, "\n## Performance\n");
    let _ = writeln!(out, "| Stage | Status | Time (ms) | Records/s |");
    let _ = writeln!(out, "|-------|--------|-----------|-----------|");
    for stage in &report.performance.stages {
        let status = match (stage.success, stage.reused) {
            (false, _) => "failed",
            (true, true) => "reused",
            (true, false) => "ok",
        };
        let _ = writeln!(
            out,
            "| {} | {} | {} | {:.1} |",
            stage.stage, status, stage.processing_time_ms, stage.throughput_per_second
        );
    }
    let _ = writeln!(
        out,
        "\nTotal: {} ms, {:.1} records/s",
        report.performance.total_time_ms, report.performance.overall_throughput
    );
    if let Some(slowest) = report.performance.slowest_stage {
        let _ = writeln!(out, "Slowest stage: {}", slowest);
    }
    if let Some(recommendation) = &report.performance.recommendation {
        let _ = writeln!(out, "Recommendation: {}", recommendation);
    }

    if !report.failed_stages.is_empty() {
        let _ = writeln!(out, "\n## Failed stages\n");
        for stage in &report.failed_stages {
            let _ = writeln!(out, "- {}", stage);
        }
    }

    if let Some(stats) = &report.dictionary {
        let _ = writeln!(out, "\n## Dictionary\n");
        let _ = writeln!(out, "- Entries: {}", stats.total_entries);
        let _ = writeln!(out, "- Readings: {}", stats.total_readings);
        let _ = writeln!(out, "- Needs review: {}", stats.needs_review);
        if let Some(avg) = stats.average_strokes {
            let _ = writeln!(out, "- Average strokes: {:.1}", avg);
        }
        for (element, count) in &stats.by_element {
            let _ = writeln!(out, "- {}: {}", element, count);
        }
    }

    out
}
