//! Core Types and Trait Definitions for the Hanja pipeline
//!
//! Defines the record shape produced by each stage and the [`Stage`] trait
//! every stage implements:
//!
//! ```text
//! Ingest     → Vec<RawRecord>
//! Normalize  → Vec<NormalizedRecord>
//! Dedup      → Vec<MergedRecord>
//! Resolve    → Vec<ResolvedRecord>
//! Validate   → Vec<ValidatedRecord>
//! Load       → LoadSummary
//! Report     → PipelineReport
//! ```
//!
//! Every stage also yields a [`ProcessingResult`] (counts, issues, timing)
//! which the orchestrator writes next to the stage's batch file.

use crate::error::PipelineError;
use chrono::{DateTime, Utc};
use hanja_common::{Element, YinYang};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Stage identity
// ============================================================================

/// Pipeline stages in dependency order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Ingest,
    Normalize,
    #[serde(rename = "dedup")]
    #[value(name = "dedup")]
    Merge,
    Resolve,
    Validate,
    Load,
    Report,
}

impl StageKind {
    pub const ALL: [StageKind; 7] = [
        StageKind::Ingest,
        StageKind::Normalize,
        StageKind::Merge,
        StageKind::Resolve,
        StageKind::Validate,
        StageKind::Load,
        StageKind::Report,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Ingest => "ingest",
            StageKind::Normalize => "normalize",
            StageKind::Merge => "dedup",
            StageKind::Resolve => "resolve",
            StageKind::Validate => "validate",
            StageKind::Load => "load",
            StageKind::Report => "report",
        }
    }

    /// 1-based position in the chain
    pub fn ordinal(&self) -> usize {
        StageKind::ALL
            .iter()
            .position(|k| k == self)
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    /// File name stem for this stage's batch and result files (e.g. "03_dedup")
    pub fn file_stem(&self) -> String {
        format!("{:02}_{}", self.ordinal(), self.as_str())
    }

    /// Stage whose output this stage consumes
    pub fn previous(&self) -> Option<StageKind> {
        let idx = self.ordinal().checked_sub(2)?;
        StageKind::ALL.get(idx).copied()
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StageKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| format!("unknown stage '{}'", s))
    }
}

// ============================================================================
// Classification vocabulary
// ============================================================================

/// Independent classification mechanism that produced an element suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mechanism {
    /// Base (radical-derived) classification table
    Base,
    /// Expanded / secondary classification table
    Expanded,
    /// Stroke-count last-digit rule
    StrokeRule,
    /// Reading initial-consonant rule
    SoundRule,
}

impl Mechanism {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mechanism::Base => "base",
            Mechanism::Expanded => "expanded",
            Mechanism::StrokeRule => "stroke_rule",
            Mechanism::SoundRule => "sound_rule",
        }
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review state of a dictionary entry's element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Ok,
    NeedsReview,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Ok => "ok",
            ReviewStatus::NeedsReview => "needs_review",
        }
    }
}

impl FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(ReviewStatus::Ok),
            "needs_review" => Ok(ReviewStatus::NeedsReview),
            other => Err(format!("unknown review status '{}'", other)),
        }
    }
}

/// Mechanism that decided the final element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecidedBy {
    /// Weighted evidence produced a clear winner
    Auto,
    /// Ambiguous evidence; fell back to the base (or expanded) candidate
    Base,
    /// Set by an operator
    Manual,
}

impl DecidedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecidedBy::Auto => "auto",
            DecidedBy::Base => "base",
            DecidedBy::Manual => "manual",
        }
    }
}

impl FromStr for DecidedBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(DecidedBy::Auto),
            "base" => Ok(DecidedBy::Base),
            "manual" => Ok(DecidedBy::Manual),
            other => Err(format!("unknown decision tag '{}'", other)),
        }
    }
}

// ============================================================================
// Stage records
// ============================================================================

/// Reading as collected: either a bare string or `{text, isPrimary}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawReadingRepr", rename_all = "camelCase")]
pub struct RawReading {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_primary: Option<bool>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawReadingRepr {
    Text(String),
    Detailed {
        text: String,
        #[serde(default, rename = "isPrimary")]
        is_primary: Option<bool>,
    },
}

impl From<RawReadingRepr> for RawReading {
    fn from(repr: RawReadingRepr) -> Self {
        match repr {
            RawReadingRepr::Text(text) => RawReading { text, is_primary: None },
            RawReadingRepr::Detailed { text, is_primary } => RawReading { text, is_primary },
        }
    }
}

/// One observation of a character from one source (Ingest output)
///
/// Field values are kept exactly as the source supplied them; `strokes` and
/// `confidence` stay untyped JSON so that Normalize can report the original
/// value when canonicalization fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    pub character: String,
    pub source: String,
    #[serde(default)]
    pub meaning: Option<String>,
    #[serde(default)]
    pub readings: Vec<RawReading>,
    #[serde(default)]
    pub strokes: Option<serde_json::Value>,
    #[serde(default)]
    pub element_candidate: Option<String>,
    #[serde(default)]
    pub element_mechanism: Option<String>,
    #[serde(default)]
    pub yin_yang: Option<String>,
    #[serde(default)]
    pub confidence: Option<serde_json::Value>,
    pub collected_at: DateTime<Utc>,
}

/// RawRecord with every field canonicalized (Normalize output)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRecord {
    pub character: String,
    pub source: String,
    pub meaning: Option<String>,
    pub readings: Vec<RawReading>,
    pub strokes: Option<u32>,
    pub element: Option<Element>,
    pub mechanism: Mechanism,
    pub yin_yang: Option<YinYang>,
    pub confidence: Option<f64>,
    pub collected_at: DateTime<Utc>,
}

/// `(source, mechanism, weight, suggestedElement)` observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceTuple {
    pub source: String,
    pub mechanism: Mechanism,
    pub weight: f64,
    pub suggested_element: Option<Element>,
}

/// Reading in the merged reading set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub text: String,
    pub is_primary: bool,
    /// Phonetic element hint, independent of the entry's semantic element
    pub sound_element: Option<Element>,
}

/// One record per distinct character (Dedup/Merge output)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedRecord {
    pub character: String,
    pub meaning: Option<String>,
    pub strokes: Option<u32>,
    pub yin_yang: Option<YinYang>,
    pub confidence: Option<f64>,
    pub readings: Vec<Reading>,
    pub candidates: Vec<EvidenceTuple>,
    /// Contributing sources in merge precedence order
    pub sources: Vec<String>,
}

/// Outcome of conflict resolution for one character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub element: Option<Element>,
    pub review_status: ReviewStatus,
    pub evidence_score: u8,
    pub decided_by: DecidedBy,
    pub ruleset: String,
}

/// MergedRecord plus its resolution (Resolve output)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRecord {
    #[serde(flatten)]
    pub merged: MergedRecord,
    #[serde(flatten)]
    pub resolution: Resolution,
}

/// One failed validation rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleFailure {
    pub rule: String,
    pub reason: String,
}

/// ResolvedRecord annotated with rule results (Validate output)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedRecord {
    #[serde(flatten)]
    pub record: ResolvedRecord,
    pub failed_rules: Vec<RuleFailure>,
    pub is_valid: bool,
}

impl ValidatedRecord {
    pub fn character(&self) -> &str {
        &self.record.merged.character
    }
}

// ============================================================================
// Processing results
// ============================================================================

/// A record-level error or warning attached to a stage result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordIssue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_value: Option<String>,
    #[serde(rename = "error")]
    pub message: String,
}

impl RecordIssue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn character(mut self, character: impl Into<String>) -> Self {
        self.character = Some(character.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn original_value(mut self, value: impl Into<String>) -> Self {
        self.original_value = Some(value.into());
        self
    }
}

/// Timing metrics for one stage execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageMetrics {
    pub processing_time_ms: u64,
    pub throughput_per_second: f64,
}

/// Machine-readable result written next to every stage batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub stage: StageKind,
    pub success: bool,
    pub processed_count: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub errors: Vec<RecordIssue>,
    #[serde(default)]
    pub warnings: Vec<RecordIssue>,
    pub metrics: StageMetrics,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Output was reused from disk instead of recomputed
    #[serde(default)]
    pub reused: bool,
}

impl ProcessingResult {
    /// Build the result of a completed stage run
    pub fn completed<T>(
        stage: StageKind,
        run: &StageRun<T>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let metrics = metrics_for(run.processed_count, start_time, end_time);
        Self {
            stage,
            success: true,
            processed_count: run.processed_count,
            success_count: run.success_count,
            error_count: run.errors.len(),
            errors: run.errors.clone(),
            warnings: run.warnings.clone(),
            metrics,
            start_time,
            end_time,
            reused: false,
        }
    }

    /// Build the result of a stage that could not produce output
    pub fn failed(
        stage: StageKind,
        processed_count: usize,
        errors: Vec<RecordIssue>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let metrics = metrics_for(processed_count, start_time, end_time);
        Self {
            stage,
            success: false,
            processed_count,
            success_count: 0,
            error_count: errors.len(),
            errors,
            warnings: Vec::new(),
            metrics,
            start_time,
            end_time,
            reused: false,
        }
    }
}

fn metrics_for(processed: usize, start: DateTime<Utc>, end: DateTime<Utc>) -> StageMetrics {
    let elapsed_ms = (end - start).num_milliseconds().max(0) as u64;
    let throughput_per_second = if elapsed_ms == 0 {
        processed as f64 * 1000.0
    } else {
        processed as f64 / (elapsed_ms as f64 / 1000.0)
    };
    StageMetrics {
        processing_time_ms: elapsed_ms,
        throughput_per_second,
    }
}

// ============================================================================
// Stage trait
// ============================================================================

/// Output of one successful stage execution
#[derive(Debug, Clone)]
pub struct StageRun<T> {
    pub output: T,
    /// Records (or units) the stage looked at
    pub processed_count: usize,
    /// Records the stage handled cleanly (stage-specific meaning, see each stage)
    pub success_count: usize,
    /// Records dropped or failed
    pub errors: Vec<RecordIssue>,
    /// Records kept but flagged
    pub warnings: Vec<RecordIssue>,
}

impl<T> StageRun<T> {
    pub fn new(output: T, processed_count: usize, success_count: usize) -> Self {
        Self {
            output,
            processed_count,
            success_count,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// One pipeline stage
///
/// A stage consumes the complete output of its predecessor and returns its
/// own complete output. Record-level problems go into [`StageRun::errors`] /
/// [`StageRun::warnings`]; `Err` is reserved for "this stage produced no
/// usable output at all".
#[async_trait::async_trait]
pub trait Stage: Send + Sync {
    type Input: Send + 'static;
    type Output: Send + 'static;

    fn kind(&self) -> StageKind;

    async fn run(&self, input: Self::Input) -> Result<StageRun<Self::Output>, PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_file_stems_and_order() {
        assert_eq!(StageKind::Ingest.file_stem(), "01_ingest");
        assert_eq!(StageKind::Merge.file_stem(), "03_dedup");
        assert_eq!(StageKind::Report.file_stem(), "07_report");
        assert_eq!(StageKind::Ingest.previous(), None);
        assert_eq!(StageKind::Resolve.previous(), Some(StageKind::Merge));
        assert_eq!("dedup".parse::<StageKind>().unwrap(), StageKind::Merge);
        assert!("merge".parse::<StageKind>().is_err());
    }

    #[test]
    fn test_raw_reading_accepts_string_or_object() {
        let readings: Vec<RawReading> =
            serde_json::from_str(r#"["현", {"text": "賢", "isPrimary": false}]"#).unwrap();
        assert_eq!(readings[0], RawReading { text: "현".into(), is_primary: None });
        assert_eq!(readings[1].is_primary, Some(false));
    }

    #[test]
    fn test_resolved_record_flattens() {
        let record = ResolvedRecord {
            merged: MergedRecord {
                character: "賢".into(),
                meaning: Some("어질 현".into()),
                strokes: None,
                yin_yang: None,
                confidence: None,
                readings: vec![],
                candidates: vec![],
                sources: vec!["a".into()],
            },
            resolution: Resolution {
                element: Some(Element::Wood),
                review_status: ReviewStatus::NeedsReview,
                evidence_score: 40,
                decided_by: DecidedBy::Base,
                ruleset: "oheng-v1".into(),
            },
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["character"], "賢");
        assert_eq!(value["reviewStatus"], "needs_review");
        assert_eq!(value["decidedBy"], "base");

        let back: ResolvedRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_processing_result_field_names() {
        let now = Utc::now();
        let run = StageRun::new((), 10, 8);
        let result = ProcessingResult::completed(StageKind::Normalize, &run, now, now);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["processedCount"], 10);
        assert_eq!(value["successCount"], 8);
        assert_eq!(value["errorCount"], 0);
        assert!(value["metrics"]["processingTimeMs"].is_u64());
        assert!(value["metrics"]["throughputPerSecond"].is_number());
    }
}
