//! Ingest: collect raw records from every configured source
//!
//! Sources are fetched concurrently. A failing source becomes a stage-level
//! error entry; the stage fails only when no source succeeds.

use crate::error::PipelineError;
use crate::sources::{RecordSource, SourceEntry};
use crate::types::{RawRecord, RecordIssue, Stage, StageKind, StageRun};
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use tracing::{info, warn};

pub struct IngestStage {
    sources: Vec<Box<dyn RecordSource>>,
}

impl IngestStage {
    pub fn new(sources: Vec<Box<dyn RecordSource>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl Stage for IngestStage {
    type Input = ();
    type Output = Vec<RawRecord>;

    fn kind(&self) -> StageKind {
        StageKind::Ingest
    }

    async fn run(&self, _input: ()) -> Result<StageRun<Vec<RawRecord>>, PipelineError> {
        if self.sources.is_empty() {
            return Err(PipelineError::no_output(StageKind::Ingest, "no sources configured"));
        }

        let fetches = self.sources.iter().map(|source| async move {
            let result = source.fetch().await;
            (source.as_ref(), result)
        });
        let outcomes = join_all(fetches).await;

        let mut records = Vec::new();
        let mut errors = Vec::new();
        let mut succeeded = 0usize;

        for (source, outcome) in outcomes {
            match outcome {
                Ok(entries) => {
                    succeeded += 1;
                    info!(source = source.name(), entries = entries.len(), "Source fetched");
                    let collected_at = Utc::now();
                    records.extend(
                        entries
                            .into_iter()
                            .map(|entry| to_raw_record(entry, source, collected_at)),
                    );
                }
                Err(e) => {
                    warn!(source = source.name(), error = %format!("{:#}", e), "Source failed");
                    errors.push(RecordIssue::new(format!("{:#}", e)).source(source.name()));
                }
            }
        }

        if succeeded == 0 {
            return Err(PipelineError::NoOutput {
                stage: StageKind::Ingest,
                reason: format!("all {} sources failed", self.sources.len()),
                issues: errors,
            });
        }

        let count = records.len();
        let mut run = StageRun::new(records, count, count);
        run.errors = errors;
        Ok(run)
    }
}

fn to_raw_record(
    entry: SourceEntry,
    source: &dyn RecordSource,
    collected_at: chrono::DateTime<Utc>,
) -> RawRecord {
    RawRecord {
        character: entry.character,
        source: source.name().to_string(),
        meaning: entry.meaning,
        readings: entry.readings,
        strokes: entry.strokes,
        element_candidate: entry.element,
        element_mechanism: entry
            .mechanism
            .or_else(|| Some(source.default_mechanism().to_string())),
        yin_yang: entry.yin_yang,
        confidence: entry.confidence,
        collected_at,
    }
}
