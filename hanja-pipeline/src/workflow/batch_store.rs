//! Stage batch files
//!
//! Layout inside the work directory:
//! ```text
//! 01_ingest.json          01_ingest.result.json
//! 02_normalize.json       02_normalize.result.json
//! ...
//! 07_report.json          07_report.result.json
//! checkpoint.json  report.json  report.md
//! ```
//! Files are written to a temporary name and renamed into place so a crash
//! never leaves a truncated batch behind.

use crate::error::PipelineError;
use crate::types::{ProcessingResult, StageKind};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct BatchStore {
    dir: PathBuf,
}

impl BatchStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> Result<(), PipelineError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    pub fn batch_path(&self, stage: StageKind) -> PathBuf {
        self.dir.join(format!("{}.json", stage.file_stem()))
    }

    pub fn result_path(&self, stage: StageKind) -> PathBuf {
        self.dir.join(format!("{}.result.json", stage.file_stem()))
    }

    pub fn has_batch(&self, stage: StageKind) -> bool {
        self.batch_path(stage).is_file()
    }

    pub async fn write_batch<T: Serialize>(&self, stage: StageKind, output: &T) -> Result<(), PipelineError> {
        let path = self.batch_path(stage);
        write_json(&path, output).await?;
        debug!(stage = %stage, path = %path.display(), "Batch written");
        Ok(())
    }

    /// Read a stage's batch; a missing file is [`PipelineError::MissingInput`]
    pub async fn read_batch<T: DeserializeOwned>(&self, stage: StageKind) -> Result<T, PipelineError> {
        let path = self.batch_path(stage);
        if !path.is_file() {
            return Err(PipelineError::MissingInput {
                stage,
                path: path.display().to_string(),
            });
        }
        let bytes = tokio::fs::read(&path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Remove a stage's batch (stale output of a stage that just failed)
    pub async fn remove_batch(&self, stage: StageKind) -> Result<(), PipelineError> {
        remove_if_present(&self.batch_path(stage)).await.map(|_| ())
    }

    /// Remove the batch and result of every stage after `stage`
    ///
    /// Returns the stages that had a file on disk. The report documents go
    /// with the Report stage.
    pub async fn clear_after(&self, stage: StageKind) -> Result<Vec<StageKind>, PipelineError> {
        let mut cleared = Vec::new();
        for later in StageKind::ALL.iter().copied().filter(|s| *s > stage) {
            let mut removed = remove_if_present(&self.batch_path(later)).await?;
            removed |= remove_if_present(&self.result_path(later)).await?;
            if later == StageKind::Report {
                for name in ["report.json", "report.md"] {
                    removed |= remove_if_present(&self.dir.join(name)).await?;
                }
            }
            if removed {
                cleared.push(later);
            }
        }
        Ok(cleared)
    }

    pub async fn write_result(&self, result: &ProcessingResult) -> Result<(), PipelineError> {
        write_json(&self.result_path(result.stage), result).await
    }

    pub async fn read_result(&self, stage: StageKind) -> Result<Option<ProcessingResult>, PipelineError> {
        let path = self.result_path(stage);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = tokio::fs::read(&path).await?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Write any JSON document into the work directory
    pub async fn write_document<T: Serialize>(&self, name: &str, value: &T) -> Result<(), PipelineError> {
        write_json(&self.dir.join(name), value).await
    }

    pub async fn write_text(&self, name: &str, text: &str) -> Result<(), PipelineError> {
        write_atomic(&self.dir.join(name), text.as_bytes()).await
    }
}

pub(crate) async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PipelineError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes).await
}

/// `true` when a file was removed
async fn remove_if_present(path: &Path) -> Result<bool, PipelineError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
