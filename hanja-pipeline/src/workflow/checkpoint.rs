//! Run checkpoint (`checkpoint.json`)
//!
//! Rewritten after every stage. `run --resume` reuses the outputs of the
//! leading stages recorded as completed and restarts after them.

use crate::error::PipelineError;
use crate::types::StageKind;
use crate::workflow::batch_store::write_json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

pub const CHECKPOINT_FILE: &str = "checkpoint.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed: Vec<StageKind>,
    #[serde(default)]
    pub failed: Vec<StageKind>,
}

impl Checkpoint {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: now,
            updated_at: now,
            completed: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn mark_completed(&mut self, stage: StageKind) {
        self.failed.retain(|s| *s != stage);
        if !self.completed.contains(&stage) {
            self.completed.push(stage);
            self.completed.sort();
        }
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self, stage: StageKind) {
        self.completed.retain(|s| *s != stage);
        if !self.failed.contains(&stage) {
            self.failed.push(stage);
        }
        self.updated_at = Utc::now();
    }

    /// Drop completion marks of every stage after `stage`
    pub fn forget_after(&mut self, stage: StageKind) {
        self.completed.retain(|s| *s <= stage);
        self.updated_at = Utc::now();
    }

    /// Last stage of the unbroken completed prefix of the chain
    pub fn last_completed(&self) -> Option<StageKind> {
        StageKind::ALL
            .iter()
            .take_while(|s| self.completed.contains(s))
            .last()
            .copied()
    }

    pub async fn load(dir: &Path) -> Result<Option<Self>, PipelineError> {
        let path = dir.join(CHECKPOINT_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = tokio::fs::read(&path).await?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    pub async fn save(&self, dir: &Path) -> Result<(), PipelineError> {
        write_json(&dir.join(CHECKPOINT_FILE), self).await
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_completed_is_contiguous_prefix() {
        let mut checkpoint = Checkpoint::new();
        assert_eq!(checkpoint.last_completed(), None);

        checkpoint.mark_completed(StageKind::Ingest);
        checkpoint.mark_completed(StageKind::Normalize);
        checkpoint.mark_completed(StageKind::Resolve);
        assert_eq!(checkpoint.last_completed(), Some(StageKind::Normalize));

        checkpoint.mark_failed(StageKind::Normalize);
        assert_eq!(checkpoint.last_completed(), Some(StageKind::Ingest));
    }

    #[test]
    fn test_forget_after_keeps_upstream_marks() {
        let mut checkpoint = Checkpoint::new();
        for stage in StageKind::ALL {
            checkpoint.mark_completed(stage);
        }

        checkpoint.mark_failed(StageKind::Merge);
        checkpoint.forget_after(StageKind::Merge);
        assert_eq!(checkpoint.completed, vec![StageKind::Ingest, StageKind::Normalize]);
        assert_eq!(checkpoint.last_completed(), Some(StageKind::Normalize));
    }
}
