//! JSON entry files on disk

use super::{parse_entries, RecordSource, SourceEntry};
use anyhow::{Context, Result};
use async_trait::async_trait;
use hanja_common::config::SourceConfig;
use std::path::PathBuf;
use tracing::debug;

pub struct JsonFileSource {
    name: String,
    path: PathBuf,
    mechanism: String,
}

impl JsonFileSource {
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let path = config
            .path
            .clone()
            .with_context(|| format!("File source '{}' has no path", config.name))?;
        Ok(Self {
            name: config.name.clone(),
            path,
            mechanism: config.mechanism.clone(),
        })
    }
}

#[async_trait]
impl RecordSource for JsonFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_mechanism(&self) -> &str {
        &self.mechanism
    }

    async fn fetch(&self) -> Result<Vec<SourceEntry>> {
        debug!(source = %self.name, path = %self.path.display(), "Reading source file");
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        parse_entries(&self.name, &text)
    }
}
