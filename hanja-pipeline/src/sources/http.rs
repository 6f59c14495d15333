//! JSON entry documents fetched over HTTP

use super::{parse_entries, RecordSource, SourceEntry};
use anyhow::{Context, Result};
use async_trait::async_trait;
use hanja_common::config::SourceConfig;
use std::time::Duration;
use tracing::debug;

pub struct HttpSource {
    name: String,
    url: String,
    mechanism: String,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .with_context(|| format!("HTTP source '{}' has no url", config.name))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("hanja-pipeline/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            name: config.name.clone(),
            url,
            mechanism: config.mechanism.clone(),
            client,
        })
    }
}

#[async_trait]
impl RecordSource for HttpSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_mechanism(&self) -> &str {
        &self.mechanism
    }

    async fn fetch(&self) -> Result<Vec<SourceEntry>> {
        debug!(source = %self.name, url = %self.url, "Fetching source");
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", self.url))?
            .error_for_status()
            .with_context(|| format!("{} returned an error status", self.url))?;
        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read body from {}", self.url))?;
        parse_entries(&self.name, &text)
    }
}
