// Record sources - where Ingest gets its raw entries
//
// Three kinds: reference tables compiled into the binary, JSON files on disk
// and JSON documents fetched over HTTP. All return the same loosely-typed
// entry shape; canonicalization happens in Normalize.

use crate::types::RawReading;
use anyhow::Result;
use async_trait::async_trait;
use hanja_common::config::{SourceConfig, SourceKind};
use serde::{Deserialize, Serialize};

pub mod bundled;
pub mod http;
pub mod json_file;

pub use bundled::BundledSource;
pub use http::HttpSource;
pub use json_file::JsonFileSource;

/// One entry exactly as a source publishes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceEntry {
    pub character: String,
    #[serde(default)]
    pub meaning: Option<String>,
    #[serde(default)]
    pub readings: Vec<RawReading>,
    #[serde(default)]
    pub strokes: Option<serde_json::Value>,
    #[serde(default, alias = "elementCandidate")]
    pub element: Option<String>,
    #[serde(default, alias = "elementMechanism")]
    pub mechanism: Option<String>,
    #[serde(default)]
    pub yin_yang: Option<String>,
    #[serde(default)]
    pub confidence: Option<serde_json::Value>,
}

/// Record source trait - every configured source implements this
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Source identifier stamped on every record
    fn name(&self) -> &str;

    /// Mechanism tag for entries that do not carry one
    fn default_mechanism(&self) -> &str;

    /// Fetch every entry
    ///
    /// # Returns
    /// * `Ok(entries)` - the complete entry list
    /// * `Err(_)` - source unreachable or unparseable (recorded, not fatal on its own)
    async fn fetch(&self) -> Result<Vec<SourceEntry>>;
}

/// Instantiate the configured sources
pub fn build_sources(configs: &[SourceConfig]) -> Result<Vec<Box<dyn RecordSource>>> {
    let mut sources: Vec<Box<dyn RecordSource>> = Vec::with_capacity(configs.len());
    for config in configs {
        let source: Box<dyn RecordSource> = match config.kind {
            SourceKind::Bundled => Box::new(BundledSource::from_config(config)?),
            SourceKind::JsonFile => Box::new(JsonFileSource::from_config(config)?),
            SourceKind::Http => Box::new(HttpSource::from_config(config)?),
        };
        sources.push(source);
    }
    Ok(sources)
}

/// Parse a JSON array of entries
pub(crate) fn parse_entries(source: &str, text: &str) -> Result<Vec<SourceEntry>> {
    serde_json::from_str(text)
        .map_err(|e| anyhow::anyhow!("Source '{}' is not a valid entry array: {}", source, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_accepts_aliases() {
        let entries = parse_entries(
            "t",
            r#"[{"character": "賢", "elementCandidate": "木", "elementMechanism": "expanded", "readings": ["현"]}]"#,
        )
        .unwrap();
        assert_eq!(entries[0].element.as_deref(), Some("木"));
        assert_eq!(entries[0].mechanism.as_deref(), Some("expanded"));
        assert_eq!(entries[0].readings[0].text, "현");
    }

    #[test]
    fn test_non_array_rejected() {
        assert!(parse_entries("t", r#"{"character": "賢"}"#).is_err());
    }
}
