//! Reference tables compiled into the binary

use super::{parse_entries, RecordSource, SourceEntry};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use hanja_common::config::SourceConfig;

const BASE_TABLE: &str = include_str!("../../data/base_table.json");
const EXPANDED_TABLE: &str = include_str!("../../data/expanded_table.json");

/// Names accepted for `table`
pub const BUNDLED_TABLES: [&str; 2] = ["base", "expanded"];

pub struct BundledSource {
    name: String,
    table: String,
    mechanism: String,
}

impl BundledSource {
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let table = config
            .table
            .clone()
            .with_context(|| format!("Bundled source '{}' has no table", config.name))?;
        if !BUNDLED_TABLES.contains(&table.as_str()) {
            bail!(
                "Bundled source '{}' names unknown table '{}' (expected one of {:?})",
                config.name,
                table,
                BUNDLED_TABLES
            );
        }
        Ok(Self {
            name: config.name.clone(),
            table,
            mechanism: config.mechanism.clone(),
        })
    }
}

#[async_trait]
impl RecordSource for BundledSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_mechanism(&self) -> &str {
        &self.mechanism
    }

    async fn fetch(&self) -> Result<Vec<SourceEntry>> {
        let text = match self.table.as_str() {
            "base" => BASE_TABLE,
            _ => EXPANDED_TABLE,
        };
        parse_entries(&self.name, text)
    }
}
