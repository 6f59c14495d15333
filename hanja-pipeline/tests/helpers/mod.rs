//! Shared fixtures for pipeline integration tests
//!
//! Each test gets its own temp directory holding the SQLite dictionary, the
//! work directory and any JSON source files.

#![allow(dead_code)]

use hanja_common::config::{PipelineConfig, SourceConfig, SourceKind};
use hanja_common::db::init_database;
use hanja_pipeline::{Orchestrator, RunOptions, RunSummary};
use serde_json::Value;
use sqlx::SqlitePool;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct TestEnv {
    pub dir: TempDir,
    pub pool: SqlitePool,
    pub config: PipelineConfig,
}

impl TestEnv {
    /// Empty environment: fresh database, no sources configured
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("hanja.db")).await.unwrap();

        let config = PipelineConfig {
            database_path: dir.path().join("hanja.db"),
            work_dir: dir.path().join("work"),
            batch_size: 2,
            workers: 2,
            max_lock_wait_ms: 500,
            sources: Vec::new(),
            ..PipelineConfig::default()
        };

        Self { dir, pool, config }
    }

    /// Write a JSON source file (overwriting any earlier version)
    pub fn write_source_file(&self, file_name: &str, entries: Value) -> PathBuf {
        let path = self.dir.path().join(file_name);
        std::fs::write(&path, serde_json::to_vec_pretty(&entries).unwrap()).unwrap();
        path
    }

    /// Register a JSON file source
    pub fn add_source(&mut self, name: &str, file_name: &str, mechanism: &str, priority: u32) {
        self.config.sources.push(json_source(
            name,
            self.dir.path().join(file_name),
            mechanism,
            priority,
        ));
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.config.clone(), self.pool.clone())
    }

    pub async fn run(&self, options: RunOptions) -> RunSummary {
        self.orchestrator().run_all(options).await.unwrap()
    }

    pub async fn run_default(&self) -> RunSummary {
        self.run(RunOptions::default()).await
    }
}

pub fn json_source(name: &str, path: PathBuf, mechanism: &str, priority: u32) -> SourceConfig {
    SourceConfig {
        name: name.to_string(),
        kind: SourceKind::JsonFile,
        table: None,
        path: Some(path),
        url: None,
        timeout_secs: 5,
        mechanism: mechanism.to_string(),
        priority,
    }
}

/// Two-source setup with one conflicting character (賢)
///
/// Base says wood with 15 strokes and reading 현, expanded says metal.
pub async fn conflicting_env() -> TestEnv {
    let mut env = TestEnv::new().await;
    env.write_source_file(
        "base.json",
        serde_json::json!([
            {
                "character": "賢",
                "meaning": "어질 현",
                "readings": ["현"],
                "strokes": 15,
                "element": "木",
                "yinYang": "陽"
            },
            {
                "character": "林",
                "meaning": "수풀 림",
                "readings": [{"text": "림", "isPrimary": true}],
                "strokes": 8,
                "element": "木",
                "yinYang": "陰"
            }
        ]),
    );
    env.write_source_file(
        "expanded.json",
        serde_json::json!([
            {"character": "賢", "element": "金"},
            {"character": "林", "element": "Wood"}
        ]),
    );
    env.add_source("base_file", "base.json", "base", 1);
    env.add_source("expanded_file", "expanded.json", "expanded", 2);
    env
}
