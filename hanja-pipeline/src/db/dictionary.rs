//! Dictionary entry persistence (`dictionary_entries`)
//!
//! Writes go through [`upsert_entry`], which the Load stage calls inside its
//! batch transactions. A row decided manually keeps its element, review
//! status and decision tag for as long as its evidence fingerprint is
//! unchanged.

use super::readings::load_readings;
use crate::fusion::evidence_fingerprint;
use crate::types::{DecidedBy, EvidenceTuple, Reading, ReviewStatus, RuleFailure, ValidatedRecord};
use hanja_common::oheng::{MAX_STROKES, MIN_STROKES};
use hanja_common::{Element, Error, Result, YinYang};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info};

const ENTRY_COLUMNS: &str = r#"
    character, meaning, strokes, element, yin_yang, confidence, review_status,
    evidence_score, decided_by, ruleset, evidence_json, sources, is_valid,
    failed_rules, usage_count,
    CAST(created_at AS TEXT) AS created_at, CAST(updated_at AS TEXT) AS updated_at
"#;

/// Persisted dictionary entry with its readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryEntry {
    pub character: String,
    pub meaning: Option<String>,
    pub strokes: Option<u32>,
    pub element: Option<Element>,
    pub yin_yang: Option<YinYang>,
    pub confidence: Option<f64>,
    pub review_status: ReviewStatus,
    pub evidence_score: u8,
    pub decided_by: DecidedBy,
    pub ruleset: String,
    pub evidence: Vec<EvidenceTuple>,
    pub sources: Vec<String>,
    pub is_valid: bool,
    pub failed_rules: Vec<RuleFailure>,
    pub usage_count: i64,
    pub readings: Vec<Reading>,
    pub created_at: String,
    pub updated_at: String,
}

/// Aggregate counts over the whole dictionary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryStats {
    pub total_entries: i64,
    pub total_readings: i64,
    /// Entry count per element; entries without one are counted as "unclassified"
    pub by_element: BTreeMap<String, i64>,
    pub average_strokes: Option<f64>,
    pub needs_review: i64,
}

/// 1-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    pub const DEFAULT_PER_PAGE: u32 = 50;
    pub const MAX_PER_PAGE: u32 = 500;

    /// Build a page request, clamping out-of-range values
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, Self::MAX_PER_PAGE),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_PER_PAGE)
    }
}

/// One page of results plus the unpaged total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

impl<T> Paged<T> {
    pub fn new(items: Vec<T>, page: Page, total: i64) -> Self {
        Self {
            items,
            page: page.page,
            per_page: page.per_page,
            total,
        }
    }
}

// ============================================================================
// Writes
// ============================================================================

/// Insert or update one validated record and replace its readings
///
/// Runs on the caller's connection so the Load stage controls the
/// transaction boundary.
pub async fn upsert_entry(conn: &mut SqliteConnection, record: &ValidatedRecord) -> Result<()> {
    let merged = &record.record.merged;
    let resolution = &record.record.resolution;

    let fingerprint = evidence_fingerprint(&merged.candidates);
    let evidence_json = serde_json::to_string(&merged.candidates)?;
    let sources_json = serde_json::to_string(&merged.sources)?;
    let failed_rules_json = serde_json::to_string(&record.failed_rules)?;

    sqlx::query(
        r#"
        INSERT INTO dictionary_entries (
            character, meaning, strokes, element, yin_yang, confidence,
            review_status, evidence_score, decided_by, ruleset,
            evidence_json, evidence_fingerprint, sources, is_valid, failed_rules,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT(character) DO UPDATE SET
            meaning = excluded.meaning,
            strokes = excluded.strokes,
            yin_yang = excluded.yin_yang,
            confidence = excluded.confidence,
            element = CASE
                WHEN dictionary_entries.decided_by = 'manual'
                     AND dictionary_entries.evidence_fingerprint = excluded.evidence_fingerprint
                THEN dictionary_entries.element ELSE excluded.element END,
            review_status = CASE
                WHEN dictionary_entries.decided_by = 'manual'
                     AND dictionary_entries.evidence_fingerprint = excluded.evidence_fingerprint
                THEN dictionary_entries.review_status ELSE excluded.review_status END,
            decided_by = CASE
                WHEN dictionary_entries.decided_by = 'manual'
                     AND dictionary_entries.evidence_fingerprint = excluded.evidence_fingerprint
                THEN dictionary_entries.decided_by ELSE excluded.decided_by END,
            evidence_score = excluded.evidence_score,
            ruleset = excluded.ruleset,
            evidence_json = excluded.evidence_json,
            evidence_fingerprint = excluded.evidence_fingerprint,
            sources = excluded.sources,
            is_valid = excluded.is_valid,
            failed_rules = excluded.failed_rules,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&merged.character)
    .bind(&merged.meaning)
    .bind(storable_strokes(merged.strokes))
    .bind(resolution.element.map(|e| e.as_str()))
    .bind(merged.yin_yang.map(|y| y.as_str()))
    .bind(storable_confidence(merged.confidence))
    .bind(resolution.review_status.as_str())
    .bind(i64::from(resolution.evidence_score))
    .bind(resolution.decided_by.as_str())
    .bind(&resolution.ruleset)
    .bind(evidence_json)
    .bind(&fingerprint)
    .bind(sources_json)
    .bind(record.is_valid)
    .bind(failed_rules_json)
    .execute(&mut *conn)
    .await?;

    super::readings::replace_readings(conn, &merged.character, &merged.readings).await?;

    debug!(character = %merged.character, "Upserted dictionary entry");
    Ok(())
}

/// Stroke count as stored; out-of-range counts become NULL
///
/// Only reachable for invalid records loaded for audit. The raw count stays
/// in the `stroke_range` entry of `failed_rules`.
fn storable_strokes(strokes: Option<u32>) -> Option<i64> {
    strokes
        .map(i64::from)
        .filter(|s| (MIN_STROKES..=MAX_STROKES).contains(s))
}

/// Confidence as stored; values outside [0, 1] become NULL
fn storable_confidence(confidence: Option<f64>) -> Option<f64> {
    confidence.filter(|c| c.is_finite() && (0.0..=1.0).contains(c))
}

/// Operator decision: set the element, mark it manual and reviewed
pub async fn manual_resolve(
    pool: &SqlitePool,
    character: &str,
    element: Element,
) -> Result<DictionaryEntry> {
    let result = sqlx::query(
        r#"
        UPDATE dictionary_entries
        SET element = ?, decided_by = 'manual', review_status = 'ok',
            updated_at = CURRENT_TIMESTAMP
        WHERE character = ?
        "#,
    )
    .bind(element.as_str())
    .bind(character)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Dictionary entry '{}'", character)));
    }

    info!(character, %element, "Manual element decision recorded");

    get_entry(pool, character, false)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Dictionary entry '{}'", character)))
}

// ============================================================================
// Reads
// ============================================================================

/// Look up one character
///
/// With `record_usage`, the entry's usage counter is incremented first.
pub async fn get_entry(
    pool: &SqlitePool,
    character: &str,
    record_usage: bool,
) -> Result<Option<DictionaryEntry>> {
    if record_usage {
        sqlx::query("UPDATE dictionary_entries SET usage_count = usage_count + 1 WHERE character = ?")
            .bind(character)
            .execute(pool)
            .await?;
    }

    let row = sqlx::query(&format!(
        "SELECT {} FROM dictionary_entries WHERE character = ?",
        ENTRY_COLUMNS
    ))
    .bind(character)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let readings = load_readings(pool, character).await?;
            Ok(Some(entry_from_row(&row, readings)?))
        }
        None => Ok(None),
    }
}

/// Entries classified as `element`, by character
pub async fn list_by_element(
    pool: &SqlitePool,
    element: Element,
    page: Page,
) -> Result<Paged<DictionaryEntry>> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dictionary_entries WHERE element = ?")
        .bind(element.as_str())
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query(&format!(
        "SELECT {} FROM dictionary_entries WHERE element = ? ORDER BY character LIMIT ? OFFSET ?",
        ENTRY_COLUMNS
    ))
    .bind(element.as_str())
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let items = entries_from_rows(pool, &rows).await?;
    Ok(Paged::new(items, page, total))
}

/// Entries awaiting review, weakest evidence first
pub async fn review_queue(pool: &SqlitePool, page: Page) -> Result<Paged<DictionaryEntry>> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM dictionary_entries WHERE review_status = 'needs_review'",
    )
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM dictionary_entries
        WHERE review_status = 'needs_review'
        ORDER BY evidence_score ASC, character ASC
        LIMIT ? OFFSET ?
        "#,
        ENTRY_COLUMNS
    ))
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let items = entries_from_rows(pool, &rows).await?;
    Ok(Paged::new(items, page, total))
}

/// Aggregate statistics (used before and after Load)
pub async fn dictionary_stats(pool: &SqlitePool) -> Result<DictionaryStats> {
    let total_entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dictionary_entries")
        .fetch_one(pool)
        .await?;
    let total_readings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reading_entries")
        .fetch_one(pool)
        .await?;
    let average_strokes: Option<f64> =
        sqlx::query_scalar("SELECT AVG(strokes) FROM dictionary_entries WHERE strokes IS NOT NULL")
            .fetch_one(pool)
            .await?;
    let needs_review: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM dictionary_entries WHERE review_status = 'needs_review'",
    )
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query(
        r#"
        SELECT COALESCE(element, 'unclassified') AS element, COUNT(*) AS count
        FROM dictionary_entries
        GROUP BY COALESCE(element, 'unclassified')
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut by_element = BTreeMap::new();
    for row in rows {
        by_element.insert(row.try_get::<String, _>("element")?, row.try_get::<i64, _>("count")?);
    }

    Ok(DictionaryStats {
        total_entries,
        total_readings,
        by_element,
        average_strokes,
        needs_review,
    })
}

// ============================================================================
// Row mapping
// ============================================================================

pub(crate) async fn entries_for_characters(
    pool: &SqlitePool,
    characters: &[String],
) -> Result<Vec<DictionaryEntry>> {
    let mut entries = Vec::with_capacity(characters.len());
    for character in characters {
        if let Some(entry) = get_entry(pool, character, false).await? {
            entries.push(entry);
        }
    }
    Ok(entries)
}

async fn entries_from_rows(pool: &SqlitePool, rows: &[SqliteRow]) -> Result<Vec<DictionaryEntry>> {
    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let character: String = row.try_get("character")?;
        let readings = load_readings(pool, &character).await?;
        entries.push(entry_from_row(row, readings)?);
    }
    Ok(entries)
}

fn entry_from_row(row: &SqliteRow, readings: Vec<Reading>) -> Result<DictionaryEntry> {
    let strokes: Option<i64> = row.try_get("strokes")?;
    let element: Option<String> = row.try_get("element")?;
    let yin_yang: Option<String> = row.try_get("yin_yang")?;
    let review_status: String = row.try_get("review_status")?;
    let decided_by: String = row.try_get("decided_by")?;
    let evidence_score: i64 = row.try_get("evidence_score")?;
    let evidence_json: String = row.try_get("evidence_json")?;
    let sources_json: String = row.try_get("sources")?;
    let failed_rules_json: String = row.try_get("failed_rules")?;

    Ok(DictionaryEntry {
        character: row.try_get("character")?,
        meaning: row.try_get("meaning")?,
        strokes: strokes.and_then(|s| u32::try_from(s).ok()),
        element: element.as_deref().map(parse_column).transpose()?,
        yin_yang: yin_yang.as_deref().map(parse_column).transpose()?,
        confidence: row.try_get("confidence")?,
        review_status: parse_column(&review_status)?,
        evidence_score: evidence_score.clamp(0, 100) as u8,
        decided_by: parse_column(&decided_by)?,
        ruleset: row.try_get("ruleset")?,
        evidence: serde_json::from_str(&evidence_json)?,
        sources: serde_json::from_str(&sources_json)?,
        is_valid: row.try_get("is_valid")?,
        failed_rules: serde_json::from_str(&failed_rules_json)?,
        usage_count: row.try_get("usage_count")?,
        readings,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn parse_column<T: FromStr<Err = String>>(value: &str) -> Result<T> {
    value.parse::<T>().map_err(Error::Internal)
}
