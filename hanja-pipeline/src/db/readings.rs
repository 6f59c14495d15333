//! Reading rows (`reading_entries`)

use super::dictionary::{entries_for_characters, DictionaryEntry, Page, Paged};
use crate::types::Reading;
use hanja_common::{Element, Error, Result};
use sqlx::{Row, SqliteConnection, SqlitePool};

/// Replace every reading of `character` (delete-then-insert)
pub async fn replace_readings(
    conn: &mut SqliteConnection,
    character: &str,
    readings: &[Reading],
) -> Result<()> {
    sqlx::query("DELETE FROM reading_entries WHERE character = ?")
        .bind(character)
        .execute(&mut *conn)
        .await?;

    for reading in readings {
        sqlx::query(
            r#"
            INSERT INTO reading_entries (character, reading, is_primary, sound_element)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(character)
        .bind(&reading.text)
        .bind(reading.is_primary)
        .bind(reading.sound_element.map(|e| e.as_str()))
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Readings of one character, primary first
pub async fn load_readings(pool: &SqlitePool, character: &str) -> Result<Vec<Reading>> {
    let rows = sqlx::query(
        r#"
        SELECT reading, is_primary, sound_element
        FROM reading_entries
        WHERE character = ?
        ORDER BY is_primary DESC, id ASC
        "#,
    )
    .bind(character)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<Reading> {
            let sound: Option<String> = row.try_get("sound_element")?;
            Ok(Reading {
                text: row.try_get("reading")?,
                is_primary: row.try_get("is_primary")?,
                sound_element: sound
                    .map(|s| s.parse::<Element>().map_err(Error::Internal))
                    .transpose()?,
            })
        })
        .collect()
}

/// Entries having `reading` as a primary or alternate reading
pub async fn find_by_reading(
    pool: &SqlitePool,
    reading: &str,
    page: Page,
) -> Result<Paged<DictionaryEntry>> {
    let reading = reading.trim();

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT character) FROM reading_entries WHERE reading = ?",
    )
    .bind(reading)
    .fetch_one(pool)
    .await?;

    let characters: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT character
        FROM reading_entries
        WHERE reading = ?
        ORDER BY character
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(reading)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let items = entries_for_characters(pool, &characters).await?;
    Ok(Paged::new(items, page, total))
}
