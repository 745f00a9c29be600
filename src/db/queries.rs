use anyhow::{Context, Result};
use sqlx::SqlitePool;

use super::models::SocialStreamItem;
use crate::model::{PostRecord, Source};

// ========== Settings ==========

/// Get a setting by its fully qualified key.
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch setting")?;

    Ok(row.map(|(value,)| value))
}

/// Insert or replace a setting.
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO settings (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')
        ",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await
    .context("Failed to store setting")?;

    Ok(())
}

// ========== Items ==========

/// Get an item by its composite key.
pub async fn get_item(
    pool: &SqlitePool,
    source: Source,
    source_id: &str,
) -> Result<Option<SocialStreamItem>> {
    sqlx::query_as("SELECT * FROM social_stream_items WHERE source = ? AND source_id = ?")
        .bind(source.as_str())
        .bind(source_id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch item by source id")
}

/// Insert an item, returning its ID.
///
/// A row that already exists for the same `(source, source_id)` is updated
/// in place instead.
pub async fn insert_item(pool: &SqlitePool, record: &PostRecord, active: bool) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        r"
        INSERT INTO social_stream_items
            (source, source_id, source_type, language, avatar, username, fullname,
             content, image, link, date, data, active)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(source, source_id) DO UPDATE SET
            source_type = excluded.source_type,
            language = excluded.language,
            avatar = excluded.avatar,
            username = excluded.username,
            fullname = excluded.fullname,
            content = excluded.content,
            image = excluded.image,
            link = excluded.link,
            date = excluded.date,
            data = excluded.data,
            active = excluded.active,
            updated_at = datetime('now')
        RETURNING id
        ",
    )
    .bind(record.source.as_str())
    .bind(&record.source_id)
    .bind(record.source_type.as_str())
    .bind(&record.language)
    .bind(&record.avatar)
    .bind(&record.username)
    .bind(&record.fullname)
    .bind(&record.content)
    .bind(&record.image)
    .bind(&record.link)
    .bind(record.date.to_rfc3339())
    .bind(record.raw_data.to_string())
    .bind(active)
    .fetch_one(pool)
    .await
    .context("Failed to insert item")?;

    Ok(row.0)
}

/// Update an existing item's fields, returning whether a row was changed.
pub async fn update_item(
    pool: &SqlitePool,
    id: i64,
    record: &PostRecord,
    active: bool,
) -> Result<bool> {
    let result = sqlx::query(
        r"
        UPDATE social_stream_items
        SET source = ?, source_id = ?, source_type = ?, language = ?, avatar = ?,
            username = ?, fullname = ?, content = ?, image = ?, link = ?, date = ?,
            data = ?, active = ?, updated_at = datetime('now')
        WHERE id = ?
        ",
    )
    .bind(record.source.as_str())
    .bind(&record.source_id)
    .bind(record.source_type.as_str())
    .bind(&record.language)
    .bind(&record.avatar)
    .bind(&record.username)
    .bind(&record.fullname)
    .bind(&record.content)
    .bind(&record.image)
    .bind(&record.link)
    .bind(record.date.to_rfc3339())
    .bind(record.raw_data.to_string())
    .bind(active)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update item")?;

    Ok(result.rows_affected() > 0)
}

/// List items, newest first, optionally restricted to one source.
pub async fn list_items(pool: &SqlitePool, source: Option<Source>) -> Result<Vec<SocialStreamItem>> {
    match source {
        Some(source) => sqlx::query_as(
            "SELECT * FROM social_stream_items WHERE source = ? ORDER BY date DESC, id DESC",
        )
        .bind(source.as_str())
        .fetch_all(pool)
        .await
        .context("Failed to list items"),
        None => sqlx::query_as("SELECT * FROM social_stream_items ORDER BY date DESC, id DESC")
            .fetch_all(pool)
            .await
            .context("Failed to list items"),
    }
}

/// Count stored items.
pub async fn count_items(pool: &SqlitePool) -> Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM social_stream_items")
        .fetch_one(pool)
        .await
        .context("Failed to count items")?;

    Ok(row.0)
}
