use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{PostRecord, Source, SourceType, StoredPost};

/// A row of the `social_stream_items` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SocialStreamItem {
    pub id: i64,
    pub source: String,
    pub source_id: String,
    pub source_type: String,
    pub language: String,
    pub avatar: String,
    pub username: String,
    pub fullname: String,
    pub content: String,
    pub image: String,
    pub link: String,
    pub date: String,
    pub data: String,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl SocialStreamItem {
    /// Convert the row back into the canonical record.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored enum, date or payload cannot be parsed.
    pub fn into_stored(self) -> Result<StoredPost> {
        let source = Source::from_str(&self.source)
            .ok_or_else(|| anyhow!("unknown source '{}'", self.source))?;
        let source_type = SourceType::from_str(&self.source_type)
            .ok_or_else(|| anyhow!("unknown source type '{}'", self.source_type))?;
        let date = DateTime::parse_from_rfc3339(&self.date)
            .with_context(|| format!("invalid stored date '{}'", self.date))?
            .with_timezone(&Utc);
        let raw_data = serde_json::from_str(&self.data).context("invalid stored payload")?;

        Ok(StoredPost {
            id: Some(self.id),
            record: PostRecord {
                source,
                source_id: self.source_id,
                source_type,
                language: self.language,
                avatar: self.avatar,
                username: self.username,
                fullname: self.fullname,
                content: self.content,
                image: self.image,
                link: self.link,
                date,
                raw_data,
            },
            active: self.active,
        })
    }
}
