//! Canonical post record shared by every source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Social network a post was imported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Twitter,
    Instagram,
    Youtube,
    Facebook,
}

impl Source {
    /// Import order used by every run.
    pub const ALL: [Self; 4] = [Self::Twitter, Self::Instagram, Self::Youtube, Self::Facebook];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Twitter => "twitter",
            Self::Instagram => "instagram",
            Self::Youtube => "youtube",
            Self::Facebook => "facebook",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "twitter" => Some(Self::Twitter),
            "instagram" => Some(Self::Instagram),
            "youtube" => Some(Self::Youtube),
            "facebook" => Some(Self::Facebook),
            _ => None,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a post relates to the configured account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Post,
    Share,
    Reply,
    Mention,
}

impl SourceType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Share => "share",
            Self::Reply => "reply",
            Self::Mention => "mention",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "post" => Some(Self::Post),
            "share" => Some(Self::Share),
            "reply" => Some(Self::Reply),
            "mention" => Some(Self::Mention),
            _ => None,
        }
    }
}

/// A post normalized from any source.
///
/// `(source, source_id)` identifies one logical post across runs.
/// `content` is always sanitized markup, never the raw payload text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub source: Source,
    pub source_id: String,
    pub source_type: SourceType,
    pub language: String,
    pub avatar: String,
    pub username: String,
    pub fullname: String,
    pub content: String,
    pub image: String,
    pub link: String,
    pub date: DateTime<Utc>,
    /// Copy of the source payload, kept for debugging.
    pub raw_data: serde_json::Value,
}

/// A record as held by the record store.
///
/// `id` is `None` for records that have not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPost {
    pub id: Option<i64>,
    pub record: PostRecord,
    pub active: bool,
}
