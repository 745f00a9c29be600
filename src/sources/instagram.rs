use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use super::payload::{self, RawItem};
use super::traits::{FetchContext, SourceAdapter};
use crate::model::{PostRecord, Source, SourceType};
use crate::sanitize::{self, Linking};

/// Imports tagged media and the account's own media from the Instagram API.
///
/// Runs only with an access token, which the token manager resolves first.
pub struct InstagramSource;

impl InstagramSource {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for InstagramSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for InstagramSource {
    fn source(&self) -> Source {
        Source::Instagram
    }

    async fn fetch(&self, ctx: &FetchContext<'_>) -> Result<Vec<PostRecord>> {
        let settings = ctx.settings;
        let token = settings.instagram_access_token.as_str();
        if token.is_empty() {
            debug!("No Instagram access token, skipping");
            return Ok(Vec::new());
        }

        let base = ctx.config.instagram_api_base.trim_end_matches('/');
        let language = &ctx.config.default_language;
        let token = urlencoding::encode(token);
        let mut records = Vec::new();

        if !settings.instagram_username.is_empty() {
            for tag in &settings.instagram_tags {
                let url = format!(
                    "{base}/v1/tags/{}/media/recent?access_token={token}",
                    urlencoding::encode(tag)
                );
                let Some(response) = ctx.api.get_json(&url, None).await else {
                    continue;
                };

                let media = payload::items(response, Some("data"));
                debug!(tag = %tag, count = media.len(), "Fetched Instagram tag media");
                records.extend(media.into_iter().filter_map(|item| {
                    let own = item.str(&["user", "username"])
                        == Some(settings.instagram_username.as_str());
                    let source_type = if own { SourceType::Post } else { SourceType::Mention };
                    media_record(item, source_type, language)
                }));
            }
        }

        if !settings.instagram_user_id.is_empty() {
            let url = format!(
                "{base}/v1/users/{}/media/recent?access_token={token}",
                urlencoding::encode(&settings.instagram_user_id)
            );
            if let Some(response) = ctx.api.get_json(&url, None).await {
                let media = payload::items(response, Some("data"));
                debug!(count = media.len(), "Fetched Instagram user media");
                records.extend(
                    media
                        .into_iter()
                        .filter_map(|item| media_record(item, SourceType::Post, language)),
                );
            }
        }

        info!(count = records.len(), "Instagram fetch complete");
        Ok(records)
    }
}

/// Normalize one media item, or `None` when it has no id.
#[must_use]
pub fn media_record(item: RawItem, source_type: SourceType, language: &str) -> Option<PostRecord> {
    let id = item.id(&["id"])?;

    Some(PostRecord {
        source: Source::Instagram,
        source_id: id,
        source_type,
        language: language.to_string(),
        avatar: item.text(&["user", "profile_picture"]),
        username: item.text(&["user", "username"]),
        fullname: item.text(&["user", "full_name"]),
        content: sanitize::sanitize(item.str(&["caption", "text"]), Linking::BareUrls),
        image: item.text(&["images", "standard_resolution", "url"]),
        link: item.text(&["link"]),
        date: item
            .int(&["created_time"])
            .and_then(payload::from_unix)
            .unwrap_or_else(Utc::now),
        raw_data: item.into_value(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_media_record_fields() {
        let item = RawItem::from_value(json!({
            "id": "123_456",
            "created_time": "1279340983",
            "link": "https://instagram.com/p/abc/",
            "caption": {"text": "Sunset at https://example.com/beach #sunset"},
            "images": {"standard_resolution": {"url": "https://img.test/full.jpg"}},
            "user": {
                "username": "jane",
                "full_name": "Jane Doe",
                "profile_picture": "https://img.test/jane.jpg"
            }
        }))
        .unwrap();

        let record = media_record(item, SourceType::Mention, "nl").unwrap();
        assert_eq!(record.source_id, "123_456");
        assert_eq!(record.source_type, SourceType::Mention);
        assert_eq!(record.language, "nl");
        assert_eq!(record.username, "jane");
        assert_eq!(record.image, "https://img.test/full.jpg");
        assert_eq!(record.date.timestamp(), 1_279_340_983);
        assert_eq!(
            record.content,
            r#"Sunset at <a href="https://example.com/beach" target="_blank">https://example.com/beach</a> <span class="hashtag">#sunset</span>"#
        );
    }

    #[test]
    fn test_media_record_defaults() {
        let item = RawItem::from_value(json!({"id": "1", "caption": null})).unwrap();
        let record = media_record(item, SourceType::Post, "nl").unwrap();
        assert_eq!(record.content, "");
        assert_eq!(record.link, "");
        assert_eq!(record.avatar, "");
    }

    #[test]
    fn test_media_without_id_is_dropped() {
        let item = RawItem::from_value(json!({"link": "https://instagram.com/p/x"})).unwrap();
        assert!(media_record(item, SourceType::Post, "nl").is_none());
    }
}
