use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use super::payload::{self, RawItem};
use super::traits::{FetchContext, SourceAdapter};
use crate::model::{PostRecord, Source, SourceType};
use crate::sanitize::{self, Linking};

/// Imports the uploads of one YouTube channel.
pub struct YoutubeSource;

impl YoutubeSource {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for YoutubeSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for YoutubeSource {
    fn source(&self) -> Source {
        Source::Youtube
    }

    async fn fetch(&self, ctx: &FetchContext<'_>) -> Result<Vec<PostRecord>> {
        let username = ctx.settings.youtube_username.as_str();
        let api_key = ctx.settings.youtube_api_key.as_str();
        if username.is_empty() || api_key.is_empty() {
            debug!("YouTube channel or API key missing, skipping");
            return Ok(Vec::new());
        }

        let base = ctx.config.youtube_api_base.trim_end_matches('/');
        let key = urlencoding::encode(api_key);

        let channels_url = format!(
            "{base}/channels?part=contentDetails&forUsername={}&key={key}",
            urlencoding::encode(username)
        );
        let Some(playlist_id) = ctx
            .api
            .get_json(&channels_url, None)
            .await
            .and_then(uploads_playlist)
        else {
            debug!(username = %username, "No uploads playlist found");
            return Ok(Vec::new());
        };

        let items_url = format!(
            "{base}/playlistItems?part=snippet&playlistId={}&key={key}",
            urlencoding::encode(&playlist_id)
        );
        let Some(response) = ctx.api.get_json(&items_url, None).await else {
            return Ok(Vec::new());
        };

        let language = &ctx.config.default_language;
        let records: Vec<PostRecord> = payload::items(response, Some("items"))
            .into_iter()
            .filter_map(|item| video_record(item, username, language))
            .collect();

        info!(count = records.len(), "YouTube fetch complete");
        Ok(records)
    }
}

/// Uploads playlist id from a channels response.
fn uploads_playlist(response: serde_json::Value) -> Option<String> {
    payload::items(response, Some("items"))
        .first()?
        .id(&["contentDetails", "relatedPlaylists", "uploads"])
}

/// Normalize one playlist item. The channel name stands in for both user
/// fields since the payload carries no richer identity.
#[must_use]
pub fn video_record(item: RawItem, username: &str, language: &str) -> Option<PostRecord> {
    let id = item.id(&["snippet", "resourceId", "videoId"])?;

    Some(PostRecord {
        source: Source::Youtube,
        source_type: SourceType::Post,
        language: language.to_string(),
        avatar: String::new(),
        username: username.to_string(),
        fullname: username.to_string(),
        content: sanitize::sanitize(item.str(&["snippet", "description"]), Linking::BareUrls),
        image: item.text(&["snippet", "thumbnails", "high", "url"]),
        link: format!("https://www.youtube.com/watch?v={id}"),
        date: item
            .str(&["snippet", "publishedAt"])
            .and_then(payload::parse_offset_date)
            .unwrap_or_else(Utc::now),
        source_id: id,
        raw_data: item.into_value(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_uploads_playlist() {
        let response = json!({
            "items": [{"contentDetails": {"relatedPlaylists": {"uploads": "UU123"}}}]
        });
        assert_eq!(uploads_playlist(response).as_deref(), Some("UU123"));
        assert_eq!(uploads_playlist(json!({"items": []})), None);
        assert_eq!(uploads_playlist(json!({"error": {"code": 403}})), None);
    }

    #[test]
    fn test_video_record_fields() {
        let item = RawItem::from_value(json!({
            "snippet": {
                "publishedAt": "2018-03-01T09:30:00.000Z",
                "description": "New video &amp; more at https://example.com",
                "thumbnails": {"high": {"url": "https://i.ytimg.com/vi/abc/hq.jpg"}},
                "resourceId": {"kind": "youtube#video", "videoId": "abc"}
            }
        }))
        .unwrap();

        let record = video_record(item, "channel", "nl").unwrap();
        assert_eq!(record.source_id, "abc");
        assert_eq!(record.source_type, SourceType::Post);
        assert_eq!(record.username, "channel");
        assert_eq!(record.fullname, "channel");
        assert_eq!(record.avatar, "");
        assert_eq!(record.link, "https://www.youtube.com/watch?v=abc");
        assert_eq!(record.image, "https://i.ytimg.com/vi/abc/hq.jpg");
        assert_eq!(record.date.to_rfc3339(), "2018-03-01T09:30:00+00:00");
        assert_eq!(
            record.content,
            r#"New video &amp; more at <a href="https://example.com" target="_blank">https://example.com</a>"#
        );
    }

    #[test]
    fn test_video_without_id_is_dropped() {
        let item = RawItem::from_value(json!({"snippet": {"title": "private"}})).unwrap();
        assert!(video_record(item, "channel", "nl").is_none());
    }
}
