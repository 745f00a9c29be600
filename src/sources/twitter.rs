use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use super::payload::{self, RawItem};
use super::traits::{FetchContext, SourceAdapter};
use crate::model::{PostRecord, Source, SourceType};
use crate::oauth1::{self, Credentials};
use crate::sanitize::{self, Linking, UrlEntity};

/// Imports user timelines and search results from the Twitter v1.1 API.
pub struct TwitterSource;

impl TwitterSource {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for TwitterSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for TwitterSource {
    fn source(&self) -> Source {
        Source::Twitter
    }

    async fn fetch(&self, ctx: &FetchContext<'_>) -> Result<Vec<PostRecord>> {
        let Some(credentials) = credentials(ctx) else {
            debug!("Twitter credentials incomplete, skipping");
            return Ok(Vec::new());
        };

        let base = ctx.config.twitter_api_base.trim_end_matches('/');
        let language = &ctx.config.default_language;
        let mut records = Vec::new();

        let timeline_url = format!("{base}/statuses/user_timeline.json");
        for username in &ctx.settings.twitter_usernames {
            let Some(response) =
                signed_get(ctx, &credentials, &timeline_url, &[("screen_name", username.as_str())]).await
            else {
                continue;
            };

            let tweets = payload::items(response, None);
            debug!(username = %username, count = tweets.len(), "Fetched Twitter timeline");
            records.extend(
                tweets
                    .into_iter()
                    .filter_map(|tweet| tweet_record(tweet, None, language)),
            );
        }

        if !ctx.settings.twitter_search_terms.is_empty() {
            let query = ctx.settings.twitter_search_terms.join(" OR ");
            let search_url = format!("{base}/search/tweets.json");

            if let Some(response) = signed_get(ctx, &credentials, &search_url, &[("q", query.as_str())]).await {
                let tweets = payload::items(response, Some("statuses"));
                debug!(query = %query, count = tweets.len(), "Fetched Twitter search results");
                records.extend(
                    tweets
                        .into_iter()
                        .filter_map(|tweet| tweet_record(tweet, Some(SourceType::Mention), language)),
                );
            }
        }

        info!(count = records.len(), "Twitter fetch complete");
        Ok(records)
    }
}

/// All four OAuth credentials, or `None` if any is missing.
fn credentials(ctx: &FetchContext<'_>) -> Option<Credentials> {
    let s = ctx.settings;
    let all = [
        &s.twitter_token,
        &s.twitter_token_secret,
        &s.twitter_consumer_key,
        &s.twitter_consumer_secret,
    ];
    if all.iter().any(|v| v.is_empty()) {
        return None;
    }

    Some(Credentials {
        consumer_key: s.twitter_consumer_key.clone(),
        consumer_secret: s.twitter_consumer_secret.clone(),
        token: s.twitter_token.clone(),
        token_secret: s.twitter_token_secret.clone(),
    })
}

async fn signed_get(
    ctx: &FetchContext<'_>,
    credentials: &Credentials,
    url: &str,
    params: &[(&str, &str)],
) -> Option<Value> {
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    let full_url = format!("{url}?{query}");

    let header = oauth1::authorization_header(credentials, "GET", url, params);
    ctx.api.get_json(&full_url, Some(&header)).await
}

/// Classify a tweet. Search results are always mentions.
#[must_use]
pub fn source_type(tweet: &RawItem, forced: Option<SourceType>) -> SourceType {
    if let Some(forced) = forced {
        return forced;
    }
    if matches!(tweet.value(&["retweeted_status"]), Some(Value::Object(_) | Value::Array(_))) {
        return SourceType::Share;
    }
    if tweet
        .str(&["in_reply_to_screen_name"])
        .is_some_and(|name| !name.is_empty())
    {
        return SourceType::Reply;
    }
    SourceType::Post
}

/// URL entities with anchor markup built from their expanded and display URLs.
fn url_entities(tweet: &RawItem) -> Vec<UrlEntity> {
    let Some(Value::Array(urls)) = tweet.value(&["entities", "urls"]) else {
        return Vec::new();
    };

    urls.iter()
        .filter_map(|entity| {
            let indices = entity.get("indices")?.as_array()?;
            let start = usize::try_from(indices.first()?.as_u64()?).ok()?;
            let end = usize::try_from(indices.get(1)?.as_u64()?).ok()?;
            let expanded = entity
                .get("expanded_url")
                .and_then(Value::as_str)
                .or_else(|| entity.get("url").and_then(Value::as_str))
                .unwrap_or_default();
            let display = entity
                .get("display_url")
                .and_then(Value::as_str)
                .unwrap_or(expanded);

            Some(UrlEntity {
                start,
                end,
                replacement: sanitize::anchor(expanded, display),
            })
        })
        .collect()
}

/// Normalize one tweet, or `None` when it has no id.
#[must_use]
pub fn tweet_record(tweet: RawItem, forced: Option<SourceType>, language: &str) -> Option<PostRecord> {
    let id = tweet.id(&["id"]).or_else(|| tweet.id(&["id_str"]))?;
    let username = tweet.text(&["user", "screen_name"]);
    let link = if username.is_empty() {
        format!("https://twitter.com/i/web/status/{id}")
    } else {
        format!("https://twitter.com/{username}/status/{id}")
    };
    let entities = url_entities(&tweet);

    Some(PostRecord {
        source: Source::Twitter,
        source_type: source_type(&tweet, forced),
        language: tweet.str(&["lang"]).unwrap_or(language).to_string(),
        avatar: tweet.text(&["user", "profile_image_url_https"]),
        fullname: tweet.text(&["user", "name"]),
        content: sanitize::sanitize(tweet.str(&["text"]), Linking::Entities(&entities)),
        image: tweet.text(&["entities", "media", "0", "media_url_https"]),
        date: tweet
            .str(&["created_at"])
            .and_then(payload::parse_twitter_date)
            .unwrap_or_else(Utc::now),
        source_id: id,
        username,
        link,
        raw_data: tweet.into_value(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn item(value: Value) -> RawItem {
        RawItem::from_value(value).unwrap()
    }

    #[test]
    fn test_source_type_table() {
        let retweet = item(json!({"id": 1, "retweeted_status": {"id": 2}}));
        let reply = item(json!({"id": 1, "in_reply_to_screen_name": "someone"}));
        let both = item(json!({
            "id": 1,
            "retweeted_status": {"id": 2},
            "in_reply_to_screen_name": "someone"
        }));
        let plain = item(json!({"id": 1, "in_reply_to_screen_name": null}));
        let empty_reply = item(json!({"id": 1, "in_reply_to_screen_name": ""}));
        let scalar_retweet = item(json!({"id": 1, "retweeted_status": "yes"}));
        let array_retweet = item(json!({"id": 1, "retweeted_status": [{"id": 2}]}));

        assert_eq!(source_type(&retweet, None), SourceType::Share);
        assert_eq!(source_type(&reply, None), SourceType::Reply);
        assert_eq!(source_type(&both, None), SourceType::Share);
        assert_eq!(source_type(&plain, None), SourceType::Post);
        assert_eq!(source_type(&empty_reply, None), SourceType::Post);
        assert_eq!(source_type(&scalar_retweet, None), SourceType::Post);
        assert_eq!(source_type(&array_retweet, None), SourceType::Share);

        for tweet in [&retweet, &reply, &both, &plain] {
            assert_eq!(source_type(tweet, Some(SourceType::Mention)), SourceType::Mention);
        }
    }

    #[test]
    fn test_tweet_record_fields() {
        let tweet = item(json!({
            "id": 42,
            "text": "Hello #world https://t.co/xyz",
            "lang": "en",
            "created_at": "Wed Aug 27 13:08:45 +0000 2008",
            "user": {
                "name": "Jane Doe",
                "screen_name": "jane",
                "profile_image_url_https": "https://img.test/jane.png"
            },
            "entities": {
                "urls": [{
                    "indices": [13, 29],
                    "expanded_url": "https://example.com/article",
                    "display_url": "example.com/article"
                }],
                "media": [{"media_url_https": "https://img.test/media.jpg"}]
            }
        }));

        let record = tweet_record(tweet, None, "nl").unwrap();
        assert_eq!(record.source_id, "42");
        assert_eq!(record.source_type, SourceType::Post);
        assert_eq!(record.language, "en");
        assert_eq!(record.username, "jane");
        assert_eq!(record.fullname, "Jane Doe");
        assert_eq!(record.avatar, "https://img.test/jane.png");
        assert_eq!(record.image, "https://img.test/media.jpg");
        assert_eq!(record.link, "https://twitter.com/jane/status/42");
        assert_eq!(record.date.to_rfc3339(), "2008-08-27T13:08:45+00:00");
        assert_eq!(
            record.content,
            r#"Hello <span class="hashtag">#world</span> <a href="https://example.com/article" target="_blank">example.com/article</a>"#
        );
        assert_eq!(record.raw_data["id"], 42);
    }

    #[test]
    fn test_tweet_record_defaults() {
        let record = tweet_record(item(json!({"id_str": "7"})), None, "nl").unwrap();
        assert_eq!(record.source_id, "7");
        assert_eq!(record.language, "nl");
        assert_eq!(record.content, "");
        assert_eq!(record.username, "");
        assert_eq!(record.link, "https://twitter.com/i/web/status/7");
    }

    #[test]
    fn test_tweet_without_id_is_dropped() {
        assert!(tweet_record(item(json!({"text": "orphan"})), None, "nl").is_none());
    }
}
