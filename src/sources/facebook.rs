use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use super::payload::{self, RawItem};
use super::traits::{FetchContext, SourceAdapter};
use crate::model::{PostRecord, Source, SourceType};
use crate::sanitize::{self, Linking};

/// Imports a Facebook page feed using an app session.
pub struct FacebookSource;

impl FacebookSource {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for FacebookSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for FacebookSource {
    fn source(&self) -> Source {
        Source::Facebook
    }

    async fn fetch(&self, ctx: &FetchContext<'_>) -> Result<Vec<PostRecord>> {
        let s = ctx.settings;
        if s.facebook_app_id.is_empty() || s.facebook_app_secret.is_empty() || s.facebook_page.is_empty() {
            debug!("Facebook app or page missing, skipping");
            return Ok(Vec::new());
        }

        let graph = ctx.config.facebook_graph_base.trim_end_matches('/');
        let app_token = format!("{}|{}", s.facebook_app_id, s.facebook_app_secret);
        let token = urlencoding::encode(&app_token);

        let debug_url = format!("{graph}/debug_token?input_token={token}&access_token={token}");
        let validation = ctx.api.get_json(&debug_url, None).await;
        if !session_is_valid(validation.as_ref(), &s.facebook_app_id) {
            bail!("Facebook app session could not be validated");
        }

        let feed_url = format!(
            "{graph}/{}/feed?access_token={token}",
            urlencoding::encode(&s.facebook_page)
        );
        let Some(response) = ctx.api.get_json(&feed_url, None).await else {
            return Ok(Vec::new());
        };

        let language = &ctx.config.default_language;
        let records: Vec<PostRecord> = payload::items(response, Some("data"))
            .into_iter()
            .filter_map(|item| feed_record(item, &s.facebook_page, language))
            .collect();

        info!(count = records.len(), "Facebook fetch complete");
        Ok(records)
    }
}

/// A `debug_token` response is valid when `data.is_valid` is true and, if
/// present, `data.app_id` names our app.
fn session_is_valid(response: Option<&serde_json::Value>, app_id: &str) -> bool {
    let Some(data) = response.and_then(|r| r.get("data")) else {
        return false;
    };
    let valid = data.get("is_valid").and_then(serde_json::Value::as_bool) == Some(true);
    let app_matches = match data.get("app_id") {
        None | Some(serde_json::Value::Null) => true,
        Some(serde_json::Value::String(id)) => id == app_id,
        Some(serde_json::Value::Number(id)) => id.to_string() == app_id,
        Some(_) => false,
    };
    valid && app_matches
}

/// Normalize one feed post, or `None` when it has no id.
#[must_use]
pub fn feed_record(item: RawItem, page: &str, language: &str) -> Option<PostRecord> {
    let id = item.id(&["id"])?;
    let author = item.text(&["from", "name"]);
    let source_type = if page_matches(&author, page) {
        SourceType::Post
    } else {
        SourceType::Mention
    };
    let image = match (item.str(&["status_type"]), item.str(&["object_id"])) {
        (Some("added_photos"), Some(object_id)) if !object_id.is_empty() => {
            format!("https://graph.facebook.com/{object_id}/picture?type=normal")
        }
        _ => String::new(),
    };

    Some(PostRecord {
        source: Source::Facebook,
        source_type,
        language: language.to_string(),
        avatar: String::new(),
        fullname: author.clone(),
        username: author,
        content: sanitize::sanitize(item.str(&["message"]), Linking::BareUrls),
        image,
        link: item.text(&["link"]),
        date: item
            .str(&["created_time"])
            .and_then(payload::parse_offset_date)
            .unwrap_or_else(Utc::now),
        source_id: id,
        raw_data: item.into_value(),
    })
}

/// Whether a post author is the configured page itself.
///
/// The author name is folded to ASCII, stripped of whitespace and compared
/// case-insensitively. Names outside Latin-1 never match.
#[must_use]
pub fn page_matches(author: &str, page: &str) -> bool {
    let folded: String = fold_diacritics(author)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    !folded.is_empty() && folded.to_lowercase() == page.to_lowercase()
}

/// Replace accented Latin letters with an ASCII base using a fixed table.
///
/// `ü` and `Ð` have no entry and pass through unchanged.
#[must_use]
pub fn fold_diacritics(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        let folded = match c {
            'Š' => "S",
            'š' => "s",
            'Ž' => "Z",
            'ž' => "z",
            'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Æ' => "A",
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'æ' => "a",
            'Ç' => "C",
            'ç' => "c",
            'È' | 'É' | 'Ê' | 'Ë' => "E",
            'è' | 'é' | 'ê' | 'ë' => "e",
            'Ì' | 'Í' | 'Î' | 'Ï' => "I",
            'ì' | 'í' | 'î' | 'ï' => "i",
            'Ñ' => "N",
            'ñ' => "n",
            'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => "O",
            'ð' | 'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => "o",
            'Ù' | 'Ú' | 'Û' | 'Ü' => "U",
            'ù' | 'ú' | 'û' => "u",
            'Ý' => "Y",
            'ý' | 'ÿ' => "y",
            'Þ' => "B",
            'þ' => "b",
            'ß' => "Ss",
            _ => {
                out.push(c);
                continue;
            }
        };
        out.push_str(folded);
    }
    out
}
