//! Text clean-up applied to every imported post.
//!
//! The pipeline is fixed: emoji removal, entity normalization, link markup
//! (Twitter URL entities or bare URL detection), then hashtag markup. It does
//! no I/O and never fails; missing text yields an empty string.

use regex::{Captures, Regex};

/// Pictographs, dingbats, enclosed and technical symbol blocks, each with an
/// optional trailing variation selector.
static EMOJI: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
    Regex::new(concat!(
        r"[0-9#]\x{FE0F}?\x{20E3}",
        r"|[\x{00A9}\x{00AE}\x{203C}\x{2047}-\x{2049}\x{2122}\x{2139}\x{3030}\x{303D}\x{3297}\x{3299}][\x{FE00}-\x{FEFF}]?",
        r"|[\x{2190}-\x{21FF}\x{2300}-\x{23FF}\x{2460}-\x{24FF}\x{25A0}-\x{25FF}\x{2600}-\x{27BF}",
        r"\x{2900}-\x{297F}\x{2B00}-\x{2BF0}\x{1F000}-\x{1F6FF}\x{1F900}-\x{1FAFF}][\x{FE00}-\x{FEFF}]?",
    ))
    .unwrap()
});

static ENTITY: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z][a-zA-Z0-9]*);").unwrap()
});

static BARE_URL: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
    Regex::new(r"https?://([-\w.]+[-\w])+(:\d+)?(/([\w/_.#-]*(\?\S+)?[^.\s])?)?").unwrap()
});

static HASHTAG: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"(^|\s)#(\w*[a-zA-Z_]+\w*)").unwrap());

/// A span of the original text to be replaced with link markup.
///
/// `start..end` is a half-open range of character (not byte) offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlEntity {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

/// How links inside the text are turned into markup.
#[derive(Debug, Clone, Copy)]
pub enum Linking<'a> {
    /// Splice source-provided entities into the text (Twitter).
    Entities(&'a [UrlEntity]),
    /// Detect bare URLs with a pattern match (Instagram, Facebook, YouTube).
    BareUrls,
}

/// Run the full sanitization pipeline.
///
/// Entity offsets are applied to the emoji-stripped, entity-normalized text
/// with nothing else in between.
#[must_use]
pub fn sanitize(text: Option<&str>, linking: Linking<'_>) -> String {
    let Some(text) = text else {
        return String::new();
    };

    let content = remove_emoji(text);
    let content = normalize_entities(&content);
    let content = match linking {
        Linking::Entities(entities) => splice_entities(&content, entities),
        Linking::BareUrls => link_bare_urls(&content),
    };

    mark_hashtags(&content)
}

/// Delete emoji and symbol characters.
#[must_use]
pub fn remove_emoji(text: &str) -> String {
    EMOJI.replace_all(text, "").into_owned()
}

/// Encode then decode HTML entities and drop leftover `&hellip;` sequences.
///
/// Stray `&`, `<` and `>` come out as plain characters and entities already
/// present in the text come out exactly as they went in, never double-encoded.
#[must_use]
pub fn normalize_entities(text: &str) -> String {
    decode_entities(&html_escape(text)).replace("&hellip;", "")
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Single-pass decode, so `&amp;lt;` becomes `&lt;` and not `<`.
fn decode_entities(s: &str) -> String {
    ENTITY
        .replace_all(s, |caps: &Captures<'_>| {
            decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn decode_entity(name: &str) -> Option<String> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }

    let decoded = match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        _ => return None,
    };
    Some(decoded.to_string())
}

/// Apply entities back to front, ordered by descending `start`.
///
/// Splicing front to back would shift the offsets of every later entity.
#[must_use]
pub fn splice_entities(content: &str, entities: &[UrlEntity]) -> String {
    let mut ordered: Vec<&UrlEntity> = entities.iter().collect();
    ordered.sort_by(|a, b| b.start.cmp(&a.start));

    ordered.into_iter().fold(content.to_string(), |acc, entity| {
        splice(&acc, entity.start, entity.end, &entity.replacement)
    })
}

/// Replace the characters in `start..end` with `replacement`.
///
/// Offsets past the end of the text are clamped to its length.
#[must_use]
pub fn splice(content: &str, start: usize, end: usize, replacement: &str) -> String {
    let start_byte = byte_offset(content, start);
    let end_byte = byte_offset(content, end.max(start));

    let mut out = String::with_capacity(content.len() + replacement.len());
    out.push_str(&content[..start_byte]);
    out.push_str(replacement);
    out.push_str(&content[end_byte..]);
    out
}

fn byte_offset(s: &str, char_index: usize) -> usize {
    s.char_indices().nth(char_index).map_or(s.len(), |(i, _)| i)
}

/// Wrap bare URLs in an anchor using the URL as both target and label.
#[must_use]
pub fn link_bare_urls(text: &str) -> String {
    BARE_URL
        .replace_all(text, r#"<a href="${0}" target="_blank">${0}</a>"#)
        .into_owned()
}

/// Wrap `#tag` runs at the start of the text or after whitespace in a span.
#[must_use]
pub fn mark_hashtags(text: &str) -> String {
    HASHTAG
        .replace_all(text, r#"${1}<span class="hashtag">#${2}</span>"#)
        .into_owned()
}

/// Anchor markup for a link entity.
#[must_use]
pub fn anchor(href: &str, label: &str) -> String {
    format!(r#"<a href="{href}" target="_blank">{}</a>"#, html_escape(label))
}
