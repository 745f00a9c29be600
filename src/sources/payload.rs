//! Uniform field access over decoded API payloads.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// One item of an API response, accessed by field path.
///
/// Path segments are object keys or array indices, so
/// `["entities", "media", "0", "media_url_https"]` reaches into arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct RawItem(Value);

impl RawItem {
    /// Wrap a JSON object. Anything else is not an item.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        value.is_object().then_some(Self(value))
    }

    #[must_use]
    pub fn value(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(&self.0, |current, segment| match current {
            Value::Object(map) => map.get(*segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    /// String value at `path`; `null` and non-strings are absent.
    #[must_use]
    pub fn str(&self, path: &[&str]) -> Option<&str> {
        self.value(path).and_then(Value::as_str)
    }

    /// String value at `path`, or empty.
    #[must_use]
    pub fn text(&self, path: &[&str]) -> String {
        self.str(path).unwrap_or_default().to_string()
    }

    /// Identifier at `path`, accepting non-empty strings and integers.
    #[must_use]
    pub fn id(&self, path: &[&str]) -> Option<String> {
        match self.value(path)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) if n.is_u64() || n.is_i64() => Some(n.to_string()),
            _ => None,
        }
    }

    /// Integer at `path`, accepting numeric strings.
    #[must_use]
    pub fn int(&self, path: &[&str]) -> Option<i64> {
        match self.value(path)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Items of a response: the array under `key`, or the top level when `key`
/// is `None`. Non-object entries are skipped.
#[must_use]
pub fn items(response: Value, key: Option<&str>) -> Vec<RawItem> {
    let list = match (response, key) {
        (Value::Array(list), None) => list,
        (Value::Object(mut map), Some(key)) => match map.remove(key) {
            Some(Value::Array(list)) => list,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    list.into_iter().filter_map(RawItem::from_value).collect()
}

/// Twitter's `Wed Aug 27 13:08:45 +0000 2008`.
#[must_use]
pub fn parse_twitter_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value, "%a %b %d %H:%M:%S %z %Y")
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Graph API's `2015-03-04T10:00:00+0000`, or plain RFC 3339.
#[must_use]
pub fn parse_offset_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z")
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .map(|d| d.with_timezone(&Utc))
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|d| d.and_utc())
        })
}

#[must_use]
pub fn from_unix(seconds: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0).single()
}

#[cfg(test)]
mod tests {
    use chrono::Datelike;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_path_access() {
        let item = RawItem::from_value(json!({
            "id": 42,
            "user": {"name": "Jane", "bio": null},
            "entities": {"media": [{"media_url_https": "https://img.test/1.jpg"}]}
        }))
        .unwrap();

        assert_eq!(item.id(&["id"]).as_deref(), Some("42"));
        assert_eq!(item.str(&["user", "name"]), Some("Jane"));
        assert_eq!(item.str(&["user", "bio"]), None);
        assert_eq!(item.text(&["user", "missing"]), "");
        assert_eq!(
            item.str(&["entities", "media", "0", "media_url_https"]),
            Some("https://img.test/1.jpg")
        );
        assert_eq!(item.str(&["entities", "media", "1", "media_url_https"]), None);
    }

    #[test]
    fn test_id_rejects_empty_and_non_scalar() {
        let item = RawItem::from_value(json!({"a": "", "b": {"x": 1}, "c": "17_23"})).unwrap();
        assert_eq!(item.id(&["a"]), None);
        assert_eq!(item.id(&["b"]), None);
        assert_eq!(item.id(&["c"]).as_deref(), Some("17_23"));
    }

    #[test]
    fn test_int_accepts_numeric_strings() {
        let item = RawItem::from_value(json!({"t": "1279340983", "n": 5, "x": "soon"})).unwrap();
        assert_eq!(item.int(&["t"]), Some(1_279_340_983));
        assert_eq!(item.int(&["n"]), Some(5));
        assert_eq!(item.int(&["x"]), None);
    }

    #[test]
    fn test_items() {
        assert_eq!(items(json!([{"id": 1}, 7, {"id": 2}]), None).len(), 2);
        assert_eq!(items(json!({"data": [{"id": 1}]}), Some("data")).len(), 1);
        assert!(items(json!({"error": "nope"}), Some("data")).is_empty());
        assert!(items(json!({"data": [{"id": 1}]}), None).is_empty());
    }

    #[test]
    fn test_parse_dates() {
        let twitter = parse_twitter_date("Wed Aug 27 13:08:45 +0000 2008").unwrap();
        assert_eq!(twitter.year(), 2008);

        let graph = parse_offset_date("2015-03-04T10:00:00+0100").unwrap();
        assert_eq!(graph.to_rfc3339(), "2015-03-04T09:00:00+00:00");

        assert!(parse_offset_date("2021-06-01T08:30:00Z").is_some());
        assert!(parse_offset_date("yesterday").is_none());
        assert_eq!(from_unix(0).unwrap().year(), 1970);
    }
}
