use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

/// Keys that map onto typed fields. Everything else lands in `extra`.
const ID_KEYS: &[&str] = &["id", "news_id"];
const SLUG_KEYS: &[&str] = &["slug", "news_slug"];
const CATEGORY_ID_KEYS: &[&str] = &["category_ids", "categoryIds", "category_id", "categories"];
const TITLE_KEYS: &[&str] = &["title", "news_title", "name"];
const SUB_TITLE_KEYS: &[&str] = &["sub_title", "subTitle", "short_description", "excerpt"];
const BODY_KEYS: &[&str] = &["description", "content", "body"];
const IMAGE_KEYS: &[&str] = &["featureImage", "feature_image", "image", "thumbnail"];
const CATEGORY_SLUG_KEYS: &[&str] = &["category_slug", "categorySlug", "category"];
const PUBLISHED_KEYS: &[&str] = &["published_at", "publish_date", "created_at"];

/// A news article as returned by the content API.
///
/// Only `id` and `slug` carry meaning for the feed. Display fields are decoded
/// when present and every unrecognised key is preserved in `extra`.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: i64,
    pub slug: String,
    pub category_ids: Vec<i64>,
    pub title: String,
    pub sub_title: Option<String>,
    pub body: Option<String>,
    pub image: Option<String>,
    pub category_slug: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub extra: Map<String, Value>,
}

impl Article {
    /// Minimal article, mostly useful for tests and fixtures.
    pub fn new(id: i64, slug: impl Into<String>) -> Self {
        Self {
            id,
            slug: slug.into(),
            category_ids: Vec::new(),
            title: String::new(),
            sub_title: None,
            body: None,
            image: None,
            category_slug: None,
            published_at: None,
            extra: Map::new(),
        }
    }

    pub fn with_categories(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.category_ids = ids.into_iter().collect();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Decode one article object.
    ///
    /// Returns `None` when the object has no usable id or slug; the caller
    /// counts those as skipped rather than failing the whole response.
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let id = first(object, ID_KEYS).and_then(as_i64)?;
        let slug = first(object, SLUG_KEYS)
            .and_then(as_text)
            .filter(|s| !s.is_empty())?;

        let category_ids = first(object, CATEGORY_ID_KEYS)
            .map(parse_category_ids)
            .unwrap_or_default();

        let extra = object
            .iter()
            .filter(|(k, _)| !is_known_key(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Some(Self {
            id,
            slug,
            category_ids,
            title: first(object, TITLE_KEYS).and_then(as_text).unwrap_or_default(),
            sub_title: first(object, SUB_TITLE_KEYS).and_then(as_text),
            body: first(object, BODY_KEYS).and_then(as_text),
            image: first(object, IMAGE_KEYS).and_then(as_text),
            category_slug: first(object, CATEGORY_SLUG_KEYS).and_then(as_text),
            published_at: first(object, PUBLISHED_KEYS)
                .and_then(Value::as_str)
                .and_then(parse_timestamp),
            extra,
        })
    }

    /// Category ids joined the way the API expects them (`"3,9"`).
    pub fn category_ids_joined(&self) -> String {
        join_ids(&self.category_ids)
    }
}

pub(crate) fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn is_known_key(key: &str) -> bool {
    [
        ID_KEYS,
        SLUG_KEYS,
        CATEGORY_ID_KEYS,
        TITLE_KEYS,
        SUB_TITLE_KEYS,
        BODY_KEYS,
        IMAGE_KEYS,
        CATEGORY_SLUG_KEYS,
        PUBLISHED_KEYS,
    ]
    .iter()
    .any(|keys| keys.contains(&key))
}

/// First present, non-null value among `keys`.
fn first<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| object.get(*k))
        .find(|v| !v.is_null())
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Category ids arrive as `[3, 9]`, `["3", "9"]`, `"3,9"`, `3`, or
/// `[{"id": 3}, ...]` depending on the endpoint.
fn parse_category_ids(value: &Value) -> Vec<i64> {
    let mut ids: Vec<i64> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(obj) => obj.get("id").and_then(as_i64),
                other => as_i64(other),
            })
            .collect(),
        Value::String(s) => s
            .split(',')
            .filter_map(|part| part.trim().parse().ok())
            .collect(),
        Value::Number(n) => n.as_i64().into_iter().collect(),
        _ => Vec::new(),
    };
    // Keep first occurrence order
    let mut seen = std::collections::HashSet::new();
    ids.retain(|id| seen.insert(*id));
    ids
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
