use super::article::Article;
use serde_json::Value;
use std::collections::HashSet;

const DETAIL_KEY: &str = "newsDetail";
const DATA_KEY: &str = "data";
const RELATED_KEYS: &[&str] = &["relatednews", "relatedNewsIddata"];

/// The article payload of a content response, resolved once at the API boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum DetailPayload {
    /// `newsDetail` held a single object.
    Single(Article),
    /// `newsDetail` held an array.
    List(Vec<Article>),
    /// No `newsDetail`; articles came from a `data` array.
    Data(Vec<Article>),
    /// None of the accepted shapes matched. Treated as zero articles.
    Malformed,
}

impl DetailPayload {
    /// Articles in backend order.
    pub fn articles(&self) -> &[Article] {
        match self {
            DetailPayload::Single(article) => std::slice::from_ref(article),
            DetailPayload::List(articles) | DetailPayload::Data(articles) => articles,
            DetailPayload::Malformed => &[],
        }
    }

    pub fn into_articles(self) -> Vec<Article> {
        match self {
            DetailPayload::Single(article) => vec![article],
            DetailPayload::List(articles) | DetailPayload::Data(articles) => articles,
            DetailPayload::Malformed => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.articles().is_empty()
    }
}

/// A decoded content response.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentResponse {
    pub payload: DetailPayload,
    /// Related-news inserts, deduplicated by id. Display only.
    pub related: Vec<Article>,
    /// Entries dropped because they lacked an id or slug.
    pub skipped: usize,
}

impl ContentResponse {
    pub fn new(payload: DetailPayload) -> Self {
        Self {
            payload,
            related: Vec::new(),
            skipped: 0,
        }
    }

    pub fn with_related(mut self, related: Vec<Article>) -> Self {
        self.related = related;
        self
    }
}

/// Decode a response body. Never fails: anything unrecognisable becomes
/// [`DetailPayload::Malformed`].
pub fn decode(bytes: &[u8]) -> ContentResponse {
    let value: Value = match serde_json::from_slice(bytes) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, len = bytes.len(), "Content response is not valid JSON");
            return ContentResponse::new(DetailPayload::Malformed);
        }
    };
    decode_value(&value)
}

fn decode_value(value: &Value) -> ContentResponse {
    let Some(root) = value.as_object() else {
        return ContentResponse::new(DetailPayload::Malformed);
    };

    // Some endpoints wrap everything in {"data": {...}}
    if !root.contains_key(DETAIL_KEY) {
        if let Some(inner @ Value::Object(obj)) = root.get(DATA_KEY) {
            if obj.contains_key(DETAIL_KEY) {
                return decode_value(inner);
            }
        }
    }

    let mut skipped = 0;
    let payload = match (root.get(DETAIL_KEY), root.get(DATA_KEY)) {
        (Some(detail @ Value::Object(_)), _) => match Article::from_json(detail) {
            Some(article) => DetailPayload::Single(article),
            None => {
                skipped += 1;
                DetailPayload::Malformed
            }
        },
        (Some(Value::Array(items)), _) => DetailPayload::List(decode_list(items, &mut skipped)),
        (_, Some(Value::Array(items))) => DetailPayload::Data(decode_list(items, &mut skipped)),
        _ => DetailPayload::Malformed,
    };

    let related = decode_related(root);

    if skipped > 0 {
        tracing::warn!(skipped, "Dropped articles without id or slug");
    }

    ContentResponse {
        payload,
        related,
        skipped,
    }
}

fn decode_list(items: &[Value], skipped: &mut usize) -> Vec<Article> {
    items
        .iter()
        .filter_map(|item| {
            let article = Article::from_json(item);
            if article.is_none() {
                *skipped += 1;
            }
            article
        })
        .collect()
}

fn decode_related(root: &serde_json::Map<String, Value>) -> Vec<Article> {
    let mut seen = HashSet::new();
    RELATED_KEYS
        .iter()
        .filter_map(|key| root.get(*key).and_then(Value::as_array))
        .flatten()
        .filter_map(Article::from_json)
        .filter(|article| seen.insert(article.id))
        .collect()
}
