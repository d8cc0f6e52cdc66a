use super::response::{decode, ContentResponse};
use super::{ArticleSource, FeedQuery};
use crate::util::{validate_endpoint, UrlValidationError};
use futures::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Invalid API endpoint: {0}")]
    InvalidEndpoint(#[from] UrlValidationError),
}

impl ApiError {
    /// Returns true if this error is transient and the request may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Timeout(_) | ApiError::Network(_) => true,
            ApiError::HttpStatus(status) => *status >= 500 || *status == 429,
            ApiError::ResponseTooLarge(_) | ApiError::Encode(_) | ApiError::InvalidEndpoint(_) => {
                false
            }
        }
    }
}

/// Everything the client needs besides the HTTP connection pool.
#[derive(Clone)]
pub struct ClientSettings {
    /// Base URL of the backend, e.g. `https://backend2.gstv.in`.
    pub base_url: String,
    /// Path of the article detail endpoint relative to `base_url`.
    pub detail_path: String,
    pub user_id: String,
    pub device_id: String,
    pub token: Option<SecretString>,
    pub timeout: Duration,
}

impl std::fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSettings")
            .field("base_url", &self.base_url)
            .field("detail_path", &self.detail_path)
            .field("user_id", &self.user_id)
            .field("device_id", &self.device_id)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Serialize)]
struct RequestBody<'a> {
    #[serde(flatten)]
    query: &'a FeedQuery,
    user_id: &'a str,
    device_id: &'a str,
}

/// HTTP client for the article detail endpoint.
#[derive(Debug, Clone)]
pub struct ContentClient {
    http: reqwest::Client,
    endpoint: Url,
    settings: ClientSettings,
}

impl ContentClient {
    pub fn new(http: reqwest::Client, settings: ClientSettings) -> Result<Self, ApiError> {
        let base = validate_endpoint(&settings.base_url)?;
        let endpoint = base
            .join(settings.detail_path.trim_start_matches('/'))
            .map_err(UrlValidationError::from)?;

        tracing::debug!(endpoint = %endpoint, "Content client configured");

        Ok(Self {
            http,
            endpoint,
            settings,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Send one request. No retries here; callers decide the retry policy.
    pub async fn fetch_once(&self, query: &FeedQuery) -> Result<ContentResponse, ApiError> {
        let body = serde_json::to_vec(&RequestBody {
            query,
            user_id: &self.settings.user_id,
            device_id: &self.settings.device_id,
        })?;

        let mut request = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(body);

        if let Some(token) = &self.settings.token {
            if self.sends_credentials() {
                request = request.header(
                    AUTHORIZATION,
                    format!("Bearer {}", token.expose_secret()),
                );
            } else {
                tracing::debug!("Skipping API token for non-HTTPS endpoint");
            }
        }

        let timeout_secs = self.settings.timeout.as_secs();
        let started = std::time::Instant::now();
        let response = tokio::time::timeout(self.settings.timeout, request.send())
            .await
            .map_err(|_| ApiError::Timeout(timeout_secs))?
            .map_err(ApiError::Network)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                status = status.as_u16(),
                slug = %query.slug,
                "Content API returned error status"
            );
            return Err(ApiError::HttpStatus(status.as_u16()));
        }

        let bytes = read_limited_bytes(response, MAX_RESPONSE_SIZE).await?;
        let decoded = decode(&bytes);

        tracing::debug!(
            slug = %query.slug,
            excluded = query.loaded_slugs.split(',').filter(|s| !s.is_empty()).count(),
            articles = decoded.payload.articles().len(),
            related = decoded.related.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Content fetch complete"
        );

        Ok(decoded)
    }

    /// Bearer tokens go only over HTTPS, or to loopback for local testing.
    fn sends_credentials(&self) -> bool {
        self.endpoint.scheme() == "https"
            || matches!(
                self.endpoint.host_str(),
                Some("localhost") | Some("127.0.0.1") | Some("[::1]")
            )
    }
}

impl ArticleSource for ContentClient {
    async fn fetch(&self, query: &FeedQuery) -> Result<ContentResponse, ApiError> {
        self.fetch_once(query).await
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, ApiError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ApiError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::DetailPayload;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(base_url: &str) -> ClientSettings {
        ClientSettings {
            base_url: base_url.to_string(),
            detail_path: "/api/news-detail".to_string(),
            user_id: String::new(),
            device_id: "device-1".to_string(),
            token: None,
            timeout: Duration::from_secs(5),
        }
    }

    fn client(base_url: &str) -> ContentClient {
        ContentClient::new(reqwest::Client::new(), settings(base_url)).unwrap()
    }

    #[tokio::test]
    async fn test_posts_query_and_identity() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/news-detail"))
            .and(body_json(serde_json::json!({
                "slug": "",
                "user_id": "",
                "device_id": "device-1",
                "loadedSlugs": "a,b",
                "categoryIds": "3,9"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"newsDetail": [{"id": 3, "slug": "c"}]}"#),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let query = FeedQuery {
            slug: String::new(),
            loaded_slugs: "a,b".into(),
            category_ids: "3,9".into(),
        };
        let response = client(&mock_server.uri()).fetch(&query).await.unwrap();
        assert_eq!(response.payload.articles()[0].slug, "c");
    }

    #[tokio::test]
    async fn test_http_500_is_retryable_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        let err = client(&mock_server.uri())
            .fetch(&FeedQuery::article("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::HttpStatus(500)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_http_404_not_retryable() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server.uri())
            .fetch(&FeedQuery::article("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::HttpStatus(404)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_non_json_body_decodes_as_malformed() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&mock_server)
            .await;

        let response = client(&mock_server.uri())
            .fetch(&FeedQuery::default())
            .await
            .unwrap();
        assert_eq!(response.payload, DetailPayload::Malformed);
    }

    #[tokio::test]
    async fn test_oversized_response_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a".repeat(MAX_RESPONSE_SIZE + 1)))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server.uri())
            .fetch(&FeedQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ResponseTooLarge(_)));
    }

    #[tokio::test]
    async fn test_token_sent_to_loopback() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("Authorization", "Bearer t0ken"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data": []}"#))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut settings = settings(&mock_server.uri());
        settings.token = Some(SecretString::from("t0ken".to_string()));
        let client = ContentClient::new(reqwest::Client::new(), settings).unwrap();
        let response = client.fetch(&FeedQuery::default()).await.unwrap();
        assert!(response.payload.is_empty());
    }

    #[test]
    fn test_plain_http_remote_endpoint_rejected() {
        let result = ContentClient::new(reqwest::Client::new(), settings("http://api.example.com"));
        assert!(matches!(result, Err(ApiError::InvalidEndpoint(_))));
    }

    #[test]
    fn test_endpoint_joins_detail_path() {
        let client = client("https://backend.example.com/v2/");
        assert_eq!(
            client.endpoint().as_str(),
            "https://backend.example.com/v2/api/news-detail"
        );
    }

    #[test]
    fn test_debug_masks_token() {
        let mut settings = settings("https://backend.example.com");
        settings.token = Some(SecretString::from("super-secret".to_string()));
        let debug_output = format!("{:?}", settings);
        assert!(!debug_output.contains("super-secret"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
