use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use serde_json::json;

use crate::assets::providers::{FetchError, ImageProvider, SpeechPayload, SpeechProvider};
use crate::foundation::error::{StoryreelError, StoryreelResult};

/// Default per-request timeout for upstream calls.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

fn build_client(timeout: Duration) -> StoryreelResult<Client> {
    Client::builder()
        .user_agent(concat!("storyreel/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(|e| StoryreelError::validation(format!("failed to build http client: {e}")))
}

fn transport(e: reqwest::Error) -> FetchError {
    FetchError::Network(e.to_string())
}

/// Parse a `Retry-After` header given in seconds.
fn retry_after(resp: &Response) -> Option<Duration> {
    resp.headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Pass successful responses through and classify the rest.
async fn check(resp: Response) -> Result<Response, FetchError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let wait = retry_after(&resp);
    let body = resp.text().await.unwrap_or_default();
    Err(FetchError::from_status(status.as_u16(), wait, &body))
}

/// Image search over HTTP: a JSON search endpoint followed by a download.
///
/// The search is `GET {search_url}?{query_param}={keyword}`; `url_pointer` is a JSON pointer
/// (RFC 6901) selecting the image URL in the response.
#[derive(Clone, Debug)]
pub struct HttpImageProvider {
    client: Client,
    search_url: String,
    query_param: String,
    url_pointer: String,
    api_key: Option<String>,
}

impl HttpImageProvider {
    /// Create a provider for a search endpoint.
    pub fn new(
        search_url: impl Into<String>,
        url_pointer: impl Into<String>,
        api_key: Option<String>,
    ) -> StoryreelResult<Self> {
        Ok(Self {
            client: build_client(DEFAULT_HTTP_TIMEOUT)?,
            search_url: search_url.into(),
            query_param: "query".to_string(),
            url_pointer: url_pointer.into(),
            api_key,
        })
    }

    /// Override the query parameter name (default `query`).
    pub fn with_query_param(mut self, name: impl Into<String>) -> Self {
        self.query_param = name.into();
        self
    }

    /// Pick the image URL out of a search response.
    pub fn select_url(&self, body: &serde_json::Value) -> Result<String, FetchError> {
        body.pointer(&self.url_pointer)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| FetchError::Rejected {
                status: 404,
                message: format!("search response has no string at '{}'", self.url_pointer),
            })
    }
}

#[async_trait]
impl ImageProvider for HttpImageProvider {
    async fn fetch_image(&self, keyword: &str) -> Result<Vec<u8>, FetchError> {
        let mut req = self
            .client
            .get(&self.search_url)
            .query(&[(self.query_param.as_str(), keyword)]);
        if let Some(key) = &self.api_key {
            req = req.header(AUTHORIZATION, key);
        }
        let resp = check(req.send().await.map_err(transport)?).await?;
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| FetchError::Undecodable(format!("search response: {e}")))?;
        let url = self.select_url(&body)?;

        let resp = check(self.client.get(&url).send().await.map_err(transport)?).await?;
        let bytes = resp.bytes().await.map_err(transport)?;
        Ok(bytes.to_vec())
    }
}

/// Text-to-speech over HTTP: `POST {url}` with `{"text", "voice"}`, audio bytes back.
///
/// `204 No Content` or an empty body means the upstream chose silence.
#[derive(Clone, Debug)]
pub struct HttpSpeechProvider {
    client: Client,
    url: String,
    voice: String,
    api_key: Option<String>,
}

impl HttpSpeechProvider {
    /// Create a provider for a synthesis endpoint.
    pub fn new(
        url: impl Into<String>,
        voice: impl Into<String>,
        api_key: Option<String>,
    ) -> StoryreelResult<Self> {
        Ok(Self {
            client: build_client(DEFAULT_HTTP_TIMEOUT)?,
            url: url.into(),
            voice: voice.into(),
            api_key,
        })
    }
}

#[async_trait]
impl SpeechProvider for HttpSpeechProvider {
    async fn synthesize(&self, text: &str) -> Result<SpeechPayload, FetchError> {
        let mut req = self
            .client
            .post(&self.url)
            .json(&json!({ "text": text, "voice": self.voice }));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = check(req.send().await.map_err(transport)?).await?;
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(SpeechPayload::Silence);
        }
        let bytes = resp.bytes().await.map_err(transport)?;
        if bytes.is_empty() {
            return Ok(SpeechPayload::Silence);
        }
        Ok(SpeechPayload::Encoded(bytes.to_vec()))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/http.rs"]
mod tests;
