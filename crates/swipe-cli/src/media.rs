//! Media lookup transport: the [`MediaLookup`] seam and its HTTP client.

use std::fmt;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use swipe_core::{MediaPost, MediaQuery};

use crate::config::MediaConfig;

#[derive(Debug)]
pub enum MediaError {
    /// Connect failure, timeout, or an interrupted body.
    Transport(reqwest::Error),
    Status(u16),
    MalformedBody(String),
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::Transport(e) if e.is_timeout() => write!(f, "media lookup timed out: {e}"),
            MediaError::Transport(e) => write!(f, "media lookup failed: {e}"),
            MediaError::Status(code) => write!(f, "media lookup returned HTTP {code}"),
            MediaError::MalformedBody(msg) => write!(f, "malformed media response: {msg}"),
        }
    }
}

impl std::error::Error for MediaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MediaError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for MediaError {
    fn from(e: reqwest::Error) -> Self {
        MediaError::Transport(e)
    }
}

/// Anything that can turn a tag query into scored posts.
pub trait MediaLookup: Send + Sync {
    fn search<'a>(&'a self, query: &'a MediaQuery) -> BoxFuture<'a, Result<Vec<MediaPost>, MediaError>>;
}

/// Client for a booru-style `index.php?page=dapi&s=post&q=index&json=1` endpoint.
pub struct HttpMediaLookup {
    client: reqwest::Client,
    base_url: String,
    limit: usize,
}

impl HttpMediaLookup {
    pub fn new(config: &MediaConfig) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("swipe/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            limit: config.result_limit,
        })
    }

    async fn fetch(&self, query: &MediaQuery) -> Result<Vec<MediaPost>, MediaError> {
        let tags = query.tags_param();
        let limit = self.limit.to_string();
        tracing::debug!(tags = %tags, "fetching media");

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("page", "dapi"),
                ("s", "post"),
                ("q", "index"),
                ("json", "1"),
                ("limit", limit.as_str()),
                ("tags", tags.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        parse_posts(&body)
    }
}

impl MediaLookup for HttpMediaLookup {
    fn search<'a>(&'a self, query: &'a MediaQuery) -> BoxFuture<'a, Result<Vec<MediaPost>, MediaError>> {
        self.fetch(query).boxed()
    }
}

/// The service answers "no results" with an empty body rather than `[]`.
fn parse_posts(body: &str) -> Result<Vec<MediaPost>, MediaError> {
    let body = body.trim();
    if body.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(body).map_err(|e| MediaError::MalformedBody(e.to_string()))
}
