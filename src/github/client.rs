//! HTTP client for the GitHub contents API
//!
//! [`ContentSource`] is the seam between the mirror engine and the network:
//! the engine only ever lists directories and fetches file bytes through it.
//! [`GitHubClient`] is the production implementation built on a single shared
//! `reqwest::Client`; tests either point it at a mock server or replace it
//! entirely with an in-memory source.

use super::clock::{Clock, SystemClock};
use crate::config::HttpConfig;
use crate::error::{Error, Result};
use crate::types::{DownloadTarget, Entry, Event, Repository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use url::Url;

/// Shortest wait after a rate-limit response, so a reset instant already in
/// the past does not turn the wait loop into a busy loop
const RATE_LIMIT_MIN_WAIT: Duration = Duration::from_secs(1);

/// Remote tree access used by the mirror engine
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// List the entries of directory `path` ("" = repository root) of `target`
    async fn list_contents(&self, target: &DownloadTarget, path: &str) -> Result<Vec<Entry>>;

    /// Fetch the raw bytes behind a content locator
    async fn fetch_file(&self, url: &str) -> Result<Vec<u8>>;
}

/// The contents endpoint answers with an array for directories and with a
/// single object when the path names a file
#[derive(Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Listing(Vec<Entry>),
    Single(Entry),
}

/// Production [`ContentSource`] talking to the GitHub REST API
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: Url,
    token: Option<String>,
    clock: Arc<dyn Clock>,
    event_tx: Option<broadcast::Sender<Event>>,
}

impl GitHubClient {
    /// Build a client from transport settings and an optional token
    pub fn new(config: &HttpConfig, token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()?;

        let api_base = Url::parse(&config.api_base_url)
            .map_err(|e| Error::config("http.api_base_url", e.to_string()))?;
        if api_base.cannot_be_a_base() {
            return Err(Error::config("http.api_base_url", "cannot be used as a base URL"));
        }

        Ok(Self {
            http,
            api_base,
            token,
            clock: Arc::new(SystemClock),
            event_tx: None,
        })
    }

    /// Replace the clock used for rate-limit waits
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publish [`Event::RateLimited`] on this channel while waiting
    pub fn with_event_sender(mut self, event_tx: broadcast::Sender<Event>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Build an API URL from path segments; each segment is percent-encoded
    fn api_url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Contents endpoint URL for `path` at `branch`
    ///
    /// An empty branch omits `ref`, which selects the repository's default branch.
    pub fn contents_url(&self, target: &DownloadTarget, path: &str) -> Url {
        let segments = ["repos", target.owner.as_str(), target.repo.as_str(), "contents"]
            .into_iter()
            .chain(path.split('/').filter(|s| !s.is_empty()));
        let mut url = self.api_url(segments);
        if !target.branch.is_empty() {
            url.query_pairs_mut().append_pair("ref", &target.branch);
        }
        url
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(ref token) = self.token {
            request = request.header(reqwest::header::AUTHORIZATION, format!("token {token}"));
        }
        request
    }

    /// GET a JSON API URL, waiting out rate limits for as long as the server asks
    async fn get_api(&self, url: &Url) -> Result<String> {
        loop {
            let response = self.get(url.as_str()).send().await?;
            let status = response.status();

            if is_rate_limited(status, response.headers()) {
                let Some(wait) = rate_limit_wait(response.headers(), self.clock.now()) else {
                    return Err(Error::RateLimited);
                };
                tracing::warn!(
                    url = %url,
                    wait_secs = wait.as_secs(),
                    "rate limit exceeded, waiting for reset"
                );
                if let Some(ref tx) = self.event_tx {
                    let _ = tx.send(Event::RateLimited {
                        wait_secs: wait.as_secs(),
                    });
                }
                self.clock.sleep(wait).await;
                continue;
            }

            if status != StatusCode::OK {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Api {
                    status: status.as_u16(),
                    body,
                });
            }

            return Ok(response.text().await?);
        }
    }

    /// Repositories of an organization, or of a user if no such organization
    pub async fn list_repositories(&self, owner: &str) -> Result<Vec<Repository>> {
        let mut org_url = self.api_url(["orgs", owner, "repos"]);
        org_url.query_pairs_mut().append_pair("per_page", "100");

        match self.get_api(&org_url).await {
            Ok(body) => Ok(serde_json::from_str(&body)?),
            Err(Error::Api { status: 404, .. }) => {
                tracing::debug!(owner, "not an organization, trying user repositories");
                let mut user_url = self.api_url(["users", owner, "repos"]);
                user_url.query_pairs_mut().append_pair("per_page", "100");
                let body = self.get_api(&user_url).await?;
                Ok(serde_json::from_str(&body)?)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ContentSource for GitHubClient {
    async fn list_contents(&self, target: &DownloadTarget, path: &str) -> Result<Vec<Entry>> {
        let url = self.contents_url(target, path);
        tracing::debug!(url = %url, "listing directory");

        let body = self.get_api(&url).await?;
        match serde_json::from_str::<ContentsResponse>(&body)? {
            ContentsResponse::Listing(entries) => Ok(entries),
            ContentsResponse::Single(entry) => Ok(vec![entry]),
        }
    }

    async fn fetch_file(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// 429 always means rate limited; 403 only when the quota is exhausted or
/// the server asks us to back off
fn is_rate_limited(status: StatusCode, headers: &HeaderMap) -> bool {
    match status {
        StatusCode::TOO_MANY_REQUESTS => true,
        StatusCode::FORBIDDEN => {
            header_str(headers, "x-ratelimit-remaining") == Some("0")
                || headers.contains_key(reqwest::header::RETRY_AFTER)
        }
        _ => false,
    }
}

/// How long to wait before retrying a rate-limited call
///
/// `Retry-After` (seconds) takes precedence. Otherwise `X-RateLimit-Reset`
/// is read as the Unix epoch second at which the quota resets. Returns `None`
/// when neither header is usable.
pub fn rate_limit_wait(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    if let Some(secs) = header_str(headers, "retry-after").and_then(|v| v.parse::<u64>().ok()) {
        return Some(Duration::from_secs(secs).max(RATE_LIMIT_MIN_WAIT));
    }

    let reset_epoch = header_str(headers, "x-ratelimit-reset")?
        .parse::<i64>()
        .ok()?;
    let reset_at = DateTime::from_timestamp(reset_epoch, 0)?;
    let wait = (reset_at - now).to_std().unwrap_or(Duration::ZERO);
    Some(wait.max(RATE_LIMIT_MIN_WAIT))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    fn at(epoch: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(epoch, 0).unwrap()
    }

    fn target() -> DownloadTarget {
        DownloadTarget {
            owner: "octo".to_string(),
            repo: "hello world".to_string(),
            branch: "feature/x".to_string(),
            path: String::new(),
            local_dir: "out".into(),
        }
    }

    #[test]
    fn reset_header_is_an_absolute_instant() {
        let h = headers(&[("x-ratelimit-reset", "1700000120")]);
        assert_eq!(
            rate_limit_wait(&h, at(1_700_000_000)),
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    fn reset_in_the_past_waits_the_minimum() {
        let h = headers(&[("x-ratelimit-reset", "1699999000")]);
        assert_eq!(
            rate_limit_wait(&h, at(1_700_000_000)),
            Some(RATE_LIMIT_MIN_WAIT)
        );
    }

    #[test]
    fn retry_after_takes_precedence() {
        let h = headers(&[("retry-after", "30"), ("x-ratelimit-reset", "1700009999")]);
        assert_eq!(
            rate_limit_wait(&h, at(1_700_000_000)),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn missing_or_garbage_headers_give_no_wait() {
        assert_eq!(rate_limit_wait(&HeaderMap::new(), at(0)), None);
        let h = headers(&[("x-ratelimit-reset", "soon")]);
        assert_eq!(rate_limit_wait(&h, at(0)), None);
    }

    #[test]
    fn forbidden_is_rate_limited_only_when_quota_is_spent() {
        let spent = headers(&[("x-ratelimit-remaining", "0")]);
        let left = headers(&[("x-ratelimit-remaining", "12")]);
        assert!(is_rate_limited(StatusCode::FORBIDDEN, &spent));
        assert!(!is_rate_limited(StatusCode::FORBIDDEN, &left));
        assert!(is_rate_limited(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new()));
        assert!(!is_rate_limited(StatusCode::NOT_FOUND, &spent));
    }

    #[test]
    fn contents_url_encodes_segments_and_ref() {
        let client = GitHubClient::new(&HttpConfig::default(), None).unwrap();
        let url = client.contents_url(&target(), "docs/my file.md");
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/octo/hello%20world/contents/docs/my%20file.md?ref=feature%2Fx"
        );
    }

    #[test]
    fn contents_url_for_root_has_no_trailing_segment() {
        let client = GitHubClient::new(&HttpConfig::default(), None).unwrap();
        let url = client.contents_url(&target(), "");
        assert_eq!(url.path(), "/repos/octo/hello%20world/contents");
    }

    #[test]
    fn empty_branch_omits_ref() {
        let client = GitHubClient::new(&HttpConfig::default(), None).unwrap();
        let mut t = target();
        t.branch = String::new();
        assert_eq!(client.contents_url(&t, "src").query(), None);
    }

    #[test]
    fn base_url_with_path_prefix_is_kept() {
        let config = HttpConfig {
            api_base_url: "https://ghe.example.com/api/v3".to_string(),
            ..Default::default()
        };
        let client = GitHubClient::new(&config, None).unwrap();
        let url = client.contents_url(&target(), "src");
        assert_eq!(url.path(), "/api/v3/repos/octo/hello%20world/contents/src");
    }

    #[test]
    fn single_object_response_is_accepted() {
        let body = r#"{"name":"a.txt","path":"a.txt","type":"file","download_url":"http://x/a.txt","size":3}"#;
        match serde_json::from_str::<ContentsResponse>(body).unwrap() {
            ContentsResponse::Single(entry) => assert_eq!(entry.name, "a.txt"),
            ContentsResponse::Listing(_) => panic!("expected a single entry"),
        }
    }
}
