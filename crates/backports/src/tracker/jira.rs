//! REST v2 client for the issue tracker.

use super::{Issue, IssueTracker, SearchQuery};
use crate::error::TrackerError;
use crate::transport::Transport;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};
use reqwest::{Method, Request, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

/// Longest error body kept in [`TrackerError::Status`].
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<Issue>,
}

/// Issue tracker client over HTTP.
///
/// Every request goes through the supplied [`Transport`], which is where
/// rate-limit retries and cancellation live.
#[derive(Clone)]
pub struct JiraClient {
    base_url: Url,
    token: String,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for JiraClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JiraClient")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl JiraClient {
    /// Create a client for the tracker at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::InvalidUrl`] if `base_url` is not an absolute
    /// URL that can carry a path.
    pub fn new(
        base_url: &str,
        token: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, TrackerError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| TrackerError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(TrackerError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            base_url,
            token: token.into(),
            transport,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, TrackerError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| TrackerError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["rest", "api", "2"])
            .extend(segments);
        Ok(url)
    }

    fn request(&self, url: Url) -> Result<Request, TrackerError> {
        let mut request = Request::new(Method::GET, url);
        let headers = request.headers_mut();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if !self.token.is_empty() {
            let mut bearer = HeaderValue::from_str(&format!("Bearer {}", self.token))
                .map_err(|e| TrackerError::InvalidUrl(format!("invalid token header: {e}")))?;
            bearer.set_sensitive(true);
            headers.insert(AUTHORIZATION, bearer);
        }
        Ok(request)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, TrackerError> {
        let request = self.request(url)?;
        let url = request.url().to_string();
        let response = self.transport.execute(request).await?;

        let status = response.status();
        let body = self.transport.read_body(response).await?;

        if !status.is_success() {
            let mut body = String::from_utf8_lossy(&body).into_owned();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| body.is_char_boundary(*i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(TrackerError::Status {
                status: status.as_u16(),
                url,
                body,
            });
        }

        serde_json::from_slice(&body).map_err(|e| TrackerError::Decode(format!("{url}: {e}")))
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn get_issue(&self, key: &str, fields: &[&str]) -> Result<Issue, TrackerError> {
        let mut url = self.endpoint(&["issue", key])?;
        url.query_pairs_mut().append_pair("fields", &fields.join(","));
        tracing::debug!(key, "Fetching issue");
        self.get_json(url).await
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Issue>, TrackerError> {
        let mut url = self.endpoint(&["search"])?;
        url.query_pairs_mut()
            .append_pair("jql", &query.jql)
            .append_pair("fields", &query.fields.join(","))
            .append_pair("startAt", &query.start_at.to_string())
            .append_pair("maxResults", &query.max_results.to_string());
        let response: SearchResponse = self.get_json(url).await?;
        Ok(response.issues)
    }
}
