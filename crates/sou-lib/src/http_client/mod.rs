//! Shared HTTP client wrapping `reqwest` with the session interceptor pair.
//!
//! Every outgoing request carries `Authorization: Bearer <token>` when the
//! injected [`TokenStore`] holds a token. Every 401 response clears the
//! store, broadcasts [`AuthEvent::Required`], and fails the call; no retry
//! is attempted anywhere in this layer.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{Result, SouError};
use crate::session::{AuthEvents, TokenStore};

/// An HTTP client bound to one base URL (origin + path prefix).
///
/// Cheap to clone: the inner `reqwest::Client` is `Arc`-ed and the store
/// and event channel are shared handles.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
    store: Arc<dyn TokenStore>,
    events: AuthEvents,
}

impl ApiClient {
    /// Build a client for `base_url` with a fixed per-request timeout.
    pub fn new(
        base_url: impl Into<String>,
        timeout_secs: u64,
        store: Arc<dyn TokenStore>,
        events: AuthEvents,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(SouError::Http)?;

        Ok(Self {
            base_url: base_url.into(),
            client,
            store,
            events,
        })
    }

    /// The base URL this client is bound to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Shared token store handle.
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// GET `path` and deserialize the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let resp = self
            .execute(self.client.get(self.url(path)).query(query))
            .await?;
        resp.json().await.map_err(SouError::Http)
    }

    /// GET `path` and return the raw JSON value, for callers that need to
    /// probe the response shape before committing to a type.
    pub async fn get_value(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value> {
        self.get_json(path, query).await
    }

    /// POST a JSON body to `path` and deserialize the JSON response.
    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let resp = self
            .execute(self.client.post(self.url(path)).json(body))
            .await?;
        resp.json().await.map_err(SouError::Http)
    }

    /// GET `path` following redirects and return the final URL.
    ///
    /// Used for hash discovery, where the interesting part of the response
    /// is the redirect target rather than the body.
    pub async fn final_url(&self, path: &str) -> Result<String> {
        let resp = self.execute(self.client.get(self.url(path))).await?;
        Ok(resp.url().to_string())
    }

    /// Attach the bearer token when present, send, and apply the 401 policy.
    async fn execute(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let req = match self.store.token().await {
            Some(token) => req.header(AUTHORIZATION, format!("Bearer {token}")),
            None => req,
        };

        let resp = req.send().await.map_err(SouError::Http)?;
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::debug!(base_url = %self.base_url, "401 response, clearing session");
            self.store.clear().await;
            self.events.emit_required();
            let message = resp.text().await.unwrap_or_default();
            return Err(SouError::Server {
                status: 401,
                message,
            });
        }

        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(SouError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp)
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemoryTokenStore;

    fn make_client(base_url: &str) -> ApiClient {
        ApiClient::new(
            base_url,
            10,
            Arc::new(MemoryTokenStore::new()),
            AuthEvents::new(),
        )
        .expect("client should build")
    }

    #[test]
    fn url_joining() {
        let client = make_client("http://localhost:8888/api");
        assert_eq!(
            client.url("auth/login"),
            "http://localhost:8888/api/auth/login"
        );
        assert_eq!(client.url("/search"), "http://localhost:8888/api/search");
    }

    #[test]
    fn url_joining_with_trailing_slash() {
        let client = make_client("http://localhost:8888/qqpd/");
        assert_eq!(
            client.url("abc123"),
            "http://localhost:8888/qqpd/abc123"
        );
    }

    #[test]
    fn base_url_accessor() {
        let client = make_client("http://localhost:8888/api");
        assert_eq!(client.base_url(), "http://localhost:8888/api");
    }
}
