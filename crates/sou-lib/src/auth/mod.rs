//! Session/auth facade over the `/api/auth` surface.
//!
//! `verify_token` and `check_auth_status` deliberately swallow every
//! failure into a safe answer: the auth subsystem must never block the
//! caller's rendering path. `logout` clears the local session whatever the
//! server says.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::errors::Result;
use crate::http_client::ApiClient;
use crate::search::HealthStatus;
use crate::session::{AuthEvents, SessionData, TokenStore};

// ---------------------------------------------------------------------------
// Data models
// ---------------------------------------------------------------------------

/// Login request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response: the bearer token and its expiry (unix seconds).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: i64,
    pub username: String,
}

impl From<LoginResponse> for SessionData {
    fn from(resp: LoginResponse) -> Self {
        SessionData {
            token: resp.token,
            username: resp.username,
            expires_at: Some(resp.expires_at),
        }
    }
}

/// Composite auth state the UI renders from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthStatus {
    /// Whether the backend requires authentication at all.
    pub enabled: bool,
    /// Whether the current session (if any) is good enough to proceed.
    pub authenticated: bool,
}

// ---------------------------------------------------------------------------
// AuthClient
// ---------------------------------------------------------------------------

/// Client for login, logout, token verification, and the composite
/// auth-status check.
#[derive(Clone)]
pub struct AuthClient {
    api: ApiClient,
    store: Arc<dyn TokenStore>,
}

impl AuthClient {
    pub fn new(
        config: &ClientConfig,
        store: Arc<dyn TokenStore>,
        events: AuthEvents,
    ) -> Result<Self> {
        let api = ApiClient::new(
            config.api_base_url(),
            config.search_timeout_secs,
            store.clone(),
            events,
        )?;
        Ok(Self { api, store })
    }

    /// Post credentials and return the issued token.
    ///
    /// The session is not persisted here; the caller decides whether to
    /// store it (the CLI does, via the shared `TokenStore`).
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let req = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        self.api.post_json("auth/login", &req).await
    }

    /// Best-effort server-side invalidation; the local session is cleared
    /// unconditionally, even when the server call fails.
    pub async fn logout(&self) {
        if let Err(e) = self
            .api
            .post_json::<serde_json::Value, _>("auth/logout", &serde_json::json!({}))
            .await
        {
            tracing::debug!(error = %e, "server-side logout failed, clearing local session anyway");
        }
        self.store.clear().await;
    }

    /// Whether the stored token is still accepted by the backend.
    ///
    /// Any failure (network, 401, unexpected shape) is "invalid"; nothing
    /// propagates.
    pub async fn verify_token(&self) -> bool {
        self.api
            .post_json::<serde_json::Value, _>("auth/verify", &serde_json::json!({}))
            .await
            .is_ok()
    }

    /// Decide whether a login prompt must be shown.
    ///
    /// Reads the backend capability flag from the health endpoint. Auth
    /// disabled (or the flag absent) means nothing to do; enabled without a
    /// local token means a prompt is needed; enabled with a token delegates
    /// to [`Self::verify_token`]. An unreachable or broken health endpoint
    /// degrades to "no login required" — fail-open by design.
    pub async fn check_auth_status(&self) -> AuthStatus {
        let health = match self
            .api
            .get_json::<HealthStatus>("health", &[])
            .await
        {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!(error = %e, "health check failed, treating auth as disabled");
                return AuthStatus {
                    enabled: false,
                    authenticated: true,
                };
            }
        };

        if !health.auth_enabled.unwrap_or(false) {
            return AuthStatus {
                enabled: false,
                authenticated: true,
            };
        }

        if self.store.token().await.is_none() {
            return AuthStatus {
                enabled: true,
                authenticated: false,
            };
        }

        AuthStatus {
            enabled: true,
            authenticated: self.verify_token().await,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_request_serde() {
        let req = LoginRequest {
            username: "alice".into(),
            password: "secret".into(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["username"], "alice");
        assert_eq!(json["password"], "secret");
    }

    #[test]
    fn login_response_serde() {
        let json = serde_json::json!({
            "token": "tok-1",
            "expires_at": 1750000000,
            "username": "alice"
        });
        let resp: LoginResponse = serde_json::from_value(json).unwrap();
        assert_eq!(resp.token, "tok-1");
        assert_eq!(resp.expires_at, 1_750_000_000);
        assert_eq!(resp.username, "alice");
    }

    #[test]
    fn login_response_into_session() {
        let resp = LoginResponse {
            token: "tok-1".into(),
            expires_at: 1_750_000_000,
            username: "alice".into(),
        };
        let session: SessionData = resp.into();
        assert_eq!(session.token, "tok-1");
        assert_eq!(session.expires_at, Some(1_750_000_000));
    }

    #[test]
    fn auth_status_serde() {
        let status = AuthStatus {
            enabled: true,
            authenticated: false,
        };
        let json = serde_json::to_value(status).unwrap();
        assert_eq!(json["enabled"], true);
        assert_eq!(json["authenticated"], false);
    }
}
