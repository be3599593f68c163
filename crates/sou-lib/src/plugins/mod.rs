//! Generic provider plugin client.
//!
//! Three session-based integrations share one wire protocol: every session
//! call is `POST /<prefix>/<hash>` with a JSON body `{"action": <name>,
//! ...params}` and an `{success, message, data}` envelope around the
//! response. The providers differ only in which actions they support and
//! which identity fields their payloads carry, so a single client
//! parameterized by [`Provider`] covers all of them.
//!
//! The hash addressing a session is a 64-character lowercase-hex
//! identifier, discovered once by following a redirect from
//! `GET /<prefix>/<identifier>` and extracting the hash from the final URL.

use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::errors::{Result, SouError};
use crate::http_client::ApiClient;
use crate::search::ResultLink;
use crate::session::{AuthEvents, TokenStore};

/// Default result cap for test searches.
pub const DEFAULT_TEST_SEARCH_MAX: u32 = 10;

// ---------------------------------------------------------------------------
// Providers and actions
// ---------------------------------------------------------------------------

/// A session-based plugin integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Qqpd,
    Gying,
    Weibo,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Qqpd, Provider::Gying, Provider::Weibo];

    /// The URL path prefix this provider is served under.
    pub fn path_prefix(&self) -> &'static str {
        match self {
            Self::Qqpd => "qqpd",
            Self::Gying => "gying",
            Self::Weibo => "weibo",
        }
    }

    /// Human-readable name for display.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Qqpd => "QQ Channels",
            Self::Gying => "Gying",
            Self::Weibo => "Weibo",
        }
    }

    /// The action set this provider's backend accepts.
    pub fn actions(&self) -> &'static [PluginAction] {
        use PluginAction::*;
        match self {
            Self::Qqpd => &[
                GetStatus,
                RefreshQrcode,
                CheckLogin,
                Logout,
                SetChannels,
                TestSearch,
            ],
            Self::Gying => &[GetStatus, Login, Logout, TestSearch],
            Self::Weibo => &[
                GetStatus,
                RefreshQrcode,
                CheckLogin,
                Logout,
                SetUserIds,
                TestSearch,
            ],
        }
    }

    pub fn supports(&self, action: PluginAction) -> bool {
        self.actions().contains(&action)
    }

    /// Compiled pattern matching this provider's session hash inside a URL.
    pub fn hash_regex(&self) -> Regex {
        // The prefixes are fixed identifiers, so the pattern always compiles.
        Regex::new(&format!(r"/{}/([a-f0-9]{{64}})", self.path_prefix()))
            .expect("hash pattern is valid")
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path_prefix())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "qqpd" => Ok(Self::Qqpd),
            "gying" => Ok(Self::Gying),
            "weibo" => Ok(Self::Weibo),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// An action a provider session endpoint can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginAction {
    GetStatus,
    Login,
    RefreshQrcode,
    CheckLogin,
    Logout,
    SetChannels,
    SetUserIds,
    TestSearch,
}

impl PluginAction {
    /// The `action` field value on the wire.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::GetStatus => "get_status",
            Self::Login => "login",
            Self::RefreshQrcode => "refresh_qrcode",
            Self::CheckLogin => "check_login",
            Self::Logout => "logout",
            Self::SetChannels => "set_channels",
            Self::SetUserIds => "set_user_ids",
            Self::TestSearch => "test_search",
        }
    }
}

// ---------------------------------------------------------------------------
// Data models
// ---------------------------------------------------------------------------

/// Envelope every plugin response arrives in.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct PluginResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<T>,
}

/// Lifecycle of a provider session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Pending,
    Active,
    Expired,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Active => f.write_str("active"),
            Self::Expired => f.write_str("expired"),
        }
    }
}

/// Per-session status. Providers differ in which identity and tracking
/// fields they populate; everything provider-specific is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginStatus {
    pub hash: String,
    pub logged_in: bool,
    pub status: SessionState,
    #[serde(default)]
    pub qq_masked: Option<String>,
    #[serde(default)]
    pub username_masked: Option<String>,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub login_time: Option<String>,
    #[serde(default)]
    pub expire_time: Option<String>,
    #[serde(default)]
    pub expires_in_days: Option<i64>,
    #[serde(default)]
    pub channels: Option<Vec<String>>,
    #[serde(default)]
    pub channel_count: Option<u32>,
    #[serde(default)]
    pub user_ids: Option<Vec<String>>,
    #[serde(default)]
    pub user_id_count: Option<u32>,
    #[serde(default)]
    pub qrcode_base64: Option<String>,
}

impl PluginStatus {
    /// Whichever masked identity the provider reported.
    pub fn identity_masked(&self) -> Option<&str> {
        self.qq_masked
            .as_deref()
            .or(self.username_masked.as_deref())
            .or(self.uid.as_deref())
    }
}

/// A freshly generated login QR code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrCode {
    pub qrcode_base64: String,
}

/// Where a QR login currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginPhase {
    Waiting,
    Success,
    Expired,
}

/// Result of polling `check_login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginCheck {
    pub login_status: LoginPhase,
    #[serde(default)]
    pub qq_masked: Option<String>,
    #[serde(default)]
    pub uid: Option<String>,
}

/// Result of a credential login (gying).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginLogin {
    pub status: String,
    #[serde(default)]
    pub username_masked: Option<String>,
}

/// Result of replacing the tracked channel list (qqpd).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsUpdate {
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub channel_count: u32,
    #[serde(default)]
    pub invalid_channels: Vec<String>,
    #[serde(default)]
    pub guild_ids_cached: u32,
}

/// Result of replacing the tracked user-id list (weibo).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserIdsUpdate {
    #[serde(default)]
    pub user_ids: Vec<String>,
    #[serde(default)]
    pub user_id_count: u32,
    #[serde(default)]
    pub invalid_user_ids: Vec<String>,
}

/// One item from a bounded test search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginSearchResult {
    pub unique_id: String,
    pub title: String,
    #[serde(default)]
    pub links: Vec<ResultLink>,
}

/// Result of a bounded test search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSearch {
    pub keyword: String,
    #[serde(default)]
    pub total_results: u32,
    #[serde(default)]
    pub channels_searched: Option<Vec<String>>,
    #[serde(default)]
    pub user_ids_searched: Option<Vec<String>>,
    #[serde(default)]
    pub results: Vec<PluginSearchResult>,
}

/// Result of a session logout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutStatus {
    pub status: String,
}

// ---------------------------------------------------------------------------
// Hash handling
// ---------------------------------------------------------------------------

/// Whether `s` is a well-formed session hash (64 lowercase hex chars).
pub fn is_valid_hash(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Pull the session hash out of a redirect target URL.
pub fn extract_hash(pattern: &Regex, url: &str) -> Result<String> {
    pattern
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            SouError::HashExtract(format!("no session hash in redirect URL: {url}"))
        })
}

// ---------------------------------------------------------------------------
// PluginClient
// ---------------------------------------------------------------------------

/// Client for one provider's session-scoped endpoints.
///
/// All three providers are served by this one type; the [`Provider`] value
/// fixes the base path and the permitted action set.
#[derive(Clone)]
pub struct PluginClient {
    api: ApiClient,
    provider: Provider,
}

impl PluginClient {
    pub fn new(
        config: &ClientConfig,
        provider: Provider,
        store: Arc<dyn TokenStore>,
        events: AuthEvents,
    ) -> Result<Self> {
        let api = ApiClient::new(
            config.plugin_base_url(provider),
            config.plugin_timeout_secs,
            store,
            events,
        )?;
        Ok(Self { api, provider })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Session status for `hash`.
    pub async fn get_status(&self, hash: &str) -> Result<PluginStatus> {
        self.action_call(hash, PluginAction::GetStatus, Value::Null)
            .await
    }

    /// Generate a fresh login QR code.
    pub async fn refresh_qrcode(&self, hash: &str) -> Result<QrCode> {
        self.action_call(hash, PluginAction::RefreshQrcode, Value::Null)
            .await
    }

    /// Poll whether a scanned QR login has completed.
    pub async fn check_login(&self, hash: &str) -> Result<LoginCheck> {
        self.action_call(hash, PluginAction::CheckLogin, Value::Null)
            .await
    }

    /// Credential login (providers without a QR flow).
    pub async fn login(
        &self,
        hash: &str,
        username: &str,
        password: &str,
    ) -> Result<PluginLogin> {
        self.action_call(
            hash,
            PluginAction::Login,
            serde_json::json!({ "username": username, "password": password }),
        )
        .await
    }

    /// End the provider session.
    pub async fn logout(&self, hash: &str) -> Result<LogoutStatus> {
        self.action_call(hash, PluginAction::Logout, Value::Null)
            .await
    }

    /// Replace the tracked channel list.
    pub async fn set_channels(&self, hash: &str, channels: &[String]) -> Result<ChannelsUpdate> {
        self.action_call(
            hash,
            PluginAction::SetChannels,
            serde_json::json!({ "channels": channels }),
        )
        .await
    }

    /// Replace the tracked user-id list.
    pub async fn set_user_ids(&self, hash: &str, user_ids: &[String]) -> Result<UserIdsUpdate> {
        self.action_call(
            hash,
            PluginAction::SetUserIds,
            serde_json::json!({ "user_ids": user_ids }),
        )
        .await
    }

    /// Bounded test search; `max_results` defaults to
    /// [`DEFAULT_TEST_SEARCH_MAX`].
    pub async fn test_search(
        &self,
        hash: &str,
        keyword: &str,
        max_results: Option<u32>,
    ) -> Result<TestSearch> {
        self.action_call(
            hash,
            PluginAction::TestSearch,
            serde_json::json!({
                "keyword": keyword,
                "max_results": max_results.unwrap_or(DEFAULT_TEST_SEARCH_MAX),
            }),
        )
        .await
    }

    /// Convert a human identifier (username, QQ number, UID) into the
    /// session hash by following the backend redirect and parsing the
    /// final URL. A redirect target without a hash is an explicit error,
    /// never an empty hash.
    pub async fn resolve_hash(&self, identifier: &str) -> Result<String> {
        tracing::debug!(provider = %self.provider, identifier, "resolving session hash");
        let final_url = self.api.final_url(identifier).await?;
        extract_hash(&self.provider.hash_regex(), &final_url)
    }

    /// Issue one `{"action": ...}` call and unwrap the envelope.
    async fn action_call<T: serde::de::DeserializeOwned>(
        &self,
        hash: &str,
        action: PluginAction,
        extra: Value,
    ) -> Result<T> {
        if !self.provider.supports(action) {
            return Err(SouError::Plugin {
                provider: self.provider.path_prefix().into(),
                message: format!(
                    "action '{}' is not supported by this provider",
                    action.wire_name()
                ),
            });
        }
        if !is_valid_hash(hash) {
            return Err(SouError::Plugin {
                provider: self.provider.path_prefix().into(),
                message: "invalid session hash (expected 64 lowercase hex characters)".into(),
            });
        }

        let mut body = serde_json::Map::new();
        body.insert("action".into(), Value::String(action.wire_name().into()));
        if let Value::Object(extra) = extra {
            body.extend(extra);
        }

        let envelope: PluginResponse<T> =
            self.api.post_json(hash, &Value::Object(body)).await?;

        if !envelope.success {
            return Err(SouError::Plugin {
                provider: self.provider.path_prefix().into(),
                message: envelope.message,
            });
        }

        envelope.data.ok_or_else(|| SouError::Plugin {
            provider: self.provider.path_prefix().into(),
            message: "response carried no data".into(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
