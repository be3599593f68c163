//! Session state and the authentication-required event channel.
//!
//! The backend issues a bearer token on login; every client holds a shared
//! `TokenStore` and attaches the token to outgoing requests. A 401 response
//! clears the store and broadcasts `AuthEvent::Required` so the embedding
//! application can prompt for a new login.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

// ---------------------------------------------------------------------------
// Session data
// ---------------------------------------------------------------------------

/// A stored bearer session: the token, the account it belongs to, and the
/// server-reported expiry (unix seconds).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionData {
    pub token: String,
    pub username: String,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl SessionData {
    /// Whether the server-reported expiry has passed. Sessions without an
    /// expiry never count as expired locally; the backend is authoritative.
    pub fn is_expired(&self) -> bool {
        matches!(self.expires_at, Some(t) if t <= chrono::Utc::now().timestamp())
    }
}

// ---------------------------------------------------------------------------
// TokenStore
// ---------------------------------------------------------------------------

/// Storage for the current bearer session.
///
/// Injected into every client at construction so that session state is an
/// explicit dependency rather than ambient global storage.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// The full stored session, if any.
    async fn session(&self) -> Option<SessionData>;

    /// Replace the stored session.
    async fn set(&self, data: SessionData);

    /// Drop the stored session (token and username both).
    async fn clear(&self);

    /// Just the token, if a session is stored.
    async fn token(&self) -> Option<String> {
        self.session().await.map(|s| s.token)
    }

    /// Just the username, if a session is stored.
    async fn username(&self) -> Option<String> {
        self.session().await.map(|s| s.username)
    }
}

/// In-memory `TokenStore` for tests and short-lived embedders.
#[derive(Default)]
pub struct MemoryTokenStore {
    inner: RwLock<Option<SessionData>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn session(&self) -> Option<SessionData> {
        self.inner.read().await.clone()
    }

    async fn set(&self, data: SessionData) {
        *self.inner.write().await = Some(data);
    }

    async fn clear(&self) {
        *self.inner.write().await = None;
    }
}

/// File-backed `TokenStore` persisting the session as JSON.
///
/// Reads the file once at open time and keeps a cached copy; writes are
/// best-effort (a failed write keeps the in-memory session and logs a
/// warning rather than failing the caller's operation).
pub struct FileTokenStore {
    path: PathBuf,
    cache: RwLock<Option<SessionData>>,
}

impl FileTokenStore {
    /// Open the store at `path`, loading any previously persisted session.
    /// A missing or unparsable file starts the store empty.
    pub async fn open(path: PathBuf) -> Self {
        let cached = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => match serde_json::from_str::<SessionData>(&contents) {
                Ok(data) => Some(data),
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse session file {}: {}. Starting without a session.",
                        path.display(),
                        e
                    );
                    None
                }
            },
            Err(_) => None,
        };

        Self {
            path,
            cache: RwLock::new(cached),
        }
    }

    /// The path this store persists to.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    async fn persist(&self, data: &SessionData) {
        if let Some(parent) = self.path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        match serde_json::to_string_pretty(data) {
            Ok(json) => {
                if let Err(e) = tokio::fs::write(&self.path, json).await {
                    tracing::warn!(
                        "Failed to write session file {}: {}",
                        self.path.display(),
                        e
                    );
                }
            }
            Err(e) => tracing::warn!("Failed to serialize session: {}", e),
        }
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn session(&self) -> Option<SessionData> {
        self.cache.read().await.clone()
    }

    async fn set(&self, data: SessionData) {
        *self.cache.write().await = Some(data.clone());
        self.persist(&data).await;
    }

    async fn clear(&self) {
        *self.cache.write().await = None;
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    "Failed to remove session file {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Auth events
// ---------------------------------------------------------------------------

/// Events broadcast by the networking layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// A request was rejected with 401; the session was cleared and the
    /// user must authenticate again.
    Required,
}

/// Subscription interface for [`AuthEvent`]s.
///
/// Handed to each client at construction; the embedding application calls
/// [`AuthEvents::subscribe`] to react (e.g. show a login prompt). Emitting
/// with no subscribers is a no-op.
#[derive(Clone)]
pub struct AuthEvents {
    tx: broadcast::Sender<AuthEvent>,
}

impl AuthEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Subscribe to auth events. Each receiver sees every event emitted
    /// after the subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.tx.subscribe()
    }

    /// Broadcast that re-authentication is required.
    pub fn emit_required(&self) {
        let _ = self.tx.send(AuthEvent::Required);
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session() -> SessionData {
        SessionData {
            token: "tok-123".into(),
            username: "alice".into(),
            expires_at: Some(4_102_444_800), // 2100-01-01
        }
    }

    #[tokio::test]
    async fn memory_store_set_get_clear() {
        let store = MemoryTokenStore::new();
        assert!(store.session().await.is_none());
        assert!(store.token().await.is_none());

        store.set(sample_session()).await;
        assert_eq!(store.token().await.as_deref(), Some("tok-123"));
        assert_eq!(store.username().await.as_deref(), Some("alice"));

        store.clear().await;
        assert!(store.session().await.is_none());
    }

    #[tokio::test]
    async fn file_store_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileTokenStore::open(path.clone()).await;
        store.set(sample_session()).await;
        assert!(path.exists());

        // A second store opened at the same path sees the session.
        let reopened = FileTokenStore::open(path.clone()).await;
        assert_eq!(reopened.token().await.as_deref(), Some("tok-123"));
    }

    #[tokio::test]
    async fn file_store_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileTokenStore::open(path.clone()).await;
        store.set(sample_session()).await;
        store.clear().await;

        assert!(store.session().await.is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn file_store_tolerates_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileTokenStore::open(path).await;
        assert!(store.session().await.is_none());
    }

    #[test]
    fn expiry_check() {
        let mut session = sample_session();
        assert!(!session.is_expired());

        session.expires_at = Some(1_000_000_000); // 2001
        assert!(session.is_expired());

        session.expires_at = None;
        assert!(!session.is_expired());
    }

    #[tokio::test]
    async fn events_reach_subscriber() {
        let events = AuthEvents::new();
        let mut rx = events.subscribe();

        events.emit_required();
        assert_eq!(rx.recv().await.unwrap(), AuthEvent::Required);
    }

    #[test]
    fn emit_without_subscribers_is_noop() {
        let events = AuthEvents::new();
        events.emit_required(); // must not panic
    }

    #[test]
    fn session_data_serde_round_trip() {
        let session = sample_session();
        let json = serde_json::to_string(&session).unwrap();
        let back: SessionData = serde_json::from_str(&json).unwrap();
        assert_eq!(session, back);
    }

    #[test]
    fn session_data_without_expiry_deserializes() {
        let json = r#"{"token": "t", "username": "u"}"#;
        let session: SessionData = serde_json::from_str(json).unwrap();
        assert_eq!(session.expires_at, None);
    }
}
