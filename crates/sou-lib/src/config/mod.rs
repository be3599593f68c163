//! Client configuration.
//!
//! One backend origin serves every base path (`/api` plus the per-provider
//! prefixes), mirroring the deployment where all of them are proxied to a
//! single host. Configuration lives at `~/.sou/config.json`; a missing or
//! corrupt file falls back to defaults with a warning, and the default file
//! is written when absent. `SOU_API_ORIGIN` overrides the origin.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::plugins::Provider;

const ENV_API_ORIGIN: &str = "SOU_API_ORIGIN";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Backend origin all base paths resolve against.
    pub api_origin: String,
    /// Request timeout of the generic `/api` client, in seconds.
    pub search_timeout_secs: u64,
    /// Request timeout of the provider plugin clients, in seconds.
    pub plugin_timeout_secs: u64,
    /// Referer tag injected into the search `ext` parameter.
    pub referer: String,
    /// Where the bearer session is persisted.
    pub session_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_origin: "http://localhost:8888".into(),
            search_timeout_secs: 10,
            plugin_timeout_secs: 15,
            referer: "https://dm.xueximeng.com".into(),
            session_file: sou_home().join("session.json"),
        }
    }
}

impl ClientConfig {
    /// Base URL of the generic search/auth/health API.
    pub fn api_base_url(&self) -> String {
        format!("{}/api", self.api_origin.trim_end_matches('/'))
    }

    /// Base URL of a provider plugin API.
    pub fn plugin_base_url(&self, provider: Provider) -> String {
        format!(
            "{}/{}",
            self.api_origin.trim_end_matches('/'),
            provider.path_prefix()
        )
    }

    /// Default location of the config file (`~/.sou/config.json`).
    pub fn default_path() -> PathBuf {
        sou_home().join("config.json")
    }

    /// Load configuration from `path` (or the default location).
    ///
    /// Missing file: defaults are written there and returned. Unreadable or
    /// unparsable file: defaults are returned with a warning, nothing is
    /// overwritten. The `SOU_API_ORIGIN` environment variable, when set,
    /// overrides `api_origin` whatever the file says.
    pub async fn load_or_create(path: Option<PathBuf>) -> Self {
        let path = path.unwrap_or_else(Self::default_path);

        let mut config = if path.exists() {
            match tokio::fs::read_to_string(&path).await {
                Ok(contents) => match serde_json::from_str::<ClientConfig>(&contents) {
                    Ok(cfg) => cfg,
                    Err(e) => {
                        tracing::warn!(
                            "Failed to parse config file {}: {}. Using defaults.",
                            path.display(),
                            e
                        );
                        Self::default()
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        "Failed to read config file {}: {}. Using defaults.",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            }
        } else {
            let defaults = Self::default();
            if let Some(parent) = path.parent() {
                let _ = tokio::fs::create_dir_all(parent).await;
            }
            match serde_json::to_string_pretty(&defaults) {
                Ok(json) => {
                    if let Err(e) = tokio::fs::write(&path, json).await {
                        tracing::warn!(
                            "Failed to create default config file {}: {}",
                            path.display(),
                            e
                        );
                    }
                }
                Err(e) => tracing::warn!("Failed to serialize default config: {}", e),
            }
            defaults
        };

        if let Ok(origin) = std::env::var(ENV_API_ORIGIN) {
            if !origin.is_empty() {
                config.api_origin = origin;
            }
        }

        config
    }
}

fn sou_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".sou")
}
