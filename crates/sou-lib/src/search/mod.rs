//! Generic search facade over the `/api` surface.
//!
//! Issues parameterized searches, reads backend health, and resolves the
//! two response shapes the backend is known to produce: an enveloped
//! `{code, message, data}` wrapper, or the bare search payload. Anything
//! else degrades to an empty result with a warning.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::errors::Result;
use crate::http_client::ApiClient;
use crate::session::{AuthEvents, TokenStore};

// ---------------------------------------------------------------------------
// Data models
// ---------------------------------------------------------------------------

/// One link inside a search result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultLink {
    #[serde(rename = "type")]
    pub link_type: String,
    pub url: String,
    #[serde(default)]
    pub password: Option<String>,
}

/// One matched item from a channel or plugin source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultItem {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub datetime: Option<String>,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub links: Vec<ResultLink>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// A result grouped under a storage-provider code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergedResultItem {
    pub url: String,
    #[serde(default)]
    pub password: Option<String>,
    pub note: String,
    #[serde(default)]
    pub datetime: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// The search payload: flat results plus the per-disk-type grouping.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    pub total: u64,
    #[serde(default)]
    pub results: Vec<ResultItem>,
    #[serde(default)]
    pub merged_by_type: HashMap<String, Vec<MergedResultItem>>,
}

/// Backend health report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub plugins_enabled: bool,
    #[serde(default)]
    pub plugin_count: u32,
    #[serde(default)]
    pub plugins: Vec<String>,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub auth_enabled: Option<bool>,
}

// ---------------------------------------------------------------------------
// Search parameters
// ---------------------------------------------------------------------------

/// Which shape of result the backend should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultShape {
    #[default]
    All,
    Results,
    Merge,
}

impl ResultShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Results => "results",
            Self::Merge => "merge",
        }
    }
}

impl std::str::FromStr for ResultShape {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "results" => Ok(Self::Results),
            "merge" => Ok(Self::Merge),
            other => Err(format!("unknown result shape: {other}")),
        }
    }
}

/// Which sources to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceFilter {
    #[default]
    All,
    Telegram,
    Plugin,
}

impl SourceFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Telegram => "tg",
            Self::Plugin => "plugin",
        }
    }
}

impl std::str::FromStr for SourceFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "tg" => Ok(Self::Telegram),
            "plugin" => Ok(Self::Plugin),
            other => Err(format!("unknown source filter: {other}")),
        }
    }
}

/// Parameters of one search call.
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub keyword: String,
    /// Bypass any backend-side cache.
    pub refresh: bool,
    pub result_shape: ResultShape,
    pub source: SourceFilter,
    /// Plugin allow-list; empty means all.
    pub plugins: Vec<String>,
    /// Channel allow-list; empty means all.
    pub channels: Vec<String>,
    /// Storage-provider code filter; empty means all.
    pub cloud_types: Vec<String>,
    /// Extra `ext` fields; the configured referer is always added.
    pub ext: serde_json::Map<String, Value>,
}

impl SearchParams {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            ..Default::default()
        }
    }

    /// Render the query string pairs, injecting the referer tag into `ext`.
    fn query_pairs(&self, referer: &str) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("kw", self.keyword.clone()),
            ("res", self.result_shape.as_str().to_string()),
            ("src", self.source.as_str().to_string()),
        ];
        if self.refresh {
            pairs.push(("refresh", "true".to_string()));
        }
        if !self.plugins.is_empty() {
            pairs.push(("plugins", self.plugins.join(",")));
        }
        if !self.channels.is_empty() {
            pairs.push(("channels", self.channels.join(",")));
        }
        if !self.cloud_types.is_empty() {
            pairs.push(("cloud_types", self.cloud_types.join(",")));
        }

        let mut ext = self.ext.clone();
        ext.insert("referer".into(), Value::String(referer.to_string()));
        pairs.push(("ext", Value::Object(ext).to_string()));

        pairs
    }
}

// ---------------------------------------------------------------------------
// SearchClient
// ---------------------------------------------------------------------------

/// Client for the generic search, health, and merged-result surface.
#[derive(Clone)]
pub struct SearchClient {
    api: ApiClient,
    referer: String,
}

impl SearchClient {
    pub fn new(
        config: &ClientConfig,
        store: Arc<dyn TokenStore>,
        events: AuthEvents,
    ) -> Result<Self> {
        let api = ApiClient::new(
            config.api_base_url(),
            config.search_timeout_secs,
            store,
            events,
        )?;
        Ok(Self {
            api,
            referer: config.referer.clone(),
        })
    }

    /// Fetch the backend health report. Errors propagate to the caller.
    pub async fn health(&self) -> Result<HealthStatus> {
        self.api.get_json("health", &[]).await
    }

    /// Run a search and resolve the response shape.
    pub async fn search(&self, params: &SearchParams) -> Result<SearchResponse> {
        let query = params.query_pairs(&self.referer);
        let value = self.api.get_value("search", &query).await?;
        Ok(resolve_search_value(value))
    }
}

/// Resolve a search response of unknown shape.
///
/// Order: enveloped `data` field, then a top level already shaped like the
/// payload, then an empty response.
pub fn resolve_search_value(value: Value) -> SearchResponse {
    if let Some(data) = value.get("data") {
        if let Ok(resp) = serde_json::from_value::<SearchResponse>(data.clone()) {
            return resp;
        }
    }

    if value.get("total").is_some() && value.get("merged_by_type").is_some() {
        if let Ok(resp) = serde_json::from_value::<SearchResponse>(value) {
            return resp;
        }
    }

    tracing::warn!("unrecognized search response shape, returning empty result");
    SearchResponse::default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_pairs_basic() {
        let params = SearchParams::new("movie");
        let pairs = params.query_pairs("https://example.com");

        assert!(pairs.contains(&("kw", "movie".to_string())));
        assert!(pairs.contains(&("res", "all".to_string())));
        assert!(pairs.contains(&("src", "all".to_string())));
        // refresh omitted unless requested
        assert!(!pairs.iter().any(|(k, _)| *k == "refresh"));
    }

    #[test]
    fn query_pairs_full() {
        let mut params = SearchParams::new("movie");
        params.refresh = true;
        params.result_shape = ResultShape::Merge;
        params.source = SourceFilter::Plugin;
        params.plugins = vec!["pansearch".into(), "hdr4k".into()];
        params.channels = vec!["tgsearchers2".into()];
        params.cloud_types = vec!["baidu".into(), "quark".into()];

        let pairs = params.query_pairs("https://example.com");
        assert!(pairs.contains(&("refresh", "true".to_string())));
        assert!(pairs.contains(&("res", "merge".to_string())));
        assert!(pairs.contains(&("src", "plugin".to_string())));
        assert!(pairs.contains(&("plugins", "pansearch,hdr4k".to_string())));
        assert!(pairs.contains(&("channels", "tgsearchers2".to_string())));
        assert!(pairs.contains(&("cloud_types", "baidu,quark".to_string())));
    }

    #[test]
    fn ext_carries_referer() {
        let params = SearchParams::new("movie");
        let pairs = params.query_pairs("https://dm.xueximeng.com");
        let ext = &pairs.iter().find(|(k, _)| *k == "ext").unwrap().1;
        let ext: Value = serde_json::from_str(ext).unwrap();
        assert_eq!(ext["referer"], "https://dm.xueximeng.com");
    }

    #[test]
    fn ext_merges_extra_fields() {
        let mut params = SearchParams::new("movie");
        params
            .ext
            .insert("trace_id".into(), Value::String("abc".into()));

        let pairs = params.query_pairs("https://example.com");
        let ext = &pairs.iter().find(|(k, _)| *k == "ext").unwrap().1;
        let ext: Value = serde_json::from_str(ext).unwrap();
        assert_eq!(ext["trace_id"], "abc");
        assert_eq!(ext["referer"], "https://example.com");
    }

    fn sample_payload() -> Value {
        serde_json::json!({
            "total": 2,
            "results": [
                {
                    "message_id": "12345",
                    "unique_id": "channel-12345",
                    "channel": "tgsearchers2",
                    "datetime": "2023-06-10T14:23:45Z",
                    "title": "Some movie pack",
                    "content": "1080p, complete",
                    "links": [
                        {"type": "baidu", "url": "https://pan.baidu.com/s/1abc", "password": "1234"}
                    ],
                    "tags": ["movie"]
                }
            ],
            "merged_by_type": {
                "baidu": [
                    {
                        "url": "https://pan.baidu.com/s/1abc",
                        "password": "1234",
                        "note": "Some movie pack",
                        "datetime": "2023-06-10T14:23:45Z",
                        "source": "tgsearchers2"
                    }
                ]
            }
        })
    }

    #[test]
    fn resolve_enveloped_response() {
        let enveloped = serde_json::json!({
            "code": 0,
            "message": "ok",
            "data": sample_payload()
        });
        let resp = resolve_search_value(enveloped);
        assert_eq!(resp.total, 2);
        assert_eq!(resp.results.len(), 1);
        assert_eq!(resp.results[0].title, "Some movie pack");
        assert_eq!(resp.merged_by_type["baidu"].len(), 1);
    }

    #[test]
    fn resolve_bare_response() {
        let resp = resolve_search_value(sample_payload());
        assert_eq!(resp.total, 2);
        assert_eq!(
            resp.results[0].links[0].password.as_deref(),
            Some("1234")
        );
    }

    #[test]
    fn resolve_unknown_shape_is_empty() {
        let resp = resolve_search_value(serde_json::json!({"hello": "world"}));
        assert_eq!(resp.total, 0);
        assert!(resp.results.is_empty());
        assert!(resp.merged_by_type.is_empty());
    }

    #[test]
    fn resolve_malformed_envelope_is_empty() {
        let resp = resolve_search_value(serde_json::json!({
            "code": 0,
            "message": "ok",
            "data": "not an object"
        }));
        assert_eq!(resp, SearchResponse::default());
    }

    #[test]
    fn health_status_parses_optional_auth_flag() {
        let json = serde_json::json!({
            "status": "ok",
            "plugins_enabled": true,
            "plugin_count": 2,
            "plugins": ["pansearch", "hdr4k"],
            "channels": ["tgsearchers2"]
        });
        let health: HealthStatus = serde_json::from_value(json).unwrap();
        assert_eq!(health.auth_enabled, None);
        assert_eq!(health.plugins.len(), 2);
    }

    #[test]
    fn result_item_minimal() {
        let json = serde_json::json!({"title": "bare"});
        let item: ResultItem = serde_json::from_value(json).unwrap();
        assert_eq!(item.title, "bare");
        assert!(item.links.is_empty());
        assert!(item.channel.is_none());
    }

    #[test]
    fn shape_and_filter_parse() {
        assert_eq!("merge".parse::<ResultShape>().unwrap(), ResultShape::Merge);
        assert_eq!("tg".parse::<SourceFilter>().unwrap(), SourceFilter::Telegram);
        assert!("bogus".parse::<ResultShape>().is_err());
        assert!("bogus".parse::<SourceFilter>().is_err());
    }
}
