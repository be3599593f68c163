pub mod auth_cmd;
pub mod plugin_cmd;
pub mod search_cmd;

use std::sync::Arc;

use clap::ArgMatches;

use sou_lib::auth::AuthClient;
use sou_lib::config::ClientConfig;
use sou_lib::errors::{Result, SouError};
use sou_lib::plugins::{PluginClient, Provider};
use sou_lib::search::SearchClient;
use sou_lib::session::{AuthEvents, TokenStore};

/// Shared handles every command handler works from.
pub struct Services {
    pub config: ClientConfig,
    pub store: Arc<dyn TokenStore>,
    pub events: AuthEvents,
}

impl Services {
    pub fn search_client(&self) -> Result<SearchClient> {
        SearchClient::new(&self.config, self.store.clone(), self.events.clone())
    }

    pub fn auth_client(&self) -> Result<AuthClient> {
        AuthClient::new(&self.config, self.store.clone(), self.events.clone())
    }

    pub fn plugin_client(&self, provider: Provider) -> Result<PluginClient> {
        PluginClient::new(
            &self.config,
            provider,
            self.store.clone(),
            self.events.clone(),
        )
    }
}

/// Route a parsed subcommand to its handler.
pub async fn dispatch_command(
    name: &str,
    matches: &ArgMatches,
    services: &Services,
) -> Result<()> {
    match name {
        "search" => search_cmd::handle_search(matches, services).await,
        "health" => search_cmd::handle_health(matches, services).await,
        "auth" => auth_cmd::handle_auth(matches, services).await,
        "qqpd" | "gying" | "weibo" => {
            let provider: Provider = name.parse().expect("dispatch names match providers");
            plugin_cmd::handle_provider(provider, matches, services).await
        }
        other => Err(SouError::Application(format!("unknown command: {other}"))),
    }
}
