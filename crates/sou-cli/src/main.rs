use std::sync::Arc;

use clap::{Arg, ArgAction, Command};

use sou_lib::config::ClientConfig;
use sou_lib::errors::handle_command_error;
use sou_lib::output;
use sou_lib::plugins::Provider;
use sou_lib::session::{AuthEvents, FileTokenStore, TokenStore};

mod commands;

use commands::Services;

/// Creates the root clap Command with global `--verbose` and `--json` flags.
///
/// When combined with `--json`, verbose output is suppressed to keep JSON
/// output clean.
fn create_root_command() -> Command {
    let mut root = Command::new("sou")
        .about("Client for the multi-source content-search aggregator")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable verbose output"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Output in JSON format"),
        )
        .subcommand(commands::search_cmd::search_command())
        .subcommand(commands::search_cmd::health_command())
        .subcommand(commands::auth_cmd::auth_command());

    for provider in Provider::ALL {
        root = root.subcommand(commands::plugin_cmd::provider_command(provider));
    }
    root
}

/// Returns whether verbose mode is active based on parsed matches.
fn is_verbose(matches: &clap::ArgMatches) -> bool {
    matches.get_flag("verbose") && !matches.get_flag("json")
}

#[tokio::main]
async fn main() {
    let matches = create_root_command().get_matches();
    sou_lib::logger::init(is_verbose(&matches));

    let config = ClientConfig::load_or_create(None).await;
    let store: Arc<dyn TokenStore> =
        Arc::new(FileTokenStore::open(config.session_file.clone()).await);
    let events = AuthEvents::new();

    // Surface auth-required broadcasts as a CLI hint.
    let mut auth_rx = events.subscribe();
    tokio::spawn(async move {
        while auth_rx.recv().await.is_ok() {
            output::warning("Session rejected by the backend; run `sou auth login`.");
        }
    });

    let services = Services {
        config,
        store,
        events,
    };

    match matches.subcommand() {
        Some((name, sub_matches)) => {
            tracing::debug!(command = name, "executing command");
            if let Err(e) = commands::dispatch_command(name, sub_matches, &services).await {
                handle_command_error(&e);
                std::process::exit(1);
            }
        }
        None => unreachable!("subcommand_required is set"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_command_parses_verbose() {
        let matches = create_root_command()
            .try_get_matches_from(["sou", "-v", "health"])
            .unwrap();
        assert!(is_verbose(&matches));
    }

    #[test]
    fn verbose_suppressed_with_json() {
        let matches = create_root_command()
            .try_get_matches_from(["sou", "--verbose", "--json", "health"])
            .unwrap();
        assert!(!is_verbose(&matches));
    }

    #[test]
    fn root_requires_subcommand() {
        assert!(create_root_command()
            .try_get_matches_from(["sou"])
            .is_err());
    }

    #[test]
    fn all_providers_registered() {
        let hash = "a".repeat(64);
        for provider in ["qqpd", "gying", "weibo"] {
            let matches = create_root_command()
                .try_get_matches_from(["sou", provider, "status", hash.as_str()])
                .unwrap();
            assert_eq!(matches.subcommand_name(), Some(provider));
        }
    }
}
