//! The `search` and `health` commands.

use clap::{Arg, ArgAction, ArgMatches, Command};

use sou_lib::errors::Result;
use sou_lib::output;
use sou_lib::search::{ResultShape, SearchParams, SearchResponse, SourceFilter};
use sou_lib::utils::disk_types;

use super::Services;

/// Build the `search` clap command.
pub fn search_command() -> Command {
    Command::new("search")
        .about("Search channels and plugins")
        .arg(Arg::new("keyword").required(true).help("Search keyword"))
        .arg(
            Arg::new("refresh")
                .long("refresh")
                .action(ArgAction::SetTrue)
                .help("Bypass the backend cache"),
        )
        .arg(
            Arg::new("res")
                .long("res")
                .value_parser(["all", "results", "merge"])
                .default_value("all")
                .help("Result shape to request"),
        )
        .arg(
            Arg::new("src")
                .long("src")
                .value_parser(["all", "tg", "plugin"])
                .default_value("all")
                .help("Source filter"),
        )
        .arg(
            Arg::new("plugins")
                .long("plugins")
                .value_delimiter(',')
                .help("Comma-separated plugin allow-list"),
        )
        .arg(
            Arg::new("channels")
                .long("channels")
                .value_delimiter(',')
                .help("Comma-separated channel allow-list"),
        )
        .arg(
            Arg::new("cloud-types")
                .long("cloud-types")
                .value_delimiter(',')
                .help("Comma-separated storage-provider codes"),
        )
}

/// Build the `health` clap command.
pub fn health_command() -> Command {
    Command::new("health").about("Show backend health")
}

pub async fn handle_search(matches: &ArgMatches, services: &Services) -> Result<()> {
    let mut params = SearchParams::new(matches.get_one::<String>("keyword").unwrap().clone());
    params.refresh = matches.get_flag("refresh");
    params.result_shape = matches
        .get_one::<String>("res")
        .unwrap()
        .parse::<ResultShape>()
        .expect("value_parser restricts values");
    params.source = matches
        .get_one::<String>("src")
        .unwrap()
        .parse::<SourceFilter>()
        .expect("value_parser restricts values");
    params.plugins = collect(matches, "plugins");
    params.channels = collect(matches, "channels");
    params.cloud_types = collect(matches, "cloud-types");

    let resp = services.search_client()?.search(&params).await?;

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&resp)?);
        return Ok(());
    }

    print_search_response(&resp);
    Ok(())
}

pub async fn handle_health(matches: &ArgMatches, services: &Services) -> Result<()> {
    let health = services.search_client()?.health().await?;

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&health)?);
        return Ok(());
    }

    output::kv("status", &health.status);
    output::kv(
        "auth",
        if health.auth_enabled.unwrap_or(false) {
            "enabled"
        } else {
            "disabled"
        },
    );
    output::kv(
        "plugins",
        &format!("{} ({})", health.plugin_count, health.plugins.join(", ")),
    );
    output::kv("channels", &health.channels.join(", "));
    Ok(())
}

fn collect(matches: &ArgMatches, id: &str) -> Vec<String> {
    matches
        .get_many::<String>(id)
        .map(|vals| vals.cloned().collect())
        .unwrap_or_default()
}

fn print_search_response(resp: &SearchResponse) {
    output::info(&format!("Total results: {}", resp.total));

    let mut types: Vec<_> = resp.merged_by_type.iter().collect();
    types.sort_by(|a, b| a.0.cmp(b.0));
    for (code, items) in types {
        println!();
        output::success(&format!(
            "[{}] {} link(s)",
            disk_types::display_name(code),
            items.len()
        ));
        for item in items {
            let password = item
                .password
                .as_deref()
                .filter(|p| !p.is_empty())
                .map(|p| format!(" (password: {p})"))
                .unwrap_or_default();
            println!("  {}{}  {}", item.url, password, item.note);
        }
    }

    if resp.merged_by_type.is_empty() {
        for item in &resp.results {
            println!();
            println!("{}", item.title);
            for link in &item.links {
                println!("  [{}] {}", disk_types::display_name(&link.link_type), link.url);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_command_parses_filters() {
        let matches = search_command()
            .try_get_matches_from([
                "search",
                "movie",
                "--refresh",
                "--res",
                "merge",
                "--src",
                "plugin",
                "--plugins",
                "pansearch,hdr4k",
                "--cloud-types",
                "baidu",
            ])
            .unwrap();

        assert_eq!(matches.get_one::<String>("keyword").unwrap(), "movie");
        assert!(matches.get_flag("refresh"));
        assert_eq!(matches.get_one::<String>("res").unwrap(), "merge");
        assert_eq!(collect(&matches, "plugins"), vec!["pansearch", "hdr4k"]);
        assert_eq!(collect(&matches, "cloud-types"), vec!["baidu"]);
        assert!(collect(&matches, "channels").is_empty());
    }

    #[test]
    fn search_command_rejects_bad_shape() {
        assert!(search_command()
            .try_get_matches_from(["search", "movie", "--res", "bogus"])
            .is_err());
    }

    #[test]
    fn search_command_requires_keyword() {
        assert!(search_command().try_get_matches_from(["search"]).is_err());
    }
}
