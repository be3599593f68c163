//! Provider session commands.
//!
//! One command tree serves all three providers; subcommands appear only
//! when the provider's action set supports them (gying gets `login`, the
//! QR providers get `qrcode`/`wait-login`, and so on).

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clap::{Arg, ArgMatches, Command};

use sou_lib::errors::{Result, SouError};
use sou_lib::output;
use sou_lib::plugins::{
    LoginPhase, PluginAction, PluginClient, PluginStatus, Provider, TestSearch,
};
use sou_lib::signal;

use super::Services;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Build the command tree for one provider.
pub fn provider_command(provider: Provider) -> Command {
    let mut cmd = Command::new(provider.path_prefix())
        .about(format!("{} provider session", provider.display_name()))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("hash")
                .about("Resolve the session hash for an identifier")
                .arg(Arg::new("identifier").required(true).help(
                    "Username, QQ number, or UID the backend maps to a session hash",
                )),
        )
        .subcommand(
            Command::new("status")
                .about("Show the session status")
                .arg(hash_arg()),
        )
        .subcommand(
            Command::new("test-search")
                .about("Run a bounded test search")
                .arg(hash_arg())
                .arg(Arg::new("keyword").required(true).help("Search keyword"))
                .arg(
                    Arg::new("max")
                        .long("max")
                        .value_parser(clap::value_parser!(u32))
                        .help("Result cap (default 10)"),
                ),
        )
        .subcommand(
            Command::new("logout")
                .about("End the provider session")
                .arg(hash_arg()),
        );

    if provider.supports(PluginAction::RefreshQrcode) {
        cmd = cmd.subcommand(
            Command::new("qrcode")
                .about("Generate a fresh login QR code")
                .arg(hash_arg())
                .arg(
                    Arg::new("out")
                        .long("out")
                        .short('o')
                        .help("Output PNG path (default <provider>-qrcode.png)"),
                ),
        );
    }
    if provider.supports(PluginAction::CheckLogin) {
        cmd = cmd.subcommand(
            Command::new("wait-login")
                .about("Poll until a scanned QR login completes")
                .arg(hash_arg()),
        );
    }
    if provider.supports(PluginAction::Login) {
        cmd = cmd.subcommand(
            Command::new("login")
                .about("Log in with provider credentials")
                .arg(hash_arg())
                .arg(
                    Arg::new("username")
                        .long("username")
                        .short('u')
                        .help("Provider account name (prompted when omitted)"),
                ),
        );
    }
    if provider.supports(PluginAction::SetChannels) {
        cmd = cmd.subcommand(
            Command::new("set-channels")
                .about("Replace the tracked channel list")
                .arg(hash_arg())
                .arg(
                    Arg::new("channels")
                        .required(true)
                        .num_args(1..)
                        .help("Channel identifiers"),
                ),
        );
    }
    if provider.supports(PluginAction::SetUserIds) {
        cmd = cmd.subcommand(
            Command::new("set-uids")
                .about("Replace the tracked user-id list")
                .arg(hash_arg())
                .arg(
                    Arg::new("uids")
                        .required(true)
                        .num_args(1..)
                        .help("User IDs"),
                ),
        );
    }

    cmd
}

fn hash_arg() -> Arg {
    Arg::new("hash")
        .required(true)
        .help("64-character session hash (see the `hash` subcommand)")
}

/// Handle one provider's command dispatch.
pub async fn handle_provider(
    provider: Provider,
    matches: &ArgMatches,
    services: &Services,
) -> Result<()> {
    let client = services.plugin_client(provider)?;

    match matches.subcommand() {
        Some(("hash", sub)) => {
            let identifier = sub.get_one::<String>("identifier").unwrap();
            let hash = client.resolve_hash(identifier).await?;
            println!("{hash}");
            Ok(())
        }
        Some(("status", sub)) => {
            let status = client.get_status(arg_hash(sub)).await?;
            if sub.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(provider, &status);
            }
            Ok(())
        }
        Some(("qrcode", sub)) => {
            let qr = client.refresh_qrcode(arg_hash(sub)).await?;
            let path = sub
                .get_one::<String>("out")
                .cloned()
                .unwrap_or_else(|| format!("{provider}-qrcode.png"));
            save_qrcode(&qr.qrcode_base64, &path).await?;
            output::success(&format!("QR code written to {path}"));
            output::info(&format!(
                "Scan it, then run `sou {provider} wait-login <hash>`."
            ));
            Ok(())
        }
        Some(("wait-login", sub)) => wait_login(provider, &client, arg_hash(sub)).await,
        Some(("login", sub)) => {
            let username = match sub.get_one::<String>("username") {
                Some(u) => u.clone(),
                None => dialoguer::Input::new()
                    .with_prompt("Provider username")
                    .interact_text()
                    .map_err(|e| SouError::Application(format!("prompt failed: {e}")))?,
            };
            let password = dialoguer::Password::new()
                .with_prompt("Provider password")
                .interact()
                .map_err(|e| SouError::Application(format!("prompt failed: {e}")))?;

            let login = client.login(arg_hash(sub), &username, &password).await?;
            output::success(&format!("Login {}", login.status));
            if let Some(masked) = login.username_masked {
                output::kv("account", &masked);
            }
            Ok(())
        }
        Some(("set-channels", sub)) => {
            let channels: Vec<String> = sub
                .get_many::<String>("channels")
                .unwrap()
                .cloned()
                .collect();
            let update = client.set_channels(arg_hash(sub), &channels).await?;
            output::success(&format!("{} channel(s) tracked.", update.channel_count));
            if !update.invalid_channels.is_empty() {
                output::warning(&format!(
                    "Rejected: {}",
                    update.invalid_channels.join(", ")
                ));
            }
            Ok(())
        }
        Some(("set-uids", sub)) => {
            let uids: Vec<String> = sub.get_many::<String>("uids").unwrap().cloned().collect();
            let update = client.set_user_ids(arg_hash(sub), &uids).await?;
            output::success(&format!("{} user id(s) tracked.", update.user_id_count));
            if !update.invalid_user_ids.is_empty() {
                output::warning(&format!("Rejected: {}", update.invalid_user_ids.join(", ")));
            }
            Ok(())
        }
        Some(("test-search", sub)) => {
            let result = client
                .test_search(
                    arg_hash(sub),
                    sub.get_one::<String>("keyword").unwrap(),
                    sub.get_one::<u32>("max").copied(),
                )
                .await?;
            if sub.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_test_search(&result);
            }
            Ok(())
        }
        Some(("logout", sub)) => {
            let logout = client.logout(arg_hash(sub)).await?;
            output::success(&format!("Session {}.", logout.status));
            Ok(())
        }
        _ => unreachable!("subcommand_required is set"),
    }
}

fn arg_hash(matches: &ArgMatches) -> &str {
    matches.get_one::<String>("hash").unwrap()
}

fn print_status(provider: Provider, status: &PluginStatus) {
    output::kv("provider", provider.display_name());
    output::kv("hash", &status.hash);
    output::kv("logged in", if status.logged_in { "yes" } else { "no" });
    output::kv("state", &status.status.to_string());
    if let Some(identity) = status.identity_masked() {
        output::kv("account", identity);
    }
    if let Some(ref t) = status.login_time {
        output::kv("login time", t);
    }
    if let Some(ref t) = status.expire_time {
        let days = status
            .expires_in_days
            .map(|d| format!(" ({d} day(s) left)"))
            .unwrap_or_default();
        output::kv("expires", &format!("{t}{days}"));
    }
    if let Some(ref channels) = status.channels {
        output::kv("channels", &channels.join(", "));
    }
    if let Some(ref user_ids) = status.user_ids {
        output::kv("user ids", &user_ids.join(", "));
    }
    if status.qrcode_base64.is_some() {
        output::info(&format!(
            "A login QR code is pending; run `sou {provider} qrcode <hash>` to save it."
        ));
    }
}

fn print_test_search(result: &TestSearch) {
    output::info(&format!(
        "{} result(s) for \"{}\"",
        result.total_results, result.keyword
    ));
    if let Some(ref channels) = result.channels_searched {
        output::kv("channels", &channels.join(", "));
    }
    if let Some(ref user_ids) = result.user_ids_searched {
        output::kv("user ids", &user_ids.join(", "));
    }
    for item in &result.results {
        println!();
        println!("{}", item.title);
        for link in &item.links {
            println!("  [{}] {}", link.link_type, link.url);
        }
    }
}

async fn save_qrcode(qrcode_base64: &str, path: &str) -> Result<()> {
    let payload = qrcode_base64
        .strip_prefix("data:image/png;base64,")
        .unwrap_or(qrcode_base64);
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| SouError::Application(format!("invalid QR code payload: {e}")))?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

async fn wait_login(provider: Provider, client: &PluginClient, hash: &str) -> Result<()> {
    let cancel = signal::install();
    output::info("Waiting for the QR code to be scanned (ctrl-c to stop)...");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                output::info("Stopped waiting.");
                return Ok(());
            }
            _ = tokio::time::sleep(POLL_INTERVAL) => {
                let check = client.check_login(hash).await?;
                match check.login_status {
                    LoginPhase::Success => {
                        output::success("Login completed.");
                        if let Some(identity) = check.qq_masked.or(check.uid) {
                            output::kv("account", &identity);
                        }
                        return Ok(());
                    }
                    LoginPhase::Expired => {
                        return Err(SouError::Auth(format!(
                            "QR code expired; run `sou {provider} qrcode {hash}` for a fresh one"
                        )));
                    }
                    LoginPhase::Waiting => {}
                }
            }
        }
    }
}
