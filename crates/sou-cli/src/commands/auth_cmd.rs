//! The `auth` command: login, logout, status, verify.

use clap::{Arg, ArgMatches, Command};

use sou_lib::errors::{Result, SouError};
use sou_lib::output;
use sou_lib::session::TokenStore;

use super::Services;

/// Build the `auth` clap command with all subcommands.
pub fn auth_command() -> Command {
    Command::new("auth")
        .about("Manage the backend session")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("login")
                .about("Log in and store the session token")
                .arg(
                    Arg::new("username")
                        .long("username")
                        .short('u')
                        .help("Account name (prompted when omitted)"),
                ),
        )
        .subcommand(Command::new("logout").about("Invalidate and clear the session"))
        .subcommand(Command::new("status").about("Show the composite auth status"))
        .subcommand(Command::new("verify").about("Check the stored token against the backend"))
}

/// Handle the `auth` command dispatch.
pub async fn handle_auth(matches: &ArgMatches, services: &Services) -> Result<()> {
    match matches.subcommand() {
        Some(("login", sub)) => handle_login(sub, services).await,
        Some(("logout", _)) => handle_logout(services).await,
        Some(("status", sub)) => handle_status(sub, services).await,
        Some(("verify", _)) => handle_verify(services).await,
        _ => unreachable!("subcommand_required is set"),
    }
}

/// Mask a token for display: show last 4 chars, mask the rest.
/// Tokens shorter than 4 chars are fully masked.
pub fn mask_token(token: &str) -> String {
    let len = token.len();
    if len < 4 {
        "*".repeat(len)
    } else {
        format!("{}{}", "*".repeat(len - 4), &token[len - 4..])
    }
}

/// Render a unix timestamp for display.
pub fn format_expiry(ts: i64) -> String {
    match chrono::DateTime::from_timestamp(ts, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => ts.to_string(),
    }
}

async fn handle_login(matches: &ArgMatches, services: &Services) -> Result<()> {
    let username = match matches.get_one::<String>("username") {
        Some(u) => u.clone(),
        None => dialoguer::Input::new()
            .with_prompt("Username")
            .interact_text()
            .map_err(|e| SouError::Application(format!("prompt failed: {e}")))?,
    };
    let password = dialoguer::Password::new()
        .with_prompt("Password")
        .interact()
        .map_err(|e| SouError::Application(format!("prompt failed: {e}")))?;

    let resp = services.auth_client()?.login(&username, &password).await?;
    services.store.set(resp.clone().into()).await;

    output::success("Login successful.");
    output::kv("user", &resp.username);
    output::kv("token", &mask_token(&resp.token));
    output::kv("expires", &format_expiry(resp.expires_at));
    Ok(())
}

async fn handle_logout(services: &Services) -> Result<()> {
    services.auth_client()?.logout().await;
    output::success("Logged out.");
    Ok(())
}

async fn handle_status(matches: &ArgMatches, services: &Services) -> Result<()> {
    let status = services.auth_client()?.check_auth_status().await;

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    output::kv("auth", if status.enabled { "enabled" } else { "disabled" });
    output::kv(
        "authenticated",
        if status.authenticated { "yes" } else { "no" },
    );

    if let Some(session) = services.store.session().await {
        output::kv("user", &session.username);
        output::kv("token", &mask_token(&session.token));
        if let Some(ts) = session.expires_at {
            let marker = if session.is_expired() { " (expired)" } else { "" };
            output::kv("expires", &format!("{}{}", format_expiry(ts), marker));
        }
    } else {
        output::info("No stored session.");
    }
    Ok(())
}

async fn handle_verify(services: &Services) -> Result<()> {
    if services.auth_client()?.verify_token().await {
        output::success("Token is valid.");
    } else {
        output::warning("Token is missing, invalid, or the backend is unreachable.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_token_keeps_last_four() {
        assert_eq!(mask_token("abcdefgh"), "****efgh");
        assert_eq!(mask_token("abcd"), "abcd");
    }

    #[test]
    fn mask_token_short_tokens_fully_masked() {
        assert_eq!(mask_token("abc"), "***");
        assert_eq!(mask_token(""), "");
    }

    #[test]
    fn format_expiry_renders_utc() {
        assert_eq!(format_expiry(0), "1970-01-01 00:00:00 UTC");
    }

    #[test]
    fn auth_command_tree() {
        for sub in ["login", "logout", "status", "verify"] {
            assert!(auth_command().try_get_matches_from(["auth", sub]).is_ok());
        }
        assert!(auth_command().try_get_matches_from(["auth"]).is_err());
        assert!(auth_command()
            .try_get_matches_from(["auth", "login", "-u", "alice"])
            .is_ok());
    }
}
