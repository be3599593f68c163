use thiserror::Error;

#[derive(Error, Debug)]
pub enum SouError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Plugin error ({provider}): {message}")]
    Plugin { provider: String, message: String },

    #[error("Hash extraction failed: {0}")]
    HashExtract(String),

    #[error("{0}")]
    Application(String),
}

pub type Result<T> = std::result::Result<T, SouError>;

/// Logs a fatal error and exits the process with code 1.
///
/// This function never returns (`-> !`). It is intended for unrecoverable
/// errors during initialization or command execution.
pub fn handle_fatal(err: SouError) -> ! {
    tracing::error!("Fatal error: {}", err);
    std::process::exit(1)
}

/// Maps a `SouError` to user-friendly CLI output with actionable suggestions.
///
/// Uses `crate::output::error()` for the main error message and
/// `crate::output::info()` for hints and suggestions.
pub fn handle_command_error(err: &SouError) {
    use crate::output;

    match err {
        SouError::Auth(msg) => {
            output::error(&format!("Authentication error: {}", msg));
            output::info("Run `sou auth login` to authenticate.");
        }
        SouError::Server { status: 401, message } => {
            output::error(&format!("Unauthorized: {}", message));
            output::info("Your session has expired. Run `sou auth login` to authenticate.");
        }
        SouError::Server { status, message } => {
            output::error(&format!("Server error ({}): {}", status, message));
        }
        SouError::Plugin { provider, message } => {
            output::error(&format!("{} error: {}", provider, message));
            output::info(&format!(
                "Run `sou {} status <hash>` to inspect the session.",
                provider
            ));
        }
        SouError::HashExtract(msg) => {
            output::error(&format!("Hash extraction failed: {}", msg));
            output::info("Check the identifier and that the backend is reachable.");
        }
        SouError::Http(e) => {
            output::error(&format!("Network error: {}", e));
            output::info("Check your internet connection and the configured API origin.");
        }
        SouError::Config(msg) => {
            output::error(&format!("Configuration error: {}", msg));
        }
        SouError::Io(e) => {
            output::error(&format!("File error: {}", e));
        }
        _ => {
            output::error(&format!("{}", err));
        }
    }
}
