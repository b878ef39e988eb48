//! Command implementations.

pub mod agents;
pub mod auth;
pub mod cart;
pub mod profile;

use agent_market_client::{ConfigError, Error};
use thiserror::Error;

/// Errors surfaced to the terminal.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A client operation failed.
    #[error(transparent)]
    Client(#[from] Error),

    /// The catalog listing failed.
    #[error("{0}")]
    Catalog(String),

    /// A local file could not be written.
    #[error("Could not write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

/// Print an error for the user, with a login hint when one is needed.
#[allow(clippy::print_stderr)]
pub fn report(err: &CliError) {
    match err {
        CliError::Client(e) => {
            eprintln!("error: {}", e.user_message());
            if e.login_required() {
                eprintln!("hint: run `amk login` to sign in");
            }
        }
        other => eprintln!("error: {other}"),
    }
}
