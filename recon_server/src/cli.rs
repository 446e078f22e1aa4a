use std::env::{self, VarError};

use crate::config::TOKEN_ADDRESS_ENVS;

/// Non-secret settings, in the order they appear in the help text. The token contract addresses follow.
const SETTINGS_ENVS: [&str; 11] = [
    "RUST_LOG",
    "RECON_HOST",
    "RECON_PORT",
    "RECON_DATABASE_URL",
    "RECON_RUN_MIGRATIONS",
    "RECON_BLOCKSCOUT_URL",
    "RECON_INDEXER_TIMEOUT",
    "RECON_RATES_URL",
    "RECON_RATES_TIMEOUT",
    "RECON_PLATFORM_WALLET",
    "RECON_EVENT_BUFFER_SIZE",
];

/// The server takes no arguments. Any argument at all prints the help text and the current settings.
///
/// Returns true if the help was printed and the server should not start.
pub fn handle_command_line_args() -> bool {
    if env::args().len() <= 1 {
        return false;
    }
    println!("\n{}\n", include_str!("./cli-help.txt"));
    println!("Current settings (the indexer API key is never shown):");
    for name in displayed_envs() {
        println!("  {name:<35} {}", describe_env(env::var(name)));
    }
    true
}

fn displayed_envs() -> impl Iterator<Item = &'static str> {
    SETTINGS_ENVS.into_iter().chain(TOKEN_ADDRESS_ENVS.iter().map(|(_, var)| *var))
}

fn describe_env(value: Result<String, VarError>) -> String {
    match value {
        Ok(s) => s,
        Err(VarError::NotPresent) => "Not set".into(),
        Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
    }
}
