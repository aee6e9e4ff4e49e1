//! Tally CLI
//!
//! Command-line interface for the Tally gateway.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Tally ledger gateway CLI", long_about = None)]
struct Cli {
    /// Gateway URL
    #[arg(long, env = "TALLY_GATEWAY_URL", default_value = "http://localhost:3000")]
    gateway_url: String,

    /// API key returned by `tally login`
    #[arg(long, env = "TALLY_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        gateway_url: cli.gateway_url,
        api_key: cli.api_key,
    };

    handle_command(cli.command, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_message_create() {
        let cli = Cli::try_parse_from([
            "tally",
            "--api-key",
            "abc",
            "message",
            "create",
            "m1",
            "--message-id",
            "3",
            "--user-id",
            "5",
            "--content",
            "hello",
        ])
        .unwrap();

        assert_eq!(cli.gateway_url, "http://localhost:3000");
        assert_eq!(cli.api_key.as_deref(), Some("abc"));
        assert!(matches!(cli.command, Commands::Message { .. }));
    }

    #[test]
    fn test_login_requires_a_key_source() {
        assert!(Cli::try_parse_from(["tally", "login", "appUser"]).is_err());
        assert!(
            Cli::try_parse_from(["tally", "login", "appUser", "--private-key", "k", "--key-file", "f"])
                .is_err()
        );
    }

    #[test]
    fn test_job_wait_rejects_bad_uuid() {
        assert!(Cli::try_parse_from(["tally", "job", "wait", "not-a-uuid"]).is_err());
    }
}
