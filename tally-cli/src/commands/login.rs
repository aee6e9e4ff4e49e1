//! Login command handler

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::*;

use crate::config::Config;

#[derive(Args)]
pub struct LoginArgs {
    /// Wallet user id
    pub user_id: String,

    /// Private key in PEM form
    #[arg(long, conflicts_with = "key_file", required_unless_present = "key_file")]
    pub private_key: Option<String>,

    /// Read the private key from a file
    #[arg(long)]
    pub key_file: Option<PathBuf>,
}

pub async fn handle_login(args: LoginArgs, config: &Config) -> Result<()> {
    let private_key = match (args.private_key, args.key_file) {
        (Some(key), _) => key,
        (None, Some(path)) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read key file {}", path.display()))?,
        (None, None) => anyhow::bail!("Either --private-key or --key-file is required"),
    };

    let client = config.anonymous_client();
    let response = client.login(&args.user_id, &private_key).await?;

    println!("{}", "✓ Login successful".green().bold());
    println!("  User:    {}", response.user_id.cyan());
    println!("  API key: {}", response.api_key);
    println!();
    println!(
        "{}",
        format!("export TALLY_API_KEY={}", response.api_key).dimmed()
    );

    Ok(())
}
