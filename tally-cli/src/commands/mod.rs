//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod job;
mod login;
mod message;

pub use job::JobCommands;
pub use login::LoginArgs;
pub use message::MessageCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Log in with a wallet identity and print an API key
    Login(LoginArgs),
    /// Message queries and mutations
    Message {
        #[command(subcommand)]
        command: MessageCommands,
    },
    /// Job status
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Login(args) => login::handle_login(args, config).await,
        Commands::Message { command } => message::handle_message_command(command, config).await,
        Commands::Job { command } => job::handle_job_command(command, config).await,
    }
}
