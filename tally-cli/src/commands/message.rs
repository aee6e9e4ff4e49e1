//! Message command handlers
//!
//! Reads go straight to the ledger; mutations print the accepted job and
//! optionally wait for it.

use std::time::Duration;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use clap::{Args, Subcommand};
use colored::*;
use serde_json::Number;
use tally_client::GatewayClient;
use tally_core::domain::message::Message;
use tally_core::dto::job::JobAccepted;
use tally_core::dto::message::MessageInput;

use crate::commands::job::wait_and_print;
use crate::config::Config;

/// Message subcommands
#[derive(Subcommand)]
pub enum MessageCommands {
    /// List all messages
    List,
    /// Get a single message
    Get { id: String },
    /// List messages sharing a messageId
    ByMessageId { message_id: String },
    /// Queue a new message
    Create {
        #[command(flatten)]
        fields: MessageFields,
        #[command(flatten)]
        wait: WaitArgs,
    },
    /// Queue a full replacement of a message
    Update {
        #[command(flatten)]
        fields: MessageFields,
        #[command(flatten)]
        wait: WaitArgs,
    },
    /// Queue a transfer of a message to another user
    Transfer {
        id: String,
        #[arg(long)]
        user_id: i64,
        #[command(flatten)]
        wait: WaitArgs,
    },
    /// Queue a delete
    Delete {
        id: String,
        #[command(flatten)]
        wait: WaitArgs,
    },
}

#[derive(Args)]
pub struct MessageFields {
    /// Message id
    pub id: String,
    #[arg(long)]
    pub message_id: i64,
    #[arg(long)]
    pub user_id: i64,
    #[arg(long)]
    pub content: String,
    /// Message type
    #[arg(long = "type", default_value_t = 0)]
    pub kind: i64,
    /// RFC 3339 timestamp, defaults to now
    #[arg(long)]
    pub created_at: Option<String>,
}

impl MessageFields {
    fn into_input(self) -> MessageInput {
        MessageInput {
            id: self.id,
            message_id: Number::from(self.message_id),
            user_id: Number::from(self.user_id),
            content: self.content,
            kind: Number::from(self.kind),
            created_at: self
                .created_at
                .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

#[derive(Args)]
pub struct WaitArgs {
    /// Wait for the job to finish
    #[arg(long)]
    pub wait: bool,

    /// Give up waiting after this many seconds
    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,
}

/// Handle message commands
pub async fn handle_message_command(command: MessageCommands, config: &Config) -> Result<()> {
    let client = config.client()?;

    match command {
        MessageCommands::List => {
            let messages = client.list_messages().await?;
            print_message_list(&messages, "No messages found.");
            Ok(())
        }
        MessageCommands::Get { id } => {
            let message = client.read_message(&id).await?;
            print_message_details(&message);
            Ok(())
        }
        MessageCommands::ByMessageId { message_id } => {
            let messages = client.messages_by_message_id(&message_id).await?;
            print_message_list(
                &messages,
                &format!("No messages found with messageId {}.", message_id),
            );
            Ok(())
        }
        MessageCommands::Create { fields, wait } => {
            let accepted = client.create_message(&fields.into_input()).await?;
            report_accepted(&client, accepted, wait).await
        }
        MessageCommands::Update { fields, wait } => {
            let id = fields.id.clone();
            let accepted = client.update_message(&id, &fields.into_input()).await?;
            report_accepted(&client, accepted, wait).await
        }
        MessageCommands::Transfer { id, user_id, wait } => {
            let accepted = client.transfer_message(&id, Number::from(user_id)).await?;
            report_accepted(&client, accepted, wait).await
        }
        MessageCommands::Delete { id, wait } => {
            let accepted = client.delete_message(&id).await?;
            report_accepted(&client, accepted, wait).await
        }
    }
}

async fn report_accepted(client: &GatewayClient, accepted: JobAccepted, wait: WaitArgs) -> Result<()> {
    println!("{}", "✓ Mutation queued".green().bold());
    println!("  Job ID: {}", accepted.job_id.to_string().cyan());

    if !wait.wait {
        println!(
            "{}",
            format!("  Check progress with: tally job get {}", accepted.job_id).dimmed()
        );
        return Ok(());
    }

    println!();
    wait_and_print(
        client,
        accepted.job_id,
        Duration::from_millis(500),
        Duration::from_secs(wait.timeout_secs),
    )
    .await
}

fn print_message_list(messages: &[Message], empty: &str) {
    if messages.is_empty() {
        println!("{}", empty.yellow());
        return;
    }

    println!("{}", format!("Found {} message(s):", messages.len()).bold());
    println!();
    for message in messages {
        println!("  {} Message {}", "▸".cyan(), message.id.bold());
        println!("    messageId: {}", message.message_id);
        println!("    userId:    {}", message.user_id);
        println!("    content:   {}", message.content);
        println!();
    }
}

fn print_message_details(message: &Message) {
    println!("{}", "Message Details:".bold());
    println!("  ID:         {}", message.id.cyan());
    println!("  Message ID: {}", message.message_id);
    println!("  User ID:    {}", message.user_id);
    println!("  Type:       {}", message.kind);
    println!("  Created:    {}", message.created_at.dimmed());
    println!("  Content:    {}", message.content);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_into_input_keeps_explicit_timestamp() {
        let fields = MessageFields {
            id: "m1".to_string(),
            message_id: 3,
            user_id: 5,
            content: "hello".to_string(),
            kind: 0,
            created_at: Some("2025-04-04T10:00:00Z".to_string()),
        };

        let input = fields.into_input();
        assert_eq!(input.message_id, Number::from(3));
        assert_eq!(input.user_id, Number::from(5));
        assert_eq!(input.created_at, "2025-04-04T10:00:00Z");
    }

    #[test]
    fn test_fields_into_input_defaults_timestamp() {
        let fields = MessageFields {
            id: "m1".to_string(),
            message_id: 3,
            user_id: 5,
            content: "hello".to_string(),
            kind: 1,
            created_at: None,
        };

        let input = fields.into_input();
        assert!(chrono::DateTime::parse_from_rfc3339(&input.created_at).is_ok());
    }
}
