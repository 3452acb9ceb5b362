//! `mailgate` - operator CLI for the webmail gateway.
//!
//! Drives the same operations the HTTP layer uses and prints JSON.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{AccountCommand, Cli, Command};
use mailgate_core::{
    AccountId, AccountRepository, Attachment, ComposedMessage, ConnectionPool, FlagMode,
    GatewayConfig, GatewayService, SmtpSubmitter, Vault,
};

type Service = GatewayService<mailgate_core::ImapConnector, SmtpSubmitter>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailgate=info,mailgate_core=info,mailgate_imap=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = GatewayConfig::from_env().context("Failed to load configuration")?;
    if let Some(path) = cli.database {
        config.database_path = path;
    }
    debug!(?config, "Configuration loaded");

    if let Some(parent) = config.database_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let accounts = AccountRepository::new(&config.database_path.to_string_lossy())
        .await
        .context("Failed to open account database")?;

    let pool = Arc::new(ConnectionPool::new(config.pool_config()));
    let _sweeper = pool.spawn_sweeper();
    let service = GatewayService::new(
        accounts,
        Vault::new(&config.app_enc_key),
        Arc::clone(&pool),
        SmtpSubmitter::new(config.connect_timeout),
    );

    let result = run(&service, &config, cli.command).await;
    pool.shutdown().await;
    result
}

async fn run(service: &Service, config: &GatewayConfig, command: Command) -> Result<()> {
    match command {
        Command::Account(AccountCommand::Add(args)) => {
            let record = args.record(&config.default_imap, &config.default_smtp)?;
            let id = service
                .add_account(&args.username, &record)
                .await
                .context("Failed to add account")?;
            info!(account = %id, "Account stored");
            print(&serde_json::json!({ "id": id }))
        }
        Command::Account(AccountCommand::Refresh { account, record }) => {
            let credentials = record.record(&config.default_imap, &config.default_smtp)?;
            service
                .refresh_credentials(AccountId::new(account), &credentials)
                .await
                .context("Failed to refresh credentials")?;
            print(&serde_json::json!({ "id": account, "refreshed": true }))
        }
        Command::Account(AccountCommand::List) => {
            print(&service.accounts().list_accounts().await?)
        }
        Command::Account(AccountCommand::Remove { account }) => {
            let id = AccountId::new(account);
            service.accounts().delete_account(id).await?;
            service.pool().release(id).await;
            print(&serde_json::json!({ "id": account, "removed": true }))
        }
        Command::Verify(args) => {
            let record = args.record(&config.default_imap, &config.default_smtp)?;
            service
                .verify_credentials(&record)
                .await
                .context("Verification failed")?;
            print(&serde_json::json!({ "verified": true }))
        }
        Command::Folders(target) => print(&service.list_folders(&target.context()).await?),
        Command::Messages {
            target,
            mailbox,
            cursor,
            limit,
        } => print(
            &service
                .list_messages(&target.context(), &mailbox, cursor, limit)
                .await?,
        ),
        Command::Show { message } => {
            let detail = service
                .get_message(&message.target.context(), &message.mailbox, message.uid)
                .await?
                .with_context(|| format!("No message {} in {}", message.uid, message.mailbox))?;
            print(&detail)
        }
        Command::Attachment {
            message,
            part,
            output,
        } => {
            let content = service
                .download_attachment(&message.target.context(), &message.mailbox, message.uid, &part)
                .await?
                .with_context(|| format!("No part {part} in message {}", message.uid))?;
            let path = output.unwrap_or_else(|| content.filename.clone().into());
            tokio::fs::write(&path, &content.data)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print(&serde_json::json!({
                "path": path,
                "filename": content.filename,
                "mime_type": content.mime_type,
                "size": content.data.len(),
            }))
        }
        Command::Flag {
            message,
            flags,
            remove,
        } => {
            let mode = if remove { FlagMode::Remove } else { FlagMode::Add };
            service
                .set_flags(&message.target.context(), &message.mailbox, message.uid, &flags, mode)
                .await?;
            print(&serde_json::json!({ "uid": message.uid, "flags": flags, "removed": remove }))
        }
        Command::Delete { message, hard } => {
            let ctx = message.target.context();
            if hard {
                service
                    .delete_message(&ctx, &message.mailbox, message.uid)
                    .await?;
                print(&serde_json::json!({ "outcome": "deleted", "fallback": false }))
            } else {
                print(&service.trash_message(&ctx, &message.mailbox, message.uid).await?)
            }
        }
        Command::Move { message, to } => {
            service
                .move_message(&message.target.context(), &message.mailbox, &to, message.uid)
                .await?;
            print(&serde_json::json!({ "uid": message.uid, "moved_to": to }))
        }
        Command::Spam { message, undo } => {
            let folder = service
                .mark_spam(&message.target.context(), &message.mailbox, message.uid, !undo)
                .await?;
            print(&serde_json::json!({ "uid": message.uid, "spam_folder": folder, "spam": !undo }))
        }
        Command::Send(args) => {
            let mut attachments = Vec::with_capacity(args.attachments.len());
            for spec in &args.attachments {
                let (path, mime_type) = cli::attachment_spec(spec);
                let data = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                attachments.push(Attachment::new(cli::file_name(&path)?, mime_type, data));
            }
            let message = ComposedMessage {
                from: args.from,
                to: args.to,
                cc: args.cc,
                bcc: args.bcc,
                subject: args.subject,
                text: args.text,
                html: args.html,
                attachments,
            };
            let report = service
                .send_mail(&args.target.context(), message)
                .await
                .context("Failed to send message")?;
            print(&report)
        }
    }
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
