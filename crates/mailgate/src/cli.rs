//! Command line definitions.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use mailgate_core::{AccountContext, AccountId, CredentialRecord, Endpoint, Identities, Identity, Security};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path of the account database, overriding `DATABASE_URL`
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage stored accounts
    #[command(subcommand)]
    Account(AccountCommand),

    /// Check credentials against the servers without storing them
    Verify(RecordArgs),

    /// List mailboxes
    Folders(Target),

    /// List one page of a mailbox, newest first
    Messages {
        #[command(flatten)]
        target: Target,
        #[arg(short, long, default_value = "INBOX")]
        mailbox: String,
        /// Last UID of the previous page
        #[arg(long)]
        cursor: Option<u32>,
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show a message with its decoded bodies
    Show {
        #[command(flatten)]
        message: MessageRef,
    },

    /// Save an attachment to disk
    Attachment {
        #[command(flatten)]
        message: MessageRef,
        /// Part id as listed by `show`, e.g. `2` or `1.2`
        #[arg(short, long)]
        part: String,
        /// Output file; the attachment's own name when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Add or remove flags
    Flag {
        #[command(flatten)]
        message: MessageRef,
        /// Flags such as `\Seen` or `\Flagged`
        #[arg(short, long = "flag", required = true)]
        flags: Vec<String>,
        /// Remove instead of add
        #[arg(long)]
        remove: bool,
    },

    /// Move a message to Trash, or delete it permanently
    Delete {
        #[command(flatten)]
        message: MessageRef,
        /// Skip Trash and expunge right away
        #[arg(long)]
        hard: bool,
    },

    /// Move a message to another mailbox
    Move {
        #[command(flatten)]
        message: MessageRef,
        /// Target mailbox
        #[arg(short, long)]
        to: String,
    },

    /// Move a message to the spam folder, or back to INBOX
    Spam {
        #[command(flatten)]
        message: MessageRef,
        /// Move back to INBOX
        #[arg(long)]
        undo: bool,
    },

    /// Send a message and archive a copy into Sent
    Send(SendArgs),
}

#[derive(Subcommand, Debug)]
pub enum AccountCommand {
    /// Verify, encrypt and store an account
    Add(RecordArgs),
    /// Replace the credentials of a stored account
    Refresh {
        #[arg(short, long)]
        account: i64,
        #[command(flatten)]
        record: RecordArgs,
    },
    /// List stored accounts
    List,
    /// Remove a stored account
    Remove {
        #[arg(short, long)]
        account: i64,
    },
}

/// Which account and identity to act as.
#[derive(Args, Debug)]
pub struct Target {
    #[arg(short, long, env = "MAILGATE_ACCOUNT")]
    pub account: i64,
    /// Sub-account identity id
    #[arg(long)]
    pub sub: Option<String>,
}

impl Target {
    pub fn context(&self) -> AccountContext {
        let ctx = AccountContext::new(AccountId::new(self.account));
        match &self.sub {
            Some(sub) => ctx.with_sub_account(sub.clone()),
            None => ctx,
        }
    }
}

#[derive(Args, Debug)]
pub struct MessageRef {
    #[command(flatten)]
    pub target: Target,
    #[arg(short, long, default_value = "INBOX")]
    pub mailbox: String,
    #[arg(short, long)]
    pub uid: u32,
}

/// Servers and identities of an account.
#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Login of the primary identity
    #[arg(long)]
    pub username: String,
    #[arg(long, env = "MAILGATE_PASSWORD", hide_env_values = true)]
    pub password: String,
    #[arg(long)]
    pub imap_host: Option<String>,
    #[arg(long)]
    pub imap_port: Option<u16>,
    /// `tls`, `starttls` or `none`
    #[arg(long)]
    pub imap_security: Option<String>,
    #[arg(long)]
    pub smtp_host: Option<String>,
    #[arg(long)]
    pub smtp_port: Option<u16>,
    /// `tls`, `starttls` or `none`
    #[arg(long)]
    pub smtp_security: Option<String>,
    /// Extra identity as `id:username:password`
    #[arg(long = "identity")]
    pub identities: Vec<String>,
}

impl RecordArgs {
    /// Builds the record, filling unset endpoint fields from the defaults.
    pub fn record(&self, default_imap: &Endpoint, default_smtp: &Endpoint) -> Result<CredentialRecord> {
        let imap = endpoint(
            default_imap,
            self.imap_host.as_deref(),
            self.imap_port,
            self.imap_security.as_deref(),
        );
        let smtp = endpoint(
            default_smtp,
            self.smtp_host.as_deref(),
            self.smtp_port,
            self.smtp_security.as_deref(),
        );
        let primary = Identity::new("primary", &self.username, &self.password);

        if self.identities.is_empty() {
            return Ok(CredentialRecord::single(imap, smtp, primary));
        }
        let identities = self
            .identities
            .iter()
            .map(|spec| parse_identity(spec))
            .collect::<Result<Vec<_>>>()?;
        Ok(CredentialRecord {
            imap,
            smtp,
            identities: Identities::Multi { primary, identities },
        })
    }
}

fn endpoint(default: &Endpoint, host: Option<&str>, port: Option<u16>, security: Option<&str>) -> Endpoint {
    Endpoint::new(
        host.unwrap_or(&default.host),
        port.unwrap_or(default.port),
        security.map_or(default.security, |s| Security::from_name(&s.to_ascii_lowercase())),
    )
}

fn parse_identity(spec: &str) -> Result<Identity> {
    let mut fields = spec.splitn(3, ':');
    match (fields.next(), fields.next(), fields.next()) {
        (Some(id), Some(username), Some(password)) if !id.is_empty() && !username.is_empty() => {
            Ok(Identity::new(id, username, password))
        }
        _ => bail!("identity must look like id:username:password"),
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub target: Target,
    /// Sender; the identity's login when omitted
    #[arg(long)]
    pub from: Option<String>,
    #[arg(long, required = true)]
    pub to: Vec<String>,
    #[arg(long)]
    pub cc: Vec<String>,
    #[arg(long)]
    pub bcc: Vec<String>,
    #[arg(short, long)]
    pub subject: Option<String>,
    /// Plain text body
    #[arg(long)]
    pub text: Option<String>,
    /// HTML body
    #[arg(long)]
    pub html: Option<String>,
    /// File to attach, as `path` or `path=type/subtype`
    #[arg(long = "attach")]
    pub attachments: Vec<String>,
}

/// Splits `path=type/subtype` into its path and MIME type.
pub fn attachment_spec(spec: &str) -> (PathBuf, String) {
    match spec.rsplit_once('=') {
        Some((path, mime)) if mime.contains('/') => (PathBuf::from(path), mime.to_string()),
        _ => (PathBuf::from(spec), "application/octet-stream".to_string()),
    }
}

/// The last path component, used as the attachment's file name.
pub fn file_name(path: &std::path::Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn defaults() -> (Endpoint, Endpoint) {
        (
            Endpoint::new("imap.example.com", 993, Security::Tls),
            Endpoint::new("smtp.example.com", 465, Security::Tls),
        )
    }

    #[test]
    fn parses_nested_commands() {
        let cli = Cli::try_parse_from([
            "mailgate", "messages", "--account", "3", "--sub", "sales", "--limit", "10",
        ])
        .unwrap();
        match cli.command {
            Command::Messages { target, mailbox, limit, cursor } => {
                assert_eq!(target.context().sub_account.as_deref(), Some("sales"));
                assert_eq!(mailbox, "INBOX");
                assert_eq!(limit, Some(10));
                assert_eq!(cursor, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn record_uses_defaults() {
        let (imap, smtp) = defaults();
        let args = RecordArgs {
            username: "ana".into(),
            password: "secret".into(),
            imap_host: None,
            imap_port: None,
            imap_security: None,
            smtp_host: Some("mail.example.net".into()),
            smtp_port: Some(587),
            smtp_security: Some("STARTTLS".into()),
            identities: vec!["sales:sales@example.com:pw:with:colons".into()],
        };
        let record = args.record(&imap, &smtp).unwrap();
        assert_eq!(record.imap, imap);
        assert_eq!(record.smtp, Endpoint::new("mail.example.net", 587, Security::StartTls));
        let sales = record.resolve(Some("sales"));
        assert_eq!(sales.identity.secret, "pw:with:colons");
        assert_eq!(record.resolve(None).identity.username, "ana");
    }

    #[test]
    fn rejects_malformed_identity() {
        assert!(parse_identity("sales").is_err());
        assert!(parse_identity(":user:pw").is_err());
    }

    #[test]
    fn attachment_specs() {
        assert_eq!(
            attachment_spec("report.pdf=application/pdf"),
            (PathBuf::from("report.pdf"), "application/pdf".to_string())
        );
        assert_eq!(
            attachment_spec("a=b.bin"),
            (PathBuf::from("a=b.bin"), "application/octet-stream".to_string())
        );
    }
}
