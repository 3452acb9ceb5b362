//! Outgoing mail: build the message once, submit it over SMTP, then file a
//! copy into the Sent folder.
//!
//! Submission is the only step whose failure reaches the caller. Archiving
//! is best effort: its outcome is reported in [`SendReport`] and logged.

use std::fmt;
use std::time::Duration;

use mailgate_imap::Flag;
use mailgate_mime::{Attachment, MessageBuilder};
use mailgate_smtp::{Address, Client as SmtpClient, Config as SmtpConfig};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info, warn};

use crate::account::{AccountId, ActiveIdentity, CredentialRecord, Endpoint};
use crate::folders::{list_folders, sent_folder_or_default};
use crate::pool::{ConnectionPool, Connector, PooledSession};
use crate::{Error, Result};

/// Largest total attachment payload accepted for one message (25 MiB).
pub const MAX_ATTACHMENTS_SIZE: usize = 25 * 1024 * 1024;

/// Sent paths tried after the resolved one, in order.
pub const SENT_CANDIDATES: &[&str] = &["Sent", "Sent Items", "Sent Mail", "INBOX.Sent", "INBOX/Sent"];

/// A message as composed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposedMessage {
    /// Sender; the identity's username when absent.
    pub from: Option<String>,
    /// Primary recipients.
    pub to: Vec<String>,
    /// Carbon-copy recipients.
    pub cc: Vec<String>,
    /// Blind carbon-copy recipients.
    pub bcc: Vec<String>,
    /// Subject line.
    pub subject: Option<String>,
    /// Plain text body.
    pub text: Option<String>,
    /// HTML body.
    pub html: Option<String>,
    /// Files to attach.
    pub attachments: Vec<Attachment>,
}

impl ComposedMessage {
    /// Every envelope recipient: to, then cc, then bcc.
    #[must_use]
    pub fn recipients(&self) -> Vec<String> {
        self.to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .filter(|r| !r.trim().is_empty())
            .cloned()
            .collect()
    }

    /// Total size of the attachment payloads in bytes.
    #[must_use]
    pub fn attachments_size(&self) -> usize {
        self.attachments.iter().map(|a| a.data.len()).sum()
    }

    fn builder(&self, from: &str, clean: fn(&str) -> String) -> MessageBuilder {
        let mut builder = MessageBuilder::new().from(clean(from));
        for to in &self.to {
            builder = builder.to(clean(to));
        }
        for cc in &self.cc {
            builder = builder.cc(clean(cc));
        }
        for bcc in &self.bcc {
            builder = builder.bcc(clean(bcc));
        }
        if let Some(subject) = &self.subject {
            builder = builder.subject(clean(subject));
        }
        if let Some(text) = &self.text {
            builder = builder.text_body(text.clone());
        }
        if let Some(html) = &self.html {
            builder = builder.html_body(html.clone());
        }
        for attachment in &self.attachments {
            let mut attachment = attachment.clone();
            attachment.filename = clean(&attachment.filename);
            builder = builder.attach(attachment);
        }
        builder
    }
}

/// Progress of one send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    /// Validating the composed message.
    Composing,
    /// The raw message is rendered.
    Built,
    /// The SMTP server accepted the message.
    Submitted,
    /// A copy is stored in Sent.
    Archived,
    /// No copy is stored.
    ArchiveSkipped,
}

impl SendState {
    /// Lowercase name used in traces.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Composing => "composing",
            Self::Built => "built",
            Self::Submitted => "submitted",
            Self::Archived => "archived",
            Self::ArchiveSkipped => "archive_skipped",
        }
    }
}

impl fmt::Display for SendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a send that reached the SMTP server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SendReport {
    /// The SMTP server accepted the message.
    pub submitted: bool,
    /// A copy was appended to a Sent folder.
    pub archived: bool,
    /// Why archiving failed, when it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_error: Option<String>,
    /// Folder that received the copy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_folder: Option<String>,
}

/// Hands a rendered message to an SMTP server.
pub trait Submitter: Send + Sync {
    /// Submits `message` for every recipient.
    fn submit(
        &self,
        identity: &ActiveIdentity,
        from: &str,
        recipients: &[String],
        message: &[u8],
    ) -> impl Future<Output = Result<()>> + Send;

    /// Connects and authenticates without sending anything.
    fn verify(&self, identity: &ActiveIdentity) -> impl Future<Output = Result<()>> + Send;
}

/// [`Submitter`] speaking SMTP through `mailgate-smtp`.
#[derive(Debug, Clone)]
pub struct SmtpSubmitter {
    connect_timeout: Duration,
    client_hostname: String,
}

impl SmtpSubmitter {
    /// Creates a submitter with the given connect timeout.
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            client_hostname: "localhost".to_string(),
        }
    }

    /// Overrides the name sent with EHLO.
    #[must_use]
    pub fn with_client_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.client_hostname = hostname.into();
        self
    }

    fn config(&self, endpoint: &Endpoint) -> SmtpConfig {
        let mut config = SmtpConfig::new(&endpoint.host, endpoint.security.into()).with_port(endpoint.port);
        config.connect_timeout = self.connect_timeout;
        config.client_hostname.clone_from(&self.client_hostname);
        config
    }
}

impl Default for SmtpSubmitter {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl Submitter for SmtpSubmitter {
    async fn submit(
        &self,
        identity: &ActiveIdentity,
        from: &str,
        recipients: &[String],
        message: &[u8],
    ) -> Result<()> {
        let from = Address::new(from)?;
        let recipients = recipients
            .iter()
            .map(Address::new)
            .collect::<mailgate_smtp::Result<Vec<_>>>()?;

        let client = SmtpClient::connect(&self.config(&identity.smtp))
            .await?
            .auth_plain(&identity.identity.username, &identity.identity.secret)
            .await?
            .send(from, &recipients, message)
            .await?;

        if let Err(e) = client.quit().await {
            debug!(error = %e, "SMTP QUIT failed after delivery");
        }
        Ok(())
    }

    async fn verify(&self, identity: &ActiveIdentity) -> Result<()> {
        let config = self.config(&identity.smtp);
        let client = SmtpClient::connect(&config)
            .await
            .map_err(|e| Error::ConnectionFailed(format!("SMTP: {e}")))?
            .auth_plain(&identity.identity.username, &identity.identity.secret)
            .await
            .map_err(|e| Error::ConnectionFailed(format!("SMTP: {e}")))?;

        if let Err(e) = client.quit().await {
            debug!(host = %config.host, error = %e, "SMTP QUIT failed after verification");
        }
        Ok(())
    }
}

/// Appends `@localhost` to a bare local part.
#[must_use]
pub fn normalize_from(from: &str) -> String {
    let from = from.trim();
    if from.contains('@') {
        from.to_string()
    } else {
        format!("{from}@localhost")
    }
}

/// The resolved Sent path followed by [`SENT_CANDIDATES`], without
/// case-insensitive duplicates.
#[must_use]
pub fn archive_candidates(primary: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for candidate in std::iter::once(primary).chain(SENT_CANDIDATES.iter().copied()) {
        if !out.iter().any(|seen| seen.eq_ignore_ascii_case(candidate)) {
            out.push(candidate.to_string());
        }
    }
    out
}

/// Sends a message and archives a copy into Sent.
///
/// # Errors
///
/// Returns [`Error::AttachmentsTooLarge`] above [`MAX_ATTACHMENTS_SIZE`] and
/// [`Error::Submission`] when there are no recipients or the SMTP server
/// refuses the message. Archive failures are reported, never returned.
pub async fn send_and_archive<C, T>(
    pool: &ConnectionPool<C>,
    account_id: AccountId,
    record: &CredentialRecord,
    sub_account: Option<&str>,
    message: ComposedMessage,
    submitter: &T,
) -> Result<SendReport>
where
    C: Connector,
    T: Submitter,
{
    let identity = record.resolve(sub_account);
    let from = normalize_from(
        message
            .from
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(&identity.identity.username),
    );
    debug!(state = %SendState::Composing, account = %account_id, from = %from, "Sending message");

    let recipients = message.recipients();
    if recipients.is_empty() {
        return Err(Error::Submission("no recipients".to_string()));
    }
    let size = message.attachments_size();
    if size > MAX_ATTACHMENTS_SIZE {
        return Err(Error::AttachmentsTooLarge {
            size,
            limit: MAX_ATTACHMENTS_SIZE,
        });
    }

    let (raw, archivable) = match message.builder(&from, str::to_string).build() {
        Ok(raw) => {
            debug!(state = %SendState::Built, bytes = raw.len(), "Message built");
            (raw, true)
        }
        Err(e) => {
            error!(error = %e, "Failed to build message, submitting sanitized copy without archiving");
            let raw = message
                .builder(&from, single_line)
                .build()
                .map_err(|e| Error::Submission(e.to_string()))?;
            (raw, false)
        }
    };

    submitter.submit(&identity, &from, &recipients, &raw).await?;
    info!(state = %SendState::Submitted, account = %account_id, recipients = recipients.len(), "Message submitted");

    let mut report = SendReport {
        submitted: true,
        ..SendReport::default()
    };
    if !archivable {
        info!(state = %SendState::ArchiveSkipped, account = %account_id, "Not archiving unbuildable message");
        return Ok(report);
    }

    match archive_copy(pool, account_id, record, sub_account, &raw).await {
        Ok(folder) => {
            info!(state = %SendState::Archived, account = %account_id, folder = %folder, "Archived sent message");
            report.archived = true;
            report.sent_folder = Some(folder);
        }
        Err(e) => {
            warn!(state = %SendState::ArchiveSkipped, account = %account_id, error = %e, "Failed to archive sent message");
            report.archive_error = Some(e.to_string());
        }
    }
    Ok(report)
}

/// Appends a rendered message to the first Sent candidate that exists and
/// accepts it, returning that folder's path. Folders are never created.
///
/// # Errors
///
/// Returns [`Error::ArchiveFailed`] with the last failure when no candidate
/// takes the message, or the pool's error if no connection can be had.
pub async fn archive_copy<C: Connector>(
    pool: &ConnectionPool<C>,
    account_id: AccountId,
    record: &CredentialRecord,
    sub_account: Option<&str>,
    raw: &[u8],
) -> Result<String> {
    let mut session = pool.acquire(account_id, record, sub_account).await?;
    let folders = list_folders(&mut session).await?;
    let primary = sent_folder_or_default(&folders);

    let mut last_error: Option<String> = None;
    for candidate in archive_candidates(&primary) {
        let Some(folder) = folders.iter().find(|f| f.path.eq_ignore_ascii_case(&candidate)) else {
            debug!(folder = %candidate, "Sent candidate does not exist, skipping");
            continue;
        };

        if session.is_broken() {
            drop(session);
            session = pool.acquire(account_id, record, sub_account).await?;
        }

        match append_to(&mut session, &folder.path, raw).await {
            Ok(()) => return Ok(folder.path.clone()),
            Err(e) => {
                warn!(folder = %folder.path, error = %e, "Append to Sent candidate failed");
                last_error = Some(e.to_string());
            }
        }
    }

    Err(Error::ArchiveFailed(
        last_error.unwrap_or_else(|| "no Sent folder exists".to_string()),
    ))
}

async fn append_to<S>(session: &mut PooledSession<S>, path: &str, raw: &[u8]) -> mailgate_imap::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    session.select(path).await?;
    match session.append(path, Some(vec![Flag::Seen]), raw).await {
        Ok(()) => Ok(()),
        Err(e) if !session.is_broken() => {
            debug!(folder = path, error = %e, "Append with \\Seen refused, retrying without flags");
            session.append(path, None, raw).await
        }
        Err(e) => Err(e),
    }
}

fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::significant_drop_tightening)]
mod tests {
    use super::*;
    use crate::pool::PoolConfig;
    use crate::testing::{MockConnector, MockSubmitter, login_script, record};
    use tokio_test::io::Builder;

    fn pool(connector: &MockConnector) -> ConnectionPool<MockConnector> {
        ConnectionPool::with_connector(connector.clone(), PoolConfig::default())
    }

    fn composed() -> ComposedMessage {
        ComposedMessage {
            to: vec!["bob@example.com".to_string()],
            cc: vec!["carol@example.com".to_string()],
            bcc: vec!["dave@example.com".to_string()],
            subject: Some("Hello".to_string()),
            text: Some("Hi Bob".to_string()),
            ..ComposedMessage::default()
        }
    }

    #[test]
    fn from_normalization() {
        assert_eq!(normalize_from("ana"), "ana@localhost");
        assert_eq!(normalize_from("ana@example.com"), "ana@example.com");
    }

    #[test]
    fn candidates_are_deduplicated() {
        assert_eq!(
            archive_candidates("SENT"),
            vec!["SENT", "Sent Items", "Sent Mail", "INBOX.Sent", "INBOX/Sent"]
        );
        assert_eq!(archive_candidates("[Gmail]/Sent Mail").len(), 6);
    }

    #[test]
    fn recipients_cover_every_field() {
        assert_eq!(
            composed().recipients(),
            vec!["bob@example.com", "carol@example.com", "dave@example.com"]
        );
    }

    #[tokio::test]
    async fn sent_missing_still_submits() {
        let connector = MockConnector::new();
        connector.push(
            login_script(&mut Builder::new())
                .write(b"A0002 LIST \"\" \"*\"\r\n")
                .read(b"* LIST (\\HasNoChildren) \"/\" INBOX\r\n")
                .read(b"* LIST (\\HasNoChildren) \"/\" Drafts\r\n")
                .read(b"A0002 OK done\r\n")
                .build(),
        );
        let pool = pool(&connector);
        let submitter = MockSubmitter::new();

        let report = send_and_archive(&pool, AccountId::new(1), &record(), None, composed(), &submitter)
            .await
            .unwrap();

        assert!(report.submitted);
        assert!(!report.archived);
        assert!(report.archive_error.is_some());

        let sent = submitter.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, "ana@localhost");
        assert_eq!(sent[0].username, "ana");
        assert_eq!(sent[0].recipients.len(), 3);
        let raw = String::from_utf8(sent[0].raw.clone()).unwrap();
        assert!(raw.contains("Subject: Hello\r\n"));
        assert!(!raw.contains("dave@example.com"));
    }

    #[tokio::test]
    async fn submission_failure_is_the_error() {
        let connector = MockConnector::new();
        let pool = pool(&connector);
        let submitter = MockSubmitter::failing("550 relay denied");

        let err = send_and_archive(&pool, AccountId::new(1), &record(), None, composed(), &submitter)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Submission(_)));
        assert_eq!(connector.dials(), 0);
    }

    #[tokio::test]
    async fn oversized_attachments_are_rejected() {
        let connector = MockConnector::new();
        let pool = pool(&connector);
        let submitter = MockSubmitter::new();
        let mut message = composed();
        message.attachments.push(Attachment::new(
            "big.bin",
            "application/octet-stream",
            vec![0u8; MAX_ATTACHMENTS_SIZE + 1],
        ));

        let err = send_and_archive(&pool, AccountId::new(1), &record(), None, message, &submitter)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AttachmentsTooLarge { .. }));
        assert!(submitter.sent().is_empty());
    }

    #[tokio::test]
    async fn unbuildable_message_skips_archiving() {
        let connector = MockConnector::new();
        let pool = pool(&connector);
        let submitter = MockSubmitter::new();
        let mut message = composed();
        message.subject = Some("Hello\r\nBcc: everyone@example.com".to_string());

        let report = send_and_archive(&pool, AccountId::new(1), &record(), None, message, &submitter)
            .await
            .unwrap();
        assert!(report.submitted);
        assert!(!report.archived);
        assert!(report.archive_error.is_none());
        assert_eq!(connector.dials(), 0);

        let raw = String::from_utf8(submitter.sent()[0].raw.clone()).unwrap();
        assert!(raw.contains("Subject: Hello  Bcc: everyone@example.com\r\n"));
    }

    #[tokio::test]
    async fn no_recipients() {
        let pool = pool(&MockConnector::new());
        let err = send_and_archive(
            &pool,
            AccountId::new(1),
            &record(),
            None,
            ComposedMessage::default(),
            &MockSubmitter::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Submission(_)));
    }

    #[tokio::test]
    async fn archive_prefers_the_flagged_folder() {
        let connector = MockConnector::new();
        connector.push(
            login_script(&mut Builder::new())
                .write(b"A0002 LIST \"\" \"*\"\r\n")
                .read(b"* LIST () \"/\" INBOX\r\n")
                .read(b"* LIST (\\Sent) \"/\" \"Sent Items\"\r\n")
                .read(b"A0002 OK done\r\n")
                .write(b"A0003 SELECT \"Sent Items\"\r\n")
                .read(b"* 0 EXISTS\r\n")
                .read(b"A0003 OK [READ-WRITE] done\r\n")
                .write(b"A0004 APPEND \"Sent Items\" (\\Seen) {5}\r\n")
                .read(b"+ go ahead\r\n")
                .write(b"hello\r\n")
                .read(b"A0004 OK done\r\n")
                .build(),
        );
        let pool = pool(&connector);

        let folder = archive_copy(&pool, AccountId::new(1), &record(), None, b"hello")
            .await
            .unwrap();
        assert_eq!(folder, "Sent Items");
    }

    #[tokio::test]
    async fn archive_retries_without_flags() {
        let connector = MockConnector::new();
        connector.push(
            login_script(&mut Builder::new())
                .write(b"A0002 LIST \"\" \"*\"\r\n")
                .read(b"* LIST () \".\" INBOX.Sent\r\n")
                .read(b"A0002 OK done\r\n")
                .write(b"A0003 SELECT INBOX.Sent\r\n")
                .read(b"A0003 OK [READ-WRITE] done\r\n")
                .write(b"A0004 APPEND INBOX.Sent (\\Seen) {5}\r\n")
                .read(b"A0004 NO flags not permitted\r\n")
                .write(b"A0005 APPEND INBOX.Sent {5}\r\n")
                .read(b"+ go ahead\r\n")
                .write(b"hello\r\n")
                .read(b"A0005 OK done\r\n")
                .build(),
        );
        let pool = pool(&connector);

        let folder = archive_copy(&pool, AccountId::new(1), &record(), None, b"hello")
            .await
            .unwrap();
        assert_eq!(folder, "INBOX.Sent");
    }
}
