//! The gateway facade.
//!
//! [`GatewayService`] is what the HTTP layer (or the CLI) talks to. Each
//! operation loads and decrypts the account, borrows the pooled connection
//! for the requested identity, runs the protocol exchange and returns a
//! normalized result.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::DateTime;
use mailgate_imap::{
    Address as ImapAddress, Client, Envelope, FetchItems, Flag, MessageData,
    SearchCriteria, Selected, StoreAction, Uid, UidSet,
};
use mailgate_mime::encoding::decode_rfc2047;
use mailgate_mime::{Message, TransferEncoding};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::account::{
    AccountId, AccountRepository, CredentialRecord, NewAccount, validate_record,
};
use crate::classify::{AttachmentDescriptor, classify, descriptor, find_part, has_attachments};
use crate::error::is_missing_message;
use crate::folders::{self, Folder, Role, is_trash_like};
use crate::pagination::{clamp_limit, paginate};
use crate::pool::{ConnectionPool, Connector, ImapConnector, PooledSession};
use crate::send::{ComposedMessage, SendReport, SmtpSubmitter, Submitter, send_and_archive};
use crate::vault::Vault;
use crate::{Error, Result};

const NO_SUBJECT: &str = "(no subject)";

/// Which account, and which of its identities, an operation runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountContext {
    /// Stored account.
    pub account_id: AccountId,
    /// Identity id within the account; the primary when `None`.
    pub sub_account: Option<String>,
}

impl AccountContext {
    /// Context for the primary identity of an account.
    #[must_use]
    pub const fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            sub_account: None,
        }
    }

    /// Runs as a sub-account instead.
    #[must_use]
    pub fn with_sub_account(mut self, id: impl Into<String>) -> Self {
        self.sub_account = Some(id.into());
        self
    }
}

/// A mailbox address with its decoded display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailAddress {
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `local@domain`.
    pub address: String,
}

impl EmailAddress {
    fn from_envelope(address: &ImapAddress) -> Option<Self> {
        let email = address.email().or_else(|| address.mailbox.clone())?;
        Some(Self {
            name: address
                .name
                .as_deref()
                .map(decode_rfc2047)
                .filter(|n| !n.trim().is_empty()),
            address: email,
        })
    }
}

fn addresses(list: &[ImapAddress]) -> Vec<EmailAddress> {
    list.iter().filter_map(EmailAddress::from_envelope).collect()
}

/// One row of a message list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageSummary {
    /// Message UID.
    pub uid: u32,
    /// Decoded subject, `(no subject)` when absent.
    pub subject: String,
    /// Senders.
    pub from: Vec<EmailAddress>,
    /// Primary recipients.
    pub to: Vec<EmailAddress>,
    /// RFC 3339 date: the Date header, else the internal date.
    pub date: Option<String>,
    /// Flags such as `\Seen`.
    pub flags: Vec<String>,
    /// RFC822 size in octets.
    pub size: u32,
    /// A top-level part is marked as an attachment.
    pub has_attachments: bool,
}

impl MessageSummary {
    fn from_data(uid: u32, data: &MessageData) -> Self {
        let envelope = data.envelope.as_ref();
        Self {
            uid,
            subject: envelope
                .and_then(|e| e.subject.as_deref())
                .map(decode_rfc2047)
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| NO_SUBJECT.to_string()),
            from: envelope.map(|e| addresses(&e.from)).unwrap_or_default(),
            to: envelope.map(|e| addresses(&e.to)).unwrap_or_default(),
            date: message_date(envelope, data.internal_date.as_deref()),
            flags: data.flags.iter().map(|f| f.as_str().to_string()).collect(),
            size: data.size.unwrap_or(0),
            has_attachments: has_attachments(data.body_structure.as_ref()),
        }
    }
}

/// A fully fetched message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageDetail {
    /// List fields.
    #[serde(flatten)]
    pub summary: MessageSummary,
    /// Carbon-copy recipients.
    pub cc: Vec<EmailAddress>,
    /// Message-ID header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Attachments found in the body structure.
    pub attachments: Vec<AttachmentDescriptor>,
    /// Decoded plain text body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Decoded HTML body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Complete RFC 5322 source.
    #[serde(skip)]
    pub raw: Vec<u8>,
    /// Body structure as reported by the server.
    #[serde(skip)]
    pub body_structure: Option<mailgate_imap::BodyStructure>,
}

/// One page of a message list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessagePage {
    /// Newest first.
    pub messages: Vec<MessageSummary>,
    /// Pass back to get the next page.
    pub next_cursor: Option<u32>,
}

/// Decoded content of one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentContent {
    /// Suggested file name.
    pub filename: String,
    /// `type/subtype`.
    pub mime_type: String,
    /// Transfer-decoded bytes.
    pub data: Vec<u8>,
}

/// Whether [`GatewayService::set_flags`] adds or removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagMode {
    /// `+FLAGS`.
    Add,
    /// `-FLAGS`.
    Remove,
}

/// What [`GatewayService::trash_message`] ended up doing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// Moved into the trash folder at this path.
    MovedToTrash {
        /// Trash path.
        folder: String,
    },
    /// Flagged `\Deleted` and expunged.
    Deleted {
        /// A move to trash was attempted first and failed.
        fallback: bool,
    },
    /// The message was already gone; nothing changed.
    Missing,
}

/// Mail operations over pooled connections.
pub struct GatewayService<C: Connector = ImapConnector, T: Submitter = SmtpSubmitter> {
    accounts: AccountRepository,
    vault: Vault,
    pool: Arc<ConnectionPool<C>>,
    submitter: T,
}

impl<C: Connector, T: Submitter> GatewayService<C, T> {
    /// Wires the service to its collaborators.
    #[must_use]
    pub const fn new(
        accounts: AccountRepository,
        vault: Vault,
        pool: Arc<ConnectionPool<C>>,
        submitter: T,
    ) -> Self {
        Self {
            accounts,
            vault,
            pool,
            submitter,
        }
    }

    /// The connection pool, for lifecycle management.
    #[must_use]
    pub const fn pool(&self) -> &Arc<ConnectionPool<C>> {
        &self.pool
    }

    /// The account store.
    #[must_use]
    pub const fn accounts(&self) -> &AccountRepository {
        &self.accounts
    }

    /// Lists every mailbox of the account.
    ///
    /// # Errors
    ///
    /// Fails when the account cannot be loaded or the server refuses LIST.
    pub async fn list_folders(&self, ctx: &AccountContext) -> Result<Vec<Folder>> {
        let mut session = self.session(ctx).await?;
        folders::list_folders(&mut session).await
    }

    /// Lists one page of a mailbox, newest first.
    ///
    /// `limit` defaults to 20 and is clamped to `1..=50`.
    ///
    /// # Errors
    ///
    /// Fails when the mailbox cannot be selected or searched.
    pub async fn list_messages(
        &self,
        ctx: &AccountContext,
        mailbox: &str,
        cursor: Option<u32>,
        limit: Option<usize>,
    ) -> Result<MessagePage> {
        let mut session = self.session(ctx).await?;
        let client = session.select(mailbox).await?;
        let result = fetch_page(client, cursor, clamp_limit(limit)).await;
        session.report(&result);
        let page = result?;
        debug!(mailbox, count = page.messages.len(), next = ?page.next_cursor, "Listed messages");
        Ok(page)
    }

    /// Fetches a complete message.
    ///
    /// Returns `None` when the message no longer exists.
    ///
    /// # Errors
    ///
    /// Fails on any other protocol error.
    pub async fn get_message(
        &self,
        ctx: &AccountContext,
        mailbox: &str,
        uid: u32,
    ) -> Result<Option<MessageDetail>> {
        let Some(imap_uid) = Uid::new(uid) else {
            return Ok(None);
        };
        let mut session = self.session(ctx).await?;
        let client = session.select(mailbox).await?;
        let result = client
            .uid_fetch(&UidSet::single(imap_uid), FetchItems::detail())
            .await;
        session.report(&result);

        let Some(items) = or_missing(checked(result, mailbox, uid))? else {
            return Ok(None);
        };
        Ok(items
            .into_iter()
            .find(|data| data.uid == Some(imap_uid))
            .map(|data| detail(uid, data)))
    }

    /// Downloads and transfer-decodes one body part.
    ///
    /// Returns `None` when the message or the part does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] for a malformed part id. Fails on
    /// any other protocol error, or when the part's transfer encoding is
    /// corrupt.
    pub async fn download_attachment(
        &self,
        ctx: &AccountContext,
        mailbox: &str,
        uid: u32,
        part_id: &str,
    ) -> Result<Option<AttachmentContent>> {
        check_part_id(part_id)?;
        let Some(imap_uid) = Uid::new(uid) else {
            return Ok(None);
        };
        let items = FetchItems::section(part_id);

        let mut session = self.session(ctx).await?;
        let client = session.select(mailbox).await?;
        let result = client.uid_fetch(&UidSet::single(imap_uid), items).await;
        session.report(&result);

        let Some(items) = or_missing(checked(result, mailbox, uid))? else {
            return Ok(None);
        };
        let Some(data) = items.into_iter().find(|data| data.uid == Some(imap_uid)) else {
            return Ok(None);
        };
        let (Some(structure), Some(encoded)) =
            (data.body_structure.as_ref(), data.section(Some(part_id)))
        else {
            debug!(mailbox, uid, part = part_id, "Attachment part not returned");
            return Ok(None);
        };
        let Some(part) = find_part(structure, part_id) else {
            return Ok(None);
        };

        let bytes = TransferEncoding::parse(&part.encoding).decode(encoded)?;
        let described = descriptor(part_id.to_string(), part);
        Ok(Some(AttachmentContent {
            filename: described.filename,
            mime_type: described.mime_type,
            data: bytes,
        }))
    }

    /// Adds or removes flags. Flags already in the requested state are
    /// fine, and a vanished message is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] for a flag that is not an IMAP
    /// atom, and fails on any other protocol error.
    pub async fn set_flags(
        &self,
        ctx: &AccountContext,
        mailbox: &str,
        uid: u32,
        flags: &[String],
        mode: FlagMode,
    ) -> Result<()> {
        let flags = store_flags(flags)?;
        let Some(imap_uid) = Uid::new(uid) else {
            return Ok(());
        };
        if flags.is_empty() {
            return Ok(());
        }
        let action = match mode {
            FlagMode::Add => StoreAction::AddFlags(flags),
            FlagMode::Remove => StoreAction::RemoveFlags(flags),
        };

        let mut session = self.session(ctx).await?;
        let client = session.select(mailbox).await?;
        let result = client.uid_store(&UidSet::single(imap_uid), action).await;
        session.report(&result);
        or_missing(checked(result, mailbox, uid))?;
        Ok(())
    }

    /// Permanently deletes a message: `\Deleted`, then `UID EXPUNGE` of
    /// that message, or a plain EXPUNGE when the server lacks UIDPLUS.
    ///
    /// # Errors
    ///
    /// Fails on any protocol error other than the message being gone.
    pub async fn delete_message(&self, ctx: &AccountContext, mailbox: &str, uid: u32) -> Result<()> {
        let mut session = self.session(ctx).await?;
        hard_delete(&mut session, mailbox, uid).await.map(drop)
    }

    /// Moves a message between mailboxes, with COPY + delete when the
    /// server lacks MOVE.
    ///
    /// # Errors
    ///
    /// Fails on any protocol error other than the message being gone.
    pub async fn move_message(
        &self,
        ctx: &AccountContext,
        source: &str,
        target: &str,
        uid: u32,
    ) -> Result<()> {
        let mut session = self.session(ctx).await?;
        move_between(&mut session, source, target, uid).await.map(drop)
    }

    /// Moves a message to Trash, or deletes it outright when it already is
    /// in a trash folder or no Trash exists.
    ///
    /// # Errors
    ///
    /// Fails when the fallback delete fails too.
    pub async fn trash_message(
        &self,
        ctx: &AccountContext,
        mailbox: &str,
        uid: u32,
    ) -> Result<DeleteOutcome> {
        let mut session = self.session(ctx).await?;
        let trash = folders::resolve_role(&mut session, Role::Trash).await?;

        let Some(trash) = trash.filter(|t| !is_trash_like(mailbox) && !t.eq_ignore_ascii_case(mailbox))
        else {
            let deleted = hard_delete(&mut session, mailbox, uid).await?;
            return Ok(deleted_or_missing(deleted, false));
        };

        match move_between(&mut session, mailbox, &trash, uid).await {
            Ok(true) => Ok(DeleteOutcome::MovedToTrash { folder: trash }),
            Ok(false) => Ok(DeleteOutcome::Missing),
            Err(e) => {
                warn!(mailbox, uid, trash = %trash, error = %e, "Move to trash failed, deleting instead");
                drop(session);
                let mut session = self.session(ctx).await?;
                let deleted = hard_delete(&mut session, mailbox, uid).await?;
                Ok(deleted_or_missing(deleted, true))
            }
        }
    }

    /// Moves a message into the spam folder, or back to `INBOX` when
    /// `spam` is false. Returns the spam folder's path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] when no spam folder exists, or the
    /// move's error.
    pub async fn mark_spam(
        &self,
        ctx: &AccountContext,
        mailbox: &str,
        uid: u32,
        spam: bool,
    ) -> Result<String> {
        let mut session = self.session(ctx).await?;
        let spam_folder = folders::resolve_role(&mut session, Role::Spam)
            .await?
            .ok_or_else(|| Error::OperationFailed("spam folder not found".to_string()))?;

        let target = if spam { spam_folder.as_str() } else { "INBOX" };
        move_between(&mut session, mailbox, target, uid).await?;
        Ok(spam_folder)
    }

    /// Sends a message and archives a copy into Sent.
    ///
    /// # Errors
    ///
    /// Fails only when the message is not submitted; see
    /// [`send_and_archive`].
    pub async fn send_mail(&self, ctx: &AccountContext, message: ComposedMessage) -> Result<SendReport> {
        let record = self.credentials(ctx).await?;
        send_and_archive(
            &self.pool,
            ctx.account_id,
            &record,
            ctx.sub_account.as_deref(),
            message,
            &self.submitter,
        )
        .await
    }

    /// Checks a record against its servers on fresh connections: IMAP
    /// login, SELECT INBOX and LOGOUT, then SMTP login.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionFailed`] naming the step that failed.
    pub async fn verify_credentials(&self, record: &CredentialRecord) -> Result<()> {
        let identity = record.resolve(None);
        let client = self.pool.connector().connect(&identity).await?;
        let inbox = client
            .select("INBOX")
            .await
            .map_err(|e| Error::ConnectionFailed(format!("SELECT INBOX: {e}")))?;
        if let Err(e) = inbox.logout().await {
            debug!(host = %identity.imap.host, error = %e, "LOGOUT failed after verification");
        }

        self.submitter.verify(&identity).await?;
        info!(host = %identity.imap.host, user = %identity.identity.username, "Credentials verified");
        Ok(())
    }

    /// Validates, verifies, seals and stores a new account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAccount`] for a malformed record, the
    /// verification error, or a storage error.
    pub async fn add_account(&self, username: &str, record: &CredentialRecord) -> Result<AccountId> {
        check_record(record)?;
        self.verify_credentials(record).await?;

        let id = self
            .accounts
            .insert_account(NewAccount {
                username: username.to_string(),
                imap: record.imap.clone(),
                smtp: record.smtp.clone(),
                enc_creds: self.vault.seal(record)?,
            })
            .await?;
        info!(account = %id, "Account added");
        Ok(id)
    }

    /// Replaces an account's credentials after verifying them, and drops its
    /// pooled connections so the next operation logs in afresh.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountNotFound`], [`Error::InvalidAccount`], the
    /// verification error, or a storage error.
    pub async fn refresh_credentials(&self, account_id: AccountId, record: &CredentialRecord) -> Result<()> {
        if self.accounts.get_account(account_id).await?.is_none() {
            return Err(Error::AccountNotFound(account_id.to_string()));
        }
        check_record(record)?;
        self.verify_credentials(record).await?;

        self.accounts
            .update_credentials(account_id, &self.vault.seal(record)?)
            .await?;
        let closed = self.pool.release(account_id).await;
        info!(account = %account_id, closed, "Account credentials refreshed");
        Ok(())
    }

    async fn credentials(&self, ctx: &AccountContext) -> Result<CredentialRecord> {
        let account = self
            .accounts
            .get_account(ctx.account_id)
            .await?
            .ok_or_else(|| Error::AccountNotFound(ctx.account_id.to_string()))?;
        self.vault.open(&account.enc_creds)
    }

    async fn session(&self, ctx: &AccountContext) -> Result<PooledSession<C::Stream>> {
        let record = self.credentials(ctx).await?;
        self.pool
            .acquire(ctx.account_id, &record, ctx.sub_account.as_deref())
            .await
    }
}

impl<C: Connector, T: Submitter> std::fmt::Debug for GatewayService<C, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayService")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

fn check_record(record: &CredentialRecord) -> Result<()> {
    validate_record(record).map_err(|errors| {
        let message = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Error::InvalidAccount(message)
    })
}

/// Parses caller flags, rejecting anything that is not a system flag or a
/// keyword atom.
fn store_flags(flags: &[String]) -> Result<Vec<Flag>> {
    flags
        .iter()
        .map(|flag| {
            let name = flag.strip_prefix('\\').unwrap_or(flag.as_str());
            if !name.is_empty() && name.bytes().all(is_atom_char) {
                Ok(Flag::parse(flag))
            } else {
                Err(Error::OperationFailed(format!("invalid flag: {flag:?}")))
            }
        })
        .collect()
}

const fn is_atom_char(b: u8) -> bool {
    b.is_ascii_graphic() && !matches!(b, b'(' | b')' | b'{' | b'%' | b'*' | b'"' | b'\\' | b']')
}

/// Part ids are dot-separated section numbers such as `2` or `1.2`.
fn check_part_id(part_id: &str) -> Result<()> {
    let valid = part_id
        .split('.')
        .all(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));
    if valid {
        Ok(())
    } else {
        Err(Error::OperationFailed(format!("invalid part id: {part_id:?}")))
    }
}

/// Maps the "message no longer exists" signature to
/// [`Error::MessageNotFound`].
fn checked<T>(result: mailgate_imap::Result<T>, mailbox: &str, uid: u32) -> Result<T> {
    result.map_err(|e| {
        if is_missing_message(&e) {
            Error::MessageNotFound {
                mailbox: mailbox.to_string(),
                uid,
            }
        } else {
            e.into()
        }
    })
}

/// Turns [`Error::MessageNotFound`] into `None`.
fn or_missing<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e @ Error::MessageNotFound { .. }) => {
            debug!(error = %e, "Message vanished");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

async fn fetch_page<S>(
    client: &mut Client<S, Selected>,
    cursor: Option<u32>,
    limit: usize,
) -> mailgate_imap::Result<MessagePage>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let uids: Vec<u32> = client
        .uid_search(SearchCriteria::All)
        .await?
        .into_iter()
        .map(Uid::get)
        .collect();
    let page = paginate(&uids, cursor, limit);

    let wanted: Vec<Uid> = page.uids.iter().filter_map(|&uid| Uid::new(uid)).collect();
    let Some(set) = UidSet::list(&wanted) else {
        return Ok(MessagePage {
            messages: Vec::new(),
            next_cursor: page.next_cursor,
        });
    };

    let mut fetched: HashMap<u32, MessageData> = client
        .uid_fetch(&set, FetchItems::summary())
        .await?
        .into_iter()
        .filter_map(|data| data.uid.map(|uid| (uid.get(), data)))
        .collect();

    // Servers answer in mailbox order; the page is newest first
    let messages = page
        .uids
        .iter()
        .filter_map(|uid| fetched.remove(uid).map(|data| MessageSummary::from_data(*uid, &data)))
        .collect();

    Ok(MessagePage {
        messages,
        next_cursor: page.next_cursor,
    })
}

/// Deletes one message. Returns false when it was already gone.
async fn hard_delete<S>(session: &mut PooledSession<S>, mailbox: &str, uid: u32) -> Result<bool>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some(imap_uid) = Uid::new(uid) else {
        return Ok(false);
    };
    let set = UidSet::single(imap_uid);
    let client = session.select(mailbox).await?;
    let result = async {
        client
            .uid_store(&set, StoreAction::AddFlags(vec![Flag::Deleted]))
            .await?;
        expunge_one(client, &set).await
    }
    .await;
    session.report(&result);
    let deleted = or_missing(checked(result, mailbox, uid))?.is_some();
    debug!(mailbox, uid, deleted, "Message deleted");
    Ok(deleted)
}

/// Expunges only `set` when the server has UIDPLUS. Without it EXPUNGE
/// also removes messages other clients flagged `\Deleted`.
async fn expunge_one<S>(client: &mut Client<S, Selected>, set: &UidSet) -> mailgate_imap::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if client.supports_uidplus() {
        client.uid_expunge(set).await
    } else {
        warn!(mailbox = client.mailbox(), "Server lacks UIDPLUS, expunging the whole mailbox");
        client.expunge().await
    }
}

/// Moves one message. Returns false when it was already gone.
async fn move_between<S>(session: &mut PooledSession<S>, source: &str, target: &str, uid: u32) -> Result<bool>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some(imap_uid) = Uid::new(uid) else {
        return Ok(false);
    };
    let set = UidSet::single(imap_uid);
    let use_move = session.supports_move();

    let client = session.select(source).await?;
    let result = if use_move {
        client.uid_move(&set, target).await
    } else {
        async {
            client.uid_copy(&set, target).await?;
            client
                .uid_store(&set, StoreAction::AddFlags(vec![Flag::Deleted]))
                .await?;
            expunge_one(client, &set).await
        }
        .await
    };
    session.report(&result);
    let moved = or_missing(checked(result, source, uid))?.is_some();
    debug!(source, target, uid, moved, via_move = use_move, "Message moved");
    Ok(moved)
}

const fn deleted_or_missing(deleted: bool, fallback: bool) -> DeleteOutcome {
    if deleted {
        DeleteOutcome::Deleted { fallback }
    } else {
        DeleteOutcome::Missing
    }
}

fn detail(uid: u32, data: MessageData) -> MessageDetail {
    let summary = MessageSummary::from_data(uid, &data);
    let envelope = data.envelope.as_ref();
    let raw = data.section(None).map(<[u8]>::to_vec).unwrap_or_default();

    let (text, html) = match Message::parse(&raw) {
        Ok(message) => (message.text_body(), message.html_body()),
        Err(e) => {
            debug!(uid, error = %e, "Could not parse message source");
            (None, None)
        }
    };

    MessageDetail {
        summary,
        cc: envelope.map(|e| addresses(&e.cc)).unwrap_or_default(),
        message_id: envelope.and_then(|e| e.message_id.clone()),
        attachments: classify(data.body_structure.as_ref()),
        text,
        html,
        raw,
        body_structure: data.body_structure,
    }
}

/// RFC 3339 form of the Date header, falling back to the internal date.
/// Unparseable values are passed through as they are.
fn message_date(envelope: Option<&Envelope>, internal: Option<&str>) -> Option<String> {
    let header = envelope.and_then(|e| e.date.as_deref()).map(str::trim);
    let internal = internal.map(str::trim);

    header
        .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
        .or_else(|| internal.and_then(|d| DateTime::parse_from_str(d, "%d-%b-%Y %H:%M:%S %z").ok()))
        .map(|d| d.to_rfc3339())
        .or_else(|| header.or(internal).map(str::to_string))
}
