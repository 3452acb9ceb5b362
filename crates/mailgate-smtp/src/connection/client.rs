//! Type-state SMTP client.

use std::collections::HashSet;
use std::io;
use std::marker::PhantomData;

use base64::Engine;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

use super::config::{Config, Security};
use super::stream::{self, SmtpStream};
use super::ServerInfo;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{Address, AuthMechanism, Extension, Reply, ReplyCode};

/// Longest reply line accepted from the server.
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Type-state marker for connected state.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker for authenticated state.
#[derive(Debug)]
pub struct Authenticated;

/// Type-state marker for mail transaction started.
#[derive(Debug)]
pub struct MailTransaction;

/// Type-state marker for recipient added.
#[derive(Debug)]
pub struct RecipientAdded;

/// Type-state marker for data mode.
#[derive(Debug)]
pub struct Data;

/// SMTP client with type-state.
#[derive(Debug)]
pub struct Client<S, State> {
    reader: BufReader<S>,
    server_info: ServerInfo,
    client_hostname: String,
    _state: PhantomData<State>,
}

impl Client<SmtpStream, Connected> {
    /// Dials the server, reads the greeting and sends EHLO.
    ///
    /// With [`Security::StartTls`] the connection is upgraded and EHLO is
    /// repeated over TLS before this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, greeting, EHLO or upgrade fails.
    pub async fn connect(config: &Config) -> Result<Self> {
        let transport = stream::open(config).await?;
        let client = Self::from_stream(transport)
            .await?
            .ehlo(&config.client_hostname)
            .await?;

        let client = if config.security == Security::StartTls {
            client.starttls(&config.host).await?
        } else {
            client
        };
        debug!(host = %config.host, port = config.port, "SMTP connection ready");
        Ok(client)
    }

    /// Upgrades the connection to TLS using STARTTLS and repeats EHLO.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is not offered or the upgrade fails.
    pub async fn starttls(mut self, hostname: &str) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }
        self.expect_success(Command::StartTls).await?;

        let tls = self.reader.into_inner().upgrade_to_tls(hostname).await?;
        let client = Self {
            reader: BufReader::new(tls),
            server_info: ServerInfo {
                hostname: self.server_info.hostname,
                extensions: HashSet::new(),
            },
            client_hostname: self.client_hostname,
            _state: PhantomData,
        };
        let hostname = client.client_hostname.clone();
        client.ehlo(&hostname).await
    }
}

impl<S> Client<S, Connected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or the server refuses
    /// the session.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut reader = BufReader::new(stream);
        let greeting = read_reply(&mut reader).await?;
        if !greeting.is_success() {
            return Err(greeting.into_error());
        }

        let hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();

        Ok(Self {
            reader,
            server_info: ServerInfo {
                hostname,
                extensions: HashSet::new(),
            },
            client_hostname: "localhost".to_string(),
            _state: PhantomData,
        })
    }

    /// Sends EHLO and records the advertised extensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects EHLO.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        let reply = self
            .expect_success(Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?;

        // The first line repeats the server's greeting name
        self.server_info.extensions = reply
            .message
            .iter()
            .skip(1)
            .map(String::as_str)
            .map(Extension::parse)
            .collect();
        client_hostname.clone_into(&mut self.client_hostname);
        Ok(self)
    }

    /// Authenticates with SASL PLAIN, sending the credentials as the
    /// initial response.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub async fn auth_plain(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        let credentials = format!("\0{username}\0{password}");
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());

        self.expect_success(Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some(encoded),
        })
        .await?;

        Ok(self.transition())
    }
}

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Starts a mail transaction.
    ///
    /// `size` is announced when the server advertises SIZE, and checked
    /// against its limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is too large or MAIL FROM fails.
    pub async fn mail_from(
        mut self,
        from: Address,
        size: Option<usize>,
    ) -> Result<Client<S, MailTransaction>> {
        let announced = match (size, self.server_info.size_limit()) {
            (Some(size), Some(Some(limit))) if limit > 0 && size > limit => {
                return Err(Error::MessageTooLarge { size, limit });
            }
            (Some(size), Some(_)) => Some(size),
            _ => None,
        };

        self.expect_success(Command::MailFrom {
            from,
            size: announced,
        })
        .await?;
        Ok(self.transition())
    }

    /// Runs a whole transaction: MAIL FROM, one RCPT TO per recipient, DATA.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no recipients or any step is rejected.
    pub async fn send(self, from: Address, recipients: &[Address], message: &[u8]) -> Result<Self> {
        let Some((first, rest)) = recipients.split_first() else {
            return Err(Error::InvalidAddress("no recipients".into()));
        };

        let mut client = self
            .mail_from(from, Some(message.len()))
            .await?
            .rcpt_to(first.clone())
            .await?;
        for to in rest {
            client = client.rcpt_to(to.clone()).await?;
        }
        client.data().await?.send_message(message).await
    }
}

impl<S> Client<S, MailTransaction>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Adds the first recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if RCPT TO fails.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Client<S, RecipientAdded>> {
        self.expect_success(Command::RcptTo { to }).await?;
        Ok(self.transition())
    }

    /// Aborts the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if RSET fails.
    pub async fn reset(mut self) -> Result<Client<S, Authenticated>> {
        self.expect_success(Command::Rset).await?;
        Ok(self.transition())
    }
}

impl<S> Client<S, RecipientAdded>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Adds another recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if RCPT TO fails.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Self> {
        self.expect_success(Command::RcptTo { to }).await?;
        Ok(self)
    }

    /// Begins sending message data.
    ///
    /// # Errors
    ///
    /// Returns an error unless the server answers 354.
    pub async fn data(mut self) -> Result<Client<S, Data>> {
        let reply = self.send_command(Command::Data).await?;
        if reply.code != ReplyCode::START_DATA {
            return Err(reply.into_error());
        }
        Ok(self.transition())
    }

    /// Aborts the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if RSET fails.
    pub async fn reset(mut self) -> Result<Client<S, Authenticated>> {
        self.expect_success(Command::Rset).await?;
        Ok(self.transition())
    }
}

impl<S> Client<S, Data>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Sends the message and completes the transaction.
    ///
    /// Line endings are normalized to CRLF, lines starting with `.` are
    /// dot-stuffed and the terminating `.` line is appended.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails or the server rejects the message.
    pub async fn send_message(mut self, message: &[u8]) -> Result<Client<S, Authenticated>> {
        let payload = encode_data(message);
        self.write_all(&payload).await?;

        let reply = read_reply(&mut self.reader).await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }
        Ok(self.transition())
    }
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns what the server told about itself.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT exchange fails.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(Command::Quit).await?;
        if !reply.is_success() && reply.code != ReplyCode::CLOSING {
            return Err(reply.into_error());
        }
        Ok(())
    }

    async fn send_command(&mut self, cmd: Command) -> Result<Reply> {
        self.write_all(&cmd.serialize()).await?;
        read_reply(&mut self.reader).await
    }

    async fn expect_success(&mut self, cmd: Command) -> Result<Reply> {
        let reply = self.send_command(cmd).await?;
        if reply.is_success() {
            Ok(reply)
        } else {
            Err(reply.into_error())
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    fn transition<T>(self) -> Client<S, T> {
        Client {
            reader: self.reader,
            server_info: self.server_info,
            client_hostname: self.client_hostname,
            _state: PhantomData,
        }
    }
}

async fn read_reply<S>(reader: &mut BufReader<S>) -> Result<Reply>
where
    S: AsyncRead + Unpin,
{
    let mut lines = Vec::new();
    loop {
        let mut raw = Vec::new();
        let n = reader.read_until(b'\n', &mut raw).await?;
        if n == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed",
            )));
        }
        if raw.len() > MAX_LINE_LENGTH {
            return Err(Error::Protocol("reply line too long".into()));
        }

        let line = String::from_utf8_lossy(&raw).trim_end().to_string();
        if line.is_empty() {
            continue;
        }
        let last = is_last_reply_line(&line);
        lines.push(line);
        if last {
            return parse_reply(&lines);
        }
    }
}

/// Prepares a message for DATA: CRLF line endings, dot-stuffing and the
/// terminating `.` line.
fn encode_data(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + message.len() / 64 + 5);
    let body = message.strip_suffix(b"\n").unwrap_or(message);
    if !message.is_empty() {
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }
    out.extend_from_slice(b".\r\n");
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::io::{Builder, Mock};

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    fn handshake(builder: &mut Builder) -> &mut Builder {
        builder
            .read(b"220 smtp.example.com ESMTP ready\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250-smtp.example.com\r\n250-SIZE 1000\r\n250 AUTH PLAIN LOGIN\r\n")
            .write(b"AUTH PLAIN AGFuYQBzZWNyZXQ=\r\n")
            .read(b"235 2.7.0 Authentication successful\r\n")
    }

    async fn authenticated(mock: Mock) -> Client<Mock, Authenticated> {
        Client::from_stream(mock)
            .await
            .unwrap()
            .ehlo("localhost")
            .await
            .unwrap()
            .auth_plain("ana", "secret")
            .await
            .unwrap()
    }

    #[test]
    fn data_is_normalized_and_stuffed() {
        assert_eq!(
            encode_data(b"Subject: x\n\n.hidden\r\nend\n"),
            b"Subject: x\r\n\r\n..hidden\r\nend\r\n.\r\n"
        );
        assert_eq!(encode_data(b""), b".\r\n");
        assert_eq!(encode_data(b"no newline"), b"no newline\r\n.\r\n");
    }

    #[tokio::test]
    async fn ehlo_records_extensions() {
        let mock = handshake(&mut Builder::new()).build();
        let client = authenticated(mock).await;

        let info = client.server_info();
        assert_eq!(info.hostname, "smtp.example.com");
        assert_eq!(info.size_limit(), Some(Some(1000)));
        assert_eq!(
            info.auth_mechanisms(),
            vec![AuthMechanism::Plain, AuthMechanism::Login]
        );
        assert!(!info.supports_starttls());
    }

    #[tokio::test]
    async fn full_transaction() {
        let mock = handshake(&mut Builder::new())
            .write(b"MAIL FROM:<ana@example.com> SIZE=13\r\n")
            .read(b"250 2.1.0 Ok\r\n")
            .write(b"RCPT TO:<bo@example.org>\r\n")
            .read(b"250 2.1.5 Ok\r\n")
            .write(b"RCPT TO:<cy@example.net>\r\n")
            .read(b"250 2.1.5 Ok\r\n")
            .write(b"DATA\r\n")
            .read(b"354 End data with <CR><LF>.<CR><LF>\r\n")
            .write(b"Subject: hi\r\n\r\n.\r\n")
            .read(b"250 2.0.0 Ok: queued\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 2.0.0 Bye\r\n")
            .build();
        let client = authenticated(mock).await;

        let client = client
            .send(
                addr("ana@example.com"),
                &[addr("bo@example.org"), addr("cy@example.net")],
                b"Subject: hi\n\n",
            )
            .await
            .unwrap();
        client.quit().await.unwrap();
    }

    #[tokio::test]
    async fn oversize_message_is_refused_locally() {
        let mock = handshake(&mut Builder::new()).build();
        let client = authenticated(mock).await;

        let err = client
            .mail_from(addr("ana@example.com"), Some(4096))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MessageTooLarge { size: 4096, limit: 1000 }));
    }

    #[tokio::test]
    async fn rejected_recipient_is_permanent() {
        let mock = handshake(&mut Builder::new())
            .write(b"MAIL FROM:<ana@example.com> SIZE=2\r\n")
            .read(b"250 Ok\r\n")
            .write(b"RCPT TO:<nobody@example.org>\r\n")
            .read(b"550 5.1.1 User unknown\r\n")
            .build();
        let client = authenticated(mock).await;

        let err = client
            .send(addr("ana@example.com"), &[addr("nobody@example.org")], b"hi")
            .await
            .unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn bad_credentials() {
        let mock = Builder::new()
            .read(b"220 smtp.example.com ESMTP\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250 smtp.example.com\r\n")
            .write(b"AUTH PLAIN AGFuYQBzZWNyZXQ=\r\n")
            .read(b"535 5.7.8 Authentication credentials invalid\r\n")
            .build();
        let client = Client::from_stream(mock)
            .await
            .unwrap()
            .ehlo("localhost")
            .await
            .unwrap();

        let err = client.auth_plain("ana", "secret").await.unwrap_err();
        assert!(matches!(err, Error::Reply { code: 535, .. }));
    }

    #[tokio::test]
    async fn refused_greeting() {
        let mock = Builder::new()
            .read(b"554 No SMTP service here\r\n")
            .build();
        let err = Client::from_stream(mock).await.unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn empty_recipient_list() {
        let mock = handshake(&mut Builder::new()).build();
        let client = authenticated(mock).await;

        let err = client.send(addr("ana@example.com"), &[], b"x").await.unwrap_err();
        assert!(matches!(err, Error::InvalidAddress(_)));
    }
}
