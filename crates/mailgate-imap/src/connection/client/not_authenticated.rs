//! Implementation for the not-authenticated state.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use super::states::{Authenticated, NotAuthenticated};
use super::{Client, check_tagged_ok};
use crate::command::{Command, TagGenerator};
use crate::connection::config::{Config, Security};
use crate::connection::framed::FramedStream;
use crate::connection::stream::{self, ImapStream};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::ResponseCode;
use crate::{Error, Result};

impl Client<ImapStream, NotAuthenticated> {
    /// Dials the server described by `config` and reads its greeting.
    ///
    /// With [`Security::StartTls`] the connection is upgraded before this
    /// returns when the server offers STARTTLS, and stays plaintext
    /// otherwise. Capabilities are requested explicitly when the greeting
    /// did not carry them.
    pub async fn connect(config: &Config) -> Result<Self> {
        let transport = stream::open(config).await?;
        let mut client =
            stream::with_timeout(config.greeting_timeout, Self::from_stream(transport)).await?;

        if config.security == Security::StartTls && client.starttls_offered(&config.host).await? {
            client = client.starttls(&config.host).await?;
        }
        if client.capabilities.is_empty() {
            client.capability().await?;
        }
        debug!(host = %config.host, port = config.port, "IMAP connection ready");
        Ok(client)
    }

    /// Upgrades a plaintext connection with STARTTLS.
    ///
    /// Capabilities learned before the upgrade are discarded and requested
    /// again over the encrypted channel.
    pub async fn starttls(mut self, host: &str) -> Result<Self> {
        if self.stream_is_tls() {
            return Err(Error::InvalidState("connection is already TLS".to_string()));
        }
        self.execute(&Command::StartTls).await?;

        let tls = self.stream.into_inner().upgrade_to_tls(host).await?;
        let mut client = Self {
            stream: FramedStream::new(tls),
            tag_gen: self.tag_gen,
            capabilities: Vec::new(),
            state: NotAuthenticated,
        };
        client.capability().await?;
        Ok(client)
    }

    fn stream_is_tls(&self) -> bool {
        self.stream.get_ref().is_tls()
    }
}

impl<S> Client<S, NotAuthenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new client from a connected stream.
    ///
    /// Reads the server greeting and any capabilities it carries. A BYE
    /// greeting is an error.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut framed = FramedStream::new(stream);

        let greeting = framed.read_response().await?;
        let capabilities = match ResponseParser::parse(&greeting)? {
            Response::Untagged(
                UntaggedResponse::Ok { code, .. } | UntaggedResponse::PreAuth { code, .. },
            ) => match code {
                Some(ResponseCode::Capability(caps)) => caps,
                _ => Vec::new(),
            },
            Response::Untagged(UntaggedResponse::Bye { text, .. }) => {
                return Err(Error::Bye(text));
            }
            other => {
                return Err(Error::Protocol(format!("unexpected greeting: {other:?}")));
            }
        };

        Ok(Self {
            stream: framed,
            tag_gen: TagGenerator::default(),
            capabilities,
            state: NotAuthenticated,
        })
    }

    /// Returns true if STARTTLS can be negotiated, asking for capabilities
    /// first when none are known yet.
    pub async fn starttls_offered(&mut self, host: &str) -> Result<bool> {
        if self.capabilities.is_empty() {
            self.capability().await?;
        }
        if self.supports_starttls() {
            return Ok(true);
        }
        warn!(host, "Server does not offer STARTTLS, continuing without TLS");
        Ok(false)
    }

    /// Authenticates with LOGIN, consuming the connection.
    pub async fn login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        if self.login_disabled() {
            return Err(Error::InvalidState(
                "server disabled LOGIN on this connection".to_string(),
            ));
        }
        let tag = self
            .send(&Command::Login {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await?;

        let responses = self.stream.read_until_tagged(&tag).await?;
        check_tagged_ok(&responses, &tag)?;
        self.absorb_capabilities(&responses);

        Ok(self.into_state(Authenticated))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Capability;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn greeting_capabilities_are_kept() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 MOVE UIDPLUS] ready\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();

        assert!(client.supports_move());
        assert!(client.supports_uidplus());
        assert!(!client.has_capability(&Capability::Imap4Rev2));
    }

    #[tokio::test]
    async fn bye_greeting_is_error() {
        let mock = Builder::new().read(b"* BYE too many connections\r\n").build();
        let err = Client::from_stream(mock).await.unwrap_err();
        assert!(matches!(err, Error::Bye(ref t) if t == "too many connections"));
    }

    #[tokio::test]
    async fn login_sends_quoted_credentials() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN ana@example.com \"pass word\"\r\n")
            .read(b"A0001 OK [CAPABILITY IMAP4rev1 MOVE] logged in\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        let client = client.login("ana@example.com", "pass word").await.unwrap();

        assert!(client.supports_move());
    }

    #[tokio::test]
    async fn rejected_login_is_no() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN ana secret\r\n")
            .read(b"A0001 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        let err = client.login("ana", "secret").await.unwrap_err();

        assert!(matches!(err, Error::No { .. }));
        assert!(!err.is_connection_lost());
    }

    #[tokio::test]
    async fn login_disabled_is_refused_locally() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 STARTTLS LOGINDISABLED] ready\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        assert!(client.supports_starttls());

        let err = client.login("ana", "secret").await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn starttls_is_skipped_when_not_offered() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 CAPABILITY\r\n")
            .read(b"* CAPABILITY IMAP4rev1 AUTH=PLAIN\r\n")
            .read(b"A0001 OK done\r\n")
            .write(b"A0002 LOGIN ana secret\r\n")
            .read(b"A0002 OK logged in\r\n")
            .build();
        let mut client = Client::from_stream(mock).await.unwrap();

        assert!(!client.starttls_offered("imap.example.com").await.unwrap());
        client.login("ana", "secret").await.unwrap();
    }

    #[tokio::test]
    async fn starttls_offered_in_greeting() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 STARTTLS] ready\r\n")
            .build();
        let mut client = Client::from_stream(mock).await.unwrap();
        assert!(client.starttls_offered("imap.example.com").await.unwrap());
    }

    #[tokio::test]
    async fn logout_tolerates_closed_stream() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGOUT\r\n")
            .read(b"* BYE logging out\r\n")
            .build();
        let client = Client::from_stream(mock).await.unwrap();
        assert!(client.logout().await.is_ok());
    }
}
