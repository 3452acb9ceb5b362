//! Type-state IMAP client connection.
//!
//! The connection states are:
//!
//! - `NotAuthenticated`: after the greeting, before LOGIN
//! - `Authenticated`: after LOGIN
//! - `Selected`: after SELECT, carrying the mailbox name and its status
//!
//! Each state only exposes the commands that are valid in it. LIST, APPEND
//! and SELECT are shared by the two logged-in states through [`LoggedIn`].

#![allow(clippy::missing_errors_doc)]

mod authenticated;
mod not_authenticated;
mod selected;
mod states;

use tokio::io::{AsyncRead, AsyncWrite};

pub use self::states::{Authenticated, LoggedIn, NotAuthenticated, Selected};
use super::framed::{FramedStream, literal_segments};
use crate::command::{Command, TagGenerator};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{Capability, ResponseCode, Status};
use crate::{Error, Result};

/// IMAP client connection with type-state.
pub struct Client<S, State> {
    pub(crate) stream: FramedStream<S>,
    pub(crate) tag_gen: TagGenerator,
    pub(crate) capabilities: Vec<Capability>,
    pub(crate) state: State,
}

impl<S, State: std::fmt::Debug> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("tag_gen", &self.tag_gen)
            .field("capabilities", &self.capabilities)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the server capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Checks if the server has a specific capability.
    #[must_use]
    pub fn has_capability(&self, cap: &Capability) -> bool {
        self.capabilities.contains(cap)
    }

    /// Returns true if the server supports MOVE (RFC 6851).
    #[must_use]
    pub fn supports_move(&self) -> bool {
        self.has_capability(&Capability::Move)
    }

    /// Returns true if the server supports UIDPLUS (RFC 4315).
    #[must_use]
    pub fn supports_uidplus(&self) -> bool {
        self.has_capability(&Capability::UidPlus)
    }

    /// Returns true if the server offers STARTTLS.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.has_capability(&Capability::StartTls)
    }

    /// Returns true if LOGIN is disabled (e.g., before STARTTLS).
    #[must_use]
    pub fn login_disabled(&self) -> bool {
        self.has_capability(&Capability::LoginDisabled)
    }

    /// Sends a NOOP command.
    pub async fn noop(&mut self) -> Result<()> {
        self.execute(&Command::Noop).await.map(drop)
    }

    /// Sends a CAPABILITY command and updates the stored capabilities.
    pub async fn capability(&mut self) -> Result<Vec<Capability>> {
        let responses = self.execute(&Command::Capability).await?;
        self.absorb_capabilities(&responses);
        Ok(self.capabilities.clone())
    }

    /// Gracefully disconnects from the server.
    ///
    /// The server may close the stream right after its BYE, so a missing
    /// tagged completion is not treated as a failure.
    pub async fn logout(mut self) -> Result<()> {
        let tag = self.send(&Command::Logout).await?;

        match self.stream.read_until_tagged(&tag).await {
            Ok(responses) => match check_tagged_ok(&responses, &tag) {
                Err(Error::No { .. } | Error::Bad(_)) | Ok(()) => Ok(()),
                Err(e) => Err(e),
            },
            Err(Error::Io(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Sends a command and reads through its tagged completion, failing on
    /// NO, BAD or BYE.
    pub(crate) async fn execute(&mut self, command: &Command) -> Result<Vec<Vec<u8>>> {
        let tag = self.send(command).await?;
        let responses = self.stream.read_until_tagged(&tag).await?;
        check_tagged_ok(&responses, &tag)?;
        Ok(responses)
    }

    /// Writes a command under a fresh tag and returns the tag.
    ///
    /// Literal arguments are sent one at a time, each after the server's
    /// continuation.
    pub(crate) async fn send(&mut self, command: &Command) -> Result<String> {
        let tag = self.tag_gen.next();
        let wire = command.serialize(&tag);
        let mut segments = literal_segments(&wire).into_iter();

        if let Some(first) = segments.next() {
            self.stream.write_command(first).await?;
        }
        for segment in segments {
            self.continuation(&tag).await?;
            self.stream.write_command(segment).await?;
        }
        Ok(tag)
    }

    /// Waits for a `+` continuation, skipping untagged data the server
    /// sends in between. A tagged completion for `tag` means the server
    /// refused the command.
    pub(crate) async fn continuation(&mut self, tag: &str) -> Result<()> {
        loop {
            let reply = self.stream.read_response().await?;
            let response = match ResponseParser::parse(&reply) {
                Ok(response) => response,
                Err(_) if reply.starts_with(b"* ") => continue,
                Err(e) => return Err(e),
            };
            match response {
                Response::Continuation { .. } => return Ok(()),
                Response::Untagged(UntaggedResponse::Bye { text, .. }) => {
                    return Err(Error::Bye(text));
                }
                Response::Untagged(_) => {}
                Response::Tagged {
                    tag: got,
                    status,
                    code,
                    text,
                } if got.as_str() == tag => {
                    return Err(match status {
                        Status::No => Error::No { code, text },
                        Status::Bad => Error::Bad(text),
                        Status::Bye => Error::Bye(text),
                        Status::Ok | Status::PreAuth => {
                            Error::Protocol("command completed without a continuation".to_string())
                        }
                    });
                }
                Response::Tagged { .. } => {
                    return Err(Error::Protocol("unexpected tagged response".to_string()));
                }
            }
        }
    }

    /// Picks up capabilities announced as untagged data or as a response code.
    pub(crate) fn absorb_capabilities(&mut self, responses: &[Vec<u8>]) {
        for bytes in responses {
            match ResponseParser::parse(bytes) {
                Ok(Response::Untagged(UntaggedResponse::Capability(caps)))
                | Ok(Response::Tagged {
                    code: Some(ResponseCode::Capability(caps)),
                    ..
                })
                | Ok(Response::Untagged(UntaggedResponse::Ok {
                    code: Some(ResponseCode::Capability(caps)),
                    ..
                })) => self.capabilities = caps,
                _ => {}
            }
        }
    }

    /// Moves the connection into another state.
    pub(crate) fn into_state<T>(self, state: T) -> Client<S, T> {
        Client {
            stream: self.stream,
            tag_gen: self.tag_gen,
            capabilities: self.capabilities,
            state,
        }
    }
}

/// Parses every response, skipping lines the parser does not model.
pub(crate) fn untagged(responses: &[Vec<u8>]) -> impl Iterator<Item = UntaggedResponse> + '_ {
    responses
        .iter()
        .filter_map(|bytes| match ResponseParser::parse(bytes) {
            Ok(Response::Untagged(data)) => Some(data),
            _ => None,
        })
}

/// Checks that the tagged completion for `tag` is OK.
pub(crate) fn check_tagged_ok(responses: &[Vec<u8>], tag: &str) -> Result<()> {
    let Some(last) = responses.last() else {
        return Err(Error::Protocol("missing tagged response".to_string()));
    };
    match ResponseParser::parse(last)? {
        Response::Tagged {
            tag: got,
            status,
            code,
            text,
        } if got.as_str() == tag => match status {
            Status::Ok | Status::PreAuth => Ok(()),
            Status::No => Err(Error::No { code, text }),
            Status::Bad => Err(Error::Bad(text)),
            Status::Bye => Err(Error::Bye(text)),
        },
        _ => Err(Error::Protocol("missing tagged response".to_string())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn lines(raw: &[&[u8]]) -> Vec<Vec<u8>> {
        raw.iter().map(|l| l.to_vec()).collect()
    }

    #[test]
    fn tagged_ok_passes() {
        let responses = lines(&[b"* 3 EXISTS\r\n", b"A0001 OK done\r\n"]);
        assert!(check_tagged_ok(&responses, "A0001").is_ok());
    }

    #[test]
    fn tagged_no_keeps_response_code() {
        let responses = lines(&[b"A0002 NO [NONEXISTENT] Unknown mailbox\r\n"]);
        let err = check_tagged_ok(&responses, "A0002").unwrap_err();
        assert_eq!(err.response_code(), Some(&ResponseCode::Nonexistent));
        assert!(!err.is_connection_lost());
    }

    #[test]
    fn tagged_bad_is_bad() {
        let responses = lines(&[b"A0003 BAD Invalid messageset\r\n"]);
        let err = check_tagged_ok(&responses, "A0003").unwrap_err();
        assert!(matches!(err, Error::Bad(ref t) if t == "Invalid messageset"));
    }

    #[test]
    fn wrong_tag_is_protocol_error() {
        let responses = lines(&[b"A0009 OK done\r\n"]);
        let err = check_tagged_ok(&responses, "A0001").unwrap_err();
        assert!(err.is_connection_lost());
    }

    #[test]
    fn untagged_skips_unmodelled_lines() {
        let responses = lines(&[
            b"* STATUS INBOX (MESSAGES 2)\r\n",
            b"* 4 EXISTS\r\n",
            b"A0001 OK done\r\n",
        ]);
        let data: Vec<_> = untagged(&responses).collect();
        assert_eq!(data, vec![UntaggedResponse::Exists(4)]);
    }
}
