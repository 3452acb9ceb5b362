//! Commands shared by the logged-in states.

use tokio::io::{AsyncRead, AsyncWrite};

use super::states::{Authenticated, LoggedIn, Selected};
use super::{Client, check_tagged_ok, untagged};
use crate::command::Command;
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{Flag, ListResponse, Mailbox, MailboxStatus, ResponseCode};
use crate::{Error, Result};

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
    State: LoggedIn,
{
    /// Selects a mailbox for read-write access.
    ///
    /// Consumes the client; use [`Self::try_select`] to keep the
    /// connection when the server refuses.
    pub async fn select(self, mailbox: &str) -> Result<Client<S, Selected>> {
        self.try_select(mailbox).await.map_err(|(_, e)| e)
    }

    /// Selects a mailbox, handing the connection back in the authenticated
    /// state on failure. A refused SELECT closes any previously selected
    /// mailbox, so that is the state the server is in too.
    pub async fn try_select(
        mut self,
        mailbox: &str,
    ) -> std::result::Result<Client<S, Selected>, (Client<S, Authenticated>, Error)> {
        let command = Command::Select {
            mailbox: Mailbox::new(mailbox),
        };
        match self.execute(&command).await {
            Ok(responses) => {
                let status = parse_mailbox_status(&responses);
                Ok(self.into_state(Selected::new(mailbox, status)))
            }
            Err(e) => Err((self.into_state(Authenticated), e)),
        }
    }

    /// Lists mailboxes matching a pattern.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        let responses = self
            .execute(&Command::List {
                reference: reference.to_string(),
                pattern: pattern.to_string(),
            })
            .await?;

        Ok(untagged(&responses)
            .filter_map(|data| match data {
                UntaggedResponse::List(item) => Some(item),
                _ => None,
            })
            .collect())
    }

    /// Appends a complete RFC 5322 message to a mailbox.
    ///
    /// The message travels as a synchronizing literal, so the server must
    /// answer the command line with a continuation first.
    pub async fn append(
        &mut self,
        mailbox: &str,
        flags: Option<Vec<Flag>>,
        message: &[u8],
    ) -> Result<()> {
        let tag = self
            .send(&Command::Append {
                mailbox: Mailbox::new(mailbox),
                flags,
                size: message.len(),
            })
            .await?;
        self.continuation(&tag).await?;

        let mut literal = Vec::with_capacity(message.len() + 2);
        literal.extend_from_slice(message);
        literal.extend_from_slice(b"\r\n");
        self.stream.write_command(&literal).await?;

        let responses = self.stream.read_until_tagged(&tag).await?;
        check_tagged_ok(&responses, &tag)
    }
}

/// Gathers the mailbox status from SELECT responses.
pub(super) fn parse_mailbox_status(responses: &[Vec<u8>]) -> MailboxStatus {
    let mut status = MailboxStatus::default();

    for bytes in responses {
        let code = match ResponseParser::parse(bytes) {
            Ok(Response::Untagged(UntaggedResponse::Exists(n))) => {
                status.exists = n;
                continue;
            }
            Ok(Response::Untagged(UntaggedResponse::Recent(n))) => {
                status.recent = n;
                continue;
            }
            Ok(Response::Untagged(UntaggedResponse::Flags(flags))) => {
                status.flags = flags;
                continue;
            }
            Ok(
                Response::Untagged(UntaggedResponse::Ok {
                    code: Some(code), ..
                })
                | Response::Tagged {
                    code: Some(code), ..
                },
            ) => code,
            _ => continue,
        };
        match code {
            ResponseCode::UidValidity(v) => status.uid_validity = Some(v),
            ResponseCode::UidNext(v) => status.uid_next = Some(v),
            ResponseCode::Unseen(v) => status.unseen = Some(v),
            ResponseCode::ReadOnly => status.read_only = true,
            ResponseCode::ReadWrite => status.read_only = false,
            _ => {}
        }
    }

    status
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::connection::client::Authenticated;
    use crate::types::MailboxAttribute;
    use tokio_test::io::Builder;

    async fn logged_in(mock: tokio_test::io::Mock) -> Client<tokio_test::io::Mock, Authenticated> {
        Client::from_stream(mock)
            .await
            .unwrap()
            .login("ana", "secret")
            .await
            .unwrap()
    }

    fn session(script: &mut Builder) -> &mut Builder {
        script
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN ana secret\r\n")
            .read(b"A0001 OK logged in\r\n")
    }

    #[tokio::test]
    async fn select_captures_status() {
        let mock = session(&mut Builder::new())
            .write(b"A0002 SELECT \"Sent Items\"\r\n")
            .read(b"* 172 EXISTS\r\n")
            .read(b"* FLAGS (\\Answered \\Seen)\r\n")
            .read(b"* OK [UIDVALIDITY 3857529045] UIDs valid\r\n")
            .read(b"* OK [UIDNEXT 4392] Predicted next UID\r\n")
            .read(b"A0002 OK [READ-WRITE] SELECT completed\r\n")
            .build();
        let client = logged_in(mock).await.select("Sent Items").await.unwrap();

        assert_eq!(client.mailbox(), "Sent Items");
        assert_eq!(client.status().exists, 172);
        assert_eq!(client.status().uid_next.unwrap().get(), 4392);
        assert!(!client.status().read_only);
    }

    #[tokio::test]
    async fn select_missing_mailbox_is_no() {
        let mock = session(&mut Builder::new())
            .write(b"A0002 SELECT Nowhere\r\n")
            .read(b"A0002 NO [NONEXISTENT] Mailbox doesn't exist\r\n")
            .build();
        let err = logged_in(mock).await.select("Nowhere").await.unwrap_err();
        assert_eq!(err.response_code(), Some(&ResponseCode::Nonexistent));
    }

    #[tokio::test]
    async fn refused_select_returns_the_connection() {
        let mock = session(&mut Builder::new())
            .write(b"A0002 SELECT Nowhere\r\n")
            .read(b"A0002 NO [NONEXISTENT] Mailbox doesn't exist\r\n")
            .write(b"A0003 LIST \"\" \"*\"\r\n")
            .read(b"* LIST () \"/\" INBOX\r\n")
            .read(b"A0003 OK done\r\n")
            .build();
        let Err((mut client, err)) = logged_in(mock).await.try_select("Nowhere").await else {
            panic!("SELECT should have been refused");
        };
        assert!(!err.is_connection_lost());
        assert_eq!(client.list("", "*").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn select_sends_eight_bit_names_as_literal() {
        let mock = session(&mut Builder::new())
            .write(b"A0002 SELECT {9}\r\n")
            .read(b"+ go ahead\r\n")
            .write("Entwürfe\r\n".as_bytes())
            .read(b"* 0 EXISTS\r\n")
            .read(b"A0002 OK [READ-WRITE] done\r\n")
            .build();
        let client = logged_in(mock).await.select("Entwürfe").await.unwrap();
        assert_eq!(client.mailbox(), "Entwürfe");
    }

    #[tokio::test]
    async fn line_breaks_in_a_name_stay_inside_the_literal() {
        let mock = session(&mut Builder::new())
            .write(b"A0002 SELECT {24}\r\n")
            .read(b"A0002 BAD literal refused\r\n")
            .build();
        let err = logged_in(mock)
            .await
            .select("INBOX\r\nZ1 DELETE Trash\r\n")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Bad(_)));
    }

    #[tokio::test]
    async fn list_returns_entries() {
        let mock = session(&mut Builder::new())
            .write(b"A0002 LIST \"\" \"*\"\r\n")
            .read(b"* LIST (\\HasNoChildren) \"/\" INBOX\r\n")
            .read(b"* LIST (\\HasNoChildren \\Trash) \"/\" \"Deleted Items\"\r\n")
            .read(b"A0002 OK LIST completed\r\n")
            .build();
        let mut client = logged_in(mock).await;
        let folders = client.list("", "*").await.unwrap();

        assert_eq!(folders.len(), 2);
        assert_eq!(folders[1].mailbox.as_str(), "Deleted Items");
        assert!(folders[1].has_attribute(&MailboxAttribute::Trash));
    }

    #[tokio::test]
    async fn append_waits_for_continuation() {
        let mock = session(&mut Builder::new())
            .write(b"A0002 APPEND Sent (\\Seen) {5}\r\n")
            .read(b"+ Ready for literal data\r\n")
            .write(b"hello\r\n")
            .read(b"A0002 OK [APPENDUID 38505 3955] APPEND completed\r\n")
            .build();
        let mut client = logged_in(mock).await;
        client
            .append("Sent", Some(vec![Flag::Seen]), b"hello")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn append_skips_untagged_data_before_continuation() {
        let mock = session(&mut Builder::new())
            .write(b"A0002 APPEND Sent {5}\r\n")
            .read(b"* 4 EXISTS\r\n")
            .read(b"+ Ready\r\n")
            .write(b"hello\r\n")
            .read(b"A0002 OK done\r\n")
            .build();
        let mut client = logged_in(mock).await;
        client.append("Sent", None, b"hello").await.unwrap();
    }

    #[tokio::test]
    async fn append_rejected_before_literal() {
        let mock = session(&mut Builder::new())
            .write(b"A0002 APPEND Sent {5}\r\n")
            .read(b"A0002 NO [TRYCREATE] No such mailbox\r\n")
            .build();
        let mut client = logged_in(mock).await;
        let err = client.append("Sent", None, b"hello").await.unwrap_err();

        assert_eq!(err.response_code(), Some(&ResponseCode::TryCreate));
    }
}
