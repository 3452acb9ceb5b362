//! Implementation for the selected state.
//!
//! Every message is addressed by UID.

use tokio::io::{AsyncRead, AsyncWrite};

use super::states::Selected;
use super::{Client, untagged};
use crate::command::{Command, FetchItems, SearchCriteria, StoreAction};
use crate::parser::{MessageData, UntaggedResponse};
use crate::types::{Mailbox, MailboxStatus, Uid, UidSet};
use crate::Result;

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the selected mailbox name.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        self.state.mailbox()
    }

    /// Returns the status snapshot taken at SELECT.
    #[must_use]
    pub const fn status(&self) -> &MailboxStatus {
        self.state.status()
    }

    /// Runs `UID SEARCH` and returns the matching UIDs in server order.
    pub async fn uid_search(&mut self, criteria: SearchCriteria) -> Result<Vec<Uid>> {
        let responses = self.execute(&Command::UidSearch { criteria }).await?;

        Ok(untagged(&responses)
            .filter_map(|data| match data {
                UntaggedResponse::Search(ids) => Some(ids),
                _ => None,
            })
            .flatten()
            .filter_map(Uid::new)
            .collect())
    }

    /// Runs `UID FETCH`, one record per FETCH response.
    ///
    /// Unsolicited FETCH responses (flag updates for other messages) are
    /// returned as well, so callers match records by UID.
    pub async fn uid_fetch(&mut self, uids: &UidSet, items: FetchItems) -> Result<Vec<MessageData>> {
        let responses = self
            .execute(&Command::UidFetch {
                uids: uids.clone(),
                items,
            })
            .await?;

        Ok(untagged(&responses)
            .filter_map(|data| match data {
                UntaggedResponse::Fetch { seq, items } => Some(MessageData::from_items(seq, items)),
                _ => None,
            })
            .collect())
    }

    /// Runs `UID STORE` in silent mode.
    pub async fn uid_store(&mut self, uids: &UidSet, action: StoreAction) -> Result<()> {
        self.execute(&Command::UidStore {
            uids: uids.clone(),
            action,
        })
        .await
        .map(drop)
    }

    /// Copies messages to another mailbox.
    pub async fn uid_copy(&mut self, uids: &UidSet, mailbox: &str) -> Result<()> {
        self.execute(&Command::UidCopy {
            uids: uids.clone(),
            mailbox: Mailbox::new(mailbox),
        })
        .await
        .map(drop)
    }

    /// Moves messages to another mailbox (RFC 6851).
    pub async fn uid_move(&mut self, uids: &UidSet, mailbox: &str) -> Result<()> {
        self.execute(&Command::UidMove {
            uids: uids.clone(),
            mailbox: Mailbox::new(mailbox),
        })
        .await
        .map(drop)
    }

    /// Permanently removes every message flagged `\Deleted`.
    pub async fn expunge(&mut self) -> Result<()> {
        self.execute(&Command::Expunge).await.map(drop)
    }

    /// Removes only the given `\Deleted` messages (RFC 4315).
    pub async fn uid_expunge(&mut self, uids: &UidSet) -> Result<()> {
        self.execute(&Command::UidExpunge { uids: uids.clone() })
            .await
            .map(drop)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Flag;
    use crate::Error;
    use tokio_test::io::{Builder, Mock};

    async fn selected(mock: Mock) -> Client<Mock, Selected> {
        Client::from_stream(mock)
            .await
            .unwrap()
            .login("ana", "secret")
            .await
            .unwrap()
            .select("INBOX")
            .await
            .unwrap()
    }

    fn script() -> Builder {
        let mut builder = Builder::new();
        builder
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN ana secret\r\n")
            .read(b"A0001 OK logged in\r\n")
            .write(b"A0002 SELECT INBOX\r\n")
            .read(b"* 3 EXISTS\r\n")
            .read(b"A0002 OK [READ-WRITE] done\r\n");
        builder
    }

    fn uids(values: &[u32]) -> UidSet {
        let list: Vec<Uid> = values.iter().map(|&n| Uid::new(n).unwrap()).collect();
        UidSet::list(&list).unwrap()
    }

    #[tokio::test]
    async fn uid_search_collects_uids() {
        let mock = script()
            .write(b"A0003 UID SEARCH ALL\r\n")
            .read(b"* SEARCH 4 9 12\r\n")
            .read(b"A0003 OK SEARCH completed\r\n")
            .build();
        let mut client = selected(mock).await;
        let found = client.uid_search(SearchCriteria::All).await.unwrap();

        let values: Vec<u32> = found.into_iter().map(Uid::get).collect();
        assert_eq!(values, vec![4, 9, 12]);
    }

    #[tokio::test]
    async fn uid_fetch_exact_list() {
        let mock = script()
            .write(b"A0003 UID FETCH 12,4 (UID FLAGS)\r\n")
            .read(b"* 3 FETCH (UID 12 FLAGS (\\Seen))\r\n")
            .read(b"* 1 FETCH (UID 4 FLAGS ())\r\n")
            .read(b"A0003 OK FETCH completed\r\n")
            .build();
        let mut client = selected(mock).await;
        let items = FetchItems::new([
            crate::command::FetchAttribute::Uid,
            crate::command::FetchAttribute::Flags,
        ]);
        let messages = client.uid_fetch(&uids(&[12, 4]), items).await.unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].uid.unwrap().get(), 12);
        assert!(messages[0].flags.is_seen());
        assert!(messages[1].flags.is_empty());
    }

    #[tokio::test]
    async fn uid_store_is_silent() {
        let mock = script()
            .write(b"A0003 UID STORE 7 +FLAGS.SILENT (\\Flagged)\r\n")
            .read(b"A0003 OK STORE completed\r\n")
            .build();
        let mut client = selected(mock).await;
        client
            .uid_store(&uids(&[7]), StoreAction::AddFlags(vec![Flag::Flagged]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn uid_move_to_quoted_mailbox() {
        let mock = script()
            .write(b"A0003 UID MOVE 7 \"Deleted Items\"\r\n")
            .read(b"* 2 EXPUNGE\r\n")
            .read(b"A0003 OK MOVE completed\r\n")
            .build();
        let mut client = selected(mock).await;
        client.uid_move(&uids(&[7]), "Deleted Items").await.unwrap();
    }

    #[tokio::test]
    async fn bad_message_set_is_not_fatal() {
        let mock = script()
            .write(b"A0003 UID COPY 99 Archive\r\n")
            .read(b"A0003 BAD Error in IMAP command UID COPY: Invalid messageset\r\n")
            .write(b"A0004 EXPUNGE\r\n")
            .read(b"A0004 OK EXPUNGE completed\r\n")
            .build();
        let mut client = selected(mock).await;
        let err = client.uid_copy(&uids(&[99]), "Archive").await.unwrap_err();
        assert!(matches!(err, Error::Bad(_)));
        assert!(!err.is_connection_lost());

        client.expunge().await.unwrap();
    }

    #[tokio::test]
    async fn reselect_switches_mailbox() {
        let mock = script()
            .write(b"A0003 SELECT Archive\r\n")
            .read(b"* 0 EXISTS\r\n")
            .read(b"A0003 OK done\r\n")
            .build();
        let client = selected(mock).await.select("Archive").await.unwrap();
        assert_eq!(client.mailbox(), "Archive");
        assert_eq!(client.status().exists, 0);
    }
}
