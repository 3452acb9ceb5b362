//! End-to-end client tests against a scripted in-memory server.

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use proptest::prelude::*;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use mailgate_imap::{
    BodyStructure, Client, Error, FetchItems, Flag, ResponseParser, SearchCriteria, StoreAction,
    Uid, UidSet,
};

/// Serves canned responses and records everything the client writes.
struct MockStream {
    responses: Cursor<Vec<u8>>,
    sent: Arc<Mutex<Vec<u8>>>,
}

impl MockStream {
    fn new(responses: &[u8]) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let stream = Self {
            responses: Cursor::new(responses.to_vec()),
            sent: Arc::clone(&sent),
        };
        (stream, sent)
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let pos = usize::try_from(self.responses.position()).unwrap_or(usize::MAX);
        let data = self.responses.get_ref();
        if pos >= data.len() {
            return Poll::Ready(Ok(()));
        }

        let remaining = &data[pos..];
        let n = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..n]);
        self.responses.set_position((pos + n) as u64);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.extend_from_slice(buf);
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn uid(n: u32) -> Uid {
    Uid::new(n).unwrap()
}

#[tokio::test]
async fn test_list_page_session() {
    let script = b"* OK [CAPABILITY IMAP4rev1 MOVE] ready\r\n\
A0001 OK logged in\r\n\
* 3 EXISTS\r\n\
* OK [UIDVALIDITY 7] ok\r\n\
A0002 OK [READ-WRITE] selected\r\n\
* SEARCH 3 8 5\r\n\
A0003 OK searched\r\n\
* 2 FETCH (UID 8 FLAGS (\\Seen) RFC822.SIZE 2048 INTERNALDATE \"17-Jul-2024 09:30:00 +0200\" \
ENVELOPE (\"Wed, 17 Jul 2024 09:29:58 +0200\" \"Quarterly numbers\" ((\"Ana\" NIL \"ana\" \"example.com\")) NIL NIL \
((NIL NIL \"bo\" \"example.org\")) NIL NIL NIL \"<q3@example.com>\") \
BODYSTRUCTURE ((\"text\" \"plain\" (\"charset\" \"utf-8\") NIL NIL \"7bit\" 12 1 NIL NIL NIL NIL)\
(\"application\" \"pdf\" (\"name\" \"q3.pdf\") NIL NIL \"base64\" 4000 NIL (\"attachment\" (\"filename\" \"q3.pdf\")) NIL NIL) \
\"mixed\" (\"boundary\" \"b1\") NIL NIL))\r\n\
A0004 OK fetched\r\n\
A0005 OK logged out\r\n";

    let (stream, sent) = MockStream::new(script);
    let client = Client::from_stream(stream).await.unwrap();
    assert!(client.supports_move());

    let client = client.login("ana@example.com", "secret").await.unwrap();
    let mut inbox = client.select("INBOX").await.unwrap();
    assert_eq!(inbox.status().exists, 3);

    let mut uids = inbox.uid_search(SearchCriteria::All).await.unwrap();
    uids.sort_unstable_by(|a, b| b.cmp(a));
    assert_eq!(uids, vec![uid(8), uid(5), uid(3)]);

    let set = UidSet::list(&[uid(8)]).unwrap();
    let messages = inbox.uid_fetch(&set, FetchItems::summary()).await.unwrap();
    assert_eq!(messages.len(), 1);

    let message = &messages[0];
    assert_eq!(message.uid, Some(uid(8)));
    assert_eq!(message.size, Some(2048));
    let envelope = message.envelope.as_ref().unwrap();
    assert_eq!(envelope.subject.as_deref(), Some("Quarterly numbers"));
    assert_eq!(envelope.from[0].email().as_deref(), Some("ana@example.com"));
    match message.body_structure.as_ref().unwrap() {
        BodyStructure::Multipart { bodies, subtype, .. } => {
            assert_eq!(subtype, "mixed");
            assert_eq!(bodies[1].disposition().unwrap().kind, "attachment");
        }
        other => panic!("Expected multipart, got {other:?}"),
    }

    inbox.logout().await.unwrap();

    let sent = String::from_utf8(sent.lock().unwrap().clone()).unwrap();
    assert!(sent.contains("A0001 LOGIN ana@example.com secret\r\n"));
    assert!(sent.contains("A0002 SELECT INBOX\r\n"));
    assert!(sent.contains("A0003 UID SEARCH ALL\r\n"));
    assert!(sent.contains("A0004 UID FETCH 8 (UID FLAGS ENVELOPE INTERNALDATE RFC822.SIZE BODYSTRUCTURE)\r\n"));
    assert!(sent.ends_with("A0005 LOGOUT\r\n"));
}

#[tokio::test]
async fn test_delete_then_expunge() {
    let script = b"* OK ready\r\n\
A0001 OK logged in\r\n\
A0002 OK selected\r\n\
A0003 OK stored\r\n\
* 4 EXPUNGE\r\n\
A0004 OK expunged\r\n";

    let (stream, sent) = MockStream::new(script);
    let client = Client::from_stream(stream).await.unwrap();
    let mut inbox = client
        .login("ana", "secret")
        .await
        .unwrap()
        .select("INBOX")
        .await
        .unwrap();

    let set = UidSet::list(&[uid(41)]).unwrap();
    inbox
        .uid_store(&set, StoreAction::AddFlags(vec![Flag::Deleted]))
        .await
        .unwrap();
    inbox.expunge().await.unwrap();

    let sent = String::from_utf8(sent.lock().unwrap().clone()).unwrap();
    assert!(sent.contains("A0003 UID STORE 41 +FLAGS.SILENT (\\Deleted)\r\n"));
    assert!(sent.ends_with("A0004 EXPUNGE\r\n"));
}

#[tokio::test]
async fn test_server_hangup_is_connection_loss() {
    let (stream, _) = MockStream::new(b"* OK ready\r\n");
    let client = Client::from_stream(stream).await.unwrap();

    let err = client.login("ana", "secret").await.unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert!(err.is_connection_lost());
}

proptest! {
    #[test]
    fn parser_never_panics(input in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = ResponseParser::parse(&input);
    }

    #[test]
    fn uid_list_keeps_every_uid(values in proptest::collection::btree_set(1u32..10_000, 1..40)) {
        let uids: Vec<Uid> = values.iter().rev().map(|&n| uid(n)).collect();
        let rendered = UidSet::list(&uids).unwrap().to_string();
        let parsed: Vec<u32> = rendered.split(',').map(|s| s.parse().unwrap()).collect();
        let expected: Vec<u32> = values.iter().rev().copied().collect();
        prop_assert_eq!(parsed, expected);
    }
}
