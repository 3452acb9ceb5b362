//! Shared fixtures for unit tests: a scripted IMAP connector and records.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use mailgate_imap::{Authenticated, Client};
use tokio_test::io::{Builder, Mock};

use crate::account::{ActiveIdentity, CredentialRecord, Endpoint, Identities, Identity, Security};
use crate::pool::Connector;
use crate::send::Submitter;
use crate::{Error, Result};

/// Connector that hands out scripted mock streams in order.
#[derive(Clone, Default)]
pub struct MockConnector {
    scripts: Arc<Mutex<VecDeque<Mock>>>,
    dials: Arc<AtomicUsize>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, mock: Mock) {
        self.scripts.lock().unwrap().push_back(mock);
    }

    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    type Stream = Mock;

    async fn connect(&self, identity: &ActiveIdentity) -> Result<Client<Mock, Authenticated>> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().pop_front();
        let Some(mock) = script else {
            return Err(Error::ConnectionFailed("connection refused".to_string()));
        };
        let client = Client::from_stream(mock)
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        client
            .login(&identity.identity.username, &identity.identity.secret)
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))
    }
}

/// Greeting advertising MOVE, then LOGIN as the primary identity.
pub fn login_script(builder: &mut Builder) -> &mut Builder {
    builder
        .read(b"* OK [CAPABILITY IMAP4rev1 MOVE UIDPLUS] ready\r\n")
        .write(b"A0001 LOGIN ana secret\r\n")
        .read(b"A0001 OK done\r\n")
}

/// Same as [`login_script`] for a server without MOVE.
pub fn login_script_without_move(builder: &mut Builder) -> &mut Builder {
    builder
        .read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
        .write(b"A0001 LOGIN ana secret\r\n")
        .read(b"A0001 OK done\r\n")
}

/// A record with a `primary` identity (`ana`) and a `sales` sub-account.
pub fn record() -> CredentialRecord {
    CredentialRecord {
        imap: Endpoint::new("imap.example.com", 993, Security::Tls),
        smtp: Endpoint::new("smtp.example.com", 465, Security::Tls),
        identities: Identities::Multi {
            primary: Identity::new("primary", "ana", "secret"),
            identities: vec![Identity::new("sales", "sales", "secret2")],
        },
    }
}

/// One message handed to [`MockSubmitter`].
#[derive(Debug, Clone)]
pub struct Submission {
    pub username: String,
    pub from: String,
    pub recipients: Vec<String>,
    pub raw: Vec<u8>,
}

/// Submitter that records messages instead of speaking SMTP.
#[derive(Clone, Default)]
pub struct MockSubmitter {
    sent: Arc<Mutex<Vec<Submission>>>,
    verified: Arc<AtomicUsize>,
    failure: Option<String>,
}

impl MockSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A submitter whose every call fails with `reply`.
    pub fn failing(reply: &str) -> Self {
        Self {
            failure: Some(reply.to_string()),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Submission> {
        self.sent.lock().unwrap().clone()
    }

    pub fn verified(&self) -> usize {
        self.verified.load(Ordering::SeqCst)
    }
}

impl Submitter for MockSubmitter {
    async fn submit(
        &self,
        identity: &ActiveIdentity,
        from: &str,
        recipients: &[String],
        message: &[u8],
    ) -> Result<()> {
        if let Some(reply) = &self.failure {
            return Err(Error::Submission(reply.clone()));
        }
        self.sent.lock().unwrap().push(Submission {
            username: identity.identity.username.clone(),
            from: from.to_string(),
            recipients: recipients.to_vec(),
            raw: message.to_vec(),
        });
        Ok(())
    }

    async fn verify(&self, _identity: &ActiveIdentity) -> Result<()> {
        self.verified.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(reply) => Err(Error::ConnectionFailed(format!("SMTP: {reply}"))),
            None => Ok(()),
        }
    }
}
