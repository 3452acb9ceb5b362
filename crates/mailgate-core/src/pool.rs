//! Pool of live IMAP connections, one per account identity.
//!
//! Each [`PoolKey`] owns a slot guarded by an async mutex. The first
//! `acquire` for a key dials while holding the slot, so concurrent callers
//! wait for that dial instead of opening their own connection; the same
//! mutex then serializes commands on the connection. Callers hand transport
//! failures back through [`PooledSession::report`], and a broken connection
//! leaves the pool when its guard is dropped.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use mailgate_imap::{
    Authenticated, Client, Flag, ImapStream, ListResponse, NotAuthenticated, Selected,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::account::{AccountId, ActiveIdentity, CredentialRecord};
use crate::{Error, Result};

/// Pool timing settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Connections unused for this long are closed by the sweeper.
    pub idle_timeout: Duration,
    /// How often the sweeper runs.
    pub sweep_interval: Duration,
    /// Bound on TCP connect plus TLS handshake.
    pub connect_timeout: Duration,
    /// Bound on waiting for the server greeting.
    pub greeting_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(30),
            greeting_timeout: Duration::from_secs(15),
        }
    }
}

/// Identifies one pooled connection: `account_id:identity_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    account_id: AccountId,
    identity_id: String,
}

impl PoolKey {
    /// Creates a key.
    #[must_use]
    pub fn new(account_id: AccountId, identity_id: impl Into<String>) -> Self {
        Self {
            account_id,
            identity_id: identity_id.into(),
        }
    }

    /// Account half of the key.
    #[must_use]
    pub const fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// Identity half of the key.
    #[must_use]
    pub fn identity_id(&self) -> &str {
        &self.identity_id
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.account_id, self.identity_id)
    }
}

/// Opens authenticated IMAP connections for the pool.
pub trait Connector: Send + Sync + 'static {
    /// Transport the connections run over.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Dials and logs in as the given identity.
    ///
    /// Failures must be reported as [`Error::ConnectionFailed`].
    fn connect(
        &self,
        identity: &ActiveIdentity,
    ) -> impl Future<Output = Result<Client<Self::Stream, Authenticated>>> + Send;
}

/// Dials real servers over TCP with TLS or STARTTLS.
#[derive(Debug, Clone)]
pub struct ImapConnector {
    connect_timeout: Duration,
    greeting_timeout: Duration,
}

impl ImapConnector {
    /// Creates a connector with the pool's timeouts.
    #[must_use]
    pub const fn new(config: &PoolConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout,
            greeting_timeout: config.greeting_timeout,
        }
    }
}

impl Default for ImapConnector {
    fn default() -> Self {
        Self::new(&PoolConfig::default())
    }
}

impl Connector for ImapConnector {
    type Stream = ImapStream;

    async fn connect(&self, identity: &ActiveIdentity) -> Result<Client<ImapStream, Authenticated>> {
        let config = mailgate_imap::Config::builder(&identity.imap.host)
            .port(identity.imap.port)
            .security(identity.imap.security.into())
            .connect_timeout(self.connect_timeout)
            .greeting_timeout(self.greeting_timeout)
            .build();

        let client = Client::<ImapStream, NotAuthenticated>::connect(&config)
            .await
            .map_err(|e| Error::ConnectionFailed(format!("{}: {e}", config.address())))?;
        client
            .login(&identity.identity.username, &identity.identity.secret)
            .await
            .map_err(|e| {
                Error::ConnectionFailed(format!(
                    "login as {} on {} failed: {e}",
                    identity.identity.username,
                    config.address()
                ))
            })
    }
}

/// A logged-in connection, with or without a selected mailbox.
enum Session<S> {
    Authenticated(Client<S, Authenticated>),
    Selected(Client<S, Selected>),
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn logout(self) -> mailgate_imap::Result<()> {
        match self {
            Self::Authenticated(client) => client.logout().await,
            Self::Selected(client) => client.logout().await,
        }
    }
}

struct Live<S> {
    session: Session<S>,
    last_used: Instant,
}

type Slot<S> = Arc<AsyncMutex<Option<Live<S>>>>;
type Slots<S> = Arc<Mutex<HashMap<PoolKey, Slot<S>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn closed() -> mailgate_imap::Error {
    mailgate_imap::Error::InvalidState("pooled connection is closed".to_string())
}

/// Caches one live connection per [`PoolKey`].
pub struct ConnectionPool<C: Connector = ImapConnector> {
    connector: C,
    config: PoolConfig,
    slots: Slots<C::Stream>,
    sweeper: Mutex<Option<AbortHandle>>,
}

impl ConnectionPool<ImapConnector> {
    /// Creates a pool that dials real servers.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        Self::with_connector(ImapConnector::new(&config), config)
    }
}

impl<C: Connector> ConnectionPool<C> {
    /// Creates a pool around a custom connector.
    #[must_use]
    pub fn with_connector(connector: C, config: PoolConfig) -> Self {
        Self {
            connector,
            config,
            slots: Arc::new(Mutex::new(HashMap::new())),
            sweeper: Mutex::new(None),
        }
    }

    /// The pool's settings.
    #[must_use]
    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// The connector used for dialing, for one-off connections outside the
    /// pool.
    #[must_use]
    pub const fn connector(&self) -> &C {
        &self.connector
    }

    /// Number of keys currently holding or dialing a connection.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    /// Returns true if the pool holds no connections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lends the connection for an account identity, dialing it on a miss.
    ///
    /// The returned guard holds the key's slot exclusively until dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionFailed`] if dialing or login fails. Failed
    /// dials are not cached.
    pub async fn acquire(
        &self,
        account_id: AccountId,
        record: &CredentialRecord,
        sub_account: Option<&str>,
    ) -> Result<PooledSession<C::Stream>> {
        let identity = record.resolve(sub_account);
        let key = PoolKey::new(account_id, identity.identity.id.clone());

        loop {
            let slot = Arc::clone(
                lock(&self.slots)
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(None))),
            );
            let mut guard = Arc::clone(&slot).lock_owned().await;

            // Swept or released while we waited
            if !self.is_current(&key, &slot) {
                continue;
            }

            if guard.is_none() {
                debug!(key = %key, host = %identity.imap.host, "Dialing IMAP connection");
                match self.connector.connect(&identity).await {
                    Ok(client) => {
                        *guard = Some(Live {
                            session: Session::Authenticated(client),
                            last_used: Instant::now(),
                        });
                        info!(key = %key, "IMAP connection established");
                    }
                    Err(e) => {
                        warn!(key = %key, error = %e, "IMAP dial failed");
                        self.remove_if_current(&key, &slot);
                        return Err(e);
                    }
                }
            } else {
                debug!(key = %key, "Reusing pooled IMAP connection");
            }

            return Ok(PooledSession {
                key,
                guard,
                slot,
                slots: Arc::clone(&self.slots),
                broken: false,
            });
        }
    }

    /// Logs out and drops every connection of an account.
    ///
    /// Waits for callers currently holding those connections.
    pub async fn release(&self, account_id: AccountId) -> usize {
        let drained: Vec<(PoolKey, Slot<C::Stream>)> = {
            let mut slots = lock(&self.slots);
            let keys: Vec<PoolKey> = slots
                .keys()
                .filter(|key| key.account_id == account_id)
                .cloned()
                .collect();
            keys.into_iter()
                .filter_map(|key| slots.remove_entry(&key))
                .collect()
        };

        let closed = close_all(drained).await;
        if closed > 0 {
            debug!(account_id = %account_id, closed, "Released account connections");
        }
        closed
    }

    /// Closes every connection idle longer than the idle timeout.
    ///
    /// Connections currently lent out are skipped. Returns how many were
    /// closed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let idle_timeout = self.config.idle_timeout;

        let expired: Vec<(PoolKey, Session<C::Stream>)> = {
            let mut expired = Vec::new();
            lock(&self.slots).retain(|key, slot| {
                let Ok(mut live) = slot.try_lock() else {
                    return true;
                };
                let idle = live
                    .as_ref()
                    .is_none_or(|entry| now.duration_since(entry.last_used) >= idle_timeout);
                if !idle {
                    return true;
                }
                if let Some(entry) = live.take() {
                    expired.push((key.clone(), entry.session));
                }
                false
            });
            expired
        };

        let count = expired.len();
        for (key, session) in expired {
            debug!(key = %key, "Closing idle IMAP connection");
            logout(&key, session).await;
        }
        count
    }

    /// Stops the sweeper and logs out every connection.
    pub async fn shutdown(&self) {
        if let Some(handle) = lock(&self.sweeper).take() {
            handle.abort();
        }
        let drained: Vec<(PoolKey, Slot<C::Stream>)> = lock(&self.slots).drain().collect();
        let closed = close_all(drained).await;
        info!(closed, "Connection pool shut down");
    }

    fn is_current(&self, key: &PoolKey, slot: &Slot<C::Stream>) -> bool {
        lock(&self.slots)
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    fn remove_if_current(&self, key: &PoolKey, slot: &Slot<C::Stream>) {
        remove_if_current(&self.slots, key, slot);
    }
}

impl<C: Connector> ConnectionPool<C> {
    /// Starts the background idle sweep on the current tokio runtime.
    ///
    /// The task holds only a weak reference, so it ends on its own once the
    /// pool is dropped. [`ConnectionPool::shutdown`] also stops it.
    #[must_use]
    pub fn spawn_sweeper(self: &Arc<Self>) -> SweeperHandle {
        let pool = Arc::downgrade(self);
        let period = self.config.sweep_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(pool) = pool.upgrade() else {
                    break;
                };
                let closed = pool.sweep().await;
                if closed > 0 {
                    info!(closed, "Idle sweep closed connections");
                }
            }
        });

        if let Some(previous) = lock(&self.sweeper).replace(task.abort_handle()) {
            previous.abort();
        }
        SweeperHandle { task }
    }
}

impl<C: Connector> fmt::Debug for ConnectionPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("config", &self.config)
            .field("connections", &self.len())
            .finish_non_exhaustive()
    }
}

/// Handle to the background sweep task.
#[derive(Debug)]
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stops the sweep task.
    pub fn stop(self) {
        self.task.abort();
    }

    /// Returns true once the task has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

fn remove_if_current<S>(slots: &Mutex<HashMap<PoolKey, Slot<S>>>, key: &PoolKey, slot: &Slot<S>) {
    let mut slots = lock(slots);
    if slots.get(key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
        slots.remove(key);
    }
}

async fn close_all<S>(drained: Vec<(PoolKey, Slot<S>)>) -> usize
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut closed = 0;
    for (key, slot) in drained {
        let entry = slot.lock().await.take();
        if let Some(entry) = entry {
            logout(&key, entry.session).await;
            closed += 1;
        }
    }
    closed
}

async fn logout<S>(key: &PoolKey, session: Session<S>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Err(e) = session.logout().await {
        warn!(key = %key, error = %e, "IMAP logout failed");
    }
}

/// Exclusive loan of a pooled connection.
///
/// Dropping the guard returns the connection to the pool, or evicts it if
/// it was marked broken.
pub struct PooledSession<S> {
    key: PoolKey,
    guard: OwnedMutexGuard<Option<Live<S>>>,
    slot: Slot<S>,
    slots: Slots<S>,
    broken: bool,
}

impl<S> PooledSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Key of the lent connection.
    #[must_use]
    pub const fn key(&self) -> &PoolKey {
        &self.key
    }

    /// Marks the connection unusable; it is evicted when the guard drops.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// Returns true if the connection has been marked broken.
    #[must_use]
    pub const fn is_broken(&self) -> bool {
        self.broken
    }

    /// Inspects a command result and marks the connection broken when the
    /// error means the transport can no longer be trusted.
    pub fn report<T>(&mut self, result: &mailgate_imap::Result<T>) {
        if let Err(e) = result
            && e.is_connection_lost()
        {
            warn!(key = %self.key, error = %e, "IMAP connection lost");
            self.broken = true;
        }
    }

    /// Returns true if the server advertises MOVE.
    #[must_use]
    pub fn supports_move(&self) -> bool {
        match self.guard.as_ref().map(|live| &live.session) {
            Some(Session::Authenticated(client)) => client.supports_move(),
            Some(Session::Selected(client)) => client.supports_move(),
            None => false,
        }
    }

    /// Lists every mailbox.
    ///
    /// # Errors
    ///
    /// Returns the protocol error; transport failures mark the session broken.
    pub async fn list(&mut self) -> mailgate_imap::Result<Vec<ListResponse>> {
        let result = match self.guard.as_mut().map(|live| &mut live.session) {
            Some(Session::Authenticated(client)) => client.list("", "*").await,
            Some(Session::Selected(client)) => client.list("", "*").await,
            None => Err(closed()),
        };
        self.report(&result);
        result
    }

    /// Appends a message to a mailbox.
    ///
    /// # Errors
    ///
    /// Returns the protocol error; transport failures mark the session broken.
    pub async fn append(
        &mut self,
        mailbox: &str,
        flags: Option<Vec<Flag>>,
        message: &[u8],
    ) -> mailgate_imap::Result<()> {
        let result = match self.guard.as_mut().map(|live| &mut live.session) {
            Some(Session::Authenticated(client)) => client.append(mailbox, flags, message).await,
            Some(Session::Selected(client)) => client.append(mailbox, flags, message).await,
            None => Err(closed()),
        };
        self.report(&result);
        result
    }

    /// Selects a mailbox read-write and returns the selected client.
    ///
    /// A refused SELECT leaves the connection logged in and pooled; only a
    /// transport failure marks the session broken.
    ///
    /// # Errors
    ///
    /// Returns the server's refusal or the transport error.
    pub async fn select(&mut self, mailbox: &str) -> mailgate_imap::Result<&mut Client<S, Selected>> {
        let Some(live) = self.guard.take() else {
            self.broken = true;
            return Err(closed());
        };

        let result = match live.session {
            Session::Authenticated(client) => client.try_select(mailbox).await,
            Session::Selected(client) => client.try_select(mailbox).await,
        };

        match result {
            Ok(client) => {
                *self.guard = Some(Live {
                    session: Session::Selected(client),
                    last_used: live.last_used,
                });
                match self.guard.as_mut().map(|live| &mut live.session) {
                    Some(Session::Selected(client)) => Ok(client),
                    _ => Err(closed()),
                }
            }
            Err((client, e)) => {
                if e.is_connection_lost() {
                    debug!(key = %self.key, mailbox, error = %e, "SELECT failed, dropping connection");
                    self.broken = true;
                } else {
                    debug!(key = %self.key, mailbox, error = %e, "SELECT refused");
                    *self.guard = Some(Live {
                        session: Session::Authenticated(client),
                        last_used: live.last_used,
                    });
                }
                Err(e)
            }
        }
    }
}

impl<S> Drop for PooledSession<S> {
    fn drop(&mut self) {
        if self.broken {
            self.guard.take();
            remove_if_current(&self.slots, &self.key, &self.slot);
            debug!(key = %self.key, "Evicted broken IMAP connection");
        } else if let Some(live) = self.guard.as_mut() {
            live.last_used = Instant::now();
        }
    }
}

impl<S> fmt::Debug for PooledSession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledSession")
            .field("key", &self.key)
            .field("broken", &self.broken)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::significant_drop_tightening)]
mod tests {
    use super::*;
    use crate::testing::{MockConnector, login_script, record};
    use tokio_test::io::Builder;

    fn pool(connector: &MockConnector) -> ConnectionPool<MockConnector> {
        ConnectionPool::with_connector(connector.clone(), PoolConfig::default())
    }

    #[test]
    fn key_display() {
        assert_eq!(PoolKey::new(AccountId::new(4), "primary").to_string(), "4:primary");
    }

    #[tokio::test]
    async fn concurrent_acquires_dial_once() {
        let connector = MockConnector::new();
        connector.push(login_script(&mut Builder::new()).build());
        let pool = pool(&connector);
        let record = record();

        let (pool_ref, record_ref) = (&pool, &record);
        let acquire = || async move {
            let session = pool_ref.acquire(AccountId::new(1), record_ref, None).await.unwrap();
            tokio::task::yield_now().await;
            drop(session);
        };
        tokio::join!(acquire(), acquire(), acquire(), acquire(), acquire());

        assert_eq!(connector.dials(), 1);
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn sub_accounts_get_their_own_connection() {
        let connector = MockConnector::new();
        connector.push(login_script(&mut Builder::new()).build());
        connector.push(
            Builder::new()
                .read(b"* OK ready\r\n")
                .write(b"A0001 LOGIN sales secret2\r\n")
                .read(b"A0001 OK done\r\n")
                .build(),
        );
        let pool = pool(&connector);
        let record = record();

        let primary = pool.acquire(AccountId::new(1), &record, None).await.unwrap();
        let sales = pool.acquire(AccountId::new(1), &record, Some("sales")).await.unwrap();
        assert_eq!(primary.key().to_string(), "1:primary");
        assert_eq!(sales.key().to_string(), "1:sales");
        assert_eq!(connector.dials(), 2);
    }

    #[tokio::test]
    async fn broken_connection_is_redialed() {
        let connector = MockConnector::new();
        connector.push(login_script(&mut Builder::new()).build());
        connector.push(login_script(&mut Builder::new()).build());
        let pool = pool(&connector);
        let record = record();

        let mut session = pool.acquire(AccountId::new(1), &record, None).await.unwrap();
        session.report::<()>(&Err(mailgate_imap::Error::Bye("shutting down".into())));
        assert!(session.is_broken());
        drop(session);
        assert!(pool.is_empty());

        let _session = pool.acquire(AccountId::new(1), &record, None).await.unwrap();
        assert_eq!(connector.dials(), 2);
    }

    #[tokio::test]
    async fn command_failures_keep_the_connection() {
        let connector = MockConnector::new();
        connector.push(login_script(&mut Builder::new()).build());
        let pool = pool(&connector);

        let mut session = pool.acquire(AccountId::new(1), &record(), None).await.unwrap();
        session.report::<()>(&Err(mailgate_imap::Error::No {
            code: None,
            text: "over quota".into(),
        }));
        assert!(!session.is_broken());
        drop(session);
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn refused_select_keeps_the_connection() {
        let connector = MockConnector::new();
        connector.push(
            login_script(&mut Builder::new())
                .write(b"A0002 SELECT Nope\r\n")
                .read(b"A0002 NO [NONEXISTENT] Unknown mailbox\r\n")
                .write(b"A0003 SELECT INBOX\r\n")
                .read(b"A0003 OK [READ-WRITE] done\r\n")
                .build(),
        );
        let pool = pool(&connector);
        let record = record();

        let mut session = pool.acquire(AccountId::new(1), &record, None).await.unwrap();
        let err = session.select("Nope").await.unwrap_err();
        assert!(!err.is_connection_lost());
        assert!(!session.is_broken());
        drop(session);
        assert_eq!(pool.len(), 1);

        let mut session = pool.acquire(AccountId::new(1), &record, None).await.unwrap();
        assert_eq!(session.select("INBOX").await.unwrap().mailbox(), "INBOX");
        assert_eq!(connector.dials(), 1);
    }

    #[tokio::test]
    async fn select_on_a_dead_connection_evicts_it() {
        let connector = MockConnector::new();
        connector.push(
            login_script(&mut Builder::new())
                .write(b"A0002 SELECT INBOX\r\n")
                .read(b"* BYE server shutting down\r\n")
                .build(),
        );
        let pool = pool(&connector);

        let mut session = pool.acquire(AccountId::new(1), &record(), None).await.unwrap();
        assert!(session.select("INBOX").await.is_err());
        assert!(session.is_broken());
        drop(session);
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn failed_dial_is_not_cached() {
        let connector = MockConnector::new();
        let pool = pool(&connector);

        let err = pool.acquire(AccountId::new(1), &record(), None).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionFailed(_)));
        assert!(pool.is_empty());

        connector.push(login_script(&mut Builder::new()).build());
        pool.acquire(AccountId::new(1), &record(), None).await.unwrap();
        assert_eq!(connector.dials(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_closes_idle_connections() {
        let connector = MockConnector::new();
        connector.push(
            login_script(&mut Builder::new())
                .write(b"A0002 LOGOUT\r\n")
                .read(b"* BYE logging out\r\n")
                .read(b"A0002 OK LOGOUT completed\r\n")
                .build(),
        );
        let pool = pool(&connector);

        drop(pool.acquire(AccountId::new(1), &record(), None).await.unwrap());
        assert_eq!(pool.sweep().await, 0);

        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(pool.sweep().await, 1);
        assert!(pool.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_skips_connections_in_use() {
        let connector = MockConnector::new();
        connector.push(login_script(&mut Builder::new()).build());
        let pool = pool(&connector);

        let session = pool.acquire(AccountId::new(1), &record(), None).await.unwrap();
        tokio::time::advance(Duration::from_secs(600)).await;
        assert_eq!(pool.sweep().await, 0);
        drop(session);
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn release_logs_out_the_account() {
        let connector = MockConnector::new();
        connector.push(
            login_script(&mut Builder::new())
                .write(b"A0002 LOGOUT\r\n")
                .read(b"A0002 OK bye\r\n")
                .build(),
        );
        let pool = pool(&connector);

        drop(pool.acquire(AccountId::new(1), &record(), None).await.unwrap());
        assert_eq!(pool.release(AccountId::new(2)).await, 0);
        assert_eq!(pool.release(AccountId::new(1)).await, 1);
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn shutdown_stops_the_sweeper() {
        let connector = MockConnector::new();
        let pool = Arc::new(pool(&connector));
        let handle = pool.spawn_sweeper();

        pool.shutdown().await;
        let outcome = handle.task.await;
        assert!(outcome.unwrap_err().is_cancelled());
    }
}
