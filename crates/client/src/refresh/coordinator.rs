//! Refresh state machine

use std::sync::Arc;

use parking_lot::Mutex;
use sessionlink_domain::constants::SESSION_EVENT_CAPACITY;
use sessionlink_domain::{Credential, TokenGrant, TransportFailurePolicy};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, instrument, warn};

use super::client::{RefreshClient, RefreshError};
use super::events::SessionEvent;
use crate::credentials::CredentialStore;

/// Terminal outcome of a refresh attempt, shared by every waiter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshFailure {
    /// No credential, or one without a refresh token. No call was made.
    #[error("no refresh token available")]
    NoRefreshToken,

    /// The auth server refused the refresh token or answered nonsense
    #[error("refresh rejected: {0}")]
    RefreshRejected(String),

    /// The auth server could not be reached; the credential was kept
    #[error("refresh endpoint unavailable: {0}")]
    Unavailable(String),

    /// The refresh task ended without reporting an outcome
    #[error("refresh interrupted")]
    Interrupted,

    /// A request carrying a freshly renewed access token was still refused
    #[error("renewed access token rejected")]
    RenewedTokenRejected,
}

type Outcome = Option<Result<String, RefreshFailure>>;

enum RefreshState {
    Idle,
    Refreshing(watch::Receiver<Outcome>),
}

struct Shared {
    store: Arc<dyn CredentialStore>,
    client: Arc<dyn RefreshClient>,
    policy: TransportFailurePolicy,
    state: Mutex<RefreshState>,
    events: broadcast::Sender<SessionEvent>,
}

/// Coordinates credential refreshes so only one is ever in flight
///
/// Cloning is cheap; clones share state. The refresh itself runs on a
/// spawned task, so dropping a waiting caller (the one that started the
/// refresh included) leaves the refresh and the other waiters untouched.
/// Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct RefreshCoordinator {
    shared: Arc<Shared>,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        client: Arc<dyn RefreshClient>,
        policy: TransportFailurePolicy,
    ) -> Self {
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                store,
                client,
                policy,
                state: Mutex::new(RefreshState::Idle),
                events,
            }),
        }
    }

    /// Obtain a fresh access token, refreshing at most once per expiry.
    ///
    /// Joins the in-flight refresh if there is one, otherwise starts it.
    pub async fn ensure_valid_token(&self) -> Result<String, RefreshFailure> {
        self.acquire(None).await
    }

    /// Like [`ensure_valid_token`](Self::ensure_valid_token) for a caller
    /// whose request was rejected while carrying `rejected`.
    ///
    /// If the store already holds a different access token, a refresh
    /// finished after that request went out, and the current token is
    /// returned without another refresh.
    pub async fn ensure_valid_token_after(&self, rejected: &str) -> Result<String, RefreshFailure> {
        self.acquire(Some(rejected)).await
    }

    /// Whether a refresh is currently in flight
    pub fn is_refreshing(&self) -> bool {
        matches!(&*self.shared.state.lock(), RefreshState::Refreshing(rx) if rx.has_changed().is_ok())
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Remove the credential at the application's request (sign-out).
    ///
    /// Emits [`SessionEvent::Cleared`] when a credential was present.
    pub fn clear_session(&self) {
        if self.shared.store.take().is_some() {
            info!("session cleared");
            self.shared.emit(SessionEvent::Cleared);
        }
    }

    /// End the session because a request with `access_token` was refused
    /// right after a refresh.
    ///
    /// Does nothing if the store has moved on to another credential. Returns
    /// whether a credential was removed.
    pub fn reject_token(&self, access_token: &str) -> bool {
        let issued_with = |credential: &Credential| credential.access_token == access_token;
        self.shared.terminate(RefreshFailure::RenewedTokenRejected, &issued_with)
    }

    async fn acquire(&self, rejected: Option<&str>) -> Result<String, RefreshFailure> {
        let mut outcome = {
            let mut state = self.shared.state.lock();

            // A closed channel means the task died before publishing; start
            // over.
            let in_flight = match &*state {
                RefreshState::Refreshing(rx) if rx.has_changed().is_ok() => Some(rx.clone()),
                _ => None,
            };

            if let Some(rx) = in_flight {
                debug!("joining in-flight refresh");
                rx
            } else {
                let current = self.shared.store.get();

                if let (Some(rejected), Some(current)) = (rejected, current.as_ref()) {
                    if current.access_token != rejected {
                        debug!("credential already renewed, skipping refresh");
                        return Ok(current.access_token.clone());
                    }
                }

                let Some(refresh_token) =
                    current.filter(Credential::can_refresh).and_then(|c| c.refresh_token)
                else {
                    *state = RefreshState::Idle;
                    drop(state);
                    warn!("refresh impossible without a refresh token");
                    let unrefreshable = |credential: &Credential| !credential.can_refresh();
                    self.shared.terminate(RefreshFailure::NoRefreshToken, &unrefreshable);
                    return Err(RefreshFailure::NoRefreshToken);
                };

                let (tx, rx) = watch::channel(None);
                *state = RefreshState::Refreshing(rx.clone());
                tokio::spawn(Arc::clone(&self.shared).run(refresh_token, tx));
                rx
            }
        };

        // Clone out in its own statement so the borrow of `outcome` ends here.
        let published = outcome.wait_for(Option::is_some).await.map(|value| value.clone());
        match published {
            Ok(Some(result)) => result,
            Ok(None) => Err(RefreshFailure::Interrupted),
            Err(_) => {
                warn!("refresh task ended without an outcome");
                Err(RefreshFailure::Interrupted)
            }
        }
    }
}

impl Shared {
    #[instrument(name = "credential_refresh", skip_all)]
    async fn run(self: Arc<Self>, refresh_token: String, tx: watch::Sender<Outcome>) {
        let result = self.client.refresh(&refresh_token).await;
        let outcome = match result {
            Ok(grant) => self.install(&refresh_token, grant),
            Err(err) => self.fail(&refresh_token, &err),
        };

        // Publishing and returning to Idle happen under one lock, so a caller
        // either joins this refresh and sees its outcome or starts the next.
        let mut state = self.state.lock();
        *state = RefreshState::Idle;
        tx.send_replace(Some(outcome));
    }

    fn install(&self, refresh_token: &str, grant: TokenGrant) -> Result<String, RefreshFailure> {
        if let Some(renewed) = self.store.renew(refresh_token, grant) {
            info!("credential refreshed");
            self.emit(SessionEvent::Refreshed);
            return Ok(renewed.access_token);
        }

        // The credential changed while the call was in flight; the grant
        // belongs to a session that no longer exists.
        match self.store.get() {
            Some(current) => {
                info!("credential replaced during refresh, discarding grant");
                Ok(current.access_token)
            }
            None => {
                info!("session cleared during refresh, discarding grant");
                Err(RefreshFailure::NoRefreshToken)
            }
        }
    }

    fn fail(&self, refresh_token: &str, err: &RefreshError) -> Result<String, RefreshFailure> {
        if err.is_transport() && self.policy == TransportFailurePolicy::KeepSession {
            warn!(error = %err, "refresh endpoint unreachable, keeping session");
            return Err(RefreshFailure::Unavailable(err.to_string()));
        }

        warn!(error = %err, "refresh failed, ending session");
        let failure = RefreshFailure::RefreshRejected(err.to_string());
        let sent_with = |credential: &Credential| {
            credential.refresh_token.as_deref() == Some(refresh_token)
        };
        self.terminate(failure.clone(), &sent_with);
        Err(failure)
    }

    /// Remove the credential if `matches` accepts it; emits `Terminated` only
    /// when something was removed.
    fn terminate(&self, reason: RefreshFailure, matches: &dyn Fn(&Credential) -> bool) -> bool {
        if self.store.take_if(matches).is_none() {
            return false;
        }
        info!(reason = %reason, "session terminated");
        self.emit(SessionEvent::Terminated { reason });
        true
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::future::join_all;

    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use crate::testing::MockRefreshClient;

    fn coordinator_with(
        credential: Option<Credential>,
        client: MockRefreshClient,
        policy: TransportFailurePolicy,
    ) -> (RefreshCoordinator, Arc<MemoryCredentialStore>, MockRefreshClient) {
        let store = Arc::new(match credential {
            Some(c) => MemoryCredentialStore::with_credential(c),
            None => MemoryCredentialStore::new(),
        });
        let coordinator = RefreshCoordinator::new(store.clone(), Arc::new(client.clone()), policy);
        (coordinator, store, client)
    }

    fn grant(access: &str, refresh: Option<&str>) -> TokenGrant {
        TokenGrant { access_token: access.to_string(), refresh_token: refresh.map(str::to_string) }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_refresh() {
        let client = MockRefreshClient::new()
            .with_delay(Duration::from_millis(50))
            .respond_with(Ok(grant("A2", Some("R2"))));
        let (coordinator, store, client) = coordinator_with(
            Some(Credential::new("A1", "R1")),
            client,
            TransportFailurePolicy::ClearSession,
        );

        let results = join_all((0..10).map(|_| {
            let coordinator = coordinator.clone();
            async move { coordinator.ensure_valid_token_after("A1").await }
        }))
        .await;

        assert_eq!(client.calls(), 1);
        assert!(results.iter().all(|r| r.as_deref() == Ok("A2")));
        assert_eq!(store.get(), Some(Credential::new("A2", "R2")));
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn missing_refresh_token_clears_without_network() {
        let (coordinator, store, client) = coordinator_with(
            Some(Credential::access_only("A1")),
            MockRefreshClient::new(),
            TransportFailurePolicy::ClearSession,
        );
        let mut events = coordinator.subscribe();

        let result = coordinator.ensure_valid_token().await;

        assert_eq!(result, Err(RefreshFailure::NoRefreshToken));
        assert_eq!(client.calls(), 0);
        assert!(store.get().is_none());
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::Terminated { reason: RefreshFailure::NoRefreshToken }
        );
    }

    #[tokio::test]
    async fn rejected_refresh_clears_session_once() {
        let client = MockRefreshClient::new().respond_with(Err(RefreshError::Rejected { status: 403 }));
        let (coordinator, store, client) = coordinator_with(
            Some(Credential::new("A1", "R1")),
            client,
            TransportFailurePolicy::ClearSession,
        );
        let mut events = coordinator.subscribe();

        let first = coordinator.ensure_valid_token_after("A1").await;
        let late = coordinator.ensure_valid_token_after("A1").await;

        assert!(matches!(first, Err(RefreshFailure::RefreshRejected(_))));
        assert_eq!(late, Err(RefreshFailure::NoRefreshToken));
        assert_eq!(client.calls(), 1);
        assert!(store.get().is_none());
        assert!(matches!(events.try_recv(), Ok(SessionEvent::Terminated { .. })));
        assert!(events.try_recv().is_err(), "only one termination event");
    }

    #[tokio::test]
    async fn stale_rejection_returns_current_token() {
        let (coordinator, _store, client) = coordinator_with(
            Some(Credential::new("A2", "R2")),
            MockRefreshClient::new(),
            TransportFailurePolicy::ClearSession,
        );

        let token = coordinator.ensure_valid_token_after("A1").await;

        assert_eq!(token.as_deref(), Ok("A2"));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn transport_failure_with_keep_session() {
        let client = MockRefreshClient::new()
            .respond_with(Err(RefreshError::Transport("connection refused".to_string())));
        let (coordinator, store, _client) = coordinator_with(
            Some(Credential::new("A1", "R1")),
            client,
            TransportFailurePolicy::KeepSession,
        );

        let result = coordinator.ensure_valid_token().await;

        assert!(matches!(result, Err(RefreshFailure::Unavailable(_))));
        assert_eq!(store.get(), Some(Credential::new("A1", "R1")));
    }

    #[tokio::test]
    async fn transport_failure_with_clear_session() {
        let client = MockRefreshClient::new()
            .respond_with(Err(RefreshError::Transport("connection refused".to_string())));
        let (coordinator, store, _client) = coordinator_with(
            Some(Credential::new("A1", "R1")),
            client,
            TransportFailurePolicy::ClearSession,
        );

        let result = coordinator.ensure_valid_token().await;

        assert!(matches!(result, Err(RefreshFailure::RefreshRejected(_))));
        assert!(store.get().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancelled_initiator_does_not_cancel_refresh() {
        let client = MockRefreshClient::new()
            .with_delay(Duration::from_millis(100))
            .respond_with(Ok(grant("A2", None)));
        let (coordinator, store, client) = coordinator_with(
            Some(Credential::new("A1", "R1")),
            client,
            TransportFailurePolicy::ClearSession,
        );

        let initiator = coordinator.ensure_valid_token();
        assert!(tokio::time::timeout(Duration::from_millis(10), initiator).await.is_err());

        let joined = coordinator.ensure_valid_token().await;

        assert_eq!(joined.as_deref(), Ok("A2"));
        assert_eq!(client.calls(), 1);
        assert_eq!(store.get(), Some(Credential::new("A2", "R1")));
    }

    #[tokio::test]
    async fn sequential_expiries_refresh_again() {
        let client = MockRefreshClient::new()
            .respond_with(Ok(grant("A2", Some("R2"))))
            .respond_with(Ok(grant("A3", Some("R3"))));
        let (coordinator, store, client) = coordinator_with(
            Some(Credential::new("A1", "R1")),
            client,
            TransportFailurePolicy::ClearSession,
        );

        assert_eq!(coordinator.ensure_valid_token_after("A1").await.as_deref(), Ok("A2"));
        assert_eq!(coordinator.ensure_valid_token_after("A2").await.as_deref(), Ok("A3"));
        assert_eq!(client.calls(), 2);
        assert_eq!(client.tokens_seen(), vec!["R1".to_string(), "R2".to_string()]);
        assert_eq!(store.get(), Some(Credential::new("A3", "R3")));
    }

    #[tokio::test]
    async fn clear_session_emits_cleared() {
        let (coordinator, store, _client) = coordinator_with(
            Some(Credential::new("A1", "R1")),
            MockRefreshClient::new(),
            TransportFailurePolicy::ClearSession,
        );
        let mut events = coordinator.subscribe();

        coordinator.clear_session();
        coordinator.clear_session();

        assert!(store.get().is_none());
        assert_eq!(events.try_recv().unwrap(), SessionEvent::Cleared);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn sign_out_during_refresh_discards_grant() {
        let client = MockRefreshClient::new()
            .with_delay(Duration::from_millis(50))
            .respond_with(Ok(grant("A2", Some("R2"))));
        let (coordinator, store, _client) = coordinator_with(
            Some(Credential::new("A1", "R1")),
            client,
            TransportFailurePolicy::ClearSession,
        );

        let pending = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.ensure_valid_token().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        coordinator.clear_session();

        assert_eq!(pending.await.unwrap(), Err(RefreshFailure::NoRefreshToken));
        assert!(store.get().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn login_during_refresh_keeps_new_credential() {
        let client = MockRefreshClient::new()
            .with_delay(Duration::from_millis(50))
            .respond_with(Ok(grant("A2", Some("R2"))));
        let (coordinator, store, _client) = coordinator_with(
            Some(Credential::new("A1", "R1")),
            client,
            TransportFailurePolicy::ClearSession,
        );
        let mut events = coordinator.subscribe();

        let pending = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.ensure_valid_token().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        store.set(Credential::new("B1", "S1"));

        assert_eq!(pending.await.unwrap().as_deref(), Ok("B1"));
        assert_eq!(store.get(), Some(Credential::new("B1", "S1")));
        assert!(events.try_recv().is_err(), "discarded grant is not a refresh");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failed_refresh_does_not_remove_newer_login() {
        let client = MockRefreshClient::new()
            .with_delay(Duration::from_millis(50))
            .respond_with(Err(RefreshError::Rejected { status: 401 }));
        let (coordinator, store, _client) = coordinator_with(
            Some(Credential::new("A1", "R1")),
            client,
            TransportFailurePolicy::ClearSession,
        );
        let mut events = coordinator.subscribe();

        let pending = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.ensure_valid_token().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        store.set(Credential::new("B1", "S1"));

        assert!(matches!(pending.await.unwrap(), Err(RefreshFailure::RefreshRejected(_))));
        assert_eq!(store.get(), Some(Credential::new("B1", "S1")));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn reject_token_ends_only_the_matching_session() {
        let (coordinator, store, _client) = coordinator_with(
            Some(Credential::new("A2", "R2")),
            MockRefreshClient::new(),
            TransportFailurePolicy::ClearSession,
        );
        let mut events = coordinator.subscribe();

        assert!(!coordinator.reject_token("A1"));
        assert!(store.get().is_some());

        assert!(coordinator.reject_token("A2"));
        assert!(store.get().is_none());
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::Terminated { reason: RefreshFailure::RenewedTokenRejected }
        );
        assert!(events.try_recv().is_err());
    }
}
