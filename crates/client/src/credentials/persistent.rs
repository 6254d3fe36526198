use parking_lot::{Mutex, RwLock};
use sessionlink_domain::{Credential, SessionLinkError, TokenGrant};
use thiserror::Error;
use tracing::{debug, warn};

use super::CredentialStore;

/// Failures of a durable backend. Never surfaced through [`CredentialStore`].
#[derive(Debug, Error)]
pub enum CredentialStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed credential record: {0}")]
    Malformed(String),

    #[error("keychain access failed: {0}")]
    Keychain(String),

    #[error("no storage location available: {0}")]
    Unavailable(String),
}

impl From<CredentialStoreError> for SessionLinkError {
    fn from(err: CredentialStoreError) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Durable home of the credential record
pub trait CredentialBackend: Send + Sync {
    /// Read the record. `Ok(None)` when nothing has been stored.
    fn load(&self) -> Result<Option<Credential>, CredentialStoreError>;

    fn save(&self, credential: &Credential) -> Result<(), CredentialStoreError>;

    /// Delete the record. Deleting a missing record succeeds.
    fn remove(&self) -> Result<(), CredentialStoreError>;
}

/// In-memory credential backed by durable storage
///
/// The backend is read once at construction. After that, reads are served
/// from memory and every write goes to memory first, then to the backend.
pub struct PersistentCredentialStore<B: CredentialBackend> {
    current: RwLock<Option<Credential>>,
    // Serializes writers so the backend ends up with the last value written
    // to memory.
    write_lock: Mutex<()>,
    backend: B,
}

impl<B: CredentialBackend> PersistentCredentialStore<B> {
    /// Load the persisted credential, treating unreadable records as absent.
    pub fn new(backend: B) -> Self {
        let current = match backend.load() {
            Ok(credential) => {
                debug!(restored = credential.is_some(), "credential store initialized");
                credential
            }
            Err(err) => {
                warn!(error = %err, "ignoring unreadable credential record");
                None
            }
        };

        Self { current: RwLock::new(current), write_lock: Mutex::new(()), backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn persist_removal(&self) {
        if let Err(err) = self.backend.remove() {
            warn!(error = %err, "failed to remove persisted credential");
        }
    }
}

impl<B: CredentialBackend> CredentialStore for PersistentCredentialStore<B> {
    fn get(&self) -> Option<Credential> {
        self.current.read().clone()
    }

    fn set(&self, credential: Credential) {
        let _guard = self.write_lock.lock();
        *self.current.write() = Some(credential.clone());
        if let Err(err) = self.backend.save(&credential) {
            warn!(error = %err, "failed to persist credential; keeping it in memory only");
        }
    }

    fn clear(&self) {
        let _guard = self.write_lock.lock();
        *self.current.write() = None;
        self.persist_removal();
    }

    fn take_if(&self, matches: &dyn Fn(&Credential) -> bool) -> Option<Credential> {
        let _guard = self.write_lock.lock();
        let previous = {
            let mut current = self.current.write();
            if current.as_ref().is_some_and(|credential| matches(credential)) {
                current.take()
            } else {
                None
            }
        };
        if previous.is_some() {
            self.persist_removal();
        }
        previous
    }

    fn renew(&self, refresh_token: &str, grant: TokenGrant) -> Option<Credential> {
        let _guard = self.write_lock.lock();
        let renewed = {
            let mut current = self.current.write();
            let renewed = current
                .as_ref()
                .filter(|credential| credential.refresh_token.as_deref() == Some(refresh_token))?
                .renewed(grant);
            *current = Some(renewed.clone());
            renewed
        };
        if let Err(err) = self.backend.save(&renewed) {
            warn!(error = %err, "failed to persist renewed credential; keeping it in memory only");
        }
        Some(renewed)
    }
}
