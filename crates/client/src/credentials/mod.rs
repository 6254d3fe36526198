//! Credential storage
//!
//! The store is the single owner of the current [`Credential`]. Callers see
//! three infallible operations; persistence problems are logged and the
//! in-memory value stays authoritative.
//!
//! ## Implementations
//! - [`MemoryCredentialStore`]: process memory only
//! - [`PersistentCredentialStore`]: memory front over a [`CredentialBackend`]
//!   ([`FileBackend`], or `KeychainBackend` with the `keychain` feature)

mod file;
#[cfg(feature = "keychain")]
mod keychain;
mod memory;
mod persistent;

use std::sync::Arc;

use sessionlink_domain::{Credential, SessionLinkError, StorageConfig, StorageKind, TokenGrant};

pub use file::FileBackend;
#[cfg(feature = "keychain")]
pub use keychain::KeychainBackend;
pub use memory::MemoryCredentialStore;
pub use persistent::{CredentialBackend, CredentialStoreError, PersistentCredentialStore};

/// Holder of the current credential
///
/// `set` replaces the whole pair at once, so readers never observe an access
/// token from one grant next to a refresh token from another.
pub trait CredentialStore: Send + Sync {
    /// Current credential, if any. Never blocks on I/O.
    fn get(&self) -> Option<Credential>;

    /// Replace the stored credential.
    fn set(&self, credential: Credential);

    /// Forget the stored credential.
    fn clear(&self);

    /// Remove and return the stored credential in one step.
    ///
    /// `None` means nothing was stored, so a caller can tell whether it was
    /// the one that ended the session.
    fn take(&self) -> Option<Credential> {
        self.take_if(&|_: &Credential| true)
    }

    /// Remove and return the stored credential if `matches` accepts it.
    ///
    /// The default is not atomic; stores shared between tasks override it.
    fn take_if(&self, matches: &dyn Fn(&Credential) -> bool) -> Option<Credential> {
        let current = self.get().filter(|credential| matches(credential));
        if current.is_some() {
            self.clear();
        }
        current
    }

    /// Apply `grant` to the stored credential if it still carries
    /// `refresh_token`, returning the renewed pair.
    ///
    /// `None` means the credential was replaced or removed since the refresh
    /// started and the grant was dropped. The default is not atomic; stores
    /// shared between tasks override it.
    fn renew(&self, refresh_token: &str, grant: TokenGrant) -> Option<Credential> {
        let renewed = self
            .get()
            .filter(|current| current.refresh_token.as_deref() == Some(refresh_token))?
            .renewed(grant);
        self.set(renewed.clone());
        Some(renewed)
    }
}

/// Open the store described by `config`.
///
/// # Errors
/// Returns `SessionLinkError::Storage` when no default location exists for
/// file storage, or `SessionLinkError::Config` when keychain storage is
/// requested without the `keychain` feature.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn CredentialStore>, SessionLinkError> {
    match config.kind {
        StorageKind::Memory => Ok(Arc::new(MemoryCredentialStore::new())),
        StorageKind::File => {
            let backend = match &config.path {
                Some(path) => FileBackend::new(path.clone()),
                None => FileBackend::in_data_dir(&config.key)?,
            };
            Ok(Arc::new(PersistentCredentialStore::new(backend)))
        }
        #[cfg(feature = "keychain")]
        StorageKind::Keychain => {
            let backend = KeychainBackend::new(config.service.clone(), config.key.clone());
            Ok(Arc::new(PersistentCredentialStore::new(backend)))
        }
        #[cfg(not(feature = "keychain"))]
        StorageKind::Keychain => Err(SessionLinkError::Config(
            "keychain storage requires the `keychain` feature".to_string(),
        )),
    }
}
