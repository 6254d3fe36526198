use keyring::Entry;
use sessionlink_domain::Credential;
use tracing::debug;

use super::persistent::{CredentialBackend, CredentialStoreError};

/// Credential persisted as one platform keychain entry
///
/// The entry lives under `(service, key)` and holds the JSON-serialized
/// credential.
#[derive(Debug, Clone)]
pub struct KeychainBackend {
    service: String,
    key: String,
}

impl KeychainBackend {
    pub fn new(service: impl Into<String>, key: impl Into<String>) -> Self {
        Self { service: service.into(), key: key.into() }
    }

    fn entry(&self) -> Result<Entry, CredentialStoreError> {
        Entry::new(&self.service, &self.key).map_err(|e| {
            CredentialStoreError::Keychain(format!("Failed to open entry {}: {}", self.key, e))
        })
    }
}

impl CredentialBackend for KeychainBackend {
    fn load(&self) -> Result<Option<Credential>, CredentialStoreError> {
        debug!(service = %self.service, key = %self.key, "Loading credential from keychain");

        let secret = match self.entry()?.get_password() {
            Ok(secret) => secret,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(e) => {
                return Err(CredentialStoreError::Keychain(format!(
                    "Failed to read {}: {}",
                    self.key, e
                )))
            }
        };

        serde_json::from_str(&secret)
            .map(Some)
            .map_err(|e| CredentialStoreError::Malformed(e.to_string()))
    }

    fn save(&self, credential: &Credential) -> Result<(), CredentialStoreError> {
        let secret = serde_json::to_string(credential)
            .map_err(|e| CredentialStoreError::Malformed(e.to_string()))?;

        self.entry()?.set_password(&secret).map_err(|e| {
            CredentialStoreError::Keychain(format!("Failed to store {}: {}", self.key, e))
        })?;

        debug!(service = %self.service, key = %self.key, "Credential stored in keychain");
        Ok(())
    }

    fn remove(&self) -> Result<(), CredentialStoreError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(CredentialStoreError::Keychain(format!(
                "Failed to delete {}: {}",
                self.key, e
            ))),
        }
    }
}
