use parking_lot::RwLock;
use sessionlink_domain::{Credential, TokenGrant};

use super::CredentialStore;

/// Credential store with no persistence
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    current: RwLock<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `credential`
    pub fn with_credential(credential: Credential) -> Self {
        Self { current: RwLock::new(Some(credential)) }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<Credential> {
        self.current.read().clone()
    }

    fn set(&self, credential: Credential) {
        *self.current.write() = Some(credential);
    }

    fn clear(&self) {
        *self.current.write() = None;
    }

    fn take_if(&self, matches: &dyn Fn(&Credential) -> bool) -> Option<Credential> {
        let mut current = self.current.write();
        if current.as_ref().is_some_and(|credential| matches(credential)) {
            current.take()
        } else {
            None
        }
    }

    fn renew(&self, refresh_token: &str, grant: TokenGrant) -> Option<Credential> {
        let mut current = self.current.write();
        let renewed = current
            .as_ref()
            .filter(|credential| credential.refresh_token.as_deref() == Some(refresh_token))?
            .renewed(grant);
        *current = Some(renewed.clone());
        Some(renewed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn set_get_clear() {
        let store = MemoryCredentialStore::new();
        store.set(Credential::new("A1", "R1"));
        assert_eq!(store.get(), Some(Credential::new("A1", "R1")));

        store.clear();
        assert!(store.get().is_none());
    }

    #[test]
    fn take_if_leaves_other_credentials() {
        let store = MemoryCredentialStore::with_credential(Credential::new("B1", "S1"));

        assert!(store.take_if(&|c: &Credential| c.access_token == "A1").is_none());
        assert_eq!(store.get(), Some(Credential::new("B1", "S1")));

        assert!(store.take_if(&|c: &Credential| c.access_token == "B1").is_some());
        assert!(store.get().is_none());
    }

    #[test]
    fn renew_applies_only_to_the_refreshed_pair() {
        let store = MemoryCredentialStore::with_credential(Credential::new("A1", "R1"));
        let grant = TokenGrant { access_token: "A2".to_string(), refresh_token: None };

        assert_eq!(store.renew("R1", grant.clone()), Some(Credential::new("A2", "R1")));

        store.set(Credential::new("B1", "S1"));
        assert!(store.renew("R1", grant.clone()).is_none());
        assert_eq!(store.get(), Some(Credential::new("B1", "S1")));

        store.clear();
        assert!(store.renew("S1", grant).is_none());
        assert!(store.get().is_none());
    }

    #[test]
    fn readers_never_see_mixed_pairs() {
        let store = Arc::new(MemoryCredentialStore::with_credential(Credential::new("A0", "R0")));

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..1_000 {
                    store.set(Credential::new(format!("A{i}"), format!("R{i}")));
                }
            })
        };

        for _ in 0..1_000 {
            let current = store.get().expect("credential");
            let refresh = current.refresh_token.expect("refresh token");
            assert_eq!(current.access_token[1..], refresh[1..]);
        }
        writer.join().unwrap();
    }
}
