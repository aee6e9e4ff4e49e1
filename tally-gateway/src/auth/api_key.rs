//! In-memory API key store

use dashmap::DashMap;
use tally_core::domain::principal::Principal;
use uuid::Uuid;

use super::CredentialResolver;

/// Issued API keys, shared by the login handler and the auth middleware
///
/// Keys live for the lifetime of the process.
#[derive(Debug, Default)]
pub struct ApiKeyStore {
    keys: DashMap<String, Principal>,
}

impl ApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn revoke(&self, api_key: &str) -> bool {
        self.keys.remove(api_key).is_some()
    }
}

impl CredentialResolver for ApiKeyStore {
    fn issue(&self, principal: Principal) -> String {
        // 256 bits from two v4 UUIDs, rendered as 64 hex characters
        let api_key = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        self.keys.insert(api_key.clone(), principal);
        api_key
    }

    fn resolve(&self, api_key: &str) -> Option<Principal> {
        self.keys.get(api_key).map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_resolve() {
        let store = ApiKeyStore::new();
        let principal = Principal::new("appUser", "Org1MSP");

        let key = store.issue(principal.clone());

        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(store.resolve(&key), Some(principal));
        assert_eq!(store.resolve("unknown"), None);
    }

    #[test]
    fn test_keys_are_unique_per_login() {
        let store = ApiKeyStore::new();
        let principal = Principal::new("appUser", "Org1MSP");

        let first = store.issue(principal.clone());
        let second = store.issue(principal);

        assert_ne!(first, second);
        assert_eq!(store.len(), 2);
        assert!(store.revoke(&first));
        assert!(store.resolve(&first).is_none());
    }
}
