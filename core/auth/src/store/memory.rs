//! In-memory credential store for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use docsgate_common::{AccountId, Error, Result};

use super::CredentialStore;
use crate::credential::Credential;

/// In-memory credential store.
///
/// Useful for testing and short-lived processes. All credentials are lost
/// on drop.
#[derive(Default)]
pub struct MemoryCredentialStore {
    credentials: RwLock<HashMap<AccountId, Credential>>,
}

impl MemoryCredentialStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with credentials.
    pub fn with_credentials(credentials: impl IntoIterator<Item = Credential>) -> Self {
        let map = credentials
            .into_iter()
            .map(|c| (c.account_id.clone(), c))
            .collect();
        Self {
            credentials: RwLock::new(map),
        }
    }

    /// Number of stored credentials.
    pub fn len(&self) -> usize {
        self.credentials.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> Error {
    Error::StoreUnavailable("memory store lock poisoned".to_string())
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find(&self, account_id: &AccountId) -> Result<Option<Credential>> {
        let credentials = self.credentials.read().map_err(|_| poisoned())?;
        Ok(credentials.get(account_id).cloned())
    }

    async fn save(&self, credential: &Credential) -> Result<()> {
        let mut credentials = self.credentials.write().map_err(|_| poisoned())?;
        credentials.insert(credential.account_id.clone(), credential.clone());
        Ok(())
    }
}
