//! Credential persistence.
//!
//! The manager treats storage as a key-value map from account id to a
//! single [`Credential`] row with read-modify-write semantics. Every `save`
//! writes the whole row, so access token and expiry can never be observed
//! out of step.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use docsgate_common::{AccountId, Result};

use crate::credential::Credential;

pub use memory::MemoryCredentialStore;
pub use sqlite::SqliteCredentialStore;

/// Persisted credentials keyed by account id.
///
/// Implementations report I/O failures as `Error::StoreUnavailable`.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up the credential for an account.
    async fn find(&self, account_id: &AccountId) -> Result<Option<Credential>>;

    /// Insert or replace the credential for `credential.account_id`.
    async fn save(&self, credential: &Credential) -> Result<()>;
}
