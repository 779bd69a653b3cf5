//! OAuth credential lifecycle for docsgate.
//!
//! Given an account id, the [`TokenLifecycleManager`] hands out a currently
//! valid access credential, refreshing it lazily when it has expired, or a
//! consent URL when the account has to (re-)authorize.
//!
//! The manager composes two seams:
//! - [`CredentialStore`]: persisted credentials keyed by account id
//! - [`OAuthProvider`]: the authorization server (Google by default)

pub mod config;
pub mod credential;
pub mod manager;
pub mod provider;
pub mod store;

pub use config::OAuthConfig;
pub use credential::{Credential, TokenGrant};
pub use manager::{Authorization, RedirectTarget, TokenLifecycleManager};
pub use provider::{GoogleOAuthProvider, OAuthProvider, ProviderError};
pub use store::{CredentialStore, MemoryCredentialStore, SqliteCredentialStore};
