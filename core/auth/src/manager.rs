//! Token lifecycle manager.
//!
//! Hands out a valid access credential for an account, refreshing it lazily
//! on read, or a consent URL when the account has to authorize (again).
//!
//! # Failure policy
//! - No credential, or a refresh that the provider rejects, times out or
//!   answers without an access token: [`Authorization::AuthorizationRequired`].
//!   The stale row is left in place; its past `expires_at` keeps it invalid.
//! - Code exchange failure: `Error::ExchangeFailed`.
//! - Store failure: `Error::StoreUnavailable`, never retried here.
//!
//! Refreshes are single-flight per account: concurrent callers queue on a
//! per-account lock and re-read the store once they hold it, so a refresh
//! token is spent at most once per expiry. The lock table holds weak handles
//! and drops entries nobody is waiting on.

use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, info, warn};

use docsgate_common::{AccountId, Error, Result, Role};

use crate::config::OAuthConfig;
use crate::credential::{Credential, TokenGrant};
use crate::provider::{OAuthProvider, ProviderError};
use crate::store::CredentialStore;

/// Outcome of asking for an account's credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    /// A credential whose access token is currently valid.
    Authorized(Credential),
    /// The user must complete the consent flow at `auth_url`.
    AuthorizationRequired { auth_url: String },
}

impl Authorization {
    pub fn credential(&self) -> Option<&Credential> {
        match self {
            Authorization::Authorized(credential) => Some(credential),
            Authorization::AuthorizationRequired { .. } => None,
        }
    }

    pub fn auth_url(&self) -> Option<&str> {
        match self {
            Authorization::Authorized(_) => None,
            Authorization::AuthorizationRequired { auth_url } => Some(auth_url),
        }
    }
}

/// Which registered redirect URI a consent URL should return to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectTarget {
    #[default]
    Web,
    /// The app-scheme redirect; falls back to the web URI when not configured.
    Mobile,
}

/// Whether a credential's access token has expired.
pub fn is_expired(credential: &Credential) -> bool {
    credential.is_expired()
}

/// Manages OAuth credentials for many accounts.
///
/// Construct once per process and share behind an `Arc`.
pub struct TokenLifecycleManager {
    config: OAuthConfig,
    store: Arc<dyn CredentialStore>,
    provider: Arc<dyn OAuthProvider>,
    refresh_locks: Mutex<HashMap<AccountId, Weak<tokio::sync::Mutex<()>>>>,
}

impl TokenLifecycleManager {
    /// Create a new manager.
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(
        config: OAuthConfig,
        store: Arc<dyn CredentialStore>,
        provider: Arc<dyn OAuthProvider>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            provider,
            refresh_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Whether a credential's access token has expired.
    pub fn is_expired(&self, credential: &Credential) -> bool {
        is_expired(credential)
    }

    /// Build the consent URL for an account.
    pub fn authorization_url(&self, account_id: &AccountId, target: RedirectTarget) -> Result<String> {
        self.provider
            .authorization_url(self.redirect_uri(target), &self.config.scopes, account_id.as_str())
            .map_err(|e| Error::Configuration(e.to_string()))
    }

    /// Get a currently valid credential, refreshing if necessary.
    ///
    /// # Postconditions
    /// - `Authorized` carries a credential with `expires_at > now`
    /// - No provider call is made while the stored token is still valid
    ///
    /// # Errors
    /// - Credential store failure
    pub async fn get_authorized_credential(&self, account_id: &AccountId) -> Result<Authorization> {
        let stored = self.store.find(account_id).await?;

        match stored {
            Some(credential) if credential.has_access_token() => {
                if !credential.is_expired() {
                    debug!("Using cached access token for {}", account_id);
                    return Ok(Authorization::Authorized(credential));
                }
            }
            _ => {
                debug!("No stored credential for {}", account_id);
                return self.authorization_required(account_id);
            }
        }

        let lock = self.refresh_lock(account_id)?;
        let _guard = lock.lock().await;

        // Double-check after acquiring the lock; another caller may have refreshed.
        let credential = match self.store.find(account_id).await? {
            Some(credential) if credential.has_access_token() => credential,
            _ => return self.authorization_required(account_id),
        };
        if !credential.is_expired() {
            debug!("Credential for {} refreshed by a concurrent caller", account_id);
            return Ok(Authorization::Authorized(credential));
        }

        self.refresh(credential).await
    }

    /// Get a valid access token string for an account.
    ///
    /// # Errors
    /// - `Error::NotAuthorized` when the account has to (re-)authorize
    /// - Credential store failure
    pub async fn access_token(&self, account_id: &AccountId) -> Result<String> {
        match self.get_authorized_credential(account_id).await? {
            Authorization::Authorized(credential) => Ok(credential.access_token),
            Authorization::AuthorizationRequired { auth_url } => Err(Error::NotAuthorized {
                account: account_id.to_string(),
                auth_url,
            }),
        }
    }

    /// Exchange an authorization code obtained through the web redirect and
    /// store the resulting credential.
    ///
    /// See [`Self::exchange_authorization_code_via`] for the errors.
    pub async fn exchange_authorization_code(
        &self,
        account_id: &AccountId,
        code: &str,
    ) -> Result<Credential> {
        self.exchange_authorization_code_via(account_id, code, RedirectTarget::Web)
            .await
    }

    /// Exchange an authorization code and store the resulting credential.
    ///
    /// `target` must match the redirect the consent URL was built for; the
    /// provider rejects a code redeemed with a different `redirect_uri`.
    ///
    /// # Preconditions
    /// - `code` was issued by the provider's consent screen for this client
    ///
    /// # Postconditions
    /// - The stored credential carries the new access token and expiry
    /// - A previously stored refresh token survives if none was issued
    ///
    /// # Errors
    /// - `Error::ExchangeFailed` with the provider's error detail
    /// - Credential store failure
    pub async fn exchange_authorization_code_via(
        &self,
        account_id: &AccountId,
        code: &str,
        target: RedirectTarget,
    ) -> Result<Credential> {
        if code.trim().is_empty() {
            return Err(Error::InvalidInput("authorization code is empty".to_string()));
        }

        let exchange_failed = |e: ProviderError| {
            warn!("Authorization code exchange failed for {}: {}", account_id, e);
            Error::ExchangeFailed(e.to_string())
        };

        let grant = self
            .bounded(self.provider.exchange_code(code, self.redirect_uri(target)))
            .await
            .map_err(exchange_failed)?;

        let lock = self.refresh_lock(account_id)?;
        let _guard = lock.lock().await;

        let now = Utc::now();
        let credential = match self.store.find(account_id).await? {
            Some(mut existing) => existing.apply_grant(grant, now).map(|()| existing),
            None => Credential::from_grant(account_id.clone(), grant, now),
        }
        .map_err(exchange_failed)?;

        self.store.save(&credential).await?;
        info!("Tokens stored for {}", account_id);

        Ok(credential)
    }

    /// Persist the derived role for an account.
    ///
    /// # Errors
    /// - `Error::NotFound` when the account has no credential
    pub async fn assign_role(&self, account_id: &AccountId, role: Role) -> Result<Credential> {
        let lock = self.refresh_lock(account_id)?;
        let _guard = lock.lock().await;

        let mut credential = self
            .store
            .find(account_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("No credential for {}", account_id)))?;

        if credential.role != role {
            credential.role = role;
            credential.updated_at = Utc::now();
            self.store.save(&credential).await?;
            info!("Assigned role {} to {}", role, account_id);
        }

        Ok(credential)
    }

    /// Read the stored credential without refreshing it.
    pub async fn credential(&self, account_id: &AccountId) -> Result<Option<Credential>> {
        self.store.find(account_id).await
    }

    async fn refresh(&self, mut credential: Credential) -> Result<Authorization> {
        let account_id = credential.account_id.clone();

        let Some(refresh_token) = credential.refresh_token.clone() else {
            warn!("Access token for {} expired and no refresh token is stored", account_id);
            return self.authorization_required(&account_id);
        };

        info!("Refreshing expired access token for {}", account_id);

        let refreshed = self
            .bounded(self.provider.refresh_token(&refresh_token))
            .await
            .and_then(|grant| credential.apply_grant(grant, Utc::now()));

        if let Err(e) = refreshed {
            warn!(
                "Failed to refresh {} token for {}: {}",
                self.provider.name(),
                account_id,
                e
            );
            return self.authorization_required(&account_id);
        }

        self.store.save(&credential).await?;

        info!("Refreshed access token for {}", account_id);
        Ok(Authorization::Authorized(credential))
    }

    /// Run a provider call under the configured timeout.
    async fn bounded<F>(&self, call: F) -> std::result::Result<TokenGrant, ProviderError>
    where
        F: Future<Output = std::result::Result<TokenGrant, ProviderError>>,
    {
        tokio::time::timeout(self.config.request_timeout(), call)
            .await
            .unwrap_or(Err(ProviderError::Timeout))
    }

    fn authorization_required(&self, account_id: &AccountId) -> Result<Authorization> {
        let auth_url = self.authorization_url(account_id, RedirectTarget::Web)?;
        Ok(Authorization::AuthorizationRequired { auth_url })
    }

    fn redirect_uri(&self, target: RedirectTarget) -> &str {
        match target {
            RedirectTarget::Mobile => self
                .config
                .mobile_redirect_uri
                .as_deref()
                .unwrap_or(&self.config.redirect_uri),
            RedirectTarget::Web => &self.config.redirect_uri,
        }
    }

    fn refresh_lock(&self, account_id: &AccountId) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .refresh_locks
            .lock()
            .map_err(|_| Error::StoreUnavailable("refresh lock table poisoned".to_string()))?;

        if let Some(lock) = locks.get(account_id).and_then(Weak::upgrade) {
            return Ok(lock);
        }

        locks.retain(|_, lock| lock.strong_count() > 0);
        let lock = Arc::new(tokio::sync::Mutex::new(()));
        locks.insert(account_id.clone(), Arc::downgrade(&lock));
        Ok(lock)
    }
}
