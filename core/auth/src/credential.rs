//! Stored OAuth credentials and provider token grants.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use docsgate_common::{AccountId, Role};

use crate::provider::ProviderError;

/// Lifetime assumed when the provider omits `expires_in`.
pub const DEFAULT_EXPIRES_IN: std::time::Duration = std::time::Duration::from_secs(3600);

/// Tokens returned by the provider from a code exchange or a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    /// Absent when the provider did not reissue a refresh token.
    pub refresh_token: Option<String>,
    pub expires_in: std::time::Duration,
}

impl TokenGrant {
    /// Absolute expiry of this grant if it was issued at `now`.
    ///
    /// # Errors
    /// - `ProviderError::MalformedResponse` when `expires_in` lies beyond the
    ///   representable date range
    pub fn expires_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ProviderError> {
        Duration::from_std(self.expires_in)
            .ok()
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                ProviderError::MalformedResponse(format!(
                    "expires_in out of range: {}s",
                    self.expires_in.as_secs()
                ))
            })
    }
}

/// OAuth credential persisted for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub account_id: AccountId,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub role: Role,
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    /// Create a credential from the first grant issued for an account.
    pub fn from_grant(
        account_id: AccountId,
        grant: TokenGrant,
        now: DateTime<Utc>,
    ) -> Result<Self, ProviderError> {
        let expires_at = grant.expires_at(now)?;
        Ok(Self {
            account_id,
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.filter(|t| !t.is_empty()),
            expires_at,
            role: Role::default(),
            updated_at: now,
        })
    }

    /// Merge a newer grant into this credential.
    ///
    /// Access token and expiry are replaced together; the stored refresh token
    /// survives unless the grant carries a non-empty replacement. A grant
    /// with an unusable expiry leaves the credential untouched.
    pub fn apply_grant(
        &mut self,
        grant: TokenGrant,
        now: DateTime<Utc>,
    ) -> Result<(), ProviderError> {
        self.expires_at = grant.expires_at(now)?;
        self.access_token = grant.access_token;
        if let Some(refresh_token) = grant.refresh_token.filter(|t| !t.is_empty()) {
            self.refresh_token = Some(refresh_token);
        }
        self.updated_at = now;
        Ok(())
    }

    /// Whether the access token is expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the access token is expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether there is an access token at all.
    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }
}
