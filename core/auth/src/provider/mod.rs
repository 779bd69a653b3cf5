//! OAuth authorization server abstraction.

pub mod google;

use async_trait::async_trait;
use thiserror::Error;

use crate::credential::TokenGrant;

pub use google::GoogleOAuthProvider;

/// Failure talking to the authorization server.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The server answered with an OAuth error (e.g. `invalid_grant`).
    #[error("{error}{}", suffix(.description))]
    Rejected {
        error: String,
        description: Option<String>,
    },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response could not be parsed or lacked an access token.
    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    /// The round-trip exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// Client-side misconfiguration (bad endpoint or redirect URL).
    #[error("invalid provider configuration: {0}")]
    Configuration(String),
}

fn suffix(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(": {}", d))
        .unwrap_or_default()
}

/// OAuth2 authorization server operations used by the token lifecycle.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Provider name (e.g. "google").
    fn name(&self) -> &str;

    /// Build the consent URL. Pure; no network access.
    ///
    /// The URL requests offline access with a forced consent prompt so that
    /// the exchange yields a refresh token.
    fn authorization_url(
        &self,
        redirect_uri: &str,
        scopes: &[String],
        login_hint: &str,
    ) -> Result<String, ProviderError>;

    /// Exchange an authorization code for an initial grant.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant, ProviderError>;

    /// Mint a new access token from a refresh token.
    ///
    /// The returned grant may or may not carry a rotated refresh token.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError>;
}
