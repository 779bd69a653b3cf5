//! OAuth client configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use docsgate_common::{Error, Result};

/// OAuth2 authorization endpoint.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// OAuth2 token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Full Drive access; folder listing and permission checks need more than `drive.file`.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

fn default_scopes() -> Vec<String> {
    ["openid", "email", "profile", DRIVE_SCOPE]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_auth_url() -> String {
    GOOGLE_AUTH_URL.to_string()
}

fn default_token_url() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// Configuration for the token lifecycle manager and its OAuth provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Redirect URI registered for the web consent flow.
    pub redirect_uri: String,
    /// Redirect URI used when the consent flow is started from the mobile app.
    #[serde(default)]
    pub mobile_redirect_uri: Option<String>,
    /// Scopes requested on the consent screen.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// Account whose credential backs admin-level Drive calls.
    #[serde(default)]
    pub admin_account_hint: Option<String>,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// Upper bound for every provider round-trip.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl OAuthConfig {
    /// Create a configuration with Google endpoints and default scopes.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            mobile_redirect_uri: None,
            scopes: default_scopes(),
            admin_account_hint: None,
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }

    /// Load configuration from `GOOGLE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Required: `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`, `GOOGLE_REDIRECT_URI`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::Configuration(format!("{} is required", key)))
        };

        let mut config = Self::new(
            required("GOOGLE_CLIENT_ID")?,
            required("GOOGLE_CLIENT_SECRET")?,
            required("GOOGLE_REDIRECT_URI")?,
        );

        config.mobile_redirect_uri = lookup("GOOGLE_MOBILE_REDIRECT_URI");
        config.admin_account_hint = lookup("GOOGLE_ADMIN_EMAIL");

        if let Some(scopes) = lookup("GOOGLE_SCOPES") {
            config.scopes = scopes.split_whitespace().map(String::from).collect();
        }
        if let Some(url) = lookup("GOOGLE_AUTH_URL") {
            config.auth_url = url;
        }
        if let Some(url) = lookup("GOOGLE_TOKEN_URL") {
            config.token_url = url;
        }
        if let Some(secs) = lookup("GOOGLE_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = secs.parse().map_err(|_| {
                Error::Configuration(format!("Invalid GOOGLE_REQUEST_TIMEOUT_SECS: {}", secs))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration can drive a consent flow.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::Configuration("client_id is empty".to_string()));
        }
        if self.client_secret.trim().is_empty() {
            return Err(Error::Configuration("client_secret is empty".to_string()));
        }
        if self.redirect_uri.trim().is_empty() {
            return Err(Error::Configuration("redirect_uri is empty".to_string()));
        }
        if self.scopes.is_empty() {
            return Err(Error::Configuration("at least one scope is required".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Configuration(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
