//! Google OAuth2 provider built on the `oauth2` crate.

use async_trait::async_trait;
use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenResponse};
use oauth2::reqwest;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    RedirectUrl, RefreshToken, RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use std::borrow::Cow;
use std::time::Duration;

use docsgate_common::{Error, Result};

use super::{OAuthProvider, ProviderError};
use crate::config::OAuthConfig;
use crate::credential::{TokenGrant, DEFAULT_EXPIRES_IN};

type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// OAuth2 client for Google's authorization server.
///
/// Endpoints come from [`OAuthConfig`], so any standards-compliant
/// server with the same parameter conventions works as well.
pub struct GoogleOAuthProvider {
    client: ConfiguredClient,
    http: reqwest::Client,
}

impl GoogleOAuthProvider {
    /// Create a provider from configuration.
    ///
    /// # Errors
    /// - Invalid auth, token or redirect URL
    /// - HTTP client construction failure
    pub fn new(config: &OAuthConfig) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_uri(
                AuthUrl::new(config.auth_url.clone())
                    .map_err(|e| Error::Configuration(format!("Invalid auth URL: {}", e)))?,
            )
            .set_token_uri(
                TokenUrl::new(config.token_url.clone())
                    .map_err(|e| Error::Configuration(format!("Invalid token URL: {}", e)))?,
            );

        let http = build_http_client(config.request_timeout())?;

        Ok(Self { client, http })
    }
}

/// Token endpoints must not follow redirects (SSRF guard per the `oauth2` docs).
fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout)
        .user_agent(concat!("docsgate/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::Configuration(format!("Failed to create HTTP client: {}", e)))
}

fn redirect_url(redirect_uri: &str) -> std::result::Result<RedirectUrl, ProviderError> {
    RedirectUrl::new(redirect_uri.to_string())
        .map_err(|e| ProviderError::Configuration(format!("Invalid redirect URL: {}", e)))
}

fn into_grant(response: BasicTokenResponse) -> std::result::Result<TokenGrant, ProviderError> {
    let access_token = response.access_token().secret().clone();
    if access_token.is_empty() {
        return Err(ProviderError::MalformedResponse(
            "empty access_token".to_string(),
        ));
    }

    Ok(TokenGrant {
        access_token,
        refresh_token: response.refresh_token().map(|t| t.secret().clone()),
        expires_in: response.expires_in().unwrap_or(DEFAULT_EXPIRES_IN),
    })
}

fn map_token_error<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> ProviderError
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(response) => ProviderError::Rejected {
            error: response.error().to_string(),
            description: response.error_description().cloned(),
        },
        RequestTokenError::Request(e) => ProviderError::Transport(e.to_string()),
        RequestTokenError::Parse(e, _body) => ProviderError::MalformedResponse(e.to_string()),
        RequestTokenError::Other(message) => ProviderError::MalformedResponse(message),
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuthProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn authorization_url(
        &self,
        redirect_uri: &str,
        scopes: &[String],
        login_hint: &str,
    ) -> std::result::Result<String, ProviderError> {
        let (url, _csrf_token) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .set_redirect_uri(Cow::Owned(redirect_url(redirect_uri)?))
            .add_scopes(scopes.iter().cloned().map(Scope::new))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .add_extra_param("login_hint", login_hint.to_string())
            .url();

        Ok(url.to_string())
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> std::result::Result<TokenGrant, ProviderError> {
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_redirect_uri(Cow::Owned(redirect_url(redirect_uri)?))
            .request_async(&self.http)
            .await
            .map_err(map_token_error)?;

        into_grant(response)
    }

    async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> std::result::Result<TokenGrant, ProviderError> {
        let refresh_token = RefreshToken::new(refresh_token.to_string());
        let response = self
            .client
            .exchange_refresh_token(&refresh_token)
            .request_async(&self.http)
            .await
            .map_err(map_token_error)?;

        into_grant(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn provider() -> GoogleOAuthProvider {
        let config = OAuthConfig::new("test_id", "test_secret", "http://localhost:8080/callback");
        GoogleOAuthProvider::new(&config).unwrap()
    }

    fn query(url: &str) -> Vec<(String, String)> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    fn param<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
        pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_authorization_url_parameters() {
        let scopes = vec!["email".to_string(), "https://www.googleapis.com/auth/drive".to_string()];
        let url = provider()
            .authorization_url("http://localhost:8080/callback", &scopes, "a@x.com")
            .unwrap();

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth"));
        let pairs = query(&url);
        assert_eq!(param(&pairs, "client_id"), Some("test_id"));
        assert_eq!(param(&pairs, "access_type"), Some("offline"));
        assert_eq!(param(&pairs, "prompt"), Some("consent"));
        assert_eq!(param(&pairs, "login_hint"), Some("a@x.com"));
        assert_eq!(param(&pairs, "response_type"), Some("code"));
        assert_eq!(
            param(&pairs, "redirect_uri"),
            Some("http://localhost:8080/callback")
        );
        assert_eq!(
            param(&pairs, "scope"),
            Some("email https://www.googleapis.com/auth/drive")
        );
        assert!(param(&pairs, "state").is_some());
    }

    #[test]
    fn test_authorization_url_uses_given_redirect() {
        let url = provider()
            .authorization_url("com.example.app:/auth", &["email".to_string()], "a@x.com")
            .unwrap();

        assert_eq!(param(&query(&url), "redirect_uri"), Some("com.example.app:/auth"));
    }

    #[test]
    fn test_invalid_endpoint_is_configuration_error() {
        let mut config = OAuthConfig::new("id", "secret", "http://localhost/cb");
        config.token_url = "not a url".to_string();

        assert!(matches!(
            GoogleOAuthProvider::new(&config),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_redirect_is_provider_configuration_error() {
        let result = provider().authorization_url("::bad::", &["email".to_string()], "a@x.com");
        assert!(matches!(result, Err(ProviderError::Configuration(_))));
    }

    fn token_response(json: &str) -> BasicTokenResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_grant_from_full_token_response() {
        let grant = into_grant(token_response(
            r#"{"access_token":"ya29.a0","token_type":"Bearer","expires_in":3599,"refresh_token":"1//0g"}"#,
        ))
        .unwrap();

        assert_eq!(grant.access_token, "ya29.a0");
        assert_eq!(grant.refresh_token.as_deref(), Some("1//0g"));
        assert_eq!(grant.expires_in, Duration::from_secs(3599));
    }

    #[test]
    fn test_grant_defaults_missing_lifetime_and_refresh_token() {
        let grant =
            into_grant(token_response(r#"{"access_token":"ya29.a0","token_type":"Bearer"}"#))
                .unwrap();

        assert_eq!(grant.refresh_token, None);
        assert_eq!(grant.expires_in, Duration::from_secs(3600));
    }

    #[test]
    fn test_empty_access_token_is_malformed() {
        let result = into_grant(token_response(
            r#"{"access_token":"","token_type":"Bearer","expires_in":3599}"#,
        ));

        assert!(matches!(result, Err(ProviderError::MalformedResponse(_))));
    }

    #[test]
    fn test_server_error_maps_to_rejected() {
        let response: BasicErrorResponse = serde_json::from_str(
            r#"{"error":"invalid_grant","error_description":"Bad Request"}"#,
        )
        .unwrap();

        let err = map_token_error(RequestTokenError::<std::io::Error, _>::ServerResponse(response));

        match &err {
            ProviderError::Rejected { error, description } => {
                assert_eq!(error, "invalid_grant");
                assert_eq!(description.as_deref(), Some("Bad Request"));
            }
            other => panic!("expected Rejected, got {:?}", other),
        }
        assert_eq!(err.to_string(), "invalid_grant: Bad Request");
    }

    #[test]
    fn test_request_and_other_failures_are_mapped() {
        type TestError = RequestTokenError<std::io::Error, BasicErrorResponse>;

        let transport = map_token_error(TestError::Request(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "connect timeout",
        )));
        assert!(matches!(&transport, ProviderError::Transport(m) if m.contains("connect timeout")));

        let other = map_token_error(TestError::Other(
            "unexpected response content type".to_string(),
        ));
        assert!(matches!(other, ProviderError::MalformedResponse(_)));
    }

    #[test]
    fn test_name() {
        assert_eq!(provider().name(), "google");
    }
}
