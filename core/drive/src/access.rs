//! Folder-permission based roles and sign-in completion.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use docsgate_auth::{Credential, RedirectTarget, TokenLifecycleManager};
use docsgate_common::{AccountId, Error, Result, Role};

use crate::client::DriveClient;
use crate::types::Permission;

/// Drive layout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    /// Root folder holding the document subfolders. Its permission list
    /// decides who is an admin.
    pub folder_id: String,
}

impl DriveConfig {
    /// Load from `GOOGLE_DRIVE_FOLDER_ID`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let folder_id = lookup("GOOGLE_DRIVE_FOLDER_ID")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::Configuration("GOOGLE_DRIVE_FOLDER_ID is required".to_string()))?;
        Ok(Self { folder_id })
    }
}

/// Role implied by a permission list: admin iff the account is on it.
pub fn role_for(permissions: &[Permission], account: &AccountId) -> Role {
    let listed = permissions.iter().any(|p| {
        p.email_address
            .as_deref()
            .is_some_and(|email| email.eq_ignore_ascii_case(account.as_str()))
    });

    if listed {
        Role::Admin
    } else {
        Role::User
    }
}

/// Resolve an account's role from the admin folder's permission list.
///
/// Any failure to read the list is logged and yields `Role::User`.
pub async fn resolve_role(admin_drive: &DriveClient, folder_id: &str, account: &AccountId) -> Role {
    match admin_drive.list_permissions(folder_id).await {
        Ok(permissions) => role_for(&permissions, account),
        Err(e) => {
            error!("Failed to check folder access for {}: {}", account, e);
            Role::User
        }
    }
}

/// Exchange a sign-in authorization code and record the account's role.
///
/// `target` is the redirect the sign-in consent URL was built for.
///
/// # Errors
/// - `Error::ExchangeFailed` when the code is rejected
/// - Credential store failure
pub async fn complete_sign_in(
    manager: &TokenLifecycleManager,
    admin_drive: &DriveClient,
    folder_id: &str,
    account: &AccountId,
    code: &str,
    target: RedirectTarget,
) -> Result<Credential> {
    manager
        .exchange_authorization_code_via(account, code, target)
        .await?;

    let role = resolve_role(admin_drive, folder_id, account).await;
    let credential = manager.assign_role(account, role).await?;

    info!("Signed in {} as {}", account, credential.role);
    Ok(credential)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docsgate_auth::{
        MemoryCredentialStore, OAuthConfig, OAuthProvider, ProviderError, TokenGrant,
    };
    use std::sync::Arc;
    use std::time::Duration;

    struct CodeOnlyProvider;

    #[async_trait]
    impl OAuthProvider for CodeOnlyProvider {
        fn name(&self) -> &str {
            "code-only"
        }

        fn authorization_url(
            &self,
            _redirect_uri: &str,
            _scopes: &[String],
            login_hint: &str,
        ) -> std::result::Result<String, ProviderError> {
            Ok(format!("https://accounts.example/auth?login_hint={}", login_hint))
        }

        async fn exchange_code(
            &self,
            code: &str,
            _redirect_uri: &str,
        ) -> std::result::Result<TokenGrant, ProviderError> {
            if code == "good" {
                Ok(TokenGrant {
                    access_token: "t1".to_string(),
                    refresh_token: Some("r1".to_string()),
                    expires_in: Duration::from_secs(3600),
                })
            } else {
                Err(ProviderError::Rejected {
                    error: "invalid_grant".to_string(),
                    description: None,
                })
            }
        }

        async fn refresh_token(
            &self,
            _refresh_token: &str,
        ) -> std::result::Result<TokenGrant, ProviderError> {
            Err(ProviderError::Transport("offline".to_string()))
        }
    }

    fn manager() -> Arc<TokenLifecycleManager> {
        let config = OAuthConfig::new("id", "secret", "http://localhost/cb");
        Arc::new(
            TokenLifecycleManager::new(
                config,
                Arc::new(MemoryCredentialStore::new()),
                Arc::new(CodeOnlyProvider),
            )
            .unwrap(),
        )
    }

    fn permission(email: Option<&str>, role: &str) -> Permission {
        Permission {
            id: None,
            email_address: email.map(String::from),
            role: role.to_string(),
        }
    }

    #[test]
    fn test_role_for_listed_account() {
        let permissions = vec![
            permission(None, "reader"),
            permission(Some("Boss@X.com"), "writer"),
        ];
        let boss = AccountId::new("boss@x.com").unwrap();
        let other = AccountId::new("other@x.com").unwrap();

        assert_eq!(role_for(&permissions, &boss), Role::Admin);
        assert_eq!(role_for(&permissions, &other), Role::User);
        assert_eq!(role_for(&[], &boss), Role::User);
    }

    #[test]
    fn test_drive_config_from_lookup() {
        let config = DriveConfig::from_lookup(|key| {
            (key == "GOOGLE_DRIVE_FOLDER_ID").then(|| "folder123".to_string())
        })
        .unwrap();
        assert_eq!(config.folder_id, "folder123");

        assert!(DriveConfig::from_lookup(|_| None).is_err());
    }

    #[tokio::test]
    async fn test_resolve_role_falls_back_to_user_when_admin_unauthorized() {
        let manager = manager();
        let admin = AccountId::new("admin@x.com").unwrap();
        let admin_drive = DriveClient::new(manager, admin).unwrap();
        let account = AccountId::new("a@x.com").unwrap();

        assert_eq!(resolve_role(&admin_drive, "folder", &account).await, Role::User);
    }

    #[tokio::test]
    async fn test_complete_sign_in_stores_credential_with_role() {
        let manager = manager();
        let admin_drive =
            DriveClient::new(Arc::clone(&manager), AccountId::new("admin@x.com").unwrap()).unwrap();
        let account = AccountId::new("a@x.com").unwrap();

        let credential = complete_sign_in(
            &manager,
            &admin_drive,
            "folder",
            &account,
            "good",
            RedirectTarget::Mobile,
        )
        .await
        .unwrap();

        assert_eq!(credential.access_token, "t1");
        assert_eq!(credential.role, Role::User);
        let stored = manager.credential(&account).await.unwrap().unwrap();
        assert_eq!(stored, credential);
    }

    #[tokio::test]
    async fn test_complete_sign_in_propagates_exchange_failure() {
        let manager = manager();
        let admin_drive =
            DriveClient::new(Arc::clone(&manager), AccountId::new("admin@x.com").unwrap()).unwrap();
        let account = AccountId::new("a@x.com").unwrap();

        let result = complete_sign_in(
            &manager,
            &admin_drive,
            "folder",
            &account,
            "bad",
            RedirectTarget::Web,
        )
        .await;

        assert!(matches!(result, Err(Error::ExchangeFailed(_))));
        assert!(manager.credential(&account).await.unwrap().is_none());
    }
}
