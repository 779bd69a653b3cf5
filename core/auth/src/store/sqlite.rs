//! SQLite-backed credential store.
//!
//! One row per account in a `credentials` table. Queries run on the blocking
//! thread pool so the async callers never stall the runtime on disk I/O.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use docsgate_common::{AccountId, Error, Result, Role};

use super::CredentialStore;
use crate::credential::Credential;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS credentials (
    account_id TEXT PRIMARY KEY,
    access_token TEXT NOT NULL,
    refresh_token TEXT,
    expires_at TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'user',
    updated_at TEXT NOT NULL
);
"#;

/// Raw column values of a `credentials` row.
struct CredentialRow {
    account_id: String,
    access_token: String,
    refresh_token: Option<String>,
    expires_at: String,
    role: String,
    updated_at: String,
}

impl CredentialRow {
    fn into_credential(self) -> Result<Credential> {
        Ok(Credential {
            account_id: AccountId::new(self.account_id)?,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: parse_timestamp(&self.expires_at)?,
            role: self.role.parse::<Role>()?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::StoreUnavailable(format!("Corrupt timestamp {:?}: {}", raw, e)))
}

fn db_error(e: rusqlite::Error) -> Error {
    Error::StoreUnavailable(format!("SQLite error: {}", e))
}

/// Credential store persisted in a SQLite database file.
#[derive(Clone)]
pub struct SqliteCredentialStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCredentialStore {
    /// Create or open a credential database.
    ///
    /// # Errors
    /// - Database creation or schema initialization failure
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref()).map_err(db_error)?;
        conn.execute_batch(SCHEMA).map_err(db_error)?;

        info!("Credential store opened at {}", db_path.as_ref().display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_error)?;
        conn.execute_batch(SCHEMA).map_err(db_error)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| Error::StoreUnavailable("connection lock poisoned".to_string()))?;
            op(&guard)
        })
        .await
        .map_err(|e| Error::StoreUnavailable(format!("store task failed: {}", e)))?
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn find(&self, account_id: &AccountId) -> Result<Option<Credential>> {
        let key = account_id.as_str().to_string();
        let row = self
            .with_conn(move |conn| {
                conn.query_row(
                    r#"
                    SELECT account_id, access_token, refresh_token, expires_at, role, updated_at
                    FROM credentials WHERE account_id = ?1
                    "#,
                    [&key],
                    |row| {
                        Ok(CredentialRow {
                            account_id: row.get(0)?,
                            access_token: row.get(1)?,
                            refresh_token: row.get(2)?,
                            expires_at: row.get(3)?,
                            role: row.get(4)?,
                            updated_at: row.get(5)?,
                        })
                    },
                )
                .optional()
                .map_err(db_error)
            })
            .await?;

        row.map(CredentialRow::into_credential).transpose()
    }

    async fn save(&self, credential: &Credential) -> Result<()> {
        let account_id = credential.account_id.as_str().to_string();
        let access_token = credential.access_token.clone();
        let refresh_token = credential.refresh_token.clone();
        let expires_at = format_timestamp(&credential.expires_at);
        let role = credential.role.as_str();
        let updated_at = format_timestamp(&credential.updated_at);

        debug!("Saving credential for {}", account_id);
        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT INTO credentials
                (account_id, access_token, refresh_token, expires_at, role, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(account_id) DO UPDATE SET
                    access_token = excluded.access_token,
                    refresh_token = COALESCE(excluded.refresh_token, credentials.refresh_token),
                    expires_at = excluded.expires_at,
                    role = excluded.role,
                    updated_at = excluded.updated_at
                "#,
                params![account_id, access_token, refresh_token, expires_at, role, updated_at],
            )
            .map(|_| ())
            .map_err(db_error)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::TokenGrant;
    use chrono::Duration;
    use tempfile::TempDir;

    fn credential(email: &str, access: &str, refresh: Option<&str>) -> Credential {
        Credential::from_grant(
            AccountId::new(email).unwrap(),
            TokenGrant {
                access_token: access.to_string(),
                refresh_token: refresh.map(String::from),
                expires_in: std::time::Duration::from_secs(3600),
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_find_missing() {
        let store = SqliteCredentialStore::in_memory().unwrap();
        let id = AccountId::new("nobody@x.com").unwrap();

        assert!(store.find(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_find_preserves_all_fields() {
        let store = SqliteCredentialStore::in_memory().unwrap();
        let mut cred = credential("a@x.com", "t1", Some("r1"));
        cred.role = Role::Admin;

        store.save(&cred).await.unwrap();

        let found = store.find(&cred.account_id).await.unwrap().unwrap();
        assert_eq!(found, cred);
    }

    #[tokio::test]
    async fn test_upsert_keeps_refresh_token_when_absent() {
        let store = SqliteCredentialStore::in_memory().unwrap();
        store.save(&credential("a@x.com", "t1", Some("r1"))).await.unwrap();

        let mut update = credential("a@x.com", "t2", None);
        update.expires_at = Utc::now() + Duration::hours(2);
        store.save(&update).await.unwrap();

        let found = store.find(&update.account_id).await.unwrap().unwrap();
        assert_eq!(found.access_token, "t2");
        assert_eq!(found.refresh_token.as_deref(), Some("r1"));
        assert_eq!(found.expires_at, update.expires_at);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.db");
        let cred = credential("a@x.com", "t1", Some("r1"));

        {
            let store = SqliteCredentialStore::open(&path).unwrap();
            store.save(&cred).await.unwrap();
        }

        let reopened = SqliteCredentialStore::open(&path).unwrap();
        let found = reopened.find(&cred.account_id).await.unwrap().unwrap();
        assert_eq!(found, cred);
    }

    #[tokio::test]
    async fn test_corrupt_row_is_store_error() {
        let store = SqliteCredentialStore::in_memory().unwrap();
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO credentials VALUES ('a@x.com', 't', NULL, 'yesterday', 'user', 'now')",
                    [],
                )
                .map(|_| ())
                .map_err(db_error)
            })
            .await
            .unwrap();

        let id = AccountId::new("a@x.com").unwrap();
        let result = store.find(&id).await;
        assert!(matches!(result, Err(Error::StoreUnavailable(_))));
    }
}
