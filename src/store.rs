//! Credential storage keyed by email.
//!
//! Two implementations: [`SqliteCredentialStore`] for the persisted `users`
//! table and [`InMemoryCredentialStore`] for tests and throwaway runs. Both make
//! the uniqueness check and the insert a single atomic step, so concurrent
//! signups for the same email cannot both succeed.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::DatabaseConfig;
use crate::models::UserRecord;

/// URL that selects the in-memory store
pub const MEMORY_URL: &str = "memory";

#[derive(Error, Debug)]
pub enum StoreError {
    /// A record with this email already exists
    #[error("Unique constraint violation on {email}")]
    UniqueViolation { email: String },

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Other(anyhow::Error::from(err))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up the record for `email`, matching case-sensitively.
    async fn get(&self, email: &str) -> Result<Option<UserRecord>>;

    /// Insert a new record, failing with [`StoreError::UniqueViolation`] if the
    /// email is already taken.
    async fn insert(&self, record: &UserRecord) -> Result<()>;
}

/// Open the store selected by `config.url`.
pub async fn open(config: &DatabaseConfig) -> Result<Arc<dyn CredentialStore>> {
    if config.url == MEMORY_URL {
        info!("Using in-memory credential store; users will not survive a restart");
        return Ok(Arc::new(InMemoryCredentialStore::default()));
    }
    let store = SqliteCredentialStore::connect(&config.url, config.max_connections).await?;
    store.migrate().await?;
    Ok(Arc::new(store))
}

#[derive(Debug, Clone)]
pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // Every connection to `:memory:` is its own database, so pin to one
        // connection and never recycle it.
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(max_connections)
                .connect_with(options)
                .await?
        };

        info!(url = %url, "Connected to credential database");
        Ok(Self::new(pool))
    }

    /// Create the `users` table if it does not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Other(anyhow::Error::from(e)))?;
        debug!("Credential database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    #[instrument(skip(self), err)]
    async fn get(&self, email: &str) -> Result<Option<UserRecord>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT email, password AS password_hash FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    #[instrument(skip(self, record), fields(email = %record.email), err)]
    async fn insert(&self, record: &UserRecord) -> Result<()> {
        let result = sqlx::query("INSERT INTO users (email, password) VALUES (?, ?)")
            .bind(&record.email)
            .bind(&record.password_hash)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(StoreError::UniqueViolation {
                email: record.email.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    users: DashMap<String, String>,
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self, email: &str) -> Result<Option<UserRecord>> {
        Ok(self.users.get(email).map(|hash| UserRecord {
            email: email.to_string(),
            password_hash: hash.value().clone(),
        }))
    }

    async fn insert(&self, record: &UserRecord) -> Result<()> {
        match self.users.entry(record.email.clone()) {
            Entry::Occupied(_) => Err(StoreError::UniqueViolation {
                email: record.email.clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(record.password_hash.clone());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(email: &str, hash: &str) -> UserRecord {
        UserRecord {
            email: email.to_string(),
            password_hash: hash.to_string(),
        }
    }

    async fn sqlite_store() -> SqliteCredentialStore {
        let store = SqliteCredentialStore::connect("sqlite::memory:", 1).await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    async fn exercise(store: &dyn CredentialStore) {
        assert_eq!(store.get("a@x.com").await.unwrap(), None);

        store.insert(&record("a@x.com", "h1")).await.unwrap();
        assert_eq!(store.get("a@x.com").await.unwrap(), Some(record("a@x.com", "h1")));

        // Second insert for the same email is rejected and leaves the first intact
        let err = store.insert(&record("a@x.com", "h2")).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { ref email } if email == "a@x.com"));
        assert_eq!(store.get("a@x.com").await.unwrap().unwrap().password_hash, "h1");

        // Emails are matched as stored
        assert_eq!(store.get("A@X.COM").await.unwrap(), None);
        store.insert(&record("A@X.COM", "h3")).await.unwrap();
    }

    #[actix_rt::test]
    async fn test_in_memory_store() {
        exercise(&InMemoryCredentialStore::default()).await;
    }

    #[actix_rt::test]
    async fn test_sqlite_store() {
        exercise(&sqlite_store().await).await;
    }

    #[actix_rt::test]
    async fn test_migrate_is_idempotent() {
        let store = sqlite_store().await;
        store.migrate().await.unwrap();
        store.insert(&record("b@x.com", "h")).await.unwrap();
        assert!(store.get("b@x.com").await.unwrap().is_some());
    }

    #[actix_rt::test]
    async fn test_concurrent_inserts_admit_one() {
        let store = InMemoryCredentialStore::default();
        let records: Vec<_> = (0..8).map(|i| record("race@x.com", &format!("h{i}"))).collect();
        let results = futures_util::future::join_all(records.iter().map(|r| store.insert(r))).await;
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    }

    #[actix_rt::test]
    async fn test_open_memory_url() {
        let config = DatabaseConfig {
            url: MEMORY_URL.to_string(),
            max_connections: 1,
        };
        let store = open(&config).await.unwrap();
        store.insert(&record("c@x.com", "h")).await.unwrap();
        assert!(store.get("c@x.com").await.unwrap().is_some());
    }
}
