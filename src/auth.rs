//! Signup and login over the credential store.
//!
//! An email moves from absent to registered exactly once. Login only checks
//! the password; nothing is issued on success.

use std::sync::Arc;

use actix_web::web;
use tracing::{info, instrument};

use crate::errors::{Error, Result};
use crate::models::UserRecord;
use crate::password::{self, Argon2Params};
use crate::store::{CredentialStore, StoreError};

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    params: Argon2Params,
}

/// Both fields present and non-empty, or `MissingField`.
fn require<'a>(email: Option<&'a str>, password: Option<&'a str>) -> Result<(&'a str, &'a str)> {
    match (email, password) {
        (Some(e), Some(p)) if !e.is_empty() && !p.is_empty() => Ok((e, p)),
        _ => Err(Error::MissingField),
    }
}

/// Run `f` on the blocking pool. Each Argon2 call takes tens of milliseconds
/// and must not hold up the worker's event loop.
async fn off_worker<T, F>(operation: &str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    web::block(f).await.map_err(|e| Error::Internal {
        operation: format!("{operation}: {e}"),
    })?
}

impl AuthService {
    pub fn new(store: Arc<dyn CredentialStore>, params: Argon2Params) -> Self {
        Self { store, params }
    }

    #[instrument(skip_all, fields(email = ?email), err)]
    pub async fn signup(&self, email: Option<&str>, password: Option<&str>) -> Result<()> {
        let (email, password) = require(email, password)?;

        if self.store.get(email).await?.is_some() {
            return Err(Error::DuplicateUser);
        }

        let params = self.params;
        let plain = password.to_string();
        let record = UserRecord {
            email: email.to_string(),
            password_hash: off_worker("hash password", move || password::hash_password(&plain, params)).await?,
        };

        // The store re-checks atomically; a concurrent signup may have won.
        match self.store.insert(&record).await {
            Ok(()) => {
                info!("Registered new user");
                Ok(())
            }
            Err(StoreError::UniqueViolation { .. }) => Err(Error::DuplicateUser),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip_all, fields(email = ?email), err)]
    pub async fn login(&self, email: Option<&str>, password: Option<&str>) -> Result<()> {
        let (email, password) = require(email, password)?;

        let Some(record) = self.store.get(email).await? else {
            return Err(Error::InvalidCredentials);
        };

        let plain = password.to_string();
        let verified = off_worker("verify password", move || {
            password::verify_password(&plain, &record.password_hash)
        })
        .await?;
        if !verified {
            return Err(Error::InvalidCredentials);
        }

        Ok(())
    }
}
