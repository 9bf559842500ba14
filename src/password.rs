//! Salted one-way hashing for stored credentials. Hashes are PHC strings
//! (`$argon2id$v=19$m=...`), so each one records the cost it was made with.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Cost settings for new hashes, under `password_hashing` in the config.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Argon2Params {
    /// Cheap parameters for tests only
    pub fn fast() -> Self {
        Self {
            memory_kib: 128,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn hasher(self) -> Result<Argon2<'static>, Error> {
        Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map(|params| Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
            .map_err(|e| Error::Internal {
                operation: format!(
                    "build Argon2id hasher (m={} t={} p={}): {e}",
                    self.memory_kib, self.iterations, self.parallelism
                ),
            })
    }
}

impl Default for Argon2Params {
    /// OWASP baseline for Argon2id: 19 MiB, two passes, one lane.
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// New PHC hash of `password` under a fresh random salt.
pub fn hash_password(password: &str, params: Argon2Params) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    params
        .hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Internal {
            operation: format!("hash password: {e}"),
        })
}

/// Whether `password` matches `stored`. The cost comes from `stored`, so
/// hashes made under older settings keep verifying after a config change.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, Error> {
    let stored = PasswordHash::new(stored).map_err(|e| Error::Internal {
        operation: format!("read stored password hash: {e}"),
    })?;

    match Argon2::default().verify_password(password.as_bytes(), &stored) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(Error::Internal {
            operation: format!("verify password: {e}"),
        }),
    }
}

/// Reject unusable cost settings at startup rather than on the first signup.
pub fn check_params(params: Argon2Params) -> Result<(), Error> {
    params.hasher().map(|_| ())
}
