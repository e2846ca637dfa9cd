//! Password hashing and credential verification.

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher as _, PasswordVerifier as _, Version,
    password_hash::{SaltString, rand_core::OsRng},
};
use std::sync::Arc;
use thiserror::Error;

use crate::{
    auth::{status::StatusGate, token::ProfileRef},
    config::HashingConfig,
    error::RepoError,
    models::{Identity, RoleKind},
    repository::Repository,
};

#[derive(Debug, Error)]
pub enum HashError {
    #[error("invalid hashing parameters: {0}")]
    Params(String),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("stored password hash is malformed")]
    Malformed,
    #[error("hashing task was aborted")]
    Aborted,
}

/// AuthFailure
///
/// Internal reasons a login failed. `NotFound` and `PasswordMismatch` are
/// collapsed into one opaque 401 before reaching the client.
#[derive(Debug, Error)]
pub enum AuthFailure {
    #[error("no matching account")]
    NotFound,
    #[error("password does not match")]
    PasswordMismatch,
    #[error(transparent)]
    Store(#[from] RepoError),
    #[error(transparent)]
    Hash(#[from] HashError),
}

/// CredentialHasher
///
/// The hashing primitive behind the verifier. Implementations must compare in
/// constant time.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, HashError>;
    fn verify(&self, password: &str, hash: &str) -> Result<bool, HashError>;
}

/// Argon2Hasher
///
/// Argon2id with configurable cost. Verification reads the parameters from the
/// PHC string, so hashes created under an older cost keep verifying.
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    pub fn new(config: &HashingConfig) -> Result<Self, HashError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| HashError::Params(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| HashError::Hash(e.to_string()))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, HashError> {
        let parsed = PasswordHash::new(hash).map_err(|_| HashError::Malformed)?;
        match self.argon2().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(HashError::Hash(e.to_string())),
        }
    }
}

/// Authenticated
///
/// Result of a successful login: the identity plus the role profile it was
/// verified against (if any), used to build token claims.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub identity: Identity,
    pub profile: Option<ProfileRef>,
}

/// CredentialVerifier
///
/// Checks username/password pairs for a role. Read-only: it never writes to the
/// store and never logs the supplied password.
pub struct CredentialVerifier {
    hasher: Arc<dyn CredentialHasher>,
    // Verified when the username is unknown so both failure paths cost the same.
    decoy_hash: String,
}

impl CredentialVerifier {
    pub fn new(hasher: Arc<dyn CredentialHasher>) -> Result<Self, HashError> {
        let decoy_hash = hasher.hash("decoy-password-never-matches")?;
        Ok(Self { hasher, decoy_hash })
    }

    /// Hashes a new or changed password on the blocking pool.
    pub async fn hash_password(&self, password: String) -> Result<String, HashError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|_| HashError::Aborted)?
    }

    /// authenticate
    ///
    /// Exact, case-sensitive username lookup. For `Admin` and `Company` the
    /// matching profile must exist with status `ok`.
    pub async fn authenticate(
        &self,
        repo: &dyn Repository,
        role: RoleKind,
        username: &str,
        password: &str,
    ) -> Result<Authenticated, AuthFailure> {
        let candidate = match repo.find_identity_by_username(username).await? {
            Some(identity) => {
                let profile = match role {
                    RoleKind::User => Some(None),
                    RoleKind::Admin => repo
                        .find_admin(identity.id)
                        .await?
                        .filter(|admin| StatusGate::PROFILE.admits(admin.status))
                        .map(|admin| {
                            Some(ProfileRef {
                                kind: RoleKind::Admin,
                                id: admin.id,
                            })
                        }),
                    RoleKind::Company => repo
                        .find_company(identity.id)
                        .await?
                        .filter(|company| StatusGate::PROFILE.admits(company.status))
                        .map(|company| {
                            Some(ProfileRef {
                                kind: RoleKind::Company,
                                id: company.id,
                            })
                        }),
                };
                profile.map(|profile| (identity, profile))
            }
            None => None,
        };

        let stored_hash = candidate
            .as_ref()
            .map(|(identity, _)| identity.password_hash.clone())
            .unwrap_or_else(|| self.decoy_hash.clone());
        let matches = self.verify_blocking(password.to_owned(), stored_hash).await?;

        match candidate {
            None => Err(AuthFailure::NotFound),
            Some(_) if !matches => Err(AuthFailure::PasswordMismatch),
            Some((identity, profile)) => Ok(Authenticated { identity, profile }),
        }
    }

    async fn verify_blocking(&self, password: String, hash: String) -> Result<bool, HashError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|_| HashError::Aborted)?
    }
}
