use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

use crate::models::RoleKind;

/// TokenError
///
/// Callers must be able to tell a forged/garbled token from an expired one:
/// the first means "log in again", the second "refresh silently".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token is malformed or its signature is invalid")]
    Malformed,
    #[error("token has expired")]
    Expired,
    #[error("token could not be signed")]
    Signing,
}

impl TokenError {
    /// Machine-readable reason sent to clients alongside a 403.
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::Malformed | TokenError::Signing => "malformed",
            TokenError::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// ProfileRef
///
/// Role profile embedded at login time. Informational only: it can go stale,
/// authorization always re-reads the profile from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRef {
    pub kind: RoleKind,
    pub id: Uuid,
}

/// Subject
///
/// The identity part of the claim set; this is what callers hand to the issue
/// functions and what they get back from `verify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: Uuid,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileRef>,
}

/// Claims
///
/// The signed payload. `exp` is present on access tokens only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub subject: Subject,
    pub kind: TokenKind,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// TokenService
///
/// HS256 signer/verifier holding its own secret. Constructed once at start-up
/// and shared through `AppState`; tests build their own with throwaway secrets.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, access_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
        }
    }

    /// The configured lifetime for access tokens issued at login.
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn issue_access(&self, subject: &Subject, ttl: Duration) -> Result<String, TokenError> {
        self.issue_access_at(subject, ttl, Utc::now())
    }

    pub fn issue_access_at(
        &self,
        subject: &Subject,
        ttl: Duration,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let iat = issued_at.timestamp();
        self.sign(&Claims {
            subject: subject.clone(),
            kind: TokenKind::Access,
            iat,
            exp: Some(iat + ttl.num_seconds()),
        })
    }

    /// Refresh tokens carry no expiry.
    pub fn issue_refresh(&self, subject: &Subject) -> Result<String, TokenError> {
        self.issue_refresh_at(subject, Utc::now())
    }

    pub fn issue_refresh_at(
        &self,
        subject: &Subject,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        self.sign(&Claims {
            subject: subject.clone(),
            kind: TokenKind::Refresh,
            iat: issued_at.timestamp(),
            exp: None,
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// verify_at
    ///
    /// Signature and shape are checked by `jsonwebtoken`; expiry is checked here
    /// against `now` so that the boundary is exact (valid at `exp`, expired one
    /// second later) and testable without sleeping.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::new();

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "token failed verification");
                TokenError::Malformed
            })?
            .claims;

        match (claims.kind, claims.exp) {
            (TokenKind::Access, None) => Err(TokenError::Malformed),
            (TokenKind::Access, Some(exp)) if now.timestamp() > exp => Err(TokenError::Expired),
            _ => Ok(claims),
        }
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(|e| {
            tracing::error!(error = %e, "failed to sign token");
            TokenError::Signing
        })
    }
}
