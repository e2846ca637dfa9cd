use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use std::convert::Infallible;

pub mod credentials;
pub mod pipeline;
pub mod status;
pub mod token;

pub use credentials::{Argon2Hasher, Authenticated, CredentialHasher, CredentialVerifier};
pub use pipeline::{AuthContext, Authorizer, Pipeline, Rejection, Stage, Verdict};
pub use status::StatusGate;
pub use token::{Claims, ProfileRef, Subject, TokenError, TokenKind, TokenService};

/// BearerToken Extractor Result
///
/// The raw credential from the `Authorization` header, if any. Extraction never
/// fails: a missing token is a decision for the pipeline (`NoToken`), not for
/// the extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BearerToken(pub Option<String>);

impl BearerToken {
    /// Starts a pipeline context carrying this token.
    pub fn into_context(self) -> AuthContext {
        AuthContext::new(self.0)
    }
}

/// BearerToken Extractor Implementation
///
/// Takes the word following the scheme (`Bearer <token>`). A header with no
/// second word counts as no token at all.
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split_whitespace().nth(1))
            .map(str::to_owned);

        Ok(BearerToken(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> BearerToken {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        BearerToken::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn reads_the_credential_after_the_scheme() {
        assert_eq!(extract(Some("Bearer abc.def.ghi")).await, BearerToken(Some("abc.def.ghi".into())));
    }

    #[tokio::test]
    async fn missing_or_bare_header_yields_no_token() {
        assert_eq!(extract(None).await, BearerToken(None));
        assert_eq!(extract(Some("Bearer")).await, BearerToken(None));
    }
}
