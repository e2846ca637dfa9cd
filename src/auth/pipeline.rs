//! The authorization pipeline.
//!
//! A pipeline is a fixed, ordered list of [`Stage`]s. Each stage receives the
//! context built so far and either admits it (possibly extended with the facts
//! it verified) or rejects the request. The first rejection ends the run; no
//! later stage executes and therefore no later stage touches the store.

use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    auth::{
        credentials::{AuthFailure, CredentialVerifier},
        status::StatusGate,
        token::{Claims, TokenError, TokenKind, TokenService},
    },
    error::RepoError,
    models::{AdminProfile, CompanyProfile, Identity, RoleKind},
    repository::RepositoryState,
};

/// Rejection
///
/// Why a stage refused the request. Mapped to HTTP by `ApiError`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("no bearer token")]
    NoToken,
    #[error("bad token: {0}")]
    BadToken(TokenError),
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),
    #[error("internal failure: {0}")]
    Internal(String),
}

impl From<RepoError> for Rejection {
    fn from(err: RepoError) -> Self {
        Rejection::Internal(err.to_string())
    }
}

/// AuthContext
///
/// Facts accumulated while a request moves through the pipeline. Stages never
/// mutate a context in place: they consume it and hand back an extended one.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    bearer: Option<String>,
    confirmation: Option<String>,
    claims: Option<Claims>,
    identity: Option<Identity>,
    admin: Option<AdminProfile>,
    company: Option<CompanyProfile>,
}

impl AuthContext {
    pub fn new(bearer: Option<String>) -> Self {
        Self {
            bearer,
            ..Self::default()
        }
    }

    /// Attaches the re-authentication password taken from the request body.
    pub fn with_confirmation(mut self, password: impl Into<String>) -> Self {
        self.confirmation = Some(password.into());
        self
    }

    pub fn claims(&self) -> Option<&Claims> {
        self.claims.as_ref()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn admin(&self) -> Option<&AdminProfile> {
        self.admin.as_ref()
    }

    pub fn company(&self) -> Option<&CompanyProfile> {
        self.company.as_ref()
    }

    /// The acting identity: the verified record if loaded, else the token subject.
    pub fn actor_id(&self) -> Option<Uuid> {
        self.identity
            .as_ref()
            .map(|identity| identity.id)
            .or_else(|| self.claims.as_ref().map(|claims| claims.subject.id))
    }

    fn with_claims(mut self, claims: Claims) -> Self {
        self.claims = Some(claims);
        self
    }

    fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    fn with_admin(mut self, admin: AdminProfile) -> Self {
        self.admin = Some(admin);
        self
    }

    fn with_company(mut self, company: CompanyProfile) -> Self {
        self.company = Some(company);
        self
    }
}

/// Verdict
///
/// Tagged result of one stage.
#[derive(Debug)]
pub enum Verdict {
    Admit(AuthContext),
    Reject(Rejection),
}

impl From<Result<AuthContext, Rejection>> for Verdict {
    fn from(result: Result<AuthContext, Rejection>) -> Self {
        match result {
            Ok(ctx) => Verdict::Admit(ctx),
            Err(rejection) => Verdict::Reject(rejection),
        }
    }
}

/// Stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Bearer token present, signed by us, not expired, and an access token.
    VerifyToken,
    /// Token subject still exists and its status passes the gate.
    VerifyUser(StatusGate),
    /// Subject holds an `ok` admin profile.
    VerifyAdmin,
    /// Subject holds an `ok` company profile.
    VerifyCompany,
    /// The request body's `password` re-authenticates the subject.
    VerifyPassword,
}

/// Pipeline
///
/// A named, ordered composition of stages. Endpoints pick one of the constants
/// below; login and self-registration run none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pipeline {
    name: &'static str,
    stages: &'static [Stage],
}

impl Pipeline {
    pub const READ: Pipeline = Pipeline::new(
        "read",
        &[Stage::VerifyToken, Stage::VerifyUser(StatusGate::READ)],
    );

    pub const MEMBER: Pipeline = Pipeline::new(
        "member",
        &[Stage::VerifyToken, Stage::VerifyUser(StatusGate::ACTIVE)],
    );

    pub const CONFIRMED: Pipeline = Pipeline::new(
        "confirmed",
        &[
            Stage::VerifyToken,
            Stage::VerifyUser(StatusGate::ACTIVE),
            Stage::VerifyPassword,
        ],
    );

    pub const ADMIN_CONFIRMED: Pipeline = Pipeline::new(
        "admin_confirmed",
        &[
            Stage::VerifyToken,
            Stage::VerifyUser(StatusGate::ACTIVE),
            Stage::VerifyAdmin,
            Stage::VerifyPassword,
        ],
    );

    pub const COMPANY_CONFIRMED: Pipeline = Pipeline::new(
        "company_confirmed",
        &[
            Stage::VerifyToken,
            Stage::VerifyUser(StatusGate::ACTIVE),
            Stage::VerifyCompany,
            Stage::VerifyPassword,
        ],
    );

    pub const fn new(name: &'static str, stages: &'static [Stage]) -> Self {
        Self { name, stages }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn stages(&self) -> &'static [Stage] {
        self.stages
    }
}

/// Authorizer
///
/// Runs pipelines. Holds the services stages need; cheap to clone.
#[derive(Clone)]
pub struct Authorizer {
    repo: RepositoryState,
    tokens: Arc<TokenService>,
    credentials: Arc<CredentialVerifier>,
}

impl Authorizer {
    pub fn new(
        repo: RepositoryState,
        tokens: Arc<TokenService>,
        credentials: Arc<CredentialVerifier>,
    ) -> Self {
        Self {
            repo,
            tokens,
            credentials,
        }
    }

    /// authorize
    ///
    /// Runs every stage of `pipeline` in order, stopping at the first rejection.
    pub async fn authorize(
        &self,
        pipeline: &Pipeline,
        ctx: AuthContext,
    ) -> Result<AuthContext, Rejection> {
        self.run_stages(pipeline, pipeline.stages().iter().copied(), ctx)
            .await
    }

    /// authorize_unconfirmed
    ///
    /// Runs `pipeline` without its `VerifyPassword` stage. Used when the request
    /// body, and with it the confirmation password, could not be read: the
    /// caller still has to pass every other stage before hearing about the body.
    pub async fn authorize_unconfirmed(
        &self,
        pipeline: &Pipeline,
        ctx: AuthContext,
    ) -> Result<AuthContext, Rejection> {
        let stages = pipeline
            .stages()
            .iter()
            .copied()
            .filter(|stage| !matches!(stage, Stage::VerifyPassword));
        self.run_stages(pipeline, stages, ctx).await
    }

    async fn run_stages(
        &self,
        pipeline: &Pipeline,
        stages: impl Iterator<Item = Stage> + Send,
        ctx: AuthContext,
    ) -> Result<AuthContext, Rejection> {
        let mut ctx = ctx;
        for stage in stages {
            match self.run_stage(stage, ctx).await {
                Verdict::Admit(next) => ctx = next,
                Verdict::Reject(rejection) => {
                    tracing::info!(
                        pipeline = pipeline.name(),
                        stage = ?stage,
                        reason = %rejection,
                        "request rejected"
                    );
                    return Err(rejection);
                }
            }
        }
        Ok(ctx)
    }

    pub async fn run_stage(&self, stage: Stage, ctx: AuthContext) -> Verdict {
        let result = match stage {
            Stage::VerifyToken => self.verify_token(ctx),
            Stage::VerifyUser(gate) => self.verify_user(gate, ctx).await,
            Stage::VerifyAdmin => self.verify_admin(ctx).await,
            Stage::VerifyCompany => self.verify_company(ctx).await,
            Stage::VerifyPassword => self.verify_password(ctx).await,
        };
        result.into()
    }

    fn verify_token(&self, ctx: AuthContext) -> Result<AuthContext, Rejection> {
        let bearer = ctx.bearer.as_deref().ok_or(Rejection::NoToken)?;
        let claims = self.tokens.verify(bearer).map_err(Rejection::BadToken)?;
        if claims.kind != TokenKind::Access {
            return Err(Rejection::BadToken(TokenError::Malformed));
        }
        Ok(ctx.with_claims(claims))
    }

    async fn verify_user(
        &self,
        gate: StatusGate,
        ctx: AuthContext,
    ) -> Result<AuthContext, Rejection> {
        let subject_id = ctx
            .claims()
            .map(|claims| claims.subject.id)
            .ok_or(Rejection::Unauthorized("no verified token"))?;
        let identity = self
            .repo
            .find_identity(subject_id)
            .await?
            .ok_or(Rejection::Unauthorized("unknown identity"))?;
        if !gate.admits(identity.status) {
            return Err(Rejection::Unauthorized("account status"));
        }
        Ok(ctx.with_identity(identity))
    }

    async fn verify_admin(&self, ctx: AuthContext) -> Result<AuthContext, Rejection> {
        let actor = ctx
            .actor_id()
            .ok_or(Rejection::Unauthorized("no verified identity"))?;
        let admin = self
            .repo
            .find_admin(actor)
            .await?
            .filter(|admin| StatusGate::PROFILE.admits(admin.status))
            .ok_or(Rejection::Unauthorized("admin profile"))?;
        Ok(ctx.with_admin(admin))
    }

    async fn verify_company(&self, ctx: AuthContext) -> Result<AuthContext, Rejection> {
        let actor = ctx
            .actor_id()
            .ok_or(Rejection::Unauthorized("no verified identity"))?;
        let company = self
            .repo
            .find_company(actor)
            .await?
            .filter(|company| StatusGate::PROFILE.admits(company.status))
            .ok_or(Rejection::Unauthorized("company profile"))?;
        Ok(ctx.with_company(company))
    }

    async fn verify_password(&self, ctx: AuthContext) -> Result<AuthContext, Rejection> {
        let actor = ctx
            .actor_id()
            .ok_or(Rejection::Unauthorized("no verified identity"))?;
        let password = ctx
            .confirmation
            .as_deref()
            .ok_or(Rejection::Unauthorized("missing confirmation password"))?;
        // Prefer the freshly loaded username; the token copy may be stale.
        let username = ctx
            .identity()
            .map(|identity| identity.username.as_str())
            .or_else(|| ctx.claims().map(|claims| claims.subject.username.as_str()))
            .ok_or(Rejection::Unauthorized("no verified identity"))?;

        match self
            .credentials
            .authenticate(self.repo.as_ref(), RoleKind::User, username, password)
            .await
        {
            Ok(found) if found.identity.id == actor => Ok(ctx),
            Ok(_) | Err(AuthFailure::NotFound) | Err(AuthFailure::PasswordMismatch) => {
                Err(Rejection::Unauthorized("confirmation password"))
            }
            Err(AuthFailure::Store(e)) => Err(e.into()),
            Err(AuthFailure::Hash(e)) => Err(Rejection::Internal(e.to_string())),
        }
    }
}
