use std::sync::Arc;

use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::models::UserRow;
use crate::services::access_tokens::{AccessTokens, Hs256Signer};
use crate::services::clock::Clock;
use crate::services::password;
use crate::services::refresh_tokens::RefreshTokenStore;
use crate::services::users;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingHeader,
    #[error("Malformed authorization header")]
    MalformedHeader,
    #[error("Malformed token")]
    Malformed,
    #[error("Invalid token signature")]
    BadSignature,
    #[error("Token was not issued as an access token")]
    WrongIssuer,
    #[error("Token has expired")]
    Expired,
    #[error("Token has been revoked")]
    Revoked,
    #[error("Token not found")]
    NotFound,
    #[error("Not allowed to modify this resource")]
    Forbidden,
    #[error("Password hashing error")]
    HashingFailure,
    #[error("Token store unavailable")]
    StoreUnavailable,
    #[error("Token subject is not a valid user id")]
    InvalidSubject,
    #[error("Incorrect email or password")]
    InvalidCredentials,
    #[error("Invalid API key")]
    InvalidApiKey,
    #[error("Failed to create token")]
    TokenCreation,
    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),
}

impl AuthError {
    /// Connectivity faults become `StoreUnavailable`; anything else the
    /// database reports stays a `DatabaseError`.
    pub fn from_store(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_) => {
                log::error!("Token store unreachable: {}", e);
                AuthError::StoreUnavailable
            }
            other => AuthError::DatabaseError(other),
        }
    }

    /// Only infrastructure faults are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::StoreUnavailable)
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingHeader => "missing_authorization",
            AuthError::MalformedHeader => "malformed_authorization",
            AuthError::Malformed => "malformed_token",
            AuthError::BadSignature => "bad_signature",
            AuthError::WrongIssuer => "wrong_issuer",
            AuthError::Expired => "token_expired",
            AuthError::Revoked => "token_revoked",
            AuthError::NotFound => "token_not_found",
            AuthError::Forbidden => "forbidden",
            AuthError::HashingFailure => "internal_error",
            AuthError::StoreUnavailable => "store_unavailable",
            AuthError::InvalidSubject => "invalid_subject",
            AuthError::InvalidCredentials => "authentication_error",
            AuthError::InvalidApiKey => "invalid_api_key",
            AuthError::TokenCreation => "jwt_error",
            AuthError::DatabaseError(_) => "internal_error",
        }
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        AuthError::from_store(e)
    }
}

/// Token pair handed out at login.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
}

/// Login, refresh, revoke and access-token verification, wired together.
pub struct SessionService {
    pool: SqlitePool,
    access: AccessTokens,
    refresh_tokens: RefreshTokenStore,
}

impl SessionService {
    pub fn new(config: &Config, pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        let signer = Arc::new(Hs256Signer::new(config.jwt_secret.as_bytes()));
        Self {
            access: AccessTokens::new(signer, clock.clone(), config.access_token_ttl()),
            refresh_tokens: RefreshTokenStore::new(
                pool.clone(),
                clock,
                config.refresh_token_ttl(),
                config.store_timeout(),
            ),
            pool,
        }
    }

    pub fn access_tokens(&self) -> &AccessTokens {
        &self.access
    }

    pub async fn issue_session(&self, user_id: &Uuid) -> Result<Session, AuthError> {
        let access_token = self.access.issue(user_id)?;
        let refresh_token = self.refresh_tokens.create(user_id).await?;
        Ok(Session {
            access_token,
            refresh_token,
        })
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> Result<String, AuthError> {
        self.refresh_tokens.refresh(refresh_token, &self.access).await
    }

    pub async fn revoke_session(&self, refresh_token: &str) -> Result<(), AuthError> {
        self.refresh_tokens.revoke(refresh_token).await
    }

    pub async fn revoke_all_sessions(&self, user_id: &Uuid) -> Result<u64, AuthError> {
        self.refresh_tokens.revoke_all_for_user(user_id).await
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Uuid, AuthError> {
        self.access.validate(token)
    }

    /// Verify email and password, then open a session.
    ///
    /// Unknown emails are checked against a dummy digest and both failure
    /// paths return `InvalidCredentials`.
    pub async fn login(&self, email: &str, plaintext: &str) -> Result<(UserRow, Session), AuthError> {
        let user = users::fetch_by_email(&self.pool, email).await?;

        let digest = match &user {
            Some(row) => row.hashed_password.as_str(),
            None => password::dummy_digest()?,
        };
        let matched = password::verify_password_blocking(plaintext, digest).await?;

        let user = match user {
            Some(row) if matched => row,
            _ => return Err(AuthError::InvalidCredentials),
        };
        let user_id = user.user_id().map_err(|_| AuthError::InvalidSubject)?;

        let session = self.issue_session(&user_id).await?;
        log::info!("User {} logged in", user_id);
        Ok((user, session))
    }
}
