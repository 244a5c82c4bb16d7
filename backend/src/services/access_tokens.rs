use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Duration;
use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::auth::AuthError;
use crate::services::clock::Clock;

/// Issuer tag reserved for access tokens. Anything else signed with the same
/// secret is refused by [`AccessTokens::validate`].
pub const ACCESS_TOKEN_ISSUER: &str = "chirpy-access";

pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 3600;

const EXPECTED_ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    #[serde(default)]
    pub iss: String,
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub iat: i64,
    pub exp: i64,
}

/// Narrow seam over the MAC scheme so it can be swapped or tested with fixed keys.
pub trait TokenSigner: Send + Sync {
    fn sign(&self, claims: &AccessClaims) -> Result<String, AuthError>;

    /// Checks structure and signature only. Time and issuer checks belong to
    /// the caller.
    fn verify(&self, token: &str) -> Result<AccessClaims, AuthError>;
}

/// HMAC-SHA256 signer. Tokens declaring any other algorithm are rejected.
pub struct Hs256Signer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl Hs256Signer {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(EXPECTED_ALGORITHM);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl TokenSigner for Hs256Signer {
    fn sign(&self, claims: &AccessClaims) -> Result<String, AuthError> {
        encode(&Header::new(EXPECTED_ALGORITHM), claims, &self.encoding_key).map_err(|e| {
            log::error!("Failed to sign access token: {}", e);
            AuthError::TokenCreation
        })
    }

    fn verify(&self, token: &str) -> Result<AccessClaims, AuthError> {
        check_compact_shape(token)?;

        // An undecodable header at this point means an algorithm the library
        // does not know, "none" included.
        let header = decode_header(token).map_err(|e| match e.kind() {
            ErrorKind::Base64(_) | ErrorKind::Utf8(_) => AuthError::Malformed,
            _ => AuthError::BadSignature,
        })?;
        if header.alg != EXPECTED_ALGORITHM {
            return Err(AuthError::BadSignature);
        }

        decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidAlgorithmName
                | ErrorKind::InvalidKeyFormat => AuthError::BadSignature,
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidIssuer => AuthError::WrongIssuer,
                _ => AuthError::Malformed,
            })
    }
}

/// Three dot-delimited base64url segments.
fn check_compact_shape(token: &str) -> Result<(), AuthError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(AuthError::Malformed);
    }
    for segment in segments {
        URL_SAFE_NO_PAD
            .decode(segment)
            .map_err(|_| AuthError::Malformed)?;
    }
    Ok(())
}

/// Mints and checks short-lived access tokens.
///
/// Access tokens are never revoked; they end when `exp` passes. Early
/// termination of a session happens through its refresh token instead.
pub struct AccessTokens {
    signer: Arc<dyn TokenSigner>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl AccessTokens {
    pub fn new(signer: Arc<dyn TokenSigner>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { signer, clock, ttl }
    }

    pub fn issue(&self, subject: &Uuid) -> Result<String, AuthError> {
        self.issue_with_ttl(subject, self.ttl)
    }

    pub fn issue_with_ttl(&self, subject: &Uuid, ttl: Duration) -> Result<String, AuthError> {
        let now = self.clock.now();
        let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
            log::error!("Access token lifetime {} overflows the clock", ttl);
            AuthError::TokenCreation
        })?;
        let claims = AccessClaims {
            iss: ACCESS_TOKEN_ISSUER.to_string(),
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        self.signer.sign(&claims)
    }

    /// Returns the subject of a valid access token.
    pub fn validate(&self, token: &str) -> Result<Uuid, AuthError> {
        let claims = self.signer.verify(token)?;

        if claims.exp <= self.clock.now().timestamp() {
            return Err(AuthError::Expired);
        }
        if claims.iss != ACCESS_TOKEN_ISSUER {
            return Err(AuthError::WrongIssuer);
        }
        Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidSubject)
    }
}
