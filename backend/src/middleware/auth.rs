use std::fmt;

use actix_web::http::header::{HeaderMap, AUTHORIZATION};
use actix_web::HttpRequest;
use constant_time_eq::constant_time_eq;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::services::auth::{AuthError, SessionService};

/// Scheme literal at the start of an `Authorization` header. Matching is
/// case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scheme {
    Bearer,
    ApiKey,
    Unknown(String),
}

impl Scheme {
    pub fn from_literal(literal: &str) -> Self {
        match literal {
            "Bearer" => Scheme::Bearer,
            "ApiKey" => Scheme::ApiKey,
            other => Scheme::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Scheme::Bearer => "Bearer",
            Scheme::ApiKey => "ApiKey",
            Scheme::Unknown(other) => other,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCredential {
    pub scheme: Scheme,
    pub value: String,
}

/// Parse a raw header value into `<scheme> <value>`.
pub fn parse_authorization(raw: &str) -> Result<ParsedCredential, AuthError> {
    let mut parts = raw.split_whitespace();

    let scheme = parts.next().ok_or(AuthError::MissingHeader)?;
    let value = parts.next().ok_or(AuthError::MalformedHeader)?;
    if parts.next().is_some() {
        return Err(AuthError::MalformedHeader);
    }

    Ok(ParsedCredential {
        scheme: Scheme::from_literal(scheme),
        value: value.to_string(),
    })
}

/// Value of the single `Authorization` header, provided it uses `expected`.
pub fn extract_credential(headers: &HeaderMap, expected: Scheme) -> Result<String, AuthError> {
    let mut values = headers.get_all(AUTHORIZATION);
    let raw = values.next().ok_or(AuthError::MissingHeader)?;
    if values.next().is_some() {
        return Err(AuthError::MalformedHeader);
    }

    let raw = raw.to_str().map_err(|_| AuthError::MalformedHeader)?;
    let parsed = parse_authorization(raw)?;

    match (&parsed.scheme, &expected) {
        (Scheme::Unknown(_), _) | (_, Scheme::Unknown(_)) => Err(AuthError::MalformedHeader),
        (found, wanted) if found == wanted => Ok(parsed.value),
        _ => Err(AuthError::MalformedHeader),
    }
}

/// Extract user ID from the Authorization header
pub fn extract_user_id(req: &HttpRequest, sessions: &SessionService) -> Result<Uuid, AuthError> {
    let token = extract_credential(req.headers(), Scheme::Bearer)?;
    sessions.verify_access_token(&token)
}

/// Check an `ApiKey` credential against the configured secret. Both sides are
/// hashed first so the comparison never depends on length or prefix.
pub fn verify_api_key(headers: &HeaderMap, expected: &str) -> Result<(), AuthError> {
    let presented = extract_credential(headers, Scheme::ApiKey)?;

    let presented_digest = Sha256::digest(presented.as_bytes());
    let expected_digest = Sha256::digest(expected.as_bytes());

    if constant_time_eq(presented_digest.as_slice(), expected_digest.as_slice()) {
        Ok(())
    } else {
        Err(AuthError::InvalidApiKey)
    }
}
