use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for refresh tokens.
///
/// Rows are never deleted; a token ends either by passing `expires_at` or by
/// having `revoked_at` set, which is never cleared afterwards.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenRow {
    pub token: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl RefreshTokenRow {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Expiry is exclusive: the token is dead at exactly `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired_at(now)
    }

    pub fn owner_id(&self) -> Result<Uuid, uuid::Error> {
        Uuid::parse_str(&self.user_id)
    }
}
