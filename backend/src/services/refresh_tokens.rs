use std::future::Future;
use std::sync::Arc;

use chrono::Duration;
use rand_core::{OsRng, RngCore};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::RefreshTokenRow;
use crate::services::access_tokens::AccessTokens;
use crate::services::auth::AuthError;
use crate::services::clock::Clock;

pub const REFRESH_TOKEN_BYTES: usize = 32;
pub const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 60;

/// 32 bytes from the OS generator, as 64 lowercase hex characters.
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Server-side record of long-lived, revocable refresh tokens.
///
/// Every call is a single-row statement bounded by `timeout`; running out of
/// time or losing the connection surfaces as [`AuthError::StoreUnavailable`].
pub struct RefreshTokenStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    timeout: std::time::Duration,
}

impl RefreshTokenStore {
    pub fn new(
        pool: SqlitePool,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        timeout: std::time::Duration,
    ) -> Self {
        Self {
            pool,
            clock,
            ttl,
            timeout,
        }
    }

    async fn bounded<T, F>(&self, operation: &str, query: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, query).await {
            Ok(result) => result.map_err(AuthError::from_store),
            Err(_) => {
                log::error!("Refresh token {} timed out after {:?}", operation, self.timeout);
                Err(AuthError::StoreUnavailable)
            }
        }
    }

    pub async fn create(&self, user_id: &Uuid) -> Result<String, AuthError> {
        let token = generate_refresh_token();
        let now = self.clock.now();
        let expires_at = now.checked_add_signed(self.ttl).ok_or_else(|| {
            log::error!("Refresh token lifetime {} overflows the clock", self.ttl);
            AuthError::TokenCreation
        })?;

        self.bounded(
            "insert",
            sqlx::query(
                r#"
                INSERT INTO refresh_tokens (token, user_id, created_at, updated_at, expires_at, revoked_at)
                VALUES (?, ?, ?, ?, ?, NULL)
                "#,
            )
            .bind(&token)
            .bind(user_id.to_string())
            .bind(now)
            .bind(now)
            .bind(expires_at)
            .execute(&self.pool),
        )
        .await?;

        log::debug!("Issued refresh token for user {}", user_id);
        Ok(token)
    }

    pub async fn lookup(&self, token: &str) -> Result<RefreshTokenRow, AuthError> {
        self.bounded(
            "lookup",
            sqlx::query_as::<_, RefreshTokenRow>("SELECT * FROM refresh_tokens WHERE token = ?")
                .bind(token)
                .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(AuthError::NotFound)
    }

    pub fn is_usable(&self, record: &RefreshTokenRow) -> bool {
        record.is_usable_at(self.clock.now())
    }

    /// Owner of a usable token. Expiry is reported ahead of revocation.
    pub fn check(&self, record: &RefreshTokenRow) -> Result<Uuid, AuthError> {
        let now = self.clock.now();
        if record.is_expired_at(now) {
            return Err(AuthError::Expired);
        }
        if record.is_revoked() {
            return Err(AuthError::Revoked);
        }
        record.owner_id().map_err(|_| AuthError::InvalidSubject)
    }

    /// Mint a fresh access token for the owner of `token`. The refresh token
    /// itself is left untouched.
    pub async fn refresh(&self, token: &str, access: &AccessTokens) -> Result<String, AuthError> {
        let record = self.lookup(token).await?;
        let user_id = self.check(&record)?;
        access.issue(&user_id)
    }

    /// Revoking twice keeps the first timestamp. Unknown tokens are `NotFound`.
    pub async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let now = self.clock.now();
        let result = self
            .bounded(
                "revoke",
                sqlx::query(
                    r#"
                    UPDATE refresh_tokens
                    SET revoked_at = COALESCE(revoked_at, ?), updated_at = ?
                    WHERE token = ?
                    "#,
                )
                .bind(now)
                .bind(now)
                .bind(token)
                .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound);
        }
        Ok(())
    }

    /// Revoke every still-open token of a user. Returns how many were closed.
    pub async fn revoke_all_for_user(&self, user_id: &Uuid) -> Result<u64, AuthError> {
        let now = self.clock.now();
        let result = self
            .bounded(
                "bulk revoke",
                sqlx::query(
                    "UPDATE refresh_tokens SET revoked_at = ?, updated_at = ? WHERE user_id = ? AND revoked_at IS NULL",
                )
                .bind(now)
                .bind(now)
                .bind(user_id.to_string())
                .execute(&self.pool),
            )
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{insert_test_user, test_pool};
    use crate::services::access_tokens::Hs256Signer;
    use crate::services::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;

    struct Fixture {
        pool: SqlitePool,
        clock: Arc<ManualClock>,
        store: RefreshTokenStore,
        access: AccessTokens,
    }

    async fn fixture() -> Fixture {
        let pool = test_pool().await;
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
        ));
        let store = RefreshTokenStore::new(
            pool.clone(),
            clock.clone(),
            Duration::days(DEFAULT_REFRESH_TOKEN_TTL_DAYS),
            std::time::Duration::from_secs(5),
        );
        let access = AccessTokens::new(
            Arc::new(Hs256Signer::new(b"refresh-test-secret")),
            clock.clone(),
            Duration::hours(1),
        );
        Fixture {
            pool,
            clock,
            store,
            access,
        }
    }

    #[test]
    fn test_generated_tokens_are_64_lowercase_hex() {
        let token = generate_refresh_token();
        assert_eq!(token.len(), 64);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_generated_tokens_are_distinct() {
        let tokens: HashSet<String> = (0..1000).map(|_| generate_refresh_token()).collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[tokio::test]
    async fn test_create_persists_record() {
        let f = fixture().await;
        let user_id = insert_test_user(&f.pool, "alice@example.com").await;

        let token = f.store.create(&user_id).await.unwrap();
        let record = f.store.lookup(&token).await.unwrap();

        assert_eq!(record.token, token);
        assert_eq!(record.owner_id().unwrap(), user_id);
        assert_eq!(record.created_at, f.clock.now());
        assert_eq!(record.expires_at, f.clock.now() + Duration::days(60));
        assert!(record.revoked_at.is_none());
        assert!(f.store.is_usable(&record));
    }

    #[tokio::test]
    async fn test_lookup_unknown_token() {
        let f = fixture().await;
        let result = f.store.lookup(&generate_refresh_token()).await;
        assert!(matches!(result, Err(AuthError::NotFound)));
    }

    #[tokio::test]
    async fn test_refresh_issues_access_token_for_owner() {
        let f = fixture().await;
        let user_id = insert_test_user(&f.pool, "bob@example.com").await;
        let token = f.store.create(&user_id).await.unwrap();

        let first = f.store.refresh(&token, &f.access).await.unwrap();
        f.clock.advance(Duration::days(10));
        let second = f.store.refresh(&token, &f.access).await.unwrap();

        assert_eq!(f.access.validate(&second).unwrap(), user_id);
        assert_ne!(first, second);
        assert!(f.store.lookup(&token).await.unwrap().revoked_at.is_none());
    }

    #[tokio::test]
    async fn test_refresh_unknown_token() {
        let f = fixture().await;
        let result = f.store.refresh("deadbeef", &f.access).await;
        assert!(matches!(result, Err(AuthError::NotFound)));
    }

    #[tokio::test]
    async fn test_refresh_after_revoke_fails_revoked() {
        let f = fixture().await;
        let user_id = insert_test_user(&f.pool, "carol@example.com").await;
        let token = f.store.create(&user_id).await.unwrap();

        f.store.revoke(&token).await.unwrap();

        let result = f.store.refresh(&token, &f.access).await;
        assert!(matches!(result, Err(AuthError::Revoked)));
    }

    #[tokio::test]
    async fn test_refresh_after_expiry_fails_expired() {
        let f = fixture().await;
        let user_id = insert_test_user(&f.pool, "dave@example.com").await;
        let token = f.store.create(&user_id).await.unwrap();

        f.clock.advance(Duration::days(60) - Duration::seconds(1));
        assert!(f.store.refresh(&token, &f.access).await.is_ok());

        f.clock.advance(Duration::seconds(1));
        let result = f.store.refresh(&token, &f.access).await;
        assert!(matches!(result, Err(AuthError::Expired)));
    }

    #[tokio::test]
    async fn test_expired_and_revoked_reports_expired() {
        let f = fixture().await;
        let user_id = insert_test_user(&f.pool, "erin@example.com").await;
        let token = f.store.create(&user_id).await.unwrap();

        f.store.revoke(&token).await.unwrap();
        f.clock.advance(Duration::days(61));

        let result = f.store.refresh(&token, &f.access).await;
        assert!(matches!(result, Err(AuthError::Expired)));
    }

    #[tokio::test]
    async fn test_revoke_is_monotonic_and_idempotent() {
        let f = fixture().await;
        let user_id = insert_test_user(&f.pool, "frank@example.com").await;
        let token = f.store.create(&user_id).await.unwrap();

        f.store.revoke(&token).await.unwrap();
        let first = f.store.lookup(&token).await.unwrap().revoked_at;

        f.clock.advance(Duration::hours(2));
        f.store.revoke(&token).await.unwrap();
        let second = f.store.lookup(&token).await.unwrap().revoked_at;

        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_revoke_unknown_token() {
        let f = fixture().await;
        let result = f.store.revoke(&generate_refresh_token()).await;
        assert!(matches!(result, Err(AuthError::NotFound)));
    }

    #[tokio::test]
    async fn test_revoke_all_for_user_leaves_other_users_alone() {
        let f = fixture().await;
        let alice = insert_test_user(&f.pool, "alice@example.com").await;
        let bob = insert_test_user(&f.pool, "bob@example.com").await;

        let a1 = f.store.create(&alice).await.unwrap();
        let a2 = f.store.create(&alice).await.unwrap();
        let b1 = f.store.create(&bob).await.unwrap();
        f.store.revoke(&a2).await.unwrap();

        assert_eq!(f.store.revoke_all_for_user(&alice).await.unwrap(), 1);

        assert!(matches!(
            f.store.refresh(&a1, &f.access).await,
            Err(AuthError::Revoked)
        ));
        assert!(f.store.refresh(&b1, &f.access).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_store_is_unavailable() {
        let f = fixture().await;
        f.pool.close().await;

        let result = f.store.lookup(&generate_refresh_token()).await;
        match result {
            Err(e) => {
                assert!(matches!(e, AuthError::StoreUnavailable));
                assert!(e.is_transient());
            }
            Ok(_) => panic!("lookup on a closed pool must fail"),
        }
    }

    #[tokio::test]
    async fn test_busy_store_times_out_as_unavailable() {
        let f = fixture().await;
        let store = RefreshTokenStore::new(
            f.pool.clone(),
            f.clock.clone(),
            Duration::days(DEFAULT_REFRESH_TOKEN_TTL_DAYS),
            std::time::Duration::from_millis(50),
        );

        // The test pool has a single connection.
        let _held = f.pool.acquire().await.unwrap();

        let result = store.lookup(&generate_refresh_token()).await;
        assert!(matches!(result, Err(AuthError::StoreUnavailable)));
    }

    #[tokio::test]
    async fn test_create_with_overflowing_ttl_fails() {
        let f = fixture().await;
        let user_id = insert_test_user(&f.pool, "grace@example.com").await;
        let store = RefreshTokenStore::new(
            f.pool.clone(),
            f.clock.clone(),
            Duration::days(100_000_000),
            std::time::Duration::from_secs(5),
        );

        let result = store.create(&user_id).await;
        assert!(matches!(result, Err(AuthError::TokenCreation)));
    }
}
