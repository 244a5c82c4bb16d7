use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::UserRow;
use crate::services::password;
use shared::{CreateUserRequest, UpdateUserRequest, User};

#[derive(Debug, Error)]
pub enum UserError {
    #[error("User already exists")]
    AlreadyExists,
    #[error("User not found")]
    NotFound,
    #[error("Password hashing error")]
    HashingError,
    #[error("Stored user id is invalid: {0}")]
    InvalidId(#[from] uuid::Error),
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

async fn email_taken(pool: &SqlitePool, email: &str, except: Option<&Uuid>) -> Result<bool, sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM users WHERE email = ? AND id != ?",
    )
    .bind(email)
    .bind(except.map(|id| id.to_string()).unwrap_or_default())
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

pub async fn register_user(pool: &SqlitePool, request: &CreateUserRequest) -> Result<User, UserError> {
    if email_taken(pool, &request.email, None).await? {
        return Err(UserError::AlreadyExists);
    }

    let hashed_password = password::hash_password_blocking(&request.password)
        .await
        .map_err(|_| UserError::HashingError)?;

    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO users (id, email, hashed_password, is_chirpy_red, created_at, updated_at)
        VALUES (?, ?, ?, FALSE, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(&request.email)
    .bind(&hashed_password)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(User {
        id,
        email: request.email.clone(),
        is_chirpy_red: false,
        created_at: now,
        updated_at: now,
    })
}

/// Raw row including the password digest. Only the login flow needs this.
pub async fn fetch_by_email(pool: &SqlitePool, email: &str) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn get_user_by_id(pool: &SqlitePool, user_id: &Uuid) -> Result<Option<User>, UserError> {
    let user: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?;

    Ok(user.map(|u| u.to_shared()).transpose()?)
}

pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, UserError> {
    let user = fetch_by_email(pool, email).await?;
    Ok(user.map(|u| u.to_shared()).transpose()?)
}

/// Replace the email and password of an existing user.
pub async fn update_credentials(
    pool: &SqlitePool,
    user_id: &Uuid,
    request: &UpdateUserRequest,
) -> Result<User, UserError> {
    let mut user: UserRow = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or(UserError::NotFound)?;

    if email_taken(pool, &request.email, Some(user_id)).await? {
        return Err(UserError::AlreadyExists);
    }

    user.hashed_password = password::hash_password_blocking(&request.password)
        .await
        .map_err(|_| UserError::HashingError)?;
    user.email = request.email.clone();
    user.updated_at = Utc::now();

    sqlx::query("UPDATE users SET email = ?, hashed_password = ?, updated_at = ? WHERE id = ?")
        .bind(&user.email)
        .bind(&user.hashed_password)
        .bind(user.updated_at)
        .bind(user_id.to_string())
        .execute(pool)
        .await?;

    Ok(user.to_shared()?)
}

pub async fn upgrade_to_red(pool: &SqlitePool, user_id: &Uuid) -> Result<(), UserError> {
    let result = sqlx::query("UPDATE users SET is_chirpy_red = TRUE, updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(UserError::NotFound);
    }
    Ok(())
}

/// Delete every user. Chirps and refresh tokens go with them through the
/// foreign-key cascade. This is the only path that hard-deletes refresh
/// tokens and it is reachable only on the dev platform.
pub async fn reset_users(pool: &SqlitePool) -> Result<u64, UserError> {
    let result = sqlx::query("DELETE FROM users").execute(pool).await?;
    Ok(result.rows_affected())
}
