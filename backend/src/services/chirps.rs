use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::ChirpRow;
use shared::{Chirp, ChirpQuery, SortOrder};

pub const MAX_CHIRP_LENGTH: usize = 140;

#[derive(Debug, Error)]
pub enum ChirpError {
    #[error("Chirp is too long")]
    TooLong,
    #[error("Chirp not found")]
    NotFound,
    #[error("Stored chirp id is invalid: {0}")]
    InvalidId(#[from] uuid::Error),
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

pub async fn create_chirp(pool: &SqlitePool, author_id: &Uuid, body: &str) -> Result<Chirp, ChirpError> {
    if body.chars().count() > MAX_CHIRP_LENGTH {
        return Err(ChirpError::TooLong);
    }

    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO chirps (id, body, user_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(body)
    .bind(author_id.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Chirp {
        id,
        body: body.to_string(),
        user_id: *author_id,
        created_at: now,
        updated_at: now,
    })
}

pub async fn list_chirps(pool: &SqlitePool, query: &ChirpQuery) -> Result<Vec<Chirp>, ChirpError> {
    let order = match query.sort.unwrap_or_default() {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };

    let rows: Vec<ChirpRow> = match query.author_id {
        Some(author_id) => {
            let sql = format!(
                "SELECT * FROM chirps WHERE user_id = ? ORDER BY created_at {0}, rowid {0}",
                order
            );
            let rows: Vec<ChirpRow> = sqlx::query_as(&sql)
                .bind(author_id.to_string())
                .fetch_all(pool)
                .await?;
            rows
        }
        None => {
            let sql = format!("SELECT * FROM chirps ORDER BY created_at {0}, rowid {0}", order);
            let rows: Vec<ChirpRow> = sqlx::query_as(&sql).fetch_all(pool).await?;
            rows
        }
    };

    rows.iter()
        .map(|row| row.to_shared().map_err(ChirpError::from))
        .collect()
}

pub async fn get_chirp(pool: &SqlitePool, chirp_id: &Uuid) -> Result<Chirp, ChirpError> {
    let row: ChirpRow = sqlx::query_as("SELECT * FROM chirps WHERE id = ?")
        .bind(chirp_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or(ChirpError::NotFound)?;

    Ok(row.to_shared()?)
}

/// Ownership must be checked by the caller first.
pub async fn delete_chirp(pool: &SqlitePool, chirp_id: &Uuid) -> Result<(), ChirpError> {
    let result = sqlx::query("DELETE FROM chirps WHERE id = ?")
        .bind(chirp_id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ChirpError::NotFound);
    }
    Ok(())
}
