use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// In-memory database with the schema applied. A single connection keeps
/// every query on the same memory database.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

#[cfg(test)]
pub async fn insert_test_user(pool: &SqlitePool, email: &str) -> uuid::Uuid {
    let id = uuid::Uuid::new_v4();
    let now = chrono::Utc::now();
    sqlx::query(
        "INSERT INTO users (id, email, hashed_password, is_chirpy_red, created_at, updated_at) VALUES (?, ?, ?, FALSE, ?, ?)",
    )
    .bind(id.to_string())
    .bind(email)
    .bind("$argon2id$placeholder")
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .unwrap();
    id
}
