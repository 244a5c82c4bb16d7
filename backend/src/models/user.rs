use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for users
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub hashed_password: String,
    pub is_chirpy_red: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    pub fn user_id(&self) -> Result<Uuid, uuid::Error> {
        Uuid::parse_str(&self.id)
    }

    pub fn to_shared(&self) -> Result<shared::User, uuid::Error> {
        Ok(shared::User {
            id: self.user_id()?,
            email: self.email.clone(),
            is_chirpy_red: self.is_chirpy_red,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_row_to_shared() {
        let now = Utc::now();
        let id = Uuid::new_v4();

        let row = UserRow {
            id: id.to_string(),
            email: "test@example.com".to_string(),
            hashed_password: "hashed".to_string(),
            is_chirpy_red: true,
            created_at: now,
            updated_at: now,
        };

        let shared = row.to_shared().unwrap();

        assert_eq!(shared.id, id);
        assert_eq!(shared.email, "test@example.com");
        assert!(shared.is_chirpy_red);
    }

    #[test]
    fn test_user_row_with_corrupt_id() {
        let now = Utc::now();
        let row = UserRow {
            id: "garbage".to_string(),
            email: "test@example.com".to_string(),
            hashed_password: "hashed".to_string(),
            is_chirpy_red: false,
            created_at: now,
            updated_at: now,
        };

        assert!(row.to_shared().is_err());
    }
}
