use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for chirps
#[derive(Debug, Clone, FromRow)]
pub struct ChirpRow {
    pub id: String,
    pub body: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChirpRow {
    pub fn owner_id(&self) -> Result<Uuid, uuid::Error> {
        Uuid::parse_str(&self.user_id)
    }

    pub fn to_shared(&self) -> Result<shared::Chirp, uuid::Error> {
        Ok(shared::Chirp {
            id: Uuid::parse_str(&self.id)?,
            body: self.body.clone(),
            user_id: self.owner_id()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chirp_row_to_shared() {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let user_id = Uuid::new_v4();

        let row = ChirpRow {
            id: id.to_string(),
            body: "hello world".to_string(),
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        let shared = row.to_shared().unwrap();
        assert_eq!(shared.id, id);
        assert_eq!(shared.user_id, user_id);
        assert_eq!(shared.body, "hello world");
    }
}
