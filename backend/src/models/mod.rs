use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::services::auth::SessionService;
use crate::services::clock::Clock;

pub mod chirp;
pub mod refresh_token;
pub mod user;

pub use chirp::*;
pub use refresh_token::*;
pub use user::*;

/// Application state shared across all handlers
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    pub sessions: SessionService,
}

impl AppState {
    pub fn new(db: SqlitePool, config: Config, clock: Arc<dyn Clock>) -> Self {
        let sessions = SessionService::new(&config, db.clone(), clock);
        Self {
            db,
            config,
            sessions,
        }
    }
}
