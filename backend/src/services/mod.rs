pub mod access_tokens;
pub mod auth;
pub mod authorization;
pub mod chirps;
pub mod clock;
pub mod password;
pub mod refresh_tokens;
pub mod users;
