use actix_web::{web, HttpResponse};
use shared::ApiError;

use crate::services::auth::AuthError;

pub mod admin;
pub mod auth;
pub mod chirps;
pub mod health;
pub mod users;
pub mod webhooks;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .configure(health::configure)
            .configure(auth::configure)
            .configure(users::configure)
            .configure(chirps::configure)
            .configure(webhooks::configure),
    )
    .service(web::scope("/admin").configure(admin::configure));
}

/// Map an authentication failure onto its HTTP response. Faults get a generic
/// message; nothing here ever echoes a credential.
pub fn auth_error_response(err: &AuthError) -> HttpResponse {
    let (mut builder, message) = match err {
        AuthError::Forbidden => (HttpResponse::Forbidden(), err.to_string()),
        AuthError::StoreUnavailable => {
            log::error!("Auth store unavailable");
            (
                HttpResponse::ServiceUnavailable(),
                "Service temporarily unavailable".to_string(),
            )
        }
        AuthError::HashingFailure | AuthError::TokenCreation | AuthError::DatabaseError(_) => {
            log::error!("Internal auth error: {}", err);
            (
                HttpResponse::InternalServerError(),
                "Internal server error".to_string(),
            )
        }
        _ => {
            log::debug!("Rejected credential: {}", err);
            (HttpResponse::Unauthorized(), err.to_string())
        }
    };

    builder.json(ApiError {
        error: err.code().to_string(),
        message,
    })
}

pub(crate) fn internal_error(message: &str) -> HttpResponse {
    HttpResponse::InternalServerError().json(ApiError {
        error: "internal_error".to_string(),
        message: message.to_string(),
    })
}
