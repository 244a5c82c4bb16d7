use actix_web::{web, HttpRequest, HttpResponse, Result};
use shared::{ApiError, WebhookEvent, USER_UPGRADED_EVENT};

use super::{auth_error_response, internal_error};
use crate::middleware::auth::verify_api_key;
use crate::models::AppState;
use crate::services::users::{self as user_service, UserError};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/polka/webhooks", web::post().to(polka_webhook));
}

/// The key is checked before the body is even parsed.
async fn polka_webhook(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse> {
    if let Err(e) = verify_api_key(req.headers(), &state.config.polka_key) {
        log::warn!("Rejected webhook call: {}", e);
        return Ok(auth_error_response(&e));
    }

    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            return Ok(HttpResponse::BadRequest().json(ApiError {
                error: "invalid_payload".to_string(),
                message: format!("Couldn't decode webhook payload: {}", e),
            }));
        }
    };

    if event.event != USER_UPGRADED_EVENT {
        log::debug!("Ignoring webhook event {}", event.event);
        return Ok(HttpResponse::NoContent().finish());
    }

    match user_service::upgrade_to_red(&state.db, &event.data.user_id).await {
        Ok(()) => {
            log::info!("Upgraded user {} to Chirpy Red", event.data.user_id);
            Ok(HttpResponse::NoContent().finish())
        }
        Err(UserError::NotFound) => Ok(HttpResponse::NotFound().json(ApiError {
            error: "not_found".to_string(),
            message: "User not found".to_string(),
        })),
        Err(e) => {
            log::error!("Webhook upgrade failed: {:?}", e);
            Ok(internal_error("Failed to upgrade user"))
        }
    }
}
