use actix_web::{web, HttpResponse, Result};
use shared::{ApiError, ApiSuccess};

use super::internal_error;
use crate::models::AppState;
use crate::services::users as user_service;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/reset", web::post().to(reset));
}

/// Wipe all users. Only available on the dev platform.
async fn reset(state: web::Data<AppState>) -> Result<HttpResponse> {
    if !state.config.is_dev() {
        return Ok(HttpResponse::Forbidden().json(ApiError {
            error: "forbidden".to_string(),
            message: "Reset is only allowed in dev environment".to_string(),
        }));
    }

    match user_service::reset_users(&state.db).await {
        Ok(deleted) => {
            log::warn!("Reset removed {} users", deleted);
            Ok(HttpResponse::Ok().json(ApiSuccess::new(deleted)))
        }
        Err(e) => {
            log::error!("Reset failed: {:?}", e);
            Ok(internal_error("Unable to reset users"))
        }
    }
}
