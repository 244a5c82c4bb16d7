use actix_web::{web, HttpRequest, HttpResponse, Result};
use shared::{ApiError, ApiSuccess, CreateUserRequest, UpdateUserRequest};

use super::{auth_error_response, internal_error};
use crate::middleware::auth::extract_user_id;
use crate::models::AppState;
use crate::services::users::{self as user_service, UserError};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/users")
            .route(web::post().to(create_user))
            .route(web::put().to(update_user)),
    );
}

fn validation_error(email: &str, password: &str) -> Option<HttpResponse> {
    if email.trim().is_empty() || password.is_empty() {
        return Some(HttpResponse::BadRequest().json(ApiError {
            error: "validation_error".to_string(),
            message: "Email and password are required".to_string(),
        }));
    }
    None
}

fn user_error_response(e: &UserError) -> HttpResponse {
    match e {
        UserError::AlreadyExists => HttpResponse::Conflict().json(ApiError {
            error: "user_exists".to_string(),
            message: e.to_string(),
        }),
        UserError::NotFound => HttpResponse::NotFound().json(ApiError {
            error: "not_found".to_string(),
            message: e.to_string(),
        }),
        _ => {
            log::error!("User error: {:?}", e);
            internal_error("Failed to save user")
        }
    }
}

async fn create_user(
    state: web::Data<AppState>,
    body: web::Json<CreateUserRequest>,
) -> Result<HttpResponse> {
    let request = body.into_inner();

    if let Some(response) = validation_error(&request.email, &request.password) {
        return Ok(response);
    }

    match user_service::register_user(&state.db, &request).await {
        Ok(user) => {
            log::info!("Registered user {}", user.id);
            Ok(HttpResponse::Created().json(ApiSuccess::new(user)))
        }
        Err(e) => Ok(user_error_response(&e)),
    }
}

async fn update_user(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse> {
    let user_id = match extract_user_id(&req, &state.sessions) {
        Ok(id) => id,
        Err(e) => return Ok(auth_error_response(&e)),
    };

    let request = body.into_inner();
    if let Some(response) = validation_error(&request.email, &request.password) {
        return Ok(response);
    }

    // Sessions opened with the old password are closed before the new one is
    // stored. A failed update leaves the user logged out, never the reverse.
    if let Err(e) = state.sessions.revoke_all_sessions(&user_id).await {
        log::error!("Could not revoke sessions of user {}: {:?}", user_id, e);
        return Ok(auth_error_response(&e));
    }

    match user_service::update_credentials(&state.db, &user_id, &request).await {
        Ok(user) => Ok(HttpResponse::Ok().json(ApiSuccess::new(user))),
        Err(e) => Ok(user_error_response(&e)),
    }
}
