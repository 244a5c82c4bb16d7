use actix_web::{web, HttpRequest, HttpResponse, Result};
use shared::{ApiError, ApiSuccess, ChirpQuery, CreateChirpRequest};
use uuid::Uuid;

use super::{auth_error_response, internal_error};
use crate::middleware::auth::extract_user_id;
use crate::models::AppState;
use crate::services::authorization::require_ownership;
use crate::services::chirps::{self as chirp_service, ChirpError, MAX_CHIRP_LENGTH};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/chirps")
            .route("", web::post().to(create_chirp))
            .route("", web::get().to(list_chirps))
            .route("/{id}", web::get().to(get_chirp))
            .route("/{id}", web::delete().to(delete_chirp)),
    );
}

fn parse_chirp_id(raw: &str) -> std::result::Result<Uuid, HttpResponse> {
    Uuid::parse_str(raw).map_err(|_| {
        HttpResponse::BadRequest().json(ApiError {
            error: "invalid_id".to_string(),
            message: "Invalid chirp ID format".to_string(),
        })
    })
}

fn chirp_error_response(e: &ChirpError) -> HttpResponse {
    match e {
        ChirpError::TooLong => HttpResponse::BadRequest().json(ApiError {
            error: "validation_error".to_string(),
            message: format!("Chirp must be at most {} characters", MAX_CHIRP_LENGTH),
        }),
        ChirpError::NotFound => HttpResponse::NotFound().json(ApiError {
            error: "not_found".to_string(),
            message: "Chirp not found".to_string(),
        }),
        _ => {
            log::error!("Chirp error: {:?}", e);
            internal_error("Failed to access chirps")
        }
    }
}

async fn create_chirp(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CreateChirpRequest>,
) -> Result<HttpResponse> {
    let author_id = match extract_user_id(&req, &state.sessions) {
        Ok(id) => id,
        Err(e) => return Ok(auth_error_response(&e)),
    };

    match chirp_service::create_chirp(&state.db, &author_id, &body.body).await {
        Ok(chirp) => Ok(HttpResponse::Created().json(ApiSuccess::new(chirp))),
        Err(e) => Ok(chirp_error_response(&e)),
    }
}

async fn list_chirps(
    state: web::Data<AppState>,
    query: web::Query<ChirpQuery>,
) -> Result<HttpResponse> {
    match chirp_service::list_chirps(&state.db, &query).await {
        Ok(chirps) => Ok(HttpResponse::Ok().json(ApiSuccess::new(chirps))),
        Err(e) => Ok(chirp_error_response(&e)),
    }
}

async fn get_chirp(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let chirp_id = match parse_chirp_id(&path.into_inner()) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    match chirp_service::get_chirp(&state.db, &chirp_id).await {
        Ok(chirp) => Ok(HttpResponse::Ok().json(ApiSuccess::new(chirp))),
        Err(e) => Ok(chirp_error_response(&e)),
    }
}

async fn delete_chirp(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let chirp_id = match parse_chirp_id(&path.into_inner()) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    let caller_id = match extract_user_id(&req, &state.sessions) {
        Ok(id) => id,
        Err(e) => return Ok(auth_error_response(&e)),
    };

    let chirp = match chirp_service::get_chirp(&state.db, &chirp_id).await {
        Ok(chirp) => chirp,
        Err(e) => return Ok(chirp_error_response(&e)),
    };

    if let Err(e) = require_ownership(&chirp.user_id, &caller_id) {
        log::warn!("User {} tried to delete chirp {} owned by {}", caller_id, chirp.id, chirp.user_id);
        return Ok(auth_error_response(&e));
    }

    match chirp_service::delete_chirp(&state.db, &chirp_id).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(chirp_error_response(&e)),
    }
}
