use actix_web::{web, HttpRequest, HttpResponse, Result};
use shared::{ApiError, ApiSuccess, LoginRequest, LoginResponse, RefreshResponse};

use super::{auth_error_response, internal_error};
use crate::middleware::auth::{extract_credential, Scheme};
use crate::models::AppState;
use crate::services::auth::AuthError;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/login", web::post().to(login))
        .route("/refresh", web::post().to(refresh))
        .route("/revoke", web::post().to(revoke));
}

async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    let request = body.into_inner();

    match state.sessions.login(&request.email, &request.password).await {
        Ok((user, session)) => match user.to_shared() {
            Ok(user) => Ok(HttpResponse::Ok().json(ApiSuccess::new(LoginResponse {
                user,
                token: session.access_token,
                refresh_token: session.refresh_token,
            }))),
            Err(e) => {
                log::error!("Stored user id is invalid: {:?}", e);
                Ok(internal_error("Failed to load user"))
            }
        },
        Err(AuthError::StoreUnavailable) => Ok(auth_error_response(&AuthError::StoreUnavailable)),
        Err(e) => {
            if matches!(e, AuthError::InvalidCredentials) {
                log::warn!("Failed login attempt");
            } else {
                log::error!("Login error: {:?}", e);
            }
            // Same answer for unknown account, wrong password and internal faults.
            Ok(HttpResponse::Unauthorized().json(ApiError {
                error: "authentication_error".to_string(),
                message: "Incorrect email or password".to_string(),
            }))
        }
    }
}

async fn refresh(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let refresh_token = match extract_credential(req.headers(), Scheme::Bearer) {
        Ok(token) => token,
        Err(e) => return Ok(auth_error_response(&e)),
    };

    match state.sessions.refresh_session(&refresh_token).await {
        Ok(token) => Ok(HttpResponse::Ok().json(ApiSuccess::new(RefreshResponse { token }))),
        Err(e) => Ok(auth_error_response(&e)),
    }
}

async fn revoke(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let refresh_token = match extract_credential(req.headers(), Scheme::Bearer) {
        Ok(token) => token,
        Err(e) => return Ok(auth_error_response(&e)),
    };

    match state.sessions.revoke_session(&refresh_token).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(auth_error_response(&e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::insert_test_user;
    use crate::handlers::configure_routes;
    use crate::handlers::test_support::test_state;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use shared::{CreateUserRequest, User};

    #[actix_web::test]
    async fn test_login_refresh_revoke_flow() {
        let state = test_state().await;
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/users")
            .set_json(CreateUserRequest {
                email: "flow@example.com".to_string(),
                password: "pa55word".to_string(),
            })
            .to_request();
        let created: ApiSuccess<User> = test::call_and_read_body_json(&app, req).await;

        let req = test::TestRequest::post()
            .uri("/api/login")
            .set_json(LoginRequest {
                email: "flow@example.com".to_string(),
                password: "pa55word".to_string(),
            })
            .to_request();
        let login: ApiSuccess<LoginResponse> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(login.data.user.id, created.data.id);
        assert_eq!(
            state.sessions.verify_access_token(&login.data.token).unwrap(),
            created.data.id
        );

        let bearer = format!("Bearer {}", login.data.refresh_token);

        let req = test::TestRequest::post()
            .uri("/api/refresh")
            .insert_header(("Authorization", bearer.as_str()))
            .to_request();
        let refreshed: ApiSuccess<RefreshResponse> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            state.sessions.verify_access_token(&refreshed.data.token).unwrap(),
            created.data.id
        );

        let req = test::TestRequest::post()
            .uri("/api/revoke")
            .insert_header(("Authorization", bearer.as_str()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

        let req = test::TestRequest::post()
            .uri("/api/refresh")
            .insert_header(("Authorization", bearer.as_str()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: ApiError = test::read_body_json(resp).await;
        assert_eq!(body.error, "token_revoked");
    }

    #[actix_web::test]
    async fn test_login_failures_are_uniform() {
        let state = test_state().await;
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/users")
            .set_json(CreateUserRequest {
                email: "known@example.com".to_string(),
                password: "right-password".to_string(),
            })
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

        // Stored digest that cannot be parsed, so verification fails internally.
        insert_test_user(&state.db, "broken@example.com").await;
        sqlx::query("UPDATE users SET hashed_password = 'not-a-phc-string' WHERE email = ?")
            .bind("broken@example.com")
            .execute(&state.db)
            .await
            .unwrap();
        assert!(matches!(
            state.sessions.login("broken@example.com", "right-password").await,
            Err(AuthError::HashingFailure)
        ));

        let mut bodies = Vec::new();
        for (email, password) in [
            ("known@example.com", "wrong-password"),
            ("unknown@example.com", "right-password"),
            ("broken@example.com", "right-password"),
        ] {
            let req = test::TestRequest::post()
                .uri("/api/login")
                .set_json(LoginRequest {
                    email: email.to_string(),
                    password: password.to_string(),
                })
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
            let body: ApiError = test::read_body_json(resp).await;
            bodies.push((body.error, body.message));
        }

        assert_eq!(bodies[0], bodies[1]);
        assert_eq!(bodies[0], bodies[2]);
        assert_eq!(bodies[0].1, "Incorrect email or password");
    }

    #[actix_web::test]
    async fn test_refresh_requires_bearer_scheme() {
        let state = test_state().await;
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post().uri("/api/refresh").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: ApiError = test::read_body_json(resp).await;
        assert_eq!(body.error, "missing_authorization");

        let req = test::TestRequest::post()
            .uri("/api/refresh")
            .insert_header(("Authorization", "ApiKey abc"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        let body: ApiError = test::read_body_json(resp).await;
        assert_eq!(body.error, "malformed_authorization");
    }

    #[actix_web::test]
    async fn test_revoke_unknown_token() {
        let state = test_state().await;
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/revoke")
            .insert_header(("Authorization", format!("Bearer {}", "0".repeat(64))))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: ApiError = test::read_body_json(resp).await;
        assert_eq!(body.error, "token_not_found");
    }
}
