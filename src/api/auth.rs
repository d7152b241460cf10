use actix_web::{web, HttpResponse, ResponseError};

use crate::api::AppState;
use crate::models::{AuthResponse, LoginRequest, SignupRequest};
use crate::services::auth_service;

#[utoipa::path(
    post,
    path = "/api/auth/signup",
    tag = "Auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Signup successful", body = AuthResponse),
        (status = 400, description = "Invalid fields or email already registered")
    )
)]
pub async fn signup(
    state: web::Data<AppState>,
    request: web::Json<SignupRequest>,
) -> HttpResponse {
    log::info!("📝 POST /auth/signup - email: {}", request.email);

    match auth_service::signup(state.users.as_ref(), &state.auth, &request).await {
        Ok(response) => HttpResponse::Created().json(response),
        Err(e) => {
            log::warn!("❌ Signup failed: {} - {}", request.email, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Invalid fields"),
        (status = 401, description = "Email not registered or incorrect password")
    )
)]
pub async fn login(
    state: web::Data<AppState>,
    request: web::Json<LoginRequest>,
) -> HttpResponse {
    log::info!("🔐 POST /auth/login - email: {}", request.email);

    match auth_service::login(state.users.as_ref(), &state.auth, &request).await {
        Ok(response) => {
            log::info!("✅ Login successful: {}", request.email);
            HttpResponse::Ok().json(response)
        }
        Err(e) => {
            log::warn!("❌ Login failed: {} - {}", request.email, e);
            e.error_response()
        }
    }
}
