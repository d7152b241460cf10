use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use crate::api::AppState;

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub database: String,
    pub timestamp: i64,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is up; `database` reports store reachability", body = HealthResponse)
    )
)]
pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let (status, database) = match state.books.ping().await {
        Ok(()) => ("healthy", "up"),
        Err(e) => {
            log::error!("❌ Health check: database unreachable - {}", e);
            ("degraded", "down")
        }
    };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        service: "book-review-service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}
