pub mod auth;
pub mod books;
pub mod health;
pub mod swagger;

use actix_web::web;
use std::sync::Arc;

use crate::{
    config::AuthSettings,
    database::{BookRepository, UserRepository},
    middleware::AuthMiddleware,
    utils::AppError,
};

/// Shared by every worker through `web::Data`
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub books: Arc<dyn BookRepository>,
    pub auth: AuthSettings,
}

/// Malformed JSON bodies are reported in the same shape as other 400s
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        AppError::BadRequest(format!("Invalid JSON body: {}", err)).into()
    })
}

/// Same for query strings that fail to deserialize
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        AppError::BadRequest(format!("Invalid query string: {}", err)).into()
    })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health_check))
        .service(
            web::scope("/api/auth")
                .route("/signup", web::post().to(auth::signup))
                .route("/login", web::post().to(auth::login)),
        )
        // Reads are public; AuthMiddleware only guards writes
        .service(
            web::scope("/api/books")
                .wrap(AuthMiddleware)
                .route("", web::get().to(books::list_books))
                .route("", web::post().to(books::create_book))
                .route("/search", web::get().to(books::search_books))
                .route("/reviews/{id}", web::put().to(books::update_review))
                .route("/reviews/{id}", web::delete().to(books::delete_review))
                .route("/{id}", web::get().to(books::get_book))
                .route("/{id}/reviews", web::post().to(books::add_review)),
        );
}
