mod api;
mod config;
mod database;
mod middleware;
mod models;
mod services;
mod utils;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::AppState;
use crate::database::{BookRepository, InMemoryStore, MongoDB, UserRepository};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = config::Config::from_env()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;

    log::info!("🚀 Starting Book Review Service...");

    let (users, books): (Arc<dyn UserRepository>, Arc<dyn BookRepository>) =
        if config.uses_memory_store() {
            log::warn!("⚠️  Using in-memory store, data is lost on restart");
            let store = Arc::new(InMemoryStore::new());
            (store.clone() as Arc<dyn UserRepository>, store as Arc<dyn BookRepository>)
        } else {
            let db = MongoDB::new(&config.database_url)
                .await
                .map_err(|e| std::io::Error::other(format!("Failed to connect to MongoDB: {}", e)))?;
            log::info!("✅ MongoDB connected successfully");
            let db = Arc::new(db);
            (db.clone() as Arc<dyn UserRepository>, db as Arc<dyn BookRepository>)
        };

    let state = web::Data::new(AppState {
        users,
        books,
        auth: config.auth.clone(),
    });

    log::info!("🌐 Server starting on {}:{}", config.host, config.port);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", config.host, config.port);

    let openapi = api::swagger::ApiDoc::openapi();

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::ACCEPT,
                actix_web::http::header::HeaderName::from_static(middleware::auth::AUTH_TOKEN_HEADER),
            ])
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .app_data(api::json_config())
            .app_data(api::query_config())
            .wrap(cors)
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
            .configure(api::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
