use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Book Review Service API",
        version = "1.0.0",
        description = "Books, embedded reviews and average ratings.\n\n**Authentication:** signup/login return an `authToken`; send it in the `auth-token` header (or as `Authorization: Bearer`) on every write under `/api/books`. Reads are public."
    ),
    paths(
        // Auth
        crate::api::auth::signup,
        crate::api::auth::login,

        // Books
        crate::api::books::create_book,
        crate::api::books::list_books,
        crate::api::books::search_books,
        crate::api::books::get_book,

        // Reviews
        crate::api::books::add_review,
        crate::api::books::update_review,
        crate::api::books::delete_review,

        // Health
        crate::api::health::health_check,
    ),
    components(
        schemas(
            crate::models::SignupRequest,
            crate::models::LoginRequest,
            crate::models::AuthResponse,
            crate::models::UserInfo,
            crate::models::CreateBookRequest,
            crate::models::AddReviewRequest,
            crate::models::UpdateReviewRequest,
            crate::models::BookResponse,
            crate::models::ReviewResponse,
            crate::models::BookSummary,
            crate::models::BookListResponse,
            crate::models::SearchResponse,
            crate::models::ReviewAddedResponse,
            crate::models::ReviewDeletedResponse,
            crate::utils::FieldError,
            crate::api::health::HealthResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Signup and login. Both return a signed token."),
        (name = "Books", description = "Create, list, search and fetch books."),
        (name = "Reviews", description = "One review per user per book; every change recomputes the book's average rating."),
        (name = "Health", description = "Liveness and database reachability."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "auth_token",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    crate::middleware::auth::AUTH_TOKEN_HEADER,
                    "Token returned by signup/login",
                ))),
            );
        }
    }
}
