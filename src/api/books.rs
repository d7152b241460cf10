use actix_web::{web, HttpResponse};

use crate::api::AppState;
use crate::middleware::auth::Claims;
use crate::models::{
    AddReviewRequest, BookListResponse, BookResponse, CreateBookRequest, ListBooksQuery,
    ReviewAddedResponse, ReviewDeletedResponse, SearchQuery, SearchResponse, UpdateReviewRequest,
};
use crate::services::book_service;
use crate::utils::AppError;

#[utoipa::path(
    post,
    path = "/api/books",
    tag = "Books",
    request_body = CreateBookRequest,
    responses(
        (status = 201, description = "Book created", body = BookResponse),
        (status = 400, description = "Missing title, author or genre"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("auth_token" = []))
)]
pub async fn create_book(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
    request: web::Json<CreateBookRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("📚 POST /books - user: {}", user.sub);

    let book = book_service::create_book(state.books.as_ref(), &request).await?;
    Ok(HttpResponse::Created().json(BookResponse::from(book)))
}

#[utoipa::path(
    get,
    path = "/api/books",
    tag = "Books",
    params(ListBooksQuery),
    responses(
        (status = 200, description = "One page of books", body = BookListResponse)
    )
)]
pub async fn list_books(
    state: web::Data<AppState>,
    query: web::Query<ListBooksQuery>,
) -> Result<HttpResponse, AppError> {
    log::info!(
        "📚 GET /books - page: {}, limit: {}, author: {}, genre: {}",
        query.page.as_deref().unwrap_or("-"),
        query.limit.as_deref().unwrap_or("-"),
        query.author.as_deref().unwrap_or("-"),
        query.genre.as_deref().unwrap_or("-")
    );

    let response = book_service::list_books(state.books.as_ref(), &query).await?;
    log::info!("✅ Books retrieved: {} of {}", response.books.len(), response.total_books);
    Ok(HttpResponse::Ok().json(response))
}

#[utoipa::path(
    get,
    path = "/api/books/search",
    tag = "Books",
    params(SearchQuery),
    responses(
        (status = 200, description = "Books whose title or author match", body = SearchResponse),
        (status = 400, description = "Query parameter is required")
    )
)]
pub async fn search_books(
    state: web::Data<AppState>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, AppError> {
    log::info!("🔍 GET /books/search - query: {}", query.query.as_deref().unwrap_or("-"));

    let response = book_service::search_books(state.books.as_ref(), query.query.as_deref()).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[utoipa::path(
    get,
    path = "/api/books/{id}",
    tag = "Books",
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 200, description = "Book with its reviews", body = BookResponse),
        (status = 400, description = "Invalid book ID"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let book_id = path.into_inner();
    log::info!("📖 GET /books/{}", book_id);

    match book_service::get_book(state.books.as_ref(), &book_id).await {
        Ok(book) => Ok(HttpResponse::Ok().json(BookResponse::from(book))),
        Err(e) => {
            log::warn!("⚠️ Book {} not returned: {}", book_id, e);
            Err(e)
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/books/{id}/reviews",
    tag = "Reviews",
    params(("id" = String, Path, description = "Book id")),
    request_body = AddReviewRequest,
    responses(
        (status = 200, description = "Review added", body = ReviewAddedResponse),
        (status = 400, description = "Invalid rating or book already reviewed by this user"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Book not found")
    ),
    security(("auth_token" = []))
)]
pub async fn add_review(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
    path: web::Path<String>,
    request: web::Json<AddReviewRequest>,
) -> Result<HttpResponse, AppError> {
    let book_id = path.into_inner();
    log::info!("⭐ POST /books/{}/reviews - user: {}", book_id, user.sub);

    let user_id = user.user_id()?;
    match book_service::add_review(state.books.as_ref(), &book_id, &user_id, &request).await {
        Ok(book) => Ok(HttpResponse::Ok().json(ReviewAddedResponse {
            message: "Review added successfully".to_string(),
            book: BookResponse::from(book),
        })),
        Err(e) => {
            log::warn!("❌ Review not added to {}: {}", book_id, e);
            Err(e)
        }
    }
}

#[utoipa::path(
    put,
    path = "/api/books/reviews/{id}",
    tag = "Reviews",
    params(("id" = String, Path, description = "Review id")),
    request_body = UpdateReviewRequest,
    responses(
        (status = 200, description = "Review updated", body = BookResponse),
        (status = 400, description = "Invalid rating"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Review belongs to another user"),
        (status = 404, description = "Review not found")
    ),
    security(("auth_token" = []))
)]
pub async fn update_review(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
    path: web::Path<String>,
    request: web::Json<UpdateReviewRequest>,
) -> Result<HttpResponse, AppError> {
    let review_id = path.into_inner();
    log::info!("✏️ PUT /books/reviews/{} - user: {}", review_id, user.sub);

    let user_id = user.user_id()?;
    match book_service::update_review(state.books.as_ref(), &review_id, &user_id, &request).await {
        Ok(book) => Ok(HttpResponse::Ok().json(BookResponse::from(book))),
        Err(e) => {
            log::warn!("❌ Review {} not updated: {}", review_id, e);
            Err(e)
        }
    }
}

#[utoipa::path(
    delete,
    path = "/api/books/reviews/{id}",
    tag = "Reviews",
    params(("id" = String, Path, description = "Review id")),
    responses(
        (status = 200, description = "Review deleted", body = ReviewDeletedResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Review belongs to another user"),
        (status = 404, description = "Review not found")
    ),
    security(("auth_token" = []))
)]
pub async fn delete_review(
    state: web::Data<AppState>,
    user: web::ReqData<Claims>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let review_id = path.into_inner();
    log::info!("🗑️ DELETE /books/reviews/{} - user: {}", review_id, user.sub);

    let user_id = user.user_id()?;
    match book_service::delete_review(state.books.as_ref(), &review_id, &user_id).await {
        Ok(book) => Ok(HttpResponse::Ok().json(ReviewDeletedResponse {
            success: "Review deleted".to_string(),
            book: BookResponse::from(book),
        })),
        Err(e) => {
            log::warn!("❌ Review {} not deleted: {}", review_id, e);
            Err(e)
        }
    }
}
