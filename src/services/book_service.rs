use crate::{
    database::BookRepository,
    models::{
        AddReviewRequest, Book, BookFilter, BookListResponse, BookSummary, CreateBookRequest,
        ListBooksQuery, Pagination, Review, ReviewPatch, SearchResponse, UpdateReviewRequest,
    },
    utils::AppError,
};
use mongodb::bson::oid::ObjectId;

pub const ALREADY_REVIEWED: &str = "You have already reviewed this book";

fn parse_id(raw: &str, what: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(raw.trim()).map_err(|_| AppError::BadRequest(format!("Invalid {} ID", what)))
}

fn book_not_found() -> AppError {
    AppError::NotFound("Book not found".to_string())
}

fn review_not_found() -> AppError {
    AppError::NotFound("Review not found".to_string())
}

pub async fn create_book(
    books: &dyn BookRepository,
    request: &CreateBookRequest,
) -> Result<Book, AppError> {
    request.validate()?;

    let book = Book::new(&request.title, &request.author, &request.genre);
    books.insert(&book).await?;

    log::info!("📚 Book created: {} ({})", book.title, book.id);
    Ok(book)
}

pub async fn list_books(
    books: &dyn BookRepository,
    query: &ListBooksQuery,
) -> Result<BookListResponse, AppError> {
    let pagination = Pagination::from_raw(query.page.as_deref(), query.limit.as_deref());
    let filter = BookFilter::new(query.author.as_deref(), query.genre.as_deref());

    let total_books = books.count(&filter).await?;
    let page = books
        .list(&filter, pagination.skip(), pagination.limit)
        .await?;

    Ok(BookListResponse {
        page: pagination.page,
        limit: pagination.limit,
        total_books,
        books: page.into_iter().map(BookSummary::from).collect(),
    })
}

pub async fn search_books(
    books: &dyn BookRepository,
    query: Option<&str>,
) -> Result<SearchResponse, AppError> {
    let query = query.map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Err(AppError::BadRequest("Query parameter is required".to_string()));
    }

    let results = books.search(query).await?;
    Ok(SearchResponse {
        results: results.into_iter().map(BookSummary::from).collect(),
    })
}

pub async fn get_book(books: &dyn BookRepository, book_id: &str) -> Result<Book, AppError> {
    let id = parse_id(book_id, "book")?;
    books.find_by_id(&id).await?.ok_or_else(book_not_found)
}

pub async fn add_review(
    books: &dyn BookRepository,
    book_id: &str,
    user_id: &ObjectId,
    request: &AddReviewRequest,
) -> Result<Book, AppError> {
    let rating = request.validate()?;
    let id = parse_id(book_id, "book")?;

    let now = chrono::Utc::now().timestamp_millis();
    let review = Review {
        id: ObjectId::new(),
        user: *user_id,
        rating,
        comment: request.comment.clone(),
        created_at: now,
        updated_at: now,
    };

    let book = match books.push_review(&id, &review).await? {
        Some(book) => book,
        // Nothing matched: either the book is gone or this user already reviewed it
        None => {
            books.find_by_id(&id).await?.ok_or_else(book_not_found)?;
            return Err(AppError::BadRequest(ALREADY_REVIEWED.to_string()));
        }
    };

    log::info!("⭐ Review added to {} (average {:.2})", book.id, book.average_rating);
    Ok(book)
}

/// Tells a missing review (404) apart from someone else's (403)
async fn check_review_owner(
    books: &dyn BookRepository,
    review_id: &ObjectId,
    user_id: &ObjectId,
    action: &str,
) -> Result<(), AppError> {
    let book = books
        .find_by_review_id(review_id)
        .await?
        .ok_or_else(review_not_found)?;

    let owner = book
        .reviews
        .iter()
        .find(|r| &r.id == review_id)
        .map(|r| r.user)
        .ok_or_else(review_not_found)?;

    if &owner != user_id {
        log::warn!("🚫 User {} tried to {} review {} owned by {}", user_id, action, review_id, owner);
        return Err(AppError::Forbidden(format!("Not allowed to {} this review", action)));
    }

    Ok(())
}

pub async fn update_review(
    books: &dyn BookRepository,
    review_id: &str,
    user_id: &ObjectId,
    request: &UpdateReviewRequest,
) -> Result<Book, AppError> {
    request.validate()?;
    let review_id = parse_id(review_id, "review")?;

    check_review_owner(books, &review_id, user_id, "update").await?;

    let patch = ReviewPatch::new(request, chrono::Utc::now().timestamp_millis());
    // The write itself re-checks ownership; a review deleted in between is a 404
    books
        .update_review(&review_id, user_id, &patch)
        .await?
        .ok_or_else(review_not_found)
}

pub async fn delete_review(
    books: &dyn BookRepository,
    review_id: &str,
    user_id: &ObjectId,
) -> Result<Book, AppError> {
    let review_id = parse_id(review_id, "review")?;

    check_review_owner(books, &review_id, user_id, "delete").await?;

    let book = books
        .pull_review(&review_id, user_id)
        .await?
        .ok_or_else(review_not_found)?;

    log::info!("🗑️ Review {} deleted from {}", review_id, book.id);
    Ok(book)
}
