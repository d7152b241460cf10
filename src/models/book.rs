use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::utils::{AppError, FieldError};

pub const DEFAULT_PAGE_LIMIT: u64 = 10;
pub const MAX_PAGE_LIMIT: u64 = 50;
pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 5.0;

/// Review embedded in a book document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user: ObjectId,
    pub rating: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Book document (collection `books`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub author: String,
    pub genre: String,
    #[serde(default)]
    pub average_rating: f64,
    /// Omitted by list/search projections
    #[serde(default)]
    pub reviews: Vec<Review>,
}

impl Book {
    pub fn new(title: &str, author: &str, genre: &str) -> Self {
        Book {
            id: ObjectId::new(),
            title: title.trim().to_string(),
            author: author.trim().to_string(),
            genre: genre.trim().to_string(),
            average_rating: 0.0,
            reviews: Vec::new(),
        }
    }

    pub fn review_by(&self, user: &ObjectId) -> Option<&Review> {
        self.reviews.iter().find(|r| &r.user == user)
    }

    pub fn review_mut(&mut self, review_id: &ObjectId) -> Option<&mut Review> {
        self.reviews.iter_mut().find(|r| &r.id == review_id)
    }

    pub fn recompute_average(&mut self) {
        self.average_rating = average_rating(&self.reviews);
    }
}

/// Mean of the ratings rounded to two decimals, 0 when there are no reviews
pub fn average_rating(reviews: &[Review]) -> f64 {
    if reviews.is_empty() {
        return 0.0;
    }
    let sum: f64 = reviews.iter().map(|r| r.rating).sum();
    let mean = sum / reviews.len() as f64;
    (mean * 100.0).round() / 100.0
}

fn validate_rating(rating: f64) -> Option<FieldError> {
    if rating.is_finite() && (MIN_RATING..=MAX_RATING).contains(&rating) {
        None
    } else {
        Some(FieldError::new("rating", "Rating must be between 1.0 and 5.0"))
    }
}

// ==================== REQUESTS ====================

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateBookRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub genre: String,
}

impl CreateBookRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let errors: Vec<FieldError> = [
            ("title", &self.title),
            ("author", &self.author),
            ("genre", &self.genre),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| FieldError::new(field, &format!("{} is required", field)))
        .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct AddReviewRequest {
    pub rating: Option<f64>,
    pub comment: Option<String>,
}

impl AddReviewRequest {
    pub fn validate(&self) -> Result<f64, AppError> {
        let rating = self.rating.unwrap_or(f64::NAN);
        match validate_rating(rating) {
            None => Ok(rating),
            Some(err) => Err(AppError::Validation(vec![err])),
        }
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateReviewRequest {
    pub rating: Option<f64>,
    pub comment: Option<String>,
}

impl UpdateReviewRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        match self.rating.and_then(validate_rating) {
            None => Ok(()),
            Some(err) => Err(AppError::Validation(vec![err])),
        }
    }
}

/// Field changes applied to one stored review
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewPatch {
    pub rating: Option<f64>,
    pub comment: Option<String>,
    pub updated_at: i64,
}

impl ReviewPatch {
    pub fn new(request: &UpdateReviewRequest, updated_at: i64) -> Self {
        ReviewPatch {
            rating: request.rating,
            comment: request.comment.clone(),
            updated_at,
        }
    }

    pub fn apply(&self, review: &mut Review) {
        if let Some(rating) = self.rating {
            review.rating = rating;
        }
        if let Some(comment) = &self.comment {
            review.comment = Some(comment.clone());
        }
        review.updated_at = self.updated_at;
    }
}

/// Raw query string of `GET /api/books`; numbers are parsed leniently
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListBooksQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub author: Option<String>,
    pub genre: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Pagination {
    /// Unparseable or zero values fall back to the defaults, then clamp
    pub fn from_raw(page: Option<&str>, limit: Option<&str>) -> Self {
        let parse = |raw: Option<&str>| {
            raw.and_then(|s| s.trim().parse::<i64>().ok())
                .filter(|n| *n != 0)
        };

        let page = parse(page).unwrap_or(1).max(1) as u64;
        let limit = parse(limit)
            .unwrap_or(DEFAULT_PAGE_LIMIT as i64)
            .clamp(1, MAX_PAGE_LIMIT as i64) as u64;

        Pagination { page, limit }
    }

    /// Saturates at `i64::MAX`, the largest skip the driver accepts
    pub fn skip(&self) -> u64 {
        self.page
            .saturating_sub(1)
            .saturating_mul(self.limit)
            .min(i64::MAX as u64)
    }
}

/// Case-insensitive substring filters for listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookFilter {
    pub author: Option<String>,
    pub genre: Option<String>,
}

impl BookFilter {
    pub fn new(author: Option<&str>, genre: Option<&str>) -> Self {
        let keep = |v: Option<&str>| v.map(str::trim).filter(|s| !s.is_empty()).map(String::from);
        BookFilter {
            author: keep(author),
            genre: keep(genre),
        }
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    pub query: Option<String>,
}

// ==================== RESPONSES ====================

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub id: String,
    pub user: String,
    pub rating: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Review> for ReviewResponse {
    fn from(r: Review) -> Self {
        ReviewResponse {
            id: r.id.to_hex(),
            user: r.user.to_hex(),
            rating: r.rating,
            comment: r.comment,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookResponse {
    pub id: String,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub average_rating: f64,
    pub reviews: Vec<ReviewResponse>,
}

impl From<Book> for BookResponse {
    fn from(b: Book) -> Self {
        BookResponse {
            id: b.id.to_hex(),
            title: b.title,
            author: b.author,
            genre: b.genre,
            average_rating: b.average_rating,
            reviews: b.reviews.into_iter().map(ReviewResponse::from).collect(),
        }
    }
}

/// List/search entry without the embedded reviews
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    pub id: String,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub average_rating: f64,
}

impl From<Book> for BookSummary {
    fn from(b: Book) -> Self {
        BookSummary {
            id: b.id.to_hex(),
            title: b.title,
            author: b.author,
            genre: b.genre,
            average_rating: b.average_rating,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookListResponse {
    pub page: u64,
    pub limit: u64,
    pub total_books: u64,
    pub books: Vec<BookSummary>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SearchResponse {
    pub results: Vec<BookSummary>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ReviewAddedResponse {
    pub message: String,
    pub book: BookResponse,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ReviewDeletedResponse {
    pub success: String,
    pub book: BookResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(rating: f64) -> Review {
        Review {
            id: ObjectId::new(),
            user: ObjectId::new(),
            rating,
            comment: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_average_rating() {
        assert_eq!(average_rating(&[]), 0.0);
        assert_eq!(average_rating(&[review(5.0), review(3.0)]), 4.0);
        assert_eq!(average_rating(&[review(5.0)]), 5.0);
        // 13/3 = 4.333..
        assert_eq!(average_rating(&[review(5.0), review(4.0), review(4.0)]), 4.33);
        assert_eq!(average_rating(&[review(4.5), review(4.0), review(4.0)]), 4.17);
    }

    #[test]
    fn test_pagination_clamps() {
        assert_eq!(Pagination::from_raw(None, None), Pagination { page: 1, limit: 10 });
        assert_eq!(Pagination::from_raw(Some("0"), Some("100")), Pagination { page: 1, limit: 50 });
        assert_eq!(Pagination::from_raw(Some("-3"), Some("-5")), Pagination { page: 1, limit: 1 });
        assert_eq!(Pagination::from_raw(Some("abc"), Some("xyz")), Pagination { page: 1, limit: 10 });
        assert_eq!(Pagination::from_raw(Some("3"), Some("0")), Pagination { page: 3, limit: 10 });
        assert_eq!(Pagination::from_raw(Some("3"), Some("20")).skip(), 40);

        let huge = Pagination::from_raw(Some("9223372036854775807"), Some("50"));
        assert_eq!(huge.page, i64::MAX as u64);
        assert_eq!(huge.skip(), i64::MAX as u64);
    }

    #[test]
    fn test_rating_bounds() {
        let add = |rating| AddReviewRequest { rating, comment: None };
        assert_eq!(add(Some(1.0)).validate().unwrap(), 1.0);
        assert_eq!(add(Some(4.5)).validate().unwrap(), 4.5);
        assert!(add(Some(0.5)).validate().is_err());
        assert!(add(Some(5.1)).validate().is_err());
        assert!(add(None).validate().is_err());

        let update = |rating| UpdateReviewRequest { rating, comment: None };
        assert!(update(None).validate().is_ok());
        assert!(update(Some(6.0)).validate().is_err());
    }

    #[test]
    fn test_review_patch_keeps_unset_fields() {
        let mut stored = review(2.0);
        stored.comment = Some("Slow start".into());

        let request = UpdateReviewRequest { rating: Some(4.0), comment: None };
        ReviewPatch::new(&request, 42).apply(&mut stored);
        assert_eq!(stored.rating, 4.0);
        assert_eq!(stored.comment.as_deref(), Some("Slow start"));
        assert_eq!(stored.updated_at, 42);
    }

    #[test]
    fn test_create_book_requires_all_fields() {
        let request = CreateBookRequest {
            title: "Dune".into(),
            author: "  ".into(),
            genre: String::new(),
        };
        match request.validate() {
            Err(AppError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["author", "genre"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_filter_drops_blank_values() {
        let filter = BookFilter::new(Some("  "), Some("Fantasy "));
        assert_eq!(filter.author, None);
        assert_eq!(filter.genre.as_deref(), Some("Fantasy"));
    }

    #[test]
    fn test_response_ids_are_hex() {
        let mut book = Book::new("Dune", "Frank Herbert", "Sci-Fi");
        book.reviews.push(review(4.0));
        let id = book.id.to_hex();
        let json = serde_json::to_value(BookResponse::from(book)).unwrap();
        assert_eq!(json["id"], id);
        assert!(json["reviews"][0]["user"].is_string());
        assert_eq!(json["averageRating"], 0.0);
    }
}
