use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    error::{ErrorKind, WriteFailure},
    options::ReturnDocument,
};

use super::{MongoDB, BOOKS, USERS};
use crate::models::{Book, BookFilter, Review, ReviewPatch, User, EMAIL_TAKEN};
use crate::utils::{text::escape_regex, AppError};

const DUPLICATE_KEY: i32 = 11000;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Fails with `BadRequest(EMAIL_TAKEN)` when the email is already stored
    async fn insert(&self, user: &User) -> Result<(), AppError>;
}

#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn insert(&self, book: &Book) -> Result<(), AppError>;

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<Book>, AppError>;

    /// Book holding the embedded review with this id
    async fn find_by_review_id(&self, review_id: &ObjectId) -> Result<Option<Book>, AppError>;

    /// One page of books without their reviews, in insertion order
    async fn list(&self, filter: &BookFilter, skip: u64, limit: u64) -> Result<Vec<Book>, AppError>;

    async fn count(&self, filter: &BookFilter) -> Result<u64, AppError>;

    /// Books whose title or author contains `query`, without their reviews
    async fn search(&self, query: &str) -> Result<Vec<Book>, AppError>;

    /// Appends `review` and refreshes the average. `None` when the book is
    /// missing or already holds a review by the same user.
    async fn push_review(&self, book_id: &ObjectId, review: &Review) -> Result<Option<Book>, AppError>;

    /// Patches the review only while it still belongs to `user`
    async fn update_review(
        &self,
        review_id: &ObjectId,
        user: &ObjectId,
        patch: &ReviewPatch,
    ) -> Result<Option<Book>, AppError>;

    /// Removes the review only while it still belongs to `user`
    async fn pull_review(&self, review_id: &ObjectId, user: &ObjectId) -> Result<Option<Book>, AppError>;

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref e)) if e.code == DUPLICATE_KEY
    )
}

fn contains_pattern(value: &str) -> Document {
    doc! { "$regex": escape_regex(value), "$options": "i" }
}

fn list_filter(filter: &BookFilter) -> Document {
    let mut query = Document::new();
    if let Some(author) = &filter.author {
        query.insert("author", contains_pattern(author));
    }
    if let Some(genre) = &filter.genre {
        query.insert("genre", contains_pattern(genre));
    }
    query
}

fn summary_projection() -> Document {
    doc! { "title": 1, "author": 1, "genre": 1, "averageRating": 1 }
}

fn owned_review(review_id: &ObjectId, user: &ObjectId) -> Document {
    doc! { "reviews": { "$elemMatch": { "_id": review_id, "user": user } } }
}

fn review_patch_update(patch: &ReviewPatch) -> Document {
    let mut set = doc! { "reviews.$.updatedAt": patch.updated_at };
    if let Some(rating) = patch.rating {
        set.insert("reviews.$.rating", rating);
    }
    if let Some(comment) = &patch.comment {
        set.insert("reviews.$.comment", comment.as_str());
    }
    doc! { "$set": set }
}

/// Mean of `reviews.rating` rounded half up to two decimals, 0 when empty
fn average_pipeline() -> Vec<Document> {
    vec![doc! {
        "$set": {
            "averageRating": {
                "$cond": [
                    { "$gt": [{ "$size": { "$ifNull": ["$reviews", []] } }, 0] },
                    {
                        "$divide": [
                            { "$floor": { "$add": [{ "$multiply": [{ "$avg": "$reviews.rating" }, 100] }, 0.5] } },
                            100
                        ]
                    },
                    0.0
                ]
            }
        }
    }]
}

impl MongoDB {
    /// Recomputes `averageRating` from the stored reviews; returns the updated book
    async fn refresh_average(&self, book_id: &ObjectId) -> Result<Option<Book>, AppError> {
        let book = self
            .collection::<Book>(BOOKS)
            .find_one_and_update(doc! { "_id": book_id }, average_pipeline())
            .return_document(ReturnDocument::After)
            .await?;
        Ok(book)
    }
}

#[async_trait]
impl UserRepository for MongoDB {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = self
            .collection::<User>(USERS)
            .find_one(doc! { "email": email })
            .await?;
        Ok(user)
    }

    async fn insert(&self, user: &User) -> Result<(), AppError> {
        match self.collection::<User>(USERS).insert_one(user).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(AppError::BadRequest(EMAIL_TAKEN.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl BookRepository for MongoDB {
    async fn insert(&self, book: &Book) -> Result<(), AppError> {
        self.collection::<Book>(BOOKS).insert_one(book).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<Book>, AppError> {
        let book = self
            .collection::<Book>(BOOKS)
            .find_one(doc! { "_id": id })
            .await?;
        Ok(book)
    }

    async fn find_by_review_id(&self, review_id: &ObjectId) -> Result<Option<Book>, AppError> {
        let book = self
            .collection::<Book>(BOOKS)
            .find_one(doc! { "reviews._id": review_id })
            .await?;
        Ok(book)
    }

    async fn list(&self, filter: &BookFilter, skip: u64, limit: u64) -> Result<Vec<Book>, AppError> {
        let cursor = self
            .collection::<Book>(BOOKS)
            .find(list_filter(filter))
            .projection(summary_projection())
            .sort(doc! { "_id": 1 })
            .skip(skip)
            .limit(limit as i64)
            .await?;

        let books: Vec<Book> = cursor.try_collect().await?;
        Ok(books)
    }

    async fn count(&self, filter: &BookFilter) -> Result<u64, AppError> {
        let total = self
            .collection::<Book>(BOOKS)
            .count_documents(list_filter(filter))
            .await?;
        Ok(total)
    }

    async fn search(&self, query: &str) -> Result<Vec<Book>, AppError> {
        let pattern = contains_pattern(query);
        let cursor = self
            .collection::<Book>(BOOKS)
            .find(doc! {
                "$or": [
                    { "title": pattern.clone() },
                    { "author": pattern }
                ]
            })
            .projection(summary_projection())
            .sort(doc! { "_id": 1 })
            .await?;

        let books: Vec<Book> = cursor.try_collect().await?;
        Ok(books)
    }

    async fn push_review(&self, book_id: &ObjectId, review: &Review) -> Result<Option<Book>, AppError> {
        let encoded = mongodb::bson::to_bson(review)
            .map_err(|e| AppError::Internal(format!("Failed to encode review: {}", e)))?;

        // The owner check and the push are one server-side update
        let result = self
            .collection::<Book>(BOOKS)
            .update_one(
                doc! { "_id": book_id, "reviews.user": { "$ne": review.user } },
                doc! { "$push": { "reviews": encoded } },
            )
            .await?;

        if result.matched_count == 0 {
            return Ok(None);
        }
        self.refresh_average(book_id).await
    }

    async fn update_review(
        &self,
        review_id: &ObjectId,
        user: &ObjectId,
        patch: &ReviewPatch,
    ) -> Result<Option<Book>, AppError> {
        let book = self
            .collection::<Book>(BOOKS)
            .find_one_and_update(owned_review(review_id, user), review_patch_update(patch))
            .await?;

        match book {
            Some(book) => self.refresh_average(&book.id).await,
            None => Ok(None),
        }
    }

    async fn pull_review(&self, review_id: &ObjectId, user: &ObjectId) -> Result<Option<Book>, AppError> {
        let book = self
            .collection::<Book>(BOOKS)
            .find_one_and_update(
                owned_review(review_id, user),
                doc! { "$pull": { "reviews": { "_id": review_id } } },
            )
            .await?;

        match book {
            Some(book) => self.refresh_average(&book.id).await,
            None => Ok(None),
        }
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.health_check().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_filter_escapes_input() {
        let filter = BookFilter::new(Some("J.R.R."), None);
        let query = list_filter(&filter);
        let author = query.get_document("author").unwrap();
        assert_eq!(author.get_str("$regex").unwrap(), "J\\.R\\.R\\.");
        assert_eq!(author.get_str("$options").unwrap(), "i");
        assert!(!query.contains_key("genre"));
    }

    #[test]
    fn test_review_filter_pins_the_owner() {
        let (review, user) = (ObjectId::new(), ObjectId::new());
        let filter = owned_review(&review, &user);
        let matcher = filter
            .get_document("reviews")
            .unwrap()
            .get_document("$elemMatch")
            .unwrap();
        assert_eq!(matcher.get_object_id("_id").unwrap(), review);
        assert_eq!(matcher.get_object_id("user").unwrap(), user);
    }

    #[test]
    fn test_patch_sets_only_provided_fields() {
        let patch = ReviewPatch {
            rating: None,
            comment: Some("Reread".into()),
            updated_at: 7,
        };
        let update = review_patch_update(&patch);
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_i64("reviews.$.updatedAt").unwrap(), 7);
        assert_eq!(set.get_str("reviews.$.comment").unwrap(), "Reread");
        assert!(!set.contains_key("reviews.$.rating"));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(list_filter(&BookFilter::default()).is_empty());
    }
}
