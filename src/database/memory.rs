use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::repository::{BookRepository, UserRepository};
use crate::models::{Book, BookFilter, Review, ReviewPatch, User, EMAIL_TAKEN};
use crate::utils::{text::contains_ignore_case, AppError};

/// Process-local store with the same semantics as the MongoDB collections.
/// Selected with `DATABASE_URL=memory://`; data is lost on restart.
#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<Vec<User>>,
    books: RwLock<Vec<Book>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, AppError> {
    lock.read()
        .map_err(|_| AppError::Internal("in-memory store lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, AppError> {
    lock.write()
        .map_err(|_| AppError::Internal("in-memory store lock poisoned".to_string()))
}

fn matches_filter(book: &Book, filter: &BookFilter) -> bool {
    let author_ok = filter
        .author
        .as_deref()
        .map_or(true, |a| contains_ignore_case(&book.author, a));
    let genre_ok = filter
        .genre
        .as_deref()
        .map_or(true, |g| contains_ignore_case(&book.genre, g));
    author_ok && genre_ok
}

fn owns_review(book: &Book, review_id: &ObjectId, user: &ObjectId) -> bool {
    book.reviews.iter().any(|r| &r.id == review_id && &r.user == user)
}

// Mirrors the list/search projection
fn summary(book: &Book) -> Book {
    Book {
        reviews: Vec::new(),
        ..book.clone()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let users = read(&self.users)?;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert(&self, user: &User) -> Result<(), AppError> {
        let mut users = write(&self.users)?;
        if users.iter().any(|u| u.email == user.email) {
            return Err(AppError::BadRequest(EMAIL_TAKEN.to_string()));
        }
        users.push(user.clone());
        Ok(())
    }
}

#[async_trait]
impl BookRepository for InMemoryStore {
    async fn insert(&self, book: &Book) -> Result<(), AppError> {
        write(&self.books)?.push(book.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<Book>, AppError> {
        let books = read(&self.books)?;
        Ok(books.iter().find(|b| &b.id == id).cloned())
    }

    async fn find_by_review_id(&self, review_id: &ObjectId) -> Result<Option<Book>, AppError> {
        let books = read(&self.books)?;
        Ok(books
            .iter()
            .find(|b| b.reviews.iter().any(|r| &r.id == review_id))
            .cloned())
    }

    async fn list(&self, filter: &BookFilter, skip: u64, limit: u64) -> Result<Vec<Book>, AppError> {
        let books = read(&self.books)?;
        Ok(books
            .iter()
            .filter(|b| matches_filter(b, filter))
            .skip(skip as usize)
            .take(limit as usize)
            .map(summary)
            .collect())
    }

    async fn count(&self, filter: &BookFilter) -> Result<u64, AppError> {
        let books = read(&self.books)?;
        Ok(books.iter().filter(|b| matches_filter(b, filter)).count() as u64)
    }

    async fn search(&self, query: &str) -> Result<Vec<Book>, AppError> {
        let books = read(&self.books)?;
        Ok(books
            .iter()
            .filter(|b| contains_ignore_case(&b.title, query) || contains_ignore_case(&b.author, query))
            .map(summary)
            .collect())
    }

    async fn push_review(&self, book_id: &ObjectId, review: &Review) -> Result<Option<Book>, AppError> {
        let mut books = write(&self.books)?;
        let book = match books.iter_mut().find(|b| &b.id == book_id) {
            Some(book) if book.review_by(&review.user).is_none() => book,
            _ => return Ok(None),
        };
        book.reviews.push(review.clone());
        book.recompute_average();
        Ok(Some(book.clone()))
    }

    async fn update_review(
        &self,
        review_id: &ObjectId,
        user: &ObjectId,
        patch: &ReviewPatch,
    ) -> Result<Option<Book>, AppError> {
        let mut books = write(&self.books)?;
        let book = match books.iter_mut().find(|b| owns_review(b, review_id, user)) {
            Some(book) => book,
            None => return Ok(None),
        };
        if let Some(review) = book.review_mut(review_id) {
            patch.apply(review);
        }
        book.recompute_average();
        Ok(Some(book.clone()))
    }

    async fn pull_review(&self, review_id: &ObjectId, user: &ObjectId) -> Result<Option<Book>, AppError> {
        let mut books = write(&self.books)?;
        let book = match books.iter_mut().find(|b| owns_review(b, review_id, user)) {
            Some(book) => book,
            None => return Ok(None),
        };
        book.reviews.retain(|r| &r.id != review_id);
        book.recompute_average();
        Ok(Some(book.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str) -> User {
        User {
            id: ObjectId::new(),
            name: "Reader".into(),
            email: email.into(),
            password: "hash".into(),
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = InMemoryStore::new();
        UserRepository::insert(&store, &user("a@example.com")).await.unwrap();

        match UserRepository::insert(&store, &user("a@example.com")).await {
            Err(AppError::BadRequest(msg)) => assert_eq!(msg, EMAIL_TAKEN),
            other => panic!("expected duplicate error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let store = InMemoryStore::new();
        for (title, author, genre) in [
            ("The Hobbit", "J.R.R. Tolkien", "Fantasy"),
            ("Dune", "Frank Herbert", "Science Fiction"),
            ("The Silmarillion", "J.R.R. Tolkien", "Fantasy"),
        ] {
            BookRepository::insert(&store, &Book::new(title, author, genre)).await.unwrap();
        }

        let tolkien = BookFilter::new(Some("tolkien"), None);
        assert_eq!(store.count(&tolkien).await.unwrap(), 2);

        let page = store.list(&tolkien, 1, 10).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "The Silmarillion");

        let fiction = BookFilter::new(None, Some("FICTION"));
        assert_eq!(store.list(&fiction, 0, 10).await.unwrap()[0].title, "Dune");
    }

    fn review_by(user: ObjectId, rating: f64) -> Review {
        Review {
            id: ObjectId::new(),
            user,
            rating,
            comment: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn test_push_review_keeps_one_per_user() {
        let store = InMemoryStore::new();
        let book = Book::new("Dune", "Frank Herbert", "Science Fiction");
        BookRepository::insert(&store, &book).await.unwrap();
        let (alice, bob) = (ObjectId::new(), ObjectId::new());

        store.push_review(&book.id, &review_by(alice, 5.0)).await.unwrap().unwrap();
        let stored = store.push_review(&book.id, &review_by(bob, 4.0)).await.unwrap().unwrap();
        assert_eq!(stored.reviews.len(), 2);
        assert_eq!(stored.average_rating, 4.5);

        assert!(store.push_review(&book.id, &review_by(alice, 1.0)).await.unwrap().is_none());
        assert!(store.push_review(&ObjectId::new(), &review_by(bob, 1.0)).await.unwrap().is_none());
        assert_eq!(store.find_by_id(&book.id).await.unwrap().unwrap().reviews.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_reviews_are_all_kept() {
        let store = std::sync::Arc::new(InMemoryStore::new());
        let book = Book::new("Dune", "Frank Herbert", "Science Fiction");
        BookRepository::insert(store.as_ref(), &book).await.unwrap();
        let book_id = book.id;

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                let review = review_by(ObjectId::new(), 1.0 + (i % 5) as f64);
                tokio::spawn(async move { store.push_review(&book_id, &review).await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().unwrap().is_some());
        }

        let stored = store.find_by_id(&book_id).await.unwrap().unwrap();
        assert_eq!(stored.reviews.len(), 8);
    }

    #[tokio::test]
    async fn test_review_writes_require_the_owner() {
        let store = InMemoryStore::new();
        let book = Book::new("Dune", "Frank Herbert", "Science Fiction");
        BookRepository::insert(&store, &book).await.unwrap();
        let (alice, mallory) = (ObjectId::new(), ObjectId::new());
        let review = review_by(alice, 2.0);
        store.push_review(&book.id, &review).await.unwrap().unwrap();

        let patch = ReviewPatch { rating: Some(5.0), comment: None, updated_at: 1 };
        assert!(store.update_review(&review.id, &mallory, &patch).await.unwrap().is_none());
        assert!(store.pull_review(&review.id, &mallory).await.unwrap().is_none());

        let updated = store.update_review(&review.id, &alice, &patch).await.unwrap().unwrap();
        assert_eq!(updated.average_rating, 5.0);

        let emptied = store.pull_review(&review.id, &alice).await.unwrap().unwrap();
        assert!(emptied.reviews.is_empty());
        assert_eq!(emptied.average_rating, 0.0);
    }
}
