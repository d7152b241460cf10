pub mod memory;
pub mod repository;

pub use memory::InMemoryStore;
pub use repository::{BookRepository, UserRepository};

use mongodb::{Client, Collection, Database};
use std::error::Error;

pub const USERS: &str = "users";
pub const BOOKS: &str = "books";

const DEFAULT_DATABASE: &str = "book_reviews";

#[derive(Clone)]
pub struct MongoDB {
    db: Database,
}

impl MongoDB {
    pub async fn new(uri: &str) -> Result<Self, Box<dyn Error>> {
        let mut client_options = mongodb::options::ClientOptions::parse(uri).await?;

        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(5);
        client_options.max_idle_time = Some(std::time::Duration::from_secs(300));

        client_options.connect_timeout = Some(std::time::Duration::from_secs(5));
        client_options.server_selection_timeout = Some(std::time::Duration::from_secs(5));

        // Database name comes from the URI path, e.g. mongodb://host:27017/book_reviews
        let db_name = client_options
            .default_database
            .clone()
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let client = Client::with_options(client_options)?;
        let db = client.database(&db_name);

        // Test connection
        db.list_collection_names().await?;

        let mongodb = Self { db };
        mongodb.ensure_indexes().await?;

        Ok(mongodb)
    }

    async fn ensure_indexes(&self) -> Result<(), Box<dyn Error>> {
        use mongodb::bson::doc;
        use mongodb::options::IndexOptions;
        use mongodb::IndexModel;

        log::info!("🔧 Creating database indexes...");

        // users(email) unique - backs the duplicate signup check
        let users = self.collection::<mongodb::bson::Document>(USERS);

        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        match users.create_index(email_index).await {
            Ok(_) => log::info!("   ✅ Index created: users(email) unique"),
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        // books(reviews._id) - review update/delete look the book up by review id
        let books = self.collection::<mongodb::bson::Document>(BOOKS);

        let review_index = IndexModel::builder()
            .keys(doc! { "reviews._id": 1 })
            .build();

        match books.create_index(review_index).await {
            Ok(_) => log::info!("   ✅ Index created: books(reviews._id)"),
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        log::info!("✅ Database indexes ready");

        Ok(())
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    /// Pings the server; used by the health check
    pub async fn health_check(&self) -> Result<bool, mongodb::error::Error> {
        self.db.run_command(mongodb::bson::doc! { "ping": 1 }).await?;
        Ok(true)
    }
}
