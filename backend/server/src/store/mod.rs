//! # Storage
//!
//! Everything the pages read or write goes through [`Store`]. Two backends:
//! - [`MemoryStore`]: maps behind one async lock. Default when `REDIS_URL` is unset, used by tests.
//! - [`RedisStore`]: JSON records in Redis hashes, counters through atomic `HINCRBY`.
//!
//! ## Guarantees every backend gives
//! - One rating per (user, post). Rating again replaces the value.
//! - Comments come back oldest first, posts and reports newest first, pets by id.
//! - Usernames are unique ignoring case, post slugs are unique.
//! - `consume_quota` never lets the counter pass `limit`, even under concurrent requests.
use std::{path::Path, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

pub mod database;
pub mod memory;

pub use database::RedisStore;
pub use memory::MemoryStore;

use crate::{
    models::{
        BlogPost, Comment, NewPost, NewReport, Pet, PetId, PetProfile, PostId, Rating, Report,
        ReportId, ReportKind, Subscription, User, UserId,
    },
    session::SessionData,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} already exists")]
    Conflict(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn load_session(&self, id: &str) -> Result<Option<SessionData>, StoreError>;
    async fn save_session(&self, id: &str, data: &SessionData, ttl: Duration)
    -> Result<(), StoreError>;
    async fn delete_session(&self, id: &str) -> Result<(), StoreError>;

    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError>;
    async fn user(&self, id: UserId) -> Result<Option<User>, StoreError>;
    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn insert_post(&self, post: NewPost) -> Result<BlogPost, StoreError>;
    async fn posts(&self) -> Result<Vec<BlogPost>, StoreError>;
    async fn post_by_slug(&self, slug: &str) -> Result<Option<BlogPost>, StoreError>;

    async fn add_comment(&self, post_id: PostId, user: &User, content: &str)
    -> Result<Comment, StoreError>;
    async fn comments(&self, post_id: PostId) -> Result<Vec<Comment>, StoreError>;
    async fn comment_count(&self, post_id: PostId) -> Result<usize, StoreError>;

    async fn rate_post(&self, post_id: PostId, user_id: UserId, value: u8)
    -> Result<(), StoreError>;
    async fn ratings(&self, post_id: PostId) -> Result<Vec<Rating>, StoreError>;

    async fn insert_pet(&self, owner: UserId, profile: PetProfile) -> Result<Pet, StoreError>;
    async fn update_pet(&self, pet: &Pet) -> Result<(), StoreError>;
    async fn delete_pet(&self, id: PetId) -> Result<bool, StoreError>;
    async fn pet(&self, id: PetId) -> Result<Option<Pet>, StoreError>;
    async fn pets(&self, owner: UserId) -> Result<Vec<Pet>, StoreError>;

    async fn subscription(&self, user_id: UserId) -> Result<Option<Subscription>, StoreError>;
    async fn set_subscription(&self, user_id: UserId, plan_id: u32)
    -> Result<Subscription, StoreError>;

    /// Takes one unit if `usage < limit`. Returns whether it did.
    async fn consume_quota(
        &self,
        user_id: UserId,
        kind: ReportKind,
        period: &str,
        limit: u32,
    ) -> Result<bool, StoreError>;
    async fn refund_quota(&self, user_id: UserId, kind: ReportKind, period: &str)
    -> Result<(), StoreError>;
    async fn usage(&self, user_id: UserId, kind: ReportKind, period: &str)
    -> Result<u32, StoreError>;

    async fn insert_report(&self, report: NewReport) -> Result<Report, StoreError>;
    async fn report(&self, id: ReportId) -> Result<Option<Report>, StoreError>;
    async fn reports(&self, owner: UserId) -> Result<Vec<Report>, StoreError>;
}

/// Loads blog posts from a JSON array file, skipping slugs that already exist.
pub async fn seed_posts(store: &dyn Store, path: &Path) -> Result<usize, SeedError> {
    let posts: Vec<NewPost> = serde_json::from_str(&tokio::fs::read_to_string(path).await?)?;

    let mut inserted = 0;
    for post in posts {
        let slug = post.slug.clone();
        match store.insert_post(post).await {
            Ok(_) => inserted += 1,
            Err(StoreError::Conflict(_)) => {
                info!("Post {slug} already present, skipping");
            }
            Err(e) => return Err(e.into()),
        }
    }

    if inserted == 0 {
        warn!("No posts seeded from {}", path.display());
    }

    Ok(inserted)
}

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Reading seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parsing seed file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}
