//! # Redis
//!
//! Persistent backend. Every record is a JSON string, most of them in one big hash per
//! record type so lookups stay O(1).
//!
//! ## Keys
//! - `ids`: hash of counters (`users`, `posts`, `comments`, `pets`, `reports`), `HINCRBY` hands out ids
//! - `session:{id}`: session JSON with a TTL
//! - `users`: id to user, `usernames`: lowercased username to id (`HSETNX` keeps them unique)
//! - `posts`: id to post, `post_slugs`: slug to id
//! - `comments:{post}`: list, `RPUSH` only, so the list is already in creation order
//! - `ratings:{post}`: user id to rating, `HSET` overwrites so one rating per user
//! - `pets`: id to pet, `pets:{owner}`: set of pet ids
//! - `subscriptions`: user id to subscription
//! - `usage:{period}`: `{user}:{kind}` to count, expires after the period is long gone
//! - `reports`: id to report, `reports:{owner}`: list of ids, newest first
//!
//! ## Quota
//! `HINCRBY` first, then check. Going past the limit undoes the increment, so two requests
//! racing for the last unit can both lose but never both win.
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use serde::{Serialize, de::DeserializeOwned};

use super::{Store, StoreError};
use crate::{
    models::{
        BlogPost, Comment, NewPost, NewReport, Pet, PetId, PetProfile, PostId, Rating, Report,
        ReportId, ReportKind, Subscription, User, UserId,
    },
    session::SessionData,
};

const USAGE_TTL_SECS: i64 = 60 * 60 * 24 * 62;

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, StoreError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = Client::open(redis_url)?;
    let connection_manager = client.get_connection_manager_with_config(config).await?;

    Ok(connection_manager)
}

pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        Ok(Self {
            connection: init_redis(redis_url).await?,
        })
    }

    fn con(&self) -> ConnectionManager {
        self.connection.clone()
    }

    async fn next_id(&self, kind: &str) -> Result<u64, StoreError> {
        Ok(self.con().hincr("ids", kind, 1).await?)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        key: &str,
        field: u64,
    ) -> Result<Option<T>, StoreError> {
        let raw: Option<String> = self.con().hget(key, field).await?;
        raw.map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn put_json<T: Serialize>(
        &self,
        key: &str,
        field: u64,
        value: &T,
    ) -> Result<(), StoreError> {
        let _: () = self
            .con()
            .hset(key, field, serde_json::to_string(value)?)
            .await?;
        Ok(())
    }

    async fn many_json<T: DeserializeOwned>(
        &self,
        key: &str,
        fields: &[u64],
    ) -> Result<Vec<T>, StoreError> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }

        let raw: Vec<Option<String>> = if fields.len() == 1 {
            vec![self.con().hget(key, fields[0]).await?]
        } else {
            self.con().hget(key, fields).await?
        };

        raw.into_iter()
            .flatten()
            .map(|raw| serde_json::from_str(&raw).map_err(StoreError::from))
            .collect()
    }

    async fn all_json<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StoreError> {
        let raw: Vec<String> = self.con().hvals(key).await?;
        raw.iter()
            .map(|raw| serde_json::from_str(raw).map_err(StoreError::from))
            .collect()
    }
}

fn usage_key(period: &str) -> String {
    format!("usage:{period}")
}

fn usage_field(user_id: UserId, kind: ReportKind) -> String {
    format!("{user_id}:{}", crate::models::Choice::value(kind))
}

#[async_trait]
impl Store for RedisStore {
    async fn load_session(&self, id: &str) -> Result<Option<SessionData>, StoreError> {
        let raw: Option<String> = self.con().get(format!("session:{id}")).await?;
        raw.map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn save_session(
        &self,
        id: &str,
        data: &SessionData,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let _: () = self
            .con()
            .set_ex(
                format!("session:{id}"),
                serde_json::to_string(data)?,
                ttl.as_secs().max(1),
            )
            .await?;
        Ok(())
    }

    async fn delete_session(&self, id: &str) -> Result<(), StoreError> {
        let _: () = self.con().del(format!("session:{id}")).await?;
        Ok(())
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let id = self.next_id("users").await?;

        let claimed: bool = self
            .con()
            .hset_nx("usernames", username.to_lowercase(), id)
            .await?;
        if !claimed {
            return Err(StoreError::Conflict(format!("user {username}")));
        }

        let user = User {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        self.put_json("users", id, &user).await?;

        Ok(user)
    }

    async fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.get_json("users", id).await
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let id: Option<u64> = self
            .con()
            .hget("usernames", username.to_lowercase())
            .await?;

        match id {
            Some(id) => self.user(id).await,
            None => Ok(None),
        }
    }

    async fn insert_post(&self, post: NewPost) -> Result<BlogPost, StoreError> {
        let id = self.next_id("posts").await?;

        let claimed: bool = self.con().hset_nx("post_slugs", &post.slug, id).await?;
        if !claimed {
            return Err(StoreError::Conflict(format!("post {}", post.slug)));
        }

        let post = BlogPost {
            id,
            title: post.title,
            slug: post.slug,
            content: post.content,
            image: post.image,
            category: post.category,
            author: post.author,
            created_at: Utc::now(),
        };
        self.put_json("posts", id, &post).await?;

        Ok(post)
    }

    async fn posts(&self) -> Result<Vec<BlogPost>, StoreError> {
        let mut posts: Vec<BlogPost> = self.all_json("posts").await?;
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(posts)
    }

    async fn post_by_slug(&self, slug: &str) -> Result<Option<BlogPost>, StoreError> {
        let id: Option<u64> = self.con().hget("post_slugs", slug).await?;

        match id {
            Some(id) => self.get_json("posts", id).await,
            None => Ok(None),
        }
    }

    async fn add_comment(
        &self,
        post_id: PostId,
        user: &User,
        content: &str,
    ) -> Result<Comment, StoreError> {
        let comment = Comment {
            id: self.next_id("comments").await?,
            post_id,
            user_id: user.id,
            author: user.username.clone(),
            content: content.to_string(),
            created_at: Utc::now(),
        };

        let _: () = self
            .con()
            .rpush(format!("comments:{post_id}"), serde_json::to_string(&comment)?)
            .await?;

        Ok(comment)
    }

    async fn comments(&self, post_id: PostId) -> Result<Vec<Comment>, StoreError> {
        let raw: Vec<String> = self
            .con()
            .lrange(format!("comments:{post_id}"), 0, -1)
            .await?;

        raw.iter()
            .map(|raw| serde_json::from_str(raw).map_err(StoreError::from))
            .collect()
    }

    async fn comment_count(&self, post_id: PostId) -> Result<usize, StoreError> {
        Ok(self.con().llen(format!("comments:{post_id}")).await?)
    }

    async fn rate_post(
        &self,
        post_id: PostId,
        user_id: UserId,
        value: u8,
    ) -> Result<(), StoreError> {
        let rating = Rating {
            post_id,
            user_id,
            value,
            updated_at: Utc::now(),
        };

        self.put_json(&format!("ratings:{post_id}"), user_id, &rating)
            .await
    }

    async fn ratings(&self, post_id: PostId) -> Result<Vec<Rating>, StoreError> {
        self.all_json(&format!("ratings:{post_id}")).await
    }

    async fn insert_pet(&self, owner: UserId, profile: PetProfile) -> Result<Pet, StoreError> {
        let now = Utc::now();
        let pet = Pet {
            id: self.next_id("pets").await?,
            owner,
            profile,
            created_at: now,
            updated_at: now,
        };

        self.put_json("pets", pet.id, &pet).await?;
        let _: () = self.con().sadd(format!("pets:{owner}"), pet.id).await?;

        Ok(pet)
    }

    async fn update_pet(&self, pet: &Pet) -> Result<(), StoreError> {
        self.put_json("pets", pet.id, pet).await
    }

    async fn delete_pet(&self, id: PetId) -> Result<bool, StoreError> {
        let Some(pet) = self.get_json::<Pet>("pets", id).await? else {
            return Ok(false);
        };

        let _: () = self.con().srem(format!("pets:{}", pet.owner), id).await?;
        let removed: u32 = self.con().hdel("pets", id).await?;

        Ok(removed > 0)
    }

    async fn pet(&self, id: PetId) -> Result<Option<Pet>, StoreError> {
        self.get_json("pets", id).await
    }

    async fn pets(&self, owner: UserId) -> Result<Vec<Pet>, StoreError> {
        let mut ids: Vec<u64> = self.con().smembers(format!("pets:{owner}")).await?;
        ids.sort_unstable();

        self.many_json("pets", &ids).await
    }

    async fn subscription(&self, user_id: UserId) -> Result<Option<Subscription>, StoreError> {
        self.get_json("subscriptions", user_id).await
    }

    async fn set_subscription(
        &self,
        user_id: UserId,
        plan_id: u32,
    ) -> Result<Subscription, StoreError> {
        let subscription = Subscription {
            user_id,
            plan_id,
            since: Utc::now(),
        };
        self.put_json("subscriptions", user_id, &subscription)
            .await?;

        Ok(subscription)
    }

    async fn consume_quota(
        &self,
        user_id: UserId,
        kind: ReportKind,
        period: &str,
        limit: u32,
    ) -> Result<bool, StoreError> {
        let key = usage_key(period);
        let field = usage_field(user_id, kind);
        let mut con = self.con();

        let used: i64 = con.hincr(&key, &field, 1).await?;
        let _: () = con.expire(&key, USAGE_TTL_SECS).await?;

        if used > i64::from(limit) {
            let _: i64 = con.hincr(&key, &field, -1).await?;
            return Ok(false);
        }

        Ok(true)
    }

    async fn refund_quota(
        &self,
        user_id: UserId,
        kind: ReportKind,
        period: &str,
    ) -> Result<(), StoreError> {
        let _: i64 = self
            .con()
            .hincr(usage_key(period), usage_field(user_id, kind), -1)
            .await?;
        Ok(())
    }

    async fn usage(
        &self,
        user_id: UserId,
        kind: ReportKind,
        period: &str,
    ) -> Result<u32, StoreError> {
        let used: Option<i64> = self
            .con()
            .hget(usage_key(period), usage_field(user_id, kind))
            .await?;

        Ok(used.unwrap_or(0).clamp(0, i64::from(u32::MAX)) as u32)
    }

    async fn insert_report(&self, report: NewReport) -> Result<Report, StoreError> {
        let report = Report {
            id: self.next_id("reports").await?,
            owner: report.owner,
            pet_id: report.pet_id,
            pet_name: report.pet_name,
            kind: report.kind,
            title: report.title,
            lines: report.lines,
            created_at: Utc::now(),
        };

        self.put_json("reports", report.id, &report).await?;
        let _: () = self
            .con()
            .lpush(format!("reports:{}", report.owner), report.id)
            .await?;

        Ok(report)
    }

    async fn report(&self, id: ReportId) -> Result<Option<Report>, StoreError> {
        self.get_json("reports", id).await
    }

    async fn reports(&self, owner: UserId) -> Result<Vec<Report>, StoreError> {
        let ids: Vec<u64> = self
            .con()
            .lrange(format!("reports:{owner}"), 0, -1)
            .await?;

        self.many_json("reports", &ids).await
    }
}
