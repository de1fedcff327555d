use std::{
    collections::{BTreeMap, HashMap},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{Store, StoreError};
use crate::{
    models::{
        BlogPost, Comment, NewPost, NewReport, Pet, PetId, PetProfile, PostId, Rating, Report,
        ReportId, ReportKind, Subscription, User, UserId,
    },
    session::SessionData,
};

#[derive(Default)]
struct Inner {
    next_id: u64,
    sessions: HashMap<String, (SessionData, Instant)>,
    users: BTreeMap<UserId, User>,
    posts: BTreeMap<PostId, BlogPost>,
    comments: BTreeMap<PostId, Vec<Comment>>,
    ratings: BTreeMap<(PostId, UserId), Rating>,
    pets: BTreeMap<PetId, Pet>,
    subscriptions: HashMap<UserId, Subscription>,
    usage: HashMap<(UserId, ReportKind, String), u32>,
    reports: BTreeMap<ReportId, Report>,
}

impl Inner {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions that have not expired yet.
    pub async fn live_sessions(&self) -> usize {
        let now = Instant::now();
        self.inner
            .read()
            .await
            .sessions
            .values()
            .filter(|(_, expires)| *expires > now)
            .count()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load_session(&self, id: &str) -> Result<Option<SessionData>, StoreError> {
        let inner = self.inner.read().await;

        Ok(inner
            .sessions
            .get(id)
            .filter(|(_, expires)| *expires > Instant::now())
            .map(|(data, _)| data.clone()))
    }

    async fn save_session(
        &self,
        id: &str,
        data: &SessionData,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let now = Instant::now();

        inner.sessions.retain(|_, (_, expires)| *expires > now);
        inner
            .sessions
            .insert(id.to_string(), (data.clone(), now + ttl));

        Ok(())
    }

    async fn delete_session(&self, id: &str) -> Result<(), StoreError> {
        self.inner.write().await.sessions.remove(id);
        Ok(())
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;

        if inner
            .users
            .values()
            .any(|user| user.username.eq_ignore_ascii_case(username))
        {
            return Err(StoreError::Conflict(format!("user {username}")));
        }

        let user = User {
            id: inner.next_id(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        inner.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .values()
            .find(|user| user.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn insert_post(&self, post: NewPost) -> Result<BlogPost, StoreError> {
        let mut inner = self.inner.write().await;

        if inner.posts.values().any(|p| p.slug == post.slug) {
            return Err(StoreError::Conflict(format!("post {}", post.slug)));
        }

        let post = BlogPost {
            id: inner.next_id(),
            title: post.title,
            slug: post.slug,
            content: post.content,
            image: post.image,
            category: post.category,
            author: post.author,
            created_at: Utc::now(),
        };
        inner.posts.insert(post.id, post.clone());

        Ok(post)
    }

    async fn posts(&self) -> Result<Vec<BlogPost>, StoreError> {
        let mut posts: Vec<BlogPost> = self.inner.read().await.posts.values().cloned().collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(posts)
    }

    async fn post_by_slug(&self, slug: &str) -> Result<Option<BlogPost>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .posts
            .values()
            .find(|post| post.slug == slug)
            .cloned())
    }

    async fn add_comment(
        &self,
        post_id: PostId,
        user: &User,
        content: &str,
    ) -> Result<Comment, StoreError> {
        let mut inner = self.inner.write().await;

        let comment = Comment {
            id: inner.next_id(),
            post_id,
            user_id: user.id,
            author: user.username.clone(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        inner
            .comments
            .entry(post_id)
            .or_default()
            .push(comment.clone());

        Ok(comment)
    }

    async fn comments(&self, post_id: PostId) -> Result<Vec<Comment>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .comments
            .get(&post_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn comment_count(&self, post_id: PostId) -> Result<usize, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .comments
            .get(&post_id)
            .map_or(0, Vec::len))
    }

    async fn rate_post(
        &self,
        post_id: PostId,
        user_id: UserId,
        value: u8,
    ) -> Result<(), StoreError> {
        self.inner.write().await.ratings.insert(
            (post_id, user_id),
            Rating {
                post_id,
                user_id,
                value,
                updated_at: Utc::now(),
            },
        );

        Ok(())
    }

    async fn ratings(&self, post_id: PostId) -> Result<Vec<Rating>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .ratings
            .range((post_id, UserId::MIN)..=(post_id, UserId::MAX))
            .map(|(_, rating)| rating.clone())
            .collect())
    }

    async fn insert_pet(&self, owner: UserId, profile: PetProfile) -> Result<Pet, StoreError> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();

        let pet = Pet {
            id: inner.next_id(),
            owner,
            profile,
            created_at: now,
            updated_at: now,
        };
        inner.pets.insert(pet.id, pet.clone());

        Ok(pet)
    }

    async fn update_pet(&self, pet: &Pet) -> Result<(), StoreError> {
        self.inner.write().await.pets.insert(pet.id, pet.clone());
        Ok(())
    }

    async fn delete_pet(&self, id: PetId) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.pets.remove(&id).is_some())
    }

    async fn pet(&self, id: PetId) -> Result<Option<Pet>, StoreError> {
        Ok(self.inner.read().await.pets.get(&id).cloned())
    }

    async fn pets(&self, owner: UserId) -> Result<Vec<Pet>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .pets
            .values()
            .filter(|pet| pet.owner == owner)
            .cloned()
            .collect())
    }

    async fn subscription(&self, user_id: UserId) -> Result<Option<Subscription>, StoreError> {
        Ok(self.inner.read().await.subscriptions.get(&user_id).cloned())
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
        self.inner
            .write()
            .await
            .subscriptions
            .insert(user_id, subscription.clone());

        Ok(subscription)
    }

    async fn consume_quota(
        &self,
        user_id: UserId,
        kind: ReportKind,
        period: &str,
        limit: u32,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let used = inner
            .usage
            .entry((user_id, kind, period.to_string()))
            .or_default();

        if *used >= limit {
            return Ok(false);
        }

        *used += 1;
        Ok(true)
    }

    async fn refund_quota(
        &self,
        user_id: UserId,
        kind: ReportKind,
        period: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(used) = inner.usage.get_mut(&(user_id, kind, period.to_string())) {
            *used = used.saturating_sub(1);
        }

        Ok(())
    }

    async fn usage(
        &self,
        user_id: UserId,
        kind: ReportKind,
        period: &str,
    ) -> Result<u32, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .usage
            .get(&(user_id, kind, period.to_string()))
            .copied()
            .unwrap_or(0))
    }

    async fn insert_report(&self, report: NewReport) -> Result<Report, StoreError> {
        let mut inner = self.inner.write().await;

        let report = Report {
            id: inner.next_id(),
            owner: report.owner,
            pet_id: report.pet_id,
            pet_name: report.pet_name,
            kind: report.kind,
            title: report.title,
            lines: report.lines,
            created_at: Utc::now(),
        };
        inner.reports.insert(report.id, report.clone());

        Ok(report)
    }

    async fn report(&self, id: ReportId) -> Result<Option<Report>, StoreError> {
        Ok(self.inner.read().await.reports.get(&id).cloned())
    }

    async fn reports(&self, owner: UserId) -> Result<Vec<Report>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .reports
            .values()
            .rev()
            .filter(|report| report.owner == owner)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BodyType, FoodFeeling, FoodImportance, Gender, PetType, TreatFrequency,
    };

    fn profile(name: &str) -> PetProfile {
        PetProfile {
            name: name.to_string(),
            pet_type: PetType::Dog,
            gender: Gender::Female,
            neutered: true,
            age_years: 3,
            age_months: 0,
            age_weeks: 0,
            breed: None,
            body_type: BodyType::Ideal,
            weight: 8.5,
            food_allergies: vec![],
            health_issues: vec![],
            food_types: vec![],
            food_feeling: FoodFeeling::Normal,
            food_importance: FoodImportance::Ingredients,
            treat_frequency: TreatFrequency::Daily,
        }
    }

    fn post(slug: &str) -> NewPost {
        NewPost {
            title: slug.to_string(),
            slug: slug.to_string(),
            content: "content".to_string(),
            image: None,
            category: "nutrition".to_string(),
            author: "team".to_string(),
        }
    }

    #[tokio::test]
    async fn test_rating_again_replaces() {
        let store = MemoryStore::new();
        let post = store.insert_post(post("a")).await.unwrap();

        store.rate_post(post.id, 7, 2).await.unwrap();
        store.rate_post(post.id, 7, 5).await.unwrap();
        store.rate_post(post.id, 8, 3).await.unwrap();

        let ratings = store.ratings(post.id).await.unwrap();
        assert_eq!(ratings.len(), 2);
        assert_eq!(
            ratings.iter().find(|r| r.user_id == 7).map(|r| r.value),
            Some(5)
        );
    }

    #[tokio::test]
    async fn test_ratings_scoped_to_post() {
        let store = MemoryStore::new();
        let a = store.insert_post(post("a")).await.unwrap();
        let b = store.insert_post(post("b")).await.unwrap();

        store.rate_post(a.id, 1, 4).await.unwrap();

        assert!(store.ratings(b.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_slug_and_username() {
        let store = MemoryStore::new();
        store.insert_post(post("a")).await.unwrap();
        store.create_user("Coco", "hash").await.unwrap();

        assert!(matches!(
            store.insert_post(post("a")).await,
            Err(StoreError::Conflict(_))
        ));
        assert!(matches!(
            store.create_user("coco", "hash").await,
            Err(StoreError::Conflict(_))
        ));
        assert!(store.user_by_username("COCO").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_comments_in_creation_order() {
        let store = MemoryStore::new();
        let user = store.create_user("coco", "hash").await.unwrap();
        let post = store.insert_post(post("a")).await.unwrap();

        store.add_comment(post.id, &user, "first").await.unwrap();
        store.add_comment(post.id, &user, "second").await.unwrap();

        let contents: Vec<String> = store
            .comments(post.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.content)
            .collect();
        assert_eq!(contents, vec!["first", "second"]);
        assert_eq!(store.comment_count(post.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_quota_stops_at_limit() {
        let store = MemoryStore::new();

        assert!(store.consume_quota(1, ReportKind::Meal, "2026-10", 2).await.unwrap());
        assert!(store.consume_quota(1, ReportKind::Meal, "2026-10", 2).await.unwrap());
        assert!(!store.consume_quota(1, ReportKind::Meal, "2026-10", 2).await.unwrap());

        assert!(store.consume_quota(1, ReportKind::Health, "2026-10", 2).await.unwrap());
        assert!(store.consume_quota(1, ReportKind::Meal, "2026-11", 2).await.unwrap());
        assert_eq!(store.usage(1, ReportKind::Meal, "2026-10").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_refund_gives_unit_back() {
        let store = MemoryStore::new();

        assert!(store.consume_quota(1, ReportKind::Meal, "2026-10", 1).await.unwrap());
        store.refund_quota(1, ReportKind::Meal, "2026-10").await.unwrap();

        assert!(store.consume_quota(1, ReportKind::Meal, "2026-10", 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_pets_by_owner() {
        let store = MemoryStore::new();
        let coco = store.insert_pet(1, profile("Coco")).await.unwrap();
        store.insert_pet(2, profile("Nabi")).await.unwrap();

        let pets = store.pets(1).await.unwrap();
        assert_eq!(pets.len(), 1);
        assert_eq!(pets[0].profile.name, "Coco");

        assert!(store.delete_pet(coco.id).await.unwrap());
        assert!(!store.delete_pet(coco.id).await.unwrap());
        assert!(store.pets(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_session_not_loaded() {
        let store = MemoryStore::new();
        let data = SessionData::new();

        store.save_session("a", &data, Duration::ZERO).await.unwrap();
        store.save_session("b", &data, Duration::from_secs(60)).await.unwrap();

        assert!(store.load_session("a").await.unwrap().is_none());
        assert!(store.load_session("b").await.unwrap().is_some());
    }
}
