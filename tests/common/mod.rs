#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response},
};
use chrono::Utc;
use parking_lot::Mutex;
use social::{
    AppState, UserCache,
    cache::{CacheConfig, MemoryCacheStore},
    clock::Clock,
    config::Config,
    ratelimit::{AdmissionControl, FixedWindowLimiter, RateLimiterConfig},
    router::create_router,
    store::{
        Comment, CommentRepository, FeedItem, FeedQuery, NewPost, NewUser, Post, PostRepository,
        PostUpdate, Role, RoleRepository, SortOrder, Storage, StoreError, UserProfile, UserRecord,
        UserRepository,
    },
    utils::generate_token,
};

const ROLES: [(&str, i32); 3] = [("user", 1), ("moderator", 2), ("admin", 3)];

#[derive(Default)]
struct Tables {
    users: HashMap<i64, UserProfile>,
    invitations: HashMap<String, i64>,
    /// (被关注者, 关注者)
    followers: HashSet<(i64, i64)>,
    posts: BTreeMap<i64, Post>,
    comments: Vec<Comment>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        1000 + self.next_id
    }
}

/// 内存中的数据库，记录每个用户ID被读取的次数
#[derive(Default)]
pub struct MemoryDb {
    tables: Mutex<Tables>,
    fetches: Mutex<HashMap<i64, usize>>,
    total: AtomicUsize,
}

impl MemoryDb {
    pub fn with_users(ids: &[i64]) -> Arc<Self> {
        let db = Self::default();
        for &id in ids {
            db.upsert(profile(id, &format!("gopher{}", id)));
        }
        Arc::new(db)
    }

    pub fn upsert(&self, user: UserProfile) {
        self.tables.lock().users.insert(user.id, user);
    }

    pub fn remove(&self, id: i64) {
        self.tables.lock().users.remove(&id);
    }

    pub fn user(&self, id: i64) -> Option<UserProfile> {
        self.tables.lock().users.get(&id).cloned()
    }

    pub fn invite(&self, token_hash: &str, user_id: i64) {
        self.tables.lock().invitations.insert(token_hash.to_string(), user_id);
    }

    pub fn post(&self, id: i64) -> Option<Post> {
        self.tables.lock().posts.get(&id).cloned()
    }

    pub fn insert_post(&self, user_id: i64, title: &str, tags: &[&str]) -> Post {
        let mut tables = self.tables.lock();
        let now = Utc::now();
        let post = Post {
            id: tables.next_id(),
            user_id,
            title: title.to_string(),
            content: format!("{} body", title),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            version: 0,
            created_at: now,
            updated_at: now,
        };
        tables.posts.insert(post.id, post.clone());
        post
    }

    pub fn fetches(&self, id: i64) -> usize {
        self.fetches.lock().get(&id).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserRepository for MemoryDb {
    async fn create_and_invite(
        &self,
        user: NewUser<'_>,
        token_hash: &str,
        _invitation_expiry: Duration,
    ) -> Result<UserProfile, StoreError> {
        let mut tables = self.tables.lock();
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::DuplicateUsername);
        }
        let id = tables.next_id();
        let mut created = profile(id, user.username);
        created.email = user.email.to_string();
        created.is_active = false;
        tables.users.insert(id, created.clone());
        tables.invitations.insert(token_hash.to_string(), id);
        Ok(created)
    }

    async fn activate(&self, token_hash: &str) -> Result<i64, StoreError> {
        let mut tables = self.tables.lock();
        let user_id = tables
            .invitations
            .remove(token_hash)
            .ok_or(StoreError::NotFound)?;
        let user = tables.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        user.is_active = true;
        Ok(user_id)
    }

    async fn get_by_id(&self, user_id: i64) -> Result<UserProfile, StoreError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.fetches.lock().entry(user_id).or_default() += 1;
        self.user(user_id).ok_or(StoreError::NotFound)
    }

    async fn get_by_email(&self, email: &str) -> Result<UserRecord, StoreError> {
        let tables = self.tables.lock();
        let user = tables
            .users
            .values()
            .find(|u| u.email == email && u.is_active)
            .ok_or(StoreError::NotFound)?;
        Ok(UserRecord {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: String::new(),
            created_at: user.created_at,
            is_active: user.is_active,
        })
    }

    async fn update_username(
        &self,
        user_id: i64,
        username: &str,
    ) -> Result<UserProfile, StoreError> {
        let mut tables = self.tables.lock();
        if tables
            .users
            .values()
            .any(|u| u.username == username && u.id != user_id)
        {
            return Err(StoreError::DuplicateUsername);
        }
        let user = tables.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        user.username = username.to_string();
        Ok(user.clone())
    }

    async fn delete(&self, user_id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        tables.users.remove(&user_id).ok_or(StoreError::NotFound)?;
        tables.posts.retain(|_, p| p.user_id != user_id);
        Ok(())
    }

    async fn follow(&self, follower_id: i64, user_id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }
        if !tables.followers.insert((user_id, follower_id)) {
            return Err(StoreError::AlreadyFollowing);
        }
        Ok(())
    }

    async fn unfollow(&self, follower_id: i64, user_id: i64) -> Result<(), StoreError> {
        if !self.tables.lock().followers.remove(&(user_id, follower_id)) {
            return Err(StoreError::NotFollowing);
        }
        Ok(())
    }
}

#[async_trait]
impl PostRepository for MemoryDb {
    async fn create(&self, post: NewPost<'_>) -> Result<Post, StoreError> {
        let mut tables = self.tables.lock();
        let now = Utc::now();
        let created = Post {
            id: tables.next_id(),
            user_id: post.user_id,
            title: post.title.to_string(),
            content: post.content.to_string(),
            tags: post.tags.to_vec(),
            version: 0,
            created_at: now,
            updated_at: now,
        };
        tables.posts.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, post_id: i64) -> Result<Post, StoreError> {
        self.post(post_id).ok_or(StoreError::NotFound)
    }

    async fn update(&self, post_id: i64, update: PostUpdate<'_>) -> Result<Post, StoreError> {
        let mut tables = self.tables.lock();
        let post = tables
            .posts
            .get_mut(&post_id)
            .filter(|p| p.version == update.version)
            .ok_or(StoreError::Conflict)?;
        post.title = update.title.to_string();
        post.content = update.content.to_string();
        post.version += 1;
        post.updated_at = Utc::now();
        Ok(post.clone())
    }

    async fn delete(&self, post_id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        tables.posts.remove(&post_id).ok_or(StoreError::NotFound)?;
        tables.comments.retain(|c| c.post_id != post_id);
        Ok(())
    }

    async fn feed(&self, user_id: i64, query: &FeedQuery) -> Result<Vec<FeedItem>, StoreError> {
        let tables = self.tables.lock();
        let mut items: Vec<FeedItem> = tables
            .posts
            .values()
            .filter(|p| p.user_id == user_id || tables.followers.contains(&(p.user_id, user_id)))
            .filter(|p| {
                query.search.is_empty()
                    || p.title.contains(&query.search)
                    || p.content.contains(&query.search)
            })
            .filter(|p| query.tags.iter().all(|t| p.tags.contains(t)))
            .filter(|p| query.since.is_none_or(|since| p.created_at >= since))
            .filter(|p| query.until.is_none_or(|until| p.created_at <= until))
            .map(|p| FeedItem {
                post: p.clone(),
                username: tables
                    .users
                    .get(&p.user_id)
                    .map(|u| u.username.clone())
                    .unwrap_or_default(),
                comments_count: tables.comments.iter().filter(|c| c.post_id == p.id).count() as i64,
            })
            .collect();

        // ID 递增，和创建时间同序
        items.sort_by_key(|item| item.post.id);
        if query.sort == SortOrder::Desc {
            items.reverse();
        }
        Ok(items
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }
}

#[async_trait]
impl CommentRepository for MemoryDb {
    async fn create(
        &self,
        post_id: i64,
        user_id: i64,
        content: &str,
    ) -> Result<Comment, StoreError> {
        let mut tables = self.tables.lock();
        if !tables.posts.contains_key(&post_id) {
            return Err(StoreError::NotFound);
        }
        let username = tables
            .users
            .get(&user_id)
            .map(|u| u.username.clone())
            .ok_or(StoreError::NotFound)?;
        let comment = Comment {
            id: tables.next_id(),
            post_id,
            user_id,
            content: content.to_string(),
            created_at: Utc::now(),
            username,
        };
        tables.comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_by_post(&self, post_id: i64) -> Result<Vec<Comment>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .comments
            .iter()
            .rev()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RoleRepository for MemoryDb {
    async fn get_by_name(&self, name: &str) -> Result<Role, StoreError> {
        ROLES
            .iter()
            .enumerate()
            .find(|(_, (role, _))| *role == name)
            .map(|(i, (role, level))| Role {
                id: i as i64 + 1,
                name: role.to_string(),
                description: String::new(),
                level: *level,
            })
            .ok_or(StoreError::NotFound)
    }
}

/// 四个存储库都由同一个内存数据库提供
pub fn storage(db: &Arc<MemoryDb>) -> Storage {
    Storage {
        users: db.clone(),
        posts: db.clone(),
        comments: db.clone(),
        roles: db.clone(),
    }
}

pub fn profile(id: i64, username: &str) -> UserProfile {
    UserProfile {
        id,
        username: username.to_string(),
        email: format!("{}@example.com", username),
        created_at: Utc::now(),
        is_active: true,
        role: "user".into(),
        role_level: 1,
    }
}

/// 指定角色的用户
pub fn profile_with_role(id: i64, role: &str) -> UserProfile {
    let level = ROLES
        .iter()
        .find(|(name, _)| *name == role)
        .map(|(_, level)| *level)
        .unwrap();
    UserProfile {
        role: role.to_string(),
        role_level: level,
        ..profile(id, &format!("{}{}", role, id))
    }
}

pub fn config() -> Config {
    Config {
        jwt_secret: "integration-secret".into(),
        ..Config::default()
    }
}

pub fn limiter(limit: u64, window: Duration, clock: Arc<dyn Clock>) -> Arc<dyn AdmissionControl> {
    Arc::new(FixedWindowLimiter::with_clock(RateLimiterConfig { limit, window }, clock).unwrap())
}

pub fn user_cache(db: Arc<MemoryDb>, clock: Arc<dyn Clock>) -> Arc<UserCache> {
    let store = Arc::new(MemoryCacheStore::<i64, UserProfile>::with_clock(clock));
    let cache = UserCache::new(
        store,
        db,
        CacheConfig {
            ttl: Duration::from_secs(300),
            timeout: Duration::from_secs(1),
            store_timeout: Duration::from_millis(200),
        },
    )
    .unwrap();
    Arc::new(cache)
}

/// 组装路由，存储全部在内存中
pub fn app(
    config: Config,
    db: &Arc<MemoryDb>,
    user_cache: Option<Arc<UserCache>>,
    limiter: Option<Arc<dyn AdmissionControl>>,
) -> Router {
    create_router(AppState {
        config: Arc::new(config),
        store: storage(db),
        user_cache,
        limiter,
    })
}

pub fn bearer(user_id: i64, config: &Config) -> String {
    let (token, _) = generate_token(user_id, config).unwrap();
    format!("Bearer {}", token)
}

pub fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder().method("GET").uri(uri)
}

pub fn empty(builder: axum::http::request::Builder) -> Request<Body> {
    builder.body(Body::empty()).unwrap()
}

/// 带 JSON 请求体的认证请求
pub fn json_request(
    method: &str,
    uri: &str,
    as_user: i64,
    config: &Config,
    body: serde_json::Value,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(axum::http::header::AUTHORIZATION, bearer(as_user, config))
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// 不带请求体的认证请求
pub fn authed(method: &str, uri: &str, as_user: i64, config: &Config) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(axum::http::header::AUTHORIZATION, bearer(as_user, config))
        .body(Body::empty())
        .unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
