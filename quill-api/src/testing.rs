//! In-memory stand-ins for the database and the authentication service.

use crate::gateway::{AuthError, AuthGateway};
use async_trait::async_trait;
use quill_common::model::{
    Id,
    auth::AuthToken,
    comment::Comment,
    like::Like,
    post::{DeletedPost, Post, PostDraft, PostMarker},
    text::{CommentContent, PostContent, PostTitle},
    user::UserMarker,
};
use quill_db::store::{DbError, PostStore, Result};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration as StdDuration,
};
use time::{Duration, OffsetDateTime};

pub fn draft(title: &str, content: &str) -> PostDraft {
    PostDraft {
        title: PostTitle::new(title.to_owned()).unwrap(),
        content: PostContent::new(content.to_owned()).unwrap(),
    }
}

#[derive(Default)]
struct Tables {
    last_id: i64,
    posts: BTreeMap<i64, Post>,
    comments: Vec<Comment>,
    likes: HashMap<(i64, i64), Like>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn post(&self, post_id: Id<PostMarker>) -> Result<&Post> {
        self.posts
            .get(&post_id.get())
            .ok_or(DbError::PostNotFound { post: post_id })
    }

    fn owned_post(&self, requester: Id<UserMarker>, post_id: Id<PostMarker>) -> Result<&Post> {
        let post = self.post(post_id)?;
        if post.user_id == requester {
            Ok(post)
        } else {
            Err(DbError::NotPostOwner {
                post: post_id,
                requester,
            })
        }
    }
}

/// [`PostStore`] holding everything behind one mutex, which makes every
/// operation trivially atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    calls: AtomicUsize,
}

impl MemoryStore {
    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tables.lock().unwrap()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn comment_count(&self) -> usize {
        self.tables.lock().unwrap().comments.len()
    }

    pub fn like_count(&self) -> usize {
        self.tables.lock().unwrap().likes.len()
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn create_post(&self, owner: Id<UserMarker>, draft: &PostDraft) -> Result<Post> {
        let mut tables = self.tables();
        let now = OffsetDateTime::now_utc();
        let post = Post {
            id: tables.next_id().into(),
            user_id: owner,
            title: draft.title.clone(),
            content: draft.content.clone(),
            created_at: now,
            updated_at: now,
        };

        tables.posts.insert(post.id.get(), post.clone());
        Ok(post)
    }

    async fn update_post(
        &self,
        requester: Id<UserMarker>,
        post_id: Id<PostMarker>,
        draft: &PostDraft,
    ) -> Result<Post> {
        let mut tables = self.tables();
        let mut post = tables.owned_post(requester, post_id)?.clone();

        post.title = draft.title.clone();
        post.content = draft.content.clone();
        post.updated_at = OffsetDateTime::now_utc().max(post.updated_at + Duration::MICROSECOND);

        tables.posts.insert(post_id.get(), post.clone());
        Ok(post)
    }

    async fn delete_post(
        &self,
        requester: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<DeletedPost> {
        let mut tables = self.tables();
        tables.owned_post(requester, post_id)?;

        tables.posts.remove(&post_id.get());
        tables.comments.retain(|comment| comment.post_id != post_id);
        tables.likes.retain(|_, like| like.post_id != post_id);
        Ok(DeletedPost { id: post_id })
    }

    async fn create_comment(
        &self,
        author: Id<UserMarker>,
        post_id: Id<PostMarker>,
        content: &CommentContent,
    ) -> Result<Comment> {
        let mut tables = self.tables();
        tables.post(post_id)?;

        let comment = Comment {
            id: tables.next_id().into(),
            user_id: author,
            post_id,
            content: content.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        tables.comments.push(comment.clone());
        Ok(comment)
    }

    async fn create_like(&self, user: Id<UserMarker>, post_id: Id<PostMarker>) -> Result<Like> {
        let mut tables = self.tables();
        tables.post(post_id)?;

        let key = (user.get(), post_id.get());
        if tables.likes.contains_key(&key) {
            return Err(DbError::LikeExists {
                user,
                post: post_id,
            });
        }

        let like = Like {
            user_id: user,
            post_id,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.likes.insert(key, like);
        Ok(like)
    }

    async fn get_post(&self, post_id: Id<PostMarker>) -> Result<Post> {
        self.tables().post(post_id).cloned()
    }
}

/// Accepts tokens of the form `token-{user id}` for a fixed set of users.
#[derive(Default)]
pub struct FakeAuthGateway {
    users: HashMap<String, i64>,
    calls: AtomicUsize,
    delay: Option<StdDuration>,
}

impl FakeAuthGateway {
    pub fn with_users(users: impl IntoIterator<Item = i64>) -> Self {
        Self {
            users: users
                .into_iter()
                .map(|user| (format!("token-{user}"), user))
                .collect(),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Makes every check take at least `delay` before answering.
    pub fn with_delay(mut self, delay: StdDuration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn token_for(user: i64) -> AuthToken {
        format!("token-{user}").parse().unwrap()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthGateway for FakeAuthGateway {
    async fn authenticate(&self, token: &AuthToken) -> Result<Id<UserMarker>, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.users
            .get(token.as_str())
            .copied()
            .map(Id::new)
            .ok_or(AuthError::Rejected)
    }
}
