use async_trait::async_trait;
use quill_common::{
    error::ErrorKind,
    model::{
        Id, ModelValidationError,
        comment::Comment,
        like::Like,
        post::{DeletedPost, Post, PostDraft, PostMarker},
        text::CommentContent,
        user::UserMarker,
    },
};
use thiserror::Error;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Post with id {post} does not exist")]
    PostNotFound { post: Id<PostMarker> },
    #[error("User {requester} does not own post {post}")]
    NotPostOwner {
        post: Id<PostMarker>,
        requester: Id<UserMarker>,
    },
    #[error("User {user} already liked post {post}")]
    LikeExists {
        user: Id<UserMarker>,
        post: Id<PostMarker>,
    },
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("Applying migrations failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DbError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::PostNotFound { .. } => ErrorKind::NotFound,
            DbError::NotPostOwner { .. } => ErrorKind::Authorization,
            DbError::LikeExists { .. } => ErrorKind::Conflict,
            DbError::Data(_) | DbError::Migrate(_) | DbError::Sqlx(_) => ErrorKind::Internal,
        }
    }
}

/// Persistence for posts, comments and likes.
///
/// Every operation is atomic: it either applies all of its effects or none.
/// Operations that read before writing do the read in the same transaction
/// as the write, so existence and ownership checks are never stale.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create_post(&self, owner: Id<UserMarker>, draft: &PostDraft) -> Result<Post>;

    /// Fails with [`DbError::NotPostOwner`] without writing if `requester`
    /// is not the owner.
    async fn update_post(
        &self,
        requester: Id<UserMarker>,
        post: Id<PostMarker>,
        draft: &PostDraft,
    ) -> Result<Post>;

    async fn delete_post(
        &self,
        requester: Id<UserMarker>,
        post: Id<PostMarker>,
    ) -> Result<DeletedPost>;

    async fn create_comment(
        &self,
        author: Id<UserMarker>,
        post: Id<PostMarker>,
        content: &CommentContent,
    ) -> Result<Comment>;

    /// Fails with [`DbError::LikeExists`] if `user` already liked `post`.
    async fn create_like(&self, user: Id<UserMarker>, post: Id<PostMarker>) -> Result<Like>;

    async fn get_post(&self, post: Id<PostMarker>) -> Result<Post>;
}
