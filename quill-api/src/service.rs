use crate::{
    context::RequestContext,
    gateway::{AuthError, AuthGateway},
};
use quill_common::{
    error::ErrorKind,
    model::{
        Id,
        auth::AuthToken,
        comment::Comment,
        like::Like,
        post::{DeletedPost, Post, PostDraft, PostMarker},
        text::CommentContent,
        user::UserMarker,
    },
};
use quill_db::store::{DbError, PostStore};
use std::{
    fmt::{Display, Formatter},
    sync::Arc,
};
use thiserror::Error;
use tracing::{Span, info, instrument};

pub type Result<T, E = ServiceError> = std::result::Result<T, E>;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum Operation {
    WritePost,
    EditPost,
    DeletePost,
    CommentPost,
    LikePost,
    GetPost,
}

impl Operation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::WritePost => "write_post",
            Operation::EditPost => "edit_post",
            Operation::DeletePost => "delete_post",
            Operation::CommentPost => "comment_post",
            Operation::LikePost => "like_post",
            Operation::GetPost => "get_post",
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{op}: authentication failed: {source}")]
    Authentication {
        op: Operation,
        #[source]
        source: AuthError,
    },
    #[error("{op}: {source}")]
    Store {
        op: Operation,
        #[source]
        source: DbError,
    },
}

impl ServiceError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Authentication { source, .. } => source.kind(),
            ServiceError::Store { source, .. } => source.kind(),
        }
    }
}

/// Authenticates the caller, then runs the matching store operation.
///
/// Holds no per-request state and is shared between all requests.
#[derive(Clone)]
pub struct PostService {
    auth: Arc<dyn AuthGateway>,
    store: Arc<dyn PostStore>,
}

impl PostService {
    #[must_use]
    pub fn new(auth: Arc<dyn AuthGateway>, store: Arc<dyn PostStore>) -> Self {
        Self { auth, store }
    }

    async fn authenticate(&self, op: Operation, token: &AuthToken) -> Result<Id<UserMarker>> {
        let user = self
            .auth
            .authenticate(token)
            .await
            .map_err(|source| ServiceError::Authentication { op, source })?;

        Span::current().record("user_id", user.get());
        Ok(user)
    }

    #[instrument(
        skip_all,
        fields(
            op = %Operation::WritePost,
            request_id = context.request_id(),
            user_id = tracing::field::Empty,
        )
    )]
    pub async fn write_post(
        &self,
        context: &RequestContext,
        token: &AuthToken,
        draft: &PostDraft,
    ) -> Result<Post> {
        let op = Operation::WritePost;
        let user = self.authenticate(op, token).await?;

        info!("Adding post");
        let post = self
            .store
            .create_post(user, draft)
            .await
            .map_err(|source| ServiceError::Store { op, source })?;

        info!(post_id = %post.id, "Post added");
        Ok(post)
    }

    #[instrument(
        skip_all,
        fields(
            op = %Operation::EditPost,
            request_id = context.request_id(),
            post_id = %post_id,
            user_id = tracing::field::Empty,
        )
    )]
    pub async fn edit_post(
        &self,
        context: &RequestContext,
        token: &AuthToken,
        post_id: Id<PostMarker>,
        draft: &PostDraft,
    ) -> Result<Post> {
        let op = Operation::EditPost;
        let user = self.authenticate(op, token).await?;

        info!("Editing post");
        self.store
            .update_post(user, post_id, draft)
            .await
            .map_err(|source| ServiceError::Store { op, source })
    }

    #[instrument(
        skip_all,
        fields(
            op = %Operation::DeletePost,
            request_id = context.request_id(),
            post_id = %post_id,
            user_id = tracing::field::Empty,
        )
    )]
    pub async fn delete_post(
        &self,
        context: &RequestContext,
        token: &AuthToken,
        post_id: Id<PostMarker>,
    ) -> Result<DeletedPost> {
        let op = Operation::DeletePost;
        let user = self.authenticate(op, token).await?;

        info!("Deleting post");
        self.store
            .delete_post(user, post_id)
            .await
            .map_err(|source| ServiceError::Store { op, source })
    }

    #[instrument(
        skip_all,
        fields(
            op = %Operation::CommentPost,
            request_id = context.request_id(),
            post_id = %post_id,
            user_id = tracing::field::Empty,
        )
    )]
    pub async fn comment_post(
        &self,
        context: &RequestContext,
        token: &AuthToken,
        post_id: Id<PostMarker>,
        content: &CommentContent,
    ) -> Result<Comment> {
        let op = Operation::CommentPost;
        let user = self.authenticate(op, token).await?;

        info!("Commenting on post");
        self.store
            .create_comment(user, post_id, content)
            .await
            .map_err(|source| ServiceError::Store { op, source })
    }

    #[instrument(
        skip_all,
        fields(
            op = %Operation::LikePost,
            request_id = context.request_id(),
            post_id = %post_id,
            user_id = tracing::field::Empty,
        )
    )]
    pub async fn like_post(
        &self,
        context: &RequestContext,
        token: &AuthToken,
        post_id: Id<PostMarker>,
    ) -> Result<Like> {
        let op = Operation::LikePost;
        let user = self.authenticate(op, token).await?;

        info!("Liking post");
        self.store
            .create_like(user, post_id)
            .await
            .map_err(|source| ServiceError::Store { op, source })
    }

    #[instrument(
        skip_all,
        fields(
            op = %Operation::GetPost,
            request_id = context.request_id(),
            post_id = %post_id,
        )
    )]
    pub async fn get_post(
        &self,
        context: &RequestContext,
        post_id: Id<PostMarker>,
    ) -> Result<Post> {
        self.store
            .get_post(post_id)
            .await
            .map_err(|source| ServiceError::Store {
                op: Operation::GetPost,
                source,
            })
    }
}
