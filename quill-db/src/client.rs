use crate::{
    record::{CommentRecord, LikeRecord, PostRecord},
    store::{DbError, PostStore, Result},
};
use async_trait::async_trait;
use quill_common::model::{
    Id,
    comment::Comment,
    like::Like,
    post::{DeletedPost, Post, PostDraft, PostMarker},
    text::CommentContent,
    user::UserMarker,
};
use sqlx::{PgConnection, PgPool, postgres::PgPoolOptions, query, query_as, query_scalar};
use tracing::debug;

/// Row lock taken on a post while the rest of a transaction depends on it.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum PostLock {
    /// The post itself is about to be changed or removed.
    Update,
    /// The post must keep existing until commit, e.g. while a child row is inserted.
    Share,
}

#[derive(Clone, Debug)]
pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!().run(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn lock_post(
        connection: &mut PgConnection,
        post_id: Id<PostMarker>,
        lock: PostLock,
    ) -> Result<PostRecord> {
        let statement = match lock {
            PostLock::Update => {
                "
                SELECT id, user_id, title, content, created_at, updated_at
                FROM posts
                WHERE id = $1
                FOR UPDATE
                "
            }
            PostLock::Share => {
                "
                SELECT id, user_id, title, content, created_at, updated_at
                FROM posts
                WHERE id = $1
                FOR SHARE
                "
            }
        };

        query_as::<_, PostRecord>(statement)
            .bind(post_id.get())
            .fetch_optional(connection)
            .await?
            .ok_or(DbError::PostNotFound { post: post_id })
    }

    async fn lock_owned_post(
        connection: &mut PgConnection,
        requester: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<PostRecord> {
        let record = Self::lock_post(connection, post_id, PostLock::Update).await?;

        if record.user_id != requester.get() {
            debug!(
                post = %post_id,
                %requester,
                owner = record.user_id,
                "Requester does not own post"
            );
            return Err(DbError::NotPostOwner {
                post: post_id,
                requester,
            });
        }

        Ok(record)
    }
}

/// Maps constraint violations raised by an insert into a child table of `posts`.
fn child_insert_error(err: sqlx::Error, post_id: Id<PostMarker>, on_unique: DbError) -> DbError {
    let (unique_violation, foreign_key_violation) =
        err.as_database_error().map_or((false, false), |db_err| {
            (db_err.is_unique_violation(), db_err.is_foreign_key_violation())
        });

    if unique_violation {
        on_unique
    } else if foreign_key_violation {
        DbError::PostNotFound { post: post_id }
    } else {
        err.into()
    }
}

// Returning early with `?` drops the open transaction, which rolls it back.
#[async_trait]
impl PostStore for DbClient {
    async fn create_post(&self, owner: Id<UserMarker>, draft: &PostDraft) -> Result<Post> {
        let mut transaction = self.pool.begin().await?;

        let record = query_as::<_, PostRecord>(
            "
            INSERT INTO posts (user_id, title, content)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, title, content, created_at, updated_at
            ",
        )
        .bind(owner.get())
        .bind(draft.title.get())
        .bind(draft.content.get())
        .fetch_one(&mut *transaction)
        .await?;

        transaction.commit().await?;

        Ok(Post::try_from(record)?)
    }

    async fn update_post(
        &self,
        requester: Id<UserMarker>,
        post_id: Id<PostMarker>,
        draft: &PostDraft,
    ) -> Result<Post> {
        let mut transaction = self.pool.begin().await?;

        Self::lock_owned_post(&mut transaction, requester, post_id).await?;

        let record = query_as::<_, PostRecord>(
            "
            UPDATE posts
            SET
                title = $1,
                content = $2,
                updated_at = GREATEST(clock_timestamp(), updated_at + INTERVAL '1 microsecond')
            WHERE id = $3
            RETURNING id, user_id, title, content, created_at, updated_at
            ",
        )
        .bind(draft.title.get())
        .bind(draft.content.get())
        .bind(post_id.get())
        .fetch_one(&mut *transaction)
        .await?;

        transaction.commit().await?;

        Ok(Post::try_from(record)?)
    }

    async fn delete_post(
        &self,
        requester: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<DeletedPost> {
        let mut transaction = self.pool.begin().await?;

        Self::lock_owned_post(&mut transaction, requester, post_id).await?;

        query("DELETE FROM posts WHERE id = $1")
            .bind(post_id.get())
            .execute(&mut *transaction)
            .await?;

        transaction.commit().await?;

        Ok(DeletedPost { id: post_id })
    }

    async fn create_comment(
        &self,
        author: Id<UserMarker>,
        post_id: Id<PostMarker>,
        content: &CommentContent,
    ) -> Result<Comment> {
        let mut transaction = self.pool.begin().await?;

        Self::lock_post(&mut transaction, post_id, PostLock::Share).await?;

        let record = query_as::<_, CommentRecord>(
            "
            INSERT INTO comments (user_id, post_id, content)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, post_id, content, created_at
            ",
        )
        .bind(author.get())
        .bind(post_id.get())
        .bind(content.get())
        .fetch_one(&mut *transaction)
        .await
        .map_err(|err| {
            child_insert_error(err, post_id, DbError::PostNotFound { post: post_id })
        })?;

        transaction.commit().await?;

        Ok(Comment::try_from(record)?)
    }

    async fn create_like(&self, user: Id<UserMarker>, post_id: Id<PostMarker>) -> Result<Like> {
        let like_exists = || DbError::LikeExists {
            user,
            post: post_id,
        };

        let mut transaction = self.pool.begin().await?;

        Self::lock_post(&mut transaction, post_id, PostLock::Share).await?;

        // Advisory only: two transactions can both get past this check.
        // The primary key on (user_id, post_id) decides the race.
        let already_liked = query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM likes WHERE user_id = $1 AND post_id = $2)",
        )
        .bind(user.get())
        .bind(post_id.get())
        .fetch_one(&mut *transaction)
        .await?;

        if already_liked {
            return Err(like_exists());
        }

        let record = query_as::<_, LikeRecord>(
            "
            INSERT INTO likes (user_id, post_id)
            VALUES ($1, $2)
            RETURNING user_id, post_id, created_at
            ",
        )
        .bind(user.get())
        .bind(post_id.get())
        .fetch_one(&mut *transaction)
        .await
        .map_err(|err| child_insert_error(err, post_id, like_exists()))?;

        transaction.commit().await?;

        Ok(record.into())
    }

    async fn get_post(&self, post_id: Id<PostMarker>) -> Result<Post> {
        let record = query_as::<_, PostRecord>(
            "
            SELECT id, user_id, title, content, created_at, updated_at
            FROM posts
            WHERE id = $1
            ",
        )
        .bind(post_id.get())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::PostNotFound { post: post_id })?;

        Ok(Post::try_from(record)?)
    }
}
