use crate::{
    context::RequestContext,
    server::{
        Result, ServerError, ServerRouter,
        auth::BearerToken,
        json::{Confirmation, Created, Json},
    },
    service::PostService,
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use quill_common::model::{
    Id,
    comment::{Comment, CommentDraft},
    post::{Post, PostDraft, PostMarker},
};
use serde::{
    Deserialize, Deserializer,
    de::{Error, Unexpected},
};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(write_post)
        .typed_get(get_post)
        .typed_put(edit_post)
        .typed_delete(delete_post)
        .typed_post(comment_post)
        .typed_post(like_post)
}

/// Post ids are assigned from 1 upwards, so anything else is a malformed path.
fn positive_post_id<'de, D>(deserializer: D) -> Result<Id<PostMarker>, D::Error>
where
    D: Deserializer<'de>,
{
    let id = i64::deserialize(deserializer)?;
    if id > 0 {
        Ok(id.into())
    } else {
        Err(Error::invalid_value(
            Unexpected::Signed(id),
            &"a positive post id",
        ))
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct PostsPath();

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    #[serde(deserialize_with = "positive_post_id")]
    id: Id<PostMarker>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comments", rejection(ServerError))]
struct PostCommentsPath {
    #[serde(deserialize_with = "positive_post_id")]
    id: Id<PostMarker>,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/likes", rejection(ServerError))]
struct PostLikesPath {
    #[serde(deserialize_with = "positive_post_id")]
    id: Id<PostMarker>,
}

async fn write_post(
    PostsPath(): PostsPath,
    State(posts): State<Arc<PostService>>,
    context: RequestContext,
    BearerToken(token): BearerToken,
    Json(draft): Json<PostDraft>,
) -> Result<Created<Post>> {
    let post = posts.write_post(&context, &token, &draft).await?;

    Ok(Created(post))
}

async fn get_post(
    PostPath { id }: PostPath,
    State(posts): State<Arc<PostService>>,
    context: RequestContext,
) -> Result<Json<Post>> {
    let post = posts.get_post(&context, id).await?;

    Ok(Json(post))
}

async fn edit_post(
    PostPath { id }: PostPath,
    State(posts): State<Arc<PostService>>,
    context: RequestContext,
    BearerToken(token): BearerToken,
    Json(draft): Json<PostDraft>,
) -> Result<Json<Post>> {
    let post = posts.edit_post(&context, &token, id, &draft).await?;

    Ok(Json(post))
}

async fn delete_post(
    PostPath { id }: PostPath,
    State(posts): State<Arc<PostService>>,
    context: RequestContext,
    BearerToken(token): BearerToken,
) -> Result<Json<Confirmation>> {
    let deleted = posts.delete_post(&context, &token, id).await?;

    Ok(Json(Confirmation::post_deleted(&deleted)))
}

async fn comment_post(
    PostCommentsPath { id }: PostCommentsPath,
    State(posts): State<Arc<PostService>>,
    context: RequestContext,
    BearerToken(token): BearerToken,
    Json(draft): Json<CommentDraft>,
) -> Result<Created<Comment>> {
    let comment = posts
        .comment_post(&context, &token, id, &draft.content)
        .await?;

    Ok(Created(comment))
}

async fn like_post(
    PostLikesPath { id }: PostLikesPath,
    State(posts): State<Arc<PostService>>,
    context: RequestContext,
    BearerToken(token): BearerToken,
) -> Result<Created<Confirmation>> {
    let like = posts.like_post(&context, &token, id).await?;

    Ok(Created(Confirmation::post_liked(&like)))
}
