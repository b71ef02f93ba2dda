use crate::server::ServerError;
use axum::{
    Json as AxumJson,
    extract::FromRequest,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use headers::ContentType;
use quill_common::model::{like::Like, post::DeletedPost};
use serde::{Deserialize, Serialize};

/// JSON extractor and response that report failures as [`ServerError`].
#[derive(FromRequest, Debug, Clone, Copy, Default)]
#[from_request(via(AxumJson), rejection(ServerError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(body) => (TypedHeader(ContentType::json()), body).into_response(),
            Err(err) => ServerError::JsonResponse(err).into_response(),
        }
    }
}

/// A newly stored object, replied with `201 Created`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Created<T>(pub T);

impl<T: Serialize> IntoResponse for Created<T> {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self.0)).into_response()
    }
}

/// Plain-text acknowledgement for operations that return no object.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct Confirmation {
    pub msg: String,
}

impl Confirmation {
    pub fn post_deleted(post: &DeletedPost) -> Self {
        Self {
            msg: format!("Post with ID {} has been deleted", post.id),
        }
    }

    pub fn post_liked(like: &Like) -> Self {
        Self {
            msg: format!("User {} liked post {}", like.user_id, like.post_id),
        }
    }
}
