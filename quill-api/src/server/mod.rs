use crate::service::{PostService, ServiceError};
use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use json::Json;
use quill_common::{error::ErrorKind, model::auth::EmptyAuthTokenError};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info_span, warn};

mod auth;
mod json;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub posts: Arc<PostService>,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

/// The complete application: routes plus request id, tracing and deadline layers.
pub fn app(state: ServerState, request_timeout: Duration) -> Router {
    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id
        )
    });

    routes()
        .with_state(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(middleware::map_response(timeout_response))
        .layer(trace_layer)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

/// Gives the bare reply of the deadline layer the usual error body.
async fn timeout_response(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        ServerError::Timeout.into_response()
    } else {
        response
    }
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error(transparent)]
    EmptyAuthToken(#[from] EmptyAuthTokenError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("Request exceeded its deadline")]
    Timeout,
}

impl ServerError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServerError::UnknownRoute(_) => ErrorKind::NotFound,
            ServerError::PathRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::InvalidAuthorizationHeader(_)
            | ServerError::EmptyAuthToken(_) => ErrorKind::Validation,
            ServerError::JsonResponse(_) => ErrorKind::Internal,
            ServerError::Service(err) => err.kind(),
            ServerError::Timeout => ErrorKind::Timeout,
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Timeout => StatusCode::REQUEST_TIMEOUT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
    kind: ErrorKind,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();

        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
        } else {
            warn!(error = %self, %status, "Replying with error");
        }

        let error_response = ErrorResponse {
            status: status.as_u16(),
            kind,
        };
        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        server::{ServerState, app},
        service::PostService,
        testing::{FakeAuthGateway, MemoryStore},
    };
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use std::{sync::Arc, time::Duration};
    use tower::ServiceExt;

    fn test_app() -> Router {
        app_with(FakeAuthGateway::with_users([5, 7, 9]), Duration::from_secs(5))
    }

    fn app_with(auth: FakeAuthGateway, request_timeout: Duration) -> Router {
        let posts = PostService::new(Arc::new(auth), Arc::new(MemoryStore::default()));
        app(
            ServerState {
                posts: Arc::new(posts),
            },
            request_timeout,
        )
    }

    fn request(
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn create_post(app: &Router, token: &str) -> i64 {
        let (status, body) = send(
            app,
            request(
                Method::POST,
                "/posts",
                Some(token),
                Some(json!({ "title": "T", "content": "C" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn write_post_returns_created_post() {
        let app = test_app();

        let (status, body) = send(
            &app,
            request(
                Method::POST,
                "/posts",
                Some("token-7"),
                Some(json!({ "title": "T", "content": "C" })),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user_id"], 7);
        assert_eq!(body["title"], "T");
        assert_eq!(body["content"], "C");
        assert!(body["created_at"].is_string());
    }

    #[tokio::test]
    async fn missing_fields_are_invalid_arguments() {
        let app = test_app();

        let cases = [
            request(
                Method::POST,
                "/posts",
                None,
                Some(json!({ "title": "T", "content": "C" })),
            ),
            request(
                Method::POST,
                "/posts",
                Some("token-7"),
                Some(json!({ "content": "C" })),
            ),
            request(
                Method::POST,
                "/posts",
                Some("token-7"),
                Some(json!({ "title": "", "content": "C" })),
            ),
            request(
                Method::PUT,
                "/posts/abc",
                Some("token-7"),
                Some(json!({ "title": "T", "content": "C" })),
            ),
        ];

        for case in cases {
            let (status, body) = send(&app, case).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["kind"], "validation");
        }
    }

    #[tokio::test]
    async fn whitespace_text_is_accepted() {
        let app = test_app();

        let (status, body) = send(
            &app,
            request(
                Method::POST,
                "/posts",
                Some("token-7"),
                Some(json!({ "title": " ", "content": "C" })),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["title"], " ");
    }

    #[tokio::test]
    async fn non_positive_post_ids_are_invalid_arguments() {
        let app = test_app();

        let cases = [
            request(
                Method::PUT,
                "/posts/0",
                Some("token-7"),
                Some(json!({ "title": "T", "content": "C" })),
            ),
            request(Method::DELETE, "/posts/0", Some("token-7"), None),
            request(Method::DELETE, "/posts/-3", Some("token-7"), None),
            request(Method::GET, "/posts/0", None, None),
            request(Method::POST, "/posts/0/likes", Some("token-5"), None),
            request(
                Method::POST,
                "/posts/0/comments",
                Some("token-5"),
                Some(json!({ "content": "hi" })),
            ),
        ];

        for case in cases {
            let (status, body) = send(&app, case).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["kind"], "validation");
        }
    }

    #[tokio::test]
    async fn slow_request_times_out_with_error_body() {
        let auth = FakeAuthGateway::with_users([7]).with_delay(Duration::from_secs(5));
        let app = app_with(auth, Duration::from_millis(20));

        let (status, body) = send(
            &app,
            request(
                Method::POST,
                "/posts",
                Some("token-7"),
                Some(json!({ "title": "T", "content": "C" })),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(body, json!({ "status": 408, "kind": "timeout" }));
    }

    #[tokio::test]
    async fn bad_token_is_unauthenticated() {
        let app = test_app();

        let (status, body) = send(
            &app,
            request(
                Method::POST,
                "/posts",
                Some("forged"),
                Some(json!({ "title": "T", "content": "C" })),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "status": 401, "kind": "authentication" }));
    }

    #[tokio::test]
    async fn edit_and_delete_enforce_ownership() {
        let app = test_app();
        let id = create_post(&app, "token-7").await;
        let uri = format!("/posts/{id}");

        let (status, _) = send(
            &app,
            request(
                Method::PUT,
                &uri,
                Some("token-9"),
                Some(json!({ "title": "X", "content": "Y" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, request(Method::DELETE, &uri, Some("token-9"), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app,
            request(
                Method::PUT,
                &uri,
                Some("token-7"),
                Some(json!({ "title": "T2", "content": "C2" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "T2");

        let (status, body) = send(&app, request(Method::DELETE, &uri, Some("token-7"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["msg"], format!("Post with ID {id} has been deleted"));

        let (status, _) = send(&app, request(Method::GET, &uri, None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_like_conflicts() {
        let app = test_app();
        let id = create_post(&app, "token-7").await;
        let uri = format!("/posts/{id}/likes");

        let (status, body) = send(&app, request(Method::POST, &uri, Some("token-5"), None)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["msg"], format!("User 5 liked post {id}"));

        let (status, body) = send(&app, request(Method::POST, &uri, Some("token-5"), None)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "conflict");
    }

    #[tokio::test]
    async fn comments_require_existing_post() {
        let app = test_app();

        let (status, _) = send(
            &app,
            request(
                Method::POST,
                "/posts/99/comments",
                Some("token-5"),
                Some(json!({ "content": "hi" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let id = create_post(&app, "token-7").await;
        let (status, body) = send(
            &app,
            request(
                Method::POST,
                &format!("/posts/{id}/comments"),
                Some("token-5"),
                Some(json!({ "content": "hi" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["post_id"], id);
        assert_eq!(body["user_id"], 5);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let app = test_app();

        let (status, body) = send(&app, request(Method::GET, "/nowhere", None, None)).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "not_found");
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let app = test_app();

        let response = app
            .oneshot(request(Method::GET, "/posts/1", None, None))
            .await
            .unwrap();

        assert!(response.headers().contains_key("x-request-id"));
    }
}
