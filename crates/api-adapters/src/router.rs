//! Route table and the layer stack around it.
//!
//! Every request passes, outermost first: panic recovery, request id,
//! tracing, metrics, the body limit, then the router-wide pipeline
//! (rate limit, authenticate). Guard pipelines are attached per route group
//! with `route_layer`, so unmatched paths and methods never reach them.

use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request},
    middleware::from_fn_with_state,
    response::Response,
    routing::{get, patch, post, put},
    Router,
};
use domains::{FORUMS_READ, FORUMS_WRITE};
use services::RateLimiter;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::error::server_error;
use crate::handlers::{forums, healthcheck, method_not_allowed, not_found, tokens, users};
use crate::metrics;
use crate::pipeline::{intercept, Pipeline};
use crate::stages::{
    Authenticate, RateLimit, RequireActivated, RequireAuthenticated, RequirePermission,
};
use crate::state::AppState;

/// Request bodies above this size are refused before a handler sees them.
pub const MAX_BODY_BYTES: usize = 1_048_576;

pub struct RouterOptions {
    pub limiter: Arc<RateLimiter>,
    /// Use `X-Forwarded-For` / `X-Real-IP` for rate limiting. Only enable
    /// behind a proxy that overwrites them.
    pub trust_proxy_headers: bool,
}

pub fn build_router(state: AppState, options: RouterOptions) -> Router {
    let activated = Pipeline::new()
        .then(RequireAuthenticated)
        .then(RequireActivated);
    let can_read = activated
        .clone()
        .then(RequirePermission::new(state.auth.clone(), FORUMS_READ));
    let can_write = activated
        .clone()
        .then(RequirePermission::new(state.auth.clone(), FORUMS_WRITE));

    let front = Pipeline::new()
        .then(RateLimit::new(
            options.limiter,
            options.trust_proxy_headers,
            state.metrics.clone(),
        ))
        .then(Authenticate::new(state.auth.clone()));

    // Reads
    let forum_read_router = Router::new()
        .route("/v1/forums", get(forums::list_forums))
        .route("/v1/forums/{id}", get(forums::show_forum))
        .route_layer(from_fn_with_state(can_read, intercept));

    // Writes
    let forum_write_router = Router::new()
        .route("/v1/forums", post(forums::create_forum))
        .route(
            "/v1/forums/{id}",
            patch(forums::update_forum).delete(forums::delete_forum),
        )
        .route("/v1/addComment/{id}", patch(forums::add_comment))
        .route_layer(from_fn_with_state(can_write, intercept));

    let account_router = Router::new()
        .route("/v1/users/password", put(users::change_password))
        .route_layer(from_fn_with_state(activated, intercept));

    let open_router = Router::new()
        .route("/v1/healthcheck", get(healthcheck::healthcheck))
        .route("/v1/users", post(users::register_user))
        .route("/v1/users/activated", put(users::activate_user))
        .route(
            "/v1/tokens/authentication",
            post(tokens::create_authentication_token),
        )
        .route("/debug/metrics", get(metrics::expose));

    let request_metrics = state.metrics.clone();

    Router::new()
        .merge(forum_read_router)
        .merge(forum_write_router)
        .merge(account_router)
        .merge(open_router)
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::custom(recover))
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|req: &Request| {
                    let request_id = req
                        .headers()
                        .get("x-request-id")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "request",
                        method = %req.method(),
                        path = %req.uri().path(),
                        request_id = %request_id,
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(from_fn_with_state(request_metrics, metrics::track))
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
                .layer(from_fn_with_state(front, intercept)),
        )
}

fn recover(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    tracing::error!(panic = %detail, "handler panicked");
    server_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    use axum::{
        body::{to_bytes, Body},
        extract::ConnectInfo,
        http::{Method, StatusCode},
    };
    use chrono::{Duration, Utc};
    use domains::{
        ForumRepository, MockForumRepository, NewUser, PermissionRepository, Token,
        TokenRepository, TokenScope, UserRepository,
    };
    use services::{AuthService, ForumService, RateLimiterConfig, UserService};
    use storage_adapters::InMemoryStore;
    use tower::ServiceExt;

    use crate::{metrics::Metrics, LogMailer};

    fn state(store: Arc<InMemoryStore>, forums: Arc<dyn ForumRepository>) -> AppState {
        let hasher = Arc::new(auth_stub::PlainHasher);
        let codec = Arc::new(auth_stub::FixedCodec);
        let auth = AuthService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            hasher.clone(),
            codec.clone(),
        );
        let users = UserService::new(
            store.clone(),
            store,
            hasher,
            codec,
            Arc::new(LogMailer::new("test@example.com")),
            vec![],
        );
        AppState {
            forums: ForumService::new(forums),
            users,
            auth,
            metrics: Metrics::new(),
            environment: "test".into(),
            version: "0.0.0",
        }
    }

    fn with_limiter(state: AppState, limiter: RateLimiterConfig) -> Router {
        build_router(
            state,
            RouterOptions {
                limiter: Arc::new(RateLimiter::new(limiter)),
                trust_proxy_headers: false,
            },
        )
    }

    fn app(limiter: RateLimiterConfig) -> Router {
        let store = Arc::new(InMemoryStore::default());
        with_limiter(state(store.clone(), store), limiter)
    }

    fn request(method: Method, uri: &str) -> axum::http::Request<Body> {
        let mut req = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));
        req
    }

    async fn json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    mod auth_stub {
        use async_trait::async_trait;
        use domains::{DomainError, PasswordHasher, TokenCodec};

        pub struct PlainHasher;

        #[async_trait]
        impl PasswordHasher for PlainHasher {
            async fn hash(&self, plaintext: &str) -> Result<String, DomainError> {
                Ok(format!("plain:{plaintext}"))
            }

            async fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, DomainError> {
                Ok(hash == format!("plain:{plaintext}"))
            }
        }

        pub struct FixedCodec;

        impl TokenCodec for FixedCodec {
            fn generate(&self) -> String {
                "AAAAAAAAAAAAAAAAAAAAAA".into()
            }

            fn digest(&self, plaintext: &str) -> Vec<u8> {
                plaintext.as_bytes().to_vec()
            }
        }
    }

    fn unlimited() -> RateLimiterConfig {
        RateLimiterConfig {
            enabled: false,
            ..RateLimiterConfig::default()
        }
    }

    #[tokio::test]
    async fn healthcheck_is_open() {
        let response = app(unlimited())
            .oneshot(request(Method::GET, "/v1/healthcheck"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = json(response).await;
        assert_eq!(body["status"], "available");
        assert_eq!(body["system_info"]["environment"], "test");
    }

    #[tokio::test]
    async fn forum_routes_require_authentication() {
        let response = app(unlimited())
            .oneshot(request(Method::GET, "/v1/forums"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()["www-authenticate"], "Bearer");
    }

    #[tokio::test]
    async fn unknown_route_and_method_use_json_envelope() {
        let app = app(unlimited());

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/v1/nope"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(json(response).await["error"].is_string());

        let response = app
            .oneshot(request(Method::POST, "/v1/healthcheck"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn method_not_allowed_is_not_gated_by_guards() {
        let response = app(unlimited())
            .oneshot(request(Method::PUT, "/v1/forums"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn burst_exhaustion_is_429() {
        let app = app(RateLimiterConfig {
            enabled: true,
            rps: 0.001,
            burst: 2,
            ..RateLimiterConfig::default()
        });

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(request(Method::GET, "/v1/healthcheck"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .oneshot(request(Method::GET, "/v1/healthcheck"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json(response).await["error"], "rate limit exceeded");
    }

    #[tokio::test]
    async fn handler_panic_becomes_server_error() {
        let store = Arc::new(InMemoryStore::default());
        let mut forums = MockForumRepository::new();
        forums
            .expect_get()
            .returning(|_| panic!("forum lookup exploded"));

        let mut user = UserRepository::insert(
            store.as_ref(),
            &NewUser {
                username: "reader".into(),
                email: "reader@example.com".into(),
                password_hash: "plain:pa55word!".into(),
            },
        )
        .await
        .unwrap();
        user.activated = true;
        UserRepository::update(store.as_ref(), &user).await.unwrap();
        store
            .add_for_user(user.id, &[FORUMS_READ.to_string()])
            .await
            .unwrap();
        TokenRepository::insert(
            store.as_ref(),
            &Token {
                hash: b"AAAAAAAAAAAAAAAAAAAAAA".to_vec(),
                user_id: user.id,
                expiry: Utc::now() + Duration::hours(1),
                scope: TokenScope::Authentication,
            },
        )
        .await
        .unwrap();

        let app = with_limiter(state(store, Arc::new(forums)), unlimited());
        let mut req = request(Method::GET, "/v1/forums/1");
        req.headers_mut().insert(
            axum::http::header::AUTHORIZATION,
            "Bearer AAAAAAAAAAAAAAAAAAAAAA".parse().unwrap(),
        );

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json(response).await,
            serde_json::json!({
                "error": "the server encountered a problem and could not process your request"
            })
        );
    }
}
