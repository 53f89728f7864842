//! # integration-tests
//!
//! Shared harness for the end-to-end suites under `tests/`. The app runs on
//! the in-memory store with the real router, stages and services; only the
//! password hasher and the mail transport are swapped for test doubles.

#![cfg(feature = "web-axum")]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use api_adapters::{build_router, metrics::Metrics, AppState, RouterOptions};
use async_trait::async_trait;
use auth_adapters::OpaqueTokenCodec;
use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use domains::{DomainError, Mail, Mailer, PasswordHasher, FORUMS_READ, FORUMS_WRITE};
use serde_json::{json, Value};
use services::{AuthService, ForumService, RateLimiter, RateLimiterConfig, UserService};
use storage_adapters::InMemoryStore;
use tokio::sync::{mpsc, Mutex};
use tower::ServiceExt;

/// Argon2 is far too slow for an unoptimised test build.
pub struct PlainHasher;

#[async_trait]
impl PasswordHasher for PlainHasher {
    async fn hash(&self, plaintext: &str) -> Result<String, DomainError> {
        Ok(format!("plain${plaintext}"))
    }

    async fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, DomainError> {
        Ok(hash.strip_prefix("plain$") == Some(plaintext))
    }
}

/// Hands every delivered mail to the test through a channel.
pub struct CapturingMailer {
    outbox: mpsc::UnboundedSender<(String, Mail)>,
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, recipient: &str, mail: &Mail) -> Result<(), DomainError> {
        self.outbox
            .send((recipient.to_string(), mail.clone()))
            .map_err(|_| DomainError::Internal("test outbox closed".into()))
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub struct TestAppBuilder {
    limiter: RateLimiterConfig,
    default_permissions: Vec<String>,
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self {
            limiter: RateLimiterConfig {
                enabled: false,
                ..RateLimiterConfig::default()
            },
            default_permissions: vec![FORUMS_READ.into(), FORUMS_WRITE.into()],
        }
    }
}

impl TestAppBuilder {
    pub fn limiter(mut self, config: RateLimiterConfig) -> Self {
        self.limiter = config;
        self
    }

    pub fn default_permissions(mut self, codes: &[&str]) -> Self {
        self.default_permissions = codes.iter().map(|code| code.to_string()).collect();
        self
    }

    pub fn build(self) -> TestApp {
        let store = InMemoryStore::new();
        let shared = Arc::new(store.clone());
        let hasher = Arc::new(PlainHasher);
        let codec = Arc::new(OpaqueTokenCodec::new());
        let (outbox, inbox) = mpsc::unbounded_channel();

        let auth = AuthService::new(
            shared.clone(),
            shared.clone(),
            shared.clone(),
            hasher.clone(),
            codec.clone(),
        );
        let users = UserService::new(
            shared.clone(),
            shared.clone(),
            hasher,
            codec,
            Arc::new(CapturingMailer { outbox }),
            self.default_permissions,
        );
        let forums = ForumService::new(shared);
        let metrics = Metrics::new();

        let state = AppState {
            forums: forums.clone(),
            users,
            auth,
            metrics: metrics.clone(),
            environment: "test".into(),
            version: "1.0.0",
        };
        let router = build_router(
            state,
            RouterOptions {
                limiter: Arc::new(RateLimiter::new(self.limiter)),
                trust_proxy_headers: false,
            },
        );

        TestApp {
            router,
            store,
            forums,
            metrics,
            inbox: Mutex::new(inbox),
        }
    }
}

pub struct TestApp {
    router: Router,
    pub store: InMemoryStore,
    pub forums: ForumService,
    pub metrics: Metrics,
    inbox: Mutex<mpsc::UnboundedReceiver<(String, Mail)>>,
}

impl TestApp {
    pub fn new() -> Self {
        TestAppBuilder::default().build()
    }

    pub fn builder() -> TestAppBuilder {
        TestAppBuilder::default()
    }

    /// Sends one request from 127.0.0.1 and reads the JSON body, if any.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        self.request_with_headers(method, uri, token, body, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("valid request");
        self.send(request).await
    }

    /// Sends a prepared request; `ConnectInfo` is added when missing.
    pub async fn send(&self, mut request: Request<Body>) -> TestResponse {
        if request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .is_none()
        {
            request
                .extensions_mut()
                .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 50000))));
        }

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Next mail handed to the mailer, waiting briefly for the background send.
    pub async fn next_mail(&self) -> (String, Mail) {
        let mut inbox = self.inbox.lock().await;
        tokio::time::timeout(Duration::from_secs(5), inbox.recv())
            .await
            .expect("mail delivered in time")
            .expect("outbox open")
    }

    pub async fn register(&self, username: &str, password: &str) -> TestResponse {
        self.request(
            Method::POST,
            "/v1/users",
            None,
            Some(json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": password,
            })),
        )
        .await
    }

    /// Activation token from the welcome mail sent to `username`.
    pub async fn activation_token_for(&self, username: &str) -> String {
        let (recipient, mail) = self.next_mail().await;
        assert_eq!(recipient, format!("{username}@example.com"));
        match mail {
            Mail::Welcome {
                activation_token, ..
            } => activation_token,
        }
    }

    pub async fn activate(&self, activation_token: &str) -> TestResponse {
        self.request(
            Method::PUT,
            "/v1/users/activated",
            None,
            Some(json!({ "token": activation_token })),
        )
        .await
    }

    pub async fn login(&self, username: &str, password: &str) -> TestResponse {
        self.request(
            Method::POST,
            "/v1/tokens/authentication",
            None,
            Some(json!({
                "email": format!("{username}@example.com"),
                "password": password,
            })),
        )
        .await
    }

    /// Registers, activates and logs in; returns the bearer token.
    pub async fn activated_user(&self, username: &str) -> String {
        let password = "pa55word!";
        assert_eq!(self.register(username, password).await.status, StatusCode::CREATED);
        let activation = self.activation_token_for(username).await;
        assert_eq!(self.activate(&activation).await.status, StatusCode::OK);
        let login = self.login(username, password).await;
        assert_eq!(login.status, StatusCode::CREATED);
        login.body["authentication_token"]["token"]
            .as_str()
            .expect("token in login response")
            .to_string()
    }

    pub async fn create_forum(&self, token: &str, topic: &str, discussion: &str) -> TestResponse {
        self.request(
            Method::POST,
            "/v1/forums",
            Some(token),
            Some(json!({ "topic": topic, "discussion": discussion })),
        )
        .await
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}
