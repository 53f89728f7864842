//! The concrete interceptor stages.
//!
//! Router-wide: [`RateLimit`] then [`Authenticate`]. Per route:
//! [`RequireAuthenticated`], [`RequireActivated`] and [`RequirePermission`].
//! Guards read the [`Identity`] that [`Authenticate`] stored in the request
//! extensions, so every guard in one request sees the same snapshot.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Request},
    http::header,
    response::IntoResponse,
};
use domains::{DomainError, Identity};
use services::{authorization, AuthService, RateLimiter};

use crate::error::ApiError;
use crate::metrics::Metrics;
use crate::pipeline::{Flow, Stage};

fn halt(err: impl Into<ApiError>) -> Flow {
    Flow::Halt(err.into().into_response())
}

fn identity(req: &Request) -> &Identity {
    static ANONYMOUS: Identity = Identity::Anonymous;
    req.extensions().get::<Identity>().unwrap_or(&ANONYMOUS)
}

/// Per-client admission control keyed on the source IP.
pub struct RateLimit {
    limiter: Arc<RateLimiter>,
    trust_proxy_headers: bool,
    metrics: Metrics,
}

impl RateLimit {
    pub fn new(limiter: Arc<RateLimiter>, trust_proxy_headers: bool, metrics: Metrics) -> Self {
        Self {
            limiter,
            trust_proxy_headers,
            metrics,
        }
    }
}

/// Source IP of the request.
///
/// Proxy headers are only consulted when explicitly trusted; otherwise the
/// peer address from `ConnectInfo` is used.
pub fn client_ip(req: &Request, trust_proxy_headers: bool) -> Option<IpAddr> {
    if trust_proxy_headers {
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok());
        if forwarded.is_some() {
            return forwarded;
        }

        let real_ip = req
            .headers()
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<IpAddr>().ok());
        if real_ip.is_some() {
            return real_ip;
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

#[async_trait]
impl Stage for RateLimit {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn process(&self, req: &mut Request) -> Flow {
        if !self.limiter.config().enabled {
            return Flow::Continue;
        }

        let Some(ip) = client_ip(req, self.trust_proxy_headers) else {
            // No way to attribute the request to a client; refuse rather than share a bucket.
            tracing::warn!("rate limiter could not determine client address");
            self.metrics.record_rate_limited();
            return halt(DomainError::RateLimited);
        };

        if self.limiter.admit(ip) {
            Flow::Continue
        } else {
            tracing::warn!(client = %ip, "rate limit exceeded");
            self.metrics.record_rate_limited();
            halt(DomainError::RateLimited)
        }
    }
}

/// Resolves the `Authorization` header into an [`Identity`] extension.
pub struct Authenticate {
    auth: AuthService,
}

impl Authenticate {
    pub fn new(auth: AuthService) -> Self {
        Self { auth }
    }
}

#[async_trait]
impl Stage for Authenticate {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    async fn process(&self, req: &mut Request) -> Flow {
        let header = match req.headers().get(header::AUTHORIZATION) {
            None => None,
            Some(value) => match value.to_str() {
                Ok(value) => Some(value.to_owned()),
                Err(_) => return halt(DomainError::InvalidAuthenticationToken),
            },
        };

        match self.auth.authenticate(header.as_deref()).await {
            Ok(identity) => {
                req.extensions_mut().insert(identity);
                Flow::Continue
            }
            Err(err) => halt(err),
        }
    }
}

pub struct RequireAuthenticated;

#[async_trait]
impl Stage for RequireAuthenticated {
    fn name(&self) -> &'static str {
        "require_authenticated"
    }

    async fn process(&self, req: &mut Request) -> Flow {
        match authorization::require_authenticated(identity(req)) {
            Ok(_) => Flow::Continue,
            Err(err) => halt(err),
        }
    }
}

pub struct RequireActivated;

#[async_trait]
impl Stage for RequireActivated {
    fn name(&self) -> &'static str {
        "require_activated"
    }

    async fn process(&self, req: &mut Request) -> Flow {
        match authorization::require_activated(identity(req)) {
            Ok(_) => Flow::Continue,
            Err(err) => halt(err),
        }
    }
}

/// Requires the caller's permission set to contain `code`.
///
/// Permissions are fetched per request; nothing is cached across requests.
pub struct RequirePermission {
    auth: AuthService,
    code: &'static str,
}

impl RequirePermission {
    pub fn new(auth: AuthService, code: &'static str) -> Self {
        Self { auth, code }
    }
}

#[async_trait]
impl Stage for RequirePermission {
    fn name(&self) -> &'static str {
        "require_permission"
    }

    async fn process(&self, req: &mut Request) -> Flow {
        let user_id = match authorization::require_activated(identity(req)) {
            Ok(user) => user.id,
            Err(err) => return halt(err),
        };

        let permissions = match self.auth.permissions_for(user_id).await {
            Ok(permissions) => permissions,
            Err(err) => return halt(err),
        };

        match authorization::require_permission(&permissions, self.code) {
            Ok(()) => Flow::Continue,
            Err(err) => halt(err),
        }
    }
}
