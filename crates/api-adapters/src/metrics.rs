//! Prometheus metrics exposed on `GET /debug/metrics`.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use prometheus_client::{
    encoding::{text::encode, EncodeLabelSet},
    metrics::{
        counter::Counter,
        family::Family,
        histogram::{exponential_buckets, Histogram},
    },
    registry::Registry,
};

use crate::error::server_error;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct StatusLabels {
    status: u16,
}

#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    requests_received: Counter,
    responses_sent: Family<StatusLabels, Counter>,
    rate_limited: Counter,
    processing_seconds: Histogram,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("forum");

        let requests_received = Counter::default();
        registry.register(
            "requests_received",
            "HTTP requests accepted by the server",
            requests_received.clone(),
        );

        let responses_sent = Family::<StatusLabels, Counter>::default();
        registry.register(
            "responses_sent",
            "HTTP responses by status code",
            responses_sent.clone(),
        );

        let rate_limited = Counter::default();
        registry.register(
            "rate_limited",
            "Requests refused by the rate limiter",
            rate_limited.clone(),
        );

        let processing_seconds = Histogram::new(exponential_buckets(0.001, 2.0, 14));
        registry.register(
            "request_processing_seconds",
            "Time from request receipt to response",
            processing_seconds.clone(),
        );

        Self {
            inner: Arc::new(MetricsInner {
                registry,
                requests_received,
                responses_sent,
                rate_limited,
                processing_seconds,
            }),
        }
    }

    pub fn record_rate_limited(&self) {
        self.inner.rate_limited.inc();
    }

    pub fn rate_limited_total(&self) -> u64 {
        self.inner.rate_limited.get()
    }

    fn record_response(&self, status: StatusCode, started: Instant) {
        self.inner
            .responses_sent
            .get_or_create(&StatusLabels {
                status: status.as_u16(),
            })
            .inc();
        self.inner
            .processing_seconds
            .observe(started.elapsed().as_secs_f64());
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.inner.registry)?;
        Ok(buffer)
    }
}

/// Counts every request and its final status.
pub async fn track(State(metrics): State<Metrics>, req: Request, next: Next) -> Response {
    metrics.inner.requests_received.inc();
    let started = Instant::now();
    let response = next.run(req).await;
    metrics.record_response(response.status(), started);
    response
}

pub async fn expose(State(metrics): State<Metrics>) -> Response {
    match metrics.render() {
        Ok(body) => (
            [(
                header::CONTENT_TYPE,
                "application/openmetrics-text; version=1.0.0; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to encode metrics");
            server_error()
        }
    }
}
