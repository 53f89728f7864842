//! # Request pipeline
//!
//! An ordered list of interceptor stages with one uniform contract: look at
//! (and possibly annotate) the request, then either let it continue or answer
//! it directly. A [`Pipeline`] runs its stages in order and stops at the first
//! [`Flow::Halt`]; the handler only runs when every stage continued.
//!
//! Pipelines are mounted with [`axum::middleware::from_fn_with_state`] and
//! [`intercept`], either router-wide or on individual routes.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Outcome of one stage.
pub enum Flow {
    Continue,
    Halt(Response),
}

#[async_trait]
pub trait Stage: Send + Sync {
    /// Short label used in traces.
    fn name(&self) -> &'static str;

    async fn process(&self, req: &mut Request) -> Flow;
}

#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `stage`; it runs after every stage already added.
    pub fn then(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub async fn run(&self, req: &mut Request) -> Flow {
        for stage in &self.stages {
            if let Flow::Halt(response) = stage.process(req).await {
                tracing::debug!(
                    stage = stage.name(),
                    status = response.status().as_u16(),
                    "request short-circuited"
                );
                return Flow::Halt(response);
            }
        }
        Flow::Continue
    }
}

/// Middleware adapter: runs the pipeline, then the inner service.
pub async fn intercept(State(pipeline): State<Pipeline>, mut req: Request, next: Next) -> Response {
    match pipeline.run(&mut req).await {
        Flow::Continue => next.run(req).await,
        Flow::Halt(response) => response,
    }
}
