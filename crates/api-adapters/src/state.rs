use axum::extract::FromRef;
use services::{AuthService, ForumService, UserService};

use crate::metrics::Metrics;

/// State shared by every handler. Cloning is cheap: services hold `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub forums: ForumService,
    pub users: UserService,
    pub auth: AuthService,
    pub metrics: Metrics,
    /// Reported by the healthcheck.
    pub environment: String,
    pub version: &'static str,
}

impl FromRef<AppState> for Metrics {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}
