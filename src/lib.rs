//! CareTaker Match patient intake core.

pub mod config;
pub mod error;
pub mod intake;
pub mod provider;
pub mod sink;

use std::sync::Arc;

use axum::Router;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::config::ServerConfig;
use crate::intake::{IntakeRouteState, IntakeSessions, intake_routes};
use crate::provider::{ProviderReview, ProviderRouteState, provider_routes};
use crate::sink::{Navigator, SubmissionSink};

/// Build the full HTTP surface: entry screen, intake sessions, provider review.
pub fn app(
    config: &ServerConfig,
    sink: Arc<dyn SubmissionSink>,
    navigator: Arc<dyn Navigator>,
) -> Router {
    let sessions = IntakeSessions::new(
        Arc::clone(&sink),
        Arc::clone(&navigator),
        config.signature_style,
        config.session_limits,
    );
    let provider = ProviderRouteState {
        review: Arc::new(RwLock::new(ProviderReview::new(
            config.provider_patient.clone(),
        ))),
        sink,
        navigator,
    };

    intake_routes(IntakeRouteState { sessions })
        .merge(provider_routes(provider))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
}
