//! Router assembly.

mod common;
mod entity;
pub use common::common_routes_with_ready;
pub use entity::entity_routes;

use crate::settings::Settings;
use crate::state::AppState;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Full application: health routes, entity routes and the request layers.
pub fn app(state: AppState, settings: &Settings) -> Router {
    Router::new()
        .merge(common_routes_with_ready(state.clone()))
        .merge(entity_routes(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(settings.max_body_bytes))
                .layer(TimeoutLayer::new(settings.request_timeout)),
        )
}
