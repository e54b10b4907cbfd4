//! HTTP boundary.
//!
//! Handlers only translate: headers and bodies into core calls, core errors
//! into status codes (see [`error::status_for`]).

pub mod caller;
pub mod error;
pub mod handlers;

use crate::application::orchestrator::ContributionOrchestrator;
use crate::application::pools::PoolService;
use crate::application::reconciler::WebhookReconciler;
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ContributionOrchestrator>,
    pub reconciler: Arc<WebhookReconciler>,
    pub pools: Arc<PoolService>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/pools", post(handlers::create_pool))
        .route("/pools/:id", get(handlers::get_pool))
        .route("/pools/:id/approve", post(handlers::approve_pool))
        .route("/pools/:id/close", post(handlers::close_pool))
        .route("/pools/:id/contributions", get(handlers::pool_contributions))
        .route("/pools/:id/audit", get(handlers::audit_pool))
        .route("/contributions", post(handlers::create_contribution))
        .route("/contributions/mine", get(handlers::my_contributions))
        .route("/contributions/:id/status", get(handlers::contribution_status))
        .route("/payments/methods", get(handlers::payment_methods))
        .route("/webhooks/payment", post(handlers::payment_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
