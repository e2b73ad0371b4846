pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod mpesa;
pub mod services;
pub mod validation;

use axum::{
    Router,
    http::{HeaderName, header},
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};

use crate::mpesa::MpesaClient;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    /// `None` when gateway credentials are absent; payment routes then
    /// answer with the not-configured error.
    pub mpesa: Option<MpesaClient>,
}

pub fn create_app(state: AppState) -> Router {
    // Browser clients call these routes cross-origin; pre-flight probes
    // are answered with a headers-only response before any body handling.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ]);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/collections", post(handlers::collections::initiate_collection))
        .route("/payments/callback", post(handlers::callback::mpesa_callback))
        .route(
            "/disbursements",
            post(handlers::disbursements::initiate_disbursement),
        )
        .route("/transactions", get(handlers::transactions::list_transactions))
        .route("/transactions/:id", get(handlers::transactions::get_transaction))
        .layer(cors)
        .with_state(state)
}
