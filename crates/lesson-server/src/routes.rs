//! Router

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{
    checkout_status, create_checkout, create_lesson, get_instructor, health_check, list_lessons,
    me, onboarding_status, refresh_onboarding, start_onboarding, stripe_webhook,
};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health_check))
        // Instructors
        .route("/api/auth/me", get(me))
        .route("/api/auth/onboarding", post(start_onboarding))
        .route("/api/instructors/{id}", get(get_instructor))
        .route("/api/stripe/connect/refresh", get(refresh_onboarding))
        .route("/api/stripe/connect/status", get(onboarding_status))
        // Lessons
        .route("/api/lessons", get(list_lessons).post(create_lesson))
        // Payments
        .route("/api/checkout/session", post(create_checkout))
        .route("/api/checkout/session/{id}", get(checkout_status))
        .route("/api/webhooks/stripe", post(stripe_webhook))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
