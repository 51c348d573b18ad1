//! HTTP Handlers

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Redirect,
    Json,
};
use chrono::{DateTime, Utc};
use lesson_core::{
    Instructor, InstructorId, InstructorProfile, Lesson, LessonStore, NewLesson, StoreError,
    DEFAULT_DURATION_MINUTES,
};
use lesson_payments::{
    CheckoutRequest, CheckoutSessionStatus, CreatedCheckoutSession, OnboardingStatus,
    PaymentError, WebhookOutcome, SIGNATURE_HEADER,
};
use serde::{Deserialize, Serialize};

use crate::auth::CurrentUser;
use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub store: &'static str,
    pub provider: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct OnboardingRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct UrlResponse {
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonQuery {
    pub instructor_id: Option<InstructorId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLessonRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: i64,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    pub start_at: DateTime<Utc>,
    #[serde(default)]
    pub meeting_url: Option<String>,
    #[serde(default, alias = "maxStudents")]
    pub capacity: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub received: bool,
    pub outcome: &'static str,
}

// ============================================================================
// Error Mapping
// ============================================================================

fn api_error(status: StatusCode, code: &str, error: String) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error,
            code: code.into(),
        }),
    )
}

/// Status mapping for caller-facing operations
fn payment_error(err: PaymentError) -> ApiError {
    let (status, code) = match &err {
        PaymentError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        PaymentError::LessonNotFound(_) => (StatusCode::NOT_FOUND, "LESSON_NOT_FOUND"),
        PaymentError::InstructorNotFound(_) => (StatusCode::NOT_FOUND, "INSTRUCTOR_NOT_FOUND"),
        PaymentError::NoPaymentAccount => (StatusCode::NOT_FOUND, "NO_PAYMENT_ACCOUNT"),
        PaymentError::LessonAlreadyBooked(_) => (StatusCode::BAD_REQUEST, "LESSON_ALREADY_BOOKED"),
        PaymentError::InstructorNotPayable(_) => {
            (StatusCode::BAD_REQUEST, "INSTRUCTOR_NOT_PAYABLE")
        }
        PaymentError::AlreadyOnboarded => (StatusCode::BAD_REQUEST, "ALREADY_ONBOARDED"),
        PaymentError::Stripe(_) => (StatusCode::BAD_GATEWAY, "PAYMENT_PROVIDER_ERROR"),
        PaymentError::WebhookSignature(_) | PaymentError::WebhookParse(_) => {
            (StatusCode::BAD_REQUEST, "INVALID_REQUEST")
        }
        PaymentError::Config(_) | PaymentError::Store(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        }
    };

    if status.is_server_error() {
        tracing::error!(error = %err, "Request failed");
    } else {
        tracing::debug!(error = %err, "Request rejected");
    }

    api_error(status, code, err.user_message())
}

fn store_error(err: StoreError) -> ApiError {
    payment_error(err.into())
}

/// Status mapping for webhook deliveries; 5xx asks the provider to redeliver
fn webhook_error(err: PaymentError) -> ApiError {
    match err {
        PaymentError::WebhookSignature(_) => api_error(
            StatusCode::BAD_REQUEST,
            "INVALID_SIGNATURE",
            "Invalid signature".into(),
        ),
        PaymentError::WebhookParse(msg) => {
            api_error(StatusCode::BAD_REQUEST, "MALFORMED_EVENT", msg)
        }
        PaymentError::LessonNotFound(id) => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "LESSON_NOT_FOUND",
            format!("Lesson not found: {id}"),
        ),
        _ => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "WEBHOOK_ERROR",
            "Webhook processing failed".into(),
        ),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        store: state.store.backend(),
        provider: state.provider.name().to_string(),
    })
}

async fn current_instructor(state: &AppState, user: &CurrentUser) -> ApiResult<Instructor> {
    state
        .store
        .ensure_instructor(user.0.to_new_instructor())
        .await
        .map_err(store_error)
}

/// Profile of the caller, created on first access
pub async fn me(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<InstructorProfile>> {
    let instructor = current_instructor(&state, &user).await?;
    Ok(Json(instructor.public_profile()))
}

/// Public instructor profile
pub async fn get_instructor(
    State(state): State<AppState>,
    Path(id): Path<InstructorId>,
) -> ApiResult<Json<InstructorProfile>> {
    state
        .store
        .get_instructor(&id)
        .await
        .map_err(store_error)?
        .map(|instructor| Json(instructor.public_profile()))
        .ok_or_else(|| payment_error(PaymentError::InstructorNotFound(id)))
}

/// Bookable lessons of an instructor, or all lessons of the caller
pub async fn list_lessons(
    State(state): State<AppState>,
    Query(query): Query<LessonQuery>,
    user: Option<CurrentUser>,
) -> ApiResult<Json<Vec<Lesson>>> {
    if let Some(instructor_id) = query.instructor_id {
        let lessons = state
            .status
            .available_lessons(&instructor_id, Utc::now())
            .await
            .map_err(payment_error)?;
        return Ok(Json(lessons));
    }

    let user = user.ok_or_else(|| {
        api_error(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "Authentication required".into(),
        )
    })?;
    let instructor = current_instructor(&state, &user).await?;
    let lessons = state
        .store
        .list_lessons(&instructor.id)
        .await
        .map_err(store_error)?;
    Ok(Json(lessons))
}

/// Create a lesson owned by the caller
pub async fn create_lesson(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateLessonRequest>,
) -> ApiResult<(StatusCode, Json<Lesson>)> {
    let instructor = current_instructor(&state, &user).await?;

    let lesson = state
        .store
        .create_lesson(NewLesson {
            instructor_id: instructor.id,
            title: payload.title,
            description: payload.description,
            price: payload.price,
            duration_minutes: payload.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES),
            start_at: payload.start_at,
            meeting_url: payload.meeting_url,
            capacity: payload.capacity.unwrap_or(1),
        })
        .await
        .map_err(store_error)?;

    tracing::info!(lesson_id = %lesson.id, instructor_id = %lesson.instructor_id, "Lesson created");
    Ok((StatusCode::CREATED, Json(lesson)))
}

/// Start or resume payout onboarding
pub async fn start_onboarding(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<OnboardingRequest>,
) -> ApiResult<Json<UrlResponse>> {
    let url = state
        .onboarding
        .start(&user.0, &payload.name)
        .await
        .map_err(payment_error)?;
    Ok(Json(UrlResponse { url }))
}

/// Redirect to a fresh onboarding link
pub async fn refresh_onboarding(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Redirect> {
    let url = state
        .onboarding
        .refresh_link(&user.0)
        .await
        .map_err(payment_error)?;
    Ok(Redirect::temporary(&url))
}

/// Onboarding completion for the caller
pub async fn onboarding_status(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<OnboardingStatus>> {
    let status = state
        .status
        .onboarding_status(&user.0.email)
        .await
        .map_err(payment_error)?;
    Ok(Json(status))
}

/// Create a checkout session for a lesson
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> ApiResult<Json<CreatedCheckoutSession>> {
    let session = state
        .checkout
        .initiate(payload)
        .await
        .map_err(payment_error)?;
    Ok(Json(session))
}

/// Payment state of a checkout session
pub async fn checkout_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<CheckoutSessionStatus>> {
    let status = state
        .checkout
        .session_status(&session_id)
        .await
        .map_err(payment_error)?;
    Ok(Json(status))
}

/// Payment provider webhook
///
/// The body is taken as raw bytes so the signature is checked against
/// exactly what was signed.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookResponse>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let outcome = state
        .webhook
        .process(&body, signature)
        .await
        .map_err(webhook_error)?;

    let outcome = match outcome {
        WebhookOutcome::Booked(_) => "booked",
        WebhookOutcome::AlreadyBooked { .. } => "already_booked",
        WebhookOutcome::DuplicatePayment { .. } => "duplicate_payment",
        WebhookOutcome::Ignored { .. } => "ignored",
    };

    Ok(Json(WebhookResponse {
        received: true,
        outcome,
    }))
}
