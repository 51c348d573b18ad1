//! Payment Error Types

use lesson_core::{InstructorId, LessonId, StoreError};
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Stripe API error
    #[error("Stripe error: {0}")]
    Stripe(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Lesson does not exist
    #[error("Lesson not found: {0}")]
    LessonNotFound(LessonId),

    /// Lesson is no longer bookable
    #[error("Lesson already booked: {0}")]
    LessonAlreadyBooked(LessonId),

    /// Instructor does not exist
    #[error("Instructor not found: {0}")]
    InstructorNotFound(InstructorId),

    /// Instructor has no receiving account
    #[error("Instructor cannot receive payments: {0}")]
    InstructorNotPayable(InstructorId),

    /// No connected account to build an onboarding link for
    #[error("Payment account not found")]
    NoPaymentAccount,

    /// Onboarding was already completed
    #[error("Onboarding already completed")]
    AlreadyOnboarded,

    /// Caller input rejected
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for PaymentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LessonNotFound(id) => PaymentError::LessonNotFound(id),
            StoreError::InstructorNotFound(id) => PaymentError::InstructorNotFound(id),
            StoreError::Validation(msg) => PaymentError::Validation(msg),
            other => PaymentError::Store(other),
        }
    }
}

impl PaymentError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::Stripe(_) => true,
            PaymentError::Store(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            PaymentError::Stripe(_) => "Payment processing failed. Please try again.".into(),
            PaymentError::LessonNotFound(_) => "Lesson not found.".into(),
            PaymentError::LessonAlreadyBooked(_) => "This lesson has already been booked.".into(),
            PaymentError::InstructorNotFound(_) => "Instructor not found.".into(),
            PaymentError::InstructorNotPayable(_) => {
                "The instructor has not finished setting up payments.".into()
            }
            PaymentError::NoPaymentAccount => {
                "Payment account not found. Please complete onboarding first.".into()
            }
            PaymentError::AlreadyOnboarded => "Onboarding already completed.".into(),
            PaymentError::Validation(msg) => msg.clone(),
            PaymentError::Config(_) => "Service configuration error.".into(),
            _ => "An error occurred processing your request.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_maps_to_domain_error() {
        let err: PaymentError = StoreError::LessonNotFound(LessonId::from_string("l1")).into();
        assert!(matches!(err, PaymentError::LessonNotFound(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_transient_store_failure_is_retryable() {
        let err: PaymentError = StoreError::Database("pool timed out".into()).into();
        assert!(err.is_retryable());
        assert!(!PaymentError::WebhookSignature("bad".into()).is_retryable());
    }
}
