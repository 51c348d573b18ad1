//! Checkout Initiator
//!
//! Validates that a lesson can be sold and opens a hosted checkout session
//! whose metadata is read back verbatim by the webhook commit.

use std::collections::BTreeMap;
use std::sync::Arc;

use lesson_core::validation::{is_valid_email, normalize_name};
use lesson_core::{LessonId, LessonStore};
use serde::Deserialize;

use crate::error::{PaymentError, Result};
use crate::provider::{
    metadata, CheckoutSessionParams, CheckoutSessionStatus, CreatedCheckoutSession,
    PaymentProvider, Transfer,
};

/// Basis-point denominator for the platform fee
const BPS_DENOMINATOR: i64 = 10_000;

/// Checkout configuration
#[derive(Clone, Debug)]
pub struct CheckoutSettings {
    /// Public base URL used for redirects
    pub app_url: String,
    pub currency: String,

    /// Require a receiving account before selling a lesson
    pub strict: bool,

    /// Platform fee in basis points of the lesson price
    pub platform_fee_bps: u32,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            app_url: "http://localhost:3000".into(),
            currency: "jpy".into(),
            strict: false,
            platform_fee_bps: 500,
        }
    }
}

impl CheckoutSettings {
    fn base_url(&self) -> &str {
        self.app_url.trim_end_matches('/')
    }

    /// Fee kept by the platform, rounded down
    pub fn application_fee(&self, price: i64) -> Result<i64> {
        price
            .checked_mul(i64::from(self.platform_fee_bps))
            .map(|scaled| scaled / BPS_DENOMINATOR)
            .ok_or_else(|| PaymentError::Validation(format!("price {price} is too large")))
    }
}

/// Checkout request from a prospective student
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub lesson_id: LessonId,
    pub student_name: String,
    pub student_email: String,
}

/// Checkout initiator
pub struct CheckoutInitiator<S: LessonStore + ?Sized> {
    store: Arc<S>,
    provider: Arc<dyn PaymentProvider>,
    settings: CheckoutSettings,
}

impl<S: LessonStore + ?Sized> CheckoutInitiator<S> {
    pub fn new(store: Arc<S>, provider: Arc<dyn PaymentProvider>, settings: CheckoutSettings) -> Self {
        Self {
            store,
            provider,
            settings,
        }
    }

    pub fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    /// Open a checkout session for an unbooked lesson
    pub async fn initiate(&self, request: CheckoutRequest) -> Result<CreatedCheckoutSession> {
        let student_name = normalize_name(&request.student_name)
            .ok_or_else(|| PaymentError::Validation("studentName is required".into()))?;
        let student_email = request.student_email.trim().to_string();
        if !is_valid_email(&student_email) {
            return Err(PaymentError::Validation("studentEmail is invalid".into()));
        }

        let lesson = self
            .store
            .get_lesson(&request.lesson_id)
            .await?
            .ok_or_else(|| PaymentError::LessonNotFound(request.lesson_id.clone()))?;

        if lesson.booked {
            return Err(PaymentError::LessonAlreadyBooked(lesson.id));
        }

        let instructor = self
            .store
            .get_instructor(&lesson.instructor_id)
            .await?
            .ok_or_else(|| PaymentError::InstructorNotFound(lesson.instructor_id.clone()))?;

        let transfer = match instructor.payment_account_id.as_deref() {
            Some(account) => Some(Transfer {
                destination: account.to_string(),
                application_fee: self.settings.application_fee(lesson.price)?,
            }),
            None if self.settings.strict => {
                return Err(PaymentError::InstructorNotPayable(instructor.id));
            }
            None => {
                tracing::warn!(
                    instructor_id = %instructor.id,
                    "Instructor has no payment account, charging to platform"
                );
                None
            }
        };

        let mut meta = BTreeMap::new();
        meta.insert(metadata::LESSON_ID.to_string(), lesson.id.to_string());
        meta.insert(metadata::INSTRUCTOR_ID.to_string(), instructor.id.to_string());
        meta.insert(metadata::STUDENT_NAME.to_string(), student_name);
        meta.insert(metadata::STUDENT_EMAIL.to_string(), student_email.clone());

        let base = self.settings.base_url();
        let params = CheckoutSessionParams {
            amount: lesson.price,
            currency: self.settings.currency.clone(),
            product_name: lesson.title.clone(),
            product_description: lesson.description.clone(),
            customer_email: student_email,
            success_url: format!("{base}/success?session_id={{CHECKOUT_SESSION_ID}}"),
            cancel_url: format!("{base}/book/{}", instructor.id),
            metadata: meta,
            transfer,
        };

        let session = self.provider.create_checkout_session(&params).await?;

        tracing::info!(
            lesson_id = %lesson.id,
            session_id = %session.session_id,
            amount = lesson.price,
            provider = self.provider.name(),
            "Checkout session created"
        );

        Ok(session)
    }

    /// Payment state of a session, for the success page
    pub async fn session_status(&self, session_id: &str) -> Result<CheckoutSessionStatus> {
        if session_id.trim().is_empty() {
            return Err(PaymentError::Validation("session id is required".into()));
        }
        self.provider.retrieve_checkout_session(session_id).await
    }
}
