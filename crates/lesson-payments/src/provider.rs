//! Payment Provider Strategy
//!
//! The narrow interface the platform consumes from the external payment
//! provider. `StripeClient` is the production implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Metadata keys round-tripped through checkout and read back by the webhook
pub mod metadata {
    pub const LESSON_ID: &str = "lessonId";
    pub const INSTRUCTOR_ID: &str = "instructorId";
    pub const STUDENT_NAME: &str = "studentName";
    pub const STUDENT_EMAIL: &str = "studentEmail";
}

/// Destination charge routing funds to a connected account
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub destination: String,

    /// Platform fee kept from the charge
    pub application_fee: i64,
}

/// Everything needed to open a hosted checkout
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutSessionParams {
    /// Smallest currency unit
    pub amount: i64,
    pub currency: String,
    pub product_name: String,
    pub product_description: Option<String>,
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: BTreeMap<String, String>,
    pub transfer: Option<Transfer>,
}

/// Session created by the provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedCheckoutSession {
    pub session_id: String,
    pub url: String,
}

/// Payment state of a session as reported by the provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionStatus {
    pub session_id: String,
    pub paid: bool,
}

/// Payment provider trait (Strategy pattern)
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a hosted checkout session
    async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> Result<CreatedCheckoutSession>;

    /// Look up whether a session has been paid
    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSessionStatus>;

    /// Create a connected account for an instructor, returning its id
    async fn create_connected_account(&self, email: &str) -> Result<String>;

    /// Create an account-onboarding link, returning its URL
    async fn create_onboarding_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<String>;

    /// Whether the account can accept charges
    async fn charges_enabled(&self, account_id: &str) -> Result<bool>;

    /// Provider name
    fn name(&self) -> &str;
}
