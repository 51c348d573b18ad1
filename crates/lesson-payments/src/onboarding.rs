//! Instructor Onboarding
//!
//! Creates a connected account for an instructor on first request and hands
//! out hosted onboarding links for it.

use std::sync::Arc;

use lesson_core::validation::{is_valid_email, normalize_name};
use lesson_core::{Instructor, LessonStore, Principal};

use crate::error::{PaymentError, Result};
use crate::provider::PaymentProvider;

/// Onboarding service
pub struct InstructorOnboarding<S: LessonStore + ?Sized> {
    store: Arc<S>,
    provider: Arc<dyn PaymentProvider>,
    app_url: String,
}

impl<S: LessonStore + ?Sized> InstructorOnboarding<S> {
    pub fn new(store: Arc<S>, provider: Arc<dyn PaymentProvider>, app_url: impl Into<String>) -> Self {
        Self {
            store,
            provider,
            app_url: app_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Where the provider sends an expired link back to
    pub fn refresh_url(&self) -> String {
        format!("{}/onboarding", self.app_url)
    }

    /// Where the provider sends the instructor once done
    pub fn return_url(&self) -> String {
        format!("{}/dashboard", self.app_url)
    }

    /// Record the display name, create the connected account if missing and
    /// return an onboarding link for it
    pub async fn start(&self, principal: &Principal, name: &str) -> Result<String> {
        let name = normalize_name(name)
            .ok_or_else(|| PaymentError::Validation("name is required".into()))?;
        if !is_valid_email(&principal.email) {
            return Err(PaymentError::Validation("email is invalid".into()));
        }

        let instructor = self.store.ensure_instructor(principal.to_new_instructor()).await?;
        if instructor.is_payable() && instructor.is_onboarded() {
            return Err(PaymentError::AlreadyOnboarded);
        }

        let account_id = match instructor.payment_account_id {
            Some(ref account) => account.clone(),
            None => {
                let account = self
                    .provider
                    .create_connected_account(&instructor.email)
                    .await?;
                tracing::info!(
                    instructor_id = %instructor.id,
                    account_id = %account,
                    "Connected account created"
                );
                account
            }
        };

        let instructor = self
            .store
            .set_payment_account(&instructor.id, &name, &account_id)
            .await?;

        self.link_for(&instructor, &account_id).await
    }

    /// Fresh onboarding link for an instructor who already has an account
    pub async fn refresh_link(&self, principal: &Principal) -> Result<String> {
        let instructor = self
            .store
            .find_instructor_by_email(&principal.email)
            .await?
            .ok_or(PaymentError::NoPaymentAccount)?;
        let account_id = instructor
            .payment_account_id
            .clone()
            .ok_or(PaymentError::NoPaymentAccount)?;

        self.link_for(&instructor, &account_id).await
    }

    async fn link_for(&self, instructor: &Instructor, account_id: &str) -> Result<String> {
        let url = self
            .provider
            .create_onboarding_link(account_id, &self.refresh_url(), &self.return_url())
            .await?;
        tracing::debug!(instructor_id = %instructor.id, "Onboarding link issued");
        Ok(url)
    }
}
