//! Application State

use std::sync::Arc;

use lesson_core::Store;
use lesson_payments::{
    CheckoutInitiator, CheckoutSettings, InstructorOnboarding, PaymentProvider, StatusProjector,
    WebhookHandler, WebhookVerifier,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Lessons, instructors and the booking ledger
    pub store: Arc<dyn Store>,

    /// Payment provider (Stripe, or the mock in tests)
    pub provider: Arc<dyn PaymentProvider>,

    pub webhook: Arc<WebhookHandler<dyn Store>>,
    pub checkout: Arc<CheckoutInitiator<dyn Store>>,
    pub onboarding: Arc<InstructorOnboarding<dyn Store>>,
    pub status: Arc<StatusProjector<dyn Store>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        provider: Arc<dyn PaymentProvider>,
        verifier: WebhookVerifier,
        settings: CheckoutSettings,
    ) -> Self {
        let onboarding = InstructorOnboarding::new(store.clone(), provider.clone(), settings.app_url.clone());

        Self {
            webhook: Arc::new(WebhookHandler::new(store.clone(), verifier)),
            checkout: Arc::new(CheckoutInitiator::new(store.clone(), provider.clone(), settings)),
            onboarding: Arc::new(onboarding),
            status: Arc::new(StatusProjector::new(store.clone(), provider.clone())),
            store,
            provider,
        }
    }
}
