//! Mock Payment Provider
//!
//! For tests and local demos. Records every request and lets callers decide
//! which accounts are charge-enabled and which sessions are paid.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{PaymentError, Result};
use crate::provider::{
    CheckoutSessionParams, CheckoutSessionStatus, CreatedCheckoutSession, PaymentProvider,
};

#[derive(Default)]
struct MockState {
    sessions: Vec<(String, CheckoutSessionParams)>,
    paid_sessions: HashSet<String>,
    accounts: HashMap<String, bool>,
}

/// Mock payment provider with in-memory accounts and sessions
#[derive(Default)]
pub struct MockPaymentProvider {
    state: Mutex<MockState>,
    next_id: AtomicU64,
    account_lookups: AtomicU64,
    failing: AtomicBool,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}_{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn check_failing(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PaymentError::Stripe("mock provider unavailable".into()));
        }
        Ok(())
    }

    /// Make every subsequent call fail with an upstream error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Register an account and whether it can accept charges
    pub async fn set_charges_enabled(&self, account_id: &str, enabled: bool) {
        self.state
            .lock()
            .await
            .accounts
            .insert(account_id.to_string(), enabled);
    }

    /// Mark a session as paid
    pub async fn mark_paid(&self, session_id: &str) {
        self.state
            .lock()
            .await
            .paid_sessions
            .insert(session_id.to_string());
    }

    /// Every checkout session requested so far
    pub async fn sessions(&self) -> Vec<CheckoutSessionParams> {
        self.state
            .lock()
            .await
            .sessions
            .iter()
            .map(|(_, params)| params.clone())
            .collect()
    }

    /// Number of `charges_enabled` lookups
    pub fn account_lookups(&self) -> u64 {
        self.account_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> Result<CreatedCheckoutSession> {
        self.check_failing()?;

        let session_id = self.next_id("cs_test");
        self.state
            .lock()
            .await
            .sessions
            .push((session_id.clone(), params.clone()));

        Ok(CreatedCheckoutSession {
            url: format!("https://checkout.mock/pay/{session_id}"),
            session_id,
        })
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSessionStatus> {
        self.check_failing()?;

        let state = self.state.lock().await;
        if !state.sessions.iter().any(|(id, _)| id == session_id) {
            return Err(PaymentError::Stripe(format!("No such checkout session: {session_id}")));
        }

        Ok(CheckoutSessionStatus {
            session_id: session_id.to_string(),
            paid: state.paid_sessions.contains(session_id),
        })
    }

    async fn create_connected_account(&self, _email: &str) -> Result<String> {
        self.check_failing()?;

        let account_id = self.next_id("acct_mock");
        self.set_charges_enabled(&account_id, false).await;
        Ok(account_id)
    }

    async fn create_onboarding_link(
        &self,
        account_id: &str,
        _refresh_url: &str,
        _return_url: &str,
    ) -> Result<String> {
        self.check_failing()?;
        Ok(format!("https://connect.mock/setup/{account_id}"))
    }

    async fn charges_enabled(&self, account_id: &str) -> Result<bool> {
        self.check_failing()?;
        self.account_lookups.fetch_add(1, Ordering::SeqCst);

        self.state
            .lock()
            .await
            .accounts
            .get(account_id)
            .copied()
            .ok_or_else(|| PaymentError::Stripe(format!("No such account: {account_id}")))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn params() -> CheckoutSessionParams {
        CheckoutSessionParams {
            amount: 3000,
            currency: "jpy".into(),
            product_name: "Lesson".into(),
            product_description: None,
            customer_email: "taro@example.com".into(),
            success_url: "http://localhost/success".into(),
            cancel_url: "http://localhost/cancel".into(),
            metadata: BTreeMap::new(),
            transfer: None,
        }
    }

    #[tokio::test]
    async fn test_sessions_start_unpaid() {
        let provider = MockPaymentProvider::new();
        let session = provider.create_checkout_session(&params()).await.unwrap();

        let status = provider.retrieve_checkout_session(&session.session_id).await.unwrap();
        assert!(!status.paid);

        provider.mark_paid(&session.session_id).await;
        let status = provider.retrieve_checkout_session(&session.session_id).await.unwrap();
        assert!(status.paid);
    }

    #[tokio::test]
    async fn test_new_accounts_cannot_charge() {
        let provider = MockPaymentProvider::new();
        let account = provider.create_connected_account("a@example.com").await.unwrap();
        assert!(!provider.charges_enabled(&account).await.unwrap());

        provider.set_charges_enabled(&account, true).await;
        assert!(provider.charges_enabled(&account).await.unwrap());
        assert_eq!(provider.account_lookups(), 2);
    }
}
