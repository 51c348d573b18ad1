//! Stripe Integration
//!
//! Hosted Checkout for lesson payments and Connect (standard accounts) for
//! instructor payouts.

use std::collections::HashMap;

use async_trait::async_trait;
use stripe::{
    Account, AccountId, AccountLink, AccountLinkType, AccountType, CheckoutSession,
    CheckoutSessionId, CheckoutSessionMode, CheckoutSessionPaymentStatus, Client, CreateAccount,
    CreateAccountCapabilities, CreateAccountCapabilitiesCardPayments,
    CreateAccountCapabilitiesTransfers, CreateAccountLink, CreateCheckoutSession,
    CreateCheckoutSessionLineItems, CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData, CreateCheckoutSessionPaymentIntentData,
    CreateCheckoutSessionPaymentIntentDataTransferData, Currency,
};

use crate::error::{PaymentError, Result};
use crate::provider::{
    CheckoutSessionParams, CheckoutSessionStatus, CreatedCheckoutSession, PaymentProvider,
};

/// Stripe client wrapper
pub struct StripeClient {
    client: Client,
    account_country: String,
}

impl StripeClient {
    /// Create a new Stripe client. Rejects an empty key or a malformed
    /// country code.
    pub fn new(secret_key: &str, account_country: &str) -> Result<Self> {
        if secret_key.trim().is_empty() {
            return Err(PaymentError::Config("Stripe secret key is empty".into()));
        }
        if account_country.len() != 2 {
            return Err(PaymentError::Config(format!(
                "invalid account country: {account_country}"
            )));
        }

        Ok(Self {
            client: Client::new(secret_key),
            account_country: account_country.to_uppercase(),
        })
    }
}

/// Parse a lowercase ISO currency code into Stripe's enum
pub fn parse_currency(code: &str) -> Result<Currency> {
    serde_json::from_value(serde_json::Value::String(code.to_lowercase()))
        .map_err(|_| PaymentError::Config(format!("unsupported currency: {code}")))
}

fn stripe_err(e: stripe::StripeError) -> PaymentError {
    PaymentError::Stripe(e.to_string())
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionParams,
    ) -> Result<CreatedCheckoutSession> {
        let currency = parse_currency(&request.currency)?;
        let metadata: HashMap<String, String> = request
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut params = CreateCheckoutSession::new();
        params.mode = Some(CheckoutSessionMode::Payment);
        params.customer_email = Some(&request.customer_email);
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);
        params.metadata = Some(metadata.clone());

        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            quantity: Some(1),
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency,
                unit_amount: Some(request.amount),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: request.product_name.clone(),
                    description: request.product_description.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);

        // Metadata is mirrored onto the payment intent for reconciliation
        let mut intent_data = CreateCheckoutSessionPaymentIntentData {
            metadata: Some(metadata),
            ..Default::default()
        };
        if let Some(ref transfer) = request.transfer {
            intent_data.application_fee_amount = Some(transfer.application_fee);
            intent_data.transfer_data = Some(CreateCheckoutSessionPaymentIntentDataTransferData {
                amount: None,
                destination: transfer.destination.clone(),
            });
        }
        params.payment_intent_data = Some(intent_data);

        let session = CheckoutSession::create(&self.client, params)
            .await
            .map_err(stripe_err)?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::Stripe("No checkout URL returned".into()))?;

        Ok(CreatedCheckoutSession {
            session_id: session.id.to_string(),
            url,
        })
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSessionStatus> {
        let id: CheckoutSessionId = session_id
            .parse()
            .map_err(|_| PaymentError::Validation(format!("invalid session id: {session_id}")))?;

        let session = CheckoutSession::retrieve(&self.client, &id, &[])
            .await
            .map_err(stripe_err)?;

        Ok(CheckoutSessionStatus {
            session_id: session.id.to_string(),
            paid: matches!(
                session.payment_status,
                CheckoutSessionPaymentStatus::Paid | CheckoutSessionPaymentStatus::NoPaymentRequired
            ),
        })
    }

    async fn create_connected_account(&self, email: &str) -> Result<String> {
        let mut params = CreateAccount::new();
        params.type_ = Some(AccountType::Standard);
        params.country = Some(&self.account_country);
        params.email = Some(email);
        params.capabilities = Some(CreateAccountCapabilities {
            card_payments: Some(CreateAccountCapabilitiesCardPayments {
                requested: Some(true),
            }),
            transfers: Some(CreateAccountCapabilitiesTransfers {
                requested: Some(true),
            }),
            ..Default::default()
        });

        let account = Account::create(&self.client, params)
            .await
            .map_err(stripe_err)?;

        tracing::info!(account_id = %account.id, "Created Stripe connected account");
        Ok(account.id.to_string())
    }

    async fn create_onboarding_link(
        &self,
        account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<String> {
        let account: AccountId = account_id
            .parse()
            .map_err(|_| PaymentError::Stripe(format!("invalid account id: {account_id}")))?;

        let mut params = CreateAccountLink::new(account, AccountLinkType::AccountOnboarding);
        params.refresh_url = Some(refresh_url);
        params.return_url = Some(return_url);

        let link = AccountLink::create(&self.client, params)
            .await
            .map_err(stripe_err)?;
        Ok(link.url)
    }

    async fn charges_enabled(&self, account_id: &str) -> Result<bool> {
        let id: AccountId = account_id
            .parse()
            .map_err(|_| PaymentError::Stripe(format!("invalid account id: {account_id}")))?;

        let account = Account::retrieve(&self.client, &id, &[])
            .await
            .map_err(stripe_err)?;
        Ok(account.charges_enabled.unwrap_or(false))
    }

    fn name(&self) -> &str {
        "stripe"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(StripeClient::new("  ", "JP"), Err(PaymentError::Config(_))));
        assert!(StripeClient::new("sk_test_123", "jp").is_ok());
    }

    #[test]
    fn test_parse_currency() {
        assert_eq!(parse_currency("jpy").unwrap(), Currency::JPY);
        assert_eq!(parse_currency("USD").unwrap(), Currency::USD);
        assert!(parse_currency("zzz").is_err());
    }
}
