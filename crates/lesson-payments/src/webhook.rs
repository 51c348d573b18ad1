//! Webhook Booking Commit
//!
//! Turns a provider-delivered, possibly duplicated or reordered
//! "checkout completed" event into at most one ledger entry:
//!
//! 1. authenticate the raw bytes against the signing secret
//! 2. acknowledge every other event kind without side effects
//! 3. extract lesson id, student name/email and payment transaction id
//! 4. hand the commit to the store as a single unit of work
//!
//! A replay, or a concurrent delivery that loses the race, observes
//! `booked = true` inside its own unit of work and is acknowledged without
//! writing. Failures leave no partial state; the provider's redelivery is
//! the retry strategy.

use std::sync::Arc;

use lesson_core::{Booking, BookingLedger, CommitOutcome, LessonId};

use crate::error::{PaymentError, Result};
use crate::event::{self, CompletedCheckout, WebhookEvent};
use crate::signature::WebhookVerifier;

/// What the handler did with an authenticated event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// New ledger entry committed
    Booked(Booking),

    /// Lesson already booked; replay acknowledged
    AlreadyBooked { lesson_id: LessonId },

    /// Transaction id already recorded; replay acknowledged
    DuplicatePayment { payment_intent_id: String },

    /// Event kind not handled
    Ignored { event_type: String },
}

/// Webhook handler
pub struct WebhookHandler<S: BookingLedger + ?Sized> {
    ledger: Arc<S>,
    verifier: WebhookVerifier,
}

impl<S: BookingLedger + ?Sized> WebhookHandler<S> {
    pub fn new(ledger: Arc<S>, verifier: WebhookVerifier) -> Self {
        Self { ledger, verifier }
    }

    pub fn verifier(&self) -> &WebhookVerifier {
        &self.verifier
    }

    /// Authenticate, filter, extract and commit one delivery
    pub async fn process(&self, payload: &[u8], signature: Option<&str>) -> Result<WebhookOutcome> {
        let event = self.authenticate(payload, signature)?;
        self.handle(event).await
    }

    /// Verify the signature over the raw bytes, then parse the event
    pub fn authenticate(&self, payload: &[u8], signature: Option<&str>) -> Result<WebhookEvent> {
        let signature = signature
            .ok_or_else(|| PaymentError::WebhookSignature("missing signature header".into()))?;

        if let Err(e) = self.verifier.verify(payload, signature) {
            tracing::warn!(error = %e, "Rejected webhook with invalid signature");
            return Err(e);
        }

        event::parse_event(payload).inspect_err(|e| {
            tracing::error!(error = %e, "Rejected malformed webhook event");
        })
    }

    /// Process an authenticated event
    pub async fn handle(&self, event: WebhookEvent) -> Result<WebhookOutcome> {
        match event {
            WebhookEvent::CheckoutCompleted(checkout) => self.commit(&checkout).await,
            WebhookEvent::Other { event_id, event_type } => {
                tracing::debug!(event_id = %event_id, event_type = %event_type, "Unhandled webhook event");
                Ok(WebhookOutcome::Ignored { event_type })
            }
        }
    }

    async fn commit(&self, checkout: &CompletedCheckout) -> Result<WebhookOutcome> {
        tracing::info!(
            event_id = %checkout.event_id,
            session_id = %checkout.session_id,
            lesson_id = %checkout.lesson_id,
            "Processing completed checkout"
        );

        let outcome = self
            .ledger
            .commit_booking(&checkout.to_commit())
            .await
            .map_err(|e| {
                tracing::error!(
                    lesson_id = %checkout.lesson_id,
                    payment_intent = %checkout.payment_intent_id,
                    error = %e,
                    "Booking commit failed"
                );
                PaymentError::from(e)
            })?;

        Ok(match outcome {
            CommitOutcome::Committed(booking) => {
                tracing::info!(
                    booking_id = %booking.id,
                    lesson_id = %booking.lesson_id,
                    amount = booking.amount,
                    payment_intent = %booking.payment_intent_id,
                    "Booking confirmed"
                );
                WebhookOutcome::Booked(booking)
            }
            CommitOutcome::AlreadyBooked { lesson_id } => {
                tracing::info!(
                    lesson_id = %lesson_id,
                    payment_intent = %checkout.payment_intent_id,
                    "Lesson already booked, acknowledging replay"
                );
                WebhookOutcome::AlreadyBooked { lesson_id }
            }
            CommitOutcome::DuplicatePayment { existing } => {
                if existing.lesson_id == checkout.lesson_id {
                    tracing::info!(payment_intent = %existing.payment_intent_id, "Payment already recorded");
                } else {
                    tracing::warn!(
                        payment_intent = %existing.payment_intent_id,
                        booked_lesson = %existing.lesson_id,
                        event_lesson = %checkout.lesson_id,
                        "Payment already recorded for a different lesson"
                    );
                }
                WebhookOutcome::DuplicatePayment {
                    payment_intent_id: existing.payment_intent_id,
                }
            }
        })
    }
}
