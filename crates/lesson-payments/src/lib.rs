//! # lesson-payments
//!
//! Money movement for lesson-booking: checkout, instructor payout
//! onboarding, and the webhook that turns a completed payment into a
//! confirmed booking.
//!
//! ## Booking Flow
//!
//! ```text
//! ┌──────────────┐  session   ┌─────────────────┐  redirect  ┌─────────────┐
//! │   Checkout   │───────────▶│ Provider Hosted │───────────▶│  /success   │
//! │  Initiator   │  metadata  │  Checkout Page  │            │ (poll paid) │
//! └──────────────┘            └────────┬────────┘            └─────────────┘
//!                                      │ checkout.session.completed
//!                                      ▼ (at least once, any order)
//!                             ┌─────────────────┐  unit of   ┌───────────────┐
//!                             │ WebhookHandler  │───────────▶│ BookingLedger │
//!                             │ verify + parse  │    work    │ + lessons     │
//!                             └─────────────────┘            └───────────────┘
//! ```
//!
//! The checkout side never writes bookings. The webhook is the only writer,
//! and a lesson is booked at most once no matter how many times, or how
//! concurrently, the provider delivers the event.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lesson_payments::{WebhookHandler, WebhookVerifier, WebhookOutcome};
//!
//! let handler = WebhookHandler::new(store, WebhookVerifier::new("whsec_xxx")?);
//!
//! match handler.process(&body, signature.as_deref()).await? {
//!     WebhookOutcome::Booked(booking) => println!("booked {}", booking.lesson_id),
//!     _ => {} // replays and other events are acknowledged
//! }
//! ```

mod checkout;
mod error;
mod event;
mod mock;
mod onboarding;
mod provider;
mod signature;
mod status;
mod stripe_client;
mod webhook;

pub use checkout::{CheckoutInitiator, CheckoutRequest, CheckoutSettings};
pub use error::{PaymentError, Result};
pub use event::{parse_event, CompletedCheckout, WebhookEvent, CHECKOUT_COMPLETED};
pub use mock::MockPaymentProvider;
pub use onboarding::InstructorOnboarding;
pub use provider::{
    metadata, CheckoutSessionParams, CheckoutSessionStatus, CreatedCheckoutSession,
    PaymentProvider, Transfer,
};
pub use signature::{WebhookVerifier, DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER};
pub use status::{OnboardingStatus, StatusProjector};
pub use stripe_client::{parse_currency, StripeClient};
pub use webhook::{WebhookHandler, WebhookOutcome};
