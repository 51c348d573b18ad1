//! Webhook Event Parsing

use std::collections::HashMap;

use lesson_core::{BookingCommit, InstructorId, LessonId};
use serde::Deserialize;

use crate::error::{PaymentError, Result};
use crate::provider::metadata;

/// Event kind that triggers a booking commit
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

#[derive(Deserialize)]
struct Envelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: EnvelopeData,
}

#[derive(Deserialize)]
struct EnvelopeData {
    object: serde_json::Value,
}

#[derive(Deserialize)]
struct SessionObject {
    id: String,
    #[serde(default)]
    payment_intent: Option<Expandable>,
    #[serde(default)]
    metadata: Option<HashMap<String, String>>,
}

/// A related object sent either as its id or expanded inline
#[derive(Deserialize)]
#[serde(untagged)]
enum Expandable {
    Id(String),
    Object { id: String },
}

impl Expandable {
    fn id(&self) -> &str {
        match self {
            Expandable::Id(id) | Expandable::Object { id } => id,
        }
    }
}

/// Parsed webhook event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    /// Checkout completed - commit the booking
    CheckoutCompleted(CompletedCheckout),

    /// Acknowledged without side effects
    Other { event_id: String, event_type: String },
}

impl WebhookEvent {
    pub fn event_type(&self) -> &str {
        match self {
            WebhookEvent::CheckoutCompleted(_) => CHECKOUT_COMPLETED,
            WebhookEvent::Other { event_type, .. } => event_type,
        }
    }
}

/// Fields extracted from a completed checkout session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedCheckout {
    pub event_id: String,
    pub session_id: String,
    pub lesson_id: LessonId,
    pub instructor_id: Option<InstructorId>,
    pub student_name: String,
    pub student_email: String,
    pub payment_intent_id: String,
}

impl CompletedCheckout {
    pub fn to_commit(&self) -> BookingCommit {
        BookingCommit {
            lesson_id: self.lesson_id.clone(),
            student_name: self.student_name.clone(),
            student_email: self.student_email.clone(),
            payment_intent_id: self.payment_intent_id.clone(),
        }
    }
}

/// Parse an already-authenticated payload.
///
/// Only `checkout.session.completed` is inspected beyond the envelope. A
/// missing or empty required field is a structural error; no defaults.
pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent> {
    let envelope: Envelope = serde_json::from_slice(payload)
        .map_err(|e| PaymentError::WebhookParse(format!("invalid event envelope: {e}")))?;

    if envelope.event_type != CHECKOUT_COMPLETED {
        return Ok(WebhookEvent::Other {
            event_id: envelope.id,
            event_type: envelope.event_type,
        });
    }

    let session: SessionObject = serde_json::from_value(envelope.data.object)
        .map_err(|e| PaymentError::WebhookParse(format!("invalid checkout session: {e}")))?;
    let meta = session.metadata.unwrap_or_default();

    let required = |key: &str| -> Result<String> {
        meta.get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                PaymentError::WebhookParse(format!(
                    "missing {key} in checkout session {}",
                    session.id
                ))
            })
    };

    let lesson_id = required(metadata::LESSON_ID)?;
    let student_name = required(metadata::STUDENT_NAME)?;
    let student_email = required(metadata::STUDENT_EMAIL)?;

    let payment_intent_id = session
        .payment_intent
        .as_ref()
        .map(Expandable::id)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            PaymentError::WebhookParse(format!(
                "missing payment_intent in checkout session {}",
                session.id
            ))
        })?;

    Ok(WebhookEvent::CheckoutCompleted(CompletedCheckout {
        event_id: envelope.id,
        lesson_id: LessonId::from_string(lesson_id),
        instructor_id: meta
            .get(metadata::INSTRUCTOR_ID)
            .filter(|v| !v.is_empty())
            .map(InstructorId::from_string),
        student_name,
        student_email,
        payment_intent_id,
        session_id: session.id,
    }))
}
