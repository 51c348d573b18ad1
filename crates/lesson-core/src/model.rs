//! Domain Model
//!
//! Instructors publish lessons; a lesson is booked by exactly one ledger
//! entry. `Lesson::booked` is the only field mutated after creation, and only
//! by [`BookingLedger::commit_booking`](crate::store::BookingLedger::commit_booking).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::validation;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4().simple().to_string())
            }

            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// Instructor identifier
    InstructorId
);
string_id!(
    /// Lesson identifier
    LessonId
);
string_id!(
    /// Ledger entry identifier
    BookingId
);

/// An instructor who publishes lessons and receives payouts
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instructor {
    pub id: InstructorId,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,

    /// Connected account on the payment provider
    pub payment_account_id: Option<String>,

    /// First time the provider reported the account can accept charges
    pub onboarded_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Instructor {
    /// Build a fresh record from an identity
    pub fn new(new: NewInstructor) -> Self {
        let now = Utc::now();
        Self {
            id: InstructorId::new(),
            email: new.email,
            name: new.name,
            avatar_url: new.avatar_url,
            payment_account_id: None,
            onboarded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether checkout can route funds to this instructor
    pub fn is_payable(&self) -> bool {
        self.payment_account_id.is_some()
    }

    /// Whether the onboarding completion has been recorded
    pub fn is_onboarded(&self) -> bool {
        self.onboarded_at.is_some()
    }

    pub fn public_profile(&self) -> InstructorProfile {
        InstructorProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            profile_image_url: self.avatar_url.clone(),
        }
    }
}

/// Authenticated identity supplied by the external identity provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

impl Principal {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
            avatar_url: None,
        }
    }

    pub fn to_new_instructor(&self) -> NewInstructor {
        NewInstructor::from_identity(&self.email, self.name.as_deref(), self.avatar_url.as_deref())
    }
}

/// Identity-derived fields for creating an instructor on first access
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewInstructor {
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

impl NewInstructor {
    /// Display name falls back to the email local part
    pub fn from_identity(email: &str, name: Option<&str>, avatar_url: Option<&str>) -> Self {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map_or_else(
                || email.split('@').next().unwrap_or(email).to_string(),
                str::to_string,
            );

        Self {
            email: email.to_string(),
            name,
            avatar_url: avatar_url.map(str::to_string),
        }
    }
}

/// Publicly visible instructor fields
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructorProfile {
    pub id: InstructorId,
    pub name: String,
    pub email: String,
    pub profile_image_url: Option<String>,
}

/// A bookable time slot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: LessonId,
    pub instructor_id: InstructorId,
    pub title: String,
    pub description: Option<String>,

    /// Smallest currency unit
    pub price: i64,

    pub duration_minutes: i32,
    pub start_at: DateTime<Utc>,
    pub meeting_url: Option<String>,

    /// Max simultaneous students
    pub capacity: i32,

    #[serde(rename = "isBooked")]
    pub booked: bool,

    pub created_at: DateTime<Utc>,
}

impl Lesson {
    pub fn new(new: NewLesson) -> Self {
        Self {
            id: LessonId::new(),
            instructor_id: new.instructor_id,
            title: new.title,
            description: new.description,
            price: new.price,
            duration_minutes: new.duration_minutes,
            start_at: new.start_at,
            meeting_url: new.meeting_url,
            capacity: new.capacity,
            booked: false,
            created_at: Utc::now(),
        }
    }

    /// Unbooked and starting after `now`
    pub fn is_bookable(&self, now: DateTime<Utc>) -> bool {
        !self.booked && self.start_at > now
    }
}

/// Minimum lesson price in the smallest currency unit
pub const MIN_LESSON_PRICE: i64 = 100;

/// Default lesson length
pub const DEFAULT_DURATION_MINUTES: i32 = 60;

/// Lesson creation input
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewLesson {
    pub instructor_id: InstructorId,
    pub title: String,
    pub description: Option<String>,
    pub price: i64,
    pub duration_minutes: i32,
    pub start_at: DateTime<Utc>,
    pub meeting_url: Option<String>,
    pub capacity: i32,
}

impl NewLesson {
    /// Check field constraints and normalize empty optionals to `None`
    pub fn validated(mut self) -> Result<Self> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err(StoreError::Validation("title is required".into()));
        }
        if self.price < MIN_LESSON_PRICE {
            return Err(StoreError::Validation(format!(
                "price must be at least {MIN_LESSON_PRICE}"
            )));
        }
        if self.duration_minutes <= 0 {
            return Err(StoreError::Validation("duration must be positive".into()));
        }
        if self.capacity < 1 {
            return Err(StoreError::Validation("capacity must be at least 1".into()));
        }

        self.description = self.description.filter(|d| !d.trim().is_empty());
        self.meeting_url = self.meeting_url.filter(|u| !u.trim().is_empty());
        if let Some(ref link) = self.meeting_url {
            if !validation::is_valid_meeting_url(link) {
                return Err(StoreError::Validation(format!("invalid meeting url: {link}")));
            }
        }

        Ok(self)
    }
}

/// Ledger entry status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "completed" => Some(BookingStatus::Completed),
            _ => None,
        }
    }
}

/// Durable record of a confirmed payment for a lesson
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    pub lesson_id: LessonId,
    pub student_name: String,
    pub student_email: String,

    /// Provider payment-transaction id, unique across the ledger
    pub payment_intent_id: String,

    pub amount: i64,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// Confirmed entry charging the lesson price
    pub fn confirmed(commit: &BookingCommit, amount: i64) -> Self {
        Self {
            id: BookingId::new(),
            lesson_id: commit.lesson_id.clone(),
            student_name: commit.student_name.clone(),
            student_email: commit.student_email.clone(),
            payment_intent_id: commit.payment_intent_id.clone(),
            amount,
            status: BookingStatus::Confirmed,
            created_at: Utc::now(),
        }
    }
}

/// Request to commit a paid checkout to the ledger
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingCommit {
    pub lesson_id: LessonId,
    pub student_name: String,
    pub student_email: String,
    pub payment_intent_id: String,
}

/// Result of a commit unit of work
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Ledger entry inserted and lesson flipped to booked
    Committed(Booking),

    /// Lesson was already booked; nothing written
    AlreadyBooked { lesson_id: LessonId },

    /// Transaction id already recorded; nothing written
    DuplicatePayment { existing: Booking },
}

impl CommitOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_lesson() -> NewLesson {
        NewLesson {
            instructor_id: InstructorId::from_string("inst_1"),
            title: "Guitar basics".into(),
            description: Some(String::new()),
            price: 3000,
            duration_minutes: DEFAULT_DURATION_MINUTES,
            start_at: Utc::now() + Duration::days(1),
            meeting_url: Some(String::new()),
            capacity: 1,
        }
    }

    #[test]
    fn test_validated_normalizes_empty_optionals() {
        let lesson = new_lesson().validated().unwrap();
        assert_eq!(lesson.description, None);
        assert_eq!(lesson.meeting_url, None);
    }

    #[test]
    fn test_price_below_minimum_rejected() {
        let mut lesson = new_lesson();
        lesson.price = 99;
        assert!(matches!(lesson.validated(), Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_capacity_and_title_rules() {
        let mut lesson = new_lesson();
        lesson.capacity = 0;
        assert!(lesson.validated().is_err());

        let mut lesson = new_lesson();
        lesson.title = "   ".into();
        assert!(lesson.validated().is_err());
    }

    #[test]
    fn test_meeting_url_must_be_http() {
        let mut lesson = new_lesson();
        lesson.meeting_url = Some("not a url".into());
        assert!(lesson.validated().is_err());

        let mut lesson = new_lesson();
        lesson.meeting_url = Some("https://meet.example.com/abc".into());
        assert!(lesson.validated().is_ok());
    }

    #[test]
    fn test_instructor_name_falls_back_to_email() {
        let new = NewInstructor::from_identity("taro@example.com", None, None);
        assert_eq!(new.name, "taro");

        let new = NewInstructor::from_identity("taro@example.com", Some("Taro Yamada"), None);
        assert_eq!(new.name, "Taro Yamada");
    }

    #[test]
    fn test_bookable_requires_future_and_unbooked() {
        let now = Utc::now();
        let mut lesson = Lesson::new(new_lesson());
        assert!(lesson.is_bookable(now));

        lesson.booked = true;
        assert!(!lesson.is_bookable(now));

        lesson.booked = false;
        lesson.start_at = now - Duration::hours(1);
        assert!(!lesson.is_bookable(now));
    }

    #[test]
    fn test_booking_status_round_trip_strings() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
            BookingStatus::Completed,
        ] {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::parse("refunded"), None);
    }

    #[test]
    fn test_lesson_wire_format() {
        let lesson = Lesson::new(new_lesson().validated().unwrap());
        let json = serde_json::to_value(&lesson).unwrap();
        assert_eq!(json["isBooked"], false);
        assert_eq!(json["instructorId"], "inst_1");
        assert_eq!(json["durationMinutes"], 60);
        assert!(json.get("booked").is_none());
    }
}
