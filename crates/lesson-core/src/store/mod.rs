//! Persistence
//!
//! Three related tables: instructors, lessons (foreign key to instructor) and
//! bookings (unique foreign key to lesson, unique payment transaction id).
//!
//! [`BookingLedger::commit_booking`] is the only path that writes a booking or
//! flips `Lesson::booked`. Implementations must run the re-fetch, the
//! decision and both writes as one indivisible exchange with the store, so
//! that `booked == true` holds exactly when a ledger entry exists, across
//! processes and under concurrent or replayed commits.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PgStore, PgStoreConfig};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{
    Booking, BookingCommit, CommitOutcome, Instructor, InstructorId, Lesson, LessonId,
    NewInstructor, NewLesson,
};

/// Instructor and lesson catalog
#[async_trait]
pub trait LessonStore: Send + Sync {
    /// Get the instructor with this email, creating it on first access
    async fn ensure_instructor(&self, new: NewInstructor) -> Result<Instructor>;

    async fn get_instructor(&self, id: &InstructorId) -> Result<Option<Instructor>>;

    async fn find_instructor_by_email(&self, email: &str) -> Result<Option<Instructor>>;

    /// Record the provider account and display name chosen during onboarding
    async fn set_payment_account(
        &self,
        id: &InstructorId,
        name: &str,
        account_id: &str,
    ) -> Result<Instructor>;

    /// Set the onboarding timestamp if none is recorded yet.
    ///
    /// Returns the stored timestamp, which is `at` only for the first caller.
    async fn mark_onboarded(&self, id: &InstructorId, at: DateTime<Utc>) -> Result<DateTime<Utc>>;

    /// Validate and persist a new lesson
    async fn create_lesson(&self, new: NewLesson) -> Result<Lesson>;

    async fn get_lesson(&self, id: &LessonId) -> Result<Option<Lesson>>;

    /// All lessons of an instructor, latest start first
    async fn list_lessons(&self, instructor_id: &InstructorId) -> Result<Vec<Lesson>>;

    /// Unbooked lessons starting after `now`, latest start first
    async fn list_available_lessons(
        &self,
        instructor_id: &InstructorId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Lesson>>;

    /// Backend name for health reporting
    fn backend(&self) -> &'static str;

    /// Release connections. Called once on shutdown.
    async fn close(&self) {}
}

/// Append-only ledger of confirmed payments
#[async_trait]
pub trait BookingLedger: Send + Sync {
    /// Atomically commit a paid checkout.
    ///
    /// Within one unit of work: re-fetch the lesson, fail with
    /// `LessonNotFound` if absent, return `AlreadyBooked` if it is booked,
    /// return `DuplicatePayment` if the transaction id is already recorded,
    /// otherwise insert a confirmed entry for the lesson price and flip the
    /// lesson to booked.
    async fn commit_booking(&self, commit: &BookingCommit) -> Result<CommitOutcome>;

    async fn booking_for_lesson(&self, lesson_id: &LessonId) -> Result<Option<Booking>>;

    async fn booking_by_payment(&self, payment_intent_id: &str) -> Result<Option<Booking>>;
}

/// Full store used by the application
pub trait Store: LessonStore + BookingLedger {}

impl<T: LessonStore + BookingLedger + ?Sized> Store for T {}
