//! In-memory store (for development and tests)
//!
//! All tables sit behind one lock; holding the write guard for the whole of
//! `commit_booking` makes the commit a single unit of work.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{BookingLedger, LessonStore};
use crate::error::{Result, StoreError};
use crate::model::{
    Booking, BookingCommit, BookingId, CommitOutcome, Instructor, InstructorId, Lesson, LessonId,
    NewInstructor, NewLesson,
};

#[derive(Default)]
struct Tables {
    instructors: HashMap<InstructorId, Instructor>,
    instructors_by_email: HashMap<String, InstructorId>,
    lessons: HashMap<LessonId, Lesson>,
    bookings: HashMap<BookingId, Booking>,
    bookings_by_lesson: HashMap<LessonId, BookingId>,
    bookings_by_payment: HashMap<String, BookingId>,
}

impl Tables {
    /// Insert honouring both unique indexes
    fn insert_booking(&mut self, booking: Booking) -> Result<()> {
        if self.bookings_by_lesson.contains_key(&booking.lesson_id) {
            return Err(StoreError::UniqueViolation("bookings_lesson_id_key".into()));
        }
        if self.bookings_by_payment.contains_key(&booking.payment_intent_id) {
            return Err(StoreError::UniqueViolation("bookings_payment_intent_id_key".into()));
        }

        self.bookings_by_lesson.insert(booking.lesson_id.clone(), booking.id.clone());
        self.bookings_by_payment
            .insert(booking.payment_intent_id.clone(), booking.id.clone());
        self.bookings.insert(booking.id.clone(), booking);
        Ok(())
    }

    fn booking_by_payment(&self, payment_intent_id: &str) -> Option<&Booking> {
        self.bookings_by_payment
            .get(payment_intent_id)
            .and_then(|id| self.bookings.get(id))
    }

    fn sorted_latest_first(mut lessons: Vec<Lesson>) -> Vec<Lesson> {
        lessons.sort_by(|a, b| b.start_at.cmp(&a.start_at));
        lessons
    }
}

/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    unique_violations: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of booking inserts rejected by a unique index
    pub fn unique_violations(&self) -> u64 {
        self.unique_violations.load(Ordering::SeqCst)
    }

    /// Number of ledger entries
    pub async fn booking_count(&self) -> usize {
        self.tables.read().await.bookings.len()
    }

    /// Snapshot of every lesson
    pub async fn lessons(&self) -> Vec<Lesson> {
        self.tables.read().await.lessons.values().cloned().collect()
    }

    /// Insert a lesson as-is, bypassing validation
    pub async fn insert_lesson(&self, lesson: Lesson) {
        self.tables.write().await.lessons.insert(lesson.id.clone(), lesson);
    }
}

#[async_trait]
impl LessonStore for MemoryStore {
    async fn ensure_instructor(&self, new: NewInstructor) -> Result<Instructor> {
        let mut tables = self.tables.write().await;

        if let Some(id) = tables.instructors_by_email.get(&new.email) {
            if let Some(existing) = tables.instructors.get(id) {
                return Ok(existing.clone());
            }
        }

        let instructor = Instructor::new(new);
        tables
            .instructors_by_email
            .insert(instructor.email.clone(), instructor.id.clone());
        tables.instructors.insert(instructor.id.clone(), instructor.clone());

        tracing::info!(instructor_id = %instructor.id, "Created instructor");
        Ok(instructor)
    }

    async fn get_instructor(&self, id: &InstructorId) -> Result<Option<Instructor>> {
        Ok(self.tables.read().await.instructors.get(id).cloned())
    }

    async fn find_instructor_by_email(&self, email: &str) -> Result<Option<Instructor>> {
        let tables = self.tables.read().await;
        Ok(tables
            .instructors_by_email
            .get(email)
            .and_then(|id| tables.instructors.get(id))
            .cloned())
    }

    async fn set_payment_account(
        &self,
        id: &InstructorId,
        name: &str,
        account_id: &str,
    ) -> Result<Instructor> {
        let mut tables = self.tables.write().await;

        let taken = tables.instructors.values().any(|i| {
            i.id != *id && i.payment_account_id.as_deref() == Some(account_id)
        });
        if taken {
            return Err(StoreError::UniqueViolation("users_stripe_account_id_key".into()));
        }

        let instructor = tables
            .instructors
            .get_mut(id)
            .ok_or_else(|| StoreError::InstructorNotFound(id.clone()))?;
        instructor.name = name.to_string();
        instructor.payment_account_id = Some(account_id.to_string());
        instructor.updated_at = Utc::now();
        Ok(instructor.clone())
    }

    async fn mark_onboarded(&self, id: &InstructorId, at: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let mut tables = self.tables.write().await;
        let instructor = tables
            .instructors
            .get_mut(id)
            .ok_or_else(|| StoreError::InstructorNotFound(id.clone()))?;

        if let Some(existing) = instructor.onboarded_at {
            return Ok(existing);
        }
        instructor.onboarded_at = Some(at);
        instructor.updated_at = at;
        Ok(at)
    }

    async fn create_lesson(&self, new: NewLesson) -> Result<Lesson> {
        let new = new.validated()?;
        let mut tables = self.tables.write().await;

        if !tables.instructors.contains_key(&new.instructor_id) {
            return Err(StoreError::InstructorNotFound(new.instructor_id));
        }

        let lesson = Lesson::new(new);
        tables.lessons.insert(lesson.id.clone(), lesson.clone());
        Ok(lesson)
    }

    async fn get_lesson(&self, id: &LessonId) -> Result<Option<Lesson>> {
        Ok(self.tables.read().await.lessons.get(id).cloned())
    }

    async fn list_lessons(&self, instructor_id: &InstructorId) -> Result<Vec<Lesson>> {
        let tables = self.tables.read().await;
        let lessons = tables
            .lessons
            .values()
            .filter(|l| l.instructor_id == *instructor_id)
            .cloned()
            .collect();
        Ok(Tables::sorted_latest_first(lessons))
    }

    async fn list_available_lessons(
        &self,
        instructor_id: &InstructorId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Lesson>> {
        let tables = self.tables.read().await;
        let lessons = tables
            .lessons
            .values()
            .filter(|l| l.instructor_id == *instructor_id && l.is_bookable(now))
            .cloned()
            .collect();
        Ok(Tables::sorted_latest_first(lessons))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl BookingLedger for MemoryStore {
    async fn commit_booking(&self, commit: &BookingCommit) -> Result<CommitOutcome> {
        let mut tables = self.tables.write().await;

        let Some(lesson) = tables.lessons.get(&commit.lesson_id) else {
            return Err(StoreError::LessonNotFound(commit.lesson_id.clone()));
        };
        if lesson.booked {
            return Ok(CommitOutcome::AlreadyBooked {
                lesson_id: commit.lesson_id.clone(),
            });
        }
        if let Some(existing) = tables.booking_by_payment(&commit.payment_intent_id) {
            return Ok(CommitOutcome::DuplicatePayment {
                existing: existing.clone(),
            });
        }

        let booking = Booking::confirmed(commit, lesson.price);
        if let Err(e) = tables.insert_booking(booking.clone()) {
            self.unique_violations.fetch_add(1, Ordering::SeqCst);
            return Err(e);
        }
        if let Some(lesson) = tables.lessons.get_mut(&commit.lesson_id) {
            lesson.booked = true;
        }

        Ok(CommitOutcome::Committed(booking))
    }

    async fn booking_for_lesson(&self, lesson_id: &LessonId) -> Result<Option<Booking>> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings_by_lesson
            .get(lesson_id)
            .and_then(|id| tables.bookings.get(id))
            .cloned())
    }

    async fn booking_by_payment(&self, payment_intent_id: &str) -> Result<Option<Booking>> {
        Ok(self
            .tables
            .read()
            .await
            .booking_by_payment(payment_intent_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::model::BookingStatus;

    async fn seeded() -> (MemoryStore, Instructor, Lesson) {
        let store = MemoryStore::new();
        let instructor = store
            .ensure_instructor(NewInstructor::from_identity("sensei@example.com", None, None))
            .await
            .unwrap();
        let lesson = store
            .create_lesson(NewLesson {
                instructor_id: instructor.id.clone(),
                title: "Calligraphy".into(),
                description: None,
                price: 3000,
                duration_minutes: 60,
                start_at: Utc::now() + Duration::days(2),
                meeting_url: None,
                capacity: 1,
            })
            .await
            .unwrap();
        (store, instructor, lesson)
    }

    fn commit(lesson_id: &LessonId, payment_intent_id: &str) -> BookingCommit {
        BookingCommit {
            lesson_id: lesson_id.clone(),
            student_name: "Taro".into(),
            student_email: "taro@example.com".into(),
            payment_intent_id: payment_intent_id.into(),
        }
    }

    #[tokio::test]
    async fn test_ensure_instructor_is_get_or_create() {
        let store = MemoryStore::new();
        let first = store
            .ensure_instructor(NewInstructor::from_identity("a@example.com", Some("A"), None))
            .await
            .unwrap();
        let second = store
            .ensure_instructor(NewInstructor::from_identity("a@example.com", Some("Other"), None))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "A");
    }

    #[tokio::test]
    async fn test_commit_inserts_entry_and_flips_flag() {
        let (store, _, lesson) = seeded().await;

        let outcome = store.commit_booking(&commit(&lesson.id, "pi_123")).await.unwrap();
        let CommitOutcome::Committed(booking) = outcome else {
            panic!("expected commit, got {outcome:?}");
        };
        assert_eq!(booking.amount, 3000);
        assert_eq!(booking.status, BookingStatus::Confirmed);

        let lesson = store.get_lesson(&lesson.id).await.unwrap().unwrap();
        assert!(lesson.booked);
        assert_eq!(store.booking_count().await, 1);
    }

    #[tokio::test]
    async fn test_replay_is_already_booked() {
        let (store, _, lesson) = seeded().await;

        store.commit_booking(&commit(&lesson.id, "pi_123")).await.unwrap();
        let outcome = store.commit_booking(&commit(&lesson.id, "pi_123")).await.unwrap();

        assert_eq!(outcome, CommitOutcome::AlreadyBooked { lesson_id: lesson.id.clone() });
        assert_eq!(store.booking_count().await, 1);
        assert_eq!(store.unique_violations(), 0);
    }

    #[tokio::test]
    async fn test_missing_lesson_writes_nothing() {
        let (store, _, _) = seeded().await;
        let ghost = LessonId::from_string("ghost");

        let result = store.commit_booking(&commit(&ghost, "pi_1")).await;
        assert!(matches!(result, Err(StoreError::LessonNotFound(_))));
        assert_eq!(store.booking_count().await, 0);
    }

    #[tokio::test]
    async fn test_transaction_id_commits_once() {
        let (store, instructor, first) = seeded().await;
        let mut second = first.clone();
        second.id = LessonId::new();
        second.instructor_id = instructor.id.clone();
        store.insert_lesson(second.clone()).await;

        store.commit_booking(&commit(&first.id, "pi_same")).await.unwrap();
        let outcome = store.commit_booking(&commit(&second.id, "pi_same")).await.unwrap();

        assert!(matches!(outcome, CommitOutcome::DuplicatePayment { .. }));
        assert!(!store.get_lesson(&second.id).await.unwrap().unwrap().booked);
        assert_eq!(store.booking_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_commits_book_once() {
        let (store, _, lesson) = seeded().await;
        let store = Arc::new(store);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                let c = commit(&lesson.id, &format!("pi_{i}"));
                tokio::spawn(async move { store.commit_booking(&c).await })
            })
            .collect();

        let mut committed = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_committed() {
                committed += 1;
            }
        }

        assert_eq!(committed, 1);
        assert_eq!(store.booking_count().await, 1);
        assert_eq!(store.unique_violations(), 0);
    }

    #[tokio::test]
    async fn test_available_lessons_filter_and_order() {
        let (store, instructor, booked) = seeded().await;
        let now = Utc::now();

        let mut later = booked.clone();
        later.id = LessonId::new();
        later.start_at = now + Duration::days(10);
        store.insert_lesson(later.clone()).await;

        let mut past = booked.clone();
        past.id = LessonId::new();
        past.start_at = now - Duration::days(1);
        store.insert_lesson(past.clone()).await;

        store.commit_booking(&commit(&booked.id, "pi_1")).await.unwrap();

        let available = store.list_available_lessons(&instructor.id, now).await.unwrap();
        assert_eq!(available.iter().map(|l| l.id.clone()).collect::<Vec<_>>(), vec![later.id.clone()]);

        let all = store.list_lessons(&instructor.id).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, later.id);
        assert_eq!(all[2].id, past.id);
    }

    #[tokio::test]
    async fn test_mark_onboarded_keeps_first_timestamp() {
        let (store, instructor, _) = seeded().await;
        let first = Utc::now();
        let later = first + Duration::minutes(5);

        assert_eq!(store.mark_onboarded(&instructor.id, first).await.unwrap(), first);
        assert_eq!(store.mark_onboarded(&instructor.id, later).await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_create_lesson_requires_instructor() {
        let store = MemoryStore::new();
        let result = store
            .create_lesson(NewLesson {
                instructor_id: InstructorId::from_string("nobody"),
                title: "Orphan".into(),
                description: None,
                price: 500,
                duration_minutes: 30,
                start_at: Utc::now(),
                meeting_url: None,
                capacity: 1,
            })
            .await;
        assert!(matches!(result, Err(StoreError::InstructorNotFound(_))));
    }
}
