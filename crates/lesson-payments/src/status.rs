//! Status Projector
//!
//! Read-side answers derived from stored state. Onboarding completion is
//! looked up live on the provider until it succeeds once; after that the
//! stored timestamp is authoritative.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lesson_core::{InstructorId, Lesson, LessonId, LessonStore};
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};
use crate::provider::PaymentProvider;

/// Onboarding state of an instructor
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingStatus {
    pub completed: bool,

    #[serde(rename = "hasStripeAccount")]
    pub has_payment_account: bool,

    #[serde(rename = "onboardingAt")]
    pub onboarded_at: Option<DateTime<Utc>>,
}

/// Status projector
pub struct StatusProjector<S: LessonStore + ?Sized> {
    store: Arc<S>,
    provider: Arc<dyn PaymentProvider>,
}

impl<S: LessonStore + ?Sized> StatusProjector<S> {
    pub fn new(store: Arc<S>, provider: Arc<dyn PaymentProvider>) -> Self {
        Self { store, provider }
    }

    /// Unbooked lessons of an instructor starting after `now`, latest start first
    pub async fn available_lessons(
        &self,
        instructor_id: &InstructorId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Lesson>> {
        Ok(self.store.list_available_lessons(instructor_id, now).await?)
    }

    /// Whether a lesson can still be sold
    pub async fn is_bookable(&self, lesson_id: &LessonId, now: DateTime<Utc>) -> Result<bool> {
        self.store
            .get_lesson(lesson_id)
            .await?
            .map(|lesson| lesson.is_bookable(now))
            .ok_or_else(|| PaymentError::LessonNotFound(lesson_id.clone()))
    }

    /// Onboarding state for the instructor with this email
    pub async fn onboarding_status(&self, email: &str) -> Result<OnboardingStatus> {
        let Some(instructor) = self.store.find_instructor_by_email(email).await? else {
            return Ok(OnboardingStatus::default());
        };
        let Some(account_id) = instructor.payment_account_id.as_deref() else {
            return Ok(OnboardingStatus::default());
        };

        if let Some(at) = instructor.onboarded_at {
            return Ok(OnboardingStatus {
                completed: true,
                has_payment_account: true,
                onboarded_at: Some(at),
            });
        }

        if !self.provider.charges_enabled(account_id).await? {
            return Ok(OnboardingStatus {
                completed: false,
                has_payment_account: true,
                onboarded_at: None,
            });
        }

        let at = self.store.mark_onboarded(&instructor.id, Utc::now()).await?;
        tracing::info!(instructor_id = %instructor.id, onboarded_at = %at, "Onboarding completed");

        Ok(OnboardingStatus {
            completed: true,
            has_payment_account: true,
            onboarded_at: Some(at),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use lesson_core::{MemoryStore, NewInstructor, NewLesson};

    use super::*;
    use crate::mock::MockPaymentProvider;

    fn projector() -> (Arc<MemoryStore>, Arc<MockPaymentProvider>, StatusProjector<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(MockPaymentProvider::new());
        let projector = StatusProjector::new(store.clone(), provider.clone());
        (store, provider, projector)
    }

    #[tokio::test]
    async fn test_unknown_instructor_not_onboarded() {
        let (_, provider, projector) = projector();
        let status = projector.onboarding_status("nobody@example.com").await.unwrap();
        assert_eq!(status, OnboardingStatus::default());
        assert_eq!(provider.account_lookups(), 0);
    }

    #[tokio::test]
    async fn test_onboarding_cached_after_first_success() {
        let (store, provider, projector) = projector();
        let instructor = store
            .ensure_instructor(NewInstructor::from_identity("sensei@example.com", None, None))
            .await
            .unwrap();
        let account = provider.create_connected_account(&instructor.email).await.unwrap();
        store
            .set_payment_account(&instructor.id, "Sensei", &account)
            .await
            .unwrap();

        let pending = projector.onboarding_status("sensei@example.com").await.unwrap();
        assert!(pending.has_payment_account);
        assert!(!pending.completed);
        assert_eq!(provider.account_lookups(), 1);

        provider.set_charges_enabled(&account, true).await;
        let done = projector.onboarding_status("sensei@example.com").await.unwrap();
        assert!(done.completed);
        let at = done.onboarded_at.unwrap();
        assert_eq!(provider.account_lookups(), 2);

        // Recorded completion is not re-verified
        provider.set_charges_enabled(&account, false).await;
        let cached = projector.onboarding_status("sensei@example.com").await.unwrap();
        assert!(cached.completed);
        assert_eq!(cached.onboarded_at, Some(at));
        assert_eq!(provider.account_lookups(), 2);
    }

    #[tokio::test]
    async fn test_bookable_reflects_booked_flag_and_time() {
        let (store, _, projector) = projector();
        let instructor = store
            .ensure_instructor(NewInstructor::from_identity("sensei@example.com", None, None))
            .await
            .unwrap();
        let lesson = store
            .create_lesson(NewLesson {
                instructor_id: instructor.id.clone(),
                title: "Go".into(),
                description: None,
                price: 1000,
                duration_minutes: 60,
                start_at: Utc::now() + Duration::hours(3),
                meeting_url: None,
                capacity: 1,
            })
            .await
            .unwrap();

        let now = Utc::now();
        assert!(projector.is_bookable(&lesson.id, now).await.unwrap());
        assert!(!projector.is_bookable(&lesson.id, now + Duration::hours(4)).await.unwrap());
        assert_eq!(projector.available_lessons(&instructor.id, now).await.unwrap().len(), 1);

        let mut booked = lesson.clone();
        booked.booked = true;
        store.insert_lesson(booked).await;
        assert!(!projector.is_bookable(&lesson.id, now).await.unwrap());
        assert!(projector.available_lessons(&instructor.id, now).await.unwrap().is_empty());

        let missing = projector.is_bookable(&LessonId::new(), now).await;
        assert!(matches!(missing, Err(PaymentError::LessonNotFound(_))));
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_value(OnboardingStatus::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "completed": false, "hasStripeAccount": false, "onboardingAt": null })
        );
    }
}
