//! PostgreSQL store
//!
//! `commit_booking` runs in one transaction: the lesson row is locked with
//! `SELECT ... FOR UPDATE`, and the flag flip is additionally conditional on
//! `is_booked = FALSE` with its affected-row count checked. A concurrent
//! committer blocks on the row lock and then observes `is_booked = TRUE`.
//! The unique indexes on `bookings.lesson_id` and
//! `bookings.payment_intent_id` reject anything that slips past.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};

use super::{BookingLedger, LessonStore};
use crate::error::{Result, StoreError};
use crate::model::{
    Booking, BookingCommit, BookingId, BookingStatus, CommitOutcome, Instructor, InstructorId,
    Lesson, LessonId, NewInstructor, NewLesson,
};

/// Connection settings
#[derive(Clone, Debug)]
pub struct PgStoreConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl PgStoreConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(FromRow)]
struct InstructorRow {
    id: String,
    email: String,
    name: String,
    avatar_url: Option<String>,
    payment_account_id: Option<String>,
    onboarded_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<InstructorRow> for Instructor {
    fn from(row: InstructorRow) -> Self {
        Self {
            id: InstructorId::from_string(row.id),
            email: row.email,
            name: row.name,
            avatar_url: row.avatar_url,
            payment_account_id: row.payment_account_id,
            onboarded_at: row.onboarded_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct LessonRow {
    id: String,
    instructor_id: String,
    title: String,
    description: Option<String>,
    price: i64,
    duration_minutes: i32,
    start_at: DateTime<Utc>,
    meeting_url: Option<String>,
    capacity: i32,
    is_booked: bool,
    created_at: DateTime<Utc>,
}

impl From<LessonRow> for Lesson {
    fn from(row: LessonRow) -> Self {
        Self {
            id: LessonId::from_string(row.id),
            instructor_id: InstructorId::from_string(row.instructor_id),
            title: row.title,
            description: row.description,
            price: row.price,
            duration_minutes: row.duration_minutes,
            start_at: row.start_at,
            meeting_url: row.meeting_url,
            capacity: row.capacity,
            booked: row.is_booked,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct BookingRow {
    id: String,
    lesson_id: String,
    student_name: String,
    student_email: String,
    payment_intent_id: String,
    amount: i64,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self> {
        let status = BookingStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Database(format!("unknown booking status: {}", row.status)))?;
        Ok(Self {
            id: BookingId::from_string(row.id),
            lesson_id: LessonId::from_string(row.lesson_id),
            student_name: row.student_name,
            student_email: row.student_email,
            payment_intent_id: row.payment_intent_id,
            amount: row.amount,
            status,
            created_at: row.created_at,
        })
    }
}

const INSTRUCTOR_COLUMNS: &str =
    "id, email, name, avatar_url, payment_account_id, onboarded_at, created_at, updated_at";

const LESSON_COLUMNS: &str = "id, instructor_id, title, description, price, duration_minutes, \
     start_at, meeting_url, capacity, is_booked, created_at";

const BOOKING_COLUMNS: &str =
    "id, lesson_id, student_name, student_email, payment_intent_id, amount, status, created_at";

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Open a connection pool
    pub async fn connect(config: &PgStoreConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await?;

        tracing::info!(max_connections = config.max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn fetch_booking(&self, column: &str, value: &str) -> Result<Option<Booking>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE {column} = $1");
        sqlx::query_as::<_, BookingRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?
            .map(Booking::try_from)
            .transpose()
    }
}

#[async_trait]
impl LessonStore for PgStore {
    async fn ensure_instructor(&self, new: NewInstructor) -> Result<Instructor> {
        let candidate = Instructor::new(new);

        // No-op update so RETURNING yields the existing row on conflict
        let sql = format!(
            "INSERT INTO instructors (id, email, name, avatar_url, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $5) \
             ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email \
             RETURNING {INSTRUCTOR_COLUMNS}"
        );
        let row = sqlx::query_as::<_, InstructorRow>(&sql)
            .bind(candidate.id.as_str())
            .bind(&candidate.email)
            .bind(&candidate.name)
            .bind(&candidate.avatar_url)
            .bind(candidate.created_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }

    async fn get_instructor(&self, id: &InstructorId) -> Result<Option<Instructor>> {
        let sql = format!("SELECT {INSTRUCTOR_COLUMNS} FROM instructors WHERE id = $1");
        let row = sqlx::query_as::<_, InstructorRow>(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn find_instructor_by_email(&self, email: &str) -> Result<Option<Instructor>> {
        let sql = format!("SELECT {INSTRUCTOR_COLUMNS} FROM instructors WHERE email = $1");
        let row = sqlx::query_as::<_, InstructorRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn set_payment_account(
        &self,
        id: &InstructorId,
        name: &str,
        account_id: &str,
    ) -> Result<Instructor> {
        let sql = format!(
            "UPDATE instructors SET name = $2, payment_account_id = $3, updated_at = now() \
             WHERE id = $1 RETURNING {INSTRUCTOR_COLUMNS}"
        );
        let row = sqlx::query_as::<_, InstructorRow>(&sql)
            .bind(id.as_str())
            .bind(name)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::InstructorNotFound(id.clone()))?;
        Ok(row.into())
    }

    async fn mark_onboarded(&self, id: &InstructorId, at: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let stored: Option<Option<DateTime<Utc>>> = sqlx::query_scalar(
            "UPDATE instructors \
             SET onboarded_at = COALESCE(onboarded_at, $2), updated_at = now() \
             WHERE id = $1 RETURNING onboarded_at",
        )
        .bind(id.as_str())
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        stored
            .flatten()
            .ok_or_else(|| StoreError::InstructorNotFound(id.clone()))
    }

    async fn create_lesson(&self, new: NewLesson) -> Result<Lesson> {
        let lesson = Lesson::new(new.validated()?);

        let result = sqlx::query(
            "INSERT INTO lessons (id, instructor_id, title, description, price, duration_minutes, \
             start_at, meeting_url, capacity, is_booked, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, FALSE, $10)",
        )
        .bind(lesson.id.as_str())
        .bind(lesson.instructor_id.as_str())
        .bind(&lesson.title)
        .bind(&lesson.description)
        .bind(lesson.price)
        .bind(lesson.duration_minutes)
        .bind(lesson.start_at)
        .bind(&lesson.meeting_url)
        .bind(lesson.capacity)
        .bind(lesson.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(lesson),
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                Err(StoreError::InstructorNotFound(lesson.instructor_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_lesson(&self, id: &LessonId) -> Result<Option<Lesson>> {
        let sql = format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = $1");
        let row = sqlx::query_as::<_, LessonRow>(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn list_lessons(&self, instructor_id: &InstructorId) -> Result<Vec<Lesson>> {
        let sql = format!(
            "SELECT {LESSON_COLUMNS} FROM lessons WHERE instructor_id = $1 ORDER BY start_at DESC"
        );
        let rows = sqlx::query_as::<_, LessonRow>(&sql)
            .bind(instructor_id.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_available_lessons(
        &self,
        instructor_id: &InstructorId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Lesson>> {
        let sql = format!(
            "SELECT {LESSON_COLUMNS} FROM lessons \
             WHERE instructor_id = $1 AND is_booked = FALSE AND start_at > $2 \
             ORDER BY start_at DESC"
        );
        let rows = sqlx::query_as::<_, LessonRow>(&sql)
            .bind(instructor_id.as_str())
            .bind(now)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Closed PostgreSQL pool");
    }
}

#[async_trait]
impl BookingLedger for PgStore {
    async fn commit_booking(&self, commit: &BookingCommit) -> Result<CommitOutcome> {
        let mut tx = self.pool.begin().await?;

        // Blocks concurrent committers on this lesson until we finish
        let locked: Option<(i64, bool)> =
            sqlx::query_as("SELECT price, is_booked FROM lessons WHERE id = $1 FOR UPDATE")
                .bind(commit.lesson_id.as_str())
                .fetch_optional(&mut *tx)
                .await?;

        let Some((price, booked)) = locked else {
            tx.rollback().await?;
            return Err(StoreError::LessonNotFound(commit.lesson_id.clone()));
        };
        if booked {
            tx.rollback().await?;
            return Ok(CommitOutcome::AlreadyBooked {
                lesson_id: commit.lesson_id.clone(),
            });
        }

        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE payment_intent_id = $1");
        let existing = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(&commit.payment_intent_id)
            .fetch_optional(&mut *tx)
            .await?;
        if let Some(row) = existing {
            tx.rollback().await?;
            return Ok(CommitOutcome::DuplicatePayment {
                existing: row.try_into()?,
            });
        }

        let flipped = sqlx::query("UPDATE lessons SET is_booked = TRUE WHERE id = $1 AND is_booked = FALSE")
            .bind(commit.lesson_id.as_str())
            .execute(&mut *tx)
            .await?;
        if flipped.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(CommitOutcome::AlreadyBooked {
                lesson_id: commit.lesson_id.clone(),
            });
        }

        let booking = Booking::confirmed(commit, price);
        sqlx::query(
            "INSERT INTO bookings (id, lesson_id, student_name, student_email, payment_intent_id, \
             amount, status, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(booking.id.as_str())
        .bind(booking.lesson_id.as_str())
        .bind(&booking.student_name)
        .bind(&booking.student_email)
        .bind(&booking.payment_intent_id)
        .bind(booking.amount)
        .bind(booking.status.as_str())
        .bind(booking.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(CommitOutcome::Committed(booking))
    }

    async fn booking_for_lesson(&self, lesson_id: &LessonId) -> Result<Option<Booking>> {
        self.fetch_booking("lesson_id", lesson_id.as_str()).await
    }

    async fn booking_by_payment(&self, payment_intent_id: &str) -> Result<Option<Booking>> {
        self.fetch_booking("payment_intent_id", payment_intent_id).await
    }
}
