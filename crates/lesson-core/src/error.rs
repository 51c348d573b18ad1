//! Error Types

use thiserror::Error;

use crate::model::{InstructorId, LessonId};

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Store and domain validation errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Lesson does not exist
    #[error("Lesson not found: {0}")]
    LessonNotFound(LessonId),

    /// Instructor does not exist
    #[error("Instructor not found: {0}")]
    InstructorNotFound(InstructorId),

    /// Input rejected before touching the store
    #[error("Validation error: {0}")]
    Validation(String),

    /// A uniqueness constraint rejected a write
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Unit of work could not complete (connection, timeout, rollback)
    #[error("Database error: {0}")]
    Database(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    Migration(String),
}

impl StoreError {
    /// Check if the failed operation may succeed when retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Database(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return StoreError::UniqueViolation(
                    db.constraint().unwrap_or("unknown").to_string(),
                );
            }
        }
        StoreError::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Migration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_database_errors_are_retryable() {
        assert!(StoreError::Database("connection reset".into()).is_retryable());
        assert!(!StoreError::LessonNotFound(LessonId::from_string("l1")).is_retryable());
        assert!(!StoreError::UniqueViolation("bookings_lesson_id_key".into()).is_retryable());
    }
}
