//! # lesson-core
//!
//! Lesson catalog and booking ledger for the lesson-booking platform.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                         Store                             │
//! │  ┌────────────────┐          ┌────────────────────────┐  │
//! │  │  LessonStore   │          │     BookingLedger      │  │
//! │  │  instructors   │◀────────▶│  commit_booking (UoW)  │  │
//! │  │  lessons       │  booked  │  bookings              │  │
//! │  └────────────────┘          └────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//!          MemoryStore (dev/tests)      PgStore (production)
//! ```
//!
//! For every lesson, `booked` is true if and only if a ledger entry exists
//! for it. `commit_booking` is the only operation that can change either side.

pub mod error;
pub mod model;
pub mod store;
pub mod validation;

pub use error::{Result, StoreError};
pub use model::{
    Booking, BookingCommit, BookingId, BookingStatus, CommitOutcome, Instructor, InstructorId,
    InstructorProfile, Lesson, LessonId, NewInstructor, NewLesson, Principal,
    DEFAULT_DURATION_MINUTES, MIN_LESSON_PRICE,
};
pub use store::{BookingLedger, LessonStore, MemoryStore, PgStore, PgStoreConfig, Store};
