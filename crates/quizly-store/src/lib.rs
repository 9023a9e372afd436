//! SQLite-backed storage for quizzes and scored attempts.
//!
//! One `quizly.db` file in WAL mode. Quizzes are written atomically with
//! all of their questions; deletes are soft (a `deleted_at` stamp) and
//! applied as a single atomic UPDATE so readers never observe a
//! half-deleted quiz.

pub mod sqlite;

pub use sqlite::{QuizStore, StoreError};
