use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use quizly_core::{
    now_rfc3339, Attempt, AttemptId, Question, Quiz, QuizId, QuizSummary, UserId, VideoReference,
};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS quizzes (
    quiz_id TEXT PRIMARY KEY,
    owner TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    video_ref TEXT NOT NULL,
    created_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_quizzes_owner ON quizzes(owner);
CREATE INDEX IF NOT EXISTS idx_quizzes_owner_created ON quizzes(owner, created_at DESC);

CREATE TABLE IF NOT EXISTS questions (
    quiz_id TEXT NOT NULL REFERENCES quizzes(quiz_id),
    position INTEGER NOT NULL,
    prompt TEXT NOT NULL,
    candidates TEXT NOT NULL,
    correct_index INTEGER NOT NULL,
    explanation TEXT,
    PRIMARY KEY (quiz_id, position)
);

CREATE TABLE IF NOT EXISTS attempts (
    attempt_id TEXT PRIMARY KEY,
    quiz_id TEXT NOT NULL REFERENCES quizzes(quiz_id),
    user_id TEXT NOT NULL,
    answers TEXT NOT NULL,
    score INTEGER NOT NULL,
    breakdown TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_attempts_quiz ON attempts(quiz_id);
CREATE INDEX IF NOT EXISTS idx_attempts_user ON attempts(user_id);
";

/// Store-boundary failures. Ownership is enforced here: the owner column
/// is written once at insert and no operation updates it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("quiz not found: {0}")]
    QuizNotFound(QuizId),
    #[error("attempt not found: {0}")]
    AttemptNotFound(AttemptId),
    #[error("requester does not own this quiz")]
    Forbidden,
    #[error("quiz {0} has no questions")]
    EmptyQuiz(QuizId),
    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// SQLite-backed quiz/attempt store.
pub struct QuizStore {
    conn: Connection,
}

impl QuizStore {
    /// Open or create the store at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(anyhow::Error::from)?;
        }
        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        store.apply_pragmas()?;
        store.apply_schema()?;
        Ok(store)
    }

    /// In-memory store, used by tests and ephemeral pipelines.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.apply_schema()?;
        Ok(store)
    }

    fn apply_pragmas(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    fn apply_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    // ── Quizzes ──

    /// Persist a quiz and all of its questions in one transaction.
    /// All-or-nothing: readers never see a quiz without its questions.
    /// A quiz carries at least one question; anything less is rejected
    /// here so scoring never sees a question-free quiz.
    pub fn save_quiz(&self, quiz: &Quiz) -> Result<QuizId, StoreError> {
        if quiz.questions.is_empty() {
            return Err(StoreError::EmptyQuiz(quiz.id.clone()));
        }
        let video_ref =
            serde_json::to_string(&quiz.video).map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO quizzes (quiz_id, owner, title, description, video_ref, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                quiz.id,
                quiz.owner,
                quiz.title,
                quiz.description,
                video_ref,
                quiz.created_at
            ],
        )?;
        for (position, q) in quiz.questions.iter().enumerate() {
            let candidates = serde_json::to_string(&q.candidates)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
            tx.execute(
                "INSERT INTO questions (quiz_id, position, prompt, candidates, correct_index, explanation)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    quiz.id,
                    position as i64,
                    q.prompt,
                    candidates,
                    q.correct_index as i64,
                    q.explanation
                ],
            )?;
        }
        tx.commit()?;
        tracing::debug!(quiz_id = %quiz.id, questions = quiz.questions.len(), "quiz saved");
        Ok(quiz.id.clone())
    }

    /// Load a quiz by id. Soft-deleted quizzes read as not found.
    pub fn get_quiz(&self, quiz_id: &QuizId) -> Result<Quiz, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT owner, title, description, video_ref, created_at
                 FROM quizzes WHERE quiz_id = ?1 AND deleted_at IS NULL",
                params![quiz_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((owner, title, description, video_ref, created_at)) = row else {
            return Err(StoreError::QuizNotFound(quiz_id.clone()));
        };
        let video: VideoReference = serde_json::from_str(&video_ref)
            .map_err(|e| StoreError::Corrupt(format!("video_ref for {quiz_id}: {e}")))?;

        let mut stmt = self.conn.prepare(
            "SELECT prompt, candidates, correct_index, explanation
             FROM questions WHERE quiz_id = ?1 ORDER BY position",
        )?;
        let questions: Vec<Question> = stmt
            .query_map(params![quiz_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(prompt, candidates, correct_index, explanation)| {
                let candidates: Vec<String> = serde_json::from_str(&candidates)
                    .map_err(|e| StoreError::Corrupt(format!("candidates for {quiz_id}: {e}")))?;
                Ok(Question {
                    prompt,
                    candidates,
                    correct_index: correct_index as usize,
                    explanation,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(Quiz {
            id: quiz_id.clone(),
            owner,
            title,
            description,
            video,
            questions,
            created_at,
        })
    }

    /// List a user's quizzes, newest first. Soft-deleted quizzes are
    /// excluded. Restartable: every call re-issues the query.
    pub fn list_for_user(&self, user: &UserId) -> Result<Vec<QuizSummary>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT q.quiz_id, q.title, q.description, q.video_ref, q.created_at,
                    (SELECT COUNT(*) FROM questions WHERE quiz_id = q.quiz_id)
             FROM quizzes q
             WHERE q.owner = ?1 AND q.deleted_at IS NULL
             ORDER BY q.created_at DESC",
        )?;
        let rows: Vec<(String, String, String, String, String, i64)> = stmt
            .query_map(params![user], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, title, description, video_ref, created_at, count)| {
                let video: VideoReference = serde_json::from_str(&video_ref)
                    .map_err(|e| StoreError::Corrupt(format!("video_ref for {id}: {e}")))?;
                Ok(QuizSummary {
                    id,
                    title,
                    description,
                    video,
                    question_count: count as usize,
                    created_at,
                })
            })
            .collect()
    }

    /// Soft-delete a quiz. Only the owner may delete. The stamp is a single
    /// atomic UPDATE, so a concurrent reader sees the quiz either fully
    /// live or fully gone.
    pub fn soft_delete(&self, quiz_id: &QuizId, requester: &UserId) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let owner: Option<String> = tx
            .query_row(
                "SELECT owner FROM quizzes WHERE quiz_id = ?1 AND deleted_at IS NULL",
                params![quiz_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(owner) = owner else {
            return Err(StoreError::QuizNotFound(quiz_id.clone()));
        };
        if owner != *requester {
            return Err(StoreError::Forbidden);
        }
        tx.execute(
            "UPDATE quizzes SET deleted_at = ?1 WHERE quiz_id = ?2 AND deleted_at IS NULL",
            params![now_rfc3339(), quiz_id],
        )?;
        tx.commit()?;
        tracing::info!(%quiz_id, "quiz soft-deleted");
        Ok(())
    }

    // ── Attempts ──

    /// Persist a scored attempt. Attempts are read-only after this.
    pub fn save_attempt(&self, attempt: &Attempt) -> Result<AttemptId, StoreError> {
        let answers = serde_json::to_string(&attempt.answers)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let breakdown = serde_json::to_string(&attempt.breakdown)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO attempts (attempt_id, quiz_id, user_id, answers, score, breakdown, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                attempt.id,
                attempt.quiz_id,
                attempt.user,
                answers,
                attempt.score as i64,
                breakdown,
                attempt.created_at
            ],
        )?;
        Ok(attempt.id.clone())
    }

    /// Load an attempt by id.
    pub fn get_attempt(&self, attempt_id: &AttemptId) -> Result<Attempt, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT quiz_id, user_id, answers, score, breakdown, created_at
                 FROM attempts WHERE attempt_id = ?1",
                params![attempt_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;
        let Some((quiz_id, user, answers, score, breakdown, created_at)) = row else {
            return Err(StoreError::AttemptNotFound(attempt_id.clone()));
        };
        Ok(Attempt {
            id: attempt_id.clone(),
            quiz_id,
            user,
            answers: serde_json::from_str(&answers)
                .map_err(|e| StoreError::Corrupt(format!("answers for {attempt_id}: {e}")))?,
            score: score as u8,
            breakdown: serde_json::from_str(&breakdown)
                .map_err(|e| StoreError::Corrupt(format!("breakdown for {attempt_id}: {e}")))?,
            created_at,
        })
    }

    /// All attempts recorded against a quiz, oldest first.
    pub fn list_attempts_for_quiz(&self, quiz_id: &QuizId) -> Result<Vec<Attempt>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT attempt_id, user_id, answers, score, breakdown, created_at
             FROM attempts WHERE quiz_id = ?1 ORDER BY created_at",
        )?;
        let rows: Vec<(String, String, String, i64, String, String)> = stmt
            .query_map(params![quiz_id], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(id, user, answers, score, breakdown, created_at)| {
                Ok(Attempt {
                    id: id.clone(),
                    quiz_id: quiz_id.clone(),
                    user,
                    answers: serde_json::from_str(&answers)
                        .map_err(|e| StoreError::Corrupt(format!("answers for {id}: {e}")))?,
                    score: score as u8,
                    breakdown: serde_json::from_str(&breakdown)
                        .map_err(|e| StoreError::Corrupt(format!("breakdown for {id}: {e}")))?,
                    created_at,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizly_core::new_quiz_id;

    fn fixture_quiz(owner: &str) -> Quiz {
        let question = |prompt: &str, candidates: &[&str], correct: usize| Question {
            prompt: prompt.into(),
            candidates: candidates.iter().map(|s| s.to_string()).collect(),
            correct_index: correct,
            explanation: None,
        };
        Quiz {
            id: new_quiz_id(),
            owner: owner.into(),
            title: "Intro to Rust".into(),
            description: "Auto-generated quiz.".into(),
            video: VideoReference::Url("https://youtu.be/dQw4w9WgXcQ".into()),
            questions: vec![
                question("What is ownership?", &["a", "b", "c", "d"], 1),
                question("What does Drop do?", &["x", "y", "z"], 0),
            ],
            created_at: now_rfc3339(),
        }
    }

    fn fixture_attempt(quiz: &Quiz) -> Attempt {
        Attempt {
            id: quizly_core::new_attempt_id(),
            quiz_id: quiz.id.clone(),
            user: "user_2".into(),
            answers: vec![Some(1), None],
            score: 50,
            breakdown: vec![true, false],
            created_at: now_rfc3339(),
        }
    }

    #[test]
    fn save_then_get_round_trips_questions() {
        let store = QuizStore::open_in_memory().unwrap();
        let quiz = fixture_quiz("user_1");
        store.save_quiz(&quiz).unwrap();

        let loaded = store.get_quiz(&quiz.id).unwrap();
        assert_eq!(loaded.title, quiz.title);
        assert_eq!(loaded.owner, quiz.owner);
        assert_eq!(loaded.video, quiz.video);
        assert_eq!(loaded.questions, quiz.questions);
    }

    #[test]
    fn zero_question_quiz_is_rejected() {
        let store = QuizStore::open_in_memory().unwrap();
        let mut quiz = fixture_quiz("user_1");
        quiz.questions.clear();

        let err = store.save_quiz(&quiz).unwrap_err();
        assert!(matches!(err, StoreError::EmptyQuiz(_)));
        assert!(matches!(
            store.get_quiz(&quiz.id).unwrap_err(),
            StoreError::QuizNotFound(_)
        ));
    }

    #[test]
    fn get_missing_quiz_is_not_found() {
        let store = QuizStore::open_in_memory().unwrap();
        let err = store.get_quiz(&"qz_missing".to_string()).unwrap_err();
        assert!(matches!(err, StoreError::QuizNotFound(_)));
    }

    #[test]
    fn list_for_user_is_newest_first_and_scoped() {
        let store = QuizStore::open_in_memory().unwrap();
        let mut older = fixture_quiz("user_1");
        older.created_at = "2026-01-01T00:00:00Z".into();
        let mut newer = fixture_quiz("user_1");
        newer.created_at = "2026-02-01T00:00:00Z".into();
        let other = fixture_quiz("user_9");
        store.save_quiz(&older).unwrap();
        store.save_quiz(&newer).unwrap();
        store.save_quiz(&other).unwrap();

        let listed = store.list_for_user(&"user_1".to_string()).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newer.id);
        assert_eq!(listed[1].id, older.id);
        assert_eq!(listed[0].question_count, 2);
    }

    #[test]
    fn soft_delete_hides_quiz_from_reads() {
        let store = QuizStore::open_in_memory().unwrap();
        let quiz = fixture_quiz("user_1");
        store.save_quiz(&quiz).unwrap();

        store.soft_delete(&quiz.id, &"user_1".to_string()).unwrap();
        assert!(matches!(
            store.get_quiz(&quiz.id),
            Err(StoreError::QuizNotFound(_))
        ));
        assert!(store.list_for_user(&"user_1".to_string()).unwrap().is_empty());
    }

    #[test]
    fn soft_delete_by_non_owner_is_forbidden() {
        let store = QuizStore::open_in_memory().unwrap();
        let quiz = fixture_quiz("user_1");
        store.save_quiz(&quiz).unwrap();

        let err = store.soft_delete(&quiz.id, &"user_2".to_string()).unwrap_err();
        assert!(matches!(err, StoreError::Forbidden));
        // The quiz is untouched.
        assert!(store.get_quiz(&quiz.id).is_ok());
    }

    #[test]
    fn soft_delete_twice_is_not_found() {
        let store = QuizStore::open_in_memory().unwrap();
        let quiz = fixture_quiz("user_1");
        store.save_quiz(&quiz).unwrap();
        store.soft_delete(&quiz.id, &"user_1".to_string()).unwrap();

        assert!(matches!(
            store.soft_delete(&quiz.id, &"user_1".to_string()),
            Err(StoreError::QuizNotFound(_))
        ));
    }

    #[test]
    fn attempt_round_trip() {
        let store = QuizStore::open_in_memory().unwrap();
        let quiz = fixture_quiz("user_1");
        store.save_quiz(&quiz).unwrap();
        let attempt = fixture_attempt(&quiz);
        store.save_attempt(&attempt).unwrap();

        let loaded = store.get_attempt(&attempt.id).unwrap();
        assert_eq!(loaded.quiz_id, quiz.id);
        assert_eq!(loaded.answers, vec![Some(1), None]);
        assert_eq!(loaded.score, 50);
        assert_eq!(loaded.breakdown, vec![true, false]);

        let per_quiz = store.list_attempts_for_quiz(&quiz.id).unwrap();
        assert_eq!(per_quiz.len(), 1);
        assert_eq!(per_quiz[0].id, attempt.id);
    }

    #[test]
    fn open_creates_db_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("store").join("quizly.db");
        let store = QuizStore::open(&path).unwrap();
        let quiz = fixture_quiz("user_1");
        store.save_quiz(&quiz).unwrap();
        drop(store);
        assert!(path.exists());

        // Reopen and read back.
        let store = QuizStore::open(&path).unwrap();
        assert_eq!(store.get_quiz(&quiz.id).unwrap().questions.len(), 2);
    }
}
