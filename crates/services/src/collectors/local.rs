use std::collections::HashSet;

use progress_core::model::{ChildId, ChildProfile, RawActivityRecord};
use storage::repository::{Storage, StorageError};
use storage::{LessonCompletionRecord, QuizAttemptRecord, RecordLog};
use tracing::warn;

/// Reads and appends the on-device activity logs.
#[derive(Clone)]
pub struct LocalCollector {
    quizzes: RecordLog<QuizAttemptRecord>,
    lessons: RecordLog<LessonCompletionRecord>,
}

impl LocalCollector {
    #[must_use]
    pub fn new(storage: &Storage) -> Self {
        Self {
            quizzes: storage.quiz_attempts(),
            lessons: storage.lesson_completions(),
        }
    }

    /// All local records for one child: quiz attempts, then lesson completions.
    pub async fn read_local(&self, child_id: &ChildId) -> Vec<RawActivityRecord> {
        let ids: HashSet<&ChildId> = std::iter::once(child_id).collect();
        self.read_filtered(&ids).await
    }

    /// All local records for the children in a cohort.
    pub async fn read_cohort(&self, children: &[ChildProfile]) -> Vec<RawActivityRecord> {
        let ids: HashSet<&ChildId> = children.iter().map(|child| &child.id).collect();
        self.read_filtered(&ids).await
    }

    async fn read_filtered(&self, ids: &HashSet<&ChildId>) -> Vec<RawActivityRecord> {
        let quizzes = self.quizzes.load().await.unwrap_or_else(|err| {
            warn!(error = %err, "quiz attempt log unavailable");
            Vec::new()
        });
        let lessons = self.lessons.load().await.unwrap_or_else(|err| {
            warn!(error = %err, "lesson completion log unavailable");
            Vec::new()
        });

        let mut quiz_records: Vec<RawActivityRecord> = quizzes
            .into_iter()
            .filter(|entry| ids.contains(&entry.child_id))
            .map(QuizAttemptRecord::into_raw)
            .collect();
        let mut lesson_records: Vec<RawActivityRecord> = lessons
            .into_iter()
            .filter(|entry| ids.contains(&entry.child_id))
            .map(LessonCompletionRecord::into_raw)
            .collect();

        // Source-then-time ordering; the sort is stable for equal timestamps.
        quiz_records.sort_by_key(|record| record.timestamp_utc);
        lesson_records.sort_by_key(|record| record.timestamp_utc);
        quiz_records.extend(lesson_records);
        quiz_records
    }

    /// Append a finished quiz attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the log cannot be written.
    pub async fn record_quiz_attempt(&self, attempt: QuizAttemptRecord) -> Result<(), StorageError> {
        self.quizzes.append(&[attempt]).await
    }

    /// Append a finished lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the log cannot be written.
    pub async fn record_lesson_completion(
        &self,
        lesson: LessonCompletionRecord,
    ) -> Result<(), StorageError> {
        self.lessons.append(&[lesson]).await
    }

    /// Persist generated placeholder records so repeated views are stable.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the log cannot be written.
    pub async fn append_synthetic(&self, records: &[RawActivityRecord]) -> Result<(), StorageError> {
        let attempts: Vec<QuizAttemptRecord> = records
            .iter()
            .filter(|record| record.is_synthetic)
            .map(QuizAttemptRecord::from_raw)
            .collect();
        self.quizzes.append(&attempts).await
    }

    /// Remove synthetic records for `children` from every local log.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if a log cannot be read or written.
    pub async fn purge_synthetic(&self, children: &[ChildId]) -> Result<usize, StorageError> {
        let quizzes = self.quizzes.purge_synthetic(children).await?;
        let lessons = self.lessons.purge_synthetic(children).await?;
        Ok(quizzes + lessons)
    }
}
