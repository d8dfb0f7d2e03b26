use chrono::{DateTime, Utc};
use progress_core::model::{ChildId, RawActivityRecord, SourceKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record_log::LogEntry;

/// Persisted shape of a quiz attempt recorded on this device.
///
/// Field names follow the JSON the app has always written, so older logs
/// keep deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttemptRecord {
    pub id: Uuid,
    pub child_id: ChildId,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub total_questions: Option<u32>,
    #[serde(default)]
    pub percentage: Option<f64>,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub time_spent_minutes: Option<u32>,
    #[serde(default)]
    pub is_synthetic: bool,
}

impl QuizAttemptRecord {
    #[must_use]
    pub fn new(child_id: ChildId, category: impl Into<String>, completed_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            child_id,
            category: category.into(),
            subject: None,
            score: None,
            total_questions: None,
            percentage: None,
            completed_at,
            time_spent_minutes: None,
            is_synthetic: false,
        }
    }

    #[must_use]
    pub fn into_raw(self) -> RawActivityRecord {
        RawActivityRecord {
            id: self.id.to_string(),
            child_id: self.child_id,
            raw_category: self.category,
            source_hint: self.subject,
            score: self.score,
            total_questions: self.total_questions,
            percentage: self.percentage,
            timestamp_utc: self.completed_at,
            time_spent_minutes: self.time_spent_minutes,
            lessons_total: None,
            source_kind: SourceKind::LocalQuiz,
            is_synthetic: self.is_synthetic,
        }
    }

    /// Build a persisted attempt from a generated record, keeping its tag.
    #[must_use]
    pub fn from_raw(record: &RawActivityRecord) -> Self {
        Self {
            id: Uuid::parse_str(&record.id).unwrap_or_else(|_| Uuid::new_v4()),
            child_id: record.child_id.clone(),
            category: record.raw_category.clone(),
            subject: record.source_hint.clone(),
            score: record.score,
            total_questions: record.total_questions,
            percentage: record.percentage,
            completed_at: record.timestamp_utc,
            time_spent_minutes: record.time_spent_minutes,
            is_synthetic: record.is_synthetic,
        }
    }
}

impl LogEntry for QuizAttemptRecord {
    const KEY: &'static str = "progress.log.quiz_attempts";

    fn child_id(&self) -> &ChildId {
        &self.child_id
    }

    fn is_synthetic(&self) -> bool {
        self.is_synthetic
    }
}

/// Persisted shape of a lesson completion recorded on this device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonCompletionRecord {
    pub id: Uuid,
    pub child_id: ChildId,
    pub lesson_id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub lessons_total: Option<u32>,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub time_spent_minutes: Option<u32>,
    #[serde(default)]
    pub is_synthetic: bool,
}

impl LessonCompletionRecord {
    #[must_use]
    pub fn new(
        child_id: ChildId,
        lesson_id: impl Into<String>,
        category: impl Into<String>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            child_id,
            lesson_id: lesson_id.into(),
            category: category.into(),
            subject: None,
            score: None,
            lessons_total: None,
            completed_at,
            time_spent_minutes: None,
            is_synthetic: false,
        }
    }

    #[must_use]
    pub fn into_raw(self) -> RawActivityRecord {
        RawActivityRecord {
            id: self.id.to_string(),
            child_id: self.child_id,
            raw_category: self.category,
            source_hint: self.subject,
            score: self.score,
            total_questions: None,
            percentage: None,
            timestamp_utc: self.completed_at,
            time_spent_minutes: self.time_spent_minutes,
            lessons_total: self.lessons_total,
            source_kind: SourceKind::LocalLesson,
            is_synthetic: self.is_synthetic,
        }
    }
}

impl LogEntry for LessonCompletionRecord {
    const KEY: &'static str = "progress.log.lesson_completions";

    fn child_id(&self) -> &ChildId {
        &self.child_id
    }

    fn is_synthetic(&self) -> bool {
        self.is_synthetic
    }
}
