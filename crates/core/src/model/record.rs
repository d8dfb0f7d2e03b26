use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::ChildId;

/// Where a raw activity record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    LocalQuiz,
    LocalLesson,
    RemoteReport,
    RemoteQuiz,
    RemoteLesson,
}

impl SourceKind {
    /// Lesson sources count toward completion ratios rather than scores.
    #[must_use]
    pub fn is_lesson(self) -> bool {
        matches!(self, SourceKind::LocalLesson | SourceKind::RemoteLesson)
    }
}

/// Whether a record's percentage was measured or substituted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    #[default]
    Measured,
    /// No usable score was present; the configured default was used.
    Assumed,
}

/// One activity signal from any source, before normalization.
///
/// Immutable once created. `percentage`, `score` and `total_questions` are
/// kept exactly as found so the resolution rule can be re-applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawActivityRecord {
    pub id: String,
    pub child_id: ChildId,
    pub raw_category: String,
    /// Subject field distinct from the category, used when the category is unmapped.
    #[serde(default)]
    pub source_hint: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub total_questions: Option<u32>,
    #[serde(default)]
    pub percentage: Option<f64>,
    pub timestamp_utc: DateTime<Utc>,
    #[serde(default)]
    pub time_spent_minutes: Option<u32>,
    /// Lesson count for the subject when the source knows it.
    #[serde(default)]
    pub lessons_total: Option<u32>,
    pub source_kind: SourceKind,
    #[serde(default)]
    pub is_synthetic: bool,
}

impl RawActivityRecord {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        child_id: ChildId,
        raw_category: impl Into<String>,
        source_kind: SourceKind,
        timestamp_utc: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            child_id,
            raw_category: raw_category.into(),
            source_hint: None,
            score: None,
            total_questions: None,
            percentage: None,
            timestamp_utc,
            time_spent_minutes: None,
            lessons_total: None,
            source_kind,
            is_synthetic: false,
        }
    }

    #[must_use]
    pub fn with_score(mut self, score: f64, total_questions: Option<u32>) -> Self {
        self.score = Some(score);
        self.total_questions = total_questions;
        self
    }

    #[must_use]
    pub fn with_percentage(mut self, percentage: f64) -> Self {
        self.percentage = Some(percentage);
        self
    }

    #[must_use]
    pub fn with_source_hint(mut self, hint: impl Into<String>) -> Self {
        self.source_hint = Some(hint.into());
        self
    }

    #[must_use]
    pub fn with_time_spent(mut self, minutes: u32) -> Self {
        self.time_spent_minutes = Some(minutes);
        self
    }

    #[must_use]
    pub fn with_lessons_total(mut self, total: u32) -> Self {
        self.lessons_total = Some(total);
        self
    }

    #[must_use]
    pub fn synthetic(mut self) -> Self {
        self.is_synthetic = true;
        self
    }
}
