use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::ChildId;
use crate::model::subject::CanonicalSubject;
use crate::score::mean_rounded;

//
// ─── SCORE STATS ──────────────────────────────────────────────────────────────
//

/// Summary statistics derived purely from an ordered list of percentages.
///
/// There is no way to set `average`/`max`/`count` independently of `scores`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreStats {
    scores: Vec<u32>,
    count: usize,
    average: u32,
    max: u32,
}

impl ScoreStats {
    #[must_use]
    pub fn from_scores(scores: Vec<u32>) -> Self {
        let count = scores.len();
        let average = mean_rounded(&scores);
        let max = scores.iter().copied().max().unwrap_or(0);
        Self {
            scores,
            count,
            average,
            max,
        }
    }

    #[must_use]
    pub fn scores(&self) -> &[u32] {
        &self.scores
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn average(&self) -> u32 {
        self.average
    }

    #[must_use]
    pub fn max(&self) -> u32 {
        self.max
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

//
// ─── LESSONS ──────────────────────────────────────────────────────────────────
//

/// Count-based lesson completion, never a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgress {
    pub completed: u32,
    /// Always at least 1.
    pub total: u32,
    /// True when no source reported a lesson total and the default was used.
    pub total_is_assumed: bool,
}

impl LessonProgress {
    #[must_use]
    pub fn new(completed: u32, known_total: Option<u32>, default_total: u32) -> Self {
        let total_is_assumed = known_total.is_none();
        let total = known_total.unwrap_or(default_total).max(1);
        Self {
            completed,
            total,
            total_is_assumed,
        }
    }

    /// Completion ratio clamped to `0.0..=1.0`.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        (f64::from(self.completed) / f64::from(self.total.max(1))).min(1.0)
    }
}

//
// ─── SUBJECT PROGRESS ─────────────────────────────────────────────────────────
//

/// Per-child, per-subject aggregate. Recomputed on every aggregation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectProgress {
    pub child_id: ChildId,
    pub subject: CanonicalSubject,
    pub stats: ScoreStats,
    pub lessons: LessonProgress,
    /// Scores that used the substituted default percentage.
    pub assumed_count: usize,
}

impl SubjectProgress {
    /// An aggregate with no activity, used when a child has no data for a subject.
    #[must_use]
    pub fn empty(child_id: ChildId, subject: CanonicalSubject, default_lessons_total: u32) -> Self {
        Self {
            child_id,
            subject,
            stats: ScoreStats::default(),
            lessons: LessonProgress::new(0, None, default_lessons_total),
            assumed_count: 0,
        }
    }

    #[must_use]
    pub fn scores(&self) -> &[u32] {
        self.stats.scores()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.stats.count()
    }

    #[must_use]
    pub fn average(&self) -> u32 {
        self.stats.average()
    }

    #[must_use]
    pub fn max(&self) -> u32 {
        self.stats.max()
    }

    #[must_use]
    pub fn lessons_completed(&self) -> u32 {
        self.lessons.completed
    }

    #[must_use]
    pub fn lessons_total(&self) -> u32 {
        self.lessons.total
    }
}

//
// ─── WEEKLY ACTIVITY ──────────────────────────────────────────────────────────
//

/// Minutes of activity for each day of the current Sunday-aligned week.
///
/// Index 0 is Sunday. This is a display window, not a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyActivity {
    pub week_start: DateTime<Utc>,
    pub minutes: [u32; 7],
}

impl WeeklyActivity {
    #[must_use]
    pub fn empty(week_start: DateTime<Utc>) -> Self {
        Self {
            week_start,
            minutes: [0; 7],
        }
    }

    pub fn add(&mut self, day: usize, minutes: u32) {
        if let Some(slot) = self.minutes.get_mut(day) {
            *slot = slot.saturating_add(minutes);
        }
    }

    /// Element-wise sum; `other` is assumed to share the same week.
    pub fn accumulate(&mut self, other: &WeeklyActivity) {
        for (slot, minutes) in self.minutes.iter_mut().zip(other.minutes) {
            *slot = slot.saturating_add(minutes);
        }
    }

    #[must_use]
    pub fn total_minutes(&self) -> u32 {
        self.minutes.iter().fold(0_u32, |acc, m| acc.saturating_add(*m))
    }

    #[must_use]
    pub fn active_days(&self) -> usize {
        self.minutes.iter().filter(|m| **m > 0).count()
    }
}

//
// ─── CHILD + COHORT ───────────────────────────────────────────────────────────
//

/// Everything the dashboards show for one child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildProgress {
    pub child_id: ChildId,
    pub subjects: BTreeMap<CanonicalSubject, SubjectProgress>,
    /// Cross-subject pseudo-group: all subject scores concatenated.
    pub overall: ScoreStats,
    pub weekly: WeeklyActivity,
    /// Records whose category could not be mapped to a subject.
    pub unclassified_count: usize,
}

impl ChildProgress {
    #[must_use]
    pub fn empty(child_id: ChildId, week_start: DateTime<Utc>) -> Self {
        Self {
            child_id,
            subjects: BTreeMap::new(),
            overall: ScoreStats::default(),
            weekly: WeeklyActivity::empty(week_start),
            unclassified_count: 0,
        }
    }
}

/// A `(child, subject)` group that holds both synthetic and real records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixedGroup {
    pub child_id: ChildId,
    pub subject: CanonicalSubject,
}

/// Result of one aggregation pass over a cohort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortProgress {
    pub children: BTreeMap<ChildId, ChildProgress>,
    pub weekly: WeeklyActivity,
    pub mixed_groups: Vec<MixedGroup>,
    pub has_synthetic: bool,
}

/// Cached payload served to dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub cohort_key: String,
    pub computed_at: DateTime<Utc>,
    pub progress: CohortProgress,
    /// Remote sources that failed or timed out during this pass.
    pub incomplete_sources: usize,
}

impl ProgressSnapshot {
    #[must_use]
    pub fn child(&self, child_id: &ChildId) -> Option<&ChildProgress> {
        self.progress.children.get(child_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn stats_are_derived_from_scores() {
        let stats = ScoreStats::from_scores(vec![80, 60, 90]);
        assert_eq!(stats.count(), 3);
        assert_eq!(stats.average(), 77);
        assert_eq!(stats.max(), 90);
    }

    #[test]
    fn empty_stats_are_zero() {
        let stats = ScoreStats::from_scores(Vec::new());
        assert!(stats.is_empty());
        assert_eq!(stats.average(), 0);
        assert_eq!(stats.max(), 0);
    }

    #[test]
    fn lesson_total_defaults_and_never_hits_zero() {
        let assumed = LessonProgress::new(2, None, 5);
        assert_eq!(assumed.total, 5);
        assert!(assumed.total_is_assumed);

        let zero = LessonProgress::new(0, Some(0), 5);
        assert_eq!(zero.total, 1);
        assert!(!zero.total_is_assumed);
        assert!((zero.ratio() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn lesson_ratio_is_clamped() {
        let over = LessonProgress::new(7, None, 5);
        assert!((over.ratio() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn weekly_activity_sums_and_counts_days() {
        let mut a = WeeklyActivity::empty(fixed_now());
        a.add(0, 10);
        a.add(3, 15);
        a.add(9, 100);
        let mut b = WeeklyActivity::empty(fixed_now());
        b.add(3, 5);
        a.accumulate(&b);
        assert_eq!(a.minutes, [10, 0, 0, 20, 0, 0, 0]);
        assert_eq!(a.total_minutes(), 30);
        assert_eq!(a.active_days(), 2);
    }
}
