//! Merges raw activity records into per-child, per-subject progress.
//!
//! Synchronous and pure: the same records and parameters always produce the
//! same [`CohortProgress`].

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};

use crate::model::{
    CanonicalSubject, ChildId, ChildProfile, ChildProgress, CohortProgress, Confidence,
    LessonProgress, MixedGroup, ProgressSettings, RawActivityRecord, ScoreStats, SubjectMatch,
    SubjectProgress, WeeklyActivity,
};
use crate::normalizer;
use crate::score::resolve_record;

/// Inputs to an aggregation pass that do not come from the records themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationParams {
    pub default_percentage: u32,
    pub default_lessons_total: u32,
    pub default_time_spent_minutes: u32,
    pub week_start: DateTime<Utc>,
}

impl AggregationParams {
    #[must_use]
    pub fn from_settings(settings: &ProgressSettings, week_start: DateTime<Utc>) -> Self {
        Self {
            default_percentage: settings.default_percentage(),
            default_lessons_total: settings.default_lessons_total(),
            default_time_spent_minutes: settings.default_time_spent_minutes(),
            week_start,
        }
    }
}

#[derive(Default)]
struct GroupAccumulator {
    scores: Vec<u32>,
    assumed: usize,
    lessons_completed: u32,
    lessons_total: Option<u32>,
    has_real: bool,
    has_synthetic: bool,
}

impl GroupAccumulator {
    fn push(&mut self, record: &RawActivityRecord, params: &AggregationParams) {
        if record.is_synthetic {
            self.has_synthetic = true;
        } else {
            self.has_real = true;
        }

        let resolved = resolve_record(record, params.default_percentage);
        if record.source_kind.is_lesson() {
            self.lessons_completed = self.lessons_completed.saturating_add(1);
            if let Some(total) = record.lessons_total {
                self.lessons_total = Some(self.lessons_total.map_or(total, |t| t.max(total)));
            }
            // Completion-only lessons carry no score.
            if resolved.confidence == Confidence::Measured {
                self.scores.push(resolved.value);
            }
            return;
        }

        if resolved.confidence == Confidence::Assumed {
            self.assumed += 1;
        }
        self.scores.push(resolved.value);
    }

    fn finish(
        self,
        child_id: ChildId,
        subject: CanonicalSubject,
        params: &AggregationParams,
    ) -> SubjectProgress {
        SubjectProgress {
            child_id,
            subject,
            stats: ScoreStats::from_scores(self.scores),
            lessons: LessonProgress::new(
                self.lessons_completed,
                self.lessons_total,
                params.default_lessons_total,
            ),
            assumed_count: self.assumed,
        }
    }
}

/// Day index of `timestamp` within the week starting at `week_start`, if any.
///
/// The window is half-open: `[week_start, week_start + 7 days)`.
#[must_use]
pub fn week_bucket(timestamp: DateTime<Utc>, week_start: DateTime<Utc>) -> Option<usize> {
    if timestamp < week_start || timestamp >= week_start + Duration::days(7) {
        return None;
    }
    let offset = timestamp - week_start;
    usize::try_from(offset.num_days()).ok()
}

/// Aggregate `records` for the given cohort.
///
/// Every child in `children` gets an entry even without records. Records for
/// children outside the cohort are ignored. Within a group, `scores` keep the
/// input order.
#[must_use]
pub fn aggregate(
    records: &[RawActivityRecord],
    children: &[ChildProfile],
    params: &AggregationParams,
) -> CohortProgress {
    let mut per_child: BTreeMap<ChildId, ChildProgress> = children
        .iter()
        .map(|child| {
            (
                child.id.clone(),
                ChildProgress::empty(child.id.clone(), params.week_start),
            )
        })
        .collect();
    let mut groups: HashMap<(ChildId, CanonicalSubject), GroupAccumulator> = HashMap::new();

    for record in records {
        let Some(child) = per_child.get_mut(&record.child_id) else {
            continue;
        };

        if let Some(day) = week_bucket(record.timestamp_utc, params.week_start) {
            let minutes = record
                .time_spent_minutes
                .unwrap_or(params.default_time_spent_minutes);
            child.weekly.add(day, minutes);
        }

        match normalizer::normalize(&record.raw_category, record.source_hint.as_deref()) {
            SubjectMatch::Unknown => child.unclassified_count += 1,
            SubjectMatch::Known(subject) => groups
                .entry((record.child_id.clone(), subject))
                .or_default()
                .push(record, params),
        }
    }

    let mut mixed_groups = Vec::new();
    let mut has_synthetic = false;
    for ((child_id, subject), group) in groups {
        has_synthetic |= group.has_synthetic;
        if group.has_synthetic && group.has_real {
            mixed_groups.push(MixedGroup {
                child_id: child_id.clone(),
                subject,
            });
        }
        if let Some(child) = per_child.get_mut(&child_id) {
            let progress = group.finish(child_id, subject, params);
            child.subjects.insert(subject, progress);
        }
    }
    mixed_groups.sort_by(|a, b| (&a.child_id, a.subject).cmp(&(&b.child_id, b.subject)));

    let mut weekly = WeeklyActivity::empty(params.week_start);
    for child in per_child.values_mut() {
        let overall: Vec<u32> = child
            .subjects
            .values()
            .flat_map(|progress| progress.scores().iter().copied())
            .collect();
        child.overall = ScoreStats::from_scores(overall);
        weekly.accumulate(&child.weekly);
    }

    CohortProgress {
        children: per_child,
        weekly,
        mixed_groups,
        has_synthetic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceKind;
    use crate::time::{fixed_now, week_start};

    fn params() -> AggregationParams {
        AggregationParams::from_settings(&ProgressSettings::default(), week_start(fixed_now(), 0))
    }

    fn child(id: &str) -> ChildProfile {
        ChildProfile::new(ChildId::new(id), id)
    }

    fn quiz(child: &str, category: &str, score: f64, total: Option<u32>) -> RawActivityRecord {
        RawActivityRecord::new(
            format!("{child}-{category}-{score}"),
            ChildId::new(child),
            category,
            SourceKind::LocalQuiz,
            fixed_now(),
        )
        .with_score(score, total)
    }

    #[test]
    fn merges_local_and_remote_scores() {
        let records = vec![
            quiz("C1", "Math", 8.0, Some(10)),
            quiz("C1", "math", 6.0, Some(10)),
            RawActivityRecord::new(
                "r1",
                ChildId::new("C1"),
                "Math Quiz",
                SourceKind::RemoteReport,
                fixed_now(),
            )
            .with_score(90.0, None),
        ];

        let result = aggregate(&records, &[child("C1")], &params());
        let progress = &result.children[&ChildId::new("C1")].subjects[&CanonicalSubject::Math];
        assert_eq!(progress.scores(), &[80, 60, 90]);
        assert_eq!(progress.average(), 77);
        assert_eq!(progress.count(), 3);
        assert_eq!(progress.max(), 90);
    }

    #[test]
    fn average_and_count_ignore_record_order() {
        let mut records = vec![
            quiz("C1", "English", 3.0, Some(4)),
            quiz("C1", "English", 55.0, None),
            quiz("C1", "English", 9.0, Some(9)),
            quiz("C1", "Qubee", 1.0, Some(2)),
        ];
        let forward = aggregate(&records, &[child("C1")], &params());
        records.reverse();
        let backward = aggregate(&records, &[child("C1")], &params());

        for subject in [CanonicalSubject::English, CanonicalSubject::Oromo] {
            let a = &forward.children[&ChildId::new("C1")].subjects[&subject];
            let b = &backward.children[&ChildId::new("C1")].subjects[&subject];
            assert_eq!(a.average(), b.average());
            assert_eq!(a.count(), b.count());
            assert_eq!(a.max(), b.max());
        }
    }

    #[test]
    fn unknown_categories_are_counted_not_grouped() {
        let records = vec![quiz("C1", "Animals", 5.0, Some(10))];
        let result = aggregate(&records, &[child("C1")], &params());
        let c1 = &result.children[&ChildId::new("C1")];
        assert!(c1.subjects.is_empty());
        assert_eq!(c1.unclassified_count, 1);
        assert!(c1.overall.is_empty());
    }

    #[test]
    fn overall_concatenates_subject_scores() {
        let records = vec![
            quiz("C1", "English", 50.0, None),
            quiz("C1", "Math", 100.0, None),
        ];
        let result = aggregate(&records, &[child("C1")], &params());
        let overall = &result.children[&ChildId::new("C1")].overall;
        assert_eq!(overall.count(), 2);
        assert_eq!(overall.average(), 75);
        assert_eq!(overall.max(), 100);
    }

    #[test]
    fn lessons_count_completions_with_assumed_total() {
        let lesson = RawActivityRecord::new(
            "l1",
            ChildId::new("C1"),
            "Fidel",
            SourceKind::LocalLesson,
            fixed_now(),
        );
        let scored_lesson = RawActivityRecord::new(
            "l2",
            ChildId::new("C1"),
            "Fidel",
            SourceKind::RemoteLesson,
            fixed_now(),
        )
        .with_percentage(88.0);
        let result = aggregate(&[lesson, scored_lesson], &[child("C1")], &params());
        let amharic = &result.children[&ChildId::new("C1")].subjects[&CanonicalSubject::Amharic];
        assert_eq!(amharic.lessons_completed(), 2);
        assert_eq!(amharic.lessons_total(), 5);
        assert!(amharic.lessons.total_is_assumed);
        assert_eq!(amharic.scores(), &[88]);
        assert_eq!(amharic.assumed_count, 0);
    }

    #[test]
    fn lesson_total_uses_largest_reported_value() {
        let records: Vec<_> = [Some(8), None, Some(12)]
            .into_iter()
            .enumerate()
            .map(|(i, total)| {
                let r = RawActivityRecord::new(
                    format!("l{i}"),
                    ChildId::new("C1"),
                    "Math",
                    SourceKind::RemoteLesson,
                    fixed_now(),
                );
                match total {
                    Some(t) => r.with_lessons_total(t),
                    None => r,
                }
            })
            .collect();
        let result = aggregate(&records, &[child("C1")], &params());
        let math = &result.children[&ChildId::new("C1")].subjects[&CanonicalSubject::Math];
        assert_eq!(math.lessons_completed(), 3);
        assert_eq!(math.lessons_total(), 12);
        assert!(!math.lessons.total_is_assumed);
    }

    #[test]
    fn unscored_quiz_uses_default_percentage() {
        let record = RawActivityRecord::new(
            "q",
            ChildId::new("C1"),
            "English",
            SourceKind::RemoteQuiz,
            fixed_now(),
        );
        let result = aggregate(&[record], &[child("C1")], &params());
        let english = &result.children[&ChildId::new("C1")].subjects[&CanonicalSubject::English];
        assert_eq!(english.scores(), &[70]);
        assert_eq!(english.assumed_count, 1);
    }

    #[test]
    fn weekly_buckets_respect_the_half_open_window() {
        let p = params();
        let at = |offset: Duration, id: &str| {
            RawActivityRecord::new(
                id,
                ChildId::new("C1"),
                "Math",
                SourceKind::LocalQuiz,
                p.week_start + offset,
            )
            .with_time_spent(1)
        };
        let last = Duration::days(6) + Duration::hours(23) + Duration::minutes(59)
            + Duration::seconds(59);
        let records = vec![
            at(Duration::zero(), "start"),
            at(last, "end"),
            at(Duration::seconds(-1), "before"),
            at(Duration::days(7), "after"),
        ];

        assert_eq!(week_bucket(p.week_start, p.week_start), Some(0));
        assert_eq!(week_bucket(p.week_start + last, p.week_start), Some(6));
        assert_eq!(week_bucket(p.week_start - Duration::seconds(1), p.week_start), None);

        let result = aggregate(&records, &[child("C1")], &p);
        assert_eq!(result.weekly.minutes, [1, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn weekly_defaults_time_spent_and_sums_children() {
        let p = params();
        let mut a = quiz("C1", "Math", 50.0, None);
        a.timestamp_utc = p.week_start + Duration::days(2);
        let mut b = quiz("C2", "Animals", 50.0, None);
        b.timestamp_utc = p.week_start + Duration::days(2);
        b.time_spent_minutes = Some(25);

        let result = aggregate(&[a, b], &[child("C1"), child("C2")], &p);
        assert_eq!(result.children[&ChildId::new("C1")].weekly.minutes[2], 10);
        assert_eq!(result.weekly.minutes[2], 35);
    }

    #[test]
    fn records_outside_the_cohort_are_ignored() {
        let records = vec![quiz("C9", "Math", 50.0, None)];
        let result = aggregate(&records, &[child("C1")], &params());
        assert_eq!(result.children.len(), 1);
        assert!(result.children[&ChildId::new("C1")].subjects.is_empty());
    }

    #[test]
    fn mixed_synthetic_and_real_groups_are_flagged() {
        let records = vec![
            quiz("C1", "Math", 50.0, None).synthetic(),
            quiz("C1", "Math", 60.0, None),
            quiz("C1", "English", 60.0, None).synthetic(),
        ];
        let result = aggregate(&records, &[child("C1")], &params());
        assert!(result.has_synthetic);
        assert_eq!(
            result.mixed_groups,
            vec![MixedGroup {
                child_id: ChildId::new("C1"),
                subject: CanonicalSubject::Math,
            }]
        );
    }

    #[test]
    fn aggregation_is_deterministic() {
        let records = vec![
            quiz("C1", "Math", 8.0, Some(10)),
            quiz("C2", "Qubee", 3.0, Some(5)),
        ];
        let children = [child("C1"), child("C2")];
        assert_eq!(
            aggregate(&records, &children, &params()),
            aggregate(&records, &children, &params())
        );
    }
}
