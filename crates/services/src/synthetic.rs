//! Placeholder activity for cohorts with no real signal yet.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use chrono::Duration;
use progress_core::model::{
    CanonicalSubject, ChildId, ChildProfile, RawActivityRecord, SourceKind,
};
use progress_core::time::Clock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;
use uuid::Uuid;

const PERCENTAGE_BAND: std::ops::RangeInclusive<u32> = 55..=98;
const TIME_SPENT_BAND: std::ops::RangeInclusive<u32> = 5..=25;
const SPREAD_MINUTES: i64 = 14 * 24 * 60;

/// Generates bounded, tagged placeholder records.
pub struct SyntheticGenerator {
    clock: Clock,
    records_per_subject: u32,
    rng: Mutex<StdRng>,
}

impl SyntheticGenerator {
    #[must_use]
    pub fn new(clock: Clock, records_per_subject: u32) -> Self {
        Self::from_rng(clock, records_per_subject, StdRng::from_os_rng())
    }

    /// Deterministic generator for tests and demos.
    #[must_use]
    pub fn with_seed(clock: Clock, records_per_subject: u32, seed: u64) -> Self {
        Self::from_rng(clock, records_per_subject, StdRng::seed_from_u64(seed))
    }

    fn from_rng(clock: Clock, records_per_subject: u32, rng: StdRng) -> Self {
        Self {
            clock,
            records_per_subject: records_per_subject.max(1),
            rng: Mutex::new(rng),
        }
    }

    /// Generate placeholder records for `children`.
    ///
    /// Returns nothing when `existing` holds any non-synthetic record. Children
    /// that already have (synthetic) records are skipped so repeated views
    /// stay stable.
    #[must_use]
    pub fn maybe_generate(
        &self,
        children: &[ChildProfile],
        existing: &[RawActivityRecord],
    ) -> Vec<RawActivityRecord> {
        if existing.iter().any(|record| !record.is_synthetic) {
            return Vec::new();
        }

        let covered: HashSet<&ChildId> = existing.iter().map(|record| &record.child_id).collect();
        let now = self.clock.now();
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);

        let mut records = Vec::new();
        for child in children.iter().filter(|child| !covered.contains(&child.id)) {
            for subject in CanonicalSubject::ALL {
                for _ in 0..self.records_per_subject {
                    let minutes_ago = rng.random_range(0..SPREAD_MINUTES);
                    let percentage = rng.random_range(PERCENTAGE_BAND);
                    let time_spent = rng.random_range(TIME_SPENT_BAND);
                    records.push(
                        RawActivityRecord::new(
                            Uuid::new_v4().to_string(),
                            child.id.clone(),
                            subject.as_str(),
                            SourceKind::LocalQuiz,
                            now - Duration::minutes(minutes_ago),
                        )
                        .with_percentage(f64::from(percentage))
                        .with_time_spent(time_spent)
                        .synthetic(),
                    );
                }
            }
        }

        if !records.is_empty() {
            info!(
                records = records.len(),
                children = children.len(),
                "generated synthetic progress for an empty cohort"
            );
        }
        records.sort_by_key(|record| record.timestamp_utc);
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use progress_core::time::fixed_now;

    fn children() -> Vec<ChildProfile> {
        vec![
            ChildProfile::new(ChildId::new("c1"), "Abebe"),
            ChildProfile::new(ChildId::new("c2"), "Chaltu"),
        ]
    }

    #[test]
    fn empty_cohort_gets_tagged_records_for_every_subject() {
        let generator = SyntheticGenerator::with_seed(Clock::fixed(fixed_now()), 2, 7);
        let records = generator.maybe_generate(&children(), &[]);

        assert_eq!(records.len(), 2 * CanonicalSubject::ALL.len() * 2);
        assert!(records.iter().all(|r| r.is_synthetic));
        for child in children() {
            for subject in CanonicalSubject::ALL {
                assert!(
                    records
                        .iter()
                        .any(|r| r.child_id == child.id && r.raw_category == subject.as_str())
                );
            }
        }
    }

    #[test]
    fn values_stay_in_realistic_bands() {
        let now = fixed_now();
        let generator = SyntheticGenerator::with_seed(Clock::fixed(now), 5, 42);
        for record in generator.maybe_generate(&children(), &[]) {
            let pct = record.percentage.unwrap();
            assert!((55.0..=98.0).contains(&pct));
            assert!((5..=25).contains(&record.time_spent_minutes.unwrap()));
            assert!(record.timestamp_utc <= now);
            assert!(record.timestamp_utc > now - Duration::days(14));
        }
    }

    #[test]
    fn never_fires_when_real_data_exists() {
        let generator = SyntheticGenerator::with_seed(Clock::fixed(fixed_now()), 2, 1);
        let real = RawActivityRecord::new(
            "r1",
            ChildId::new("c1"),
            "math",
            SourceKind::RemoteReport,
            fixed_now(),
        );
        assert!(generator.maybe_generate(&children(), &[real]).is_empty());
    }

    #[test]
    fn children_with_placeholders_are_not_regenerated() {
        let generator = SyntheticGenerator::with_seed(Clock::fixed(fixed_now()), 1, 3);
        let first = generator.maybe_generate(&children()[..1], &[]);
        let second = generator.maybe_generate(&children(), &first);

        assert!(second.iter().all(|r| r.child_id == ChildId::new("c2")));
        assert_eq!(second.len(), CanonicalSubject::ALL.len());
    }
}
