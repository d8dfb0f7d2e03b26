use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use progress_core::aggregator::{AggregationParams, aggregate};
use progress_core::model::{
    CanonicalSubject, ChildId, ChildProfile, ProgressSettings, ProgressSnapshot, RawActivityRecord,
    SubjectProgress, WeeklyActivity,
};
use progress_core::time::{self, Clock};
use storage::repository::Storage;
use storage::{LessonCompletionRecord, QuizAttemptRecord};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache_manager::CacheManager;
use crate::collectors::{LocalCollector, RemoteCollector};
use crate::error::ProgressError;
use crate::remote::RemoteDocumentStore;
use crate::roster::{RosterProvider, RosterScope};
use crate::synthetic::SyntheticGenerator;

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Progress views for dashboards and reports.
///
/// Read operations never fail: they fall back to the cache, then to a partial
/// merge, then to an empty aggregate. Only writes return errors.
///
/// Aggregation passes and writes are serialized, so a pass never stores an
/// aggregate that predates a finished write and placeholders are generated
/// once.
pub struct ProgressService {
    clock: Clock,
    settings: ProgressSettings,
    roster: Arc<dyn RosterProvider>,
    local: LocalCollector,
    remote: RemoteCollector,
    cache: CacheManager,
    synthetic: SyntheticGenerator,
    pass: Mutex<()>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        settings: ProgressSettings,
        roster: Arc<dyn RosterProvider>,
        storage: &Storage,
        remote_store: Arc<dyn RemoteDocumentStore>,
    ) -> Self {
        let synthetic = SyntheticGenerator::new(clock, settings.synthetic_records_per_subject());
        Self::with_generator(clock, settings, roster, storage, remote_store, synthetic)
    }

    /// Like [`ProgressService::new`] with an explicit synthetic generator.
    #[must_use]
    pub fn with_generator(
        clock: Clock,
        settings: ProgressSettings,
        roster: Arc<dyn RosterProvider>,
        storage: &Storage,
        remote_store: Arc<dyn RemoteDocumentStore>,
        synthetic: SyntheticGenerator,
    ) -> Self {
        Self {
            clock,
            remote: RemoteCollector::new(remote_store, &settings),
            local: LocalCollector::new(storage),
            cache: CacheManager::new(clock, storage.cache()),
            settings,
            roster,
            synthetic,
            pass: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ProgressSettings {
        &self.settings
    }

    //
    // ─── READS ─────────────────────────────────────────────────────────────────
    //

    /// Cached aggregate for `scope`, recomputed when missing or expired.
    pub async fn snapshot(&self, scope: &RosterScope) -> ProgressSnapshot {
        let key = scope.cache_key();
        if let Some(cached) = self.cache.peek::<ProgressSnapshot>(&key).await {
            if cached.is_fresh {
                return cached.value;
            }
        }

        // Another pass may have stored the entry while this one waited.
        let _pass = self.pass.lock().await;
        self.cache
            .get_or_compute(&key, self.settings.cache_ttl_secs(), || self.compute(scope))
            .await
    }

    /// Serve whatever is cached immediately; when it has expired, recompute in
    /// the background and hand back the task.
    ///
    /// With nothing cached this behaves like [`ProgressService::snapshot`].
    pub async fn snapshot_or_refresh(
        self: &Arc<Self>,
        scope: &RosterScope,
    ) -> (ProgressSnapshot, Option<JoinHandle<ProgressSnapshot>>) {
        let key = scope.cache_key();
        match self.cache.peek::<ProgressSnapshot>(&key).await {
            Some(cached) if cached.is_fresh => (cached.value, None),
            Some(stale) => {
                let service = Arc::clone(self);
                let scope = scope.clone();
                let handle = tokio::spawn(async move { service.refresh(&scope).await });
                (stale.value, Some(handle))
            }
            None => (self.snapshot(scope).await, None),
        }
    }

    /// Progress for one child in one subject. Unknown children and subjects
    /// without activity yield an empty aggregate.
    pub async fn get_subject_progress(
        &self,
        child_id: &ChildId,
        subject: CanonicalSubject,
    ) -> SubjectProgress {
        let mut all = self.get_all_subjects_progress(child_id).await;
        all.remove(&subject).unwrap_or_else(|| {
            SubjectProgress::empty(
                child_id.clone(),
                subject,
                self.settings.default_lessons_total(),
            )
        })
    }

    /// Progress for one child in every subject, including empty ones.
    pub async fn get_all_subjects_progress(
        &self,
        child_id: &ChildId,
    ) -> BTreeMap<CanonicalSubject, SubjectProgress> {
        let snapshot = self.snapshot(&RosterScope::Child(child_id.clone())).await;
        let mut subjects = snapshot
            .progress
            .children
            .get(child_id)
            .map(|child| child.subjects.clone())
            .unwrap_or_default();
        for subject in CanonicalSubject::ALL {
            subjects.entry(subject).or_insert_with(|| {
                SubjectProgress::empty(
                    child_id.clone(),
                    subject,
                    self.settings.default_lessons_total(),
                )
            });
        }
        subjects
    }

    /// Minutes per day of the current week, summed over the cohort.
    pub async fn get_weekly_activity(&self, scope: &RosterScope) -> WeeklyActivity {
        self.snapshot(scope).await.progress.weekly
    }

    /// Drop the cached aggregate for `scope` and recompute it.
    pub async fn refresh(&self, scope: &RosterScope) -> ProgressSnapshot {
        let key = scope.cache_key();
        let _pass = self.pass.lock().await;
        if let Err(err) = self.cache.invalidate(&key).await {
            warn!(scope = %scope, error = %err, "could not invalidate progress cache");
        }
        self.cache
            .get_or_compute(&key, self.settings.cache_ttl_secs(), || self.compute(scope))
            .await
    }

    //
    // ─── WRITES ────────────────────────────────────────────────────────────────
    //

    /// Purge local synthetic records for every child in `scope` and invalidate
    /// every cached view that contained them. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the roster or the local logs are unavailable.
    pub async fn clear_synthetic_data(&self, scope: &RosterScope) -> Result<usize, ProgressError> {
        let _pass = self.pass.lock().await;
        let children = self.roster.list_children(scope).await?;
        let ids: Vec<ChildId> = children.iter().map(|child| child.id.clone()).collect();
        let removed = self.local.purge_synthetic(&ids).await?;

        let mut keys = affected_keys(&children);
        keys.insert(scope.cache_key());
        for key in &keys {
            self.cache.invalidate(key).await?;
        }

        info!(scope = %scope, removed, invalidated = keys.len(), "cleared synthetic progress data");
        Ok(removed)
    }

    /// Append a finished quiz attempt and invalidate views containing the child.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the attempt cannot be written or a cache entry
    /// cannot be invalidated.
    pub async fn record_quiz_attempt(&self, attempt: QuizAttemptRecord) -> Result<(), ProgressError> {
        let child_id = attempt.child_id.clone();
        let _pass = self.pass.lock().await;
        self.local.record_quiz_attempt(attempt).await?;
        self.invalidate_child(&child_id).await
    }

    /// Append a finished lesson and invalidate views containing the child.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the lesson cannot be written or a cache entry
    /// cannot be invalidated.
    pub async fn record_lesson_completion(
        &self,
        lesson: LessonCompletionRecord,
    ) -> Result<(), ProgressError> {
        let child_id = lesson.child_id.clone();
        let _pass = self.pass.lock().await;
        self.local.record_lesson_completion(lesson).await?;
        self.invalidate_child(&child_id).await
    }

    async fn invalidate_child(&self, child_id: &ChildId) -> Result<(), ProgressError> {
        let own = RosterScope::Child(child_id.clone());
        let mut keys = BTreeSet::from([own.cache_key(), RosterScope::All.cache_key()]);
        match self.roster.list_children(&own).await {
            Ok(children) => keys.extend(affected_keys(&children)),
            Err(err) => {
                warn!(child_id = %child_id, error = %err, "roster unavailable, parent view may stay stale");
            }
        }
        for key in &keys {
            self.cache.invalidate(key).await?;
        }
        Ok(())
    }

    //
    // ─── AGGREGATION PASS ──────────────────────────────────────────────────────
    //

    #[tracing::instrument(skip(self), fields(scope = %scope))]
    async fn compute(&self, scope: &RosterScope) -> ProgressSnapshot {
        let now = self.clock.now();
        let mut incomplete_sources = 0;

        let children = self.roster.list_children(scope).await.unwrap_or_else(|err| {
            warn!(error = %err, "roster unavailable, aggregating an empty cohort");
            incomplete_sources += 1;
            Vec::new()
        });

        let (mut records, remote) = tokio::join!(
            self.local.read_cohort(&children),
            self.remote.read_cohort(&children),
        );
        incomplete_sources += remote.failures.len();
        records.extend(remote.records);

        // Placeholders only stand in for data known to be absent.
        if self.settings.synthetic_fallback() && incomplete_sources == 0 {
            let generated = self.synthetic.maybe_generate(&children, &records);
            if !generated.is_empty() {
                match self.local.append_synthetic(&generated).await {
                    Ok(()) => self.invalidate_generated(scope, &children, &generated).await,
                    Err(err) => warn!(error = %err, "could not persist synthetic records"),
                }
                records.extend(generated);
            }
        } else if self.settings.synthetic_fallback() {
            debug!(incomplete_sources, "sources incomplete, skipping synthetic fallback");
        }

        let week_start = time::week_start(now, self.settings.week_utc_offset_minutes());
        let params = AggregationParams::from_settings(&self.settings, week_start);
        let progress = aggregate(&records, &children, &params);

        for group in &progress.mixed_groups {
            warn!(
                child_id = %group.child_id,
                subject = group.subject.as_str(),
                "synthetic and real records coexist; clear demo data to remove placeholders"
            );
        }

        ProgressSnapshot {
            cohort_key: scope.cache_key(),
            computed_at: now,
            progress,
            incomplete_sources,
        }
    }

    /// Other cached views holding the children that just got placeholders are
    /// now out of date.
    async fn invalidate_generated(
        &self,
        scope: &RosterScope,
        children: &[ChildProfile],
        generated: &[RawActivityRecord],
    ) {
        let ids: BTreeSet<&ChildId> = generated.iter().map(|record| &record.child_id).collect();
        let touched: Vec<ChildProfile> = children
            .iter()
            .filter(|child| ids.contains(&child.id))
            .cloned()
            .collect();
        let own = scope.cache_key();
        for key in affected_keys(&touched).into_iter().filter(|key| *key != own) {
            if let Err(err) = self.cache.invalidate(&key).await {
                warn!(key = %key, error = %err, "could not invalidate view after synthetic fallback");
            }
        }
    }
}

fn affected_keys(children: &[ChildProfile]) -> BTreeSet<String> {
    children
        .iter()
        .flat_map(RosterScope::scopes_containing)
        .map(|scope| scope.cache_key())
        .collect()
}
