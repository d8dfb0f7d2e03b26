use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use progress_core::model::{
    CanonicalSubject, ChildId, ChildProfile, ProgressSettings, RawActivityRecord, SourceKind,
};
use progress_core::normalizer;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::RemoteError;
use crate::remote::{Document, DocumentQuery, RemoteDocumentStore};

/// Document collections read per child, in merge order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteCollection {
    Reports,
    QuizSubmissions,
    LessonProgress,
}

impl RemoteCollection {
    pub const ALL: [RemoteCollection; 3] = [
        RemoteCollection::Reports,
        RemoteCollection::QuizSubmissions,
        RemoteCollection::LessonProgress,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            RemoteCollection::Reports => "reports",
            RemoteCollection::QuizSubmissions => "quizSubmissions",
            RemoteCollection::LessonProgress => "lessonProgress",
        }
    }

    #[must_use]
    pub fn source_kind(self) -> SourceKind {
        match self {
            RemoteCollection::Reports => SourceKind::RemoteReport,
            RemoteCollection::QuizSubmissions => SourceKind::RemoteQuiz,
            RemoteCollection::LessonProgress => SourceKind::RemoteLesson,
        }
    }
}

/// One query that contributed nothing to the read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub child_id: ChildId,
    pub collection: RemoteCollection,
    pub error: RemoteError,
}

/// Records gathered from the remote store plus the queries that failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteRead {
    pub records: Vec<RawActivityRecord>,
    pub failures: Vec<SourceFailure>,
}

impl RemoteRead {
    /// True when at least one query failed or timed out.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    fn merge(&mut self, other: RemoteRead) {
        self.records.extend(other.records);
        self.failures.extend(other.failures);
    }
}

/// Reads classroom reports, quiz submissions and lesson progress per child.
#[derive(Clone)]
pub struct RemoteCollector {
    store: Arc<dyn RemoteDocumentStore>,
    timeout: Duration,
    limit: u32,
    batch_size: usize,
}

impl RemoteCollector {
    #[must_use]
    pub fn new(store: Arc<dyn RemoteDocumentStore>, settings: &ProgressSettings) -> Self {
        Self {
            store,
            timeout: settings.remote_timeout(),
            limit: settings.remote_limit(),
            batch_size: settings.remote_batch_size().max(1),
        }
    }

    /// Read every collection for one child concurrently.
    ///
    /// Failures are recorded in the result, never returned as an error.
    pub async fn read_remote(
        &self,
        child_id: &ChildId,
        subject_filter: Option<CanonicalSubject>,
    ) -> RemoteRead {
        let (reports, quizzes, lessons) = tokio::join!(
            self.read_collection(child_id, RemoteCollection::Reports),
            self.read_collection(child_id, RemoteCollection::QuizSubmissions),
            self.read_collection(child_id, RemoteCollection::LessonProgress),
        );

        let mut read = RemoteRead::default();
        for (collection, result) in RemoteCollection::ALL
            .into_iter()
            .zip([reports, quizzes, lessons])
        {
            match result {
                Ok(records) => read.records.extend(records.into_iter().filter(|record| {
                    subject_filter.is_none_or(|subject| {
                        normalizer::normalize(&record.raw_category, record.source_hint.as_deref())
                            .subject()
                            == Some(subject)
                    })
                })),
                Err(error) => {
                    warn!(
                        child_id = %child_id,
                        collection = collection.name(),
                        error = %error,
                        "remote source unavailable, continuing without it"
                    );
                    read.failures.push(SourceFailure {
                        child_id: child_id.clone(),
                        collection,
                        error,
                    });
                }
            }
        }
        read
    }

    /// Read a cohort in fixed-size batches; batches run one after another.
    #[tracing::instrument(skip(self, children), fields(children = children.len()))]
    pub async fn read_cohort(&self, children: &[ChildProfile]) -> RemoteRead {
        let mut read = RemoteRead::default();
        for batch in children.chunks(self.batch_size) {
            let results = join_all(batch.iter().map(|child| self.read_remote(&child.id, None))).await;
            for result in results {
                read.merge(result);
            }
        }
        debug!(
            records = read.records.len(),
            failures = read.failures.len(),
            "remote cohort read finished"
        );
        read
    }

    async fn read_collection(
        &self,
        child_id: &ChildId,
        collection: RemoteCollection,
    ) -> Result<Vec<RawActivityRecord>, RemoteError> {
        let query = DocumentQuery::new(collection.name(), self.limit)
            .filter("childId", child_id.as_str())
            .newest_first("timestamp");

        // Dropping the query future on timeout cancels the in-flight request.
        let documents = tokio::time::timeout(self.timeout, self.store.query(&query))
            .await
            .map_err(|_| RemoteError::Timeout)??;

        Ok(documents
            .iter()
            .filter(|doc| !is_synthetic(doc))
            .filter_map(|doc| {
                let record = document_to_record(doc, collection);
                if record.is_none() {
                    debug!(doc_id = %doc.id, collection = collection.name(), "skipping unusable document");
                }
                record
            })
            .collect())
    }
}

fn is_synthetic(doc: &Document) -> bool {
    ["isSynthetic", "isDemo"]
        .iter()
        .any(|field| doc.field(field).and_then(Value::as_bool).unwrap_or(false))
}

fn first_str<'a>(doc: &'a Document, fields: &[&str]) -> Option<&'a str> {
    fields
        .iter()
        .find_map(|field| doc.field(field).and_then(Value::as_str))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn first_f64(doc: &Document, fields: &[&str]) -> Option<f64> {
    fields.iter().find_map(|field| match doc.field(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn first_u32(doc: &Document, fields: &[&str]) -> Option<u32> {
    first_f64(doc, fields)
        .filter(|v| v.is_finite() && *v >= 0.0)
        .and_then(|v| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let rounded = v.round() as u64;
            u32::try_from(rounded).ok()
        })
}

fn timestamp(doc: &Document) -> Option<DateTime<Utc>> {
    ["timestamp", "completedAt", "submittedAt", "createdAt"]
        .iter()
        .find_map(|field| match doc.field(field)? {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
            _ => None,
        })
        .or(doc.created_at)
}

/// Map a document onto a raw record. Documents without a child or a
/// timestamp are unusable and yield `None`.
fn document_to_record(doc: &Document, collection: RemoteCollection) -> Option<RawActivityRecord> {
    let child_id = first_str(doc, &["childId", "studentId"])?;
    let timestamp = timestamp(doc)?;
    let category = first_str(doc, &["category", "quizCategory", "lessonCategory", "title"])
        .unwrap_or_default();

    Some(RawActivityRecord {
        id: doc.id.clone(),
        child_id: ChildId::new(child_id),
        raw_category: category.to_owned(),
        source_hint: first_str(doc, &["subject"]).map(str::to_owned),
        score: first_f64(doc, &["score"]),
        total_questions: first_u32(doc, &["totalQuestions"]),
        percentage: first_f64(doc, &["percentage"]),
        timestamp_utc: timestamp,
        time_spent_minutes: first_u32(doc, &["timeSpentMinutes", "timeSpent"]),
        lessons_total: first_u32(doc, &["totalLessons", "lessonsTotal"]),
        source_kind: collection.source_kind(),
        is_synthetic: false,
    })
}
