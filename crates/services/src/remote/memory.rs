use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{Direction, Document, DocumentQuery, RemoteDocumentStore};
use crate::error::RemoteError;

#[derive(Default)]
struct State {
    collections: HashMap<String, Vec<Document>>,
    failures: HashMap<String, RemoteError>,
    delays: HashMap<String, Duration>,
}

/// In-process document store with injectable failures and latency.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    state: Arc<Mutex<State>>,
    started: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

/// Counts a query as in flight until dropped, including on cancellation.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, high_water: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        high_water.fetch_max(now, AtomicOrdering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, AtomicOrdering::SeqCst);
    }
}

impl InMemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document to a collection.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Transport` if the lock is poisoned.
    pub fn insert(&self, collection: &str, document: Document) -> Result<(), RemoteError> {
        let mut state = self.lock()?;
        state
            .collections
            .entry(collection.to_owned())
            .or_default()
            .push(document);
        Ok(())
    }

    /// Make every query on `collection` fail with `error`.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Transport` if the lock is poisoned.
    pub fn fail_with(&self, collection: &str, error: RemoteError) -> Result<(), RemoteError> {
        self.lock()?.failures.insert(collection.to_owned(), error);
        Ok(())
    }

    /// Delay every query on `collection` by `delay`.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Transport` if the lock is poisoned.
    pub fn delay(&self, collection: &str, delay: Duration) -> Result<(), RemoteError> {
        self.lock()?.delays.insert(collection.to_owned(), delay);
        Ok(())
    }

    /// Queries that have been started.
    #[must_use]
    pub fn started_queries(&self) -> usize {
        self.started.load(AtomicOrdering::SeqCst)
    }

    /// Queries that ran to completion (cancelled queries are not counted).
    #[must_use]
    pub fn completed_queries(&self) -> usize {
        self.completed.load(AtomicOrdering::SeqCst)
    }

    /// Largest number of queries that were running at the same time.
    #[must_use]
    pub fn max_in_flight_queries(&self) -> usize {
        self.max_in_flight.load(AtomicOrdering::SeqCst)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>, RemoteError> {
        self.state
            .lock()
            .map_err(|e| RemoteError::Transport(e.to_string()))
    }

    fn run(&self, query: &DocumentQuery) -> Result<Vec<Document>, RemoteError> {
        let state = self.lock()?;
        if let Some(error) = state.failures.get(&query.collection) {
            return Err(error.clone());
        }

        let mut docs: Vec<Document> = state
            .collections
            .get(&query.collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| {
                        query
                            .filters
                            .iter()
                            .all(|f| doc.field(&f.field) == Some(&f.value))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order_by {
            docs.sort_by(|a, b| {
                let ord = compare_values(a.field(&order.field), b.field(&order.field));
                match order.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        docs.truncate(usize::try_from(query.limit).unwrap_or(usize::MAX));
        Ok(docs)
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl RemoteDocumentStore for InMemoryDocumentStore {
    async fn query(&self, query: &DocumentQuery) -> Result<Vec<Document>, RemoteError> {
        self.started.fetch_add(1, AtomicOrdering::SeqCst);
        let _in_flight = InFlight::enter(&self.in_flight, &self.max_in_flight);
        let delay = self.lock()?.delays.get(&query.collection).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let result = self.run(query);
        self.completed.fetch_add(1, AtomicOrdering::SeqCst);
        result
    }
}
