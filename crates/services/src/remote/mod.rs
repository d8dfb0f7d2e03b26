//! Client-side view of the remote document store.

mod http;
mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RemoteError;

pub use http::{HttpDocumentStore, HttpStoreConfig};
pub use memory::InMemoryDocumentStore;

/// A stored document: server id, arbitrary fields and the server timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Document {
    #[must_use]
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
            created_at: None,
        }
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Equality filter on a top-level field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// `query(collection, filters, orderBy, limit)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentQuery {
    pub collection: String,
    pub filters: Vec<FieldFilter>,
    pub order_by: Option<OrderBy>,
    pub limit: u32,
}

impl DocumentQuery {
    #[must_use]
    pub fn new(collection: impl Into<String>, limit: u32) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            limit,
        }
    }

    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(FieldFilter {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn newest_first(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction: Direction::Descending,
        });
        self
    }
}

#[async_trait]
pub trait RemoteDocumentStore: Send + Sync {
    /// Run a query against one collection.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` on permission, transport or decoding failures.
    async fn query(&self, query: &DocumentQuery) -> Result<Vec<Document>, RemoteError>;
}
