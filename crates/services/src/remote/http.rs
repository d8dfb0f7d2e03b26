use std::env;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{Document, DocumentQuery, RemoteDocumentStore};
use crate::error::RemoteError;

#[derive(Clone, Debug)]
pub struct HttpStoreConfig {
    pub base_url: String,
    pub api_token: Option<String>,
}

impl HttpStoreConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: env::var("PROGRESS_REMOTE_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),
        }
    }
}

/// Document store reached over HTTP: `POST {base_url}/query` with the query as JSON.
#[derive(Clone)]
pub struct HttpDocumentStore {
    client: Client,
    config: HttpStoreConfig,
}

impl HttpDocumentStore {
    #[must_use]
    pub fn new(config: HttpStoreConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Vec<Document>,
}

#[async_trait]
impl RemoteDocumentStore for HttpDocumentStore {
    async fn query(&self, query: &DocumentQuery) -> Result<Vec<Document>, RemoteError> {
        let url = format!("{}/query", self.config.base_url.trim_end_matches('/'));
        let mut request = self.client.post(url).json(query);
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if let Some(err) = status_error(response.status(), &query.collection) {
            return Err(err);
        }

        let body: QueryResponse = response.json().await?;
        Ok(body.documents)
    }
}

/// Error for a non-success response; auth rejections become `PermissionDenied`.
fn status_error(status: StatusCode, collection: &str) -> Option<RemoteError> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Some(RemoteError::PermissionDenied(collection.to_owned()))
        }
        status if !status.is_success() => Some(RemoteError::Status(status.as_u16())),
        _ => None,
    }
}
