use std::sync::Arc;

use progress_core::model::ProgressSettings;
use storage::repository::Storage;
use tracing::info;

use crate::error::AppServicesError;
use crate::progress_service::ProgressService;
use crate::remote::{HttpDocumentStore, HttpStoreConfig, InMemoryDocumentStore, RemoteDocumentStore};
use crate::roster::RosterProvider;
use crate::Clock;

/// Assembles the progress service over its storage and remote collaborators.
#[derive(Clone)]
pub struct AppServices {
    progress: Arc<ProgressService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// The remote store is reached over HTTP when `remote_base_url` is set;
    /// otherwise remote collections read as empty.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: ProgressSettings,
        roster: Arc<dyn RosterProvider>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::with_storage(&storage, clock, settings, roster))
    }

    #[must_use]
    pub fn with_storage(
        storage: &Storage,
        clock: Clock,
        settings: ProgressSettings,
        roster: Arc<dyn RosterProvider>,
    ) -> Self {
        let remote = remote_store(&settings);
        let progress = Arc::new(ProgressService::new(clock, settings, roster, storage, remote));
        Self { progress }
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }
}

fn remote_store(settings: &ProgressSettings) -> Arc<dyn RemoteDocumentStore> {
    match settings.remote_base_url() {
        Some(url) => {
            info!(url, "reading remote progress over HTTP");
            Arc::new(HttpDocumentStore::new(HttpStoreConfig::new(url)))
        }
        None => {
            info!("no remote store configured, using local records only");
            Arc::new(InMemoryDocumentStore::new())
        }
    }
}
