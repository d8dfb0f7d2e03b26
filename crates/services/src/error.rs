//! Shared error types for the services crate.

use thiserror::Error;

use progress_core::model::SettingsError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors from a single remote document query.
///
/// These never abort an aggregation pass; they are recorded as incomplete
/// sources and logged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RemoteError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("query timed out")]
    Timeout,
    #[error("remote request failed: {0}")]
    Transport(String),
    #[error("remote store returned status {0}")]
    Status(u16),
    #[error("malformed remote response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return RemoteError::Timeout;
        }
        if err.is_decode() {
            return RemoteError::Malformed(err.to_string());
        }
        RemoteError::Transport(err.to_string())
    }
}

/// Errors emitted by roster providers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RosterError {
    #[error("roster unavailable: {0}")]
    Unavailable(String),
    #[error("malformed roster: {0}")]
    Malformed(String),
}

/// Errors emitted by `ProgressService` write operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Roster(#[from] RosterError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}
