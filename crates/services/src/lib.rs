#![forbid(unsafe_code)]

pub mod app_services;
pub mod cache_manager;
pub mod collectors;
pub mod error;
pub mod progress_service;
pub mod remote;
pub mod roster;
pub mod synthetic;

pub use progress_core::Clock;

pub use app_services::AppServices;
pub use cache_manager::{CacheManager, Cached};
pub use collectors::{
    LocalCollector, RemoteCollection, RemoteCollector, RemoteRead, SourceFailure,
};
pub use error::{AppServicesError, ProgressError, RemoteError, RosterError};
pub use progress_service::ProgressService;
pub use remote::{
    Document, DocumentQuery, HttpDocumentStore, HttpStoreConfig, InMemoryDocumentStore,
    RemoteDocumentStore,
};
pub use roster::{InMemoryRoster, ParseScopeError, RosterProvider, RosterScope};
pub use synthetic::SyntheticGenerator;
