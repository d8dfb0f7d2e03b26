mod local;
mod remote;

pub use local::LocalCollector;
pub use remote::{RemoteCollection, RemoteCollector, RemoteRead, SourceFailure};
