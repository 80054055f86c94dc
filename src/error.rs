// Error taxonomy for the streaming engine.

use crate::source::traits::SourceError;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the session pool, the range streamer and the HTTP boundary
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad or missing configuration (credential, numeric setting)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A session with the same id is already registered
    #[error("session {0} is already registered")]
    DuplicateSession(String),

    /// A second primary session was registered
    #[error("primary session {existing} is already registered, refusing {rejected}")]
    MultiplePrimary { existing: String, rejected: String },

    /// The underlying connection could not be established
    #[error("session {id} failed to start: {source}")]
    SessionStart {
        id: String,
        #[source]
        source: anyhow::Error,
    },

    /// No running session has spare capacity
    #[error("no session available")]
    CapacityExhausted,

    /// The catalog has no such record (the payload names it, e.g. `track abc`)
    #[error("{0} not found")]
    CatalogNotFound(String),

    /// The catalog record carries no usable channel/message coordinates
    #[error("track {0} has no valid storage coordinates")]
    InvalidStorageCoordinates(String),

    /// The requested interval lies outside the file
    #[error("range {start}-{end} not satisfiable for {file_size} bytes")]
    RangeNotSatisfiable { start: u64, end: u64, file_size: u64 },

    /// Resolving the file on the platform failed before streaming began
    #[error("file resolution failed: {0}")]
    Resolve(#[source] SourceError),

    /// A chunk fetch failed after the response started
    #[error("chunk {chunk} fetch failed: {source}")]
    StreamFetch {
        chunk: u64,
        #[source]
        source: SourceError,
    },

    /// Catalog storage failure
    #[error("catalog error: {0}")]
    Catalog(#[from] anyhow::Error),
}
