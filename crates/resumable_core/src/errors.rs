use thiserror;

pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the coordinator and every backend.
///
/// Backend crates convert their own error types into one of these variants; the HTTP layer maps
/// each variant onto a status code.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Malformed or out-of-bound client input. Never worth retrying.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An object store call failed. The message is the store's own.
    #[error("{0}")]
    UpstreamError(String),

    /// The session metadata store failed to read or write.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// A versioned write lost to a concurrent writer.
    #[error("session {0} was modified concurrently")]
    Conflict(String),

    #[error("content {0} has already been uploaded")]
    AlreadyUploaded(String),
}
