use thiserror;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("sqlx error: {0}")]
    SQLXError(#[from] sqlx::Error),
    #[error("sqlx migration error: {0}")]
    SQLXMigrateError(#[from] sqlx::migrate::MigrateError),
    #[error("sea-query error: {0}")]
    SeaQueryError(#[from] sea_query::error::Error),

    #[error("error serializing completed parts: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("column {0} out of range: {1}")]
    ColumnOutOfRange(&'static str, i128),

    #[error("session {0} version is stale or missing")]
    StaleVersion(String),
}

impl From<Error> for resumable_core::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::StaleVersion(session_id) => resumable_core::Error::Conflict(session_id),
            e => resumable_core::Error::PersistenceError(e.to_string()),
        }
    }
}
