//! Postgres-backed [`resumable_core::SessionStore`].
//!
//! Migrations under `migrations/` are embedded and applied when the pool is created.
mod errors;
pub use errors::{Error, Result};
mod metadata;
pub use metadata::{PostgresConfig, PostgresMetadataPool};
mod upload_sessions;
pub use upload_sessions::PgSessionStore;

impl PostgresConfig {
    pub async fn new_store(&self) -> Result<PgSessionStore> {
        Ok(PgSessionStore::new(self.new_metadata().await?))
    }
}
