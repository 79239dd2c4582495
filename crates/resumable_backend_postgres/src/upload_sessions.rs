use async_trait::async_trait;

use resumable_core::{Fingerprint, Result, SessionRecord, SessionStore};

use super::metadata::PostgresMetadataPool;

/// [`SessionStore`] backed by the `upload_sessions` table.
#[derive(Clone)]
pub struct PgSessionStore {
    metadata: PostgresMetadataPool,
}

impl PgSessionStore {
    pub fn new(metadata: PostgresMetadataPool) -> Self {
        Self { metadata }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn get_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<SessionRecord>> {
        self.metadata
            .get_conn()
            .await?
            .get_by_fingerprint(fingerprint.as_str())
            .await?
            .map(SessionRecord::try_from)
            .transpose()
    }

    async fn get_by_session_id(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        self.metadata
            .get_conn()
            .await?
            .get_by_session_id(session_id)
            .await?
            .map(SessionRecord::try_from)
            .transpose()
    }

    async fn insert(&self, record: &SessionRecord) -> Result<SessionRecord> {
        let row = self
            .metadata
            .get_conn()
            .await?
            .upsert_session(record)
            .await?;
        tracing::debug!(session_id = %row.session_id, version = row.version, "stored session");
        row.try_into()
    }

    async fn update(&self, record: &SessionRecord) -> Result<SessionRecord> {
        self.metadata
            .get_conn()
            .await?
            .compare_and_swap(record)
            .await?
            .try_into()
    }
}
