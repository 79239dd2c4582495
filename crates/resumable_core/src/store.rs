use async_trait::async_trait;

use crate::errors::Result;
use crate::session::{Fingerprint, SessionRecord};

/// Durable storage for [`SessionRecord`]s.
///
/// A fingerprint and a session id each resolve to at most one record.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    async fn get_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<SessionRecord>>;

    async fn get_by_session_id(&self, session_id: &str) -> Result<Option<SessionRecord>>;

    /// Persist a new upload attempt, replacing any record held for the same fingerprint.
    ///
    /// The returned record carries its stored version, which is greater than any version the
    /// replaced record ever had so writers still holding the old attempt fail with
    /// [`Error::Conflict`](crate::Error::Conflict).
    async fn insert(&self, record: &SessionRecord) -> Result<SessionRecord>;

    /// Merge `upload_state` and `completed_parts` into the stored record.
    ///
    /// Succeeds only if the stored version still equals `record.version`; the version is then
    /// bumped and the stored record returned. A version mismatch or a missing record yields
    /// [`Error::Conflict`](crate::Error::Conflict).
    async fn update(&self, record: &SessionRecord) -> Result<SessionRecord>;
}
