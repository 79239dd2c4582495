use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::errors::{Error, Result};
use crate::session::{Fingerprint, SessionRecord};
use crate::store::SessionStore;

/// Process-local [`SessionStore`]. Nothing survives a restart.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    records: Arc<Mutex<HashMap<String, SessionRecord>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, SessionRecord>>> {
        self.records
            .lock()
            .map_err(|e| Error::PersistenceError(format!("session map poisoned: {e}")))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_by_fingerprint(&self, fingerprint: &Fingerprint) -> Result<Option<SessionRecord>> {
        Ok(self
            .lock()?
            .values()
            .find(|r| &r.fingerprint == fingerprint)
            .cloned())
    }

    async fn get_by_session_id(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        Ok(self.lock()?.get(session_id).cloned())
    }

    async fn insert(&self, record: &SessionRecord) -> Result<SessionRecord> {
        let mut records = self.lock()?;

        let mut last_version = 0;
        records.retain(|id, r| {
            let replaced = id == &record.session_id || r.fingerprint == record.fingerprint;
            if replaced {
                last_version = last_version.max(r.version);
            }
            !replaced
        });

        let mut stored = record.clone();
        stored.version = last_version.max(record.version) + 1;
        records.insert(stored.session_id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update(&self, record: &SessionRecord) -> Result<SessionRecord> {
        let mut records = self.lock()?;
        match records.get_mut(&record.session_id) {
            Some(stored) if stored.version == record.version => {
                stored.upload_state = record.upload_state;
                stored.completed_parts = record.completed_parts.clone();
                stored.version += 1;
                Ok(stored.clone())
            }
            _ => Err(Error::Conflict(record.session_id.clone())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::session::{CompletedPart, UploadState};

    fn record(fingerprint: &str, upload_id: &str) -> SessionRecord {
        SessionRecord::new(
            Fingerprint::try_from(fingerprint).unwrap(),
            upload_id.to_string(),
            2,
            20,
            "notes.txt",
        )
    }

    #[tokio::test]
    async fn insert_round_trips_through_both_lookups() {
        let store = MemorySessionStore::new();
        let stored = store.insert(&record("abc123", "upload-1")).await.unwrap();

        let by_fingerprint = store
            .get_by_fingerprint(&stored.fingerprint)
            .await
            .unwrap()
            .unwrap();
        let by_id = store.get_by_session_id("abc123").await.unwrap().unwrap();

        assert_eq!(by_fingerprint, stored);
        assert_eq!(by_id, stored);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn missing_records_are_none() {
        let store = MemorySessionStore::new();
        let fingerprint = Fingerprint::try_from("nope").unwrap();
        assert!(store.get_by_fingerprint(&fingerprint).await.unwrap().is_none());
        assert!(store.get_by_session_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reinsert_replaces_attempt_and_invalidates_old_version() {
        let store = MemorySessionStore::new();
        let first = store.insert(&record("abc123", "upload-1")).await.unwrap();
        let second = store.insert(&record("abc123", "upload-2")).await.unwrap();

        assert!(second.version > first.version);
        let current = store.get_by_session_id("abc123").await.unwrap().unwrap();
        assert_eq!(current.store_upload_id, "upload-2");

        let mut stale = first;
        stale.upload_state = UploadState::Uploaded;
        assert!(matches!(store.update(&stale).await, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn update_merges_mutable_fields_only() {
        let store = MemorySessionStore::new();
        let stored = store.insert(&record("abc123", "upload-1")).await.unwrap();

        let mut changed = stored.clone();
        changed.upload_state = UploadState::Uploaded;
        changed.completed_parts.push(CompletedPart::new(1, "a"));
        changed.store_upload_id = String::from("tampered");
        changed.file_name = String::from("tampered");

        let updated = store.update(&changed).await.unwrap();
        assert_eq!(updated.version, stored.version + 1);
        assert_eq!(updated.upload_state, UploadState::Uploaded);
        assert_eq!(updated.completed_parts, vec![CompletedPart::new(1, "a")]);
        assert_eq!(updated.store_upload_id, "upload-1");
        assert_eq!(updated.file_name, "notes.txt");
    }

    #[tokio::test]
    async fn update_of_unknown_session_conflicts() {
        let store = MemorySessionStore::new();
        let r = record("abc123", "upload-1");
        assert!(matches!(store.update(&r).await, Err(Error::Conflict(_))));
    }
}
