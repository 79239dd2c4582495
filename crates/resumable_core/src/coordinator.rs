//! # Upload Session Coordinator
//!
//! Orchestrates resumable multipart uploads on top of a [`SessionStore`] and an
//! [`ObjectGateway`]:
//!
//! 1. [`Coordinator::start_session`] begins a multipart upload named after the content
//!    fingerprint and records it.
//! 2. [`Coordinator::issue_part_url`] hands out presigned write grants, one per part. Clients
//!    write parts straight to the store.
//! 3. [`Coordinator::report_part_completed`] keeps an advisory progress list.
//! 4. [`Coordinator::finalize_session`] assembles whatever parts the store actually holds.
//! 5. [`Coordinator::reconcile`] answers "where is this upload at?" for a fingerprint and repairs
//!    the recorded upload state when it disagrees with the store.
//!
//! The store is always authoritative. Client-reported parts are never used to finalize and the
//! recorded upload state is corrected, never trusted, during reconciliation.
use std::sync::Arc;

use crate::errors::{Error, Result};
use crate::gateway::{ObjectGateway, ObjectMetadata, ObjectReference, PartUrlRequest};
use crate::limits::Limits;
use crate::session::{CompletedPart, Fingerprint, SessionRecord, UploadState};
use crate::store::SessionStore;

// upper bound on load-modify-swap rounds for one logical write
const MAX_WRITE_ATTEMPTS: usize = 8;

/// Identifiers a client needs to drive the rest of an upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartedSession {
    pub session_id: String,
    pub store_upload_id: String,
}

/// Outcome of [`Coordinator::reconcile`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reconciliation {
    /// No session was ever started for the fingerprint.
    NotFound,
    Resolved {
        session_id: String,
        uploaded: bool,
        store_upload_id: String,
        /// Parts the store currently holds, sorted by part number. Empty once uploaded.
        parts: Vec<CompletedPart>,
    },
}

#[derive(Clone)]
pub struct Coordinator {
    sessions: Arc<dyn SessionStore>,
    objects: Arc<dyn ObjectGateway>,
    limits: Limits,
}

impl Coordinator {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        objects: Arc<dyn ObjectGateway>,
        limits: Limits,
    ) -> Self {
        Self {
            sessions,
            objects,
            limits,
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Begin a new upload attempt for `fingerprint`.
    ///
    /// Each call begins a fresh multipart upload in the store and replaces any earlier attempt
    /// for the same content, unless that content is already recorded as uploaded.
    pub async fn start_session(
        &self,
        fingerprint: &Fingerprint,
        total_parts: u32,
        size_bytes: u64,
        file_name: &str,
    ) -> Result<StartedSession> {
        if total_parts == 0 || total_parts > self.limits.max_parts_count {
            return Err(Error::InvalidArgument(format!(
                "total part count {total_parts} must be in 1..={}",
                self.limits.max_parts_count
            )));
        }
        if size_bytes == 0 || size_bytes > self.limits.max_object_size_bytes {
            return Err(Error::InvalidArgument(format!(
                "size {size_bytes} must be in 1..={}",
                self.limits.max_object_size_bytes
            )));
        }

        if let Some(existing) = self.sessions.get_by_fingerprint(fingerprint).await? {
            if existing.is_uploaded() {
                return Err(Error::AlreadyUploaded(fingerprint.to_string()));
            }
            tracing::debug!(
                %fingerprint,
                previous_upload_id = %existing.store_upload_id,
                "replacing unfinished upload attempt"
            );
        }

        let metadata = ObjectMetadata {
            file_name: file_name.to_string(),
        };
        let upload_id = self
            .objects
            .begin_multipart(fingerprint.as_str(), &metadata)
            .await?;

        let record = SessionRecord::new(
            fingerprint.clone(),
            upload_id,
            total_parts,
            size_bytes,
            file_name,
        );
        let record = self.sessions.insert(&record).await?;

        tracing::info!(
            session_id = %record.session_id,
            upload_id = %record.store_upload_id,
            total_parts,
            size_bytes,
            "started upload session"
        );

        Ok(StartedSession {
            session_id: record.session_id,
            store_upload_id: record.store_upload_id,
        })
    }

    /// Sign a write grant for one part. Validation happens before the gateway is contacted and
    /// no session state is read or written.
    pub async fn issue_part_url(
        &self,
        session_id: &str,
        store_upload_id: &str,
        part_number: i32,
        part_size: u64,
    ) -> Result<String> {
        if session_id.is_empty() {
            return Err(Error::InvalidArgument(String::from("session id is empty")));
        }
        if store_upload_id.is_empty() {
            return Err(Error::InvalidArgument(String::from("upload id is empty")));
        }
        if part_number <= 0 || part_number as u32 > self.limits.max_parts_count {
            return Err(Error::InvalidArgument(format!(
                "part number {part_number} must be in 1..={}",
                self.limits.max_parts_count
            )));
        }
        if part_size > self.limits.max_part_size_bytes {
            return Err(Error::InvalidArgument(format!(
                "part size {part_size} exceeds {}",
                self.limits.max_part_size_bytes
            )));
        }

        let request = PartUrlRequest {
            object_name: session_id,
            upload_id: store_upload_id,
            part_number,
            size: part_size,
            expires_in: self.limits.presign_expiry(),
        };
        self.objects.presign_part_url(&request).await
    }

    /// Append a client-reported part to the session's advisory progress list.
    ///
    /// Reports for unknown sessions are ignored.
    pub async fn report_part_completed(
        &self,
        session_id: &str,
        part_number: i32,
        e_tag: &str,
    ) -> Result<()> {
        if part_number <= 0 {
            return Err(Error::InvalidArgument(format!(
                "part number {part_number} must be positive"
            )));
        }

        let part = CompletedPart::new(part_number, e_tag);
        let updated = self
            .modify(session_id, |record| record.record_completed_part(part.clone()))
            .await?;

        match updated {
            None => tracing::warn!(session_id, part_number, "part reported for unknown session"),
            Some(record) => tracing::debug!(
                session_id,
                part_number,
                reported = record.completed_parts.len(),
                declared = record.total_parts,
                "recorded completed part"
            ),
        }
        Ok(())
    }

    /// Complete the multipart upload from the parts the store actually holds.
    ///
    /// The recorded upload state is left alone; [`Coordinator::reconcile`] picks up the new
    /// object on its next pass.
    pub async fn finalize_session(
        &self,
        session_id: &str,
        store_upload_id: &str,
    ) -> Result<ObjectReference> {
        if session_id.is_empty() {
            return Err(Error::InvalidArgument(String::from("session id is empty")));
        }
        if store_upload_id.is_empty() {
            return Err(Error::InvalidArgument(String::from("upload id is empty")));
        }

        let mut parts = self.objects.list_parts(session_id, store_upload_id).await?;
        if parts.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "no parts are stored for upload {store_upload_id}"
            )));
        }
        // completion is order-sensitive and listings are not guaranteed to be ordered
        parts.sort_unstable_by_key(|p| p.part_number);
        let part_count = parts.len();

        let object = self
            .objects
            .complete_multipart(session_id, store_upload_id, parts)
            .await?;

        tracing::info!(
            session_id,
            upload_id = store_upload_id,
            part_count,
            bucket = %object.bucket,
            key = %object.key,
            "finalized upload"
        );
        Ok(object)
    }

    /// Resolve where the upload for `fingerprint` stands, correcting the recorded upload state
    /// when it disagrees with the store.
    ///
    /// Corrections are idempotent and a failure to persist one is logged rather than returned:
    /// the answer comes from the store either way.
    pub async fn reconcile(&self, fingerprint: &Fingerprint) -> Result<Reconciliation> {
        let record = match self.sessions.get_by_fingerprint(fingerprint).await? {
            Some(r) => r,
            None => return Ok(Reconciliation::NotFound),
        };

        if self.objects.object_exists(fingerprint.as_str()).await? {
            if !record.is_uploaded() {
                tracing::info!(
                    %fingerprint,
                    session_id = %record.session_id,
                    "object is stored but session was not marked uploaded, correcting"
                );
                self.correct_upload_state(&record.session_id, UploadState::Uploaded)
                    .await;
            }
            return Ok(Reconciliation::Resolved {
                session_id: record.session_id,
                uploaded: true,
                store_upload_id: record.store_upload_id,
                parts: Vec::new(),
            });
        }

        if record.is_uploaded() {
            tracing::info!(
                %fingerprint,
                session_id = %record.session_id,
                "session was marked uploaded but object is missing, correcting"
            );
            self.correct_upload_state(&record.session_id, UploadState::NotUploaded)
                .await;
        }

        let mut parts = self
            .objects
            .list_parts(fingerprint.as_str(), &record.store_upload_id)
            .await?;
        parts.sort_unstable_by_key(|p| p.part_number);

        Ok(Reconciliation::Resolved {
            session_id: record.session_id,
            uploaded: false,
            store_upload_id: record.store_upload_id,
            parts,
        })
    }

    async fn correct_upload_state(&self, session_id: &str, state: UploadState) {
        if let Err(e) = self
            .modify(session_id, |record| record.set_upload_state(state))
            .await
        {
            tracing::warn!(session_id, "failed to persist upload state correction: {e}");
        }
    }

    /// Load the session, apply `mutate`, and compare-and-swap it back, re-reading whenever a
    /// concurrent writer got there first.
    ///
    /// `mutate` returns whether it changed anything; unchanged records are not written. Returns
    /// `None` if the session does not exist.
    async fn modify<F>(&self, session_id: &str, mut mutate: F) -> Result<Option<SessionRecord>>
    where
        F: FnMut(&mut SessionRecord) -> bool + Send,
    {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let mut record = match self.sessions.get_by_session_id(session_id).await? {
                Some(r) => r,
                None => return Ok(None),
            };
            if !mutate(&mut record) {
                return Ok(Some(record));
            }
            match self.sessions.update(&record).await {
                Ok(stored) => return Ok(Some(stored)),
                Err(Error::Conflict(_)) => {
                    tracing::debug!(session_id, "session changed during update, re-reading");
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::Conflict(session_id.to_string()))
    }
}

#[cfg(test)]
mod test {
    use async_trait::async_trait;
    use rstest::*;

    use super::*;
    use crate::limits::{MAX_MULTIPART_OBJECT_SIZE, MIN_PART_SIZE};
    use crate::memory::MemorySessionStore;
    use crate::testing::ScriptedGateway;

    fn fp(s: &str) -> Fingerprint {
        Fingerprint::try_from(s).unwrap()
    }

    fn setup() -> (Coordinator, Arc<MemorySessionStore>, Arc<ScriptedGateway>) {
        let store = Arc::new(MemorySessionStore::new());
        let gateway = Arc::new(ScriptedGateway::new());
        let coordinator = Coordinator::new(store.clone(), gateway.clone(), Limits::default());
        (coordinator, store, gateway)
    }

    #[rstest]
    #[case::zero_parts(0, 300)]
    #[case::too_many_parts(10_001, 300)]
    #[case::zero_size(3, 0)]
    #[case::too_large(3, MAX_MULTIPART_OBJECT_SIZE + 1)]
    #[tokio::test]
    async fn start_rejects_out_of_range_declarations(#[case] parts: u32, #[case] size: u64) {
        let (coordinator, _, gateway) = setup();
        let result = coordinator
            .start_session(&fp("abc123"), parts, size, "f.bin")
            .await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        assert_eq!(gateway.calls(), 0);
    }

    #[rstest]
    #[case(1, 1)]
    #[case(3, 300)]
    #[case(10_000, MAX_MULTIPART_OBJECT_SIZE)]
    #[tokio::test]
    async fn fresh_session_is_never_reported_uploaded(#[case] parts: u32, #[case] size: u64) {
        let (coordinator, _, _) = setup();
        let fingerprint = fp("abc123");
        coordinator
            .start_session(&fingerprint, parts, size, "f.bin")
            .await
            .unwrap();

        match coordinator.reconcile(&fingerprint).await.unwrap() {
            Reconciliation::NotFound => {}
            Reconciliation::Resolved { uploaded, .. } => assert!(!uploaded),
        }
    }

    #[tokio::test]
    async fn start_persists_not_uploaded_record() {
        let (coordinator, store, gateway) = setup();
        let started = coordinator
            .start_session(&fp("abc123"), 3, 300, "movie.mkv")
            .await
            .unwrap();

        assert_eq!(started.session_id, "abc123");
        let record = store.get_by_session_id("abc123").await.unwrap().unwrap();
        assert_eq!(record.store_upload_id, started.store_upload_id);
        assert_eq!(record.upload_state, UploadState::NotUploaded);
        assert_eq!(record.total_parts, 3);
        assert_eq!(record.size_bytes, 300);
        assert_eq!(
            gateway.metadata(&started.store_upload_id).unwrap().file_name,
            "movie.mkv"
        );
    }

    #[tokio::test]
    async fn restart_replaces_unfinished_attempt() {
        let (coordinator, store, _) = setup();
        let first = coordinator
            .start_session(&fp("abc123"), 3, 300, "f.bin")
            .await
            .unwrap();
        let second = coordinator
            .start_session(&fp("abc123"), 3, 300, "f.bin")
            .await
            .unwrap();

        assert_ne!(first.store_upload_id, second.store_upload_id);
        let record = store.get_by_session_id("abc123").await.unwrap().unwrap();
        assert_eq!(record.store_upload_id, second.store_upload_id);
    }

    #[tokio::test]
    async fn restart_of_uploaded_content_is_rejected() {
        let (coordinator, store, gateway) = setup();
        coordinator
            .start_session(&fp("abc123"), 1, 10, "f.bin")
            .await
            .unwrap();
        let mut record = store.get_by_session_id("abc123").await.unwrap().unwrap();
        record.upload_state = UploadState::Uploaded;
        store.update(&record).await.unwrap();

        let calls = gateway.calls();
        let result = coordinator
            .start_session(&fp("abc123"), 1, 10, "f.bin")
            .await;
        assert!(matches!(result, Err(Error::AlreadyUploaded(_))));
        assert_eq!(gateway.calls(), calls);
    }

    #[rstest]
    #[case::zero_part(0, "upload-1", 1024)]
    #[case::negative_part(-4, "upload-1", 1024)]
    #[case::part_beyond_limit(10_001, "upload-1", 1024)]
    #[case::empty_upload_id(1, "", 1024)]
    #[case::oversized_part(1, "upload-1", MIN_PART_SIZE + 1)]
    #[tokio::test]
    async fn part_url_validation_never_reaches_gateway(
        #[case] part_number: i32,
        #[case] upload_id: &str,
        #[case] size: u64,
    ) {
        let (coordinator, _, gateway) = setup();
        let result = coordinator
            .issue_part_url("abc123", upload_id, part_number, size)
            .await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn part_url_is_scoped_to_part_and_upload() {
        let (coordinator, store, _) = setup();
        let url = coordinator
            .issue_part_url("abc123", "upload-9", 2, MIN_PART_SIZE)
            .await
            .unwrap();
        assert!(url.contains("/abc123?"));
        assert!(url.contains("partNumber=2"));
        assert!(url.contains("uploadId=upload-9"));
        assert!(url.contains("X-Amz-Expires=604800"));
        // issuing grants never touches session state
        assert!(store.get_by_session_id("abc123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reported_parts_are_recorded_without_quotes() {
        let (coordinator, store, _) = setup();
        coordinator
            .start_session(&fp("abc123"), 2, 20, "f.bin")
            .await
            .unwrap();
        coordinator
            .report_part_completed("abc123", 2, "\"bbb\"")
            .await
            .unwrap();
        coordinator
            .report_part_completed("abc123", 1, "\"aaa\"")
            .await
            .unwrap();

        let record = store.get_by_session_id("abc123").await.unwrap().unwrap();
        assert_eq!(
            record.completed_parts,
            vec![CompletedPart::new(1, "aaa"), CompletedPart::new(2, "bbb")]
        );
    }

    #[tokio::test]
    async fn report_for_unknown_session_is_a_no_op() {
        let (coordinator, store, _) = setup();
        coordinator
            .report_part_completed("missing", 1, "aaa")
            .await
            .unwrap();
        assert!(store.get_by_session_id("missing").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reports_are_not_lost() {
        let (coordinator, store, _) = setup();
        coordinator
            .start_session(&fp("abc123"), 5, 50, "f.bin")
            .await
            .unwrap();

        let reports = (1..=5).map(|n| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .report_part_completed("abc123", n, &format!("etag-{n}"))
                    .await
            })
        });
        for result in futures::future::join_all(reports).await {
            result.unwrap().unwrap();
        }

        let record = store.get_by_session_id("abc123").await.unwrap().unwrap();
        let numbers: Vec<i32> = record.completed_parts.iter().map(|p| p.part_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    }

    /// Lets one competing write land between every read and the first write attempt.
    struct RacingStore {
        inner: MemorySessionStore,
        raced: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl SessionStore for RacingStore {
        async fn get_by_fingerprint(&self, f: &Fingerprint) -> Result<Option<SessionRecord>> {
            self.inner.get_by_fingerprint(f).await
        }

        async fn get_by_session_id(&self, id: &str) -> Result<Option<SessionRecord>> {
            self.inner.get_by_session_id(id).await
        }

        async fn insert(&self, record: &SessionRecord) -> Result<SessionRecord> {
            self.inner.insert(record).await
        }

        async fn update(&self, record: &SessionRecord) -> Result<SessionRecord> {
            use std::sync::atomic::Ordering;
            if !self.raced.swap(true, Ordering::SeqCst) {
                let mut competing = self
                    .inner
                    .get_by_session_id(&record.session_id)
                    .await?
                    .unwrap();
                competing.record_completed_part(CompletedPart::new(7, "competitor"));
                self.inner.update(&competing).await?;
            }
            self.inner.update(record).await
        }
    }

    #[tokio::test]
    async fn conflicting_write_is_retried_on_fresh_record() {
        let store = Arc::new(RacingStore {
            inner: MemorySessionStore::new(),
            raced: Default::default(),
        });
        let coordinator = Coordinator::new(
            store.clone(),
            Arc::new(ScriptedGateway::new()),
            Limits::default(),
        );
        coordinator
            .start_session(&fp("abc123"), 8, 80, "f.bin")
            .await
            .unwrap();

        coordinator
            .report_part_completed("abc123", 1, "mine")
            .await
            .unwrap();

        let record = store.get_by_session_id("abc123").await.unwrap().unwrap();
        assert_eq!(
            record.completed_parts,
            vec![CompletedPart::new(1, "mine"), CompletedPart::new(7, "competitor")]
        );
    }

    #[tokio::test]
    async fn finalize_submits_parts_in_ascending_order() {
        let (coordinator, _, gateway) = setup();
        let started = coordinator
            .start_session(&fp("abc123"), 3, 300, "f.bin")
            .await
            .unwrap();
        for n in [3, 1, 2] {
            gateway.store_part(&started.store_upload_id, n, &format!("etag-{n}"));
        }

        coordinator
            .finalize_session("abc123", &started.store_upload_id)
            .await
            .unwrap();

        let completed = gateway.completed();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].part_numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn finalize_ignores_client_reports() {
        let (coordinator, _, gateway) = setup();
        let started = coordinator
            .start_session(&fp("abc123"), 3, 300, "f.bin")
            .await
            .unwrap();
        gateway.store_part(&started.store_upload_id, 1, "etag-1");
        gateway.store_part(&started.store_upload_id, 2, "etag-2");
        // claims a part the store never received
        coordinator
            .report_part_completed("abc123", 3, "etag-3")
            .await
            .unwrap();

        coordinator
            .finalize_session("abc123", &started.store_upload_id)
            .await
            .unwrap();
        assert_eq!(gateway.completed()[0].part_numbers, vec![1, 2]);
    }

    #[tokio::test]
    async fn finalize_does_not_mark_session_uploaded() {
        let (coordinator, store, gateway) = setup();
        let started = coordinator
            .start_session(&fp("abc123"), 1, 10, "f.bin")
            .await
            .unwrap();
        gateway.store_part(&started.store_upload_id, 1, "etag-1");
        coordinator
            .finalize_session("abc123", &started.store_upload_id)
            .await
            .unwrap();

        let record = store.get_by_session_id("abc123").await.unwrap().unwrap();
        assert_eq!(record.upload_state, UploadState::NotUploaded);
    }

    #[tokio::test]
    async fn finalize_without_stored_parts_is_rejected() {
        let (coordinator, _, gateway) = setup();
        let started = coordinator
            .start_session(&fp("abc123"), 1, 10, "f.bin")
            .await
            .unwrap();
        let result = coordinator
            .finalize_session("abc123", &started.store_upload_id)
            .await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        assert!(gateway.completed().is_empty());
    }

    #[tokio::test]
    async fn finalize_surfaces_upstream_message() {
        let (coordinator, _, _) = setup();
        let err = coordinator
            .finalize_session("abc123", "upload-404")
            .await
            .unwrap_err();
        match err {
            Error::UpstreamError(msg) => assert!(msg.contains("NoSuchUpload")),
            e => assert!(false, "expected upstream error, got {e:?}"),
        }
    }

    #[tokio::test]
    async fn reconcile_unknown_fingerprint_is_not_found() {
        let (coordinator, _, gateway) = setup();
        let result = coordinator.reconcile(&fp("never-seen")).await.unwrap();
        assert_eq!(result, Reconciliation::NotFound);
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn reconcile_lists_stored_parts_for_resume() {
        let (coordinator, _, gateway) = setup();
        let started = coordinator
            .start_session(&fp("abc123"), 3, 300, "f.bin")
            .await
            .unwrap();
        gateway.store_part(&started.store_upload_id, 2, "\"etag-2\"");
        gateway.store_part(&started.store_upload_id, 1, "\"etag-1\"");

        let result = coordinator.reconcile(&fp("abc123")).await.unwrap();
        assert_eq!(
            result,
            Reconciliation::Resolved {
                session_id: String::from("abc123"),
                uploaded: false,
                store_upload_id: started.store_upload_id,
                parts: vec![CompletedPart::new(1, "etag-1"), CompletedPart::new(2, "etag-2")],
            }
        );
    }

    #[tokio::test]
    async fn reconcile_heals_missing_uploaded_flag_once() {
        let (coordinator, store, gateway) = setup();
        coordinator
            .start_session(&fp("abc123"), 1, 10, "f.bin")
            .await
            .unwrap();
        gateway.put_object("abc123");

        let first = coordinator.reconcile(&fp("abc123")).await.unwrap();
        let healed = store.get_by_session_id("abc123").await.unwrap().unwrap();
        assert_eq!(healed.upload_state, UploadState::Uploaded);

        let second = coordinator.reconcile(&fp("abc123")).await.unwrap();
        let after = store.get_by_session_id("abc123").await.unwrap().unwrap();

        assert_eq!(first, second);
        assert!(matches!(first, Reconciliation::Resolved { uploaded: true, .. }));
        // the second pass found nothing to correct and wrote nothing
        assert_eq!(after.version, healed.version);
    }

    #[tokio::test]
    async fn reconcile_heals_stale_uploaded_flag() {
        let (coordinator, store, gateway) = setup();
        let started = coordinator
            .start_session(&fp("abc123"), 3, 300, "f.bin")
            .await
            .unwrap();
        gateway.store_part(&started.store_upload_id, 1, "etag-1");
        let mut record = store.get_by_session_id("abc123").await.unwrap().unwrap();
        record.upload_state = UploadState::Uploaded;
        store.update(&record).await.unwrap();

        let result = coordinator.reconcile(&fp("abc123")).await.unwrap();

        assert_eq!(
            result,
            Reconciliation::Resolved {
                session_id: String::from("abc123"),
                uploaded: false,
                store_upload_id: started.store_upload_id,
                parts: vec![CompletedPart::new(1, "etag-1")],
            }
        );
        let record = store.get_by_session_id("abc123").await.unwrap().unwrap();
        assert_eq!(record.upload_state, UploadState::NotUploaded);
    }

    #[tokio::test]
    async fn reconcile_surfaces_invalidated_upload() {
        let (coordinator, store, gateway) = setup();
        let started = coordinator
            .start_session(&fp("abc123"), 3, 300, "f.bin")
            .await
            .unwrap();
        let mut record = store.get_by_session_id("abc123").await.unwrap().unwrap();
        record.upload_state = UploadState::Uploaded;
        store.update(&record).await.unwrap();
        gateway.abort_upload(&started.store_upload_id);

        let result = coordinator.reconcile(&fp("abc123")).await;

        assert!(matches!(result, Err(Error::UpstreamError(_))));
        // the flag correction still landed before the listing failed
        let record = store.get_by_session_id("abc123").await.unwrap().unwrap();
        assert_eq!(record.upload_state, UploadState::NotUploaded);
    }

    #[tokio::test]
    async fn end_to_end_upload() {
        let (coordinator, store, gateway) = setup();
        let fingerprint = fp("abc123");

        let started = coordinator
            .start_session(&fingerprint, 3, 300, "f.bin")
            .await
            .unwrap();
        assert_eq!(started.session_id, "abc123");

        for n in 1..=3 {
            let url = coordinator
                .issue_part_url(&started.session_id, &started.store_upload_id, n, 100)
                .await
                .unwrap();
            assert!(url.contains(&format!("partNumber={n}")));
            gateway.store_part(&started.store_upload_id, n, &format!("etag-{n}"));
            coordinator
                .report_part_completed(&started.session_id, n, &format!("\"etag-{n}\""))
                .await
                .unwrap();
        }

        let object = coordinator
            .finalize_session(&started.session_id, &started.store_upload_id)
            .await
            .unwrap();
        assert_eq!(object.key, "abc123");
        assert_eq!(gateway.completed()[0].part_numbers, vec![1, 2, 3]);

        let result = coordinator.reconcile(&fingerprint).await.unwrap();
        assert!(matches!(result, Reconciliation::Resolved { uploaded: true, .. }));
        let record = store.get_by_session_id("abc123").await.unwrap().unwrap();
        assert!(record.is_uploaded());
        assert_eq!(record.completed_parts.len(), 3);
    }

    #[tokio::test]
    async fn end_to_end_drift_after_out_of_band_delete() {
        let (coordinator, store, gateway) = setup();
        let fingerprint = fp("abc123");
        let started = coordinator
            .start_session(&fingerprint, 1, 10, "f.bin")
            .await
            .unwrap();
        gateway.store_part(&started.store_upload_id, 1, "etag-1");
        coordinator
            .finalize_session("abc123", &started.store_upload_id)
            .await
            .unwrap();
        coordinator.reconcile(&fingerprint).await.unwrap();
        assert!(store
            .get_by_session_id("abc123")
            .await
            .unwrap()
            .unwrap()
            .is_uploaded());

        gateway.remove_object("abc123");

        // completing the upload consumed it, so the store no longer knows the upload id
        let result = coordinator.reconcile(&fingerprint).await;
        assert!(matches!(result, Err(Error::UpstreamError(_))));
        let record = store.get_by_session_id("abc123").await.unwrap().unwrap();
        assert_eq!(record.upload_state, UploadState::NotUploaded);

        // which frees the content to be uploaded again
        coordinator
            .start_session(&fingerprint, 1, 10, "f.bin")
            .await
            .unwrap();
    }
}
