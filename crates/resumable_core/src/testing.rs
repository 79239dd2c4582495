//! A scripted in-memory [`ObjectGateway`] for exercising the coordinator without an object store.
//!
//! Parts only appear in a listing once a test says they were stored, and listings return them in
//! whatever order they were stored so ordering bugs are visible.
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::errors::{Error, Result};
use crate::gateway::{ObjectGateway, ObjectMetadata, ObjectReference, PartUrlRequest};
use crate::session::CompletedPart;

pub const BUCKET: &str = "scripted";

/// A completed multipart call as the gateway received it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompleteCall {
    pub object_name: String,
    pub upload_id: String,
    pub part_numbers: Vec<i32>,
}

#[derive(Default)]
struct State {
    next_upload: u32,
    uploads: HashMap<String, (String, Vec<CompletedPart>)>,
    objects: HashSet<String>,
    metadata: HashMap<String, ObjectMetadata>,
    completed: Vec<CompleteCall>,
    calls: usize,
}

#[derive(Default)]
pub struct ScriptedGateway {
    state: Mutex<State>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Pretend a client wrote a part through its presigned URL.
    pub fn store_part(&self, upload_id: &str, part_number: i32, e_tag: &str) {
        let mut state = self.state();
        let (_, parts) = state
            .uploads
            .get_mut(upload_id)
            .expect("part stored against an unknown upload");
        parts.retain(|p| p.part_number != part_number);
        parts.push(CompletedPart::new(part_number, e_tag));
    }

    /// Pretend an object was finalized out of band.
    pub fn put_object(&self, object_name: &str) {
        self.state().objects.insert(object_name.to_string());
    }

    /// Pretend an object was deleted out of band.
    pub fn remove_object(&self, object_name: &str) {
        self.state().objects.remove(object_name);
    }

    /// Pretend the store expired or aborted an upload.
    pub fn abort_upload(&self, upload_id: &str) {
        self.state().uploads.remove(upload_id);
    }

    pub fn completed(&self) -> Vec<CompleteCall> {
        self.state().completed.clone()
    }

    pub fn metadata(&self, upload_id: &str) -> Option<ObjectMetadata> {
        self.state().metadata.get(upload_id).cloned()
    }

    /// Number of gateway calls of any kind so far.
    pub fn calls(&self) -> usize {
        self.state().calls
    }
}

#[async_trait]
impl ObjectGateway for ScriptedGateway {
    async fn begin_multipart(
        &self,
        object_name: &str,
        metadata: &ObjectMetadata,
    ) -> Result<String> {
        let mut state = self.state();
        state.calls += 1;
        state.next_upload += 1;
        let upload_id = format!("upload-{}", state.next_upload);
        state
            .uploads
            .insert(upload_id.clone(), (object_name.to_string(), Vec::new()));
        state.metadata.insert(upload_id.clone(), metadata.clone());
        Ok(upload_id)
    }

    async fn presign_part_url(&self, request: &PartUrlRequest<'_>) -> Result<String> {
        let mut state = self.state();
        state.calls += 1;
        Ok(format!(
            "https://{BUCKET}.store.test/{}?partNumber={}&uploadId={}&X-Amz-Expires={}",
            request.object_name,
            request.part_number,
            request.upload_id,
            request.expires_in.as_secs(),
        ))
    }

    async fn list_parts(&self, object_name: &str, upload_id: &str) -> Result<Vec<CompletedPart>> {
        let mut state = self.state();
        state.calls += 1;
        match state.uploads.get(upload_id) {
            Some((name, parts)) if name == object_name => Ok(parts.clone()),
            _ => Err(Error::UpstreamError(format!(
                "NoSuchUpload: the specified upload {upload_id} does not exist"
            ))),
        }
    }

    async fn complete_multipart(
        &self,
        object_name: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<ObjectReference> {
        let mut state = self.state();
        state.calls += 1;
        if state.uploads.remove(upload_id).is_none() {
            return Err(Error::UpstreamError(format!(
                "NoSuchUpload: the specified upload {upload_id} does not exist"
            )));
        }
        state.completed.push(CompleteCall {
            object_name: object_name.to_string(),
            upload_id: upload_id.to_string(),
            part_numbers: parts.iter().map(|p| p.part_number).collect(),
        });
        state.objects.insert(object_name.to_string());
        Ok(ObjectReference {
            bucket: BUCKET.to_string(),
            key: object_name.to_string(),
            e_tag: Some(format!("{}-{}", object_name, parts.len())),
            location: None,
        })
    }

    async fn object_exists(&self, object_name: &str) -> Result<bool> {
        let mut state = self.state();
        state.calls += 1;
        Ok(state.objects.contains(object_name))
    }
}
