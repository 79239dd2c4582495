use std::time::Duration;

use async_trait::async_trait;

use crate::errors::Result;
use crate::session::CompletedPart;

/// Metadata attached to an object when its multipart upload begins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub file_name: String,
}

/// Everything needed to sign a write grant for one part.
#[derive(Clone, Debug)]
pub struct PartUrlRequest<'a> {
    pub object_name: &'a str,
    pub upload_id: &'a str,
    pub part_number: i32,
    pub size: u64,
    pub expires_in: Duration,
}

/// Where a finalized object ended up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectReference {
    pub bucket: String,
    pub key: String,
    pub e_tag: Option<String>,
    pub location: Option<String>,
}

/// The coordinator's view of the object store.
///
/// The bucket and signing region are fixed by the implementation; every method addresses objects
/// by name alone. Implementations surface store failures as
/// [`Error::UpstreamError`](crate::Error::UpstreamError) and malformed names or sizes as
/// [`Error::InvalidArgument`](crate::Error::InvalidArgument).
#[async_trait]
pub trait ObjectGateway: Send + Sync + 'static {
    /// Begin a multipart upload and return the store's upload id.
    async fn begin_multipart(&self, object_name: &str, metadata: &ObjectMetadata)
        -> Result<String>;

    /// Sign a time-limited URL allowing exactly one part of one upload to be written.
    async fn presign_part_url(&self, request: &PartUrlRequest<'_>) -> Result<String>;

    /// List every part currently stored under an upload, in no particular order.
    async fn list_parts(&self, object_name: &str, upload_id: &str) -> Result<Vec<CompletedPart>>;

    /// Assemble the given parts, which must be sorted by part number, into the final object.
    async fn complete_multipart(
        &self,
        object_name: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<ObjectReference>;

    /// Whether a finalized object with exactly this name exists.
    async fn object_exists(&self, object_name: &str) -> Result<bool>;
}
