use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use tokio::sync::OnceCell;

use resumable_core::{CompletedPart, ObjectGateway, ObjectMetadata, ObjectReference, PartUrlRequest};

use super::config::S3Config;
use super::errors::Result;
use super::s3::S3;

type Connect<G> = Box<dyn Fn() -> BoxFuture<'static, Result<G>> + Send + Sync>;

/// An [`ObjectGateway`] whose client is built on first use and shared afterwards.
///
/// Concurrent first callers wait on a single construction. A failed construction is reported to
/// the callers that waited on it and the next call tries again.
pub struct LazyGateway<G> {
    gateway: OnceCell<G>,
    connect: Connect<G>,
}

impl LazyGateway<S3> {
    pub fn s3(config: S3Config) -> Self {
        Self::new(move || {
            let config = config.clone();
            async move { config.new_objects().await }.boxed()
        })
    }
}

impl<G: ObjectGateway> LazyGateway<G> {
    pub fn new<F>(connect: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<G>> + Send + Sync + 'static,
    {
        Self {
            gateway: OnceCell::new(),
            connect: Box::new(connect),
        }
    }

    async fn get(&self) -> Result<&G> {
        self.gateway
            .get_or_try_init(|| (self.connect)())
            .await
            .map_err(|e| {
                tracing::warn!("failed to construct object store client: {e}");
                e
            })
    }
}

#[async_trait]
impl<G: ObjectGateway> ObjectGateway for LazyGateway<G> {
    async fn begin_multipart(
        &self,
        object_name: &str,
        metadata: &ObjectMetadata,
    ) -> resumable_core::Result<String> {
        self.get().await?.begin_multipart(object_name, metadata).await
    }

    async fn presign_part_url(&self, request: &PartUrlRequest<'_>) -> resumable_core::Result<String> {
        self.get().await?.presign_part_url(request).await
    }

    async fn list_parts(
        &self,
        object_name: &str,
        upload_id: &str,
    ) -> resumable_core::Result<Vec<CompletedPart>> {
        self.get().await?.list_parts(object_name, upload_id).await
    }

    async fn complete_multipart(
        &self,
        object_name: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> resumable_core::Result<ObjectReference> {
        self.get()
            .await?
            .complete_multipart(object_name, upload_id, parts)
            .await
    }

    async fn object_exists(&self, object_name: &str) -> resumable_core::Result<bool> {
        self.get().await?.object_exists(object_name).await
    }
}
