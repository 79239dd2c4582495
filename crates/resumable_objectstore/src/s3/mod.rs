use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart};
use aws_sdk_s3::Client;

use resumable_core::{
    CompletedPart, ObjectGateway, ObjectMetadata, ObjectReference, PartUrlRequest,
};

pub(crate) mod logging;

use super::errors::{Error, Result};
use super::validate::{validate_bucket_name, validate_object_name};

/// Largest part S3 will accept in a single upload (5 GiB).
const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// `attachment` disposition carrying the name both as a quoted ASCII fallback and as an RFC 6266
/// `filename*` extended value.
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(file_name)
    )
}

/// [`ObjectGateway`] over one bucket of an S3-compatible store.
#[derive(Clone)]
pub struct S3 {
    bucket_name: String,
    client: Client,
}

impl S3 {
    pub(crate) fn new(client: Client, bucket_name: String) -> Self {
        Self {
            bucket_name,
            client,
        }
    }

    async fn create_multipart_upload(
        &self,
        object_name: &str,
        metadata: &ObjectMetadata,
    ) -> Result<String> {
        validate_object_name(object_name)?;

        let output = self
            .client
            .create_multipart_upload()
            .key(object_name)
            .bucket(&self.bucket_name)
            .metadata("file_name", &metadata.file_name)
            .content_disposition(content_disposition(&metadata.file_name))
            .send()
            .await?;

        output
            .upload_id
            .ok_or_else(|| Error::MissingUploadId(object_name.to_string()))
    }

    async fn presign_upload_part(&self, request: &PartUrlRequest<'_>) -> Result<String> {
        validate_bucket_name(&self.bucket_name)?;
        validate_object_name(request.object_name)?;
        if request.size > MAX_PART_SIZE {
            return Err(Error::InvalidPart(format!(
                "size {} exceeds {MAX_PART_SIZE}",
                request.size
            )));
        }
        if request.part_number <= 0 {
            return Err(Error::InvalidPart(format!(
                "part number {} must be positive",
                request.part_number
            )));
        }
        if request.upload_id.is_empty() {
            return Err(Error::InvalidPart(String::from("upload id is empty")));
        }

        let presigned = self
            .client
            .upload_part()
            .key(request.object_name)
            .bucket(&self.bucket_name)
            .upload_id(request.upload_id)
            .part_number(request.part_number)
            .presigned(PresigningConfig::expires_in(request.expires_in)?)
            .await?;

        Ok(presigned.uri().to_string())
    }

    /// Pages through the listing so uploads with more than one page of parts come back whole.
    async fn list_all_parts(&self, object_name: &str, upload_id: &str) -> Result<Vec<CompletedPart>> {
        let mut parts = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let output = self
                .client
                .list_parts()
                .key(object_name)
                .bucket(&self.bucket_name)
                .upload_id(upload_id)
                .set_part_number_marker(marker.take())
                .send()
                .await?;

            parts.extend(
                output
                    .parts()
                    .unwrap_or_default()
                    .iter()
                    .map(|p| CompletedPart::new(p.part_number(), p.e_tag().unwrap_or_default())),
            );

            marker = output.next_part_number_marker().map(str::to_string);
            if !output.is_truncated() || marker.is_none() {
                break;
            }
        }
        tracing::debug!(object_name, upload_id, count = parts.len(), "listed parts");
        Ok(parts)
    }

    async fn complete_multipart_upload(
        &self,
        object_name: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<ObjectReference> {
        let mut mpu = CompletedMultipartUpload::builder();
        for part in parts {
            mpu = mpu.parts(
                S3CompletedPart::builder()
                    .part_number(part.part_number)
                    .e_tag(part.e_tag)
                    .build(),
            );
        }

        let output = self
            .client
            .complete_multipart_upload()
            .multipart_upload(mpu.build())
            .upload_id(upload_id)
            .key(object_name)
            .bucket(&self.bucket_name)
            .send()
            .await?;

        Ok(ObjectReference {
            bucket: output.bucket().unwrap_or(&self.bucket_name).to_string(),
            key: output.key().unwrap_or(object_name).to_string(),
            e_tag: output.e_tag().map(|t| t.replace('"', "")),
            location: output.location().map(str::to_string),
        })
    }

    /// A single-key listing is enough: an exact match sorts before every longer key sharing the
    /// prefix.
    async fn exists(&self, object_name: &str) -> Result<bool> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket_name)
            .prefix(object_name)
            .max_keys(1)
            .send()
            .await?;

        Ok(output
            .contents()
            .unwrap_or_default()
            .first()
            .and_then(|o| o.key())
            == Some(object_name))
    }
}

#[async_trait]
impl ObjectGateway for S3 {
    async fn begin_multipart(
        &self,
        object_name: &str,
        metadata: &ObjectMetadata,
    ) -> resumable_core::Result<String> {
        Ok(self.create_multipart_upload(object_name, metadata).await?)
    }

    async fn presign_part_url(&self, request: &PartUrlRequest<'_>) -> resumable_core::Result<String> {
        Ok(self.presign_upload_part(request).await?)
    }

    async fn list_parts(
        &self,
        object_name: &str,
        upload_id: &str,
    ) -> resumable_core::Result<Vec<CompletedPart>> {
        Ok(self.list_all_parts(object_name, upload_id).await?)
    }

    async fn complete_multipart(
        &self,
        object_name: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> resumable_core::Result<ObjectReference> {
        Ok(self
            .complete_multipart_upload(object_name, upload_id, parts)
            .await?)
    }

    async fn object_exists(&self, object_name: &str) -> resumable_core::Result<bool> {
        Ok(self.exists(object_name).await?)
    }
}
