//! Object store errors

use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::{
    complete_multipart_upload::CompleteMultipartUploadError,
    create_multipart_upload::CreateMultipartUploadError, list_objects_v2::ListObjectsV2Error,
    list_parts::ListPartsError, upload_part::UploadPartError,
};
use thiserror;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] http::Error),

    #[error("aws sdk credentials error: {0}")]
    AWSSDKCredentialsError(#[from] aws_credential_types::provider::error::CredentialsError),

    #[error("invalid presigning config: {0}")]
    PresigningConfigError(#[from] aws_sdk_s3::presigning::PresigningConfigError),

    #[error("create multipart upload failed: {}", DisplayErrorContext(.0))]
    AWSSDKCreateMultipartUploadError(#[from] SdkError<CreateMultipartUploadError>),

    #[error("presign upload part failed: {}", DisplayErrorContext(.0))]
    AWSSDKUploadPartError(#[from] SdkError<UploadPartError>),

    #[error("list parts failed: {}", DisplayErrorContext(.0))]
    AWSSDKListPartsError(#[from] SdkError<ListPartsError>),

    #[error("complete multipart upload failed: {}", DisplayErrorContext(.0))]
    AWSSDKCompleteMultipartUploadError(#[from] SdkError<CompleteMultipartUploadError>),

    #[error("list objects failed: {}", DisplayErrorContext(.0))]
    AWSSDKListObjectsV2Error(#[from] SdkError<ListObjectsV2Error>),

    #[error("store returned no upload id for {0}")]
    MissingUploadId(String),

    #[error("invalid bucket name {0:?}: {1}")]
    InvalidBucketName(String, &'static str),

    #[error("invalid object name: {0}")]
    InvalidObjectName(&'static str),

    #[error("invalid part: {0}")]
    InvalidPart(String),
}

impl From<Error> for resumable_core::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::InvalidBucketName(..) | Error::InvalidObjectName(_) | Error::InvalidPart(_) => {
                resumable_core::Error::InvalidArgument(e.to_string())
            }
            e => resumable_core::Error::UpstreamError(e.to_string()),
        }
    }
}
