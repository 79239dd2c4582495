//! S3-compatible [`resumable_core::ObjectGateway`].
//!
//! Clients never send part bytes through this crate: it begins uploads, signs per-part write
//! grants that clients use to upload directly, and later lists and assembles what arrived.
mod config;
pub use config::S3Config;
mod errors;
pub use errors::{Error, Result};
mod lazy;
pub use lazy::LazyGateway;
pub(crate) mod s3;
pub use s3::S3;
mod validate;
pub use validate::{validate_bucket_name, validate_object_name};
