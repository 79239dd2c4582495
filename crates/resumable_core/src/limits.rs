use std::time::Duration;

use serde::Deserialize;

use crate::errors::{Error, Result};

/// Largest number of parts a single multipart upload may be split into.
pub const MAX_PARTS_COUNT: u32 = 10_000;

/// Largest object a multipart upload may produce (5 TiB).
pub const MAX_MULTIPART_OBJECT_SIZE: u64 = 5 * 1024 * 1024 * 1024 * 1024;

/// Default ceiling on the size of a single part grant (64 MiB).
///
/// Despite the name this bounds part grants from above. It is a conservative client-side check,
/// well below what the store itself would accept.
pub const MIN_PART_SIZE: u64 = 64 * 1024 * 1024;

/// Hard ceiling on the size of a single part enforced by the store (5 GiB).
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Lifetime of a presigned part URL; also the longest the store will sign for.
pub const PRESIGNED_PART_URL_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Deployment-tunable bounds applied by the coordinator before contacting the store.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Limits {
    pub max_parts_count: u32,
    pub max_object_size_bytes: u64,
    pub max_part_size_bytes: u64,
    pub presign_expiry_secs: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_parts_count: MAX_PARTS_COUNT,
            max_object_size_bytes: MAX_MULTIPART_OBJECT_SIZE,
            max_part_size_bytes: MIN_PART_SIZE,
            presign_expiry_secs: PRESIGNED_PART_URL_EXPIRY.as_secs(),
        }
    }
}

impl Limits {
    /// Reject overrides that are zero or looser than what the store allows.
    pub fn validate(&self) -> Result<()> {
        if self.max_parts_count == 0 || self.max_parts_count > MAX_PARTS_COUNT {
            return Err(Error::InvalidArgument(format!(
                "max_parts_count must be in 1..={MAX_PARTS_COUNT}"
            )));
        }
        if self.max_object_size_bytes == 0 || self.max_object_size_bytes > MAX_MULTIPART_OBJECT_SIZE
        {
            return Err(Error::InvalidArgument(format!(
                "max_object_size_bytes must be in 1..={MAX_MULTIPART_OBJECT_SIZE}"
            )));
        }
        if self.max_part_size_bytes == 0 || self.max_part_size_bytes > MAX_PART_SIZE {
            return Err(Error::InvalidArgument(format!(
                "max_part_size_bytes must be in 1..={MAX_PART_SIZE}"
            )));
        }
        let max_expiry = PRESIGNED_PART_URL_EXPIRY.as_secs();
        if self.presign_expiry_secs == 0 || self.presign_expiry_secs > max_expiry {
            return Err(Error::InvalidArgument(format!(
                "presign_expiry_secs must be in 1..={max_expiry}"
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn presign_expiry(&self) -> Duration {
        Duration::from_secs(self.presign_expiry_secs)
    }
}
