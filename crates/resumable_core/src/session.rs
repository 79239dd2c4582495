use chrono::{DateTime, SubsecRound, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Content hash of a whole file (typically hex-encoded MD5).
///
/// The fingerprint doubles as the stored object's name, so only characters that are safe in an
/// object key are accepted: `[a-zA-Z0-9_-!.*'()]`, between 1 and 1024 of them.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl TryFrom<&str> for Fingerprint {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        static RE: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_\-!.*'()]{1,1024}$").unwrap());
        if !RE.is_match(s) {
            return Err(Error::InvalidArgument(format!("invalid fingerprint: {s:?}")));
        }
        Ok(Self(s.to_string()))
    }
}

impl Fingerprint {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Fingerprint> for String {
    fn from(f: Fingerprint) -> String {
        f.0
    }
}

/// Whether the finalized object is believed to exist in the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UploadState {
    #[default]
    NotUploaded,
    Uploaded,
}

impl From<UploadState> for i16 {
    fn from(s: UploadState) -> i16 {
        match s {
            UploadState::NotUploaded => 0,
            UploadState::Uploaded => 1,
        }
    }
}

impl TryFrom<i16> for UploadState {
    type Error = Error;

    fn try_from(v: i16) -> Result<Self> {
        match v {
            0 => Ok(UploadState::NotUploaded),
            1 => Ok(UploadState::Uploaded),
            v => Err(Error::PersistenceError(format!("unknown upload state {v}"))),
        }
    }
}

/// A part number paired with the entity tag the store assigned to it.
///
/// Used both for the advisory list clients report and for the authoritative list read back from
/// the store. Surrounding quotes are stripped from the tag on construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPart {
    pub part_number: i32,
    pub e_tag: String,
}

impl CompletedPart {
    pub fn new(part_number: i32, e_tag: &str) -> Self {
        Self {
            part_number,
            e_tag: e_tag.replace('"', ""),
        }
    }
}

/// Coordinator-side record of one multipart upload attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    /// Also the object's storage key; equal to the fingerprint.
    pub session_id: String,
    pub fingerprint: Fingerprint,
    pub upload_state: UploadState,
    /// Set once when the attempt begins and never rewritten.
    pub store_upload_id: String,
    /// Declared by the client, never authoritative.
    pub total_parts: u32,
    pub size_bytes: u64,
    pub file_name: String,
    /// Client-reported progress, sorted by part number. Advisory only.
    pub completed_parts: Vec<CompletedPart>,
    /// Optimistic concurrency stamp. Bumped by the store on every successful write.
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(
        fingerprint: Fingerprint,
        store_upload_id: String,
        total_parts: u32,
        size_bytes: u64,
        file_name: &str,
    ) -> Self {
        Self {
            session_id: fingerprint.to_string(),
            fingerprint,
            upload_state: UploadState::NotUploaded,
            store_upload_id,
            total_parts,
            size_bytes,
            file_name: file_name.to_string(),
            completed_parts: Vec::new(),
            version: 0,
            // postgres keeps microseconds; truncate so records survive a round trip unchanged
            created_at: Utc::now().trunc_subsecs(6),
        }
    }

    #[inline]
    pub fn is_uploaded(&self) -> bool {
        self.upload_state == UploadState::Uploaded
    }

    /// Returns whether the state actually changed.
    pub fn set_upload_state(&mut self, state: UploadState) -> bool {
        if self.upload_state == state {
            return false;
        }
        self.upload_state = state;
        true
    }

    /// Record a client-reported part, replacing the tag of an earlier report for the same part
    /// number. Returns whether the list changed.
    pub fn record_completed_part(&mut self, part: CompletedPart) -> bool {
        match self
            .completed_parts
            .binary_search_by_key(&part.part_number, |p| p.part_number)
        {
            Ok(i) if self.completed_parts[i] == part => false,
            Ok(i) => {
                self.completed_parts[i] = part;
                true
            }
            Err(i) => {
                self.completed_parts.insert(i, part);
                true
            }
        }
    }
}
