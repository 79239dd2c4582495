//! # Resumable Core
//!
//! Defines the data model of resumable multipart uploads, the two collaborator traits the
//! coordinator depends on ([`SessionStore`] and [`ObjectGateway`]), and the [`Coordinator`]
//! itself.
//!
//! ## Known Implementations
//!
//! ### resumable_backend_postgres
//!
//! [`SessionStore`] backed by a Postgres table, with optimistic concurrency via a version column.
//!
//! ### resumable_objectstore
//!
//! [`ObjectGateway`] over any S3-compatible store (AWS S3, MinIO) using presigned part uploads.
pub mod errors;
pub use errors::{Error, Result};

pub mod limits;
pub use limits::Limits;

mod session;
pub use session::{CompletedPart, Fingerprint, SessionRecord, UploadState};

mod gateway;
pub use gateway::{ObjectGateway, ObjectMetadata, ObjectReference, PartUrlRequest};

mod store;
pub use store::SessionStore;

mod memory;
pub use memory::MemorySessionStore;

mod coordinator;
pub use coordinator::{Coordinator, Reconciliation, StartedSession};

#[cfg(any(test, feature = "testing"))]
pub mod testing;
