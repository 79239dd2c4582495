//! # Resumable HTTP
//!
//! Exposes a [`resumable_core::Coordinator`] over HTTP. All routes live under [`API_PREFIX`]:
//!
//! | route | operation |
//! |---|---|
//! | `GET new_multipart?md5&totalChunkCounts&size&fileName` | start a session |
//! | `GET get_multipart_url?uuid&uploadID&chunkNumber&size` | presign one part |
//! | `POST complete_multipart` (form `uuid`, `uploadID`) | finalize |
//! | `POST update_chunk` (form `uuid`, `chunkNumber`, `etag`) | report a part |
//! | `GET get_chunks?md5` | reconcile |
//!
//! Field names match what existing browser uploaders send, which is why sessions are called
//! `uuid` and parts are called chunks on the wire.
use std::path::PathBuf;

use axum::http::header::{self, HeaderValue};
use axum::Router;
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::{self, TraceLayer};

use resumable_core::Coordinator;

mod errors;
pub use errors::{Error, Result};
mod multipart;

/// Where browser uploaders look for the API.
pub const API_PREFIX: &str = "/minio";

/// Optional extras around the API routes.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RouterOptions {
    /// Allow cross-origin requests from any origin.
    #[serde(default)]
    pub cors: bool,
    /// Serve files from this directory for every path the API doesn't claim.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

#[derive(Clone)]
pub struct ResumableUploads {
    coordinator: Coordinator,
}

impl ResumableUploads {
    pub fn new(coordinator: Coordinator) -> Self {
        Self { coordinator }
    }

    pub fn router(&self, options: &RouterOptions) -> Router {
        let api = multipart::router()
            .layer(SetResponseHeaderLayer::if_not_present(
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-store"),
            ))
            .with_state(self.coordinator.clone());

        let mut app = Router::new().nest(API_PREFIX, api);

        if let Some(dir) = &options.static_dir {
            tracing::info!("serving static files from {}", dir.display());
            app = app.fallback_service(ServeDir::new(dir));
        }
        if options.cors {
            app = app.layer(CorsLayer::permissive());
        }

        app.layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().include_headers(true))
                .on_response(trace::DefaultOnResponse::new())
                .on_request(trace::DefaultOnRequest::new()),
        )
    }
}
