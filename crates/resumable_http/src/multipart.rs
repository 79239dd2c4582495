use std::str::FromStr;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};

use resumable_core::{CompletedPart, Coordinator, Fingerprint, Reconciliation};

use super::errors::{Error, Result};

pub fn router() -> Router<Coordinator> {
    Router::new()
        .route("/new_multipart", get(new_multipart))
        .route("/get_multipart_url", get(get_multipart_url))
        .route("/complete_multipart", post(complete_multipart))
        .route("/update_chunk", post(update_chunk))
        .route("/get_chunks", get(get_chunks))
}

/// Parse a numeric request field, treating a missing field like a malformed one.
fn parse<T: FromStr>(name: &'static str, value: Option<&str>) -> Result<T> {
    value
        .and_then(|v| v.trim().parse().ok())
        .ok_or(Error::IllegalParameter(name))
}

fn fingerprint(operation: &'static str, value: Option<&str>) -> Result<Fingerprint> {
    Fingerprint::try_from(value.unwrap_or_default()).map_err(Error::failed(operation))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct NewMultipartParams {
    md5: Option<String>,
    total_chunk_counts: Option<String>,
    size: Option<String>,
    file_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct NewMultipartResponse {
    uuid: String,
    #[serde(rename = "uploadID")]
    upload_id: String,
}

async fn new_multipart(
    State(coordinator): State<Coordinator>,
    Query(params): Query<NewMultipartParams>,
) -> Result<Json<NewMultipartResponse>> {
    const OPERATION: &str = "newMultipartUpload";

    let total_parts: u32 = parse("totalChunkCounts", params.total_chunk_counts.as_deref())?;
    let size: u64 = parse("size", params.size.as_deref())?;
    let fingerprint = fingerprint(OPERATION, params.md5.as_deref())?;

    let started = coordinator
        .start_session(
            &fingerprint,
            total_parts,
            size,
            params.file_name.as_deref().unwrap_or_default(),
        )
        .await
        .map_err(Error::failed(OPERATION))?;

    Ok(Json(NewMultipartResponse {
        uuid: started.session_id,
        upload_id: started.store_upload_id,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PartUrlParams {
    uuid: Option<String>,
    #[serde(rename = "uploadID")]
    upload_id: Option<String>,
    #[serde(rename = "chunkNumber")]
    chunk_number: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Serialize)]
struct PartUrlResponse {
    url: String,
}

async fn get_multipart_url(
    State(coordinator): State<Coordinator>,
    Query(params): Query<PartUrlParams>,
) -> Result<Json<PartUrlResponse>> {
    let part_number: i32 = parse("chunkNumber", params.chunk_number.as_deref())?;
    let size: u64 = parse("size", params.size.as_deref())?;

    let url = coordinator
        .issue_part_url(
            params.uuid.as_deref().unwrap_or_default(),
            params.upload_id.as_deref().unwrap_or_default(),
            part_number,
            size,
        )
        .await
        .map_err(Error::failed("genMultiPartSignedUrl"))?;

    Ok(Json(PartUrlResponse { url }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CompleteForm {
    uuid: Option<String>,
    #[serde(rename = "uploadID")]
    upload_id: Option<String>,
}

#[derive(Debug, Default, Serialize)]
struct Empty {}

async fn complete_multipart(
    State(coordinator): State<Coordinator>,
    Form(form): Form<CompleteForm>,
) -> Result<Json<Empty>> {
    coordinator
        .finalize_session(
            form.uuid.as_deref().unwrap_or_default(),
            form.upload_id.as_deref().unwrap_or_default(),
        )
        .await
        .map_err(Error::Unmasked)?;

    Ok(Json(Empty::default()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UpdateChunkForm {
    uuid: Option<String>,
    #[serde(rename = "chunkNumber")]
    chunk_number: Option<String>,
    etag: Option<String>,
}

async fn update_chunk(
    State(coordinator): State<Coordinator>,
    Form(form): Form<UpdateChunkForm>,
) -> Result<Json<Empty>> {
    let part_number: i32 = parse("chunkNumber", form.chunk_number.as_deref())?;

    coordinator
        .report_part_completed(
            form.uuid.as_deref().unwrap_or_default(),
            part_number,
            form.etag.as_deref().unwrap_or_default(),
        )
        .await
        .map_err(Error::failed("updateChunk"))?;

    Ok(Json(Empty::default()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChunksParams {
    md5: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChunksResponse {
    /// "-1" when no session exists for the fingerprint, "0" otherwise.
    result_code: &'static str,
    uuid: String,
    /// "1" if the finalized object exists, "0" if not, empty when there is no session.
    uploaded: &'static str,
    #[serde(rename = "uploadID")]
    upload_id: String,
    /// `partNumber-eTag,` for every stored part.
    chunks: String,
    parts: Vec<CompletedPart>,
}

impl From<Reconciliation> for ChunksResponse {
    fn from(r: Reconciliation) -> Self {
        match r {
            Reconciliation::NotFound => ChunksResponse {
                result_code: "-1",
                uuid: String::new(),
                uploaded: "",
                upload_id: String::new(),
                chunks: String::new(),
                parts: Vec::new(),
            },
            Reconciliation::Resolved {
                session_id,
                uploaded,
                store_upload_id,
                parts,
            } => ChunksResponse {
                result_code: "0",
                uuid: session_id,
                uploaded: if uploaded { "1" } else { "0" },
                upload_id: store_upload_id,
                chunks: parts
                    .iter()
                    .map(|p| format!("{}-{},", p.part_number, p.e_tag))
                    .collect(),
                parts,
            },
        }
    }
}

async fn get_chunks(
    State(coordinator): State<Coordinator>,
    Query(params): Query<ChunksParams>,
) -> Result<Json<ChunksResponse>> {
    const OPERATION: &str = "getSuccessChunks";

    let fingerprint = fingerprint(OPERATION, params.md5.as_deref())?;
    let reconciliation = coordinator
        .reconcile(&fingerprint)
        .await
        .map_err(Error::failed(OPERATION))?;

    Ok(Json(reconciliation.into()))
}
