use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use thiserror;

use resumable_core::Error as CoreError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0} is illegal.")]
    IllegalParameter(&'static str),

    /// Failures other than bad input are reported with only the operation's name.
    #[error("{operation} failed.")]
    OperationFailed {
        operation: &'static str,
        #[source]
        source: CoreError,
    },

    /// Like [`Error::OperationFailed`] except the underlying message reaches the client, which
    /// uses it to decide whether the upload can be resumed.
    #[error(transparent)]
    Unmasked(CoreError),
}

impl Error {
    pub(crate) fn failed(operation: &'static str) -> impl FnOnce(CoreError) -> Error {
        move |source| Error::OperationFailed { operation, source }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::IllegalParameter(_) => {
                (StatusCode::BAD_REQUEST, Json(self.to_string())).into_response()
            }
            Error::OperationFailed { operation, source } => match source {
                CoreError::UpstreamError(_) | CoreError::PersistenceError(_) => {
                    tracing::warn!("{operation} failed: {source}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(format!("{operation} failed.")),
                    )
                        .into_response()
                }
                e => core_error_to_response(e),
            },
            Error::Unmasked(e) => core_error_to_response(e),
        }
    }
}

#[inline]
fn status_code(e: &CoreError) -> StatusCode {
    match e {
        CoreError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        CoreError::AlreadyUploaded(_) | CoreError::Conflict(_) => StatusCode::CONFLICT,
        CoreError::UpstreamError(_) | CoreError::PersistenceError(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[inline]
fn core_error_to_response(e: CoreError) -> Response {
    let status = status_code(&e);
    if status.is_server_error() {
        tracing::warn!("{e}");
    }
    (status, Json(e.to_string())).into_response()
}
