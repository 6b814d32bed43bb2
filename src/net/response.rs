use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, info};

use crate::error::TrackError;

pub struct ResponseError(Response);

impl IntoResponse for ResponseError {
    fn into_response(self) -> Response {
        self.0
    }
}

/// One place where the failure taxonomy turns into HTTP outcomes: input and
/// grammar problems are the client's (400), duplicates are conflicts (409),
/// converter disagreements are our defect (500, details logged only), store
/// trouble is retryable (503).
impl From<TrackError> for ResponseError {
    fn from(err: TrackError) -> Self {
        let response = match &err {
            TrackError::Input(message) => {
                info!(%message, "rejected request input");
                (StatusCode::BAD_REQUEST, err.to_string()).into_response()
            }
            TrackError::Grammar(diagnostics) => {
                info!("rejected document failing both grammar versions");
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": err.to_string(),
                        "v10": diagnostics.v10,
                        "v11": diagnostics.v11,
                    })),
                )
                    .into_response()
            }
            TrackError::Conflict => {
                info!("rejected duplicate track geometry");
                (StatusCode::CONFLICT, err.to_string()).into_response()
            }
            TrackError::Conversion(cause) => {
                error!(error = %cause, "grammar accepted a document the converter rejected");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
            TrackError::Store(cause) => {
                error!(error = %cause, "store call failed");
                (StatusCode::SERVICE_UNAVAILABLE, "track store unavailable").into_response()
            }
        };
        ResponseError(response)
    }
}

pub type Result<T, E = ResponseError> = axum::response::Result<T, E>;
