//! HTTP error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::common::errors::{ErrorClass, TradeError};

/// A [`TradeError`] on its way out of a handler
#[derive(Debug)]
pub struct ApiError(pub TradeError);

impl From<TradeError> for ApiError {
    fn from(err: TradeError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.class() {
            ErrorClass::Client => StatusCode::BAD_REQUEST,
            ErrorClass::Server => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.0.message();

        match self.0.class() {
            ErrorClass::Client => {
                warn!(error = %self.0, "Alert rejected");
                (status, Json(json!({ "error": message }))).into_response()
            }
            ErrorClass::Server => {
                error!(error = %self.0, "Alert failed");
                (status, Json(json!({ "success": false, "error": message }))).into_response()
            }
        }
    }
}
