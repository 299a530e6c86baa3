//! Maps `BrokerError` onto HTTP status codes, the way `ApiError` maps proxy
//! errors to responses in the teacher crate.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::broker::error::BrokerError;

pub struct ApiError(pub BrokerError);

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            BrokerError::NoEligibleWorker => StatusCode::CONFLICT,
            BrokerError::InsufficientKudos => StatusCode::FORBIDDEN,
            BrokerError::UnknownUser => StatusCode::UNAUTHORIZED,
            BrokerError::AnonymousForbidden => StatusCode::FORBIDDEN,
            BrokerError::SelfTransfer => StatusCode::BAD_REQUEST,
            BrokerError::StaleDispatch => StatusCode::NOT_FOUND,
        };
        (status, Json(json!({ "message": self.0.to_string() }))).into_response()
    }
}
