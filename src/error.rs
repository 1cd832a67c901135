use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PollError {
    #[error("Unrecognized color: {0}")]
    InvalidColor(String),
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Cooling down, {0} seconds left")]
    CoolingDown(u32),
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} has an invalid value {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

impl PollError {
    pub fn status(&self) -> StatusCode {
        match self {
            PollError::InvalidColor(_) => StatusCode::BAD_REQUEST,
            PollError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            PollError::Unauthorized => StatusCode::FORBIDDEN,
            PollError::CoolingDown(_) => StatusCode::TOO_MANY_REQUESTS,
            PollError::TransportUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Short, stable label used as the `error` field of JSON bodies.
    pub fn label(&self) -> &'static str {
        match self {
            PollError::InvalidColor(_) => "Invalid color",
            PollError::MalformedRequest(_) => "Malformed request",
            PollError::Unauthorized => "Unauthorized",
            PollError::CoolingDown(_) => "Cooling down",
            PollError::TransportUnavailable(_) => "Transport unavailable",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "error": self.label(),
            "details": self.to_string()
        })
    }
}

impl IntoResponse for PollError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_json())).into_response()
    }
}

impl From<serde_json::Error> for PollError {
    fn from(error: serde_json::Error) -> Self {
        PollError::MalformedRequest(error.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for PollError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        PollError::TransportUnavailable(error.to_string())
    }
}
