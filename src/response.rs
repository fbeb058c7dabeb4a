use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Uniform JSON body returned by every `/user` endpoint.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub success: bool,
    pub status_code: u16,
    pub data: Option<T>,
    pub method: String,
    pub message: String,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(method: &Method, data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            status_code: StatusCode::OK.as_u16(),
            data: Some(data),
            method: method.to_string(),
            message: message.into(),
        }
    }
}

impl Envelope<()> {
    pub fn failure(method: &Method, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            success: status.is_success(),
            status_code: status.as_u16(),
            data: None,
            method: method.to_string(),
            message: message.into(),
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
