use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use mongodb::error::{ErrorKind, WriteFailure};
use thiserror::Error;
use tracing::error;

use crate::{images::services::UploadError, response::Envelope};

pub const MSG_USER_EXISTS: &str = "User Already Exists!";
pub const MSG_BAD_CREDENTIALS: &str = "User details incorrect";
pub const MSG_INVALID_ID: &str = "Invalid User ID";
pub const MSG_UPDATE_TARGET_MISSING: &str = "User not Found!";
pub const MSG_USER_NOT_FOUND: &str = "User Not Found";
pub const MSG_NO_USERS: &str = "No user available";

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("{0}")]
    Auth(&'static str),

    #[error("Error Adding Image")]
    Upload(#[from] UploadError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type UserResult<T> = Result<T, UserError>;

impl UserError {
    pub fn status(&self) -> StatusCode {
        match self {
            UserError::Validation(_) | UserError::Upload(_) => StatusCode::BAD_REQUEST,
            UserError::NotFound(_) => StatusCode::NOT_FOUND,
            UserError::Conflict(_) => StatusCode::CONFLICT,
            UserError::Auth(_) => StatusCode::UNAUTHORIZED,
            UserError::Database(_) | UserError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render as an envelope for `method`. Server-side details stay in the log.
    pub fn respond(self, method: &Method) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            if let UserError::Upload(ref source) = self {
                error!(error = %source, "image upload failed");
            }
            self.to_string()
        };
        Envelope::<()>::failure(method, status, message).into_response()
    }
}

impl From<mongodb::error::Error> for UserError {
    fn from(err: mongodb::error::Error) -> Self {
        if is_duplicate_key(&err) {
            return UserError::Conflict(MSG_USER_EXISTS);
        }
        UserError::Database(err.to_string())
    }
}

impl From<anyhow::Error> for UserError {
    fn from(err: anyhow::Error) -> Self {
        UserError::Internal(err.to_string())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        &*err.kind,
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY
    )
}
