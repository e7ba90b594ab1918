use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error};

use warbler_types::envelope::{ErrorBody, ErrorCode};

use crate::policy::Denial;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("please log in")]
    Unauthorized,

    #[error("{0} does not exist")]
    NotFound(&'static str),

    #[error(transparent)]
    Denied(#[from] Denial),

    #[error("password does not match")]
    InvalidCredentials,

    #[error("email is already in use")]
    EmailTaken,

    #[error("{0}")]
    InvalidInput(String),

    #[error("internal error")]
    Internal,
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::Unauthorized => ErrorCode::Unauthorized,
            ApiError::NotFound(_) => ErrorCode::NotFound,
            ApiError::Denied(Denial::NotOwner) => ErrorCode::Forbidden,
            ApiError::Denied(Denial::WrongTweet) => ErrorCode::WrongTweet,
            ApiError::InvalidCredentials => ErrorCode::InvalidCredentials,
            ApiError::EmailTaken => ErrorCode::EmailTaken,
            ApiError::InvalidInput(_) => ErrorCode::InvalidInput,
            ApiError::Internal => ErrorCode::Internal,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        error!("Internal error: {:#}", e);
        ApiError::Internal
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

/// Domain rejections (missing target, policy denial, bad input) are answered
/// with 200 and `ok: false`; only a missing session and server faults change
/// the status code.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::OK,
        };

        if status == StatusCode::OK {
            debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorBody::new(self.code(), self.to_string()))).into_response()
    }
}
