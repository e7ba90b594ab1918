use thiserror::Error;

use warbler_types::envelope::ErrorCode;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered 401: no session, or the session cookie is invalid.
    #[error("not logged in")]
    Unauthorized,

    /// The server answered `ok: false`.
    #[error("{message} ({code:?})")]
    Rejected { code: ErrorCode, message: String },

    /// A mutation was dispatched while the previous one was still in flight.
    #[error("request already in flight")]
    InFlight,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Rejected { code, .. } => Some(*code),
            ClientError::Unauthorized => Some(ErrorCode::Unauthorized),
            _ => None,
        }
    }
}
