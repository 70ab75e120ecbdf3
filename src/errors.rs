use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err)
    }
}

impl From<AnswerError> for AppError {
    fn from(err: AnswerError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("failed to write storage file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode storage: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request to check-in backend failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to encode responses: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnswerError {
    #[error("no question is waiting for an answer")]
    NoPendingQuestion,

    #[error("question {got} is not the current question (expected {expected})")]
    NotCurrentQuestion { expected: u64, got: u64 },

    #[error("question {0} expects a free-text answer")]
    ExpectedText(u64),

    #[error("question {0} expects one of its options")]
    ExpectedOption(u64),

    #[error("'{option}' is not an option of question {question_id}")]
    UnknownOption { question_id: u64, option: String },

    #[error("answer must not be empty")]
    Empty,
}
