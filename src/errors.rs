use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error as ThisError;

use crate::store::StoreError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Email or password absent or empty
    #[error("Email and password are required")]
    MissingField,

    /// A record for this email already exists
    #[error("User already exists")]
    DuplicateUser,

    /// Unknown email or password that does not verify. Both cases share this
    /// variant so login cannot be used to enumerate users.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Multipart request without a `file` field
    #[error("No file provided")]
    MissingFile,

    /// Undecodable upload or an image that is not 3-channel RGB
    #[error("Only leaf images are allowed")]
    InvalidImage { reason: String },

    /// Body was not a readable multipart stream
    #[error("Malformed multipart upload")]
    MalformedUpload { reason: String },

    /// Upload exceeded the configured size limit
    #[error("Uploaded file exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// The model failed, or its output disagrees with the label set
    #[error("Classifier failure: {message}")]
    ClassifierFailure { message: String },

    /// Credential store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },
}

impl Error {
    pub fn invalid_image(reason: impl Into<String>) -> Self {
        Error::InvalidImage { reason: reason.into() }
    }

    pub fn classifier(message: impl Into<String>) -> Self {
        Error::ClassifierFailure { message: message.into() }
    }

    /// Stable, non-sensitive identifier for 5xx responses
    fn kind(&self) -> &'static str {
        match self {
            Error::MissingField => "missing_field",
            Error::DuplicateUser => "duplicate_user",
            Error::InvalidCredentials => "invalid_credentials",
            Error::MissingFile => "missing_file",
            Error::InvalidImage { .. } => "invalid_image",
            Error::MalformedUpload { .. } => "malformed_upload",
            Error::PayloadTooLarge { .. } => "payload_too_large",
            Error::ClassifierFailure { .. } => "classifier_failure",
            Error::Store(_) => "storage_failure",
            Error::Internal { .. } => "internal",
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::MissingField | Error::DuplicateUser => StatusCode::BAD_REQUEST,
            Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Error::MissingFile | Error::InvalidImage { .. } | Error::MalformedUpload { .. } => StatusCode::BAD_REQUEST,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::ClassifierFailure { .. } | Error::Store(_) | Error::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            Error::ClassifierFailure { .. } | Error::Store(_) | Error::Internal { .. } => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::InvalidCredentials => {
                tracing::info!("Authentication failed");
            }
            Error::InvalidImage { reason } | Error::MalformedUpload { reason } => {
                tracing::debug!(reason = %reason, "Rejected upload: {}", self);
            }
            _ => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let body = match self {
            // Auth routes answer with `message`, prediction with `error`
            Error::MissingField | Error::DuplicateUser | Error::InvalidCredentials => {
                json!({ "message": self.to_string() })
            }
            Error::MissingFile
            | Error::InvalidImage { .. }
            | Error::MalformedUpload { .. }
            | Error::PayloadTooLarge { .. } => {
                json!({ "error": self.to_string() })
            }
            Error::ClassifierFailure { .. } | Error::Store(_) | Error::Internal { .. } => {
                json!({ "message": "Internal server error", "error": self.kind() })
            }
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
