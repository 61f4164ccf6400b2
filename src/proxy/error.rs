use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum CompositeError {
    #[error("Method Not Allowed")]
    MethodNotAllowed,
    #[error("Missing GEMINI_API_KEY")]
    MissingCredential,
    #[error("Invalid input")]
    InvalidInput,
    #[error("NO_IMAGE_RETURNED")]
    NoImageReturned,
    #[error("{0}")]
    Unknown(String),
}

impl CompositeError {
    pub fn unknown(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            CompositeError::Unknown("Unknown error".to_string())
        } else {
            CompositeError::Unknown(message)
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            CompositeError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            CompositeError::MissingCredential => StatusCode::INTERNAL_SERVER_ERROR,
            CompositeError::InvalidInput => StatusCode::BAD_REQUEST,
            CompositeError::NoImageReturned => StatusCode::BAD_GATEWAY,
            CompositeError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CompositeError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
