use http::StatusCode;
use serde::{Deserialize, Serialize};

/// Error body shape returned by the warehouse backend on non-2xx responses.
///
/// The backend is inconsistent: validation failures carry `title` (ASP.NET
/// problem details), business failures carry `message`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl ErrorResponse {
    /// Best-effort message extraction from a raw error body.
    ///
    /// JSON bodies yield `message`, then `title`, then the raw text. Plain text
    /// bodies are returned as-is. Blank bodies yield `None`.
    pub fn extract_message(body: &str) -> Option<String> {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return None;
        }

        match serde_json::from_str::<ErrorResponse>(trimmed) {
            Ok(parsed) => parsed
                .message
                .filter(|m| !m.trim().is_empty())
                .or_else(|| parsed.title.filter(|t| !t.trim().is_empty()))
                .or_else(|| Some(trimmed.to_string())),
            Err(_) => Some(trimmed.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{message}")]
    HttpError { status: StatusCode, message: String },

    #[error("Transport error: {0}")]
    TransportError(
        #[from]
        reqwest::Error,
    ),

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(
        #[from]
        std::io::Error,
    ),

    #[error("Other error: {0}")]
    Other(
        #[from]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl From<url::ParseError> for ServiceError {
    fn from(err: url::ParseError) -> Self {
        ServiceError::InvalidInput(format!("invalid URL: {}", err))
    }
}

impl ServiceError {
    /// Builds an HTTP error from a status and raw body, falling back to the
    /// generic `HTTP Error: {status} - {reason}` text when the body is blank.
    pub fn from_http_response(status: StatusCode, body: &str) -> Self {
        let message = ErrorResponse::extract_message(body).unwrap_or_else(|| {
            match status.canonical_reason() {
                Some(reason) => format!("HTTP Error: {} - {}", status.as_u16(), reason),
                None => format!("HTTP Error: {}", status.as_u16()),
            }
        });
        ServiceError::HttpError { status, message }
    }

    /// True for errors raised locally before any request was sent.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ServiceError::ValidationError(_) | ServiceError::InvalidInput(_)
        )
    }

    /// Message suitable for showing to the operator.
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::ValidationError(msg)
            | ServiceError::InvalidInput(msg)
            | ServiceError::NotFound(msg)
            | ServiceError::ExternalApiError(msg) => msg.clone(),
            ServiceError::HttpError { message, .. } => message.clone(),
            ServiceError::TransportError(err) if err.is_timeout() => {
                "The warehouse service did not respond in time".to_string()
            }
            ServiceError::TransportError(err) if err.is_connect() => {
                "Could not connect to the warehouse service".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_body_prefers_message_over_title() {
        let body = r#"{"message":"Folio not found","title":"Bad Request"}"#;
        assert_eq!(
            ErrorResponse::extract_message(body).as_deref(),
            Some("Folio not found")
        );
    }

    #[test]
    fn json_body_falls_back_to_title() {
        let body = r#"{"title":"One or more validation errors occurred."}"#;
        assert_eq!(
            ErrorResponse::extract_message(body).as_deref(),
            Some("One or more validation errors occurred.")
        );
    }

    #[test]
    fn json_body_without_known_fields_returns_raw_text() {
        let body = r#"{"errors":["x"]}"#;
        assert_eq!(ErrorResponse::extract_message(body).as_deref(), Some(body));
    }

    #[test]
    fn plain_text_body_is_used_verbatim() {
        assert_eq!(
            ErrorResponse::extract_message("upstream exploded").as_deref(),
            Some("upstream exploded")
        );
    }

    #[test]
    fn blank_body_falls_back_to_status_text() {
        let err = ServiceError::from_http_response(StatusCode::BAD_GATEWAY, "   ");
        assert_eq!(err.user_message(), "HTTP Error: 502 - Bad Gateway");
    }

    #[test]
    fn validation_errors_are_flagged_as_local() {
        assert!(ServiceError::ValidationError("x".into()).is_validation());
        assert!(!ServiceError::ExternalApiError("x".into()).is_validation());
    }
}
