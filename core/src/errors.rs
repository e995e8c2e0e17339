use thiserror::Error;

/// Errors raised while building, sending or interpreting a generation request
#[derive(Error, Debug)]
pub enum BananaError {
    /// Missing credential, model name or prompt
    #[error("Configuration Error: {0}")]
    ConfigError(String),

    /// An option outside its allowed set or range
    #[error("Validation Error: {0}")]
    ValidationError(String),

    /// The model answered, but not with something usable
    #[error("Upstream Error: {0}")]
    UpstreamError(String),

    /// Malformed citation offsets or undecodable payloads
    #[error("Decode Error: {0}")]
    DecodeError(String),

    #[error("Request Error: {0}")]
    RequestError(String),

    #[error("Parsing Error: {0}")]
    ParsingError(String),

    #[error("HTTP Error: {status_code} - {message}")]
    HttpError { status_code: u16, message: String },

    #[error("Auth Error: {0}")]
    AuthError(String),

    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),

    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

impl BananaError {
    /// True for the errors a caller can fix by changing node inputs
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::ConfigError(_) | Self::ValidationError(_))
    }
}

/// Result type for Nano Banana operations
pub type BananaResult<T> = Result<T, BananaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BananaError::HttpError {
            status_code: 429,
            message: "quota".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP Error: 429 - quota");

        let err = BananaError::ValidationError("bad ratio".to_string());
        assert_eq!(err.to_string(), "Validation Error: bad ratio");
    }

    #[test]
    fn test_user_errors() {
        assert!(BananaError::ConfigError("x".into()).is_user_error());
        assert!(BananaError::ValidationError("x".into()).is_user_error());
        assert!(!BananaError::UpstreamError("x".into()).is_user_error());
        assert!(!BananaError::DecodeError("x".into()).is_user_error());
    }
}
