use thiserror::Error;

/// Prefix carried by every authentication failure so hosting layers can
/// recognize it in a rendered message and show remediation guidance.
pub const AUTH_REQUIRED_MARKER: &str = "Authentication required";

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not connected: {0}")]
    NotConnected(String),

    #[error("Authentication required: {0}")]
    Auth(String),
}

impl Error {
    /// True for failures a hosting layer should answer with "please authenticate".
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_carries_marker() {
        let err = Error::Auth("no token found".to_string());
        assert!(err.is_auth());
        assert!(err.to_string().starts_with(AUTH_REQUIRED_MARKER));
    }

    #[test]
    fn test_other_errors_are_not_auth() {
        assert!(!Error::Provider("boom".to_string()).is_auth());
        assert!(!Error::NotConnected("backend".to_string()).is_auth());
    }
}
