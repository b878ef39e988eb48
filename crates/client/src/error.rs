//! Unified error handling for the client library.
//!
//! Every service method returns `Result<T, Error>`. Nothing here is fatal:
//! each variant maps to a message the UI can show via [`Error::user_message`].

use thiserror::Error;

use agent_market_core::{EmailError, PriceRangeError};

/// Client-side validation failures. These never reach the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// New password and its confirmation differ.
    #[error("new password and confirmation do not match")]
    PasswordMismatch,

    /// A password field was left empty.
    #[error("password cannot be empty")]
    EmptyPassword,

    /// A required text field was left empty.
    #[error("{0} is required")]
    Required(&'static str),

    /// Email failed structural validation.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Avatar file is not an image.
    #[error("avatar must be an image (got {content_type})")]
    AvatarNotImage {
        /// Detected content type.
        content_type: String,
    },

    /// Avatar file exceeds the upload limit.
    #[error("avatar must be at most {max} bytes (got {size})")]
    AvatarTooLarge {
        /// File size in bytes.
        size: u64,
        /// Maximum accepted size in bytes.
        max: u64,
    },

    /// A local file could not be read.
    #[error("could not read {path}: {reason}")]
    UnreadableFile {
        /// Path that was requested.
        path: String,
        /// Underlying I/O error.
        reason: String,
    },

    /// Profile update carried no fields.
    #[error("nothing to update")]
    EmptyProfileUpdate,

    /// Catalog price bounds are invalid.
    #[error("invalid price range: {0}")]
    InvalidPriceRange(#[from] PriceRangeError),
}

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Input rejected before any network call.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The credential is missing, invalid or expired. The session has
    /// already been torn down when this is returned.
    #[error("authentication required")]
    Unauthenticated {
        /// Whether the caller should send the user to the login entry point.
        login_required: bool,
    },

    /// Resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend refused the request (4xx other than 401/404).
    #[error("Request rejected ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Backend-provided reason.
        message: String,
    },

    /// Backend failed (5xx).
    #[error("Service unavailable ({status}): {message}")]
    Unavailable {
        /// HTTP status code.
        status: u16,
        /// Backend-provided reason, if any.
        message: String,
    },

    /// The request never produced a response.
    #[error("Network error: {0}")]
    Network(String),

    /// The response body did not have the expected shape.
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Reading or writing the persisted session failed.
    #[error("Session storage error: {0}")]
    Storage(String),
}

impl Error {
    /// HTTP status associated with this error, when one is known.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthenticated { .. } => Some(401),
            Self::Rejected { status, .. } | Self::Unavailable { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the caller should route the user to login.
    #[must_use]
    pub const fn login_required(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated {
                login_required: true
            }
        )
    }

    /// Message suitable for showing to the user.
    ///
    /// Distinguishes "not found" from "temporarily unavailable" and never
    /// leaks transport internals.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => err.to_string(),
            Self::Unauthenticated { .. } => "Your session has expired. Please log in again.".to_string(),
            Self::NotFound(what) => format!("{what} could not be found."),
            Self::Rejected { message, .. } => message.clone(),
            Self::Unavailable { .. } | Self::Network(_) => {
                "The marketplace is temporarily unavailable. Please try again.".to_string()
            }
            Self::Decode(_) => "The marketplace sent an unexpected response.".to_string(),
            Self::Storage(_) => "Your session could not be saved on this device.".to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result type alias for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound("Agent 12".to_string());
        assert_eq!(err.to_string(), "Not found: Agent 12");

        let err = Error::from(ValidationError::PasswordMismatch);
        assert_eq!(err.to_string(), "new password and confirmation do not match");
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            Error::Unauthenticated {
                login_required: false
            }
            .status(),
            Some(401)
        );
        assert_eq!(
            Error::Rejected {
                status: 422,
                message: "bad".to_string()
            }
            .status(),
            Some(422)
        );
        assert_eq!(Error::Network("reset".to_string()).status(), None);
    }

    #[test]
    fn test_user_message_distinguishes_not_found_from_unavailable() {
        let missing = Error::NotFound("Agent 3".to_string()).user_message();
        let down = Error::Unavailable {
            status: 503,
            message: "maintenance".to_string(),
        }
        .user_message();

        assert!(missing.contains("could not be found"));
        assert!(down.contains("temporarily unavailable"));
        assert_eq!(down, Error::Network("timeout".to_string()).user_message());
    }

    #[test]
    fn test_login_required_flag() {
        assert!(
            Error::Unauthenticated {
                login_required: true
            }
            .login_required()
        );
        assert!(
            !Error::Unauthenticated {
                login_required: false
            }
            .login_required()
        );
        assert!(!Error::NotFound("x".to_string()).login_required());
    }
}
