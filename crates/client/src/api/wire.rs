//! Response envelopes and error-body parsing for the REST API.
//!
//! Successful responses arrive as `{success: true, ...}` with the payload
//! under a call-specific key. Failures look like
//! `{success: false, message, errors: {field: [..]}}`, although the backend is
//! not consistent about which of those fields it fills in.

use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::models::User;

/// `{success, data}` wrapper used by catalog endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct DataEnvelope<T> {
    pub data: T,
}

/// `{success, user, token}` returned by login and register.
#[derive(Deserialize)]
pub(crate) struct AuthEnvelope {
    pub user: User,
    pub token: String,
}

/// `{success, user}` returned by `/me` and profile updates.
#[derive(Debug, Deserialize)]
pub(crate) struct UserEnvelope {
    pub user: User,
}

/// `{success, avatar}` returned by avatar uploads.
#[derive(Debug, Deserialize)]
pub(crate) struct AvatarEnvelope {
    pub avatar: String,
}

/// `{success, message}` returned by password changes and logout.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct MessageEnvelope {
    #[serde(default)]
    pub message: Option<String>,
}

/// Failure body. Every field is optional.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    errors: Option<serde_json::Value>,
}

impl ErrorBody {
    /// Best human-readable reason: `message`, then the first field error,
    /// then `error`.
    fn reason(self) -> Option<String> {
        non_blank(self.message)
            .or_else(|| self.errors.as_ref().and_then(first_field_error))
            .or_else(|| non_blank(self.error))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// First string found in `{field: [msg, ..]}` or `{field: msg}`.
fn first_field_error(errors: &serde_json::Value) -> Option<String> {
    let map = errors.as_object()?;
    map.values().find_map(|value| match value {
        serde_json::Value::String(s) => non_blank(Some(s.clone())),
        serde_json::Value::Array(items) => items
            .iter()
            .find_map(|item| non_blank(item.as_str().map(String::from))),
        _ => None,
    })
}

/// Extract the backend's reason from a failure body, if it has one.
pub(crate) fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::reason)
}

/// Map a non-success status (other than an already-handled 401) to an
/// error.
pub(crate) fn classify(status: StatusCode, body: &str) -> Error {
    let message = error_message(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    });

    if status == StatusCode::NOT_FOUND {
        Error::NotFound(message)
    } else if status.is_server_error() {
        Error::Unavailable {
            status: status.as_u16(),
            message,
        }
    } else {
        Error::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

/// Decode a 2xx body, honouring an explicit `success: false`.
pub(crate) fn decode<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T> {
    let value: serde_json::Value = serde_json::from_str(body).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %body.chars().take(500).collect::<String>(),
            "Failed to parse API response"
        );
        Error::Decode(e.to_string())
    })?;

    if value.get("success").and_then(serde_json::Value::as_bool) == Some(false) {
        let reason = serde_json::from_value::<ErrorBody>(value)
            .ok()
            .filter(|b| b.success == Some(false))
            .and_then(ErrorBody::reason)
            .unwrap_or_else(|| "Request failed".to_string());
        return Err(Error::Rejected {
            status: status.as_u16(),
            message: reason,
        });
    }

    Ok(serde_json::from_value(value)?)
}

/// Filename suggested by a `Content-Disposition` header.
///
/// Handles `filename="a b.zip"` and bare `filename=a.zip`. The extended
/// `filename*=` form is ignored.
pub(crate) fn disposition_filename(header: &str) -> Option<String> {
    header.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let name = value.trim().trim_matches('"');
        // Never let the server pick a directory
        let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
        (!name.is_empty()).then(|| name.to_string())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_message_preferred_over_field_errors() {
        let body = r#"{"success":false,"message":"Invalid credentials","errors":{"email":["taken"]}}"#;
        assert_eq!(error_message(body).as_deref(), Some("Invalid credentials"));
    }

    #[test]
    fn test_first_field_error_used_without_message() {
        let body = r#"{"success":false,"errors":{"email":["The email has already been taken."]}}"#;
        assert_eq!(
            error_message(body).as_deref(),
            Some("The email has already been taken.")
        );

        let body = r#"{"errors":{"name":"Name is required"}}"#;
        assert_eq!(error_message(body).as_deref(), Some("Name is required"));
    }

    #[test]
    fn test_error_field_fallback() {
        assert_eq!(
            error_message(r#"{"error":"Forbidden"}"#).as_deref(),
            Some("Forbidden")
        );
        assert_eq!(error_message("<html>oops</html>"), None);
        assert_eq!(error_message(r#"{"message":"  "}"#), None);
    }

    #[test]
    fn test_classify_statuses() {
        assert!(matches!(
            classify(StatusCode::NOT_FOUND, ""),
            Error::NotFound(msg) if msg == "Not Found"
        ));
        assert!(matches!(
            classify(StatusCode::UNPROCESSABLE_ENTITY, r#"{"message":"bad email"}"#),
            Error::Rejected { status: 422, message } if message == "bad email"
        ));
        assert!(matches!(
            classify(StatusCode::FORBIDDEN, ""),
            Error::Rejected { status: 403, .. }
        ));
        assert!(matches!(
            classify(StatusCode::SERVICE_UNAVAILABLE, "down"),
            Error::Unavailable { status: 503, .. }
        ));
    }

    #[test]
    fn test_decode_explicit_failure() {
        let result: Result<UserEnvelope> = decode(
            StatusCode::OK,
            r#"{"success":false,"message":"Account suspended"}"#,
        );
        assert!(matches!(
            result,
            Err(Error::Rejected { status: 200, message }) if message == "Account suspended"
        ));
    }

    #[test]
    fn test_decode_success() {
        let body = r#"{"success":true,"avatar":"avatars/1.png"}"#;
        let env: AvatarEnvelope = decode(StatusCode::OK, body).unwrap();
        assert_eq!(env.avatar, "avatars/1.png");

        let result: Result<AvatarEnvelope> = decode(StatusCode::OK, "not json");
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn test_disposition_filename() {
        assert_eq!(
            disposition_filename(r#"attachment; filename="support-bot.zip""#).as_deref(),
            Some("support-bot.zip")
        );
        assert_eq!(
            disposition_filename("attachment; filename=agent.tar.gz").as_deref(),
            Some("agent.tar.gz")
        );
        assert_eq!(
            disposition_filename(r#"attachment; filename="../../etc/passwd""#).as_deref(),
            Some("passwd")
        );
        assert_eq!(disposition_filename("inline"), None);
    }
}
