//! Form inputs for session operations, with client-side validation.
//!
//! Each form validates before any request is built; a form that fails
//! validation never reaches the network.

use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use agent_market_core::{Email, Role};

use crate::error::{Error, ValidationError};

/// Largest avatar the backend accepts: 5 MiB.
pub const MAX_AVATAR_BYTES: u64 = 5 * 1024 * 1024;

/// Registration form.
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: SecretString,
    pub role: Option<Role>,
}

impl RegisterRequest {
    /// Check required fields and email shape.
    ///
    /// # Errors
    ///
    /// Returns the first failing field.
    pub fn validate(&self) -> Result<Email, ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Required("name"));
        }
        let email = Email::parse(&self.email)?;
        if self.password.expose_secret().is_empty() {
            return Err(ValidationError::EmptyPassword);
        }
        Ok(email)
    }
}

/// Partial profile update. Only `Some` fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ProfileUpdate {
    /// Set the new display name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the new email.
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Whether no field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }

    /// Check that something is being changed and each provided field is
    /// well formed.
    ///
    /// # Errors
    ///
    /// Returns `EmptyProfileUpdate`, `Required("name")` or `InvalidEmail`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyProfileUpdate);
        }
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ValidationError::Required("name"));
        }
        if let Some(email) = &self.email {
            Email::parse(email)?;
        }
        Ok(())
    }
}

/// Password change form.
#[derive(Debug, Clone)]
pub struct PasswordChange {
    pub current: SecretString,
    pub new: SecretString,
    pub confirm: SecretString,
}

impl PasswordChange {
    /// Build a form from plain strings.
    #[must_use]
    pub fn new(current: &str, new: &str, confirm: &str) -> Self {
        Self {
            current: SecretString::from(current),
            new: SecretString::from(new),
            confirm: SecretString::from(confirm),
        }
    }

    /// Mismatch is checked first so the user sees the most specific message.
    ///
    /// # Errors
    ///
    /// Returns `PasswordMismatch` or `EmptyPassword`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.new.expose_secret() != self.confirm.expose_secret() {
            return Err(ValidationError::PasswordMismatch);
        }
        if self.new.expose_secret().is_empty() || self.current.expose_secret().is_empty() {
            return Err(ValidationError::EmptyPassword);
        }
        Ok(())
    }
}

/// Avatar image ready for upload.
#[derive(Clone)]
pub struct AvatarUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for AvatarUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvatarUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl AvatarUpload {
    /// Wrap in-memory image bytes.
    #[must_use]
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read an avatar from disk, guessing the content type from the
    /// extension.
    ///
    /// The type and size are checked against file metadata before the file
    /// is read, so oversized files are never loaded.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the file is unreadable, not an image, or
    /// larger than [`MAX_AVATAR_BYTES`].
    pub async fn from_path(path: &Path) -> Result<Self, Error> {
        let unreadable = |e: std::io::Error| ValidationError::UnreadableFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();
        let size = tokio::fs::metadata(path).await.map_err(unreadable)?.len();
        check_avatar(&content_type, size)?;

        let bytes = tokio::fs::read(path).await.map_err(unreadable)?;
        let file_name = path
            .file_name()
            .map_or_else(|| "avatar".to_string(), |n| n.to_string_lossy().into_owned());

        let upload = Self::new(file_name, content_type, bytes);
        upload.validate()?;
        Ok(upload)
    }

    /// Check content type and size.
    ///
    /// # Errors
    ///
    /// Returns `AvatarNotImage` or `AvatarTooLarge`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_avatar(&self.content_type, self.bytes.len() as u64)
    }
}

fn check_avatar(content_type: &str, size: u64) -> Result<(), ValidationError> {
    if !content_type.trim().to_ascii_lowercase().starts_with("image/") {
        return Err(ValidationError::AvatarNotImage {
            content_type: content_type.to_string(),
        });
    }
    if size > MAX_AVATAR_BYTES {
        return Err(ValidationError::AvatarTooLarge {
            size,
            max: MAX_AVATAR_BYTES,
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_mismatch_reported_first() {
        let form = PasswordChange::new("", "new-pass-1", "new-pass-2");
        assert_eq!(form.validate(), Err(ValidationError::PasswordMismatch));
    }

    #[test]
    fn test_password_empty() {
        let form = PasswordChange::new("old", "", "");
        assert_eq!(form.validate(), Err(ValidationError::EmptyPassword));
        let form = PasswordChange::new("", "n", "n");
        assert_eq!(form.validate(), Err(ValidationError::EmptyPassword));
        assert!(PasswordChange::new("old", "n", "n").validate().is_ok());
    }

    #[test]
    fn test_profile_update_requires_a_field() {
        assert_eq!(
            ProfileUpdate::default().validate(),
            Err(ValidationError::EmptyProfileUpdate)
        );
        assert_eq!(
            ProfileUpdate::default().name("  ").validate(),
            Err(ValidationError::Required("name"))
        );
        assert!(matches!(
            ProfileUpdate::default().email("bad").validate(),
            Err(ValidationError::InvalidEmail(_))
        ));
        assert!(ProfileUpdate::default().name("Ada").validate().is_ok());
    }

    #[test]
    fn test_profile_update_serializes_only_set_fields() {
        let body = serde_json::to_value(ProfileUpdate::default().name("Ada")).unwrap();
        assert_eq!(body, serde_json::json!({"name": "Ada"}));
    }

    #[test]
    fn test_register_validation() {
        let mut form = RegisterRequest {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: SecretString::from("pw"),
            role: Some(Role::Vendor),
        };
        assert!(form.validate().is_ok());

        form.email = "nope".to_string();
        assert!(matches!(form.validate(), Err(ValidationError::InvalidEmail(_))));

        form.name = String::new();
        assert_eq!(form.validate(), Err(ValidationError::Required("name")));
    }

    #[test]
    fn test_avatar_limits() {
        let ok = AvatarUpload::new("a.png", "image/png", vec![0; 1024]);
        assert!(ok.validate().is_ok());

        let pdf = AvatarUpload::new("a.pdf", "application/pdf", vec![0; 10]);
        assert!(matches!(
            pdf.validate(),
            Err(ValidationError::AvatarNotImage { .. })
        ));

        let exactly_max = usize::try_from(MAX_AVATAR_BYTES).unwrap();
        let at_limit = AvatarUpload::new("a.png", "image/png", vec![0; exactly_max]);
        assert!(at_limit.validate().is_ok());

        let big = AvatarUpload::new("a.png", "image/png", vec![0; exactly_max + 1]);
        assert!(matches!(
            big.validate(),
            Err(ValidationError::AvatarTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_avatar_from_path_checks_extension() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("notes.txt");
        tokio::fs::write(&text, b"hello").await.unwrap();
        assert!(matches!(
            AvatarUpload::from_path(&text).await,
            Err(Error::Validation(ValidationError::AvatarNotImage { .. }))
        ));

        let image = dir.path().join("me.png");
        tokio::fs::write(&image, b"\x89PNG").await.unwrap();
        let upload = AvatarUpload::from_path(&image).await.unwrap();
        assert_eq!(upload.file_name, "me.png");
        assert_eq!(upload.content_type, "image/png");
    }

    #[tokio::test]
    async fn test_avatar_from_missing_path() {
        let result = AvatarUpload::from_path(Path::new("/definitely/not/here.png")).await;
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::UnreadableFile { .. }))
        ));
    }
}
