//! User domain types.

use serde::{Deserialize, Serialize};
use url::Url;

use agent_market_core::{Email, Role, UserId};

use crate::media::resolve_image_url;

/// Identity snapshot of the signed-in account.
///
/// Persisted alongside the bearer token so the UI can render before the
/// backend confirms the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Backend user ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Account email.
    pub email: Email,
    /// Stored avatar reference (relative path or absolute URL).
    #[serde(default)]
    pub avatar: Option<String>,
    /// Whether the account has been verified by the marketplace.
    #[serde(default, alias = "verified")]
    pub is_verified: bool,
    /// Account role, when the backend reports one.
    #[serde(default)]
    pub role: Option<Role>,
}

impl User {
    /// Whether this account sells agents.
    #[must_use]
    pub fn is_vendor(&self) -> bool {
        self.role == Some(Role::Vendor)
    }

    /// Whether this account has marketplace admin rights.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }

    /// Avatar resolved against the media origin, or `""` when unset.
    #[must_use]
    pub fn avatar_url(&self, media_origin: &Url) -> String {
        self.avatar
            .as_deref()
            .map(|path| resolve_image_url(media_origin, path))
            .unwrap_or_default()
    }
}
