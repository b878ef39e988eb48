//! Authentication lifecycle.
//!
//! The session is either anonymous or authenticated. The persisted
//! [`SessionCache`] is the source of truth; the store's `user` field mirrors
//! it for views and is updated on every transition.
//!
//! # Transitions
//!
//! - [`AuthSessionManager::register`] / [`AuthSessionManager::login`]:
//!   anonymous to authenticated on success, unchanged on failure
//! - [`AuthSessionManager::logout`]: always ends anonymous
//! - [`AuthSessionManager::check_session`]: revalidates a stored token,
//!   degrading to anonymous on any failure

pub mod cache;
pub mod forms;

use std::sync::Arc;

use secrecy::SecretString;
use tracing::{debug, info, instrument, warn};

use agent_market_core::Email;

use crate::api::{ApiClient, UnauthorizedPolicy};
use crate::error::{Result, ValidationError};
use crate::models::User;
use crate::store::{Action, Store};
use crate::telemetry;

use cache::{Session, SessionCache};
use forms::{AvatarUpload, PasswordChange, ProfileUpdate, RegisterRequest};

/// Drives login, registration, logout and profile changes.
#[derive(Clone)]
pub struct AuthSessionManager {
    inner: Arc<AuthSessionInner>,
}

struct AuthSessionInner {
    api: ApiClient,
    cache: Arc<SessionCache>,
    store: Store,
}

impl AuthSessionManager {
    #[must_use]
    pub fn new(api: ApiClient, cache: Arc<SessionCache>, store: Store) -> Self {
        Self {
            inner: Arc::new(AuthSessionInner { api, cache, store }),
        }
    }

    /// Whether a token and user snapshot are stored. Reads storage.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.cache.is_present()
    }

    /// Stored user snapshot, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.inner.cache.user()
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Create an account and sign in.
    ///
    /// # Errors
    ///
    /// Returns a validation error before any request for a blank name, a
    /// malformed email or an empty password, and the backend's reason when
    /// registration is refused.
    #[instrument(skip(self, form), fields(email = %form.email))]
    pub async fn register(&self, form: RegisterRequest) -> Result<User> {
        let email = form.validate()?;
        let session = self.inner.api.register(&form, &email).await?;
        self.start(session)
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for malformed input and `Error::Rejected`
    /// with the backend's reason for bad credentials.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let email = Email::parse(email).map_err(ValidationError::from)?;
        if password.is_empty() {
            return Err(ValidationError::EmptyPassword.into());
        }

        let session = self
            .inner
            .api
            .login(&email, &SecretString::from(password))
            .await?;
        self.start(session)
    }

    /// Sign out.
    ///
    /// The backend is told first, best-effort. Local state is cleared
    /// regardless of the outcome.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        if self.inner.cache.token().is_some()
            && let Err(e) = self.inner.api.logout().await
        {
            warn!(error = %e, "Logout request failed, clearing local session anyway");
        }
        self.end();
        info!("Logged out");
    }

    /// Revalidate the stored session against the backend.
    ///
    /// Without a stored token this returns `None` without a request. A
    /// successful check refreshes the snapshot; any failure clears the
    /// session.
    #[instrument(skip(self))]
    pub async fn check_session(&self) -> Option<User> {
        if self.inner.cache.token().is_none() {
            debug!("No stored session");
            return None;
        }

        match self.inner.api.me(UnauthorizedPolicy::Silent).await {
            Ok(user) => match self.inner.cache.replace_user(user.clone()) {
                Ok(true) => {
                    telemetry::set_user(&user);
                    self.inner.store.dispatch(Action::SessionStarted(user.clone()));
                    Some(user)
                }
                Ok(false) => None,
                Err(e) => {
                    warn!(error = %e, "Could not persist refreshed session");
                    self.end();
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "Stored session is no longer valid");
                self.end();
                None
            }
        }
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Send changed profile fields; the returned record replaces the
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Returns `EmptyProfileUpdate` when nothing is set, and the backend's
    /// reason on refusal. Local state is untouched on any error.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<User> {
        update.validate()?;
        let user = self.inner.api.update_profile(&update).await?;
        self.replace_snapshot(user.clone())?;
        Ok(user)
    }

    /// Upload a new avatar and return the backend's media reference.
    ///
    /// The snapshot is refreshed from `/me` afterwards. A failed refresh is
    /// logged and does not fail the upload.
    ///
    /// # Errors
    ///
    /// Returns `AvatarNotImage`/`AvatarTooLarge` before any request, and the
    /// backend's reason on refusal.
    #[instrument(skip(self, upload), fields(file = %upload.file_name))]
    pub async fn upload_avatar(&self, upload: AvatarUpload) -> Result<String> {
        upload.validate()?;
        let avatar = self.inner.api.upload_avatar(upload).await?;

        match self.inner.api.me(UnauthorizedPolicy::Silent).await {
            Ok(user) => {
                if let Err(e) = self.replace_snapshot(user) {
                    warn!(error = %e, "Could not persist refreshed profile");
                }
            }
            Err(e) => warn!(error = %e, "Could not refresh profile after avatar upload"),
        }

        Ok(avatar)
    }

    /// Change the account password. Returns the backend's confirmation.
    ///
    /// # Errors
    ///
    /// Returns `PasswordMismatch` (no request is made) when the new password
    /// and its confirmation differ.
    #[instrument(skip(self, change))]
    pub async fn change_password(&self, change: PasswordChange) -> Result<String> {
        change.validate()?;
        self.inner.api.change_password(&change).await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Persist a fresh session and publish it.
    fn start(&self, session: Session) -> Result<User> {
        let Session { token, user } = session;
        self.inner.cache.set(&token, user.clone())?;

        telemetry::set_user(&user);
        telemetry::add_breadcrumb(
            telemetry::SESSION,
            "Signed in",
            &[("user_id", user.id.to_string())],
        );
        self.inner.store.dispatch(Action::SessionStarted(user.clone()));
        info!(user_id = %user.id, "Session started");
        Ok(user)
    }

    /// Tear down the session. The store and error tracking follow through
    /// the cache's clear hook.
    fn end(&self) {
        self.inner.cache.clear();
    }

    /// Replace the stored snapshot, if a session still exists.
    fn replace_snapshot(&self, user: User) -> Result<()> {
        if self.inner.cache.replace_user(user.clone())? {
            self.inner.store.dispatch(Action::SessionStarted(user));
        }
        Ok(())
    }
}
