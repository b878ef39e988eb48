//! Sentry scope helpers.
//!
//! These are no-ops until the host application initializes Sentry, so the
//! library can call them unconditionally.

use crate::models::User;

/// Breadcrumb category for catalog queries.
pub const CATALOG: &str = "catalog";
/// Breadcrumb category for cart actions.
pub const CART: &str = "cart";
/// Breadcrumb category for session transitions.
pub const SESSION: &str = "session";

/// Associate subsequent events with `user`.
///
/// Call this after successful authentication.
pub fn set_user(user: &User) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user.id.to_string()),
            email: Some(user.email.as_str().to_string()),
            username: Some(user.name.clone()),
            ..Default::default()
        }));
    });
}

/// Stop associating events with a user.
pub fn clear_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Record a user action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// ```rust,ignore
/// add_breadcrumb(CART, "Added agent", &[("agent_id", "12")]);
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, String)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb
            .data
            .insert((*key).to_string(), serde_json::Value::String(value.clone()));
    }

    sentry::add_breadcrumb(breadcrumb);
}
