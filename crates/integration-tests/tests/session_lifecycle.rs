//! Login, registration, logout and session revalidation against the fake
//! backend.

#![allow(clippy::unwrap_used)]

use secrecy::SecretString;

use agent_market_client::session::forms::{ProfileUpdate, RegisterRequest};
use agent_market_client::{Error, Marketplace, ValidationError};
use agent_market_core::Role;
use agent_market_integration_tests::{FakeBackend, SEED_EMAIL, SEED_PASSWORD};

// =============================================================================
// Login / Register
// =============================================================================

#[tokio::test]
async fn test_login_persists_session() {
    let backend = FakeBackend::start().await;
    let (market, dir) = backend.market();

    let user = market.session().login(SEED_EMAIL, SEED_PASSWORD).await.unwrap();
    assert_eq!(user.email.as_str(), SEED_EMAIL);
    assert!(market.session().is_authenticated());
    assert_eq!(market.store().snapshot().user, Some(user.clone()));

    // A second handle over the same file sees the session without a request.
    let config = backend.config(&dir.path().join("session.json"));
    let reopened = Marketplace::new(config).unwrap();
    assert_eq!(reopened.session().current_user(), Some(user));
    assert_eq!(backend.hits("GET", "/api/me"), 0);
}

#[tokio::test]
async fn test_login_bad_credentials_rejected() {
    let backend = FakeBackend::start().await;
    let (market, _dir) = backend.market();

    let err = market
        .session()
        .login(SEED_EMAIL, "wrong-password")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Rejected { status: 401, .. }));
    assert_eq!(err.user_message(), "Invalid credentials");
    assert!(!market.session().is_authenticated());
    assert!(market.store().snapshot().user.is_none());
}

#[tokio::test]
async fn test_login_malformed_email_makes_no_request() {
    let backend = FakeBackend::start().await;
    let (market, _dir) = backend.market();

    let err = market.session().login("nobody", "pw").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::InvalidEmail(_))
    ));
    assert_eq!(backend.total_hits(), 0);
}

#[tokio::test]
async fn test_register_signs_in() {
    let backend = FakeBackend::start().await;
    let (market, _dir) = backend.market();

    let user = market
        .session()
        .register(RegisterRequest {
            name: "Grace Hopper".to_string(),
            email: "grace@example.com".to_string(),
            password: SecretString::from("cobol1959"),
            role: Some(Role::Vendor),
        })
        .await
        .unwrap();

    assert_eq!(user.name, "Grace Hopper");
    assert!(user.is_vendor());
    assert!(market.session().is_authenticated());
}

#[tokio::test]
async fn test_register_duplicate_email_surfaces_field_error() {
    let backend = FakeBackend::start().await;
    let (market, _dir) = backend.market();

    let err = market
        .session()
        .register(RegisterRequest {
            name: "Ada Again".to_string(),
            email: SEED_EMAIL.to_string(),
            password: SecretString::from("another"),
            role: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Rejected { status: 422, .. }));
    assert_eq!(err.user_message(), "The email has already been taken.");
    assert!(!market.session().is_authenticated());
}

// =============================================================================
// Logout
// =============================================================================

#[tokio::test]
async fn test_logout_clears_session() {
    let backend = FakeBackend::start().await;
    let (market, _dir) = backend.market();
    market.session().login(SEED_EMAIL, SEED_PASSWORD).await.unwrap();

    market.session().logout().await;

    assert_eq!(backend.hits("POST", "/api/logout"), 1);
    assert!(!market.session().is_authenticated());
    assert!(market.session().current_user().is_none());
    assert!(market.store().snapshot().user.is_none());
}

#[tokio::test]
async fn test_logout_clears_session_when_backend_fails() {
    let backend = FakeBackend::start().await;
    let (market, _dir) = backend.market();
    market.session().login(SEED_EMAIL, SEED_PASSWORD).await.unwrap();
    backend.fail_logout(true);

    market.session().logout().await;

    assert_eq!(backend.hits("POST", "/api/logout"), 1);
    assert!(!market.session().is_authenticated());
}

#[tokio::test]
async fn test_logout_when_anonymous_makes_no_request() {
    let backend = FakeBackend::start().await;
    let (market, _dir) = backend.market();

    market.session().logout().await;

    assert_eq!(backend.total_hits(), 0);
}

// =============================================================================
// Revalidation
// =============================================================================

#[tokio::test]
async fn test_check_session_without_token_makes_no_request() {
    let backend = FakeBackend::start().await;
    let (market, _dir) = backend.market();

    assert!(market.session().check_session().await.is_none());
    assert_eq!(backend.total_hits(), 0);
}

#[tokio::test]
async fn test_check_session_refreshes_snapshot() {
    let backend = FakeBackend::start().await;
    let (market, _dir) = backend.market();
    market.session().login(SEED_EMAIL, SEED_PASSWORD).await.unwrap();
    backend.rename_account(SEED_EMAIL, "Countess Lovelace");

    let user = market.session().check_session().await.unwrap();

    assert_eq!(user.name, "Countess Lovelace");
    assert_eq!(market.session().current_user().unwrap().name, "Countess Lovelace");
    assert_eq!(
        market.store().snapshot().user.unwrap().name,
        "Countess Lovelace"
    );
}

#[tokio::test]
async fn test_check_session_with_revoked_token_clears() {
    let backend = FakeBackend::start().await;
    let (market, _dir) = backend.market();
    market.session().login(SEED_EMAIL, SEED_PASSWORD).await.unwrap();
    backend.revoke_all_tokens();

    assert!(market.session().check_session().await.is_none());

    assert_eq!(backend.hits("GET", "/api/me"), 1);
    assert!(!market.session().is_authenticated());
    assert!(market.store().snapshot().user.is_none());
}

#[tokio::test]
async fn test_expired_token_on_profile_update_requires_login() {
    let backend = FakeBackend::start().await;
    let (market, _dir) = backend.market();
    market.session().login(SEED_EMAIL, SEED_PASSWORD).await.unwrap();
    backend.revoke_all_tokens();

    let err = market
        .session()
        .update_profile(ProfileUpdate::default().name("Ada L."))
        .await
        .unwrap_err();

    assert!(err.login_required());
    assert!(!market.session().is_authenticated());
    assert!(market.store().snapshot().user.is_none());
}
