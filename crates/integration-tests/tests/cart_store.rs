//! Cart behavior through the application store against the fake backend.

#![allow(clippy::unwrap_used)]

use agent_market_client::Error;
use agent_market_core::{AgentId, Price};
use agent_market_integration_tests::{FakeBackend, SEED_EMAIL, SEED_PASSWORD};

#[tokio::test]
async fn test_anonymous_add_requires_login() {
    let backend = FakeBackend::start().await;
    let (market, _dir) = backend.market();
    let agent = market.catalog().agent_detail(AgentId::new(6)).await.unwrap();

    let err = market.store().add_to_cart(agent).unwrap_err();

    assert!(matches!(
        err,
        Error::Unauthenticated {
            login_required: true
        }
    ));
    assert!(market.store().snapshot().cart.is_empty());
}

#[tokio::test]
async fn test_adding_twice_increments_quantity() {
    let backend = FakeBackend::start().await;
    let (market, _dir) = backend.market();
    market.session().login(SEED_EMAIL, SEED_PASSWORD).await.unwrap();
    let scorer = market.catalog().agent_detail(AgentId::new(6)).await.unwrap();
    let closer = market.catalog().agent_detail(AgentId::new(7)).await.unwrap();

    market.store().add_to_cart(scorer.clone()).unwrap();
    market.store().add_to_cart(scorer).unwrap();
    market.store().add_to_cart(closer).unwrap();

    let cart = market.store().snapshot().cart;
    assert_eq!(cart.lines().len(), 2);
    assert_eq!(cart.quantity_of(AgentId::new(6)), 2);
    assert_eq!(cart.item_count(), 3);
    assert_eq!(cart.subtotal(), Price::from_dollars(93));

    market.store().decrement_cart_item(AgentId::new(6));
    market.store().remove_from_cart(AgentId::new(7));
    let cart = market.store().snapshot().cart;
    assert_eq!(cart.quantity_of(AgentId::new(6)), 1);
    assert_eq!(cart.quantity_of(AgentId::new(7)), 0);
}

#[tokio::test]
async fn test_logout_empties_cart() {
    let backend = FakeBackend::start().await;
    let (market, _dir) = backend.market();
    market.session().login(SEED_EMAIL, SEED_PASSWORD).await.unwrap();
    let agent = market.catalog().agent_detail(AgentId::new(8)).await.unwrap();
    market.store().add_to_cart(agent).unwrap();
    let mut rx = market.store().subscribe();

    market.session().logout().await;

    assert!(rx.has_changed().unwrap());
    let state = rx.borrow_and_update().clone();
    assert!(state.user.is_none());
    assert!(state.cart.is_empty());
}

#[tokio::test]
async fn test_revoked_session_blocks_cart() {
    let backend = FakeBackend::start().await;
    let (market, _dir) = backend.market();
    market.session().login(SEED_EMAIL, SEED_PASSWORD).await.unwrap();
    backend.revoke_all_tokens();

    assert!(market.session().check_session().await.is_none());
    let agent = market.catalog().agent_detail(AgentId::new(8)).await.unwrap();

    assert!(market.store().add_to_cart(agent).is_err());
    assert!(market.store().snapshot().cart.is_empty());
}
