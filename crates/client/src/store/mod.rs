//! Application state container.
//!
//! All state changes go through [`Store::dispatch`], which applies the pure
//! [`reduce`] function and publishes the result on a `watch` channel. Views
//! subscribe instead of polling.

pub mod cart;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use agent_market_core::AgentId;

use crate::error::{Error, Result};
use crate::models::{Agent, User};
use crate::session::cache::SessionCache;
use crate::telemetry;

pub use cart::{Cart, CartLine};

/// Catalog status mirrored for views that only need a spinner or banner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogFlags {
    pub loading: bool,
    pub error: Option<String>,
    /// Number of agents in the last successful listing.
    pub count: usize,
}

/// Everything views render from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    /// Signed-in user, `None` when anonymous.
    pub user: Option<User>,
    pub cart: Cart,
    pub catalog: CatalogFlags,
}

/// State transitions.
#[derive(Debug, Clone)]
pub enum Action {
    SessionStarted(User),
    /// Clears the user and the cart.
    SessionEnded,
    AddToCart(Agent),
    DecrementCartItem(AgentId),
    RemoveFromCart(AgentId),
    ClearCart,
    CatalogLoading,
    CatalogLoaded { count: usize },
    CatalogFailed(String),
}

/// Apply `action` to `state`.
#[must_use]
pub fn reduce(mut state: AppState, action: Action) -> AppState {
    match action {
        Action::SessionStarted(user) => state.user = Some(user),
        Action::SessionEnded => {
            state.user = None;
            state.cart.clear();
        }
        Action::AddToCart(agent) => state.cart.add(agent),
        Action::DecrementCartItem(id) => state.cart.decrement(id),
        Action::RemoveFromCart(id) => state.cart.remove(id),
        Action::ClearCart => state.cart.clear(),
        Action::CatalogLoading => {
            state.catalog.loading = true;
            state.catalog.error = None;
        }
        Action::CatalogLoaded { count } => {
            state.catalog = CatalogFlags {
                loading: false,
                error: None,
                count,
            };
        }
        Action::CatalogFailed(message) => {
            state.catalog.loading = false;
            state.catalog.error = Some(message);
        }
    }
    state
}

/// Shared handle to the application state.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    state: watch::Sender<AppState>,
    session: Arc<SessionCache>,
}

impl Store {
    /// Create a store seeded with the persisted user, if any.
    ///
    /// The store follows every teardown of `session`: whatever clears the
    /// cache (logout, a rejected token on any request, a corrupt record)
    /// also ends the session here and drops the error-tracking user.
    #[must_use]
    pub fn new(session: Arc<SessionCache>) -> Self {
        let initial = AppState {
            user: session.user(),
            ..AppState::default()
        };
        let (state, _) = watch::channel(initial);
        let store = Self {
            inner: Arc::new(StoreInner {
                state,
                session: Arc::clone(&session),
            }),
        };

        let weak = Arc::downgrade(&store.inner);
        session.on_clear(move || {
            telemetry::clear_user();
            if let Some(inner) = weak.upgrade() {
                Self { inner }.dispatch(Action::SessionEnded);
            }
        });
        store
    }

    /// Apply an action and notify subscribers.
    pub fn dispatch(&self, action: Action) {
        debug!(?action, "dispatch");
        self.inner
            .state
            .send_modify(|state| *state = reduce(std::mem::take(state), action));
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> AppState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that observes every dispatched change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.inner.state.subscribe()
    }

    /// Add one of `agent` to the cart.
    ///
    /// Whether the user is signed in is read from the session cache, not from
    /// the state snapshot.
    ///
    /// # Errors
    ///
    /// Returns `Error::Unauthenticated { login_required: true }` when no
    /// session is stored; the cart is left unchanged.
    pub fn add_to_cart(&self, agent: Agent) -> Result<()> {
        if !self.inner.session.is_present() {
            return Err(Error::Unauthenticated {
                login_required: true,
            });
        }

        telemetry::add_breadcrumb(
            telemetry::CART,
            "Added agent to cart",
            &[("agent_id", agent.id.to_string())],
        );
        self.dispatch(Action::AddToCart(agent));
        Ok(())
    }

    /// Remove one of `id` from the cart.
    pub fn decrement_cart_item(&self, id: AgentId) {
        self.dispatch(Action::DecrementCartItem(id));
    }

    /// Drop the cart line for `id`.
    pub fn remove_from_cart(&self, id: AgentId) {
        telemetry::add_breadcrumb(
            telemetry::CART,
            "Removed agent from cart",
            &[("agent_id", id.to_string())],
        );
        self.dispatch(Action::RemoveFromCart(id));
    }

    pub fn clear_cart(&self) {
        self.dispatch(Action::ClearCart);
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use agent_market_core::{Email, UserId};
    use secrecy::SecretString;

    use cart::tests::agent;

    fn user() -> User {
        User {
            id: UserId::new(5),
            name: "Grace".to_string(),
            email: Email::parse("grace@example.com").unwrap(),
            avatar: None,
            is_verified: false,
            role: None,
        }
    }

    fn signed_in_store() -> Store {
        let session = Arc::new(SessionCache::in_memory());
        session.set(&SecretString::from("tok"), user()).unwrap();
        Store::new(session)
    }

    #[test]
    fn test_reduce_session_ended_clears_user_and_cart() {
        let mut state = reduce(AppState::default(), Action::SessionStarted(user()));
        state = reduce(state, Action::AddToCart(agent(1, 100)));
        assert!(state.user.is_some());

        let state = reduce(state, Action::SessionEnded);
        assert!(state.user.is_none());
        assert!(state.cart.is_empty());
    }

    #[test]
    fn test_cache_teardown_ends_store_session() {
        let session = Arc::new(SessionCache::in_memory());
        session.set(&SecretString::from("tok"), user()).unwrap();
        let store = Store::new(Arc::clone(&session));
        store.add_to_cart(agent(1, 100)).unwrap();
        let mut rx = store.subscribe();

        session.clear();

        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert!(state.user.is_none());
        assert!(state.cart.is_empty());
    }

    #[test]
    fn test_reduce_catalog_flags() {
        let state = reduce(AppState::default(), Action::CatalogFailed("down".to_string()));
        assert_eq!(state.catalog.error.as_deref(), Some("down"));

        let state = reduce(state, Action::CatalogLoading);
        assert!(state.catalog.loading);
        assert!(state.catalog.error.is_none());

        let state = reduce(state, Action::CatalogLoaded { count: 4 });
        assert_eq!(
            state.catalog,
            CatalogFlags {
                loading: false,
                error: None,
                count: 4
            }
        );
    }

    #[test]
    fn test_new_store_seeds_persisted_user() {
        let store = signed_in_store();
        assert_eq!(store.snapshot().user.unwrap().name, "Grace");

        let anonymous = Store::new(Arc::new(SessionCache::in_memory()));
        assert!(anonymous.snapshot().user.is_none());
    }

    #[test]
    fn test_add_to_cart_requires_session() {
        let store = Store::new(Arc::new(SessionCache::in_memory()));
        let err = store.add_to_cart(agent(1, 100)).unwrap_err();
        assert!(err.login_required());
        assert!(store.snapshot().cart.is_empty());
    }

    #[test]
    fn test_add_twice_yields_quantity_two() {
        let store = signed_in_store();
        store.add_to_cart(agent(1, 100)).unwrap();
        store.add_to_cart(agent(1, 100)).unwrap();

        let cart = store.snapshot().cart;
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.quantity_of(AgentId::new(1)), 2);

        store.decrement_cart_item(AgentId::new(1));
        assert_eq!(store.snapshot().cart.quantity_of(AgentId::new(1)), 1);
        store.remove_from_cart(AgentId::new(1));
        assert!(store.snapshot().cart.is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_see_dispatches() {
        let store = signed_in_store();
        let mut rx = store.subscribe();

        store.dispatch(Action::CatalogLoaded { count: 2 });
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().catalog.count, 2);
    }
}
