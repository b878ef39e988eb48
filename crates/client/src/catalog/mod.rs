//! Catalog browsing with last-write-wins queries.
//!
//! Every selection change issues a fresh listing request carrying the full
//! query. Requests are tagged with a [`QueryTicket`]; a response whose ticket
//! is older than the newest one issued is discarded, so a slow early request
//! can never overwrite a later one.
//!
//! ```rust,ignore
//! let catalog = market.catalog();
//! let mut rx = catalog.subscribe();
//!
//! catalog.set_category(Category::Research).await;
//! if let LoadState::Ready(agents) = &*rx.borrow_and_update() {
//!     println!("{} agents", agents.len());
//! }
//! ```

mod query;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, watch};
use tracing::{debug, instrument, warn};

use agent_market_core::{AgentId, Category, Price, PriceRange, SortKey};

use crate::api::ApiClient;
use crate::error::{Result, ValidationError};
use crate::models::Agent;
use crate::store::{Action, Store};
use crate::telemetry;

pub use query::CatalogQuery;

/// Listing load state.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LoadState {
    #[default]
    Loading,
    /// The last query failed; holds a user-facing message.
    Failed(String),
    Ready(Vec<Agent>),
}

impl LoadState {
    /// Agents when ready, empty otherwise.
    #[must_use]
    pub fn agents(&self) -> &[Agent] {
        match self {
            Self::Ready(agents) => agents,
            _ => &[],
        }
    }
}

/// Handle for one in-flight listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryTicket {
    seq: u64,
    query: CatalogQuery,
}

impl QueryTicket {
    /// Position in issue order. Later tickets have larger numbers.
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    /// The query this ticket was issued for.
    #[must_use]
    pub const fn query(&self) -> &CatalogQuery {
        &self.query
    }
}

/// Owns the catalog selection and the published listing.
#[derive(Clone)]
pub struct CatalogCoordinator {
    inner: Arc<CatalogInner>,
}

struct CatalogInner {
    api: ApiClient,
    store: Store,
    query: RwLock<CatalogQuery>,
    /// Newest ticket issued.
    latest: AtomicU64,
    state: watch::Sender<LoadState>,
}

impl CatalogCoordinator {
    /// Create a coordinator with the default query. Nothing is fetched until
    /// the first change or [`refresh`](Self::refresh).
    #[must_use]
    pub fn new(api: ApiClient, store: Store) -> Self {
        let (state, _) = watch::channel(LoadState::default());
        Self {
            inner: Arc::new(CatalogInner {
                api,
                store,
                query: RwLock::new(CatalogQuery::default()),
                latest: AtomicU64::new(0),
                state,
            }),
        }
    }

    /// Current selection.
    pub async fn query(&self) -> CatalogQuery {
        *self.inner.query.read().await
    }

    /// Current load state.
    #[must_use]
    pub fn state(&self) -> LoadState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that observes every published load state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LoadState> {
        self.inner.state.subscribe()
    }

    // =========================================================================
    // Selection changes
    // =========================================================================

    /// Select a category and reload.
    #[instrument(skip(self))]
    pub async fn set_category(&self, category: Category) -> LoadState {
        self.update(|q| q.category = category).await
    }

    /// Select inclusive price bounds and reload.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidPriceRange` without touching the
    /// query or issuing a request.
    #[instrument(skip(self))]
    pub async fn set_price_range(&self, min: Price, max: Price) -> Result<LoadState> {
        let range = PriceRange::new(min, max).map_err(ValidationError::from)?;
        Ok(self.update(|q| q.price_range = range).await)
    }

    /// Select a sort order and reload.
    #[instrument(skip(self))]
    pub async fn set_sort(&self, sort: SortKey) -> LoadState {
        self.update(|q| q.sort = sort).await
    }

    /// Replace the whole selection and reload.
    #[instrument(skip(self))]
    pub async fn set_query(&self, query: CatalogQuery) -> LoadState {
        self.update(|q| *q = query).await
    }

    /// Reload with the current selection.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> LoadState {
        self.update(|_| {}).await
    }

    /// Apply `change` to the query, then fetch.
    ///
    /// The ticket is issued while the query lock is held, so ticket order
    /// matches the order in which changes were made.
    async fn update(&self, change: impl FnOnce(&mut CatalogQuery)) -> LoadState {
        let ticket = {
            let mut query = self.inner.query.write().await;
            change(&mut query);
            self.begin_query(*query)
        };

        let result = self.inner.api.list_agents(ticket.query()).await;
        self.complete_query(ticket, result);
        self.state()
    }

    // =========================================================================
    // Ticketing
    // =========================================================================

    /// Issue a ticket for `query` and publish `Loading`.
    ///
    /// Any ticket issued earlier becomes stale.
    pub fn begin_query(&self, query: CatalogQuery) -> QueryTicket {
        let mut seq = 0;
        self.inner.state.send_modify(|state| {
            seq = self.inner.latest.fetch_add(1, Ordering::SeqCst) + 1;
            *state = LoadState::Loading;
            self.inner.store.dispatch(Action::CatalogLoading);
        });

        telemetry::add_breadcrumb(
            telemetry::CATALOG,
            "Catalog query",
            &[
                ("category", query.category.to_string()),
                ("sort", query.sort.to_string()),
                ("min_price", query.price_range.min().to_string()),
                ("max_price", query.price_range.max().to_string()),
            ],
        );
        debug!(seq, "Catalog query issued");

        QueryTicket { seq, query }
    }

    /// Publish the result for `ticket`, unless a newer ticket exists.
    ///
    /// A successful listing replaces the previous one in full after the local
    /// consistency pass. Returns whether the result was applied.
    pub fn complete_query(&self, ticket: QueryTicket, result: Result<Vec<Agent>>) -> bool {
        let next = match result {
            Ok(agents) => LoadState::Ready(ticket.query.retain_matching(agents)),
            Err(e) => LoadState::Failed(e.user_message()),
        };
        let action = match &next {
            LoadState::Ready(agents) => Action::CatalogLoaded {
                count: agents.len(),
            },
            LoadState::Failed(message) => Action::CatalogFailed(message.clone()),
            LoadState::Loading => Action::CatalogLoading,
        };

        if let Action::CatalogFailed(message) = &action {
            warn!(seq = ticket.seq, error = %message, "Catalog query failed");
        }

        // Checked under the channel lock so a concurrent begin_query either
        // lands entirely before or entirely after this write.
        let applied = self.inner.state.send_if_modified(|state| {
            if self.inner.latest.load(Ordering::SeqCst) != ticket.seq {
                return false;
            }
            *state = next;
            self.inner.store.dispatch(action);
            true
        });

        if !applied {
            debug!(seq = ticket.seq, "Discarding stale catalog result");
        }
        applied
    }

    // =========================================================================
    // Detail
    // =========================================================================

    /// Fetch one agent.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for an unknown id, which
    /// [`Error::user_message`](crate::Error::user_message) renders differently
    /// from a temporary outage.
    pub async fn agent_detail(&self, id: AgentId) -> Result<Agent> {
        self.inner.api.get_agent(id).await
    }
}
