//! Agent Market client library.
//!
//! The state layer behind the marketplace UI: everything between a user
//! event and the backend REST API.
//!
//! # Components
//!
//! - [`media`] - Resolves stored media paths into fetchable URLs
//! - [`api`] - Bearer-token HTTP client with normalized errors
//! - [`session`] - Login/registration lifecycle and the persisted session cache
//! - [`catalog`] - Category/price/sort selection with last-write-wins queries
//! - [`store`] - Reducer-style application state (session, cart, catalog flags)
//! - [`state`] - [`Marketplace`] handle wiring all of the above together
//!
//! # Example
//!
//! ```rust,ignore
//! use agent_market_client::{ClientConfig, Marketplace};
//! use agent_market_core::Category;
//!
//! let market = Marketplace::new(ClientConfig::from_env()?)?;
//!
//! if market.session().check_session().await.is_none() {
//!     market.session().login("vendor@example.com", "hunter22").await?;
//! }
//!
//! market.catalog().set_category(Category::Development).await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod media;
pub mod models;
pub mod session;
pub mod state;
pub mod store;
pub mod telemetry;

pub use config::{ClientConfig, ConfigError};
pub use error::{Error, Result, ValidationError};
pub use state::Marketplace;
