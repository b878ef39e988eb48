//! Agent Market Core - Shared domain types.
//!
//! This crate provides the types shared by every Agent Market component:
//! - `client` - API client, session manager, catalog coordinator and store
//! - `cli` - Command-line front end over the client library
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no async.
//! Everything here is pure and cheap to construct in tests.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, prices, catalog categories and sort keys

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
