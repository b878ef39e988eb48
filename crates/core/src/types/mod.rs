//! Core types for the Agent Market.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod catalog;
pub mod email;
pub mod id;
pub mod price;
pub mod role;

pub use catalog::{Category, CategoryParseError, SortKey, SortKeyParseError};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{Price, PriceRange, PriceRangeError};
pub use role::Role;
