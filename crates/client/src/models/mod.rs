//! Domain models returned by the marketplace API.
//!
//! These are read-only snapshots of backend records. The client never
//! edits them field by field; updated records replace old ones wholesale.

pub mod agent;
pub mod user;

pub use agent::{Agent, Seller};
pub use user::User;
