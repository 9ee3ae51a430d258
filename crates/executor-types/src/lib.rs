//! Shared types for the swap executor.
//!
//! This crate defines the domain records persisted in the document store,
//! the account-abstraction operation model, and the request/response
//! messages exchanged over the broker boundary.

pub mod approval;
pub mod market;
pub mod messages;
pub mod operation;
pub mod orders;

pub use approval::*;
pub use market::*;
pub use messages::*;
pub use operation::*;
pub use orders::*;
