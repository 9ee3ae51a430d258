//! Service wiring for the swap executor binary.
//!
//! The broker consumer collaborator calls into [`router::OrderRouter`];
//! everything else is assembled by [`service::ExecutorService`].

pub mod publisher;
pub mod router;
pub mod service;
