//! Boundaries to the outside world: HTTP, page parsing and persistence.
pub mod http;
pub mod page;
pub mod repo;
