//! `stockbook-app` — the service boundary of the stock ledger.
//!
//! The admin dashboard's HTTP layer (not part of this repo) calls these
//! services and renders their results; each method corresponds to one of
//! its endpoints. Wiring is in-memory: event store + bus + dispatcher +
//! projections, assembled by [`services::build_in_memory_services`].

pub mod alerts;
pub mod dto;
pub mod errors;
pub mod services;

pub use errors::ServiceError;
pub use services::{build_in_memory_services, AppServices};
