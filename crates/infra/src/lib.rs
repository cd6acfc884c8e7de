//! Infrastructure layer: ledger storage, command dispatch, read models,
//! reports.
//!
//! The event store is the transaction ledger: one append-only stream per
//! product, sequence numbers assigned at append. Everything read-side
//! (catalog listing, recent transactions, valuation reports) is a
//! disposable projection rebuilt from those streams.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod reports;

#[cfg(test)]
mod integration_tests;
