//! Append-only event store boundary.
//!
//! This module defines an infrastructure-facing abstraction for storing and
//! loading per-product event streams without making any storage assumptions.
//! The streams ARE the transaction ledger: entries are immutable, sequence
//! numbers are assigned at append, and nothing is ever rewritten.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
