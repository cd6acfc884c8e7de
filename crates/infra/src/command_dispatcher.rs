//! Command execution pipeline (application-level orchestration).
//!
//! Every write to the ledger goes through here:
//!
//! ```text
//! Command
//!   ↓
//! 1. Acquire the product's stream lock
//!   ↓
//! 2. Load events from store
//!   ↓
//! 3. Rehydrate aggregate (apply historical events to rebuild state)
//!   ↓
//! 4. Handle command (pure decision logic, produces events)
//!   ↓
//! 5. Persist events to store (append-only, version check)
//!   ↓
//! 6. Publish events to bus (for projections, alert subscribers)
//! ```
//!
//! The stream lock is what makes per-product mutations linearizable: the
//! insufficient-stock check (step 4) and the quantity decrement it guards
//! (step 5) cannot be separated by an interleaving write to the same
//! product. Commands against *different* products only contend for the
//! brief lock-map lookup and otherwise proceed concurrently.
//!
//! A failed step leaves the stream untouched; the caller gets a typed
//! error and may resubmit. Publication failures happen after the append,
//! so the events are durable and retrying is safe (at-least-once;
//! projections are idempotent).
//!
//! This module contains no IO itself; it composes the store and bus traits.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::debug;
use uuid::Uuid;

use stockbook_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use stockbook_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug)]
pub enum DispatchError {
    /// Malformed or constraint-violating input (deterministic, caller's fault).
    Validation(String),
    /// The referenced aggregate does not exist (or is tombstoned).
    NotFound,
    /// A sale asked for more units than remain. Distinct from `Validation`:
    /// the request was well-formed, the business rule refused it.
    InsufficientStock { requested: u64, remaining: u64 },
    /// Deterministic business conflict (e.g. deleting a product with history).
    Conflict(String),
    /// Stream version moved underneath the append (should not happen while
    /// the stream lock is held; kept as a second line of defense).
    Concurrency(String),
    /// Failed to deserialize historical payloads into the aggregate event type.
    Deserialize(String),
    /// Persisting to the event store failed.
    Store(EventStoreError),
    /// Publication failed after a successful append (at-least-once; retry may duplicate).
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match &value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg.clone()),
            _ => DispatchError::Store(value),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InsufficientStock {
                requested,
                remaining,
            } => DispatchError::InsufficientStock {
                requested,
                remaining,
            },
            DomainError::Conflict(msg) => DispatchError::Conflict(msg),
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

/// Per-stream mutual exclusion, keyed by aggregate id.
///
/// Lock entries are created on first use and kept for the process
/// lifetime; the catalog is small (one entry per product), so no eviction.
/// The inner `Mutex<()>` guards no data — only the check-then-append
/// window of `dispatch`.
#[derive(Debug, Default)]
struct StreamLocks {
    inner: Mutex<HashMap<AggregateId, Arc<Mutex<()>>>>,
}

impl StreamLocks {
    fn for_stream(&self, aggregate_id: AggregateId) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(aggregate_id).or_default().clone()
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Sits between the service layer and the infrastructure (event store,
/// event bus) and provides one consistent execution model for all
/// commands while keeping domain code pure and testable. Generic over the
/// store and bus so tests can run fully in memory.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
    locks: StreamLocks,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            bus,
            locks: StreamLocks::default(),
        }
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Dispatch a command through the full pipeline.
    ///
    /// The `make_aggregate` closure creates a fresh instance for
    /// rehydration (e.g. `Product::empty(id)`), keeping the dispatcher
    /// generic over aggregate types.
    ///
    /// Returns the committed [`StoredEvent`]s (with assigned sequence
    /// numbers) — the ledger entries this command produced. An accepted
    /// command that decides no events (e.g. an empty patch) returns an
    /// empty vector without touching the store.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: stockbook_events::Event + Serialize + DeserializeOwned,
    {
        // Serialize all work on this product's stream. A poisoned lock only
        // means another thread panicked mid-dispatch; the store itself is
        // still consistent (appends are atomic), so recover the guard.
        let stream_lock = self.locks.for_stream(aggregate_id);
        let _guard = stream_lock.lock().unwrap_or_else(PoisonError::into_inner);

        // 1) Load history
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        // 2) Rehydrate aggregate
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        // 3) Decide events (no mutation)
        let decided = aggregate.handle(&command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        // 4) Persist (append-only)
        let aggregate_type = aggregate_type.into();
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    aggregate_id,
                    aggregate_type.clone(),
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        debug!(
            aggregate_id = %aggregate_id,
            events = committed.len(),
            stream_version = committed.last().map(|e| e.sequence_number).unwrap_or(0),
            "committed ledger entries"
        );

        // 5) Publish committed events (after append)
        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Defense in depth: even a buggy backend must not hand us another
    // stream's events or a non-monotonic sequence.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                format!("loaded stream contains wrong aggregate_id at index {idx}"),
            )));
        }
        if e.sequence_number == 0 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                "stored event has sequence_number=0".to_string(),
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                format!(
                    "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                    e.sequence_number
                ),
            )));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    // Ensure deterministic ordering.
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|e| e.sequence_number);

    for stored in sorted {
        let ev: A::Event = serde_json::from_value(stored.payload)
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}
