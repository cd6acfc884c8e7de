use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use stockbook_core::{AggregateId, ExpectedVersion};

/// An event ready to be appended to a stream (not yet assigned a sequence
/// number).
///
/// Domain modules build this from their typed events via
/// [`UncommittedEvent::from_typed`], which serializes the payload and
/// captures the event metadata needed for later deserialization. The store
/// assigns sequence numbers during append, turning these into
/// [`StoredEvent`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// A stored event in an append-only stream.
///
/// Sequence numbers are stream-scoped (per product), assigned by the store
/// as `last + 1`, and never change. They give the ledger its ordering, its
/// optimistic-concurrency anchor, and its idempotency key for projections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Monotonically increasing position in the aggregate stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    /// Convert a stored event into an event envelope for publication.
    pub fn to_envelope(&self) -> stockbook_events::EventEnvelope<JsonValue> {
        stockbook_events::EventEnvelope::new(
            self.event_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.sequence_number,
            self.payload.clone(),
        )
    }
}

/// Event store operation error.
///
/// These are **infrastructure errors** (storage, concurrency) as opposed to
/// domain errors (validation, stock rules).
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),
}

/// Append-only event store.
///
/// Events are organized into **streams**, one per aggregate instance (one
/// per product). Within a stream, sequence numbers increase monotonically
/// from 1 with no gaps.
///
/// Implementations must:
/// - enforce optimistic concurrency (check version before append)
/// - assign sequence numbers monotonically (no gaps, no duplicates)
/// - ensure atomicity (all events in a batch are persisted or none are)
/// - never modify or delete stored events
pub trait EventStore: Send + Sync {
    /// Append events to an aggregate stream (append-only).
    ///
    /// All events in the batch must target the same aggregate. Sequence
    /// numbers are assigned starting at `current_version + 1`.
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load the full stream for an aggregate, in sequence order.
    ///
    /// Returns an empty vector if the stream does not exist yet.
    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load every stored event across all streams, ordered by
    /// `(aggregate_id, sequence_number)`.
    ///
    /// This is the projection-rebuild read: deterministic, replayable.
    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(aggregate_id)
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_all()
    }
}

impl UncommittedEvent {
    /// Convenience constructor from a typed domain event.
    ///
    /// Keeps infra decoupled from business, while still capturing the event
    /// metadata needed for future deserialization.
    pub fn from_typed<E>(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: stockbook_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            EventStoreError::InvalidAppend(format!("payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}
