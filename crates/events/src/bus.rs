//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus distributes committed ledger events to consumers (projections,
//! alert subscribers). It is intentionally lightweight:
//!
//! - **Transport-agnostic**: in-memory channels today, a broker later.
//! - **At-least-once**: consumers must be idempotent; the event store —
//!   not the bus — is the source of truth.
//! - **No persistence**: distribution only.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// A subscription to an event stream.
///
/// Each subscription receives a copy of every message published after it
/// subscribed (broadcast semantics). Designed for single-threaded
/// consumption — one subscription per consumer thread.
#[derive(Debug)]
pub struct Subscription<M> {
    rx: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(rx: Receiver<M>) -> Self {
        Self { rx }
    }

    /// Block until the next message (or the bus is dropped).
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.rx.recv()
    }

    /// Block with a timeout; lets consumer loops check for shutdown.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Non-blocking poll.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.rx.try_recv()
    }
}

/// Publish/subscribe boundary for committed events.
///
/// `publish()` failures surface to the caller (typically the command
/// dispatcher); the events are already persisted at that point, so
/// retrying publication is safe.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
