//! Generation tickets for completion-order application.
//!
//! Every asynchronous operation takes a [`Ticket`] when it is issued. When it
//! completes, its result is applied only if the ticket is still the current one and
//! the flow was not cancelled; otherwise the result is dropped as [`Settled::Stale`].

use std::cell::Cell;

use tokio_util::sync::CancellationToken;

/// Snapshot of a generation counter at issue time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Monotonic generation counter confined to one thread
#[derive(Debug, Default)]
pub struct Generation {
    current: Cell<u64>,
}

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new generation and returns its ticket. Outstanding tickets go stale.
    pub fn issue(&self) -> Ticket {
        let next = self.current.get() + 1;
        self.current.set(next);
        Ticket(next)
    }

    /// Makes every outstanding ticket stale without handing out a new one
    pub fn advance(&self) {
        self.current.set(self.current.get() + 1);
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.current.get() == ticket.0
    }

    /// Ticket still current and the flow not torn down
    pub fn admits(&self, ticket: Ticket, cancel: &CancellationToken) -> bool {
        !cancel.is_cancelled() && self.is_current(ticket)
    }
}

/// Outcome of a guarded asynchronous operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled<T> {
    /// The result was applied
    Current(T),
    /// Superseded or cancelled; nothing was applied
    Stale,
}

impl<T> Settled<T> {
    pub fn is_stale(&self) -> bool {
        matches!(self, Settled::Stale)
    }

    pub fn current(self) -> Option<T> {
        match self {
            Settled::Current(v) => Some(v),
            Settled::Stale => None,
        }
    }
}
