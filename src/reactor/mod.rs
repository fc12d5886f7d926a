//! Single-threaded, edge-triggered echo reactor.
//!
//! # Architecture
//!
//! - **`buffer`**: fixed-capacity byte buffer owned by each slot
//! - **`slot`**: the connection table; one slot per connection plus the listener
//! - **`poller`**: readiness multiplexer over `mio::Poll`
//! - **`connection`**: the per-slot state machine driven by readiness events
//! - **`sweeper`**: incremental idle-connection reaper
//!
//! [`Reactor`] bundles the table and the poller into the one context value
//! the dispatcher owns and hands to the state machine and the sweeper.
//!
//! # Slot State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │  Accepting  │ ← listener slot only, never leaves this state
//!        └──────┬──────┘
//!               │ accept + allocate
//!               ▼
//!        ┌─────────────┐  recv > 0   ┌─────────────┐
//!        │   Reading   │ ──────────▶ │   Writing   │
//!        │ (READABLE)  │ ◀────────── │ (WRITABLE)  │
//!        └──────┬──────┘  send > 0   └──────┬──────┘
//!               │                           │
//!               └─ recv 0 / error / idle ───┴─ error / idle → Free
//! ```

pub mod buffer;
pub mod connection;
pub mod poller;
pub mod slot;
pub mod sweeper;

use std::io;
use std::time::{Duration, Instant};

use mio::Interest;
use mio::net::TcpListener;

use poller::{Poller, Readiness};
use slot::{ConnectionTable, Endpoint, SlotKey};

pub use buffer::BUFFER_CAPACITY;
pub use slot::{Role, SlotState};
pub use sweeper::Sweeper;

/// Connection table plus the multiplexer its sockets are registered with.
pub struct Reactor {
    pub(crate) table: ConnectionTable,
    pub(crate) poller: Poller,
}

impl Reactor {
    pub fn new(max_connections: usize, max_events: usize) -> io::Result<Self> {
        Ok(Self {
            table: ConnectionTable::new(max_connections),
            poller: Poller::new(max_events)?,
        })
    }

    pub fn table(&self) -> &ConnectionTable {
        &self.table
    }

    /// Put the listening socket in the reserved last slot and arm it.
    pub fn install_listener(&mut self, listener: TcpListener, now: Instant) -> io::Result<SlotKey> {
        let key = self.table.listener_key();
        self.table.reset(key, Endpoint::Listener(listener), None, now);
        if let Err(e) = self.arm(key, Interest::READABLE) {
            self.close(key);
            return Err(e);
        }
        Ok(key)
    }

    pub fn wait(&mut self, timeout: Option<Duration>, out: &mut Vec<Readiness>) -> io::Result<()> {
        self.poller.wait(timeout, out)
    }

    /// Register `interest` for the slot's socket, replacing whatever was armed.
    pub(crate) fn arm(&mut self, key: SlotKey, interest: Interest) -> io::Result<()> {
        let slot = self
            .table
            .get_mut(key)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such slot"))?;
        let prior = slot.interest();

        match slot.endpoint_mut() {
            Some(Endpoint::Stream(stream)) => self.poller.register(stream, key, interest, prior)?,
            Some(Endpoint::Listener(listener)) => {
                self.poller.register(listener, key, interest, prior)?
            }
            None => return Err(io::Error::from(io::ErrorKind::NotConnected)),
        }

        slot.set_interest(Some(interest));
        Ok(())
    }

    /// Unregister, close, and free a slot. Safe on a slot that is already free.
    pub fn close(&mut self, key: SlotKey) {
        let Some(slot) = self.table.get_mut(key) else {
            return;
        };
        let prior = slot.interest();

        if let Some(mut endpoint) = slot.take_endpoint() {
            let result = match &mut endpoint {
                Endpoint::Stream(stream) => self.poller.unregister(stream, prior),
                Endpoint::Listener(listener) => self.poller.unregister(listener, prior),
            };
            if let Err(e) = result {
                tracing::debug!(slot = key.0, error = %e, "Deregister failed");
            }
            // Dropping the endpoint closes the descriptor.
            drop(endpoint);
        }

        self.table.free(key);
    }
}
