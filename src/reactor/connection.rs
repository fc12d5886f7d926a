//! Per-slot state machine.
//!
//! Every step performs exactly one nonblocking call (accept drains the
//! backlog) and then arms the opposite interest, so the slot oscillates
//! between `Reading` and `Writing` until the peer goes away.

use std::io;
use std::net::SocketAddr;
use std::time::Instant;

use mio::Interest;
use mio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::error::Exhausted;
use crate::reactor::Reactor;
use crate::reactor::poller::Readiness;
use crate::reactor::slot::{Endpoint, SlotKey, SlotState};

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

impl Reactor {
    /// Route one readiness event to the step its slot is waiting for.
    ///
    /// A readiness bit only triggers a step when the same class is armed on
    /// the slot, so bits left over from an earlier registration are ignored.
    pub fn dispatch(&mut self, event: Readiness, now: Instant) {
        let Some(slot) = self.table.get(event.key) else {
            warn!(slot = event.key.0, "Event for unknown slot");
            return;
        };

        let state = slot.state();
        let read_armed = slot.is_armed_for(Interest::READABLE);
        let write_armed = slot.is_armed_for(Interest::WRITABLE);

        match state {
            // Closed earlier in this batch.
            SlotState::Free => {}
            SlotState::Accepting => {
                if event.readable && read_armed {
                    self.on_acceptable(now);
                }
            }
            SlotState::Reading | SlotState::Writing => {
                if event.error {
                    self.on_error(event.key);
                    return;
                }
                if event.readable && read_armed {
                    self.on_readable(event.key, now);
                }
                if event.writable && write_armed {
                    self.on_writable(event.key, now);
                }
            }
        }
    }

    /// Accept every pending connection on the listener.
    pub fn on_acceptable(&mut self, now: Instant) {
        let listener_key = self.table.listener_key();

        loop {
            let accepted = match self.table.get(listener_key).and_then(|s| s.endpoint()) {
                Some(Endpoint::Listener(listener)) => listener.accept(),
                _ => return,
            };

            match accepted {
                Ok((stream, peer)) => self.admit(stream, peer, now),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(ref e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::Interrupted | io::ErrorKind::ConnectionAborted
                    ) =>
                {
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    return;
                }
            }
        }
    }

    fn admit(&mut self, stream: TcpStream, peer: SocketAddr, now: Instant) {
        let key = match self.table.allocate() {
            Ok(key) => key,
            Err(Exhausted) => {
                warn!(
                    capacity = self.table.capacity(),
                    "Connection table full, dropping connection from {}",
                    peer
                );
                return;
            }
        };

        // mio hands out accepted streams already nonblocking.
        self.table.reset(key, Endpoint::Stream(stream), Some(peer), now);

        if let Err(e) = self.arm(key, Interest::READABLE) {
            warn!(slot = key.0, peer = %peer, error = %e, "Register failed");
            self.close(key);
            return;
        }

        info!(slot = key.0, "Accepted connection from {}", peer);
    }

    /// One receive into the slot buffer; on data, switch to `Writing`.
    pub fn on_readable(&mut self, key: SlotKey, now: Instant) {
        let Some(slot) = self.table.get_mut(key) else {
            return;
        };
        if slot.state() != SlotState::Reading {
            return;
        }
        let Some((stream, buffer)) = slot.stream_and_buffer() else {
            return;
        };

        match buffer.fill_from(stream) {
            Ok(0) => {
                info!(slot = key.0, "Connection closed by peer");
                self.close(key);
            }
            Ok(n) => {
                debug!(slot = key.0, bytes = n, "Received");
                slot.transition(SlotState::Writing, now);
                if let Err(e) = self.arm(key, Interest::WRITABLE) {
                    warn!(slot = key.0, error = %e, "Register failed");
                    self.close(key);
                }
            }
            Err(ref e) if is_transient(e) => {}
            Err(e) => {
                warn!(slot = key.0, error = %e, "Receive failed");
                self.close(key);
            }
        }
    }

    /// One send of the buffered bytes; on progress, switch back to `Reading`.
    ///
    /// A short send drops the unsent tail: each cycle echoes at most one
    /// buffer's worth and nothing is carried into the next cycle.
    pub fn on_writable(&mut self, key: SlotKey, now: Instant) {
        let Some(slot) = self.table.get_mut(key) else {
            return;
        };
        if slot.state() != SlotState::Writing {
            return;
        }
        let Some((stream, buffer)) = slot.stream_and_buffer() else {
            return;
        };

        let pending = buffer.len();
        match buffer.drain_into(stream) {
            Ok(0) => {
                warn!(slot = key.0, "Send wrote nothing, closing");
                self.close(key);
            }
            Ok(n) => {
                if n < pending {
                    debug!(slot = key.0, sent = n, dropped = pending - n, "Short send");
                }
                slot.clear_buffer();
                slot.transition(SlotState::Reading, now);
                if let Err(e) = self.arm(key, Interest::READABLE) {
                    warn!(slot = key.0, error = %e, "Register failed");
                    self.close(key);
                }
            }
            Err(ref e) if is_transient(e) => {}
            Err(e) => {
                warn!(slot = key.0, error = %e, "Send failed");
                self.close(key);
            }
        }
    }

    /// The kernel flagged an error on a live connection.
    fn on_error(&mut self, key: SlotKey) {
        let pending = match self.table.get(key).and_then(|s| s.endpoint()) {
            Some(Endpoint::Stream(stream)) => stream.take_error().ok().flatten(),
            _ => None,
        };

        match pending {
            Some(e) => warn!(slot = key.0, error = %e, "Connection error"),
            None => warn!(slot = key.0, "Connection error"),
        }
        self.close(key);
    }
}
