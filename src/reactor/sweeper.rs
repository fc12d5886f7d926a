use std::time::{Duration, Instant};

use tracing::info;

use crate::reactor::Reactor;
use crate::reactor::slot::SlotKey;

/// Closes connections that have been idle for at least `idle_timeout`.
///
/// Each tick looks at `batch` slots starting where the previous tick stopped,
/// so per-tick cost stays bounded and the whole table is covered every
/// `capacity / batch` ticks. The listener slot is never visited.
#[derive(Debug)]
pub struct Sweeper {
    cursor: usize,
    batch: usize,
    idle_timeout: Duration,
}

impl Sweeper {
    pub fn new(batch: usize, idle_timeout: Duration) -> Self {
        Self {
            cursor: 0,
            batch,
            idle_timeout,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Scan the next window of slots. Returns how many were closed.
    pub fn tick(&mut self, reactor: &mut Reactor, now: Instant) -> usize {
        let capacity = reactor.table().capacity();
        if capacity == 0 {
            return 0;
        }

        let mut closed = 0;
        for _ in 0..self.batch.min(capacity) {
            if self.cursor >= capacity {
                self.cursor = 0;
            }
            let key = SlotKey(self.cursor);
            self.cursor += 1;

            let Some(slot) = reactor.table().get(key) else {
                continue;
            };
            if slot.is_free() {
                continue;
            }

            let idle = now.saturating_duration_since(slot.last_active());
            if idle >= self.idle_timeout {
                info!(
                    slot = key.0,
                    peer = ?slot.peer(),
                    "Connection timed out after {}s idle",
                    idle.as_secs()
                );
                reactor.close(key);
                closed += 1;
            }
        }

        closed
    }
}
