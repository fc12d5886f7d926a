//! Readiness multiplexer over a single `mio::Poll` (epoll on Linux).
//!
//! Registrations are edge-triggered: each readiness transition is reported
//! once, and the caller must drain it before the next [`Poller::wait`].

use std::io;
use std::time::Duration;

use mio::event::Source;
use mio::{Events, Interest, Poll};

use crate::reactor::slot::SlotKey;

/// One ready slot out of a [`Poller::wait`] batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub key: SlotKey,
    pub readable: bool,
    pub writable: bool,
    pub error: bool,
}

pub struct Poller {
    poll: Poll,
    events: Events,
    #[cfg(test)]
    fail_next_wait: Option<io::ErrorKind>,
}

impl Poller {
    /// `max_events` bounds the batch returned by one wait.
    pub fn new(max_events: usize) -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(max_events),
            #[cfg(test)]
            fail_next_wait: None,
        })
    }

    /// Arm `interest` for `source`. `prior` is the interest currently armed for
    /// this source: `None` adds the registration, anything else modifies it.
    pub fn register<S>(
        &self,
        source: &mut S,
        key: SlotKey,
        interest: Interest,
        prior: Option<Interest>,
    ) -> io::Result<()>
    where
        S: Source + ?Sized,
    {
        let registry = self.poll.registry();
        match prior {
            None => registry.register(source, key.into(), interest),
            Some(_) => registry.reregister(source, key.into(), interest),
        }
    }

    /// Drop every interest for `source`. No-op when `prior` is `None`.
    pub fn unregister<S>(&self, source: &mut S, prior: Option<Interest>) -> io::Result<()>
    where
        S: Source + ?Sized,
    {
        match prior {
            None => Ok(()),
            Some(_) => self.poll.registry().deregister(source),
        }
    }

    /// Block until at least one registered source is ready or `timeout`
    /// elapses (`None` waits forever), replacing the contents of `out`.
    ///
    /// An interrupted wait yields an empty batch. Any other error is fatal to
    /// the caller's loop.
    pub fn wait(&mut self, timeout: Option<Duration>, out: &mut Vec<Readiness>) -> io::Result<()> {
        out.clear();

        #[cfg(test)]
        if let Some(kind) = self.fail_next_wait.take() {
            return Err(io::Error::new(kind, "injected wait failure"));
        }

        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(e),
        }

        out.extend(self.events.iter().map(|event| Readiness {
            key: event.token().into(),
            readable: event.is_readable(),
            writable: event.is_writable(),
            error: event.is_error(),
        }));
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn fail_next_wait(&mut self, kind: io::ErrorKind) {
        self.fail_next_wait = Some(kind);
    }
}
