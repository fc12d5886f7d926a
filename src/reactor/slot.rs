//! Fixed-capacity connection table.
//!
//! Slots `0..capacity` hold client connections; the slot at index `capacity`
//! is reserved for the listening socket so allocation scans never reach it.

use std::net::SocketAddr;
use std::time::Instant;

use mio::net::{TcpListener, TcpStream};
use mio::{Interest, Token};

use crate::error::Exhausted;
use crate::reactor::buffer::BoundedBuffer;

/// Stable index of a slot in the [`ConnectionTable`]. Doubles as the
/// multiplexer token, so an event maps back to its slot in O(1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey(pub usize);

impl From<SlotKey> for Token {
    fn from(key: SlotKey) -> Token {
        Token(key.0)
    }
}

impl From<Token> for SlotKey {
    fn from(token: Token) -> SlotKey {
        SlotKey(token.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Listener,
    Connection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Free,
    /// Listener only.
    Accepting,
    Reading,
    Writing,
}

/// The socket owned by a live slot.
#[derive(Debug)]
pub enum Endpoint {
    Listener(TcpListener),
    Stream(TcpStream),
}

#[derive(Debug)]
pub struct Slot {
    key: SlotKey,
    role: Role,
    state: SlotState,
    endpoint: Option<Endpoint>,
    /// Interest last handed to the multiplexer; `None` while unregistered.
    interest: Option<Interest>,
    buffer: BoundedBuffer,
    last_active: Instant,
    peer: Option<SocketAddr>,
}

impl Slot {
    fn new(key: SlotKey, role: Role) -> Self {
        Self {
            key,
            role,
            state: SlotState::Free,
            endpoint: None,
            interest: None,
            buffer: BoundedBuffer::new(),
            last_active: Instant::now(),
            peer: None,
        }
    }

    pub fn key(&self) -> SlotKey {
        self.key
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn is_free(&self) -> bool {
        self.state == SlotState::Free
    }

    pub fn interest(&self) -> Option<Interest> {
        self.interest
    }

    pub fn buffer(&self) -> &BoundedBuffer {
        &self.buffer
    }

    pub fn last_active(&self) -> Instant {
        self.last_active
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// True when `interest` is non-empty and every class in it is armed.
    pub fn is_armed_for(&self, interest: Interest) -> bool {
        match self.interest {
            Some(armed) => {
                (!interest.is_readable() || armed.is_readable())
                    && (!interest.is_writable() || armed.is_writable())
            }
            None => false,
        }
    }

    pub(crate) fn endpoint_mut(&mut self) -> Option<&mut Endpoint> {
        self.endpoint.as_mut()
    }

    /// Split borrow used by the read step: the stream and the buffer it fills.
    pub(crate) fn stream_and_buffer(&mut self) -> Option<(&mut TcpStream, &mut BoundedBuffer)> {
        match self.endpoint.as_mut() {
            Some(Endpoint::Stream(stream)) => Some((stream, &mut self.buffer)),
            _ => None,
        }
    }

    pub(crate) fn take_endpoint(&mut self) -> Option<Endpoint> {
        self.endpoint.take()
    }

    pub(crate) fn set_interest(&mut self, interest: Option<Interest>) {
        self.interest = interest;
    }

    /// Record a successful step: new state, fresh activity timestamp.
    pub(crate) fn transition(&mut self, state: SlotState, now: Instant) {
        debug_assert!(state != SlotState::Free, "use ConnectionTable::free");
        self.state = state;
        self.last_active = now;
    }

    pub(crate) fn clear_buffer(&mut self) {
        self.buffer.clear();
    }
}

pub struct ConnectionTable {
    slots: Vec<Slot>,
    capacity: usize,
    occupied: usize,
}

impl ConnectionTable {
    /// `capacity` connection slots plus the reserved listener slot.
    pub fn new(capacity: usize) -> Self {
        let mut slots: Vec<Slot> = (0..capacity)
            .map(|i| Slot::new(SlotKey(i), Role::Connection))
            .collect();
        slots.push(Slot::new(SlotKey(capacity), Role::Listener));

        Self {
            slots,
            capacity,
            occupied: 0,
        }
    }

    /// Number of connection slots (the listener slot is not counted).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Live connection slots.
    pub fn occupied(&self) -> usize {
        self.occupied
    }

    pub fn listener_key(&self) -> SlotKey {
        SlotKey(self.capacity)
    }

    /// First free connection slot, scanning from index 0.
    pub fn allocate(&self) -> Result<SlotKey, Exhausted> {
        self.slots[..self.capacity]
            .iter()
            .find(|slot| slot.is_free())
            .map(Slot::key)
            .ok_or(Exhausted)
    }

    /// Install `endpoint` in a slot and mark it live.
    ///
    /// Listener slots start `Accepting`, connection slots start `Reading`.
    /// Interest is left unset for the caller to arm.
    ///
    /// An out-of-range key is ignored and the endpoint dropped.
    pub fn reset(
        &mut self,
        key: SlotKey,
        endpoint: Endpoint,
        peer: Option<SocketAddr>,
        now: Instant,
    ) {
        let Some(slot) = self.slots.get_mut(key.0) else {
            return;
        };
        debug_assert!(slot.is_free(), "reset of live slot {:?}", key);
        debug_assert_eq!(
            matches!(endpoint, Endpoint::Listener(_)),
            slot.role == Role::Listener,
            "endpoint kind does not match slot role"
        );

        slot.buffer.clear();
        slot.endpoint = Some(endpoint);
        slot.interest = None;
        slot.peer = peer;
        slot.last_active = now;
        slot.state = match slot.role {
            Role::Listener => SlotState::Accepting,
            Role::Connection => SlotState::Reading,
        };

        if slot.role == Role::Connection {
            self.occupied += 1;
        }
    }

    /// Return a slot to the pool. The caller has already taken and closed
    /// the endpoint; any endpoint still present is dropped here.
    pub fn free(&mut self, key: SlotKey) {
        let Some(slot) = self.slots.get_mut(key.0) else {
            return;
        };
        if slot.is_free() {
            return;
        }
        debug_assert!(slot.endpoint.is_none(), "free of slot {:?} with open endpoint", key);

        slot.endpoint = None;
        slot.interest = None;
        slot.peer = None;
        slot.buffer.clear();
        slot.state = SlotState::Free;

        if slot.role == Role::Connection {
            self.occupied -= 1;
        }
    }

    pub fn get(&self, key: SlotKey) -> Option<&Slot> {
        self.slots.get(key.0)
    }

    pub fn get_mut(&mut self, key: SlotKey) -> Option<&mut Slot> {
        self.slots.get_mut(key.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }
}
