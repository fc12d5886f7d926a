use std::io;

use thiserror::Error;

/// Errors returned while starting or driving the reactor.
#[derive(Debug, Error)]
pub enum ReactorError {
    /// Socket, poll, or rlimit syscall failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// System resource limit too low (e.g., RLIMIT_NOFILE).
    #[error("{0}")]
    ResourceLimit(String),
    /// Configuration could not be loaded or is out of range.
    #[error("config: {0}")]
    Config(String),
}

/// Returned by [`ConnectionTable::allocate`](crate::reactor::slot::ConnectionTable::allocate)
/// when every connection slot is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("connection table exhausted")]
pub struct Exhausted;
