//! echo-reactor - single-threaded edge-triggered TCP echo server
//!
//! Core library: connection table, readiness multiplexer, per-slot state
//! machine, idle sweeper, and the event loop tying them together.

pub mod config;
pub mod error;
pub mod limits;
pub mod reactor;
pub mod server;
