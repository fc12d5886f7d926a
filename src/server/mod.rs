//! Listening socket setup and the event loop that drives the reactor.

pub mod dispatcher;
pub mod listener;

pub use dispatcher::Server;
