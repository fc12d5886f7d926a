use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::config::Config;
use crate::error::ReactorError;
use crate::reactor::poller::Readiness;
use crate::reactor::{Reactor, Sweeper};
use crate::server::listener;

/// The event loop: owns the reactor context and the sweeper.
pub struct Server {
    reactor: Reactor,
    sweeper: Sweeper,
    batch: Vec<Readiness>,
    local_addr: SocketAddr,
}

impl Server {
    /// Create the multiplexer, bind the listener, and arm it.
    pub fn bind(cfg: &Config) -> Result<Self, ReactorError> {
        let addr = cfg.socket_addr()?;
        let mut reactor = Reactor::new(cfg.max_connections, cfg.max_events)?;

        let listener = listener::bind(addr, cfg.backlog)?;
        let local_addr = listener.local_addr()?;
        reactor.install_listener(listener, Instant::now())?;

        info!(
            addr = %local_addr,
            capacity = cfg.max_connections,
            idle_timeout_secs = cfg.idle_timeout_secs,
            "Listening"
        );

        Ok(Self {
            reactor,
            sweeper: Sweeper::new(cfg.scan_batch, cfg.idle_timeout()),
            batch: Vec::with_capacity(cfg.max_events),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn reactor(&self) -> &Reactor {
        &self.reactor
    }

    /// One loop iteration against the wall clock.
    pub fn turn(&mut self, timeout: Option<Duration>) -> io::Result<usize> {
        self.turn_at(Instant::now(), timeout)
    }

    /// One loop iteration: sweep with `now`, wait up to `timeout`, then
    /// dispatch the whole batch before returning. Returns the batch size.
    pub fn turn_at(&mut self, now: Instant, timeout: Option<Duration>) -> io::Result<usize> {
        self.sweeper.tick(&mut self.reactor, now);
        self.reactor.wait(timeout, &mut self.batch)?;

        let now = Instant::now();
        for event in &self.batch {
            self.reactor.dispatch(*event, now);
        }
        Ok(self.batch.len())
    }

    /// Run until the multiplexer fails, then release every socket.
    pub fn run(mut self) -> anyhow::Result<()> {
        loop {
            if let Err(e) = self.turn(None) {
                error!(error = %e, "Wait failed, shutting down");
                break;
            }
        }

        self.shutdown();
        Ok(())
    }

    fn shutdown(self) {
        info!(
            live = self.reactor.table().occupied(),
            "Closing listener and connections"
        );
        // Dropping the reactor closes every slot socket and the poll handle.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{Read, Write};
    use std::net::TcpStream;

    fn test_config(max_connections: usize) -> Config {
        Config {
            listen_addr: "127.0.0.1:0".to_string(),
            max_connections,
            ..Config::default()
        }
    }

    #[test]
    fn fatal_wait_stops_loop_and_releases_sockets() {
        let mut server = Server::bind(&test_config(4)).unwrap();
        let addr = server.local_addr();

        let mut client = TcpStream::connect(addr).unwrap();
        for _ in 0..10 {
            server.turn(Some(Duration::from_millis(50))).unwrap();
            if server.reactor().table().occupied() == 1 {
                break;
            }
        }
        assert_eq!(server.reactor().table().occupied(), 1);

        server.reactor.poller.fail_next_wait(io::ErrorKind::Other);
        server.run().unwrap();

        // The accepted stream was closed on shutdown.
        client
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let mut buf = [0u8; 8];
        let n = client.read(&mut buf).unwrap_or(0);
        assert_eq!(n, 0);

        // And the listener with it.
        assert!(TcpStream::connect(addr).is_err());
    }

    #[test]
    fn batch_is_fully_dispatched_within_one_turn() {
        let mut server = Server::bind(&test_config(4)).unwrap();
        let addr = server.local_addr();

        let mut a = TcpStream::connect(addr).unwrap();
        let mut b = TcpStream::connect(addr).unwrap();
        for _ in 0..10 {
            server.turn(Some(Duration::from_millis(50))).unwrap();
            if server.reactor().table().occupied() == 2 {
                break;
            }
        }

        a.write_all(b"a").unwrap();
        b.write_all(b"b").unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let n = server.turn(Some(Duration::from_millis(500))).unwrap();
        assert_eq!(n, 2);

        let writing = server
            .reactor()
            .table()
            .iter()
            .filter(|slot| slot.state() == crate::reactor::SlotState::Writing)
            .count();
        assert_eq!(writing, 2);
    }
}
