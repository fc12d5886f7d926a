use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ReactorError;

/// Environment variable naming an optional YAML config file.
pub const CONFIG_ENV: &str = "ECHO_REACTOR_CONFIG";

/// Environment variable overriding the listen address.
pub const LISTEN_ENV: &str = "LISTEN";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the listening socket binds to.
    pub listen_addr: String,

    /// Accept backlog passed to `listen(2)`.
    pub backlog: i32,

    /// Number of connection slots, not counting the listener.
    pub max_connections: usize,

    /// Slots examined by the idle sweeper per loop tick.
    pub scan_batch: usize,

    /// Seconds of inactivity before a connection is closed.
    pub idle_timeout_secs: u64,

    /// Maximum readiness events returned by one wait.
    pub max_events: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:12345".to_string(),
            backlog: 5,
            max_connections: 10_000,
            scan_batch: 100,
            idle_timeout_secs: 3600,
            max_events: 10_000,
        }
    }
}

impl Config {
    /// Defaults, then the YAML file named by `ECHO_REACTOR_CONFIG`, then `LISTEN`.
    pub fn load() -> Result<Self, ReactorError> {
        let mut cfg = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };

        if let Ok(addr) = std::env::var(LISTEN_ENV) {
            cfg.listen_addr = addr;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ReactorError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ReactorError::Config(format!("reading {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ReactorError> {
        let cfg: Config =
            serde_yaml::from_str(text).map_err(|e| ReactorError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Replace the port of `listen_addr`, keeping its host.
    pub fn with_port(mut self, port: u16) -> Result<Self, ReactorError> {
        let mut addr = self.socket_addr()?;
        addr.set_port(port);
        self.listen_addr = addr.to_string();
        Ok(self)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ReactorError> {
        self.listen_addr.parse().map_err(|_| {
            ReactorError::Config(format!("invalid listen address: {}", self.listen_addr))
        })
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    fn validate(&self) -> Result<(), ReactorError> {
        if self.max_connections == 0 {
            return Err(ReactorError::Config("max_connections must be > 0".into()));
        }
        if self.scan_batch == 0 {
            return Err(ReactorError::Config("scan_batch must be > 0".into()));
        }
        if self.max_events == 0 {
            return Err(ReactorError::Config("max_events must be > 0".into()));
        }
        if self.backlog <= 0 {
            return Err(ReactorError::Config("backlog must be > 0".into()));
        }
        Ok(())
    }
}
