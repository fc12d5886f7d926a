use anyhow::Context;
use tracing_subscriber::EnvFilter;

use echo_reactor::config::Config;
use echo_reactor::limits;
use echo_reactor::server::Server;

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .init();

    let mut cfg = Config::load()?;
    if let Some(arg) = std::env::args().nth(1) {
        let port: u16 = arg
            .parse()
            .with_context(|| format!("invalid port argument: {arg}"))?;
        cfg = cfg.with_port(port)?;
    }

    limits::ensure_nofile_limit(cfg.max_connections)
        .context("configuring RLIMIT_NOFILE")?;

    let server = Server::bind(&cfg).context("starting reactor")?;
    server.run()
}
