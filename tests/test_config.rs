use std::io::Write;
use std::time::Duration;

use echo_reactor::config::{CONFIG_ENV, Config, LISTEN_ENV};
use echo_reactor::error::ReactorError;

#[test]
fn test_config_defaults() {
    let cfg = Config::default();

    assert_eq!(cfg.listen_addr, "0.0.0.0:12345");
    assert_eq!(cfg.backlog, 5);
    assert_eq!(cfg.max_connections, 10_000);
    assert_eq!(cfg.scan_batch, 100);
    assert_eq!(cfg.idle_timeout(), Duration::from_secs(3600));
}

#[test]
fn test_config_from_yaml() {
    let yaml = "listen_addr: 127.0.0.1:7000\nmax_connections: 64\nscan_batch: 8\nidle_timeout_secs: 5\n";
    let cfg = Config::from_yaml_str(yaml).unwrap();

    assert_eq!(cfg.listen_addr, "127.0.0.1:7000");
    assert_eq!(cfg.max_connections, 64);
    assert_eq!(cfg.scan_batch, 8);
    assert_eq!(cfg.idle_timeout(), Duration::from_secs(5));
    // Untouched fields keep their defaults.
    assert_eq!(cfg.backlog, 5);
}

#[test]
fn test_config_rejects_bad_yaml() {
    let result = Config::from_yaml_str("max_connections: lots\n");

    assert!(matches!(result, Err(ReactorError::Config(_))));
}

#[test]
fn test_config_rejects_zero_scan_batch() {
    let result = Config::from_yaml_str("scan_batch: 0\n");

    assert!(matches!(result, Err(ReactorError::Config(_))));
}

#[test]
fn test_config_with_port_keeps_host() {
    let cfg = Config::default().with_port(4000).unwrap();

    assert_eq!(cfg.listen_addr, "0.0.0.0:4000");
}

#[test]
fn test_config_invalid_listen_addr() {
    let cfg = Config {
        listen_addr: "not-an-address".to_string(),
        ..Config::default()
    };

    assert!(cfg.socket_addr().is_err());
    assert!(cfg.with_port(80).is_err());
}

#[test]
fn test_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "max_connections: 12").unwrap();
    writeln!(file, "max_events: 32").unwrap();

    let cfg = Config::from_file(file.path()).unwrap();

    assert_eq!(cfg.max_connections, 12);
    assert_eq!(cfg.max_events, 32);
}

#[test]
fn test_config_missing_file() {
    let result = Config::from_file("/nonexistent/echo-reactor.yaml");

    assert!(matches!(result, Err(ReactorError::Config(_))));
}

// Environment variables are process-wide, so every env-driven case lives in
// this one test.
#[test]
fn test_config_load_from_env() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "listen_addr: 127.0.0.1:9000").unwrap();
    writeln!(file, "scan_batch: 10").unwrap();

    unsafe {
        std::env::remove_var(LISTEN_ENV);
        std::env::remove_var(CONFIG_ENV);
    }
    let cfg = Config::load().unwrap();
    assert_eq!(cfg.listen_addr, "0.0.0.0:12345");

    unsafe {
        std::env::set_var(CONFIG_ENV, file.path());
    }
    let cfg = Config::load().unwrap();
    assert_eq!(cfg.listen_addr, "127.0.0.1:9000");
    assert_eq!(cfg.scan_batch, 10);

    // LISTEN wins over the file.
    unsafe {
        std::env::set_var(LISTEN_ENV, "0.0.0.0:3000");
    }
    let cfg = Config::load().unwrap();
    assert_eq!(cfg.listen_addr, "0.0.0.0:3000");
    assert_eq!(cfg.scan_batch, 10);

    unsafe {
        std::env::remove_var(LISTEN_ENV);
        std::env::remove_var(CONFIG_ENV);
    }
}
