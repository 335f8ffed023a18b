//! Configuration types and CLI/environment parsing for the relay broker.
//!
//! Hosting binaries may have a more detailed config and can flatten the
//! exposed [`BrokerConfig`] with `#[clap(flatten)]`.

use std::time::Duration;

use clap::Parser;

/// The configuration for the relay broker's core functionality.
///
/// Configurable via environment variables or command line arguments using `clap`.
#[derive(Parser, Debug, Clone)]
pub struct BrokerConfig {
    /// How long a session may go without a pong or inbound frame before the
    /// inactivity sweep evicts it.
    #[clap(
        long,
        env = "CLIENT_INACTIVITY_TIMEOUT_MS",
        default_value = "60000",
        value_parser = parse_millis,
    )]
    pub client_inactivity_timeout: Duration,

    /// Interval at which the lifecycle controller pings every open session.
    #[clap(
        long,
        env = "WEBSOCKET_PING_INTERVAL_MS",
        default_value = "20000",
        value_parser = parse_millis,
    )]
    pub websocket_ping_interval: Duration,

    /// Interval at which the registry sweeps for inactive sessions.
    #[clap(
        long,
        env = "CLIENT_CLEANUP_INTERVAL_MS",
        default_value = "15000",
        value_parser = parse_millis,
    )]
    pub client_cleanup_interval: Duration,

    /// How long a single REST dispatch waits for a world's reply before
    /// returning `504 Upstream Timeout`.
    #[clap(
        long,
        env = "REQUEST_TIMEOUT_MS",
        default_value = "30000",
        value_parser = parse_millis,
    )]
    pub request_timeout: Duration,

    /// Max message size the websocket connection accepts, in bytes.
    #[clap(long, env = "WS_MAX_MESSAGE_SIZE", default_value = "65536")]
    pub ws_max_message_size: usize,

    /// Interval at which the daily counter-reset job attempts to acquire its
    /// distributed lock and run.
    #[clap(
        long,
        env = "DAILY_RESET_INTERVAL",
        default_value = "1h",
        value_parser = humantime::parse_duration,
    )]
    pub daily_reset_interval: Duration,

    /// TTL of the distributed lock the daily counter-reset job holds while running.
    #[clap(
        long,
        env = "DAILY_RESET_LOCK_TTL",
        default_value = "5min",
        value_parser = humantime::parse_duration,
    )]
    pub daily_reset_lock_ttl: Duration,
}

fn parse_millis(raw: &str) -> Result<Duration, std::num::ParseIntError> {
    Ok(Duration::from_millis(raw.parse()?))
}
