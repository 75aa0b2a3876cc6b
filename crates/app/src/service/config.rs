//! Configuration parsing for the points service.

use std::time::Duration;

use anyhow::{Result, bail};
use clap::Args;

use crate::config::{TelemetryCliArgs, TelemetryOptions};

pub const DEFAULT_PORT: u16 = 5000;
const DEFAULT_STREAM_INTERVAL_MS: u64 = 250;

#[derive(Clone, Debug)]
/// Validated settings for `geomark serve`.
pub struct ServeConfig {
    /// Interface the listener binds to.
    pub bind: String,
    /// TCP port; `0` asks the OS for a free one.
    pub port: u16,
    /// Actix worker threads.
    pub workers: usize,
    /// Poll period of the bounds event stream.
    pub stream_interval: Duration,
    pub telemetry: TelemetryOptions,
}

/// CLI arguments accepted by the `serve` subcommand.
#[derive(Debug, Args)]
pub struct ServeCliArgs {
    /// Interface to bind.
    #[arg(long = "bind", env = "GEOMARK_BIND", default_value = "0.0.0.0")]
    pub bind: String,
    /// Port to listen on.
    #[arg(long = "port", env = "GEOMARK_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Number of HTTP worker threads.
    #[arg(long = "workers", value_name = "N")]
    pub workers: Option<usize>,
    /// How often the bounds stream checks for new revisions.
    #[arg(long = "stream-interval-ms", value_name = "MS")]
    pub stream_interval_ms: Option<u64>,
    #[command(flatten)]
    pub telemetry: TelemetryCliArgs,
}

impl TryFrom<ServeCliArgs> for ServeConfig {
    type Error = anyhow::Error;

    fn try_from(args: ServeCliArgs) -> Result<Self> {
        let bind = args.bind.trim().to_string();
        if bind.is_empty() {
            bail!("--bind must not be empty");
        }

        let workers = args.workers.unwrap_or(2);
        if workers == 0 {
            bail!("--workers must be at least 1");
        }

        let stream_interval_ms = args
            .stream_interval_ms
            .unwrap_or(DEFAULT_STREAM_INTERVAL_MS);
        if stream_interval_ms == 0 {
            bail!("--stream-interval-ms must be at least 1");
        }

        Ok(Self {
            bind,
            port: args.port,
            workers,
            stream_interval: Duration::from_millis(stream_interval_ms),
            telemetry: args.telemetry.into(),
        })
    }
}
