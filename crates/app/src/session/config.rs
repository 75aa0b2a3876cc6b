//! Configuration parsing for interactive sessions.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::Args;
use geo_core::UserKey;

use crate::config::{TelemetryCliArgs, TelemetryOptions};

const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_TIMEOUT_MS: u64 = 5_000;

#[derive(Clone, Debug)]
/// Validated settings for `geomark session`.
pub struct SessionConfig {
    /// Whose point set is edited.
    pub user: UserKey,
    /// Base URL of the points service.
    pub service_url: String,
    /// Upper bound for every request to the points service.
    pub timeout: Duration,
    pub telemetry: TelemetryOptions,
}

/// CLI arguments accepted by the `session` subcommand.
#[derive(Debug, Args)]
pub struct SessionCliArgs {
    /// User whose points are loaded and saved.
    #[arg(value_name = "USER", env = "GEOMARK_USER")]
    pub user: Option<String>,
    /// Points service base URL.
    #[arg(long = "service-url", env = "GEOMARK_SERVICE_URL", default_value = DEFAULT_SERVICE_URL)]
    pub service_url: String,
    /// Request timeout in milliseconds.
    #[arg(long = "timeout-ms", env = "GEOMARK_TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout_ms: u64,
    #[command(flatten)]
    pub telemetry: TelemetryCliArgs,
}

impl TryFrom<SessionCliArgs> for SessionConfig {
    type Error = anyhow::Error;

    fn try_from(args: SessionCliArgs) -> Result<Self> {
        let user = args
            .user
            .ok_or_else(|| anyhow!("Missing user. Provide <USER> or set GEOMARK_USER."))?;
        let user = UserKey::new(user).context("Invalid user")?;

        let service_url = args.service_url.trim().trim_end_matches('/').to_string();
        if !(service_url.starts_with("http://") || service_url.starts_with("https://")) {
            bail!("--service-url must start with http:// or https://");
        }

        if args.timeout_ms == 0 {
            bail!("--timeout-ms must be at least 1");
        }

        Ok(Self {
            user,
            service_url,
            timeout: Duration::from_millis(args.timeout_ms),
            telemetry: args.telemetry.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: SessionCliArgs,
    }

    fn parse(argv: &[&str]) -> Result<SessionConfig> {
        let cli = TestCli::try_parse_from(std::iter::once("session").chain(argv.iter().copied()))?;
        cli.args.try_into()
    }

    #[test]
    fn explicit_values_are_kept() {
        let config = parse(&[
            "ana",
            "--service-url",
            "http://points.local:8080/",
            "--timeout-ms",
            "1500",
        ])
        .unwrap();
        assert_eq!(config.user.as_str(), "ana");
        assert_eq!(config.service_url, "http://points.local:8080");
        assert_eq!(config.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn blank_user_rejected() {
        assert!(parse(&["  "]).is_err());
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = parse(&["ana", "--timeout-ms", "0"]).unwrap_err();
        assert!(err.to_string().contains("--timeout-ms"));
    }

    #[test]
    fn non_http_url_rejected() {
        assert!(parse(&["ana", "--service-url", "ftp://points"]).is_err());
    }
}
