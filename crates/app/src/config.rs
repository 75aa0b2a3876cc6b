//! Options shared by every subcommand.

use std::path::PathBuf;

use clap::Args;

#[derive(Clone, Debug, Default)]
/// Optional telemetry knobs for tracing output.
pub struct TelemetryOptions {
    /// Write a Chrome trace JSON file capturing request and intent spans.
    pub chrome_trace_path: Option<PathBuf>,
}

/// Telemetry flags accepted by every subcommand.
#[derive(Debug, Args)]
pub struct TelemetryCliArgs {
    /// Emit Chrome trace JSON for post-mortem analysis.
    #[arg(long = "chrome-trace", value_name = "PATH")]
    pub chrome_trace: Option<PathBuf>,
}

impl From<TelemetryCliArgs> for TelemetryOptions {
    fn from(args: TelemetryCliArgs) -> Self {
        Self {
            chrome_trace_path: args.chrome_trace,
        }
    }
}
