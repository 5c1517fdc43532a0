//! CLI argument parsing for the agent binary

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "nanolite-agent")]
#[command(version)]
#[command(about = "Endpoint telemetry agent: correlates OS tracing events into OpenTelemetry spans", long_about = None)]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "nanolite-agent.yaml")]
    pub config: PathBuf,

    /// Skip the real OTLP backend and log exported spans instead.
    #[arg(long)]
    pub dry_run: bool,

    /// Channel capacity for the single-writer dispatcher.
    #[arg(long, default_value_t = 4096)]
    pub channel_capacity: usize,

    /// How long to wait for the dispatcher to drain on shutdown, in seconds.
    #[arg(long, default_value_t = 5)]
    pub drain_timeout_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_defaults() {
        let cli = Cli::parse_from(["nanolite-agent"]);
        assert_eq!(cli.config, PathBuf::from("nanolite-agent.yaml"));
        assert!(!cli.dry_run);
        assert_eq!(cli.channel_capacity, 4096);
    }

    #[test]
    fn parses_dry_run_and_config_path() {
        let cli = Cli::parse_from(["nanolite-agent", "--config", "agent.yaml", "--dry-run"]);
        assert_eq!(cli.config, PathBuf::from("agent.yaml"));
        assert!(cli.dry_run);
    }
}
