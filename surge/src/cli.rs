use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Scenario file grammar: humantime (`250ms`, `1m30s`); bare numbers are seconds.
fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        return s
            .parse()
            .map(Duration::from_secs)
            .map_err(|_| format!("duration '{s}' is too large"));
    }

    humantime::parse_duration(s).map_err(|err| {
        format!("invalid duration '{s}' (expected e.g. 10s, 250ms, 1m30s): {err}")
    })
}

fn parse_positive_duration(input: &str) -> Result<Duration, String> {
    let d = parse_duration(input)?;
    if d.is_zero() {
        return Err(format!("duration '{}' must be positive", input.trim()));
    }
    Ok(d)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Progress bar plus a text summary.
    HumanReadable,
    /// Emit JSON progress lines (NDJSON) to stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "surge",
    author,
    version,
    about = "HTTP load driver with staged and constant-arrival-rate profiles",
    long_about = "surge drives HTTP load against a target host.\n\n\
        A scenario file (YAML) declares the traffic profile (ramping `stages`, or \
        `executor: constant-arrival-rate`), the request each iteration sends and the named \
        checks evaluated against every response.",
    after_help = "Examples:\n  \
        surge run scenarios/get-user.yaml --host 127.0.0.1\n  \
        HOST=api.internal surge run scenarios/post-user.yaml --output json\n  \
        surge validate scenarios/post-user.yaml"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a scenario file against a target host
    Run(RunArgs),

    /// Parse and validate a scenario file without sending any traffic
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to the scenario (.yaml)
    pub scenario: PathBuf,

    /// Target host (`name`, `name:port` or a full `http(s)://` base)
    #[arg(long, env = "HOST")]
    pub host: String,

    /// Per-request timeout (e.g. 10s, 250ms, 1m)
    #[arg(long, value_parser = parse_positive_duration, default_value = "60s")]
    pub timeout: Duration,

    /// How often staged profiles re-evaluate the worker count
    #[arg(long, value_parser = parse_positive_duration, default_value = "1s")]
    pub control_interval: Duration,

    /// How long to wait for in-flight iterations once the profile ends
    #[arg(long, value_parser = parse_duration, default_value = "30s")]
    pub grace_period: Duration,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,

    /// Debug logging (overridden by SURGE_LOG / RUST_LOG)
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Path to the scenario (.yaml)
    pub scenario: PathBuf,
}
