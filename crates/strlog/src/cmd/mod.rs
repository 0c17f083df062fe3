use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod doctor;
pub mod probe;
pub mod run;
pub mod version;

/// Door path probed when none is given.
pub const DEFAULT_DOOR: &str = "/etc/.syslog_door";

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read the STREAMS log device and print records.
    Run(RunArgs),
    /// Check whether a collector door answers at a path.
    Probe(ProbeArgs),
    /// Run local environment health checks.
    Doctor(DoctorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Probe(args) => probe::run(args, format),
        Command::Doctor(args) => doctor::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// STREAMS log device to read. Overrides the config file.
    #[arg(long, env = "STRLOG_DEVICE", value_name = "PATH")]
    pub device: Option<PathBuf>,
    /// Attach a door at this path once running. Overrides the config file.
    #[arg(long, env = "STRLOG_DOOR", value_name = "PATH")]
    pub door: Option<PathBuf>,
    /// JSON source configuration.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Source identifier attached to every record.
    #[arg(long)]
    pub id: Option<String>,
    /// Maximum record size in bytes.
    #[arg(long, value_name = "BYTES")]
    pub msg_size: Option<usize>,
    /// Exit after printing N records.
    #[arg(long)]
    pub count: Option<usize>,
    /// How long to wait for the device between shutdown checks (e.g. 500ms, 1s).
    #[arg(long, default_value = "500ms")]
    pub poll_interval: String,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Door path to probe.
    #[arg(env = "STRLOG_DOOR", default_value = DEFAULT_DOOR)]
    pub path: PathBuf,
}

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    /// Device to check instead of the default.
    #[arg(long, env = "STRLOG_DEVICE", value_name = "PATH")]
    pub device: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn parse_duration_millis() {
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
    }

    #[test]
    fn parse_duration_invalid() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration(" ").is_err());
    }
}
