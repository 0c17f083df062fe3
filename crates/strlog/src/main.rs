mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "strlog", version, about = "STREAMS kernel log reader")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_subcommand() {
        let cli = Cli::try_parse_from([
            "strlog",
            "run",
            "--device",
            "/dev/log",
            "--door",
            "/etc/.syslog_door",
            "--count",
            "5",
        ])
        .expect("run args should parse");

        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.count, Some(5));
                assert_eq!(args.poll_interval, "500ms");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn probe_defaults_to_well_known_door() {
        let cli = Cli::try_parse_from(["strlog", "probe"]).expect("probe args should parse");
        match cli.command {
            Command::Probe(args) => {
                if std::env::var_os("STRLOG_DOOR").is_none() {
                    assert_eq!(args.path, std::path::PathBuf::from(cmd::DEFAULT_DOOR));
                }
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_log_level() {
        let err = Cli::try_parse_from(["strlog", "--log-level", "loud", "doctor"])
            .expect_err("unknown level should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn format_flag_is_global() {
        let cli = Cli::try_parse_from(["strlog", "doctor", "--format", "json"])
            .expect("global format should parse after subcommand");
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }
}
