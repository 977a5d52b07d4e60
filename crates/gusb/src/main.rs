mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "gusb", version, about = "Garmin USB device tool")]
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

    /// Per-module log directives (e.g. `gusb_session=trace,info`); overrides --log-level.
    #[arg(long, value_name = "DIRECTIVES", env = "GUSB_LOG", global = true)]
    log_filter: Option<String>,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level, cli.log_filter.as_deref());

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
    use gusb_packet::CapabilityTag;

    use super::*;

    #[test]
    fn parses_discover_subcommand() {
        let cli = Cli::try_parse_from(["gusb", "--format", "json", "discover", "--skip-unopenable"])
            .expect("discover args should parse");

        match cli.command {
            Command::Discover(args) => assert!(args.device.skip_unopenable),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn watch_defaults_track_base_station_packets() {
        let cli = Cli::try_parse_from(["gusb", "watch"]).expect("watch args should parse");

        let Command::Watch(args) = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(args.packet_id, 3078);
        assert_eq!(args.require.len(), 1);
        assert_eq!(args.require[0].tag, CapabilityTag::Application);
        assert_eq!(args.require[0].value, 1100);
        assert!(args.count.is_none());
    }

    #[test]
    fn parses_watch_options() {
        let cli = Cli::try_parse_from([
            "gusb",
            "watch",
            "--packet-id",
            "-2",
            "--require",
            "A1100,D1100",
            "--count",
            "5",
            "--log-file",
            "track.log",
        ])
        .expect("watch args should parse");

        let Command::Watch(args) = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(args.packet_id, -2);
        assert_eq!(args.require.len(), 2);
        assert_eq!(args.count, Some(5));
        assert_eq!(
            args.log_file.as_deref(),
            Some(std::path::Path::new("track.log"))
        );
    }

    #[test]
    fn parses_log_filter() {
        let cli = Cli::try_parse_from(["gusb", "version", "--log-filter", "gusb_session=trace"])
            .expect("log filter should parse");
        assert_eq!(cli.log_filter.as_deref(), Some("gusb_session=trace"));
    }

    #[test]
    fn rejects_malformed_capability() {
        let err = Cli::try_parse_from(["gusb", "watch", "--require", "1100"])
            .expect_err("capability without tag should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn rejects_out_of_range_packet_id() {
        let err = Cli::try_parse_from(["gusb", "watch", "--packet-id", "40000"])
            .expect_err("packet id must fit i16");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
