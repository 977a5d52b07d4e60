use std::path::PathBuf;

use clap::{Args, Subcommand};
use gusb_packet::CapabilityDescriptor;
use gusb_session::ConnectConfig;
use gusb_transport::{DiscoveryConfig, OpenFailurePolicy};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod discover;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Find attached devices and print what each reports about itself.
    Discover(DiscoverArgs),
    /// Print packets with one id from the first matching device.
    Watch(WatchArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Discover(args) => discover::run(args, format),
        Command::Watch(args) => watch::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Options shared by commands that open devices.
#[derive(Args, Debug, Default)]
pub struct DeviceArgs {
    /// Skip devices that cannot be opened instead of failing.
    #[arg(long)]
    pub skip_unopenable: bool,
}

impl DeviceArgs {
    pub fn connect_config(&self) -> ConnectConfig {
        let on_open_failure = if self.skip_unopenable {
            OpenFailurePolicy::Skip
        } else {
            OpenFailurePolicy::Abort
        };
        ConnectConfig {
            discovery: DiscoveryConfig {
                on_open_failure,
                ..DiscoveryConfig::default()
            },
            ..ConnectConfig::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Application packet id to wait for.
    #[arg(long, default_value_t = 3078, allow_negative_numbers = true)]
    pub packet_id: i16,
    /// Capabilities the device must report (comma-separated, e.g. A1100,D1100).
    #[arg(long, value_delimiter = ',', default_value = "A1100")]
    pub require: Vec<CapabilityDescriptor>,
    /// Exit after receiving N packets.
    #[arg(long)]
    pub count: Option<usize>,
    /// Append each packet as a JSON line to this file.
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
    #[command(flatten)]
    pub device: DeviceArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_flag_selects_skip_policy() {
        let args = DeviceArgs {
            skip_unopenable: true,
        };
        assert_eq!(
            args.connect_config().discovery.on_open_failure,
            OpenFailurePolicy::Skip
        );
        let defaults = DeviceArgs::default().connect_config();
        assert_eq!(defaults.discovery.on_open_failure, OpenFailurePolicy::Abort);
    }
}
