use gusb_session::{connect_all_with_config, DeviceConnection, DeviceSession};

use crate::cmd::DiscoverArgs;
use crate::exit::{protocol_error, CliResult, SUCCESS};
use crate::output::{print_sessions, OutputFormat};

pub fn run(args: DiscoverArgs, format: OutputFormat) -> CliResult<i32> {
    let mut connections = connect_all_with_config(&args.device.connect_config())
        .map_err(|err| protocol_error("discovery failed", err))?;

    let sessions: Vec<&DeviceSession> = connections
        .iter()
        .filter_map(DeviceConnection::session)
        .collect();
    print_sessions(&sessions, format);

    for conn in &mut connections {
        conn.close()
            .map_err(|err| protocol_error("close failed", err))?;
    }
    Ok(SUCCESS)
}
