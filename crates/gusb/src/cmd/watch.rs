use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use gusb_session::{connect_all_with_config, select_device};
use gusb_transport::Canceller;
use tracing::{debug, info};

use crate::cmd::WatchArgs;
use crate::exit::{
    io_error, protocol_error, CliError, CliResult, INTERNAL, INTERRUPTED, NO_DEVICE, SUCCESS,
};
use crate::output::{print_packet, OutputFormat, PacketRecord};

pub fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    let mut log = args
        .log_file
        .as_ref()
        .map(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|err| io_error(&format!("cannot open {}", path.display()), err))
        })
        .transpose()?;

    let connections = connect_all_with_config(&args.device.connect_config())
        .map_err(|err| protocol_error("discovery failed", err))?;
    let found = connections.len();

    let mut device = select_device(connections, |session| {
        session.capabilities.contains_all(&args.require)
    })
    .ok_or_else(|| {
        CliError::new(
            NO_DEVICE,
            format!(
                "no device supporting {} among {found} found",
                required_list(&args)
            ),
        )
    })?;
    let device_id = device.session().map_or(0, |s| s.device_id);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone(), device.canceller())?;

    info!(
        device_id,
        packet_id = args.packet_id,
        "watching for packets"
    );
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let packet = match device.wait_for_packet(args.packet_id) {
            Ok(packet) => packet,
            Err(err) if !running.load(Ordering::SeqCst) => {
                debug!(%err, "wait interrupted");
                break;
            }
            Err(err) => return Err(protocol_error("read failed", err)),
        };

        let record = PacketRecord::new(&packet, device_id);
        print_packet(&record, format);
        if let Some(file) = log.as_mut() {
            append_line(file, &record.to_json_line())?;
        }

        printed = printed.saturating_add(1);
        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    device
        .close()
        .map_err(|err| protocol_error("close failed", err))?;
    Ok(SUCCESS)
}

fn required_list(args: &WatchArgs) -> String {
    args.require
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn append_line(file: &mut File, line: &str) -> CliResult<()> {
    writeln!(file, "{line}")
        .and_then(|()| file.flush())
        .map_err(|err| io_error("log write failed", err))
}

/// First Ctrl-C aborts the pending read and stops the loop; a second one exits.
fn install_ctrlc_handler(running: Arc<AtomicBool>, canceller: Canceller) -> CliResult<()> {
    ctrlc::set_handler(move || {
        if !running.swap(false, Ordering::SeqCst) {
            std::process::exit(INTERRUPTED);
        }
        canceller.cancel();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
