use std::fmt::Write as _;
use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use gusb_packet::{packet_name, Packet};
use gusb_session::DeviceSession;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One received packet, as printed to stdout and appended to the log file.
#[derive(Debug, Serialize)]
pub struct PacketRecord<'a> {
    pub timestamp: u64,
    pub device_id: u32,
    pub kind: String,
    pub packet_id: i16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packet_name: Option<&'static str>,
    pub payload_size: usize,
    pub payload: String,
    #[serde(skip)]
    pub raw: &'a [u8],
}

impl<'a> PacketRecord<'a> {
    pub fn new(packet: &'a Packet, device_id: u32) -> Self {
        Self {
            timestamp: now_unix_seconds(),
            device_id,
            kind: packet.kind.to_string(),
            packet_id: packet.id,
            packet_name: packet_name(packet.kind, packet.id),
            payload_size: packet.payload_size(),
            payload: hex(&packet.payload),
            raw: &packet.payload,
        }
    }

    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".into())
    }
}

pub fn print_sessions(sessions: &[&DeviceSession], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string(sessions).unwrap_or_else(|_| "[]".into());
            println!("{json}");
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "DEVICE ID",
                    "PRODUCT",
                    "VERSION",
                    "DESCRIPTION",
                    "CAPABILITIES",
                ]);
            for session in sessions {
                table.add_row(vec![
                    session.device_id.to_string(),
                    session.product_id.to_string(),
                    session.software_version.to_string(),
                    session.description.clone(),
                    capability_list(session),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for session in sessions {
                println!(
                    "{}: {} (product {}, version {})",
                    session.device_id,
                    session.description,
                    session.product_id,
                    session.software_version
                );
                println!("    {}", capability_list(session));
            }
        }
        OutputFormat::Raw => {
            for session in sessions {
                println!("{}\t{}", session.device_id, session.description);
            }
        }
    }
}

pub fn print_packet(record: &PacketRecord<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", record.to_json_line()),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DEVICE", "KIND", "ID", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    record.device_id.to_string(),
                    record.kind.clone(),
                    record.packet_id.to_string(),
                    record.payload_size.to_string(),
                    record.payload.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "device={} kind={} id={} size={} payload={}",
                record.device_id, record.kind, record.packet_id, record.payload_size, record.payload
            );
        }
        OutputFormat::Raw => print_raw(record.raw),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn capability_list(session: &DeviceSession) -> String {
    session
        .capabilities
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercase hex, two digits per byte, no separators.
pub fn hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for byte in data {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
