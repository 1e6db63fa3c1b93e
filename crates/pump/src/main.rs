//! usb-bulk-pump
//!
//! Relays bytes between stdin/stdout and the bulk endpoint pair of a fixed
//! USB device. Input bytes go to the bulk-out endpoint in chunks of at most
//! the staging capacity; bytes arriving on the bulk-in endpoint are written
//! verbatim, in receipt order, to stdout. Exits 0 on clean end-of-input and 1
//! on any fault, with a diagnostic on stderr naming the failing operation.

use anyhow::{Context, Result};
use clap::Parser;
use pump::{Pump, logging::setup_logging};
use tracing::info;
use transport::{DeviceSession, LibusbTransport, list_matching_devices};

/// Vendor id of the target device
const VENDOR_ID: u16 = 0x6667;
/// Product id of the target device
const PRODUCT_ID: u16 = 0xabcd;
/// Bulk-out endpoint address
const BULK_OUT_ENDPOINT: u8 = 0x02;
/// Bulk-in endpoint address
const BULK_IN_ENDPOINT: u8 = 0x81;
/// Staging buffer capacity: the largest chunk sent per write transfer
const STAGING_CAPACITY: usize = 100;
/// Fixed size of every read transfer
const READ_TRANSFER_LEN: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "usb-bulk-pump")]
#[command(
    author,
    version,
    about = "Relay stdin/stdout through a USB bulk endpoint pair"
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// List matching USB devices and exit
    #[arg(long)]
    list_devices: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level).context("Failed to setup logging")?;

    if args.list_devices {
        return list_devices();
    }

    info!("usb-bulk-pump v{}", env!("CARGO_PKG_VERSION"));

    let session =
        DeviceSession::open(VENDOR_ID, PRODUCT_ID).context("Failed to open device")?;
    let transport = LibusbTransport::new(session);

    let mut pump = Pump::new(
        transport,
        STAGING_CAPACITY,
        READ_TRANSFER_LEN,
        BULK_OUT_ENDPOINT,
        BULK_IN_ENDPOINT,
    );
    pump.run(std::io::stdin(), std::io::stdout().lock())
        .context("Relay failed")?;

    Ok(())
}

/// List matching USB devices and exit
fn list_devices() -> Result<()> {
    let devices =
        list_matching_devices(VENDOR_ID, PRODUCT_ID).context("Failed to enumerate devices")?;

    if devices.is_empty() {
        println!("No matching USB devices found.");
    } else {
        for device in devices {
            println!(
                "{:04x}:{:04x} (bus {:03}, device {:03})",
                device.vendor_id, device.product_id, device.bus_number, device.address
            );
        }
    }

    Ok(())
}
