//! USB device session
//!
//! Opens the target device by vendor/product id and prepares it for bulk
//! transfers: detaches any kernel driver from the data interface, claims it,
//! and restores both on drop.

use rusb::{Context, DeviceHandle, UsbContext};
use tracing::{debug, warn};

use crate::error::TransportError;

/// Interface carrying the bulk endpoint pair
const DATA_INTERFACE: u8 = 0;

/// An open, claimed USB device
pub struct DeviceSession {
    context: Context,
    handle: DeviceHandle<Context>,
}

impl DeviceSession {
    /// Open the device matching `vendor_id:product_id`
    ///
    /// Enumerates the bus and opens the first matching device. Fails with
    /// [`TransportError::DeviceNotFound`] when nothing on the bus matches.
    pub fn open(vendor_id: u16, product_id: u16) -> Result<Self, TransportError> {
        let context = Context::new().map_err(TransportError::Init)?;
        let devices = context.devices().map_err(TransportError::Init)?;

        let mut matched = None;
        for device in devices.iter() {
            let descriptor = match device.device_descriptor() {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    debug!(
                        "skipping device on bus {}: no descriptor: {}",
                        device.bus_number(),
                        e
                    );
                    continue;
                }
            };
            if descriptor.vendor_id() == vendor_id && descriptor.product_id() == product_id {
                matched = Some(device);
                break;
            }
        }

        let device = matched.ok_or(TransportError::DeviceNotFound {
            vendor_id,
            product_id,
        })?;
        debug!(
            "found {:04x}:{:04x} on bus {:03} address {:03}",
            vendor_id,
            product_id,
            device.bus_number(),
            device.address()
        );

        let handle = device.open().map_err(|e| TransportError::Session {
            operation: "opening device",
            source: e,
        })?;

        match handle.kernel_driver_active(DATA_INTERFACE) {
            Ok(true) => {
                debug!("detaching kernel driver from interface {}", DATA_INTERFACE);
                handle
                    .detach_kernel_driver(DATA_INTERFACE)
                    .map_err(|e| TransportError::Session {
                        operation: "detaching kernel driver",
                        source: e,
                    })?;
            }
            Ok(false) => {}
            Err(e) => {
                debug!("could not check kernel driver status: {}", e);
            }
        }

        handle
            .claim_interface(DATA_INTERFACE)
            .map_err(|e| TransportError::Session {
                operation: "claiming interface",
                source: e,
            })?;
        debug!("claimed interface {}", DATA_INTERFACE);

        Ok(Self { context, handle })
    }

    pub(crate) fn raw_context(&self) -> *mut rusb::ffi::libusb_context {
        self.context.as_raw()
    }

    pub(crate) fn raw_handle(&self) -> *mut rusb::ffi::libusb_device_handle {
        self.handle.as_raw()
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if let Err(e) = self.handle.release_interface(DATA_INTERFACE) {
            warn!("failed to release interface {}: {}", DATA_INTERFACE, e);
        }
        if let Err(e) = self.handle.attach_kernel_driver(DATA_INTERFACE) {
            debug!(
                "could not reattach kernel driver to interface {} (may not have been detached): {}",
                DATA_INTERFACE, e
            );
        }
    }
}

/// A device found during enumeration
#[derive(Debug, Clone, Copy)]
pub struct MatchedDevice {
    pub vendor_id: u16,
    pub product_id: u16,
    pub bus_number: u8,
    pub address: u8,
}

/// Enumerate the bus and return every device matching `vendor_id:product_id`
pub fn list_matching_devices(
    vendor_id: u16,
    product_id: u16,
) -> Result<Vec<MatchedDevice>, TransportError> {
    let context = Context::new().map_err(TransportError::Init)?;
    let devices = context.devices().map_err(TransportError::Init)?;

    let mut matches = Vec::new();
    for device in devices.iter() {
        let Ok(descriptor) = device.device_descriptor() else {
            continue;
        };
        if descriptor.vendor_id() == vendor_id && descriptor.product_id() == product_id {
            matches.push(MatchedDevice {
                vendor_id,
                product_id,
                bus_number: device.bus_number(),
                address: device.address(),
            });
        }
    }
    Ok(matches)
}
