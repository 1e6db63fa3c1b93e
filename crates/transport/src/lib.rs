//! USB transport layer for usb-bulk-pump
//!
//! This crate provides everything the transfer pump needs from the USB side:
//! opening a device session by vendor/product id, the [`Transport`] capability
//! contract (readiness descriptors, asynchronous bulk submission, non-blocking
//! completion servicing), and its libusb-backed implementation.
//!
//! The pump itself never talks to libusb directly; it drives a [`Transport`]
//! and consumes [`Completion`] messages drained from it.

pub mod error;
pub mod libusb;
pub mod session;
pub mod test_utils;
pub mod transfer;

pub use error::TransportError;
pub use libusb::LibusbTransport;
pub use session::{DeviceSession, MatchedDevice, list_matching_devices};
pub use transfer::{Completion, Direction, PollSpec, Transport, TransferStatus};
