//! usb-bulk-pump core
//!
//! A duplex, event-driven transfer pump that relays bytes between standard
//! input/output and a USB bulk endpoint pair. Bytes read from stdin
//! accumulate in a staging buffer and are submitted as asynchronous write
//! transfers; one read transfer is kept outstanding at all times and its
//! payloads are forwarded verbatim to stdout. A poll-based multiplexer blocks
//! on the union of the stdin descriptor and the transport's readiness set.
//!
//! The design is strictly best-effort and fail-fast: any fault terminates the
//! relay with an error naming the failing operation.

pub mod error;
pub mod logging;
pub mod multiplex;
pub mod relay;
pub mod staging;

pub use error::PumpError;
pub use relay::Pump;
pub use staging::StagingBuffer;
