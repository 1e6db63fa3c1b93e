//! Pump error taxonomy
//!
//! Every variant is fatal; the tool exists to expose device-firmware faults,
//! so nothing is masked or retried. The process exits 1 with the error's
//! message on stderr.

use thiserror::Error;
use transport::{TransferStatus, TransportError};

#[derive(Debug, Error)]
pub enum PumpError {
    /// Transport-level failure (init, device lookup, submission, service)
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A write transfer completed with fewer bytes than requested
    ///
    /// The protocol assumes whole-buffer delivery per transfer, so a short
    /// write means the byte stream is desynchronized.
    #[error("short write: device accepted {actual} of {requested} bytes")]
    ShortWrite { requested: usize, actual: usize },

    /// A transfer completed with a non-success status
    #[error("transfer on endpoint {endpoint:#04x} failed: {status:?}")]
    TransferStatus {
        endpoint: u8,
        status: TransferStatus,
    },

    /// Reading stdin or writing stdout failed
    #[error("stdio: {0}")]
    Io(#[from] std::io::Error),

    /// The descriptor set was empty: nothing left to wait for
    ///
    /// Unreachable as long as a read transfer is submitted before every wait;
    /// kept as a hard stop in case that contract is ever broken.
    #[error("deadlocked: no descriptors to wait on")]
    Deadlock,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_write_message_names_lengths() {
        let err = PumpError::ShortWrite {
            requested: 5,
            actual: 3,
        };
        assert_eq!(err.to_string(), "short write: device accepted 3 of 5 bytes");
    }

    #[test]
    fn test_transport_error_is_transparent() {
        let err = PumpError::from(TransportError::DeviceNotFound {
            vendor_id: 0x6667,
            product_id: 0xabcd,
        });
        assert!(err.to_string().contains("6667:abcd"));
    }

    #[test]
    fn test_transfer_status_message_names_endpoint() {
        let err = PumpError::TransferStatus {
            endpoint: 0x81,
            status: TransferStatus::Stall,
        };
        assert!(err.to_string().contains("0x81"));
        assert!(err.to_string().contains("Stall"));
    }
}
