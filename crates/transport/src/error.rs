//! Transport error types

use thiserror::Error;

/// Errors raised by the USB transport layer
///
/// All of these are fatal to the pump; there is no recoverable tier. Each
/// variant names the operation that failed so the process-level diagnostic
/// points at the right place.
#[derive(Debug, Error)]
pub enum TransportError {
    /// USB context or device-list initialization failed
    #[error("initializing USB transport: {0}")]
    Init(#[source] rusb::Error),

    /// No device on the bus matches the fixed vendor/product id
    #[error("no device matching {vendor_id:04x}:{product_id:04x} found")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    /// A session-level operation (open, detach, claim) failed
    #[error("{operation}: {source}")]
    Session {
        operation: &'static str,
        #[source]
        source: rusb::Error,
    },

    /// Submitting an asynchronous transfer failed; never retried
    #[error("submitting {operation}: {detail}")]
    Submission {
        operation: &'static str,
        detail: String,
    },

    /// The non-blocking completion-servicing call failed
    #[error("servicing transfer completions: {0}")]
    Service(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_not_found_names_ids() {
        let err = TransportError::DeviceNotFound {
            vendor_id: 0x6667,
            product_id: 0xabcd,
        };
        assert_eq!(err.to_string(), "no device matching 6667:abcd found");
    }

    #[test]
    fn test_submission_names_operation() {
        let err = TransportError::Submission {
            operation: "write transfer",
            detail: "libusb error -1".to_string(),
        };
        assert!(err.to_string().contains("write transfer"));
    }
}
