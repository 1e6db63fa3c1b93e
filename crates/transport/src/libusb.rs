//! libusb-backed asynchronous transport
//!
//! Implements [`Transport`] over libusb's asynchronous transfer API via
//! `rusb::ffi`. Each submitted transfer owns an in-flight record (the data
//! buffer plus routing information) handed to libusb through `user_data`; the
//! completion callback reclaims the record, converts the raw transfer into a
//! [`Completion`] message, and queues it for the next [`service`] drain.
//!
//! Everything runs on the single control thread: callbacks fire synchronously
//! from inside `libusb_handle_events_timeout_completed`, which is only called
//! with a zero timeout once polling has indicated readiness.
//!
//! [`service`]: Transport::service

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::c_void;
use std::ptr;
use std::rc::Rc;

use rusb::constants::{
    LIBUSB_TRANSFER_CANCELLED, LIBUSB_TRANSFER_COMPLETED, LIBUSB_TRANSFER_ERROR,
    LIBUSB_TRANSFER_NO_DEVICE, LIBUSB_TRANSFER_OVERFLOW, LIBUSB_TRANSFER_STALL,
    LIBUSB_TRANSFER_TIMED_OUT, LIBUSB_TRANSFER_TYPE_BULK,
};
use rusb::ffi;
use tracing::trace;

use crate::error::TransportError;
use crate::session::DeviceSession;
use crate::transfer::{Completion, Direction, PollSpec, Transport, TransferStatus};

type CompletionQueue = Rc<RefCell<VecDeque<Completion>>>;

/// Asynchronous bulk transport over an open device session
pub struct LibusbTransport {
    session: DeviceSession,
    completions: CompletionQueue,
}

/// State owned by one submitted transfer until its callback runs
struct InFlight {
    queue: CompletionQueue,
    direction: Direction,
    endpoint: u8,
    requested: usize,
    buffer: Vec<u8>,
}

impl LibusbTransport {
    pub fn new(session: DeviceSession) -> Self {
        Self {
            session,
            completions: Rc::new(RefCell::new(VecDeque::new())),
        }
    }
}

impl Transport for LibusbTransport {
    fn readiness(&self) -> Vec<PollSpec> {
        let mut specs = Vec::new();
        unsafe {
            let list = ffi::libusb_get_pollfds(self.session.raw_context());
            if list.is_null() {
                return specs;
            }
            let mut i = 0;
            loop {
                let pollfd = *list.add(i);
                if pollfd.is_null() {
                    break;
                }
                specs.push(PollSpec {
                    fd: (*pollfd).fd,
                    events: (*pollfd).events,
                });
                i += 1;
            }
            ffi::libusb_free_pollfds(list);
        }
        specs
    }

    fn submit(
        &mut self,
        direction: Direction,
        endpoint: u8,
        buffer: Vec<u8>,
    ) -> Result<(), TransportError> {
        let operation = match direction {
            Direction::Out => "write transfer",
            Direction::In => "read transfer",
        };

        let mut inflight = Box::new(InFlight {
            queue: Rc::clone(&self.completions),
            direction,
            endpoint,
            requested: buffer.len(),
            buffer,
        });
        let length = inflight.buffer.len() as i32;
        let buffer_ptr = inflight.buffer.as_mut_ptr();

        unsafe {
            let transfer = ffi::libusb_alloc_transfer(0);
            if transfer.is_null() {
                return Err(TransportError::Submission {
                    operation,
                    detail: "out of memory allocating transfer".to_string(),
                });
            }

            (*transfer).dev_handle = self.session.raw_handle();
            (*transfer).endpoint = endpoint;
            (*transfer).transfer_type = LIBUSB_TRANSFER_TYPE_BULK;
            (*transfer).timeout = 0;
            (*transfer).length = length;
            (*transfer).buffer = buffer_ptr;
            (*transfer).callback = on_transfer_done;
            (*transfer).user_data = Box::into_raw(inflight) as *mut c_void;

            let rc = ffi::libusb_submit_transfer(transfer);
            if rc != 0 {
                // Reclaim the record ourselves; the callback will never run.
                drop(Box::from_raw((*transfer).user_data as *mut InFlight));
                ffi::libusb_free_transfer(transfer);
                return Err(TransportError::Submission {
                    operation,
                    detail: format!("libusb error {rc}"),
                });
            }
        }

        trace!(
            "submitted {} of {} bytes on endpoint {:#04x}",
            operation, length, endpoint
        );
        Ok(())
    }

    fn service(&mut self) -> Result<Vec<Completion>, TransportError> {
        let zero = libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        let rc = unsafe {
            ffi::libusb_handle_events_timeout_completed(
                self.session.raw_context(),
                &zero,
                ptr::null_mut(),
            )
        };
        if rc != 0 {
            return Err(TransportError::Service(format!("libusb error {rc}")));
        }
        Ok(self.completions.borrow_mut().drain(..).collect())
    }
}

/// Completion callback invoked synchronously from the service call
extern "system" fn on_transfer_done(transfer: *mut ffi::libusb_transfer) {
    unsafe {
        let inflight = Box::from_raw((*transfer).user_data as *mut InFlight);
        let status = map_transfer_status((*transfer).status);
        let actual = (*transfer).actual_length.max(0) as usize;

        let data = match inflight.direction {
            Direction::In => inflight.buffer[..actual.min(inflight.buffer.len())].to_vec(),
            Direction::Out => Vec::new(),
        };

        inflight.queue.borrow_mut().push_back(Completion {
            direction: inflight.direction,
            endpoint: inflight.endpoint,
            status,
            requested: inflight.requested,
            actual,
            data,
        });

        ffi::libusb_free_transfer(transfer);
    }
}

fn map_transfer_status(status: i32) -> TransferStatus {
    match status {
        LIBUSB_TRANSFER_COMPLETED => TransferStatus::Completed,
        LIBUSB_TRANSFER_ERROR => TransferStatus::Error,
        LIBUSB_TRANSFER_TIMED_OUT => TransferStatus::TimedOut,
        LIBUSB_TRANSFER_CANCELLED => TransferStatus::Cancelled,
        LIBUSB_TRANSFER_STALL => TransferStatus::Stall,
        LIBUSB_TRANSFER_NO_DEVICE => TransferStatus::NoDevice,
        LIBUSB_TRANSFER_OVERFLOW => TransferStatus::Overflow,
        other => TransferStatus::Unknown(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_transfer_status() {
        assert_eq!(
            map_transfer_status(LIBUSB_TRANSFER_COMPLETED),
            TransferStatus::Completed
        );
        assert_eq!(
            map_transfer_status(LIBUSB_TRANSFER_STALL),
            TransferStatus::Stall
        );
        assert_eq!(
            map_transfer_status(LIBUSB_TRANSFER_NO_DEVICE),
            TransferStatus::NoDevice
        );
        assert_eq!(map_transfer_status(99), TransferStatus::Unknown(99));
    }
}
