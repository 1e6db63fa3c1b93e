//! The transfer pump
//!
//! All mutable relay state lives in [`Pump`], owned and touched by a single
//! logical thread. Each loop iteration submits outstanding work (at most one
//! write from the staging buffer, and a read transfer whenever none is in
//! flight), blocks on the event multiplexer, drains stdin if it was ready,
//! and services transport completions. A zero-length stdin read flips the
//! pump to done and the loop exits after the current iteration; in-flight
//! transfers are not awaited.

use std::io::{Read, Write};
use std::os::fd::AsFd;

use tracing::{debug, info, trace};
use transport::{Completion, Direction, Transport, TransferStatus};

use crate::error::PumpError;
use crate::multiplex::{self, ReadySet};
use crate::staging::StagingBuffer;

pub struct Pump<T: Transport> {
    transport: T,
    staging: StagingBuffer,
    bulk_out: u8,
    bulk_in: u8,
    read_len: usize,
    read_pending: bool,
    bytes_in: u64,
    bytes_out: u64,
    done: bool,
}

impl<T: Transport> Pump<T> {
    /// Create a pump over `transport`
    ///
    /// `staging_capacity` bounds how many stdin bytes accumulate per write
    /// transfer; `read_len` is the fixed size of every read transfer.
    pub fn new(
        transport: T,
        staging_capacity: usize,
        read_len: usize,
        bulk_out: u8,
        bulk_in: u8,
    ) -> Self {
        Self {
            transport,
            staging: StagingBuffer::new(staging_capacity),
            bulk_out,
            bulk_in,
            read_len,
            read_pending: false,
            bytes_in: 0,
            bytes_out: 0,
            done: false,
        }
    }

    /// Total bytes received from the device and forwarded to `output`
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Total bytes delivered to the device
    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Relay bytes between `input`/`output` and the bulk endpoint pair
    ///
    /// Runs until `input` reaches end-of-stream or a fatal error occurs.
    pub fn run<R, W>(&mut self, mut input: R, mut output: W) -> Result<(), PumpError>
    where
        R: Read + AsFd,
        W: Write,
    {
        while !self.done {
            self.submit_transfers()?;

            let poll_stdin = !self.staging.locked() && self.staging.avail() > 0;
            let transport_fds = self.transport.readiness();
            let ready =
                multiplex::wait_ready(poll_stdin.then(|| input.as_fd()), &transport_fds)?;

            self.dispatch(ready, &mut input, &mut output)?;
        }

        info!(
            "done: {} bytes in, {} bytes out",
            self.bytes_in, self.bytes_out
        );
        Ok(())
    }

    /// Submit outstanding work before the wait
    ///
    /// At most one write and one read are ever in flight. The write carries
    /// exactly the staging buffer's current length; the staging buffer stays
    /// locked until the completion releases it, which also stops stdin from
    /// being polled and gives natural backpressure.
    fn submit_transfers(&mut self) -> Result<(), PumpError> {
        if !self.staging.locked() && !self.staging.is_empty() {
            let payload = self.staging.contents().to_vec();
            debug!(
                "submitting write of {} bytes to endpoint {:#04x}",
                payload.len(),
                self.bulk_out
            );
            self.transport
                .submit(Direction::Out, self.bulk_out, payload)?;
            self.staging.lock();
        }

        if !self.read_pending {
            trace!(
                "submitting {}-byte read on endpoint {:#04x}",
                self.read_len, self.bulk_in
            );
            self.transport
                .submit(Direction::In, self.bulk_in, vec![0; self.read_len])?;
            self.read_pending = true;
        }

        Ok(())
    }

    fn dispatch<R, W>(
        &mut self,
        ready: ReadySet,
        input: &mut R,
        output: &mut W,
    ) -> Result<(), PumpError>
    where
        R: Read,
        W: Write,
    {
        if ready.stdin {
            let n = self.staging.fill_from(input)?;
            if n == 0 {
                debug!("end of input");
                self.done = true;
            } else {
                trace!("staged {} bytes from stdin", n);
            }
        }

        if ready.transport {
            for completion in self.transport.service()? {
                self.handle_completion(completion, output)?;
            }
        }

        Ok(())
    }

    fn handle_completion<W: Write>(
        &mut self,
        completion: Completion,
        output: &mut W,
    ) -> Result<(), PumpError> {
        if completion.status != TransferStatus::Completed {
            return Err(PumpError::TransferStatus {
                endpoint: completion.endpoint,
                status: completion.status,
            });
        }

        match completion.direction {
            Direction::Out => {
                if completion.actual != completion.requested {
                    return Err(PumpError::ShortWrite {
                        requested: completion.requested,
                        actual: completion.actual,
                    });
                }
                self.staging.clear_and_unlock();
                self.bytes_out += completion.actual as u64;
                trace!("write of {} bytes completed", completion.actual);
            }
            Direction::In => {
                output.write_all(&completion.data)?;
                output.flush()?;
                self.bytes_in += completion.data.len() as u64;
                self.read_pending = false;
                trace!("read of {} bytes completed", completion.data.len());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use transport::test_utils::MockTransport;

    fn test_pump(mock: MockTransport) -> Pump<MockTransport> {
        Pump::new(mock, 100, 64, 0x02, 0x81)
    }

    fn stage(pump: &mut Pump<MockTransport>, bytes: &[u8]) {
        pump.staging
            .fill_from(&mut Cursor::new(bytes.to_vec()))
            .unwrap();
    }

    #[test]
    fn test_read_always_submitted_first_iteration() {
        let mut pump = test_pump(MockTransport::new());
        pump.submit_transfers().unwrap();

        let subs = &pump.transport.submissions;
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].direction, Direction::In);
        assert_eq!(subs[0].endpoint, 0x81);
        assert_eq!(subs[0].data.len(), 64);
        assert!(pump.read_pending);
    }

    #[test]
    fn test_write_submitted_with_exact_staged_length() {
        let mut pump = test_pump(MockTransport::new());
        stage(&mut pump, b"hello");

        pump.submit_transfers().unwrap();

        let writes = pump.transport.submissions_in(Direction::Out);
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].endpoint, 0x02);
        assert_eq!(writes[0].data, b"hello");
        assert!(pump.staging.locked());
    }

    #[test]
    fn test_no_resubmission_while_in_flight() {
        let mut mock = MockTransport::new();
        mock.write_behavior = transport::test_utils::WriteBehavior::Ignore;
        let mut pump = test_pump(mock);
        stage(&mut pump, b"hello");

        pump.submit_transfers().unwrap();
        let submitted = pump.transport.submissions.len();

        // Locked write and pending read: nothing new may go out.
        pump.submit_transfers().unwrap();
        assert_eq!(pump.transport.submissions.len(), submitted);
    }

    #[test]
    fn test_write_completion_releases_staging() {
        let mut pump = test_pump(MockTransport::new());
        stage(&mut pump, b"hello");
        pump.staging.lock();

        let completion = Completion {
            direction: Direction::Out,
            endpoint: 0x02,
            status: TransferStatus::Completed,
            requested: 5,
            actual: 5,
            data: Vec::new(),
        };
        pump.handle_completion(completion, &mut Vec::new()).unwrap();

        assert!(!pump.staging.locked());
        assert!(pump.staging.is_empty());
        assert_eq!(pump.bytes_out(), 5);
    }

    #[test]
    fn test_short_write_is_fatal() {
        let mut pump = test_pump(MockTransport::new());
        let completion = Completion {
            direction: Direction::Out,
            endpoint: 0x02,
            status: TransferStatus::Completed,
            requested: 5,
            actual: 3,
            data: Vec::new(),
        };
        let err = pump
            .handle_completion(completion, &mut Vec::new())
            .unwrap_err();
        assert!(matches!(
            err,
            PumpError::ShortWrite {
                requested: 5,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_failed_status_is_fatal() {
        let mut pump = test_pump(MockTransport::new());
        let completion = Completion {
            direction: Direction::In,
            endpoint: 0x81,
            status: TransferStatus::Stall,
            requested: 64,
            actual: 0,
            data: Vec::new(),
        };
        let err = pump
            .handle_completion(completion, &mut Vec::new())
            .unwrap_err();
        assert!(matches!(
            err,
            PumpError::TransferStatus {
                endpoint: 0x81,
                status: TransferStatus::Stall
            }
        ));
    }

    #[test]
    fn test_read_completion_forwards_and_rearms() {
        let mut pump = test_pump(MockTransport::new());
        pump.read_pending = true;

        let payload: Vec<u8> = (0..64).collect();
        let completion = Completion {
            direction: Direction::In,
            endpoint: 0x81,
            status: TransferStatus::Completed,
            requested: 64,
            actual: 64,
            data: payload.clone(),
        };

        let mut output = Vec::new();
        pump.handle_completion(completion, &mut output).unwrap();

        assert_eq!(output, payload);
        assert_eq!(pump.bytes_in(), 64);
        assert!(!pump.read_pending);
    }
}
