//! Test utilities for the transport layer
//!
//! Provides [`MockTransport`], a scriptable [`Transport`] implementation for
//! exercising the pump without hardware. Readiness is signalled through a real
//! pipe so a poll-based multiplexer genuinely blocks and wakes on it.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;

use crate::error::TransportError;
use crate::transfer::{Completion, Direction, PollSpec, Transport, TransferStatus};

/// How the mock completes submitted write transfers
#[derive(Debug, Clone, Copy)]
pub enum WriteBehavior {
    /// Complete successfully with the full requested length
    CompleteInFull,
    /// Complete successfully but report only this many bytes transferred
    Short(usize),
    /// Complete with the given non-success status
    Fail(TransferStatus),
    /// Never complete; the transfer stays in flight forever
    Ignore,
}

/// A recorded submission
#[derive(Debug, Clone)]
pub struct Submission {
    pub direction: Direction,
    pub endpoint: u8,
    pub data: Vec<u8>,
}

/// Scriptable transport double
///
/// Records every submission. Write transfers complete according to
/// [`WriteBehavior`]; read transfers complete with the next scripted payload
/// from `read_payloads`, or stay pending when none is queued. Completions are
/// delivered through [`Transport::service`] after the signal pipe reports
/// readiness, mirroring the real transport's poll-then-service discipline.
pub struct MockTransport {
    signal_rx: io::PipeReader,
    signal_tx: io::PipeWriter,
    signalled: bool,
    queue: VecDeque<Completion>,
    /// Every submission, in order
    pub submissions: Vec<Submission>,
    pub write_behavior: WriteBehavior,
    /// Payloads served to read transfers, oldest first
    pub read_payloads: VecDeque<Vec<u8>>,
    /// Fail every submission with a scripted error
    pub fail_submissions: bool,
    /// Return an empty readiness set (for deadlock fault injection)
    pub hide_readiness: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        let (signal_rx, signal_tx) = io::pipe().expect("creating signal pipe");
        Self {
            signal_rx,
            signal_tx,
            signalled: false,
            queue: VecDeque::new(),
            submissions: Vec::new(),
            write_behavior: WriteBehavior::CompleteInFull,
            read_payloads: VecDeque::new(),
            fail_submissions: false,
            hide_readiness: false,
        }
    }

    /// Submissions in the given direction, oldest first
    pub fn submissions_in(&self, direction: Direction) -> Vec<&Submission> {
        self.submissions
            .iter()
            .filter(|s| s.direction == direction)
            .collect()
    }

    fn push_completion(&mut self, completion: Completion) {
        self.queue.push_back(completion);
        if !self.signalled {
            self.signal_tx
                .write_all(&[1])
                .expect("signalling completion");
            self.signalled = true;
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn readiness(&self) -> Vec<PollSpec> {
        if self.hide_readiness {
            return Vec::new();
        }
        vec![PollSpec {
            fd: self.signal_rx.as_raw_fd(),
            events: libc::POLLIN,
        }]
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
        if self.fail_submissions {
            return Err(TransportError::Submission {
                operation,
                detail: "scripted submission failure".to_string(),
            });
        }

        let requested = buffer.len();
        self.submissions.push(Submission {
            direction,
            endpoint,
            data: buffer,
        });

        match direction {
            Direction::Out => match self.write_behavior {
                WriteBehavior::CompleteInFull => self.push_completion(Completion {
                    direction,
                    endpoint,
                    status: TransferStatus::Completed,
                    requested,
                    actual: requested,
                    data: Vec::new(),
                }),
                WriteBehavior::Short(actual) => self.push_completion(Completion {
                    direction,
                    endpoint,
                    status: TransferStatus::Completed,
                    requested,
                    actual,
                    data: Vec::new(),
                }),
                WriteBehavior::Fail(status) => self.push_completion(Completion {
                    direction,
                    endpoint,
                    status,
                    requested,
                    actual: 0,
                    data: Vec::new(),
                }),
                WriteBehavior::Ignore => {}
            },
            Direction::In => {
                if let Some(payload) = self.read_payloads.pop_front() {
                    let actual = payload.len().min(requested);
                    self.push_completion(Completion {
                        direction,
                        endpoint,
                        status: TransferStatus::Completed,
                        requested,
                        actual,
                        data: payload[..actual].to_vec(),
                    });
                }
            }
        }

        Ok(())
    }

    fn service(&mut self) -> Result<Vec<Completion>, TransportError> {
        if self.signalled {
            let mut byte = [0u8; 1];
            self.signal_rx
                .read_exact(&mut byte)
                .map_err(|e| TransportError::Service(e.to_string()))?;
            self.signalled = false;
        }
        Ok(self.queue.drain(..).collect())
    }
}
