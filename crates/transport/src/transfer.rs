//! The transport capability contract consumed by the transfer pump
//!
//! The pump drives a [`Transport`] through three operations per loop
//! iteration: query the readiness descriptor set (re-queried every time, it
//! changes as transfers are submitted and completed), submit at most one
//! transfer per direction, and drain completed transfers as [`Completion`]
//! messages from the non-blocking service call. Completions are delivered as
//! values rather than callbacks so all pump state mutation stays in the
//! control loop body.

use std::os::fd::RawFd;

use crate::error::TransportError;

/// Transfer direction relative to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host to device (bulk-out)
    Out,
    /// Device to host (bulk-in)
    In,
}

/// Final status of a completed transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// Transfer completed successfully
    Completed,
    /// Transfer failed
    Error,
    /// Transfer timed out
    TimedOut,
    /// Transfer was cancelled
    Cancelled,
    /// Endpoint stalled
    Stall,
    /// Device was disconnected
    NoDevice,
    /// Device sent more data than requested
    Overflow,
    /// Unrecognized status code from the underlying transport
    Unknown(i32),
}

/// A completed transfer, drained from [`Transport::service`]
///
/// For in transfers `data` holds exactly `actual` payload bytes; for out
/// transfers `data` is empty and `actual` is the byte count the device
/// accepted.
#[derive(Debug, Clone)]
pub struct Completion {
    pub direction: Direction,
    /// Endpoint address the transfer ran against
    pub endpoint: u8,
    pub status: TransferStatus,
    /// Length requested at submission
    pub requested: usize,
    /// Length actually transferred
    pub actual: usize,
    /// Received payload (in transfers only)
    pub data: Vec<u8>,
}

/// One descriptor the transport wants monitored for activity
#[derive(Debug, Clone, Copy)]
pub struct PollSpec {
    pub fd: RawFd,
    /// `poll(2)` event mask
    pub events: i16,
}

/// Asynchronous bulk transfer capability
pub trait Transport {
    /// Current readiness descriptor set
    ///
    /// Must be re-queried before every wait; caching it across iterations
    /// misses descriptors added or removed by submission and completion.
    fn readiness(&self) -> Vec<PollSpec>;

    /// Submit an asynchronous bulk transfer
    ///
    /// The buffer's ownership moves to the in-flight transfer until the
    /// matching [`Completion`] is drained. For in transfers the buffer length
    /// sets the requested read size.
    fn submit(
        &mut self,
        direction: Direction,
        endpoint: u8,
        buffer: Vec<u8>,
    ) -> Result<(), TransportError>;

    /// Service pending completions without blocking
    ///
    /// Safe to call once polling has indicated readiness on one of the
    /// transport's descriptors. Returns every transfer that finished since
    /// the last call, in completion order.
    fn service(&mut self) -> Result<Vec<Completion>, TransportError>;
}
