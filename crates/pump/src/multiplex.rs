//! Event multiplexer
//!
//! Builds the descriptor union for one pump iteration — the stdin descriptor
//! (when the staging buffer can accept bytes) plus the transport's current
//! readiness set — and blocks without timeout until any descriptor is ready.
//! An empty union means nothing could ever wake us; that is reported as a
//! deadlock instead of blocking forever.

use std::io;
use std::os::fd::BorrowedFd;

use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use tracing::trace;
use transport::PollSpec;

use crate::error::PumpError;

/// Which side(s) of the union became ready
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadySet {
    pub stdin: bool,
    pub transport: bool,
}

/// Block until stdin or the transport is ready
///
/// `stdin` is `None` when the staging buffer is locked or full and stdin must
/// not be polled. The transport descriptors are whatever the transport
/// reported for this iteration; they are never cached across iterations.
pub fn wait_ready(
    stdin: Option<BorrowedFd<'_>>,
    transport_fds: &[PollSpec],
) -> Result<ReadySet, PumpError> {
    let mut fds = Vec::with_capacity(transport_fds.len() + 1);
    let stdin_polled = stdin.is_some();
    if let Some(fd) = stdin {
        fds.push(PollFd::new(fd, PollFlags::POLLIN));
    }
    for spec in transport_fds {
        // The transport owns these descriptors; they stay open for the
        // duration of the call.
        let fd = unsafe { BorrowedFd::borrow_raw(spec.fd) };
        fds.push(PollFd::new(fd, PollFlags::from_bits_truncate(spec.events)));
    }

    if fds.is_empty() {
        return Err(PumpError::Deadlock);
    }

    let n = poll(&mut fds, PollTimeout::NONE).map_err(io::Error::from)?;
    trace!("poll woke with {} ready of {} descriptors", n, fds.len());

    let mut ready = ReadySet::default();
    let mut iter = fds.iter();
    if stdin_polled {
        ready.stdin = iter
            .next()
            .and_then(|fd| fd.revents())
            .is_some_and(|r| !r.is_empty());
    }
    ready.transport = iter
        .any(|fd| fd.revents().is_some_and(|r| !r.is_empty()));

    Ok(ready)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::fd::{AsFd, AsRawFd};

    #[test]
    fn test_empty_union_is_deadlock() {
        let result = wait_ready(None, &[]);
        assert!(matches!(result, Err(PumpError::Deadlock)));
    }

    #[test]
    fn test_transport_readiness_reported() {
        let (reader, mut writer) = std::io::pipe().unwrap();
        writer.write_all(&[1]).unwrap();

        let specs = [PollSpec {
            fd: reader.as_raw_fd(),
            events: PollFlags::POLLIN.bits(),
        }];
        let ready = wait_ready(None, &specs).unwrap();
        assert!(!ready.stdin);
        assert!(ready.transport);
    }

    #[test]
    fn test_stdin_readiness_reported() {
        let (reader, mut writer) = std::io::pipe().unwrap();
        writer.write_all(b"x").unwrap();

        let (idle_reader, _idle_writer) = std::io::pipe().unwrap();
        let specs = [PollSpec {
            fd: idle_reader.as_raw_fd(),
            events: PollFlags::POLLIN.bits(),
        }];

        let ready = wait_ready(Some(reader.as_fd()), &specs).unwrap();
        assert!(ready.stdin);
        assert!(!ready.transport);
    }
}
