//! Thin syscall helpers shared by the runtime modules.

use ohttpd_core::error::{HttpdError, Result};

use nix::errno::Errno;
use std::io::{self, IoSlice, Read, Write};
use std::os::unix::io::RawFd;

#[inline]
pub fn last_errno() -> i32 {
    Errno::last() as i32
}

#[inline]
pub fn os_error() -> HttpdError {
    HttpdError::Os(last_errno())
}

/// Add `O_NONBLOCK`. Returns the previous flags.
pub fn set_nonblocking(fd: RawFd) -> Result<i32> {
    let old = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if old < 0 {
        return Err(os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFL, old | libc::O_NONBLOCK) } < 0 {
        return Err(os_error());
    }
    Ok(old)
}

/// Borrowed view of a connected socket as `Read` / `Write`.
///
/// Does not own the descriptor; closing stays with the multiplexer.
/// Writes use `MSG_NOSIGNAL`, so a vanished peer is an `EPIPE` error
/// rather than a signal.
pub struct SocketFd(pub RawFd);

impl Read for SocketFd {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = unsafe {
            libc::recv(self.0, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0)
        };
        if n < 0 {
            return Err(io::Error::from_raw_os_error(last_errno()));
        }
        Ok(n as usize)
    }
}

impl Write for SocketFd {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_vectored(&[IoSlice::new(buf)])
    }

    /// One `sendmsg` carrying every slice.
    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        // IoSlice is ABI-compatible with iovec on unix.
        let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
        msg.msg_iov = bufs.as_ptr() as *mut libc::iovec;
        msg.msg_iovlen = bufs.len() as _;
        let n = unsafe { libc::sendmsg(self.0, &msg, libc::MSG_NOSIGNAL) };
        if n < 0 {
            return Err(io::Error::from_raw_os_error(last_errno()));
        }
        Ok(n as usize)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::io::AsRawFd;
    use std::os::unix::net::UnixStream;

    #[test]
    fn test_vectored_send_and_recv() {
        let (a, b) = UnixStream::pair().unwrap();
        let mut tx = SocketFd(a.as_raw_fd());
        let n = tx
            .write_vectored(&[IoSlice::new(b"head:"), IoSlice::new(b"body")])
            .unwrap();
        assert_eq!(n, 9);

        let mut rx = SocketFd(b.as_raw_fd());
        let mut buf = [0u8; 16];
        let n = rx.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"head:body");
    }

    #[test]
    fn test_nonblocking_read_would_block() {
        let (_a, b) = UnixStream::pair().unwrap();
        set_nonblocking(b.as_raw_fd()).unwrap();
        let mut rx = SocketFd(b.as_raw_fd());
        let mut buf = [0u8; 4];
        let err = rx.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn test_bad_fd_is_error() {
        assert!(set_nonblocking(-1).is_err());
    }
}
