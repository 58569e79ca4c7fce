//! Listening socket.

use ohttpd_core::error::{HttpdError, Result};

use crate::sys::{last_errno, os_error};

use std::net::{Ipv4Addr, SocketAddrV4};

/// An IPv4 TCP listener. Closed on drop.
pub struct Listener {
    fd: i32,
}

fn to_sockaddr(addr: SocketAddrV4) -> libc::sockaddr_in {
    let mut sa: libc::sockaddr_in = unsafe { std::mem::zeroed() };
    sa.sin_family = libc::AF_INET as libc::sa_family_t;
    sa.sin_addr.s_addr = u32::from(*addr.ip()).to_be();
    sa.sin_port = addr.port().to_be();
    sa
}

fn from_sockaddr(sa: &libc::sockaddr_in) -> SocketAddrV4 {
    SocketAddrV4::new(
        Ipv4Addr::from(u32::from_be(sa.sin_addr.s_addr)),
        u16::from_be(sa.sin_port),
    )
}

impl Listener {
    /// Create, set `SO_REUSEADDR`, bind, listen.
    pub fn bind(addr: SocketAddrV4, backlog: i32) -> Result<Self> {
        let fd = unsafe {
            libc::socket(libc::AF_INET, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0)
        };
        if fd < 0 {
            return Err(os_error());
        }
        // Owns fd from here on, so early returns close it.
        let listener = Self { fd };

        let opt: libc::c_int = 1;
        let ret = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_REUSEADDR,
                &opt as *const _ as *const libc::c_void,
                std::mem::size_of_val(&opt) as libc::socklen_t,
            )
        };
        if ret != 0 {
            return Err(os_error());
        }

        let sa = to_sockaddr(addr);
        let ret = unsafe {
            libc::bind(
                fd,
                &sa as *const _ as *const libc::sockaddr,
                std::mem::size_of_val(&sa) as libc::socklen_t,
            )
        };
        if ret != 0 {
            return Err(os_error());
        }

        if unsafe { libc::listen(fd, backlog) } != 0 {
            return Err(os_error());
        }
        Ok(listener)
    }

    #[inline]
    pub fn fd(&self) -> i32 {
        self.fd
    }

    /// Bound address (resolves port 0).
    pub fn local_addr(&self) -> Result<SocketAddrV4> {
        let mut sa: libc::sockaddr_in = unsafe { std::mem::zeroed() };
        let mut len = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
        let ret = unsafe {
            libc::getsockname(self.fd, &mut sa as *mut _ as *mut libc::sockaddr, &mut len)
        };
        if ret != 0 {
            return Err(os_error());
        }
        Ok(from_sockaddr(&sa))
    }

    /// Accept one pending connection. `Ok(None)` when none is waiting.
    pub fn accept(&self) -> Result<Option<(i32, SocketAddrV4)>> {
        loop {
            let mut sa: libc::sockaddr_in = unsafe { std::mem::zeroed() };
            let mut len = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
            let fd = unsafe {
                libc::accept4(
                    self.fd,
                    &mut sa as *mut _ as *mut libc::sockaddr,
                    &mut len,
                    libc::SOCK_CLOEXEC,
                )
            };
            if fd >= 0 {
                return Ok(Some((fd, from_sockaddr(&sa))));
            }
            match last_errno() {
                libc::EINTR | libc::ECONNABORTED => continue,
                // EWOULDBLOCK == EAGAIN on Linux.
                libc::EAGAIN => return Ok(None),
                errno => return Err(HttpdError::Os(errno)),
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sys::set_nonblocking;
    use std::net::TcpStream;

    #[test]
    fn test_bind_ephemeral_and_accept() {
        let l = Listener::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0), 5).unwrap();
        set_nonblocking(l.fd()).unwrap();
        let addr = l.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(*addr.ip(), Ipv4Addr::LOCALHOST);

        assert!(l.accept().unwrap().is_none());

        let client = TcpStream::connect(addr).unwrap();
        let mut accepted = None;
        for _ in 0..200 {
            if let Some(conn) = l.accept().unwrap() {
                accepted = Some(conn);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        let (fd, peer) = accepted.unwrap();
        assert_eq!(peer, match client.local_addr().unwrap() {
            std::net::SocketAddr::V4(a) => a,
            other => panic!("unexpected {:?}", other),
        });
        unsafe { libc::close(fd) };
    }

    #[test]
    fn test_bind_conflict_fails() {
        let a = Listener::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0), 5).unwrap();
        let taken = a.local_addr().unwrap();
        assert!(Listener::bind(taken, 5).is_err());
    }
}
