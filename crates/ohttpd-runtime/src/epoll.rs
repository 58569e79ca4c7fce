//! epoll-backed [`Multiplexer`].
//!
//! Connections are registered `EPOLLONESHOT`: each notification disables
//! the descriptor until its owner calls `rearm`. The listener is registered
//! level-triggered without one-shot.

use ohttpd_core::error::{HttpdError, Result};
use ohttpd_core::mux::{Interest, Multiplexer, Readiness};
use ohttpd_core::{hdebug, hwarn};

use crate::sys::{last_errno, os_error, set_nonblocking};

use std::sync::Mutex;

const HANGUP: u32 = (libc::EPOLLRDHUP | libc::EPOLLHUP | libc::EPOLLERR) as u32;

pub struct EpollMux {
    epfd: i32,
    /// Kernel-side event array. Only the reactor waits, so the lock is
    /// never contended.
    scratch: Mutex<Vec<libc::epoll_event>>,
}

impl EpollMux {
    /// Create an epoll instance that returns at most `max_events` per wait.
    pub fn new(max_events: usize) -> Result<Self> {
        if max_events == 0 {
            return Err(HttpdError::InvalidConfig("max_events must be > 0"));
        }
        let epfd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if epfd < 0 {
            return Err(os_error());
        }
        let scratch = vec![libc::epoll_event { events: 0, u64: 0 }; max_events];
        Ok(Self {
            epfd,
            scratch: Mutex::new(scratch),
        })
    }

    fn ctl(&self, op: i32, fd: i32, events: u32) -> Result<()> {
        let mut ev = libc::epoll_event {
            events,
            u64: fd as u64,
        };
        let ret = unsafe { libc::epoll_ctl(self.epfd, op, fd, &mut ev) };
        if ret < 0 {
            return Err(os_error());
        }
        Ok(())
    }
}

fn interest_bits(interest: Interest) -> u32 {
    match interest {
        Interest::Read => libc::EPOLLIN as u32,
        Interest::Write => libc::EPOLLOUT as u32,
    }
}

impl Multiplexer for EpollMux {
    fn register(&self, fd: i32, one_shot: bool) -> Result<()> {
        set_nonblocking(fd)?;
        let mut events = (libc::EPOLLIN | libc::EPOLLRDHUP) as u32;
        if one_shot {
            events |= libc::EPOLLONESHOT as u32;
        }
        self.ctl(libc::EPOLL_CTL_ADD, fd, events)
    }

    fn rearm(&self, fd: i32, interest: Interest) -> Result<()> {
        let events =
            interest_bits(interest) | (libc::EPOLLONESHOT | libc::EPOLLRDHUP) as u32;
        self.ctl(libc::EPOLL_CTL_MOD, fd, events)
    }

    fn deregister(&self, fd: i32) -> Result<()> {
        let removed = self.ctl(libc::EPOLL_CTL_DEL, fd, 0);
        let closed = if unsafe { libc::close(fd) } < 0 {
            Err(os_error())
        } else {
            Ok(())
        };
        hdebug!("fd {} deregistered", fd);
        removed.and(closed)
    }

    fn wait(&self, events: &mut Vec<Readiness>, timeout_ms: i32) -> Result<usize> {
        events.clear();
        let mut scratch = match self.scratch.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let n = unsafe {
            libc::epoll_wait(
                self.epfd,
                scratch.as_mut_ptr(),
                scratch.len() as i32,
                timeout_ms,
            )
        };
        if n < 0 {
            let errno = last_errno();
            if errno == libc::EINTR {
                return Ok(0);
            }
            return Err(HttpdError::Os(errno));
        }
        for ev in &scratch[..n as usize] {
            // epoll_event is packed on x86_64: copy fields out.
            let bits = ev.events;
            let data = ev.u64;
            events.push(Readiness {
                fd: data as i32,
                readable: bits & libc::EPOLLIN as u32 != 0,
                writable: bits & libc::EPOLLOUT as u32 != 0,
                hangup: bits & HANGUP != 0,
            });
        }
        Ok(events.len())
    }
}

impl Drop for EpollMux {
    fn drop(&mut self) {
        if unsafe { libc::close(self.epfd) } < 0 {
            hwarn!("close(epfd {}) failed: errno {}", self.epfd, last_errno());
        }
    }
}
