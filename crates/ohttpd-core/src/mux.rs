//! Readiness multiplexer abstraction.
//!
//! # Implementors
//!
//! - `EpollMux` (ohttpd-runtime, Linux): epoll with `EPOLLONESHOT`.
//!
//! # One-shot contract
//!
//! A descriptor registered with `one_shot = true` reports at most one
//! notification; after that it stays silent until `rearm` is called. Whoever
//! received the notification therefore owns the connection exclusively until
//! it calls `rearm` or `deregister`. The runtime encodes this as a
//! `ConnToken` that is consumed by either call.

use crate::error::Result;

/// Interest for the next notification cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Read,
    Write,
}

/// One readiness notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness {
    pub fd: i32,
    pub readable: bool,
    pub writable: bool,
    /// Peer hung up (`RDHUP`), `HUP`, or error.
    pub hangup: bool,
}

pub trait Multiplexer: Send + Sync {
    /// Put `fd` in nonblocking mode and watch it for reads and peer hangup.
    fn register(&self, fd: i32, one_shot: bool) -> Result<()>;

    /// Re-enable a one-shot descriptor with a new interest.
    ///
    /// Must only be called by the current owner of `fd`.
    fn rearm(&self, fd: i32, interest: Interest) -> Result<()>;

    /// Stop watching `fd` and close it.
    fn deregister(&self, fd: i32) -> Result<()>;

    /// Block up to `timeout_ms` (-1 = forever) and fill `events`.
    ///
    /// `events` is cleared first. An interrupted wait returns `Ok(0)`.
    fn wait(&self, events: &mut Vec<Readiness>, timeout_ms: i32) -> Result<usize>;
}
