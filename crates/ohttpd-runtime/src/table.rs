//! Fixed-capacity connection table indexed by descriptor.

use ohttpd_core::error::{HttpdError, Result};

use crate::connection::Connection;
use crate::token::ConnToken;

use std::cell::UnsafeCell;
use std::net::SocketAddrV4;

struct Slot(UnsafeCell<Option<Box<Connection>>>);

/// One slot per possible fd. A slot's `Connection` (and its buffers) is
/// created on first use and reused by later descriptors with the same
/// number.
pub struct ConnectionTable {
    slots: Box<[Slot]>,
}

// Safety: a slot is only reached through `&mut ConnToken` for its fd, and
// there is at most one token per registered fd (one-shot notifications).
unsafe impl Sync for ConnectionTable {}
unsafe impl Send for ConnectionTable {}

impl ConnectionTable {
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| Slot(UnsafeCell::new(None)))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { slots }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn index(&self, fd: i32) -> Option<usize> {
        let i = usize::try_from(fd).ok()?;
        (i < self.slots.len()).then_some(i)
    }

    /// Initialize the slot for a freshly accepted descriptor.
    pub fn open<'t>(
        &'t self,
        token: &'t mut ConnToken,
        peer: Option<SocketAddrV4>,
    ) -> Result<&'t mut Connection> {
        let fd = token.fd();
        let i = self.index(fd).ok_or(HttpdError::TableFull(fd))?;
        // Safety: see the Sync impl; the token is borrowed mutably for 't.
        let slot = unsafe { &mut *self.slots[i].0.get() };
        let conn = slot.get_or_insert_with(|| Box::new(Connection::new(fd, peer)));
        conn.open(fd, peer);
        Ok(&mut **conn)
    }

    /// The open connection owned by `token`, if any.
    pub fn get_mut<'t>(&'t self, token: &'t mut ConnToken) -> Option<&'t mut Connection> {
        let i = self.index(token.fd())?;
        // Safety: see the Sync impl.
        let slot = unsafe { &mut *self.slots[i].0.get() };
        slot.as_deref_mut().filter(|c| c.is_open())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_open_and_get() {
        let table = ConnectionTable::new(16);
        let mut t = ConnToken::mint(5);
        let peer = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 4000);
        table.open(&mut t, Some(peer)).unwrap();
        let conn = table.get_mut(&mut t).unwrap();
        assert_eq!(conn.fd(), 5);
        assert_eq!(conn.peer(), Some(peer));
    }

    #[test]
    fn test_released_slot_is_empty_then_reused() {
        let table = ConnectionTable::new(16);
        let mut t = ConnToken::mint(3);
        table.open(&mut t, None).unwrap();
        table.get_mut(&mut t).unwrap().release();
        assert!(table.get_mut(&mut t).is_none());

        let mut again = ConnToken::mint(3);
        assert!(table.open(&mut again, None).unwrap().is_open());
    }

    #[test]
    fn test_out_of_range() {
        let table = ConnectionTable::new(4);
        let mut t = ConnToken::mint(4);
        assert_eq!(table.open(&mut t, None).err(), Some(HttpdError::TableFull(4)));
        let mut neg = ConnToken::mint(-1);
        assert!(table.get_mut(&mut neg).is_none());
    }

    #[test]
    fn test_unused_slot() {
        let table = ConnectionTable::new(4);
        let mut t = ConnToken::mint(2);
        assert!(table.get_mut(&mut t).is_none());
    }
}
