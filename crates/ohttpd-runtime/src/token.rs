//! Exclusive ownership of one registered connection.

/// Proof that the holder may touch the connection on `fd`.
///
/// Minted only inside this crate, when an accept or a one-shot notification
/// hands a descriptor to the reactor. Not `Clone`: the token moves with the
/// work (reactor to worker and back) and is consumed when the descriptor is
/// rearmed or closed. After a rearm, the next notification mints a new one.
#[derive(Debug)]
pub struct ConnToken {
    fd: i32,
}

impl ConnToken {
    #[inline]
    pub(crate) fn mint(fd: i32) -> Self {
        Self { fd }
    }

    #[inline]
    pub fn fd(&self) -> i32 {
        self.fd
    }
}
