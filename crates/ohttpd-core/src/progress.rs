//! Per-segment progress of a two-segment vectored write.
//!
//! A response goes out as `[head, body]`. A short write may end inside
//! either segment, so progress is kept per segment: a byte count that only
//! tracked the total would re-send or skip bytes when resuming after
//! `EAGAIN`. Fully sent segments drop out of [`IoProgress::pending`].

/// Segment index of the response head (status line + headers + inline body).
pub const HEAD: usize = 0;
/// Segment index of the mapped file body.
pub const BODY: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IoProgress {
    len: [usize; 2],
    sent: [usize; 2],
}

/// Unsent tails of the segments, in order, empty ones skipped.
pub struct Pending<'a> {
    segs: [&'a [u8]; 2],
    count: usize,
}

impl<'a> Pending<'a> {
    #[inline]
    pub fn as_slice(&self) -> &[&'a [u8]] {
        &self.segs[..self.count]
    }
}

impl IoProgress {
    pub fn new(head_len: usize, body_len: usize) -> Self {
        Self {
            len: [head_len, body_len],
            sent: [0, 0],
        }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        (self.len[HEAD] - self.sent[HEAD]) + (self.len[BODY] - self.sent[BODY])
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.remaining() == 0
    }

    #[inline]
    pub fn sent(&self, seg: usize) -> usize {
        self.sent[seg]
    }

    /// Account for `n` bytes accepted by the kernel. Head bytes go first.
    ///
    /// # Panics
    /// If `n` is more than what was pending.
    pub fn advance(&mut self, mut n: usize) {
        assert!(n <= self.remaining(), "advance past end of response");
        for seg in [HEAD, BODY] {
            let take = n.min(self.len[seg] - self.sent[seg]);
            self.sent[seg] += take;
            n -= take;
        }
    }

    /// Slice the unsent part of `head` and `body`.
    ///
    /// `head` and `body` must be the full segments this progress was
    /// created for.
    pub fn pending<'a>(&self, head: &'a [u8], body: &'a [u8]) -> Pending<'a> {
        debug_assert_eq!(head.len(), self.len[HEAD]);
        debug_assert_eq!(body.len(), self.len[BODY]);
        let mut out = Pending { segs: [&[], &[]], count: 0 };
        for (seg, bytes) in [(HEAD, head), (BODY, body)] {
            let tail = &bytes[self.sent[seg]..];
            if !tail.is_empty() {
                out.segs[out.count] = tail;
                out.count += 1;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_write_inside_head() {
        let mut p = IoProgress::new(10, 5);
        p.advance(4);
        assert_eq!(p.sent(HEAD), 4);
        assert_eq!(p.sent(BODY), 0);
        assert_eq!(p.remaining(), 11);

        let head = b"0123456789";
        let body = b"abcde";
        let pending = p.pending(head, body);
        assert_eq!(pending.as_slice(), &[&b"456789"[..], &b"abcde"[..]]);
    }

    #[test]
    fn test_head_drops_out_when_sent() {
        let mut p = IoProgress::new(3, 4);
        p.advance(5);
        let pending = p.pending(b"abc", b"wxyz");
        assert_eq!(pending.as_slice(), &[&b"yz"[..]]);
        p.advance(2);
        assert!(p.is_done());
        assert!(p.pending(b"abc", b"wxyz").as_slice().is_empty());
    }

    #[test]
    fn test_head_only_response() {
        let mut p = IoProgress::new(6, 0);
        assert_eq!(p.pending(b"abcdef", b"").as_slice().len(), 1);
        p.advance(6);
        assert!(p.is_done());
    }

    #[test]
    #[should_panic(expected = "advance past end")]
    fn test_overrun_panics() {
        let mut p = IoProgress::new(1, 1);
        p.advance(3);
    }
}
