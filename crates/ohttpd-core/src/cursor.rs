//! Fixed-capacity read buffer with a scan cursor.
//!
//! Three positions describe the buffer, always ordered
//! `line_start <= checked_pos <= read_len <= capacity`:
//!
//! - `read_len`: bytes received from the socket so far
//! - `checked_pos`: bytes the line splitter has already scanned
//! - `line_start`: first byte of the line currently being assembled
//!
//! Callers never do offset arithmetic on the raw storage. They get the
//! unfilled tail to receive into, commit what arrived, and ask for lines or
//! ranges; every accessor clamps to the filled region.

use std::ops::Range;

/// Result of one [`ReadBuffer::split_line`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineStatus {
    /// A complete line, terminator excluded.
    Line(Range<usize>),
    /// A terminator sequence that is not CRLF.
    Bad,
    /// No terminator yet; more bytes are needed.
    Open,
}

pub struct ReadBuffer {
    buf: Box<[u8]>,
    read_len: usize,
    checked_pos: usize,
    line_start: usize,
}

impl ReadBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            read_len: 0,
            checked_pos: 0,
            line_start: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn read_len(&self) -> usize {
        self.read_len
    }

    #[inline]
    pub fn checked_pos(&self) -> usize {
        self.checked_pos
    }

    #[inline]
    pub fn line_start(&self) -> usize {
        self.line_start
    }

    /// Bytes received but not yet scanned.
    #[inline]
    pub fn available(&self) -> usize {
        self.read_len - self.checked_pos
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.read_len == self.buf.len()
    }

    /// Unfilled tail, for the next receive.
    #[inline]
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.read_len..]
    }

    /// Record `n` bytes received into [`spare_mut`](Self::spare_mut).
    ///
    /// # Panics
    /// If `n` exceeds the spare capacity.
    pub fn commit(&mut self, n: usize) {
        assert!(
            n <= self.buf.len() - self.read_len,
            "commit of {} bytes overflows read buffer ({} spare)",
            n,
            self.buf.len() - self.read_len
        );
        self.read_len += n;
    }

    /// Consume `n` bytes past the cursor without line splitting, never
    /// moving past `read_len`. The next line starts after them.
    pub fn advance(&mut self, n: usize) {
        self.checked_pos = (self.checked_pos + n).min(self.read_len);
        self.line_start = self.checked_pos;
    }

    /// View `range`, clamped to the filled region.
    pub fn view(&self, range: Range<usize>) -> &[u8] {
        let end = range.end.min(self.read_len);
        let start = range.start.min(end);
        &self.buf[start..end]
    }

    /// All received bytes.
    #[inline]
    pub fn filled(&self) -> &[u8] {
        &self.buf[..self.read_len]
    }

    /// Find the next CRLF-terminated line starting at the cursor.
    ///
    /// On `Open` the cursor stops on a trailing CR (if any) so the next call,
    /// after more bytes arrive, sees the CR and its LF together. Buffer
    /// contents are never modified.
    pub fn split_line(&mut self) -> LineStatus {
        while self.checked_pos < self.read_len {
            match self.buf[self.checked_pos] {
                b'\r' => {
                    if self.checked_pos + 1 == self.read_len {
                        return LineStatus::Open;
                    }
                    if self.buf[self.checked_pos + 1] != b'\n' {
                        return LineStatus::Bad;
                    }
                    let line = self.line_start..self.checked_pos;
                    self.checked_pos += 2;
                    self.line_start = self.checked_pos;
                    return LineStatus::Line(line);
                }
                b'\n' => {
                    // Only reachable if a CR was consumed without its LF.
                    if self.checked_pos > self.line_start && self.buf[self.checked_pos - 1] == b'\r' {
                        let line = self.line_start..self.checked_pos - 1;
                        self.checked_pos += 1;
                        self.line_start = self.checked_pos;
                        return LineStatus::Line(line);
                    }
                    return LineStatus::Bad;
                }
                _ => self.checked_pos += 1,
            }
        }
        LineStatus::Open
    }

    /// Forget all received bytes. Capacity is kept.
    pub fn clear(&mut self) {
        self.read_len = 0;
        self.checked_pos = 0;
        self.line_start = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(bytes: &[u8], capacity: usize) -> ReadBuffer {
        let mut rb = ReadBuffer::with_capacity(capacity);
        rb.spare_mut()[..bytes.len()].copy_from_slice(bytes);
        rb.commit(bytes.len());
        rb
    }

    #[test]
    fn test_line_then_remainder() {
        let mut rb = filled(b"X\r\nY", 16);
        assert_eq!(rb.split_line(), LineStatus::Line(0..1));
        assert_eq!(rb.view(0..1), b"X");
        assert_eq!(rb.checked_pos(), 3);
        assert_eq!(rb.available(), 1);
        assert_eq!(rb.view(rb.checked_pos()..rb.read_len()), b"Y");
        assert_eq!(rb.split_line(), LineStatus::Open);
    }

    #[test]
    fn test_open_leaves_bytes_untouched() {
        let mut rb = filled(b"X", 16);
        assert_eq!(rb.split_line(), LineStatus::Open);
        assert_eq!(rb.filled(), b"X");
        assert_eq!(rb.line_start(), 0);
    }

    #[test]
    fn test_trailing_cr_waits_for_lf() {
        let mut rb = filled(b"GET\r", 16);
        assert_eq!(rb.split_line(), LineStatus::Open);
        assert_eq!(rb.checked_pos(), 3);

        rb.spare_mut()[0] = b'\n';
        rb.commit(1);
        assert_eq!(rb.split_line(), LineStatus::Line(0..3));
        assert_eq!(rb.checked_pos(), 5);
    }

    #[test]
    fn test_bad_terminators() {
        assert_eq!(filled(b"A\rB", 16).split_line(), LineStatus::Bad);
        assert_eq!(filled(b"A\nB", 16).split_line(), LineStatus::Bad);
        assert_eq!(filled(b"\n", 16).split_line(), LineStatus::Bad);
    }

    #[test]
    fn test_empty_line() {
        let mut rb = filled(b"\r\n", 16);
        assert_eq!(rb.split_line(), LineStatus::Line(0..0));
        assert_eq!(rb.available(), 0);
    }

    #[test]
    fn test_full_and_clear() {
        let mut rb = filled(b"abcd", 4);
        assert!(rb.is_full());
        assert!(rb.spare_mut().is_empty());
        rb.clear();
        assert_eq!(rb.read_len(), 0);
        assert_eq!(rb.spare_mut().len(), 4);
    }

    #[test]
    fn test_view_and_advance_clamp() {
        let mut rb = filled(b"hello", 8);
        assert_eq!(rb.view(3..100), b"lo");
        assert_eq!(rb.view(7..9), b"");
        rb.advance(100);
        assert_eq!(rb.checked_pos(), 5);
        assert_eq!(rb.line_start(), 5);
    }

    #[test]
    #[should_panic(expected = "overflows read buffer")]
    fn test_commit_overflow_panics() {
        let mut rb = ReadBuffer::with_capacity(2);
        rb.commit(3);
    }
}
