//! Response head construction.
//!
//! Every terminal [`Outcome`] maps to exactly one response. The builder
//! writes the status line, the fixed header set and, for error outcomes,
//! the canned body into the connection's [`WriteBuffer`]. A `FileReady`
//! body is never copied: it goes out as the second vectored segment.

use crate::error::{HttpdError, Result};
use crate::outcome::Outcome;

use std::fmt::{self, Write as _};

pub const WRITE_BUFFER_SIZE: usize = 4096;

/// Status line and canned body for one outcome.
#[derive(Debug, PartialEq, Eq)]
pub struct Status {
    pub code: u16,
    pub reason: &'static str,
    /// Inline body; `None` for file responses.
    pub body: Option<&'static str>,
}

pub const OK: Status = Status { code: 200, reason: "OK", body: None };

pub const BAD_REQUEST: Status = Status {
    code: 400,
    reason: "Bad Request",
    body: Some("Your request has bad syntax or is inherently impossible to satisfy.\n"),
};

pub const FORBIDDEN: Status = Status {
    code: 403,
    reason: "Forbidden",
    body: Some("You do not have permission to get file from this server.\n"),
};

pub const NOT_FOUND: Status = Status {
    code: 404,
    reason: "Not Found",
    body: Some("The requested file was not found on this server.\n"),
};

pub const INTERNAL_ERROR: Status = Status {
    code: 500,
    reason: "Internal Error",
    body: Some("There was an unusual problem serving the requested file.\n"),
};

/// Fixed-capacity buffer holding the response head.
pub struct WriteBuffer {
    buf: Box<[u8]>,
    write_len: usize,
}

impl WriteBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            write_len: 0,
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.write_len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.write_len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.write_len == 0
    }

    pub fn clear(&mut self) {
        self.write_len = 0;
    }

    /// Append formatted text. All or nothing: on overflow the buffer is
    /// left as it was.
    pub fn append(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        let mark = self.write_len;
        if self.write_fmt(args).is_err() {
            self.write_len = mark;
            return Err(HttpdError::WriteBufferFull);
        }
        Ok(())
    }
}

impl fmt::Write for WriteBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.write_len + s.len();
        if end > self.buf.len() {
            return Err(fmt::Error);
        }
        self.buf[self.write_len..end].copy_from_slice(s.as_bytes());
        self.write_len = end;
        Ok(())
    }
}

/// Writes one response head into a [`WriteBuffer`].
pub struct ResponseBuilder<'a> {
    out: &'a mut WriteBuffer,
    keep_alive: bool,
}

impl<'a> ResponseBuilder<'a> {
    pub fn new(out: &'a mut WriteBuffer, keep_alive: bool) -> Self {
        Self { out, keep_alive }
    }

    /// Build the response for `outcome`.
    ///
    /// `file_len` is the mapped body length and only matters for
    /// `FileReady`. Returns the status that was written.
    pub fn build(mut self, outcome: Outcome, file_len: usize) -> Result<&'static Status> {
        match outcome {
            Outcome::Incomplete => Err(HttpdError::NotTerminal),
            Outcome::FileReady => {
                self.head(&OK, file_len)?;
                Ok(&OK)
            }
            Outcome::MalformedRequest => self.canned(&BAD_REQUEST),
            Outcome::Forbidden => self.canned(&FORBIDDEN),
            Outcome::ResourceMissing => self.canned(&NOT_FOUND),
            Outcome::ServerError => self.canned(&INTERNAL_ERROR),
        }
    }

    fn canned(&mut self, status: &'static Status) -> Result<&'static Status> {
        let body = status.body.unwrap_or("");
        self.head(status, body.len())?;
        self.out.append(format_args!("{}", body))?;
        Ok(status)
    }

    fn head(&mut self, status: &Status, content_length: usize) -> Result<()> {
        self.status_line(status)?;
        self.headers(content_length)?;
        self.blank_line()
    }

    fn status_line(&mut self, status: &Status) -> Result<()> {
        self.out.append(format_args!("HTTP/1.1 {} {}\r\n", status.code, status.reason))
    }

    fn headers(&mut self, content_length: usize) -> Result<()> {
        self.out.append(format_args!("Content-Length: {}\r\n", content_length))?;
        self.out.append(format_args!("Content-Type: text/html\r\n"))?;
        let conn = if self.keep_alive { "keep-alive" } else { "close" };
        self.out.append(format_args!("Connection: {}\r\n", conn))
    }

    fn blank_line(&mut self) -> Result<()> {
        self.out.append(format_args!("\r\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(outcome: Outcome, keep_alive: bool, file_len: usize) -> (Result<&'static Status>, String) {
        let mut wb = WriteBuffer::with_capacity(WRITE_BUFFER_SIZE);
        let r = ResponseBuilder::new(&mut wb, keep_alive).build(outcome, file_len);
        (r, String::from_utf8(wb.as_bytes().to_vec()).unwrap())
    }

    #[test]
    fn test_not_found_exact() {
        let (r, text) = render(Outcome::ResourceMissing, false, 0);
        assert_eq!(r.unwrap().code, 404);
        assert_eq!(
            text,
            "HTTP/1.1 404 Not Found\r\n\
             Content-Length: 49\r\n\
             Content-Type: text/html\r\n\
             Connection: close\r\n\
             \r\n\
             The requested file was not found on this server.\n"
        );
    }

    #[test]
    fn test_file_head_has_no_body() {
        let (r, text) = render(Outcome::FileReady, true, 1234);
        assert_eq!(r.unwrap(), &OK);
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 1234\r\n"));
        assert!(text.contains("Connection: keep-alive\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_one_status_line_per_outcome() {
        let cases = [
            (Outcome::MalformedRequest, &BAD_REQUEST),
            (Outcome::Forbidden, &FORBIDDEN),
            (Outcome::ResourceMissing, &NOT_FOUND),
            (Outcome::ServerError, &INTERNAL_ERROR),
            (Outcome::FileReady, &OK),
        ];
        for (outcome, status) in cases {
            let (r, text) = render(outcome, false, 0);
            assert_eq!(r.unwrap(), status);
            assert_eq!(text.matches("HTTP/1.1 ").count(), 1, "{:?}", outcome);
            let body = status.body.unwrap_or("");
            assert!(text.ends_with(&format!("\r\n\r\n{}", body)), "{:?}", outcome);
            assert!(text.contains(&format!("Content-Length: {}\r\n", body.len())));
        }
    }

    #[test]
    fn test_incomplete_is_not_a_response() {
        let (r, text) = render(Outcome::Incomplete, false, 0);
        assert_eq!(r, Err(HttpdError::NotTerminal));
        assert!(text.is_empty());
    }

    #[test]
    fn test_overflow_is_all_or_nothing() {
        let mut wb = WriteBuffer::with_capacity(20);
        assert!(wb.append(format_args!("0123456789")).is_ok());
        assert_eq!(
            wb.append(format_args!("{}{}", "abcdef", "ghijklmnop")),
            Err(HttpdError::WriteBufferFull)
        );
        assert_eq!(wb.as_bytes(), b"0123456789");

        let mut tiny = WriteBuffer::with_capacity(16);
        let r = ResponseBuilder::new(&mut tiny, false).build(Outcome::ServerError, 0);
        assert_eq!(r, Err(HttpdError::WriteBufferFull));
    }
}
