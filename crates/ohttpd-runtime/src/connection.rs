//! Per-connection state and its read / process / write steps.
//!
//! The reactor calls [`Connection::drain_read`] and
//! [`Connection::flush_write`]; a worker calls [`Connection::process`]. All
//! three are only reachable through a `ConnToken`, so exactly one thread
//! touches a connection at a time.

use ohttpd_core::constants::READ_BUFFER_SIZE;
use ohttpd_core::cursor::ReadBuffer;
use ohttpd_core::mux::Interest;
use ohttpd_core::outcome::Outcome;
use ohttpd_core::parser::{ParseStatus, Parser};
use ohttpd_core::progress::IoProgress;
use ohttpd_core::response::{ResponseBuilder, WriteBuffer, WRITE_BUFFER_SIZE};
use ohttpd_core::{hdebug, htrace, hwarn};

use crate::mapping::MappedFile;
use crate::resolve::Resolver;

use std::io::{ErrorKind, IoSlice, Read, Write};
use std::net::SocketAddrV4;

/// Result of draining the socket into the read buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drain {
    /// Nothing new arrived.
    Pending,
    /// New bytes: hand the connection to the parser.
    Ready,
    /// Peer closed, read error, or no room left.
    Failed,
}

/// Result of one flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flush {
    /// Socket is full; wait for writable.
    Again,
    /// Response done, connection reset for the next request.
    KeepAlive,
    /// Response done, close.
    Close,
    Failed,
}

/// What the owner does after `process`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Rearm(Interest),
    Close,
}

pub struct Connection {
    fd: i32,
    peer: Option<SocketAddrV4>,
    read_buf: ReadBuffer,
    write_buf: WriteBuffer,
    parser: Parser,
    body: Option<MappedFile>,
    progress: IoProgress,
    keep_alive: bool,
}

impl Connection {
    pub fn new(fd: i32, peer: Option<SocketAddrV4>) -> Self {
        Self {
            fd,
            peer,
            read_buf: ReadBuffer::with_capacity(READ_BUFFER_SIZE),
            write_buf: WriteBuffer::with_capacity(WRITE_BUFFER_SIZE),
            parser: Parser::new(),
            body: None,
            progress: IoProgress::default(),
            keep_alive: false,
        }
    }

    /// Reuse this slot for a freshly accepted descriptor. Buffers are kept.
    pub fn open(&mut self, fd: i32, peer: Option<SocketAddrV4>) {
        self.fd = fd;
        self.peer = peer;
        self.reset();
    }

    /// Forget the current request, keep the descriptor.
    pub fn reset(&mut self) {
        self.parser.reset();
        self.read_buf.clear();
        self.write_buf.clear();
        self.body = None;
        self.progress = IoProgress::default();
        self.keep_alive = false;
    }

    /// Mark the slot free and release the mapping. Does not close the fd.
    pub fn release(&mut self) {
        self.reset();
        self.fd = -1;
        self.peer = None;
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.fd >= 0
    }

    #[inline]
    pub fn fd(&self) -> i32 {
        self.fd
    }

    pub fn peer(&self) -> Option<SocketAddrV4> {
        self.peer
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    pub fn read_buffer(&self) -> &ReadBuffer {
        &self.read_buf
    }

    pub fn response_head(&self) -> &[u8] {
        self.write_buf.as_bytes()
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Read until the source would block.
    pub fn drain_read<R: Read>(&mut self, src: &mut R) -> Drain {
        if self.read_buf.is_full() {
            return Drain::Failed;
        }
        let mut got = 0;
        loop {
            let spare = self.read_buf.spare_mut();
            if spare.is_empty() {
                break;
            }
            match src.read(spare) {
                Ok(0) => return Drain::Failed,
                Ok(n) => {
                    self.read_buf.commit(n);
                    got += n;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    hdebug!("fd {}: read failed: {}", self.fd, e);
                    return Drain::Failed;
                }
            }
        }
        htrace!("fd {}: read {} bytes ({} buffered)", self.fd, got, self.read_buf.read_len());
        if got == 0 {
            Drain::Pending
        } else {
            Drain::Ready
        }
    }

    /// Parse what is buffered and, once the request is complete, resolve it
    /// and build the response head.
    pub fn process(&mut self, resolver: &Resolver) -> Next {
        match self.parser.parse(&mut self.read_buf) {
            ParseStatus::Incomplete => {
                if self.read_buf.is_full() {
                    hdebug!("fd {}: request exceeds {} bytes, dropping", self.fd, self.read_buf.capacity());
                    return Next::Close;
                }
                Next::Rearm(Interest::Read)
            }
            ParseStatus::Malformed => self.respond(Outcome::MalformedRequest),
            ParseStatus::Complete => {
                let outcome = match resolver.resolve(&self.parser.request().url) {
                    Ok(file) => {
                        self.body = Some(file);
                        Outcome::FileReady
                    }
                    Err(outcome) => outcome,
                };
                self.respond(outcome)
            }
        }
    }

    /// Fill the write buffer for a terminal outcome.
    pub fn respond(&mut self, outcome: Outcome) -> Next {
        self.keep_alive = self.parser.request().keep_alive;
        self.write_buf.clear();
        let file_len = self.body.as_ref().map_or(0, MappedFile::len);
        match ResponseBuilder::new(&mut self.write_buf, self.keep_alive).build(outcome, file_len) {
            Ok(status) => {
                hdebug!(
                    "fd {}: {} {} {}",
                    self.fd,
                    status.code,
                    self.parser.request().url,
                    if self.keep_alive { "keep-alive" } else { "close" }
                );
                self.progress = IoProgress::new(self.write_buf.len(), file_len);
                Next::Rearm(Interest::Write)
            }
            Err(e) => {
                hwarn!("fd {}: cannot build response for {:?}: {}", self.fd, outcome, e);
                self.body = None;
                Next::Close
            }
        }
    }

    /// Push the pending head and body out with vectored writes.
    pub fn flush_write<W: Write>(&mut self, sink: &mut W) -> Flush {
        while !self.progress.is_done() {
            let body = self.body.as_ref().map_or(&[][..], MappedFile::as_slice);
            let pending = self.progress.pending(self.write_buf.as_bytes(), body);
            let segs = pending.as_slice();
            let mut iov = [IoSlice::new(&[]); 2];
            for (slot, seg) in iov.iter_mut().zip(segs) {
                *slot = IoSlice::new(seg);
            }
            match sink.write_vectored(&iov[..segs.len()]) {
                Ok(0) => {
                    self.body = None;
                    return Flush::Failed;
                }
                Ok(n) => self.progress.advance(n),
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Flush::Again,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    hdebug!("fd {}: write failed: {}", self.fd, e);
                    self.body = None;
                    return Flush::Failed;
                }
            }
        }

        self.body = None;
        if self.keep_alive {
            self.reset();
            Flush::KeepAlive
        } else {
            Flush::Close
        }
    }
}
