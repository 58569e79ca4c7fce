//! Incremental HTTP/1.1 request parser.
//!
//! The main state machine walks `RequestLine -> Header -> Content`. In the
//! first two states it consumes CRLF lines from the [`ReadBuffer`]; in
//! `Content` it only waits until `content_length` bytes sit past the end of
//! the headers. All progress lives in the buffer cursor and in `Parser`, so
//! `parse` can be called again after every read and picks up where it
//! stopped. Splitting a stream at any byte boundary gives the same result as
//! feeding it whole.

use crate::cursor::{LineStatus, ReadBuffer};
use crate::htrace;

use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    RequestLine,
    Header,
    Content,
}

/// Only retrieval is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
}

/// Fields recognized while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Request {
    pub method: Method,
    /// Origin-form path, always starting with `/`.
    pub url: String,
    pub version: String,
    pub host: Option<String>,
    pub content_length: usize,
    pub keep_alive: bool,
}

/// What one `parse` call concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// Need more bytes.
    Incomplete,
    /// The request can never be valid.
    Malformed,
    /// Request line, headers and body are all present.
    Complete,
}

/// Per-line verdict of the sub-parsers.
enum Step {
    Continue,
    Done,
    Malformed,
}

pub struct Parser {
    state: ParserState,
    request: Request,
    body_start: usize,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self {
            state: ParserState::RequestLine,
            request: Request::default(),
            body_start: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> ParserState {
        self.state
    }

    #[inline]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Body bytes, valid once `parse` returned `Complete`.
    pub fn body_range(&self) -> Range<usize> {
        self.body_start..self.body_start.saturating_add(self.request.content_length)
    }

    pub fn reset(&mut self) {
        self.state = ParserState::RequestLine;
        self.request = Request::default();
        self.body_start = 0;
    }

    /// Consume as much of `buf` as possible.
    pub fn parse(&mut self, buf: &mut ReadBuffer) -> ParseStatus {
        loop {
            if self.state == ParserState::Content {
                return self.parse_content(buf);
            }

            let range = match buf.split_line() {
                LineStatus::Line(range) => range,
                LineStatus::Open => return ParseStatus::Incomplete,
                LineStatus::Bad => return ParseStatus::Malformed,
            };
            let line = buf.view(range);
            htrace!("got line: {:?}", String::from_utf8_lossy(line));

            let step = match self.state {
                ParserState::RequestLine => self.parse_request_line(line),
                ParserState::Header => self.parse_header_line(line, buf.checked_pos()),
                ParserState::Content => unreachable!("content handled above"),
            };
            match step {
                Step::Continue => continue,
                Step::Done => return ParseStatus::Complete,
                Step::Malformed => return ParseStatus::Malformed,
            }
        }
    }

    /// `GET <target> HTTP/1.1`
    fn parse_request_line(&mut self, line: &[u8]) -> Step {
        let Ok(text) = std::str::from_utf8(line) else {
            return Step::Malformed;
        };
        let mut fields = text.split([' ', '\t']).filter(|f| !f.is_empty());
        let (Some(method), Some(target), Some(version), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Step::Malformed;
        };

        if !method.eq_ignore_ascii_case("GET") {
            return Step::Malformed;
        }
        if !version.eq_ignore_ascii_case("HTTP/1.1") {
            return Step::Malformed;
        }
        let Some(path) = origin_form(target) else {
            return Step::Malformed;
        };

        self.request.method = Method::Get;
        self.request.url = path.to_string();
        self.request.version = version.to_string();
        self.state = ParserState::Header;
        Step::Continue
    }

    /// One header line, or the blank line ending the head.
    fn parse_header_line(&mut self, line: &[u8], line_end: usize) -> Step {
        if line.is_empty() {
            if self.request.content_length > 0 {
                if line_end.checked_add(self.request.content_length).is_none() {
                    return Step::Malformed;
                }
                self.state = ParserState::Content;
                self.body_start = line_end;
                return Step::Continue;
            }
            return Step::Done;
        }

        let Some(colon) = line.iter().position(|&b| b == b':') else {
            htrace!("ignoring header without colon");
            return Step::Continue;
        };
        let name = &line[..colon];
        let value = trim_ows(&line[colon + 1..]);

        if name.eq_ignore_ascii_case(b"Connection") {
            if value.eq_ignore_ascii_case(b"keep-alive") {
                self.request.keep_alive = true;
            }
        } else if name.eq_ignore_ascii_case(b"Content-Length") {
            // Digits only: `usize::from_str` would take a leading `+`.
            if value.is_empty() || !value.iter().all(u8::is_ascii_digit) {
                return Step::Malformed;
            }
            match std::str::from_utf8(value).ok().and_then(|v| v.parse::<usize>().ok()) {
                Some(n) => self.request.content_length = n,
                None => return Step::Malformed,
            }
        } else if name.eq_ignore_ascii_case(b"Host") {
            self.request.host = Some(String::from_utf8_lossy(value).into_owned());
        } else {
            htrace!("unknown header {:?}", String::from_utf8_lossy(name));
        }
        Step::Continue
    }

    fn parse_content(&mut self, buf: &mut ReadBuffer) -> ParseStatus {
        let Some(end) = self.body_start.checked_add(self.request.content_length) else {
            return ParseStatus::Malformed;
        };
        if buf.read_len() >= end {
            buf.advance(end.saturating_sub(buf.checked_pos()));
            return ParseStatus::Complete;
        }
        ParseStatus::Incomplete
    }
}

/// Reduce a request target to a path starting at `/`.
///
/// `http://host:port/a.txt` becomes `/a.txt`. An absolute target with no
/// path, or a relative target, is rejected.
pub fn origin_form(target: &str) -> Option<&str> {
    let mut path = target;
    for scheme in ["http://", "https://"] {
        let matches = target
            .get(..scheme.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(scheme));
        if matches {
            let rest = &target[scheme.len()..];
            path = &rest[rest.find('/')?..];
            break;
        }
    }
    path.starts_with('/').then_some(path)
}

fn trim_ows(mut v: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = v {
        v = rest;
    }
    while let [rest @ .., b' ' | b'\t'] = v {
        v = rest;
    }
    v
}
