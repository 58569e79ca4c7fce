//! # ohttpd-core
//!
//! Protocol core of the ohttpd static file server.
//!
//! This crate makes no system calls. It holds everything about a request
//! that can be decided from bytes alone, plus the trait boundaries the Linux
//! runtime (`ohttpd-runtime`) implements.
//!
//! ## Modules
//!
//! - `cursor` - Fixed-capacity read buffer and CRLF line splitter
//! - `parser` - Request line / header / content state machine
//! - `outcome` - Terminal classification of a request
//! - `response` - Response head builder and write buffer
//! - `progress` - Per-segment vectored write progress
//! - `mux` - Readiness multiplexer trait (one-shot contract)
//! - `executor` - Task executor trait
//! - `error` - Error type
//! - `log` - Leveled stderr logging macros
//! - `env` - Environment variable helpers

pub mod cursor;
pub mod parser;
pub mod outcome;
pub mod response;
pub mod progress;
pub mod mux;
pub mod executor;
pub mod error;
pub mod log;
pub mod env;

pub use cursor::{LineStatus, ReadBuffer};
pub use parser::{Method, ParseStatus, Parser, ParserState, Request};
pub use outcome::Outcome;
pub use response::{ResponseBuilder, Status, WriteBuffer};
pub use progress::IoProgress;
pub use mux::{Interest, Multiplexer, Readiness};
pub use executor::{Executor, InlineExecutor, Task};
pub use error::{HttpdError, Result};

/// Sizing constants
pub mod constants {
    /// Per-connection read buffer. A request head plus body that does not
    /// fit is dropped.
    pub const READ_BUFFER_SIZE: usize = 4096;

    /// Per-connection buffer for the response head.
    pub const WRITE_BUFFER_SIZE: usize = crate::response::WRITE_BUFFER_SIZE;

    /// Longest filesystem path (document root + url) the resolver accepts.
    pub const MAX_PATH_LEN: usize = 200;

    /// Default connection table size (highest fd + 1).
    pub const DEFAULT_MAX_CONNECTIONS: usize = 65535;

    /// Default number of events fetched per wait.
    pub const DEFAULT_MAX_EVENTS: usize = 10000;

    /// Default listen backlog.
    pub const DEFAULT_BACKLOG: i32 = 5;
}
