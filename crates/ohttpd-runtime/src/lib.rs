//! # ohttpd-runtime
//!
//! Linux runtime for the ohttpd static file server.
//!
//! ## Architecture
//!
//! ```text
//! accept ──► register (one-shot) ──► readable ──► drain_read
//!                                                   │
//!                                    executor ◄─────┘
//!                                  parse/resolve/build
//!                                        │
//!            rearm readable ◄── flush_write ◄── rearm writable
//!            (keep-alive)       (vectored)
//! ```
//!
//! ## Modules
//!
//! - `reactor` - Reactor thread and shared state
//! - `epoll` - epoll multiplexer
//! - `connection` - Per-connection buffers and read/process/write steps
//! - `table` - Fixed-capacity connection table
//! - `token` - Ownership token for one connection
//! - `resolve` - Request target to file
//! - `mapping` - Memory-mapped file body
//! - `pool` - Fixed worker pool
//! - `listener` - Listening socket
//! - `config` - Server configuration

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod sys;
        pub mod epoll;
        pub mod connection;
        pub mod table;
        pub mod token;
        pub mod resolve;
        pub mod mapping;
        pub mod pool;
        pub mod listener;
        pub mod config;
        pub mod reactor;

        pub use sys::SocketFd;
        pub use epoll::EpollMux;
        pub use connection::{Connection, Drain, Flush, Next};
        pub use table::ConnectionTable;
        pub use token::ConnToken;
        pub use resolve::Resolver;
        pub use mapping::MappedFile;
        pub use pool::FixedPool;
        pub use listener::Listener;
        pub use config::ServerConfig;
        pub use reactor::{Reactor, ReactorState, StatsSnapshot};
    } else {
        compile_error!("ohttpd-runtime needs Linux (epoll, accept4)");
    }
}
