//! # Reactor
//!
//! The reactor runs on a dedicated OS thread. Each turn it:
//! 1. Waits on the multiplexer (bounded by `wait_timeout_ms` so a shutdown
//!    request is noticed)
//! 2. Accepts every pending connection on the listener
//! 3. Drains readable sockets and submits them to the executor for parsing
//! 4. Flushes writable sockets with vectored writes
//!
//! Connections are registered one-shot, so each notification gives the
//! reactor a [`ConnToken`]. The token travels with the work and is consumed
//! by the rearm or the close that ends it.

use ohttpd_core::executor::{Executor, Task};
use ohttpd_core::error::Result;
use ohttpd_core::mux::{Interest, Multiplexer, Readiness};
use ohttpd_core::{hdebug, herror, hinfo, hwarn};

use crate::config::ServerConfig;
use crate::connection::{Drain, Flush, Next};
use crate::epoll::EpollMux;
use crate::listener::Listener;
use crate::pool::{panic_message, FixedPool};
use crate::resolve::Resolver;
use crate::sys::SocketFd;
use crate::table::ConnectionTable;
use crate::token::ConnToken;

use std::io::Write;
use std::net::SocketAddrV4;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

const BUSY: &[u8] = b"Internal server busy";

#[derive(Default)]
struct ReactorStats {
    accepted: AtomicU64,
    refused: AtomicU64,
    responses: AtomicU64,
    closed: AtomicU64,
    inline_tasks: AtomicU64,
}

/// Point-in-time copy of the reactor counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub accepted: u64,
    /// Turned away at accept time (table full).
    pub refused: u64,
    /// Responses fully written.
    pub responses: u64,
    pub closed: u64,
    /// Tasks run on the reactor because the executor was full.
    pub inline_tasks: u64,
}

impl ReactorStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            refused: self.refused.load(Ordering::Relaxed),
            responses: self.responses.load(Ordering::Relaxed),
            closed: self.closed.load(Ordering::Relaxed),
            inline_tasks: self.inline_tasks.load(Ordering::Relaxed),
        }
    }

    fn print(&self) {
        let s = self.snapshot();
        hinfo!(
            "stats: accepted={} refused={} responses={} closed={} inline={}",
            s.accepted,
            s.refused,
            s.responses,
            s.closed,
            s.inline_tasks
        );
    }
}

/// Everything the reactor and the workers share. Built once per server.
pub struct ReactorState {
    mux: Box<dyn Multiplexer>,
    table: ConnectionTable,
    resolver: Resolver,
    executor: Box<dyn Executor>,
    /// Open connections.
    users: AtomicUsize,
    max_connections: usize,
    shutdown: AtomicBool,
    stats: ReactorStats,
}

impl ReactorState {
    pub fn users(&self) -> usize {
        self.users.load(Ordering::SeqCst)
    }

    fn accept_all(&self, listener: &Listener) {
        loop {
            match listener.accept() {
                Ok(Some((fd, peer))) => self.admit(fd, peer),
                Ok(None) => break,
                Err(e) => {
                    hwarn!("accept failed: {}", e);
                    break;
                }
            }
        }
    }

    fn admit(&self, fd: i32, peer: SocketAddrV4) {
        let in_range = usize::try_from(fd).map_or(false, |i| i < self.table.capacity());
        if !in_range || self.users() >= self.max_connections {
            hdebug!("refusing {} on fd {}: server busy", peer, fd);
            ReactorStats::bump(&self.stats.refused);
            let _ = SocketFd(fd).write(BUSY);
            unsafe { libc::close(fd) };
            return;
        }

        let mut token = ConnToken::mint(fd);
        if let Err(e) = self.table.open(&mut token, Some(peer)) {
            hwarn!("cannot open slot for fd {}: {}", fd, e);
            ReactorStats::bump(&self.stats.refused);
            unsafe { libc::close(fd) };
            return;
        }
        self.users.fetch_add(1, Ordering::SeqCst);
        ReactorStats::bump(&self.stats.accepted);

        if let Err(e) = self.mux.register(fd, true) {
            hwarn!("register fd {} failed: {}", fd, e);
            self.close(token);
            return;
        }
        hdebug!("accepted {} on fd {}", peer, fd);
        // Ownership now sits with the multiplexer until it fires.
        drop(token);
    }

    fn on_event(self: &Arc<Self>, ev: &Readiness) {
        let token = ConnToken::mint(ev.fd);
        if ev.hangup {
            hdebug!("fd {} hung up", ev.fd);
            self.close(token);
        } else if ev.readable {
            self.on_readable(token);
        } else if ev.writable {
            self.on_writable(token);
        } else {
            self.rearm(token, Interest::Read);
        }
    }

    fn on_readable(self: &Arc<Self>, mut token: ConnToken) {
        let fd = token.fd();
        let drain = match self.table.get_mut(&mut token) {
            Some(conn) => conn.drain_read(&mut SocketFd(fd)),
            None => Drain::Failed,
        };
        match drain {
            Drain::Ready => self.dispatch(token),
            Drain::Pending => self.rearm(token, Interest::Read),
            Drain::Failed => self.close(token),
        }
    }

    fn on_writable(&self, mut token: ConnToken) {
        let fd = token.fd();
        let flush = match self.table.get_mut(&mut token) {
            Some(conn) => conn.flush_write(&mut SocketFd(fd)),
            None => Flush::Failed,
        };
        match flush {
            Flush::Again => self.rearm(token, Interest::Write),
            Flush::KeepAlive => {
                ReactorStats::bump(&self.stats.responses);
                self.rearm(token, Interest::Read);
            }
            Flush::Close => {
                ReactorStats::bump(&self.stats.responses);
                self.close(token);
            }
            Flush::Failed => self.close(token),
        }
    }

    /// Hand parsing to the executor, or run it here if it is full.
    fn dispatch(self: &Arc<Self>, token: ConnToken) {
        let state = Arc::clone(self);
        let task: Task = Box::new(move || state.process(token));
        if let Err(task) = self.executor.submit(task) {
            ReactorStats::bump(&self.stats.inline_tasks);
            task();
        }
    }

    /// Worker side: parse, resolve, build, then give the fd back.
    /// A panic while processing closes the connection.
    fn process(&self, mut token: ConnToken) {
        let fd = token.fd();
        let next = match self.table.get_mut(&mut token) {
            Some(conn) => panic::catch_unwind(AssertUnwindSafe(|| conn.process(&self.resolver)))
                .unwrap_or_else(|payload| {
                    herror!("fd {}: processing panicked: {}", fd, panic_message(&*payload));
                    Next::Close
                }),
            None => Next::Close,
        };
        match next {
            Next::Rearm(interest) => self.rearm(token, interest),
            Next::Close => self.close(token),
        }
    }

    fn rearm(&self, token: ConnToken, interest: Interest) {
        if let Err(e) = self.mux.rearm(token.fd(), interest) {
            hwarn!("rearm fd {} failed: {}", token.fd(), e);
            self.close(token);
        }
    }

    /// Release the slot, then deregister and close the fd. The slot goes
    /// first so the fd number cannot be reused while it is still in use.
    fn close(&self, mut token: ConnToken) {
        let fd = token.fd();
        if let Some(conn) = self.table.get_mut(&mut token) {
            conn.release();
            self.users.fetch_sub(1, Ordering::SeqCst);
            ReactorStats::bump(&self.stats.closed);
        }
        if let Err(e) = self.mux.deregister(fd) {
            hdebug!("deregister fd {}: {}", fd, e);
        }
    }

    /// Close whatever is still open. Only valid once no worker runs.
    fn close_all(&self) {
        for fd in 0..self.table.capacity() as i32 {
            let mut token = ConnToken::mint(fd);
            if self.table.get_mut(&mut token).is_some() {
                self.close(token);
            }
        }
    }
}

/// Handle to a running server.
pub struct Reactor {
    state: Arc<ReactorState>,
    local_addr: SocketAddrV4,
    thread: Option<thread::JoinHandle<()>>,
}

impl Reactor {
    /// Bind, spawn the worker pool and start the reactor thread.
    pub fn start(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let pool = FixedPool::new(config.workers, config.queue_depth)?;
        Self::launch(config, Box::new(pool))
    }

    /// Like [`Reactor::start`] with a caller-chosen executor.
    pub fn with_executor(config: ServerConfig, executor: Box<dyn Executor>) -> Result<Self> {
        config.validate()?;
        Self::launch(config, executor)
    }

    /// Bind and spawn the reactor thread. `config` is already validated.
    fn launch(config: ServerConfig, executor: Box<dyn Executor>) -> Result<Self> {
        if !config.doc_root.is_dir() {
            hwarn!("document root {} is not a directory", config.doc_root.display());
        }

        let listener = Listener::bind(SocketAddrV4::new(config.bind_addr, config.port), config.backlog)?;
        let local_addr = listener.local_addr()?;
        let mux = EpollMux::new(config.max_events)?;
        mux.register(listener.fd(), false)?;

        let state = Arc::new(ReactorState {
            mux: Box::new(mux),
            table: ConnectionTable::new(config.max_connections),
            resolver: Resolver::new(config.doc_root.clone()),
            executor,
            users: AtomicUsize::new(0),
            max_connections: config.max_connections,
            shutdown: AtomicBool::new(false),
            stats: ReactorStats::default(),
        });

        let shared = Arc::clone(&state);
        let timeout_ms = config.wait_timeout_ms;
        let max_events = config.max_events;
        let thread = thread::Builder::new()
            .name("ohttpd-reactor".into())
            .spawn(move || reactor_loop(shared, listener, max_events, timeout_ms))?;

        hinfo!(
            "listening on {} (root {}, {} workers)",
            local_addr,
            config.doc_root.display(),
            state.executor.total_workers()
        );
        Ok(Self {
            state,
            local_addr,
            thread: Some(thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddrV4 {
        self.local_addr
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.state.stats.snapshot()
    }

    /// Currently open connections.
    pub fn users(&self) -> usize {
        self.state.users()
    }

    /// False once the reactor thread has exited.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().map_or(false, |t| !t.is_finished())
    }

    /// Stop the reactor, join it, close every connection.
    pub fn shutdown(&mut self) {
        self.state.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn reactor_loop(state: Arc<ReactorState>, listener: Listener, max_events: usize, timeout_ms: i32) {
    let mut events: Vec<Readiness> = Vec::with_capacity(max_events);

    while !state.shutdown.load(Ordering::Acquire) {
        if let Err(e) = state.mux.wait(&mut events, timeout_ms) {
            herror!("wait failed: {}", e);
            break;
        }
        for ev in &events {
            if ev.fd == listener.fd() {
                state.accept_all(&listener);
            } else {
                state.on_event(ev);
            }
        }
    }

    state.executor.shutdown();
    state.close_all();
    state.stats.print();
    hinfo!("reactor stopped");
}
