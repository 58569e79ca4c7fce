//! ohttpd: static file server.
//!
//! Usage:
//!     ohttpd <port>
//!
//! Files are served from `OHTTPD_DOC_ROOT` (default `./resources`). Other
//! knobs: `OHTTPD_WORKERS`, `OHTTPD_QUEUE_DEPTH`, `OHTTPD_MAX_CONNS`,
//! `OHTTPD_BACKLOG`, `OHTTPD_MAX_EVENTS`, `OHTTPD_LOG_LEVEL`.
//!
//! Benchmark:
//!     wrk -t4 -c100 -d10s http://127.0.0.1:8080/index.html

use ohttpd_core::{herror, hinfo, log};
use ohttpd_runtime::{Reactor, ServerConfig};

use nix::libc;
use nix::sys::signal::{signal, SigHandler, Signal};

use std::path::Path;
use std::process::exit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

static RUNNING: AtomicBool = AtomicBool::new(true);

extern "C" fn handle_stop(_sig: libc::c_int) {
    RUNNING.store(false, Ordering::Relaxed);
}

fn usage(argv0: &str) -> ! {
    let name = Path::new(argv0)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ohttpd".into());
    eprintln!("usage: {} port_number", name);
    exit(1);
}

fn install_signals() -> nix::Result<()> {
    unsafe {
        signal(Signal::SIGPIPE, SigHandler::SigIgn)?;
        signal(Signal::SIGINT, SigHandler::Handler(handle_stop))?;
        signal(Signal::SIGTERM, SigHandler::Handler(handle_stop))?;
    }
    Ok(())
}

fn main() {
    log::init();

    let args: Vec<String> = std::env::args().collect();
    let argv0 = args.first().map(String::as_str).unwrap_or("ohttpd");
    let port: u16 = match args.get(1).map(|p| p.parse()) {
        Some(Ok(p)) => p,
        _ => usage(argv0),
    };

    if let Err(e) = install_signals() {
        herror!("signal setup failed: {}", e);
        exit(1);
    }

    let config = ServerConfig::from_env().port(port);
    let mut reactor = match Reactor::start(config) {
        Ok(r) => r,
        Err(e) => {
            herror!("cannot start on port {}: {}", port, e);
            exit(1);
        }
    };

    while RUNNING.load(Ordering::Relaxed) && reactor.is_running() {
        std::thread::sleep(Duration::from_millis(100));
    }

    hinfo!("shutting down");
    reactor.shutdown();
}
