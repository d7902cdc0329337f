//! Cooperative shutdown on SIGINT/SIGTERM.
//!
//! The handlers only set a process-wide flag; the measurement loop polls
//! [`stop_requested`] between blocks and winds down on its own.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

/// Set by the signal handlers (or [`request_stop`])
static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Only touches an atomic, which is async-signal-safe.
extern "C" fn handle_stop_signal(_: libc::c_int) {
    STOP_REQUESTED.store(true, Ordering::SeqCst);
}

/// Route SIGINT and SIGTERM to the stop flag
pub fn install_stop_handlers() -> io::Result<()> {
    for signal in [libc::SIGINT, libc::SIGTERM] {
        unsafe {
            // SAFETY: handle_stop_signal is an extern "C" handler with no side
            // effects beyond flipping an atomic flag.
            let handler = handle_stop_signal as *const () as libc::sighandler_t;
            if libc::signal(signal, handler) == libc::SIG_ERR {
                return Err(io::Error::last_os_error());
            }
        }
    }
    tracing::debug!("[Shutdown] SIGINT/SIGTERM handlers installed");
    Ok(())
}

pub fn stop_requested() -> bool {
    STOP_REQUESTED.load(Ordering::SeqCst)
}

/// Ask the measurement loop to stop as if a signal had arrived
pub fn request_stop() {
    STOP_REQUESTED.store(true, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_stop_sets_flag() {
        request_stop();
        assert!(stop_requested());
        STOP_REQUESTED.store(false, Ordering::SeqCst);
    }
}
