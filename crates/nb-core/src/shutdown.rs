//! Process-exit handling for the engine process group.
//!
//! The engine runs in its own process group, so a Ctrl-C aimed at the
//! terminal's foreground group never reaches it. [`install_signal_handlers`]
//! forwards SIGINT/SIGTERM to the most recently started engine group and then
//! exits. Only async-signal-safe calls (`kill`, `_exit`) run inside the
//! handler.

use std::sync::atomic::{AtomicI32, Ordering};

/// Process group of the live engine, 0 when none.
static ENGINE_PGID: AtomicI32 = AtomicI32::new(0);

/// Record a freshly spawned engine as the signal forwarding target.
pub fn track_engine(pid: u32) {
    ENGINE_PGID.store(pid as i32, Ordering::SeqCst);
}

/// Forget `pid` if it is still the tracked engine.
pub fn untrack_engine(pid: u32) {
    let _ = ENGINE_PGID.compare_exchange(pid as i32, 0, Ordering::SeqCst, Ordering::SeqCst);
}

/// Currently tracked engine process group.
pub fn tracked_engine() -> Option<u32> {
    match ENGINE_PGID.load(Ordering::SeqCst) {
        0 => None,
        pgid => Some(pgid as u32),
    }
}

#[cfg(unix)]
extern "C" fn forward_and_exit(sig: libc::c_int) {
    let pgid = ENGINE_PGID.load(Ordering::SeqCst);
    unsafe {
        if pgid > 0 {
            libc::kill(-pgid, libc::SIGTERM);
        }
        libc::_exit(128 + sig);
    }
}

/// Install SIGINT and SIGTERM handlers that take the engine down with us.
#[cfg(unix)]
pub fn install_signal_handlers() {
    let handler = forward_and_exit as extern "C" fn(libc::c_int) as libc::sighandler_t;
    unsafe {
        libc::signal(libc::SIGINT, handler);
        libc::signal(libc::SIGTERM, handler);
    }
    tracing::debug!("signal forwarding to engine process group installed");
}

#[cfg(not(unix))]
pub fn install_signal_handlers() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untrack_only_clears_matching_pid() {
        track_engine(4242);
        untrack_engine(1);
        assert_eq!(tracked_engine(), Some(4242));
        untrack_engine(4242);
        assert_eq!(tracked_engine(), None);
    }
}
