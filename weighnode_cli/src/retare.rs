//! Re-tare trigger: SIGUSR1 latches a tare for the next loop cycle.
//!
//! `kill -USR1 <pid>` stands in for the tare button of the bare-metal node.

use std::sync::OnceLock;

use eyre::WrapErr;
use weighnode_core::TareRequest;
use weighnode_core::error::Result;

static REQUEST: OnceLock<TareRequest> = OnceLock::new();

// Only an atomic load and an atomic store: async-signal-safe.
extern "C" fn on_sigusr1(_signum: libc::c_int) {
    if let Some(req) = REQUEST.get() {
        req.request();
    }
}

/// Install the SIGUSR1 handler and return the request it sets.
pub fn install() -> Result<TareRequest> {
    let req = REQUEST.get_or_init(TareRequest::default).clone();
    let handler = on_sigusr1 as extern "C" fn(libc::c_int) as libc::sighandler_t;
    if unsafe { libc::signal(libc::SIGUSR1, handler) } == libc::SIG_ERR {
        return Err(std::io::Error::last_os_error()).wrap_err("install SIGUSR1 handler");
    }
    tracing::debug!("re-tare on SIGUSR1");
    Ok(req)
}
