//! Helpers shared by the binaries.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use skyscreen_core::{SkyError, SkyResult};
use tracing_subscriber::EnvFilter;

/// Raised by SIGTERM/SIGINT once [`install_stop_handler`] has run.
static STOP: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn on_stop_signal(_sig: libc::c_int) {
    STOP.store(true, Ordering::Release);
}

/// Installs the fmt subscriber. `RUST_LOG` overrides the default `info` level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// Routes SIGTERM and SIGINT to the returned flag instead of killing the
/// process, so loops can wind down and supervised children get reaped.
///
/// On non-unix targets the flag is returned but never raised by a signal.
pub fn install_stop_handler() -> &'static AtomicBool {
    route_stop_signals();
    &STOP
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn route_stop_signals() {
    // SAFETY: the handler only stores to an atomic, which is async-signal-safe.
    unsafe {
        libc::signal(libc::SIGTERM, on_stop_signal as *const () as libc::sighandler_t);
        libc::signal(libc::SIGINT, on_stop_signal as *const () as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
fn route_stop_signals() {}

/// Whether a stop signal has arrived.
#[must_use]
pub fn stop_requested() -> bool {
    STOP.load(Ordering::Acquire)
}

/// Parses the value following `flag`.
///
/// # Errors
///
/// Returns [`SkyError::InvalidConfig`] if the value is missing or malformed.
pub fn flag_value<T: FromStr>(flag: &str, value: Option<&String>) -> SkyResult<T> {
    let value = value.ok_or_else(|| SkyError::InvalidConfig(format!("{flag} needs a value")))?;
    value
        .parse()
        .map_err(|_| SkyError::InvalidConfig(format!("invalid value '{value}' for {flag}")))
}
