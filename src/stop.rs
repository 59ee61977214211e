//! Cooperative cancellation of a running transfer.
//!
//! Busy-polling and blocking waits check a [`StopFlag`] and fail with
//! [`Error::Interrupted`] once it is raised. The error then travels the
//! normal failure path, so every resource is released in order when the
//! session's values are dropped.
//!
//! The process-wide flag is raised by the handlers [`install_handlers`]
//! registers for `SIGINT` and `SIGTERM`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lazy_static::lazy_static;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};

use crate::error::{Error, Result};

lazy_static! {
    static ref TERMINATE: StopFlag = StopFlag::new();
}

extern "C" fn handle_terminate(_: libc::c_int) {
    TERMINATE.0.store(true, Ordering::Release);
}

/// A shared flag asking blocking operations to give up.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    /// Create a flag that is not raised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the process-wide flag raised by termination signals.
    pub fn process() -> StopFlag {
        TERMINATE.clone()
    }

    /// Raise the flag.
    #[inline]
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether the flag is raised.
    #[inline]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Fail with [`Error::Interrupted`] if the flag is raised.
    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_raised() {
            return Err(Error::Interrupted);
        }
        Ok(())
    }
}

/// Raise the process-wide flag on `SIGINT` and `SIGTERM`.
///
/// Handlers are installed without `SA_RESTART`, so a blocking connection
/// manager read returns early. They are reset after the first delivery: a
/// second signal terminates the process right away.
pub fn install_handlers() -> nix::Result<()> {
    lazy_static::initialize(&TERMINATE);
    let action = SigAction::new(
        SigHandler::Handler(handle_terminate),
        SaFlags::SA_RESETHAND,
        SigSet::empty(),
    );
    for sig in [Signal::SIGINT, Signal::SIGTERM] {
        // SAFETY: the handler only stores to an already initialized atomic.
        unsafe { signal::sigaction(sig, &action) }?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raised_flag_is_shared_by_clones() {
        let flag = StopFlag::new();
        let clone = flag.clone();
        assert!(flag.check().is_ok());

        clone.raise();
        assert!(flag.is_raised());
        assert!(matches!(flag.check(), Err(Error::Interrupted)));
        assert!(!StopFlag::new().is_raised());
    }

    #[test]
    fn handler_raises_process_flag() {
        let process = StopFlag::process();
        handle_terminate(libc::SIGTERM);
        assert!(process.is_raised());
        assert!(StopFlag::process().check().is_err());
    }
}
