//! Capturing user interrupts (Ctrl+C) during comparison runs.

use std::{
    fmt, io,
    sync::atomic::{AtomicBool, Ordering},
};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Returns the flag set by the handler installed with [`InterruptGuard`]. This is the default
/// interrupt flag observed by [`Compare`](crate::Compare).
pub fn sigint_flag() -> &'static AtomicBool {
    &INTERRUPTED
}

#[cfg(unix)]
extern "C" fn handle_sigint(_signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// RAII guard replacing the SIGINT handler with one setting [`sigint_flag()`]. The previous
/// handler is restored when the guard is dropped.
///
/// On non-Unix platforms, the guard is a no-op.
#[must_use = "the previous SIGINT handler is restored when the guard is dropped"]
pub struct InterruptGuard {
    #[cfg(unix)]
    previous: libc::sigaction,
}

impl fmt::Debug for InterruptGuard {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("InterruptGuard").finish_non_exhaustive()
    }
}

impl InterruptGuard {
    /// Installs the handler and clears the interrupt flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the handler cannot be installed.
    #[cfg(unix)]
    #[allow(unsafe_code)]
    pub fn install() -> io::Result<Self> {
        INTERRUPTED.store(false, Ordering::SeqCst);

        // SAFETY: `sigaction` structs are plain C data, for which all-zero bytes are valid.
        // The installed handler only touches an atomic, which is async-signal-safe.
        unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            action.sa_sigaction = handle_sigint as extern "C" fn(libc::c_int) as libc::sighandler_t;
            action.sa_flags = libc::SA_RESTART;
            libc::sigemptyset(&mut action.sa_mask);

            let mut previous: libc::sigaction = std::mem::zeroed();
            if libc::sigaction(libc::SIGINT, &action, &mut previous) != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(Self { previous })
        }
    }

    /// Installs the handler and clears the interrupt flag.
    ///
    /// # Errors
    ///
    /// Never returns an error on non-Unix platforms.
    #[cfg(not(unix))]
    pub fn install() -> io::Result<Self> {
        INTERRUPTED.store(false, Ordering::SeqCst);
        Ok(Self {})
    }
}

#[cfg(unix)]
impl Drop for InterruptGuard {
    #[allow(unsafe_code)]
    fn drop(&mut self) {
        // SAFETY: `previous` was filled in by a successful `sigaction` call.
        unsafe {
            libc::sigaction(libc::SIGINT, &self.previous, std::ptr::null_mut());
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    #[allow(unsafe_code)]
    fn guard_captures_sigint() {
        let guard = InterruptGuard::install().unwrap();
        assert!(!sigint_flag().load(Ordering::SeqCst));

        // SAFETY: the SIGINT handler is installed by the guard.
        let rc = unsafe { libc::raise(libc::SIGINT) };
        assert_eq!(rc, 0);
        assert!(sigint_flag().swap(false, Ordering::SeqCst));
        drop(guard);
    }
}
