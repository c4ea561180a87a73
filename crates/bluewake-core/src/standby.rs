// ── Standby suppression ──
//
// While the radio is on the device must not enter its low-power standby
// state. `StandbyGuard` tracks whether suppression is held so acquire and
// release are idempotent: the host's control is called at most once per
// transition.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::error::CoreError;

/// Host capability that blocks or allows standby.
pub trait StandbyControl: Send + Sync {
    fn suppress(&self) -> Result<(), CoreError>;
    fn allow(&self) -> Result<(), CoreError>;
}

/// Accounting wrapper around a [`StandbyControl`].
pub struct StandbyGuard {
    control: Arc<dyn StandbyControl>,
    held: Mutex<bool>,
}

impl StandbyGuard {
    pub fn new(control: Arc<dyn StandbyControl>) -> Self {
        Self {
            control,
            held: Mutex::new(false),
        }
    }

    /// Block standby unless already blocked.
    pub fn acquire(&self) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if *held {
            return;
        }
        match self.control.suppress() {
            Ok(()) => {
                *held = true;
                debug!("standby suppressed");
            }
            Err(e) => warn!(error = %e, "failed to suppress standby"),
        }
    }

    /// Allow standby if currently blocked. Accounting is cleared even if
    /// the host call fails, so a failed release is never retried twice.
    pub fn release(&self) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !*held {
            return;
        }
        *held = false;
        match self.control.allow() {
            Ok(()) => debug!("standby allowed"),
            Err(e) => warn!(error = %e, "failed to allow standby"),
        }
    }

    pub fn is_held(&self) -> bool {
        *self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for StandbyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandbyGuard")
            .field("held", &self.is_held())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct Counting {
        suppress: AtomicUsize,
        allow: AtomicUsize,
    }

    impl StandbyControl for Counting {
        fn suppress(&self) -> Result<(), CoreError> {
            self.suppress.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn allow(&self) -> Result<(), CoreError> {
            self.allow.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn acquire_and_release_are_idempotent() {
        let control = Arc::new(Counting::default());
        let guard = StandbyGuard::new(control.clone());

        guard.release();
        guard.acquire();
        guard.acquire();
        assert!(guard.is_held());
        guard.release();
        guard.release();
        assert!(!guard.is_held());

        assert_eq!(control.suppress.load(Ordering::SeqCst), 1);
        assert_eq!(control.allow.load(Ordering::SeqCst), 1);
    }
}
