//! Busy indicator.
//!
//! While the cart is being refreshed or mutated, cart controls should be
//! disabled. The indicator is supplied by the embedding UI; [`BusyGuard`]
//! guarantees it is released on every exit path, including early returns,
//! errors and cancellation of the owning task.

use std::sync::Arc;

/// UI collaborator toggled around cart operations.
pub trait BusyIndicator: Send + Sync {
    /// Engage (`true`) or release (`false`) the busy state.
    fn set_busy(&self, busy: bool);
}

/// Indicator that does nothing, for headless use.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBusy;

impl BusyIndicator for NoopBusy {
    fn set_busy(&self, _busy: bool) {}
}

/// Holds the busy state until dropped.
#[must_use = "the busy state is released as soon as the guard is dropped"]
pub struct BusyGuard {
    indicator: Arc<dyn BusyIndicator>,
}

impl BusyGuard {
    /// Engage `indicator` and return a guard that releases it.
    pub fn engage(indicator: Arc<dyn BusyIndicator>) -> Self {
        indicator.set_busy(true);
        Self { indicator }
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.indicator.set_busy(false);
    }
}

impl std::fmt::Debug for BusyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusyGuard").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<bool>>);

    impl BusyIndicator for Recorder {
        fn set_busy(&self, busy: bool) {
            self.0.lock().push(busy);
        }
    }

    #[test]
    fn test_guard_engages_and_releases() {
        let recorder = Arc::new(Recorder::default());
        {
            let _guard = BusyGuard::engage(recorder.clone());
            assert_eq!(*recorder.0.lock(), vec![true]);
        }
        assert_eq!(*recorder.0.lock(), vec![true, false]);
    }

    #[test]
    fn test_guard_releases_on_early_return() {
        fn work(indicator: Arc<dyn BusyIndicator>, fail: bool) -> Result<(), &'static str> {
            let _guard = BusyGuard::engage(indicator);
            if fail {
                return Err("boom");
            }
            Ok(())
        }

        let recorder = Arc::new(Recorder::default());
        assert!(work(recorder.clone(), true).is_err());
        assert_eq!(*recorder.0.lock(), vec![true, false]);
    }
}
