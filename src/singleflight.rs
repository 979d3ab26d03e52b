use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

static PROCESS_WIDE: Lazy<Arc<SingleFlight>> = Lazy::new(|| Arc::new(SingleFlight::default()));

/// Mutual exclusion over an async critical section shared by multiple
/// independent callers. Losers skip instead of queuing: a caller that
/// observes "in flight" exits without waiting and re-resolves on its
/// next trigger.
#[derive(Debug, Default)]
pub struct SingleFlight {
    in_flight: AtomicBool,
}

impl SingleFlight {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The process-wide coordinator shared by every resolver instance.
    #[must_use]
    pub fn process_wide() -> Arc<Self> {
        Arc::clone(&PROCESS_WIDE)
    }

    /// Attempt to enter the critical section.
    ///
    /// Returns `None` when another caller already holds it.
    #[must_use]
    pub fn try_acquire(self: &Arc<Self>) -> Option<SingleFlightPermit> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(SingleFlightPermit {
                owner: Arc::clone(self),
            })
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Releases the critical section on drop, so early returns and error
/// paths cannot leave the flag set.
#[derive(Debug)]
pub struct SingleFlightPermit {
    owner: Arc<SingleFlight>,
}

impl Drop for SingleFlightPermit {
    fn drop(&mut self) {
        self.owner.in_flight.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::SingleFlight;

    #[test]
    fn second_acquire_is_refused_while_permit_is_held() {
        let coordinator = SingleFlight::new();

        let permit = coordinator.try_acquire().expect("first acquire succeeds");
        assert!(coordinator.is_in_flight());
        assert!(coordinator.try_acquire().is_none());

        drop(permit);
        assert!(!coordinator.is_in_flight());
        assert!(coordinator.try_acquire().is_some());
    }

    #[test]
    fn permit_releases_on_early_drop_inside_failed_section() {
        let coordinator = SingleFlight::new();

        {
            let _permit = coordinator.try_acquire().expect("acquire succeeds");
            // Simulated failure path: the permit drops with the scope.
        }

        assert!(!coordinator.is_in_flight());
    }

    #[test]
    fn process_wide_instance_is_shared() {
        let a = SingleFlight::process_wide();
        let b = SingleFlight::process_wide();
        assert!(std::sync::Arc::ptr_eq(&a, &b));
    }
}
