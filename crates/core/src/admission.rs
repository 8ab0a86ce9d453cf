//! Load shedding for expensive fetches.
//!
//! The controller bounds the total cost (approximately, the compressed
//! archive size) of artifacts being processed at once. It never queues or
//! retries: a shed reservation is reported to the caller, which turns it
//! into a retryable failure.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::debug;

use crate::metrics;

/// Snapshot of the controller's budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdmissionStats {
    /// Cost currently reserved.
    pub reserved: u64,
    /// Configured ceiling.
    pub ceiling: u64,
}

/// Bounds the cost of concurrently processed work.
///
/// Cheap to clone; clones share the same budget.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    ceiling: u64,
    reserved: Mutex<u64>,
}

impl AdmissionController {
    pub fn new(ceiling: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                ceiling,
                reserved: Mutex::new(0),
            }),
        }
    }

    /// Tries to reserve `cost`.
    ///
    /// If the reservation would push the total over the ceiling the returned
    /// value is shed and holds nothing. Otherwise the cost stays reserved
    /// until the [`Reservation`] is dropped or released.
    pub fn reserve(&self, cost: u64) -> Reservation {
        let mut reserved = self.lock();
        let admitted = reserved
            .checked_add(cost)
            .is_some_and(|total| total <= self.inner.ceiling);
        if !admitted {
            debug!(
                cost,
                reserved = *reserved,
                ceiling = self.inner.ceiling,
                "Shedding load"
            );
            metrics::ADMISSION_SHED.inc();
            return Reservation {
                inner: None,
                cost,
            };
        }
        *reserved += cost;
        metrics::ADMISSION_RESERVED.set(*reserved as i64);
        Reservation {
            inner: Some(Arc::clone(&self.inner)),
            cost,
        }
    }

    pub fn stats(&self) -> AdmissionStats {
        AdmissionStats {
            reserved: *self.lock(),
            ceiling: self.inner.ceiling,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, u64> {
        self.inner.lock()
    }
}

impl Inner {
    // The counter stays consistent even if a holder panicked, so poisoning
    // is ignored.
    fn lock(&self) -> std::sync::MutexGuard<'_, u64> {
        self.reserved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A possibly-shed claim on the admission budget.
///
/// Releases its cost exactly once, on drop or on [`Reservation::release`].
#[derive(Debug)]
#[must_use = "dropping the reservation releases it immediately"]
pub struct Reservation {
    inner: Option<Arc<Inner>>,
    cost: u64,
}

impl Reservation {
    /// True when the controller refused the reservation.
    pub fn is_shed(&self) -> bool {
        self.inner.is_none()
    }

    pub fn cost(&self) -> u64 {
        self.cost
    }

    /// Releases the reservation now.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            let mut reserved = inner.lock();
            *reserved = reserved.saturating_sub(self.cost);
            metrics::ADMISSION_RESERVED.set(*reserved as i64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn test_reserve_within_ceiling() {
        let controller = AdmissionController::new(100);
        let a = controller.reserve(60);
        assert!(!a.is_shed());
        assert_eq!(controller.stats().reserved, 60);

        let b = controller.reserve(50);
        assert!(b.is_shed());
        assert_eq!(controller.stats().reserved, 60);

        drop(b);
        assert_eq!(controller.stats().reserved, 60);
        a.release();
        assert_eq!(
            controller.stats(),
            AdmissionStats {
                reserved: 0,
                ceiling: 100
            }
        );
    }

    #[test]
    fn test_exact_ceiling_is_admitted() {
        let controller = AdmissionController::new(100);
        let r = controller.reserve(100);
        assert!(!r.is_shed());
        assert!(controller.reserve(1).is_shed());
    }

    #[test]
    fn test_overflowing_cost_is_shed() {
        let controller = AdmissionController::new(u64::MAX);
        let _a = controller.reserve(10);
        assert!(controller.reserve(u64::MAX).is_shed());
    }

    #[test]
    fn test_release_on_panic_unwind() {
        let controller = AdmissionController::new(100);
        let c = controller.clone();
        let result = std::panic::catch_unwind(move || {
            let _r = c.reserve(40);
            panic!("work failed");
        });
        assert!(result.is_err());
        assert_eq!(controller.stats().reserved, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reservations_never_exceed_ceiling() {
        let ceiling = 1_000;
        let controller = AdmissionController::new(ceiling);
        let peak = Arc::new(AtomicU64::new(0));

        let mut handles = Vec::new();
        for i in 0..64u64 {
            let controller = controller.clone();
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let reservation = controller.reserve(50 + (i % 7) * 40);
                if reservation.is_shed() {
                    return;
                }
                let now = controller.stats().reserved;
                assert!(now <= ceiling);
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= ceiling);
        assert_eq!(controller.stats().reserved, 0);
    }
}
