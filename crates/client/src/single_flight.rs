//! Coalesce concurrent calls to the same async operation.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

type Flight<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

/// At most one in-flight run of an operation; callers arriving while it runs
/// await the same result instead of starting their own.
///
/// The slot is cleared once the run completes, successfully or not, so the
/// next caller after completion starts a fresh run.
pub struct SingleFlight<T, E> {
    slot: Mutex<Option<(u64, Flight<T, E>)>>,
    generation: AtomicU64,
}

impl<T, E> SingleFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Join the in-flight run, or start one with `start`.
    ///
    /// `start` is only called when no run is in flight.
    pub async fn run<F, Fut>(&self, start: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (generation, flight) = {
            let mut slot = self.lock();
            if let Some((generation, flight)) = slot.as_ref() {
                (*generation, flight.clone())
            } else {
                let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                let flight = start().boxed().shared();
                *slot = Some((generation, flight.clone()));
                (generation, flight)
            }
        };

        let result = flight.await;

        // a later run may already occupy the slot
        let mut slot = self.lock();
        if slot.as_ref().is_some_and(|(current, _)| *current == generation) {
            *slot = None;
        }
        result
    }

    /// Whether a run is currently in flight.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<(u64, Flight<T, E>)>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T, E> Default for SingleFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> std::fmt::Debug for SingleFlight<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let in_flight = self.slot.lock().is_ok_and(|slot| slot.is_some());
        f.debug_struct("SingleFlight")
            .field("in_flight", &in_flight)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;

    async fn counted(calls: Arc<AtomicUsize>, fail: bool) -> Result<usize, String> {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_millis(50)).await;
        if fail { Err(format!("run {n} failed")) } else { Ok(n) }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_run() {
        let flight = Arc::new(SingleFlight::<usize, String>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let flight = Arc::clone(&flight);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move { flight.run(|| counted(calls, false)).await })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), Ok(1));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!flight.is_in_flight());
    }

    #[tokio::test]
    async fn test_next_call_after_completion_runs_again() {
        let flight = SingleFlight::<usize, String>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(flight.run(|| counted(Arc::clone(&calls), false)).await, Ok(1));
        assert_eq!(flight.run(|| counted(Arc::clone(&calls), false)).await, Ok(2));
    }

    #[tokio::test]
    async fn test_failure_reaches_every_waiter_and_clears_slot() {
        let flight = SingleFlight::<usize, String>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            flight.run(|| counted(Arc::clone(&calls), true)),
            flight.run(|| counted(Arc::clone(&calls), true)),
        );
        assert_eq!(a, Err("run 1 failed".to_string()));
        assert_eq!(b, a);
        assert!(!flight.is_in_flight());

        assert_eq!(flight.run(|| counted(Arc::clone(&calls), false)).await, Ok(2));
    }
}
