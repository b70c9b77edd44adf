//! Request coalescing: one in-flight scrape per key.
//!
//! The first caller for a key spawns the work; later callers with the same
//! key await the same shared result. The work runs on its own task, so a
//! caller giving up (cancellation) never aborts it for the others. The entry
//! is removed when the work finishes.
//!
//! Coalescing is process-local. Separate processes sharing one database may
//! still scrape the same key concurrently.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::scrapers::ScrapeError;

/// Result delivered to every caller of one flight.
pub type FlightResult<T> = Result<T, Arc<ScrapeError>>;

type Flight<T> = Shared<BoxFuture<'static, FlightResult<T>>>;
type Registry<T> = Arc<Mutex<HashMap<String, (u64, Flight<T>)>>>;

pub struct SingleFlight<T: Clone> {
    inflight: Registry<T>,
    next_id: AtomicU64,
}

impl<T: Clone> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` under `key`, or join the flight already running for it.
    ///
    /// `work` is only invoked by the caller that starts the flight. A caller
    /// whose `cancel` fires returns [`ScrapeError::Cancelled`] immediately
    /// while the flight carries on for everyone else.
    pub async fn run<F, Fut>(&self, cancel: &CancellationToken, key: &str, work: F) -> FlightResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ScrapeError>> + Send + 'static,
    {
        let flight = {
            let mut map = lock(&self.inflight);
            match map.get(key) {
                Some((_, flight)) => {
                    debug!("Joining in-flight scrape {}", key);
                    flight.clone()
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let flight = self.launch(key, id, work());
                    map.insert(key.to_string(), (id, flight.clone()));
                    flight
                }
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(Arc::new(ScrapeError::Cancelled)),
            result = flight => result,
        }
    }

    fn launch<Fut>(&self, key: &str, id: u64, work: Fut) -> Flight<T>
    where
        Fut: Future<Output = Result<T, ScrapeError>> + Send + 'static,
    {
        let registry = self.inflight.clone();
        let key = key.to_string();
        let handle = tokio::spawn(async move {
            let result = work.await;
            let mut map = lock(&registry);
            // A forget() followed by a new flight may have replaced the entry
            if matches!(map.get(&key), Some((current, _)) if *current == id) {
                map.remove(&key);
            }
            result
        });

        async move {
            match handle.await {
                Ok(result) => result.map_err(Arc::new),
                Err(e) => Err(Arc::new(ScrapeError::Aborted(e.to_string()))),
            }
        }
        .boxed()
        .shared()
    }

    /// Drop the entry for `key` so the next caller starts a fresh flight.
    pub fn forget(&self, key: &str) {
        lock(&self.inflight).remove(key);
    }

    /// Number of flights currently running.
    pub fn in_flight(&self) -> usize {
        lock(&self.inflight).len()
    }
}

fn lock<T>(registry: &Mutex<T>) -> MutexGuard<'_, T> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_call() {
        let flights = Arc::new(SingleFlight::<String>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let flights = flights.clone();
            let calls = calls.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                flights
                    .run(&cancel, "course:uid:1141U0010", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok("資料結構".to_string())
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "資料結構");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_errors_are_shared_then_forgotten() {
        let flights = SingleFlight::<u32>::new();
        let cancel = CancellationToken::new();

        let err = flights
            .run(&cancel, "k", || async {
                Err(ScrapeError::Status {
                    status: 404,
                    url: "http://x.test/".to_string(),
                })
            })
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));

        let ok = flights.run(&cancel, "k", || async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_cancelled_caller_does_not_cancel_flight() {
        let flights = Arc::new(SingleFlight::<u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let impatient = CancellationToken::new();
        let first = {
            let flights = flights.clone();
            let calls = calls.clone();
            let impatient = impatient.clone();
            tokio::spawn(async move {
                flights
                    .run(&impatient, "k", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(42)
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let patient = CancellationToken::new();
        let second = {
            let flights = flights.clone();
            tokio::spawn(async move {
                flights
                    .run(&patient, "k", || async { Ok(0) })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        impatient.cancel();

        let first = first.await.unwrap().unwrap_err();
        assert!(matches!(*first, ScrapeError::Cancelled));
        assert_eq!(second.await.unwrap().unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_forget_starts_new_flight() {
        let flights = Arc::new(SingleFlight::<u32>::new());
        let cancel = CancellationToken::new();

        let slow = {
            let flights = flights.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                flights
                    .run(&cancel, "k", || async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(1)
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(flights.in_flight(), 1);

        flights.forget("k");
        let fresh = flights.run(&cancel, "k", || async { Ok(2) }).await;
        assert_eq!(fresh.unwrap(), 2);
        assert_eq!(slow.await.unwrap().unwrap(), 1);
        assert_eq!(flights.in_flight(), 0);
    }
}
