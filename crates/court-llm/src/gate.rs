//! Process-wide serialization of outbound calls

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Mutual-exclusion gate shared by every stage that calls a model
///
/// Constructed once per run and cloned into each stage; clones share the
/// same lock, so at most one outbound call is in flight at any time even
/// when stages run concurrently.
#[derive(Debug, Clone, Default)]
pub struct CallGate {
    lock: Arc<Mutex<()>>,
    calls: Arc<AtomicU64>,
}

impl CallGate {
    /// Create a new, independent gate
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `call` while holding the gate
    pub async fn run<F, T>(&self, call: F) -> T
    where
        F: Future<Output = T>,
    {
        let _guard = self.lock.lock().await;
        self.calls.fetch_add(1, Ordering::Relaxed);
        call.await
    }

    /// Number of calls that passed through the gate
    #[must_use]
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn concurrent_calls_never_overlap() {
        let gate = CallGate::new();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let gate = gate.clone();
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    gate.run(async {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(gate.calls(), 4);
    }
}
