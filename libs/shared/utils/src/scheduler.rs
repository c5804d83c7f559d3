use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// A named timer that runs a job every `period`, skipping a tick while the
/// previous run of the same job is still in flight.
#[derive(Clone)]
pub struct PeriodicTask {
    name: Arc<str>,
    period: Duration,
    in_flight: Arc<AtomicBool>,
    runs: Arc<AtomicU64>,
    skipped: Arc<AtomicU64>,
}

struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl PeriodicTask {
    pub fn new(name: &str, period: Duration) -> Self {
        Self {
            name: Arc::from(name),
            period,
            in_flight: Arc::new(AtomicBool::new(false)),
            runs: Arc::new(AtomicU64::new(0)),
            skipped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn skipped_ticks(&self) -> u64 {
        self.skipped.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Starts the job unless a previous run is still in flight. Returns the
    /// handle of the spawned run, or `None` when the tick was skipped.
    pub fn trigger<Fut>(&self, job: Fut) -> Option<JoinHandle<()>>
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
            warn!(task = %self.name, "previous run still in progress, skipping tick");
            return None;
        }

        let guard = InFlightGuard(self.in_flight.clone());
        self.runs.fetch_add(1, Ordering::SeqCst);
        let name = self.name.clone();

        Some(tokio::spawn(async move {
            let _guard = guard;
            debug!(task = %name, "tick started");
            job.await;
            debug!(task = %name, "tick finished");
        }))
    }

    /// Drives the job on its own timer until `shutdown` flips to `true` or its sender is dropped.
    pub fn spawn<F, Fut>(&self, mut shutdown: watch::Receiver<bool>, job: F) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = self.clone();

        tokio::spawn(async move {
            info!(task = %task.name, period_secs = task.period.as_secs(), "periodic task started");

            let mut interval = tokio::time::interval(task.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        task.trigger(job());
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!(task = %task.name, "periodic task stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_trigger_skips_while_in_flight() {
        let task = PeriodicTask::new("slow", Duration::from_secs(60));
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let first = task.trigger(async move {
            let _ = release_rx.await;
        });
        assert!(first.is_some());
        assert!(task.is_running());

        let second = task.trigger(async {});
        assert!(second.is_none());
        assert_eq!(task.skipped_ticks(), 1);

        release_tx.send(()).unwrap();
        first.unwrap().await.unwrap();
        assert!(!task.is_running());

        assert!(task.trigger(async {}).is_some());
        assert_eq!(task.runs(), 2);
    }

    #[tokio::test]
    async fn test_spawned_task_never_overlaps_and_stops_on_shutdown() {
        let task = PeriodicTask::new("overlap", Duration::from_millis(5));
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = {
            let concurrent = concurrent.clone();
            let max_seen = max_seen.clone();
            task.spawn(shutdown_rx, move || {
                let concurrent = concurrent.clone();
                let max_seen = max_seen.clone();
                async move {
                    let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    concurrent.fetch_sub(1, Ordering::SeqCst);
                }
            })
        };

        tokio::time::sleep(Duration::from_millis(120)).await;
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler should stop after shutdown")
            .unwrap();

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(task.runs() >= 1);
        assert!(task.skipped_ticks() >= 1);
    }
}
