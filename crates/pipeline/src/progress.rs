//! Progress reporting to an external observer.
//!
//! Reports are `(current, total)` with `current` never decreasing and never
//! above `total`. A panicking observer is logged and otherwise ignored.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Observer invoked with `(slides_processed, total_slides)`.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

struct Observer {
    callback: ProgressCallback,
    total: usize,
    current: AtomicUsize,
}

/// Shared handle to an optional observer.
#[derive(Clone, Default)]
pub struct Progress {
    observer: Option<Arc<Observer>>,
}

impl Progress {
    pub fn new(callback: Option<ProgressCallback>, total: usize) -> Self {
        Self {
            observer: callback.map(|callback| {
                Arc::new(Observer {
                    callback,
                    total,
                    current: AtomicUsize::new(0),
                })
            }),
        }
    }

    /// A handle that reports nowhere.
    pub fn none() -> Self {
        Self::default()
    }

    /// Report `current` slides processed. Lower values than already
    /// reported are ignored.
    pub fn report(&self, current: usize) {
        let Some(observer) = &self.observer else {
            return;
        };
        let current = current.min(observer.total);
        let previous = observer.current.fetch_max(current, Ordering::SeqCst);
        if current < previous {
            return;
        }

        let notify = catch_unwind(AssertUnwindSafe(|| {
            (observer.callback)(current, observer.total)
        }));
        if notify.is_err() {
            log::warn!("Progress observer panicked at {}/{}", current, observer.total);
        }
    }

    /// Start synthetic ticks from `from` towards `until` while a section is
    /// in flight. Ticks stop one short of `until`; the real completion
    /// report covers the rest.
    pub fn start_ticker(&self, from: usize, until: usize, tick: Duration) -> Ticker {
        if self.observer.is_none() || from + 1 >= until {
            return Ticker { handle: None };
        }

        let progress = self.clone();
        let handle = tokio::spawn(async move {
            let mut current = from;
            loop {
                tokio::time::sleep(tick).await;
                current += 1;
                if current >= until {
                    break;
                }
                progress.report(current);
            }
        });
        Ticker {
            handle: Some(handle),
        }
    }
}

/// Running ticker task; aborted when stopped or dropped.
pub struct Ticker {
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Abort the task and wait until it has finished.
    pub async fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (ProgressCallback, Arc<Mutex<Vec<(usize, usize)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ProgressCallback = Arc::new(move |current: usize, total: usize| {
            sink.lock().unwrap().push((current, total));
        });
        (callback, seen)
    }

    #[test]
    fn test_reports_are_monotonic_and_capped() {
        let (callback, seen) = recorder();
        let progress = Progress::new(Some(callback), 10);

        progress.report(3);
        progress.report(2);
        progress.report(7);
        progress.report(25);

        assert_eq!(*seen.lock().unwrap(), vec![(3, 10), (7, 10), (10, 10)]);
    }

    #[test]
    fn test_panicking_observer_is_swallowed() {
        let progress = Progress::new(Some(Arc::new(|_: usize, _: usize| panic!("observer failure"))), 5);
        progress.report(1);
        progress.report(2);
    }

    #[test]
    fn test_no_observer() {
        Progress::none().report(4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_stays_within_section_and_stops() {
        let (callback, seen) = recorder();
        let progress = Progress::new(Some(callback), 10);

        let ticker = progress.start_ticker(0, 4, Duration::from_millis(100));
        tokio::time::sleep(Duration::from_secs(5)).await;
        ticker.stop().await;

        let currents: Vec<usize> = seen.lock().unwrap().iter().map(|(c, _)| *c).collect();
        assert_eq!(currents, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_ticker_reports_nothing_more() {
        let (callback, seen) = recorder();
        let progress = Progress::new(Some(callback), 100);

        let ticker = progress.start_ticker(0, 50, Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(250)).await;
        ticker.stop().await;
        let reported = seen.lock().unwrap().len();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(seen.lock().unwrap().len(), reported);
        assert!(reported <= 2);
    }
}
