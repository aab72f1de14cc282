//! Bounded concurrency pool
//!
//! Pulls work units from a producer and keeps at most `limit` of them in flight.
//! As soon as one finishes the producer is asked for the next, until it reports
//! that nothing is left and every running unit has resolved. Units run
//! cooperatively on the calling task; nothing is spawned.
//!
//! The same pool drives both levels of an export: pages within a category (limit 1,
//! halting on failure) and categories within a run (the global budget, continuing
//! past failures).

use crate::domain::{CartographError, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};

/// One unit of work
pub type WorkUnit<T> = BoxFuture<'static, Result<T>>;

/// Source of work units
#[async_trait]
pub trait WorkProducer: Send {
    type Output: Send + 'static;

    /// The next unit, or `None` once no work remains
    async fn next_unit(&mut self) -> Option<WorkUnit<Self::Output>>;
}

/// Producer over a prebuilt sequence of units
pub struct IterProducer<I> {
    units: I,
}

impl<I> IterProducer<I> {
    pub fn new(units: I) -> Self {
        Self { units }
    }
}

#[async_trait]
impl<I, T> WorkProducer for IterProducer<I>
where
    I: Iterator<Item = WorkUnit<T>> + Send,
    T: Send + 'static,
{
    type Output = T;

    async fn next_unit(&mut self) -> Option<WorkUnit<T>> {
        self.units.next()
    }
}

/// What the pool does after a unit fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Stop asking for new units; running units still finish
    Halt,
    /// Keep pulling units
    #[default]
    Continue,
}

/// Everything a pool run produced
///
/// `results` are in completion order, which is not the order units were started.
#[derive(Debug)]
pub struct PoolOutcome<T> {
    pub results: Vec<T>,
    pub failures: Vec<CartographError>,
    pub units_started: usize,
    pub peak_in_flight: usize,
}

impl<T> Default for PoolOutcome<T> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            failures: Vec::new(),
            units_started: 0,
            peak_in_flight: 0,
        }
    }
}

impl<T> PoolOutcome<T> {
    /// True when no unit failed
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Pool that runs up to `limit` units at once
///
/// # Example
///
/// ```
/// use cartograph::core::pool::{BoundedPool, IterProducer, WorkUnit};
/// use cartograph::domain::CartographError;
/// use futures::FutureExt;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let units = (0..5u32).map(|n| -> WorkUnit<u32> {
///     async move { Ok::<_, CartographError>(n * 2) }.boxed()
/// });
/// let outcome = BoundedPool::new(IterProducer::new(units), 2).run().await;
///
/// assert!(outcome.is_success());
/// assert_eq!(outcome.results.len(), 5);
/// assert!(outcome.peak_in_flight <= 2);
/// # }
/// ```
pub struct BoundedPool<P> {
    producer: P,
    limit: usize,
    mode: FailureMode,
}

impl<P: WorkProducer> BoundedPool<P> {
    /// A limit of 0 is treated as 1
    pub fn new(producer: P, limit: usize) -> Self {
        Self {
            producer,
            limit: limit.max(1),
            mode: FailureMode::default(),
        }
    }

    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Drive the producer to exhaustion
    pub async fn run(mut self) -> PoolOutcome<P::Output> {
        let mut in_flight = FuturesUnordered::new();
        let mut outcome = PoolOutcome::default();
        let mut exhausted = false;

        loop {
            while !exhausted && in_flight.len() < self.limit {
                match self.producer.next_unit().await {
                    Some(unit) => {
                        in_flight.push(unit);
                        outcome.units_started += 1;
                        outcome.peak_in_flight = outcome.peak_in_flight.max(in_flight.len());
                    }
                    None => exhausted = true,
                }
            }

            match in_flight.next().await {
                Some(Ok(value)) => outcome.results.push(value),
                Some(Err(e)) => {
                    if self.mode == FailureMode::Halt && !exhausted {
                        tracing::debug!(error = %e, "Unit failed, no further units will start");
                        exhausted = true;
                    }
                    outcome.failures.push(e);
                }
                None => break,
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use test_case::test_case;

    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    fn tracked_units(
        count: usize,
        gauge: Arc<Gauge>,
        order: Arc<std::sync::Mutex<Vec<(usize, &'static str)>>>,
    ) -> impl Iterator<Item = WorkUnit<usize>> + Send {
        (0..count).map(move |n| {
            let gauge = Arc::clone(&gauge);
            let order = Arc::clone(&order);
            async move {
                let now = gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
                gauge.peak.fetch_max(now, Ordering::SeqCst);
                order.lock().unwrap().push((n, "start"));
                tokio::time::sleep(Duration::from_millis(5 + (n as u64 % 3) * 3)).await;
                order.lock().unwrap().push((n, "end"));
                gauge.current.fetch_sub(1, Ordering::SeqCst);
                Ok(n)
            }
            .boxed()
        })
    }

    #[test_case(1)]
    #[test_case(2)]
    #[test_case(4)]
    #[tokio::test]
    async fn test_never_exceeds_limit(limit: usize) {
        let gauge = Arc::new(Gauge {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let units = tracked_units(10, Arc::clone(&gauge), order);

        let outcome = BoundedPool::new(IterProducer::new(units), limit).run().await;

        assert!(outcome.is_success());
        assert_eq!(outcome.results.len(), 10);
        assert_eq!(outcome.units_started, 10);
        assert!(gauge.peak.load(Ordering::SeqCst) <= limit);
        assert_eq!(outcome.peak_in_flight, limit);
    }

    #[tokio::test]
    async fn test_limit_one_is_sequential() {
        let gauge = Arc::new(Gauge {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let units = tracked_units(4, gauge, Arc::clone(&order));

        let outcome = BoundedPool::new(IterProducer::new(units), 1).run().await;

        assert_eq!(outcome.results, vec![0, 1, 2, 3]);
        let events = order.lock().unwrap().clone();
        let expected: Vec<(usize, &str)> = (0..4).flat_map(|n| [(n, "start"), (n, "end")]).collect();
        assert_eq!(events, expected);
    }

    #[tokio::test]
    async fn test_zero_limit_clamped() {
        let units = (0..3).map(|n| -> WorkUnit<i32> { async move { Ok(n) }.boxed() });
        let pool = BoundedPool::new(IterProducer::new(units), 0);
        assert_eq!(pool.limit(), 1);
        assert_eq!(pool.run().await.results.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_producer_resolves() {
        let units = std::iter::empty::<WorkUnit<()>>();
        let outcome = BoundedPool::new(IterProducer::new(units), 3).run().await;
        assert!(outcome.is_success());
        assert_eq!(outcome.units_started, 0);
        assert_eq!(outcome.peak_in_flight, 0);
    }

    fn failing_at(fail_at: usize, count: usize) -> impl Iterator<Item = WorkUnit<usize>> + Send {
        (0..count).map(move |n| {
            async move {
                if n == fail_at {
                    Err(CartographError::Export(format!("unit {n} failed")))
                } else {
                    Ok(n)
                }
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn test_halt_stops_producing() {
        let outcome = BoundedPool::new(IterProducer::new(failing_at(1, 5)), 1)
            .with_failure_mode(FailureMode::Halt)
            .run()
            .await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.units_started, 2);
        assert_eq!(outcome.results, vec![0]);
        assert_eq!(outcome.failures.len(), 1);
    }

    #[tokio::test]
    async fn test_continue_runs_everything() {
        let outcome = BoundedPool::new(IterProducer::new(failing_at(1, 5)), 2)
            .run()
            .await;

        assert_eq!(outcome.units_started, 5);
        assert_eq!(outcome.results.len(), 4);
        assert_eq!(outcome.failures.len(), 1);
    }

    #[tokio::test]
    async fn test_halt_lets_running_siblings_finish() {
        let units = (0..4usize).map(|n| {
            async move {
                if n == 0 {
                    Err(CartographError::Export("fast failure".into()))
                } else {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok(n)
                }
            }
            .boxed() as WorkUnit<usize>
        });

        let outcome = BoundedPool::new(IterProducer::new(units), 3)
            .with_failure_mode(FailureMode::Halt)
            .run()
            .await;

        assert_eq!(outcome.units_started, 3);
        assert_eq!(outcome.failures.len(), 1);
        let mut results = outcome.results;
        results.sort_unstable();
        assert_eq!(results, vec![1, 2]);
    }
}
