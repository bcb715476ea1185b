//! Background race polling with snapshot fan-out
//!
//! The monitor polls the category race list on a timer, swaps the stored
//! snapshot, then hands the new snapshot to every registered listener.
//! Snapshot and listener registry sit behind separate locks, and neither is
//! held across an `.await`.

use crate::metrics::MetricsCollector;
use crate::racetime::api::RaceSource;
use crate::races::{RaceSnapshot, SnapshotSource};
use crate::shutdown::Shutdown;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Registration handle used to remove a listener
pub type ListenerId = u64;

/// Polling configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between fetches
    pub interval: Duration,
    /// Fetch once immediately instead of waiting a full interval
    pub fetch_on_start: bool,
    /// Snapshots buffered per listener before it starts missing them
    pub listener_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            fetch_on_start: true,
            listener_capacity: 8,
        }
    }
}

/// Receiving end of a monitor registration
#[derive(Debug)]
pub struct Listener {
    id: ListenerId,
    rx: mpsc::Receiver<RaceSnapshot>,
}

impl Listener {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Wait for the next snapshot. `None` once the listener has been removed
    /// and its buffer drained.
    pub async fn recv(&mut self) -> Option<RaceSnapshot> {
        self.rx.recv().await
    }

    /// Take a buffered snapshot without waiting
    pub fn try_recv(&mut self) -> Option<RaceSnapshot> {
        self.rx.try_recv().ok()
    }
}

/// Outcome of delivering one snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
    pub pruned: usize,
}

#[derive(Default)]
struct Registry {
    next_id: ListenerId,
    listeners: Vec<(ListenerId, mpsc::Sender<RaceSnapshot>)>,
}

/// Race monitor for a single category
pub struct Monitor {
    category: String,
    source: Arc<dyn RaceSource>,
    config: MonitorConfig,
    snapshot: RwLock<RaceSnapshot>,
    registry: Mutex<Registry>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Monitor {
    /// Create a new monitor
    pub fn new(source: Arc<dyn RaceSource>, category: impl Into<String>, config: MonitorConfig) -> Self {
        Self {
            category: category.into(),
            source,
            config,
            snapshot: RwLock::new(RaceSnapshot::empty()),
            registry: Mutex::new(Registry::default()),
            metrics: None,
        }
    }

    /// Create a new monitor that records poll and delivery metrics
    pub fn with_metrics(
        source: Arc<dyn RaceSource>,
        category: impl Into<String>,
        config: MonitorConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let mut monitor = Self::new(source, category, config);
        monitor.metrics = Some(metrics);
        monitor
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// Register a listener. It receives every snapshot broadcast from now on.
    pub fn add_listener(&self) -> Listener {
        let (tx, rx) = mpsc::channel(self.config.listener_capacity.max(1));

        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, tx));
        let count = registry.listeners.len();
        drop(registry);

        self.record_listener_count(count);
        debug!(listener = id, category = %self.category, "listener registered");

        Listener { id, rx }
    }

    /// Deregister a listener. Returns whether it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let before = registry.listeners.len();
        registry.listeners.retain(|(listener_id, _)| *listener_id != id);
        let removed = registry.listeners.len() != before;
        let count = registry.listeners.len();
        drop(registry);

        if removed {
            self.record_listener_count(count);
            debug!(listener = id, category = %self.category, "listener removed");
        }
        removed
    }

    pub fn listener_count(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .len()
    }

    /// Latest snapshot; empty before the first successful fetch
    pub fn current(&self) -> RaceSnapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fetch once, replace the snapshot and broadcast it
    pub async fn poll_once(&self) -> crate::error::Result<BroadcastReport> {
        let races = match self.source.current_races(&self.category).await {
            Ok(races) => races,
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_poll(false);
                }
                return Err(e);
            }
        };

        let snapshot = RaceSnapshot::new(races);
        {
            let mut current = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
            *current = snapshot.clone();
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_poll(true);
            metrics.set_snapshot_races(snapshot.len());
        }
        debug!(category = %self.category, races = snapshot.len(), "race snapshot replaced");

        Ok(self.broadcast(&snapshot))
    }

    /// Run the polling loop until shutdown is signalled.
    ///
    /// A failed fetch is logged and the loop keeps its cadence; the previous
    /// snapshot stays live until a fetch succeeds.
    pub async fn run(&self, mut shutdown: Shutdown) {
        info!(
            category = %self.category,
            interval_secs = self.config.interval.as_secs(),
            "Race monitor started"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if !self.config.fetch_on_start {
            // the first tick of a tokio interval completes immediately
            ticker.tick().await;
        }

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(report) => {
                            if report.dropped > 0 {
                                warn!(
                                    category = %self.category,
                                    dropped = report.dropped,
                                    "Slow listeners missed a race snapshot"
                                );
                            }
                        }
                        Err(e) => {
                            warn!(category = %self.category, "Race fetch failed: {:#}", e);
                        }
                    }
                }
            }
        }

        info!(category = %self.category, "Race monitor stopped");
    }

    /// Deliver without waiting: a listener with a full buffer misses this
    /// snapshot, a listener whose receiver is gone is pruned.
    fn broadcast(&self, snapshot: &RaceSnapshot) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry
            .listeners
            .retain(|(id, tx)| match tx.try_send(snapshot.clone()) {
                Ok(()) => {
                    report.delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!(listener = *id, "Listener buffer full, snapshot dropped for it");
                    report.dropped += 1;
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(listener = *id, "Listener receiver closed, pruning");
                    report.pruned += 1;
                    false
                }
            });
        let count = registry.listeners.len();
        drop(registry);

        if let Some(metrics) = &self.metrics {
            metrics.record_snapshots_dropped(report.dropped);
        }
        if report.pruned > 0 {
            self.record_listener_count(count);
        }

        report
    }

    fn record_listener_count(&self, count: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.set_listener_count(count);
        }
    }
}

impl SnapshotSource for Monitor {
    fn current(&self) -> RaceSnapshot {
        Monitor::current(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::racetime::api::MockRaceSource;
    use crate::shutdown;
    use crate::types::RaceData;
    use anyhow::anyhow;
    use mockall::Sequence;

    fn race(name: &str) -> RaceData {
        RaceData {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn names(snapshot: &RaceSnapshot) -> Vec<String> {
        snapshot.races().iter().map(|r| r.name.clone()).collect()
    }

    /// Source that returns `tww/race-1`, `tww/race-2`, ... on successive calls
    fn counting_source() -> MockRaceSource {
        let mut source = MockRaceSource::new();
        let mut calls = 0;
        source.expect_current_races().returning(move |_| {
            calls += 1;
            Ok(vec![race(&format!("tww/race-{}", calls))])
        });
        source
    }

    fn test_config(capacity: usize) -> MonitorConfig {
        MonitorConfig {
            interval: Duration::from_secs(30),
            fetch_on_start: true,
            listener_capacity: capacity,
        }
    }

    #[tokio::test]
    async fn test_current_is_empty_before_first_fetch() {
        let monitor = Monitor::new(Arc::new(MockRaceSource::new()), "tww", test_config(4));
        assert!(monitor.current().is_empty());
        assert!(monitor.current().fetched_at().is_none());
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_snapshot() {
        let mut source = MockRaceSource::new();
        let mut seq = Sequence::new();
        source
            .expect_current_races()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![race("tww/first")]));
        source
            .expect_current_races()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(anyhow!("connection reset")));

        let monitor = Monitor::new(Arc::new(source), "tww", test_config(4));
        monitor.poll_once().await.unwrap();
        assert!(monitor.poll_once().await.is_err());

        assert_eq!(names(&monitor.current()), vec!["tww/first"]);
    }

    #[tokio::test]
    async fn test_success_after_failure_replaces_snapshot() {
        let mut source = MockRaceSource::new();
        let mut seq = Sequence::new();
        source
            .expect_current_races()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(anyhow!("503 Service Unavailable")));
        source
            .expect_current_races()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![race("tww/a"), race("tww/b")]));

        let monitor = Monitor::new(Arc::new(source), "tww", test_config(4));
        assert!(monitor.poll_once().await.is_err());
        assert!(monitor.current().is_empty());

        monitor.poll_once().await.unwrap();
        assert_eq!(names(&monitor.current()), vec!["tww/a", "tww/b"]);
    }

    #[tokio::test]
    async fn test_late_listener_only_sees_later_snapshots() {
        let monitor = Monitor::new(Arc::new(counting_source()), "tww", test_config(4));

        monitor.poll_once().await.unwrap();
        let mut listener = monitor.add_listener();
        monitor.poll_once().await.unwrap();
        monitor.poll_once().await.unwrap();

        assert_eq!(names(&listener.recv().await.unwrap()), vec!["tww/race-2"]);
        assert_eq!(names(&listener.recv().await.unwrap()), vec!["tww/race-3"]);
        assert!(listener.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_removed_listener_receives_nothing_further() {
        let monitor = Monitor::new(Arc::new(counting_source()), "tww", test_config(4));
        let mut listener = monitor.add_listener();

        monitor.poll_once().await.unwrap();
        assert!(monitor.remove_listener(listener.id()));
        assert!(!monitor.remove_listener(listener.id()));
        monitor.poll_once().await.unwrap();

        assert_eq!(names(&listener.recv().await.unwrap()), vec!["tww/race-1"]);
        assert!(listener.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_slow_listener_does_not_block_others() {
        let monitor = Monitor::new(Arc::new(counting_source()), "tww", test_config(1));
        let mut slow = monitor.add_listener();
        let mut fast = monitor.add_listener();

        let mut dropped = 0;
        for _ in 0..3 {
            let report = monitor.poll_once().await.unwrap();
            dropped += report.dropped;
            assert!(fast.recv().await.is_some());
        }

        assert_eq!(dropped, 2);
        assert_eq!(names(&slow.recv().await.unwrap()), vec!["tww/race-1"]);
        assert!(slow.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_dropped_listener_is_pruned() {
        let monitor = Monitor::new(Arc::new(counting_source()), "tww", test_config(4));
        let listener = monitor.add_listener();
        let _kept = monitor.add_listener();
        drop(listener);

        let report = monitor.poll_once().await.unwrap();
        assert_eq!(report.pruned, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(monitor.listener_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_continues_after_fetch_failure() {
        let mut source = MockRaceSource::new();
        let mut seq = Sequence::new();
        source
            .expect_current_races()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(anyhow!("timeout")));
        source
            .expect_current_races()
            .returning(|_| Ok(vec![race("tww/recovered")]));

        let monitor = Arc::new(Monitor::new(Arc::new(source), "tww", test_config(4)));
        let mut listener = monitor.add_listener();
        let (trigger, shutdown) = shutdown::channel();

        let task = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.run(shutdown).await })
        };

        let snapshot = listener.recv().await.unwrap();
        assert_eq!(names(&snapshot), vec!["tww/recovered"]);
        assert_eq!(names(&monitor.current()), vec!["tww/recovered"]);

        trigger.trigger();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_waits_an_interval_without_fetch_on_start() {
        let monitor = Arc::new(Monitor::new(
            Arc::new(counting_source()),
            "tww",
            MonitorConfig {
                fetch_on_start: false,
                ..test_config(4)
            },
        ));
        let (trigger, shutdown) = shutdown::channel();

        let task = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.run(shutdown).await })
        };

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(monitor.current().is_empty());

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(names(&monitor.current()), vec!["tww/race-1"]);

        trigger.trigger();
        task.await.unwrap();
    }
}
