use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::{self, JoinError, JoinHandle, JoinSet};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::error::error_chain;
use pkg_constants::controller::{
    DEFAULT_DEBOUNCE_MILLIS, DEFAULT_WORKERS, ERROR_BACKOFF_BASE_SECS, ERROR_BACKOFF_MAX_SECS,
};
use pkg_metrics::{INFLIGHT, MetricsRegistry, QUEUE_DEPTH};
use pkg_state::watch::EventLog;
use pkg_types::meta::ObjectKey;

/// What the runner should do with an identity after a successful cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Nothing to revisit until the next notification.
    Done,
    /// Run the identity again after the given delay.
    RequeueAfter(Duration),
}

/// A controller the runner can drive.
#[async_trait]
pub trait Reconcile: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn name(&self) -> &str;

    /// Every identity that should get a cycle on startup or after a resync.
    async fn list_keys(&self) -> anyhow::Result<Vec<ObjectKey>>;

    /// Map a store key from the watch stream to the identity it concerns.
    fn key_for_event(&self, raw_key: &str) -> Option<ObjectKey>;

    /// One reconciliation cycle for `key`.
    async fn run(&self, key: &ObjectKey) -> Result<Action, Self::Error>;
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Maximum number of identities reconciled at the same time.
    pub workers: usize,
    /// Delay between a watch notification and the cycle it triggers.
    pub debounce: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MILLIS),
            backoff_base: Duration::from_secs(ERROR_BACKOFF_BASE_SECS),
            backoff_max: Duration::from_secs(ERROR_BACKOFF_MAX_SECS),
        }
    }
}

impl RunnerConfig {
    /// Delay before retry number `failures` (1-based).
    fn backoff(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(31);
        self.backoff_base
            .saturating_mul(1u32 << exp)
            .min(self.backoff_max)
    }
}

/// Work queue that feeds a `Reconcile` implementation.
///
/// Identities are scheduled from the initial listing, from watch events and
/// from the `Action` each cycle returns. An identity is never reconciled by
/// two workers at once; notifications that arrive while it runs are folded
/// into a single follow-up cycle.
pub struct Runner<R: Reconcile> {
    reconciler: Arc<R>,
    events: EventLog,
    config: RunnerConfig,
    metrics: Arc<MetricsRegistry>,
}

type CycleResult<E> = (ObjectKey, Result<Action, E>);

impl<R: Reconcile> Runner<R> {
    pub fn new(
        reconciler: Arc<R>,
        events: EventLog,
        config: RunnerConfig,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            reconciler,
            events,
            config,
            metrics,
        }
    }

    /// Run in the background until `shutdown` flips to `true` or its sender
    /// is dropped.
    pub fn start(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let name = self.reconciler.name().to_string();
        info!(
            "{} started (workers={}, debounce={}ms)",
            name,
            self.config.workers,
            self.config.debounce.as_millis()
        );

        // Subscribe before listing so nothing written in between is missed.
        let mut events = self.events.subscribe();
        let mut events_open = true;
        let mut queue = Queue::default();
        let mut tasks: JoinSet<CycleResult<R::Error>> = JoinSet::new();
        let mut resync = Resync::due_now();

        loop {
            if *shutdown.borrow() {
                break;
            }

            let now = Instant::now();
            if resync.is_due(now) {
                self.resync(&mut queue, &mut resync, now).await;
            }
            self.dispatch(&mut queue, &mut tasks, Instant::now());
            self.metrics.gauge_set(QUEUE_DEPTH, queue.due.len() as i64);
            self.metrics.gauge_set(INFLIGHT, queue.running.len() as i64);

            let wake = match (queue.next_wake(self.config.workers), resync.at) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                received = events.recv(), if events_open => match received {
                    Ok(event) => {
                        if let Some(key) = self.reconciler.key_for_event(&event.key) {
                            debug!("{}: {:?} {} schedules {}", name, event.event_type, event.key, key);
                            queue.schedule(key, Instant::now() + self.config.debounce);
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!("{}: watch lagged by {} events, relisting", name, missed);
                        resync = Resync::due_now();
                    }
                    Err(RecvError::Closed) => {
                        warn!("{}: watch stream closed, relying on requeues", name);
                        events_open = false;
                    }
                },
                Some(joined) = tasks.join_next_with_id(), if !tasks.is_empty() => {
                    self.complete(&mut queue, joined);
                }
                _ = sleep_until(wake.unwrap_or(now)), if wake.is_some() => {}
            }
        }

        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
        self.metrics.gauge_set(INFLIGHT, 0);
        info!("{} stopped", name);
    }

    async fn resync(&self, queue: &mut Queue, resync: &mut Resync, now: Instant) {
        match self.reconciler.list_keys().await {
            Ok(keys) => {
                debug!("{}: scheduling {} identities", self.reconciler.name(), keys.len());
                for key in keys {
                    queue.schedule(key, now);
                }
                *resync = Resync::default();
            }
            Err(e) => {
                resync.failures += 1;
                let delay = self.config.backoff(resync.failures);
                warn!(
                    "{}: listing failed, retrying in {:?}: {:#}",
                    self.reconciler.name(),
                    delay,
                    e
                );
                resync.at = Some(now + delay);
            }
        }
    }

    fn dispatch(
        &self,
        queue: &mut Queue,
        tasks: &mut JoinSet<CycleResult<R::Error>>,
        now: Instant,
    ) {
        let free = self.config.workers.saturating_sub(queue.running.len());
        for key in queue.take_ready(now, free) {
            let reconciler = self.reconciler.clone();
            let task_key = key.clone();
            let handle = tasks.spawn(async move {
                let result = reconciler.run(&task_key).await;
                (task_key, result)
            });
            queue.started(handle.id(), key);
        }
    }

    fn complete(
        &self,
        queue: &mut Queue,
        joined: Result<(task::Id, CycleResult<R::Error>), JoinError>,
    ) {
        let name = self.reconciler.name();
        let now = Instant::now();
        match joined {
            Ok((id, (key, result))) => {
                queue.finished(id);
                match result {
                    Ok(Action::RequeueAfter(delay)) => {
                        queue.failures.remove(&key);
                        queue.schedule(key, now + delay);
                    }
                    Ok(Action::Done) => {
                        queue.failures.remove(&key);
                    }
                    Err(e) => {
                        let delay = self.retry(queue, &key);
                        warn!(
                            "{}: reconcile {} failed, retrying in {:?}: {}",
                            name,
                            key,
                            delay,
                            error_chain(&e)
                        );
                        queue.schedule(key, now + delay);
                    }
                }
            }
            Err(e) => {
                let Some(key) = queue.finished(e.id()) else {
                    return;
                };
                if e.is_panic() {
                    let delay = self.retry(queue, &key);
                    error!("{}: reconcile {} panicked, retrying in {:?}", name, key, delay);
                    queue.schedule(key, now + delay);
                }
            }
        }
    }

    fn retry(&self, queue: &mut Queue, key: &ObjectKey) -> Duration {
        let failures = queue.failures.entry(key.clone()).or_insert(0);
        *failures += 1;
        self.config.backoff(*failures)
    }
}

#[derive(Default)]
struct Queue {
    /// Next due time per identity.
    due: HashMap<ObjectKey, Instant>,
    running: HashSet<ObjectKey>,
    in_flight: HashMap<task::Id, ObjectKey>,
    /// Consecutive failed cycles per identity.
    failures: HashMap<ObjectKey, u32>,
}

impl Queue {
    /// Keep the earliest of the existing and the new due time.
    fn schedule(&mut self, key: ObjectKey, at: Instant) {
        self.due
            .entry(key)
            .and_modify(|due| *due = (*due).min(at))
            .or_insert(at);
    }

    /// When the loop has to look at the queue again. With every worker busy
    /// nothing can start before a cycle completes, and the join branch
    /// already wakes the loop for that.
    fn next_wake(&self, workers: usize) -> Option<Instant> {
        if self.running.len() >= workers {
            return None;
        }
        self.next_due()
    }

    /// Earliest due time among identities that are not running.
    fn next_due(&self) -> Option<Instant> {
        self.due
            .iter()
            .filter(|(key, _)| !self.running.contains(*key))
            .map(|(_, at)| *at)
            .min()
    }

    /// Remove up to `limit` due, idle identities, oldest first.
    fn take_ready(&mut self, now: Instant, limit: usize) -> Vec<ObjectKey> {
        let mut ready: Vec<(Instant, ObjectKey)> = self
            .due
            .iter()
            .filter(|(key, at)| **at <= now && !self.running.contains(*key))
            .map(|(key, at)| (*at, key.clone()))
            .collect();
        ready.sort();
        ready.truncate(limit);
        ready
            .into_iter()
            .map(|(_, key)| {
                self.due.remove(&key);
                key
            })
            .collect()
    }

    fn started(&mut self, id: task::Id, key: ObjectKey) {
        self.running.insert(key.clone());
        self.in_flight.insert(id, key);
    }

    fn finished(&mut self, id: task::Id) -> Option<ObjectKey> {
        let key = self.in_flight.remove(&id)?;
        self.running.remove(&key);
        Some(key)
    }
}

/// Pending full relist of the reconciler's identities.
#[derive(Default)]
struct Resync {
    at: Option<Instant>,
    failures: u32,
}

impl Resync {
    fn due_now() -> Self {
        Self {
            at: Some(Instant::now()),
            failures: 0,
        }
    }

    fn is_due(&self, now: Instant) -> bool {
        self.at.is_some_and(|at| at <= now)
    }
}
