//! The action dispatch pipeline: per-resource conflict resolution, FIFO
//! waiter queues, parallel workers over non-conflicting resources, and the
//! sliding-window latency telemetry.
//!
//! Scheduling model: a batch is sorted by timestamp, actions whose resource
//! is free go straight to the worker pool, contended actions wait FIFO
//! behind the current holder, and each completion hands the lock to the
//! next waiter. An action holds at most one resource lock at a time, which
//! rules out deadlock by construction. Cancellation applies to actions that
//! have not yet acquired their lock; in-flight actions run to completion.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use bevy::prelude::Resource;
use crossbeam_channel::unbounded;

use world_runtime::{ActionEnvelope, ResourceClaim};

/// Result of a lock acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Acquired,
    /// Enqueued behind the holder; position is 1-based in the wait queue.
    Queued { position: usize },
}

#[derive(Debug, Default)]
struct LockState {
    holder: Option<String>,
    waiters: VecDeque<String>,
}

/// Per-resource lock table. Thread-safe; waiters are FIFO.
#[derive(Debug, Default)]
pub struct ConflictResolver {
    locks: Mutex<HashMap<ResourceClaim, LockState>>,
}

impl ConflictResolver {
    pub fn try_acquire(&self, claim: &ResourceClaim, action_id: &str) -> LockOutcome {
        let mut locks = self.locks.lock().expect("conflict resolver lock");
        let state = locks.entry(claim.clone()).or_default();
        if state.holder.is_none() {
            state.holder = Some(action_id.to_owned());
            LockOutcome::Acquired
        } else {
            state.waiters.push_back(action_id.to_owned());
            LockOutcome::Queued {
                position: state.waiters.len(),
            }
        }
    }

    /// Release a held lock. Returns the next holder, if any waiter was
    /// promoted. Releasing a lock one does not hold is a no-op.
    pub fn release(&self, claim: &ResourceClaim, action_id: &str) -> Option<String> {
        let mut locks = self.locks.lock().expect("conflict resolver lock");
        let state = locks.get_mut(claim)?;
        if state.holder.as_deref() != Some(action_id) {
            return None;
        }
        state.holder = state.waiters.pop_front();
        let next = state.holder.clone();
        if state.holder.is_none() {
            locks.remove(claim);
        }
        next
    }

    /// Drop a waiting action from a resource's queue. Actions that already
    /// hold the lock are not affected.
    pub fn remove_queued_action(&self, claim: &ResourceClaim, action_id: &str) -> bool {
        let mut locks = self.locks.lock().expect("conflict resolver lock");
        let Some(state) = locks.get_mut(claim) else {
            return false;
        };
        let before = state.waiters.len();
        state.waiters.retain(|id| id != action_id);
        state.waiters.len() < before
    }

    pub fn queue_depth(&self, claim: &ResourceClaim) -> usize {
        let locks = self.locks.lock().expect("conflict resolver lock");
        locks.get(claim).map(|s| s.waiters.len()).unwrap_or(0)
    }

    pub fn holder(&self, claim: &ResourceClaim) -> Option<String> {
        let locks = self.locks.lock().expect("conflict resolver lock");
        locks.get(claim).and_then(|s| s.holder.clone())
    }
}

/// Sliding-window per-action latency tracker.
#[derive(Debug)]
pub struct LatencyWindow {
    samples: Mutex<VecDeque<Duration>>,
    capacity: usize,
}

impl Default for LatencyWindow {
    fn default() -> Self {
        Self::with_capacity(1_024)
    }
}

impl LatencyWindow {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&self, sample: Duration) {
        let mut samples = self.samples.lock().expect("latency window lock");
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.lock().expect("latency window lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn average(&self) -> Option<Duration> {
        let samples = self.samples.lock().expect("latency window lock");
        if samples.is_empty() {
            return None;
        }
        let total: Duration = samples.iter().sum();
        Some(total / samples.len() as u32)
    }

    /// 95th-percentile sample in the current window.
    pub fn p95(&self) -> Option<Duration> {
        let samples = self.samples.lock().expect("latency window lock");
        if samples.is_empty() {
            return None;
        }
        let mut sorted: Vec<Duration> = samples.iter().copied().collect();
        sorted.sort_unstable();
        let rank = ((sorted.len() as f64 * 0.95).ceil() as usize).clamp(1, sorted.len());
        Some(sorted[rank - 1])
    }
}

/// Completion report for one dispatched batch.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// Action ids in completion order.
    pub completed: Vec<String>,
}

/// The dispatch front door: accepted actions queue here until the next
/// batch is pulled through the worker pool.
#[derive(Resource, Debug, Default)]
pub struct ActionPipeline {
    resolver: ConflictResolver,
    latency: LatencyWindow,
    pending: Mutex<Vec<ActionEnvelope>>,
}

impl ActionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    pub fn latency(&self) -> &LatencyWindow {
        &self.latency
    }

    /// Accept a validated action for the next dispatch batch.
    pub fn submit(&self, envelope: ActionEnvelope) {
        self.pending.lock().expect("pending queue lock").push(envelope);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().expect("pending queue lock").len()
    }

    /// Cancel an action that has not yet entered a dispatch batch.
    pub fn remove_pending_action(&self, action_id: &str) -> bool {
        let mut pending = self.pending.lock().expect("pending queue lock");
        let before = pending.len();
        pending.retain(|a| a.action_id != action_id);
        pending.len() < before
    }

    /// Pull everything pending through the worker pool.
    pub fn dispatch_pending<F>(&self, workers: usize, handler: F) -> DispatchReport
    where
        F: Fn(&ActionEnvelope) + Send + Sync,
    {
        let batch = {
            let mut pending = self.pending.lock().expect("pending queue lock");
            std::mem::take(&mut *pending)
        };
        self.dispatch_batch(batch, workers, handler)
    }

    /// Dispatch one batch. Workers process distinct resources in parallel;
    /// same-resource actions are serialized FIFO behind the holder. Within
    /// a batch, ambiguity is resolved by ascending timestamp (ties on
    /// action id), making the dispatch order deterministic for a given
    /// input set.
    pub fn dispatch_batch<F>(
        &self,
        mut actions: Vec<ActionEnvelope>,
        workers: usize,
        handler: F,
    ) -> DispatchReport
    where
        F: Fn(&ActionEnvelope) + Send + Sync,
    {
        actions.sort_by(|a, b| {
            a.timestamp_ms
                .cmp(&b.timestamp_ms)
                .then_with(|| a.action_id.cmp(&b.action_id))
        });
        let total = actions.len();
        if total == 0 {
            return DispatchReport::default();
        }

        let (job_tx, job_rx) = unbounded::<ActionEnvelope>();
        let (done_tx, done_rx) = unbounded::<ActionEnvelope>();

        // Envelopes waiting on a contended resource, keyed by action id.
        let mut parked: HashMap<String, ActionEnvelope> = HashMap::new();
        for action in actions {
            match ResourceClaim::for_envelope(&action) {
                None => {
                    let _ = job_tx.send(action);
                }
                Some(claim) => match self.resolver.try_acquire(&claim, &action.action_id) {
                    LockOutcome::Acquired => {
                        let _ = job_tx.send(action);
                    }
                    LockOutcome::Queued { .. } => {
                        parked.insert(action.action_id.clone(), action);
                    }
                },
            }
        }

        let mut completed = Vec::with_capacity(total);
        std::thread::scope(|scope| {
            for _ in 0..workers.max(1) {
                let job_rx = job_rx.clone();
                let done_tx = done_tx.clone();
                let handler = &handler;
                let latency = &self.latency;
                scope.spawn(move || {
                    for action in job_rx.iter() {
                        let started = Instant::now();
                        handler(&action);
                        latency.record(started.elapsed());
                        if done_tx.send(action).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(done_tx);

            let mut finished = 0usize;
            while finished < total {
                let action = done_rx.recv().expect("dispatch worker pool alive");
                finished += 1;
                completed.push(action.action_id.clone());

                if let Some(claim) = ResourceClaim::for_envelope(&action) {
                    let mut released = action.action_id.clone();
                    while let Some(next_id) = self.resolver.release(&claim, &released) {
                        if let Some(envelope) = parked.remove(&next_id) {
                            let _ = job_tx.send(envelope);
                            break;
                        }
                        // Promoted waiter was cancelled; pass the lock on.
                        finished += 1;
                        released = next_id;
                    }
                }
            }
            drop(job_tx);
        });

        tracing::debug!(
            target: "everwilds::pipeline",
            dispatched = completed.len(),
            workers = workers.max(1),
            "pipeline.batch_complete"
        );

        DispatchReport { completed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use world_runtime::ActionKind;

    fn harvest(id: &str, node: &str, ts: u64) -> ActionEnvelope {
        ActionEnvelope::new(id, "alia", ActionKind::Harvest, ts)
            .with_param("resource_node_id", json!(node))
    }

    #[test]
    fn locks_serialize_and_queue_fifo() {
        let resolver = ConflictResolver::default();
        let claim = ResourceClaim::Node("node_123".into());
        assert_eq!(resolver.try_acquire(&claim, "a1"), LockOutcome::Acquired);
        assert_eq!(
            resolver.try_acquire(&claim, "a2"),
            LockOutcome::Queued { position: 1 }
        );
        assert_eq!(
            resolver.try_acquire(&claim, "a3"),
            LockOutcome::Queued { position: 2 }
        );
        assert_eq!(resolver.release(&claim, "a1"), Some("a2".into()));
        assert_eq!(resolver.holder(&claim), Some("a2".into()));
        assert_eq!(resolver.release(&claim, "a2"), Some("a3".into()));
        assert_eq!(resolver.release(&claim, "a3"), None);
        assert_eq!(resolver.holder(&claim), None);
    }

    #[test]
    fn queued_actions_can_be_removed() {
        let resolver = ConflictResolver::default();
        let claim = ResourceClaim::Node("node_123".into());
        resolver.try_acquire(&claim, "a1");
        resolver.try_acquire(&claim, "a2");
        assert!(resolver.remove_queued_action(&claim, "a2"));
        assert!(!resolver.remove_queued_action(&claim, "a2"));
        assert_eq!(resolver.release(&claim, "a1"), None);
    }

    #[test]
    fn same_resource_actions_never_overlap() {
        let pipeline = ActionPipeline::new();
        for i in 0..100 {
            pipeline.submit(harvest(&format!("a{i:03}"), "node_123", i));
        }
        let in_flight = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let handled = Arc::new(AtomicUsize::new(0));

        let report = pipeline.dispatch_pending(10, |_action| {
            if in_flight.fetch_add(1, Ordering::SeqCst) != 0 {
                overlaps.fetch_add(1, Ordering::SeqCst);
            }
            std::thread::sleep(Duration::from_micros(200));
            handled.fetch_add(1, Ordering::SeqCst);
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });

        assert_eq!(report.completed.len(), 100, "no action may be lost");
        assert_eq!(handled.load(Ordering::SeqCst), 100);
        assert_eq!(overlaps.load(Ordering::SeqCst), 0, "same resource overlapped");
        assert_eq!(pipeline.pending_len(), 0);
    }

    #[test]
    fn distinct_resources_run_in_parallel_and_in_timestamp_order_per_resource() {
        let pipeline = ActionPipeline::new();
        for i in (0..20).rev() {
            pipeline.submit(harvest(&format!("a{i:02}"), "node_a", i));
        }
        for i in 0..20 {
            pipeline.submit(harvest(&format!("b{i:02}"), "node_b", i));
        }
        let order = Arc::new(Mutex::new(Vec::new()));
        let order_ref = Arc::clone(&order);
        let report = pipeline.dispatch_pending(4, move |action| {
            order_ref
                .lock()
                .expect("order lock")
                .push(action.action_id.clone());
        });
        assert_eq!(report.completed.len(), 40);

        let order = order.lock().expect("order lock");
        let node_a: Vec<_> = order.iter().filter(|id| id.starts_with('a')).collect();
        let mut sorted = node_a.clone();
        sorted.sort();
        assert_eq!(node_a, sorted, "per-resource order must follow timestamps");
    }

    #[test]
    fn unclaimed_actions_flow_straight_through() {
        let pipeline = ActionPipeline::new();
        for i in 0..8 {
            pipeline.submit(
                ActionEnvelope::new(format!("c{i}"), "alia", ActionKind::Chat, i)
                    .with_param("message", json!("hello")),
            );
        }
        let report = pipeline.dispatch_pending(4, |_| {});
        assert_eq!(report.completed.len(), 8);
    }

    #[test]
    fn pending_actions_can_be_cancelled_before_dispatch() {
        let pipeline = ActionPipeline::new();
        pipeline.submit(harvest("a1", "node_123", 1));
        pipeline.submit(harvest("a2", "node_123", 2));
        assert!(pipeline.remove_pending_action("a2"));
        assert!(!pipeline.remove_pending_action("a2"));
        let report = pipeline.dispatch_pending(2, |_| {});
        assert_eq!(report.completed, vec!["a1".to_owned()]);
    }

    #[test]
    fn latency_window_reports_average_and_p95() {
        let window = LatencyWindow::with_capacity(100);
        for ms in 1..=100u64 {
            window.record(Duration::from_millis(ms));
        }
        assert_eq!(window.average(), Some(Duration::from_micros(50_500)));
        assert_eq!(window.p95(), Some(Duration::from_millis(95)));

        // The window slides: old samples roll out.
        window.record(Duration::from_millis(200));
        assert_eq!(window.len(), 100);
    }
}
