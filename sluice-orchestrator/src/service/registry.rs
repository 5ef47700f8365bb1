//! Run registry
//!
//! In-memory record of recent runs. The scheduler registers a run when it
//! is accepted, the pipeline runner reports state changes through the
//! [`RunObserver`] impl, and the final report is attached when the run ends.
//! Once the registry is over capacity the oldest finished runs are evicted;
//! runs still in flight are never dropped.

use sluice_core::domain::push::PushNotification;
use sluice_core::domain::run::{RunReport, RunState};
use sluice_core::dto::run::RunRecord;
use sluice_runner::RunObserver;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    records: HashMap<Uuid, RunRecord>,
    /// Run ids, oldest first
    order: VecDeque<Uuid>,
}

/// Bounded, thread-safe store of [`RunRecord`]s
pub struct RunRegistry {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl RunRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records a newly accepted run in `Queued`
    pub fn register(&self, run_id: Uuid, push: &PushNotification) {
        let mut inner = self.lock();
        inner.records.insert(run_id, RunRecord::queued(run_id, push));
        inner.order.push_back(run_id);
        self.evict(&mut inner);
    }

    /// Attaches the final report and moves the record to its terminal state
    pub fn complete(&self, report: RunReport) {
        let mut inner = self.lock();
        if let Some(record) = inner.records.get_mut(&report.run_id) {
            record.state = report.state;
            record.report = Some(report);
        }
        self.evict(&mut inner);
    }

    pub fn get(&self, run_id: Uuid) -> Option<RunRecord> {
        self.lock().records.get(&run_id).cloned()
    }

    /// All records, newest first
    pub fn list(&self) -> Vec<RunRecord> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .rev()
            .filter_map(|id| inner.records.get(id).cloned())
            .collect()
    }

    /// Number of runs not yet in a terminal state
    pub fn active_count(&self) -> usize {
        self.lock()
            .records
            .values()
            .filter(|r| !r.is_finished())
            .count()
    }

    fn evict(&self, inner: &mut Inner) {
        while inner.order.len() > self.capacity {
            let Some(pos) = inner
                .order
                .iter()
                .position(|id| inner.records.get(id).is_some_and(|r| r.is_finished()))
            else {
                break;
            };
            if let Some(id) = inner.order.remove(pos) {
                inner.records.remove(&id);
            }
        }
    }
}

impl RunObserver for RunRegistry {
    fn on_state(&self, run_id: Uuid, state: RunState) {
        if let Some(record) = self.lock().records.get_mut(&run_id) {
            record.state = state;
        }
    }
}
