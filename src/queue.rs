//! Dependency-keyed retry queue.
//!
//! Operations that arrive before their dependency (thread, message, entry,
//! or membership) wait here, keyed by the missing dependency, FIFO per key.
//! Keyed indexing keeps drain and prune O(1)-per-entry; the queue can grow
//! large under sustained offline or out-of-order delivery.
//!
//! TTL pruning is an accepted data-loss boundary: an entry whose dependency
//! never arrives is discarded after three days. Each drop is logged at
//! `warn` so the loss is at least observable.

use std::collections::{HashMap, VecDeque};

use log::{debug, warn};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

use crate::ids::{EntryID, MessageID, ThreadID, UserID};
use crate::ops::DmOperation;
use crate::result::InapplicabilityReason;

/// How long a queued operation may wait for its dependency: 3 days.
pub const QUEUED_OPERATION_TTL_MS: u64 = 259_200_000;
/// Delay before the first prune sweep after engine start: 10 minutes.
pub const FIRST_PRUNING_DELAY_MS: u64 = 600_000;
/// Interval between prune sweeps: 1 hour.
pub const PRUNING_FREQUENCY_MS: u64 = 3_600_000;

// ---------------------------------------------------------------------------
// Keys and entries
// ---------------------------------------------------------------------------

/// The dependency a queued operation is waiting on.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DependencyKey {
    Thread(ThreadID),
    Message(MessageID),
    Entry(EntryID),
    Membership { thread_id: ThreadID, user_id: UserID },
}

impl DependencyKey {
    /// Map a retryable inapplicability reason to its queue key. `Invalid`
    /// has no key; those operations are dropped, never queued.
    pub fn for_reason(reason: &InapplicabilityReason) -> Option<DependencyKey> {
        match reason {
            InapplicabilityReason::MissingThread(id) => Some(DependencyKey::Thread(id.clone())),
            InapplicabilityReason::MissingMessage(id) => Some(DependencyKey::Message(id.clone())),
            InapplicabilityReason::MissingEntry(id) => Some(DependencyKey::Entry(id.clone())),
            InapplicabilityReason::MissingMembership { thread_id, user_id } => {
                Some(DependencyKey::Membership {
                    thread_id: thread_id.clone(),
                    user_id: user_id.clone(),
                })
            }
            InapplicabilityReason::Invalid => None,
        }
    }
}

impl std::fmt::Display for DependencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DependencyKey::Thread(id) => write!(f, "thread:{id}"),
            DependencyKey::Message(id) => write!(f, "message:{id}"),
            DependencyKey::Entry(id) => write!(f, "entry:{id}"),
            DependencyKey::Membership { thread_id, user_id } => {
                write!(f, "membership:{thread_id}:{user_id}")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueueEntry {
    pub operation: DmOperation,
    pub enqueue_time: u64,
}

// ---------------------------------------------------------------------------
// RetryQueue
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RetryQueue {
    entries: HashMap<DependencyKey, VecDeque<QueueEntry>>,
}

impl RetryQueue {
    pub fn new() -> RetryQueue {
        RetryQueue::default()
    }

    pub fn enqueue(&mut self, operation: DmOperation, key: DependencyKey, now: u64) {
        debug!("queueing {} operation behind {key}", operation.op_type());
        self.entries.entry(key).or_default().push_back(QueueEntry {
            operation,
            enqueue_time: now,
        });
    }

    /// Remove and return all operations waiting on `key`, in submission
    /// order. Called when the dependency becomes locally resolvable.
    pub fn drain(&mut self, key: &DependencyKey) -> Vec<QueueEntry> {
        match self.entries.remove(key) {
            Some(pending) => {
                debug!("draining {} operation(s) behind {key}", pending.len());
                pending.into()
            }
            None => Vec::new(),
        }
    }

    /// Discard every entry enqueued before `max_timestamp`, regardless of
    /// whether its dependency ever arrived. Returns the dropped entries so
    /// callers can surface the loss.
    pub fn prune(&mut self, max_timestamp: u64) -> Vec<QueueEntry> {
        let mut dropped = Vec::new();
        self.entries.retain(|key, pending| {
            let mut kept = VecDeque::with_capacity(pending.len());
            for entry in pending.drain(..) {
                if entry.enqueue_time < max_timestamp {
                    warn!(
                        "dropping expired {} operation queued behind {key} at {}",
                        entry.operation.op_type(),
                        entry.enqueue_time
                    );
                    dropped.push(entry);
                } else {
                    kept.push_back(entry);
                }
            }
            *pending = kept;
            !pending.is_empty()
        });
        dropped
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// QueuePruner
// ---------------------------------------------------------------------------

/// Owned, cancellable prune scheduler: first tick after ten minutes, then
/// hourly. The callback decides what "prune" means (normally
/// `engine.prune_queue(now_ms())`), which also lets tests drive pruning
/// with explicit clocks instead of this timer.
#[derive(Debug)]
pub struct QueuePruner {
    handle: JoinHandle<()>,
}

impl QueuePruner {
    pub fn start(mut on_tick: impl FnMut() + Send + 'static) -> QueuePruner {
        let handle = tokio::spawn(async move {
            let start = Instant::now() + Duration::from_millis(FIRST_PRUNING_DELAY_MS);
            let mut ticker = interval_at(start, Duration::from_millis(PRUNING_FREQUENCY_MS));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                on_tick();
            }
        });
        QueuePruner { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for QueuePruner {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
