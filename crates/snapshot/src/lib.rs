//! Snapshot ledger for Civic governance
//!
//! A historical value store keyed by `(subject, snapshot id)`. Every ledger
//! draws its ids from a [`SnapshotClock`]; ledgers built on clones of the
//! same clock share one global, totally ordered id space, so the history of
//! one subject (an account's stake) can be joined with the history of
//! another (the formula in force) by comparing ids.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use civic_common::ErrorKind;

/// Global snapshot identifier. `0` means "before any snapshot".
pub type SnapshotId = u64;

/// Error types for snapshot operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// A write did not move the subject's timeline strictly forward
    #[error("Snapshot {attempted} for {subject} is not after its last snapshot {last}")]
    OutOfOrder {
        /// Debug rendering of the subject
        subject: String,
        /// Last id already on the subject's timeline
        last: SnapshotId,
        /// Id that was attempted
        attempted: SnapshotId,
    },

    /// A write used an id the clock has not issued yet
    #[error("Snapshot {attempted} has not been issued (clock is at {current})")]
    FutureId {
        /// Id that was attempted
        attempted: SnapshotId,
        /// Current clock value
        current: SnapshotId,
    },
}

impl SnapshotError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Snapshot
    }
}

/// Result type for snapshot operations
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Monotonic source of snapshot ids. Clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct SnapshotClock {
    current: Arc<AtomicU64>,
}

impl SnapshotClock {
    /// Create a clock at id `0`
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently issued id
    pub fn current(&self) -> SnapshotId {
        self.current.load(Ordering::SeqCst)
    }

    /// Issue the next id
    pub fn advance(&self) -> SnapshotId {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// The recorded history of one subject
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timeline<V> {
    ids: Vec<SnapshotId>,
    values: Vec<V>,
}

impl<V: Clone + Default> Timeline<V> {
    /// Ids at which the subject changed, strictly increasing
    pub fn ids(&self) -> &[SnapshotId] {
        &self.ids
    }

    /// Last id on the timeline
    pub fn last_id(&self) -> Option<SnapshotId> {
        self.ids.last().copied()
    }

    /// Value at the greatest id `<= target`, or the default value
    pub fn value_at(&self, target: SnapshotId) -> V {
        // ids are strictly increasing, so everything left of the partition
        // point is <= target
        let upper = self.ids.partition_point(|id| *id <= target);
        match upper {
            0 => V::default(),
            n => self.values[n - 1].clone(),
        }
    }

    fn latest(&self) -> V {
        self.values.last().cloned().unwrap_or_default()
    }

    fn push(&mut self, id: SnapshotId, value: V) {
        debug_assert!(self.last_id().map_or(true, |last| last < id));
        self.ids.push(id);
        self.values.push(value);
    }
}

/// Historical store of per-subject values
#[derive(Debug, Clone)]
pub struct SnapshotLedger<K, V> {
    clock: SnapshotClock,
    timelines: HashMap<K, Timeline<V>>,
}

impl<K, V> Default for SnapshotLedger<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SnapshotLedger<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone + Default,
{
    /// Create a ledger with its own clock
    pub fn new() -> Self {
        Self::with_clock(SnapshotClock::new())
    }

    /// Create a ledger sharing `clock` with other ledgers
    pub fn with_clock(clock: SnapshotClock) -> Self {
        Self {
            clock,
            timelines: HashMap::new(),
        }
    }

    /// The clock this ledger draws ids from
    pub fn clock(&self) -> &SnapshotClock {
        &self.clock
    }

    /// The most recently issued global id
    pub fn current_id(&self) -> SnapshotId {
        self.clock.current()
    }

    /// Advance the global clock and append the new id to `subject`'s
    /// timeline, carrying its latest value forward.
    ///
    /// Consumes an id even when the value does not change; callers take a
    /// snapshot only when they are about to record a new value.
    pub fn snapshot(&mut self, subject: &K) -> SnapshotId {
        let id = self.clock.advance();
        let timeline = self.timelines.entry(subject.clone()).or_default();
        let carried = timeline.latest();
        timeline.push(id, carried);
        trace!(?subject, id, "snapshot taken");
        id
    }

    /// Take a snapshot of `subject` and record `value` at it
    pub fn record(&mut self, subject: &K, value: V) -> SnapshotId {
        let id = self.snapshot(subject);
        if let Some(timeline) = self.timelines.get_mut(subject) {
            if let Some(last) = timeline.values.last_mut() {
                *last = value;
            }
        }
        id
    }

    /// Record `value` for `subject` at an id already issued by the shared
    /// clock, so several subjects can be written at the same id.
    pub fn record_at(&mut self, subject: &K, id: SnapshotId, value: V) -> SnapshotResult<()> {
        let current = self.clock.current();
        if id > current {
            return Err(SnapshotError::FutureId {
                attempted: id,
                current,
            });
        }

        let timeline = self.timelines.entry(subject.clone()).or_default();
        if let Some(last) = timeline.last_id() {
            if id <= last {
                return Err(SnapshotError::OutOfOrder {
                    subject: format!("{:?}", subject),
                    last,
                    attempted: id,
                });
            }
        }

        timeline.push(id, value);
        trace!(?subject, id, "value recorded");
        Ok(())
    }

    /// Value of `subject` at the greatest timeline id `<= target`.
    ///
    /// Returns the default value when the subject has no history or
    /// `target` precedes its first entry.
    pub fn value_at(&self, subject: &K, target: SnapshotId) -> V {
        self.timelines
            .get(subject)
            .map(|timeline| timeline.value_at(target))
            .unwrap_or_default()
    }

    /// Value of `subject` at the current global id
    pub fn latest(&self, subject: &K) -> V {
        self.value_at(subject, self.current_id())
    }

    /// Ids at which `subject` changed
    pub fn timeline(&self, subject: &K) -> Vec<SnapshotId> {
        self.timelines
            .get(subject)
            .map(|timeline| timeline.ids().to_vec())
            .unwrap_or_default()
    }

    /// Whether `subject` has any recorded history
    pub fn has_history(&self, subject: &K) -> bool {
        self.timelines.contains_key(subject)
    }

    /// Every subject with recorded history
    pub fn subjects(&self) -> impl Iterator<Item = &K> {
        self.timelines.keys()
    }
}
