/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Background gossip workers and the registry that cancels them.
//!
//! Every call to [`Backend::gossip`](super::Backend::gossip) spawns one worker thread that keeps trying to
//! deliver its payload to the target validators until it either reaches its delivery threshold or is
//! cancelled. Workers are grouped by the height they were started for: all workers of a height share one
//! [`CancelSignal`], which is stored in the [`GossipRegistry`] for as long as any of them is live.

use std::collections::{HashMap, HashSet};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use crate::events::{DeliverGossipEvent, Event};
use crate::networking::{messages::TENDERMINT_MSG, Broadcaster};
use crate::types::data_types::{Address, BlockHeight, Round, Sequence};

/// State shared between the backend and its gossip workers, guarded by a single mutex.
pub(crate) struct SharedState {
    pub(crate) broadcaster: Option<Arc<dyn Broadcaster>>,
    pub(crate) registry: GossipRegistry,
}

impl SharedState {
    pub(crate) fn new(broadcaster: Option<Arc<dyn Broadcaster>>) -> Self {
        Self {
            broadcaster,
            registry: GossipRegistry::new(),
        }
    }
}

/// Lock `mutex`, recovering the guard if another thread panicked while holding it. Every critical section
/// over the guarded state is a single map or flag update, so a poisoned lock never guards a torn value.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A one-way, level-triggered cancellation flag that sleeping workers can be woken up by.
pub(crate) struct CancelSignal {
    cancelled: Mutex<bool>,
    condvar: Condvar,
}

impl CancelSignal {
    pub(crate) fn new() -> Self {
        Self {
            cancelled: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Trigger the signal. Once triggered, it stays triggered.
    pub(crate) fn cancel(&self) {
        *lock(&self.cancelled) = true;
        self.condvar.notify_all();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        *lock(&self.cancelled)
    }

    /// Sleep for `timeout`, returning early if the signal is triggered. Returns whether it was triggered.
    ///
    /// A `timeout` too large to be represented as an [`Instant`] sleeps until the signal is triggered.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut cancelled = lock(&self.cancelled);
        while !*cancelled {
            cancelled = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    self.condvar
                        .wait_timeout(cancelled, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .condvar
                    .wait(cancelled)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
        *cancelled
    }
}

struct HeightEntry {
    signal: Arc<CancelSignal>,
    live_workers: usize,
}

/// Map from height to the cancellation signal shared by the live gossip workers of that height.
pub(crate) struct GossipRegistry {
    heights: HashMap<BlockHeight, HeightEntry>,
}

impl GossipRegistry {
    pub(crate) fn new() -> Self {
        Self {
            heights: HashMap::new(),
        }
    }

    /// Register a new worker for `height` and get the signal that cancels it.
    pub(crate) fn register(&mut self, height: BlockHeight) -> Arc<CancelSignal> {
        let entry = self.heights.entry(height).or_insert_with(|| HeightEntry {
            signal: Arc::new(CancelSignal::new()),
            live_workers: 0,
        });
        entry.live_workers += 1;
        entry.signal.clone()
    }

    /// Deregister a worker of `height` that finished on its own. The height's entry is removed with its
    /// last worker.
    ///
    /// `signal` identifies the entry the worker was registered under, so that a worker outliving a
    /// cancelled entry cannot deregister from a newer entry for the same height.
    pub(crate) fn finish(&mut self, height: BlockHeight, signal: &Arc<CancelSignal>) {
        if let Some(entry) = self.heights.get_mut(&height) {
            if Arc::ptr_eq(&entry.signal, signal) {
                entry.live_workers -= 1;
                if entry.live_workers == 0 {
                    self.heights.remove(&height);
                }
            }
        }
    }

    /// Cancel and remove the workers of every height lower than or equal to `height`. Returns the cancelled
    /// heights in ascending order.
    pub(crate) fn cancel_up_to(&mut self, height: BlockHeight) -> Vec<BlockHeight> {
        let mut stale: Vec<BlockHeight> = self
            .heights
            .keys()
            .filter(|h| **h <= height)
            .copied()
            .collect();
        stale.sort();

        for h in &stale {
            if let Some(entry) = self.heights.remove(h) {
                entry.signal.cancel();
            }
        }
        stale
    }

    /// Cancel and remove every worker.
    pub(crate) fn cancel_all(&mut self) {
        for (_, entry) in self.heights.drain() {
            entry.signal.cancel();
        }
    }

    /// Get the heights that have live workers, in ascending order.
    pub(crate) fn heights(&self) -> Vec<BlockHeight> {
        let mut heights: Vec<BlockHeight> = self.heights.keys().copied().collect();
        heights.sort();
        heights
    }
}

/// One in-flight background broadcast.
pub(crate) struct GossipTask {
    pub(crate) targets: HashSet<Address>,
    pub(crate) height: BlockHeight,
    pub(crate) round: Round,
    pub(crate) sequence: Sequence,
    pub(crate) payload: Vec<u8>,
    /// Number of distinct targets the payload must reach before the task ends.
    pub(crate) required_deliveries: usize,
    pub(crate) signal: Arc<CancelSignal>,
    pub(crate) created_at: Instant,
}

enum AttemptOutcome {
    /// The delivery threshold was reached.
    Delivered,
    /// Some targets are still pending, either because they could not be resolved or because sending failed.
    Pending,
    Cancelled,
}

impl GossipTask {
    /// Try to deliver the payload until the delivery threshold is reached or the task is cancelled. Attempts
    /// are separated by `retry_interval`.
    pub(crate) fn run(
        self,
        shared: Arc<Mutex<SharedState>>,
        retry_interval: Duration,
        event_publisher: Sender<Event>,
    ) {
        let mut delivered = HashSet::new();
        let mut attempts = 0u32;

        loop {
            if self.signal.is_cancelled() {
                break;
            }

            attempts += 1;
            let broadcaster = lock(&shared).broadcaster.clone();
            let outcome = match broadcaster {
                Some(broadcaster) => self.attempt(broadcaster.as_ref(), &mut delivered),
                None => {
                    log::debug!(
                        "gossip of height {} waiting for a broadcaster to be set",
                        self.height
                    );
                    AttemptOutcome::Pending
                }
            };

            match outcome {
                AttemptOutcome::Delivered => {
                    lock(&shared).registry.finish(self.height, &self.signal);
                    log::debug!(
                        "gossip of height {}, round {}, sequence {} delivered to {} validator(s) after {} attempt(s) in {:?}",
                        self.height,
                        self.round,
                        self.sequence,
                        delivered.len(),
                        attempts,
                        self.created_at.elapsed()
                    );
                    Event::publish(
                        &event_publisher,
                        Event::DeliverGossip(DeliverGossipEvent {
                            timestamp: SystemTime::now(),
                            height: self.height,
                            round: self.round,
                            sequence: self.sequence,
                            delivered: delivered.into_iter().collect(),
                            attempts,
                        }),
                    );
                    return;
                }
                AttemptOutcome::Cancelled => break,
                AttemptOutcome::Pending => {
                    if self.signal.wait_timeout(retry_interval) {
                        break;
                    }
                }
            }
        }

        log::debug!(
            "gossip of height {}, round {}, sequence {} cancelled after {} attempt(s)",
            self.height,
            self.round,
            self.sequence,
            attempts
        );
    }

    /// Resolve the targets that have not received the payload yet, and send it to every one of them that
    /// is connected.
    fn attempt(&self, broadcaster: &dyn Broadcaster, delivered: &mut HashSet<Address>) -> AttemptOutcome {
        let pending: HashSet<Address> = self.targets.difference(delivered).copied().collect();
        let peers = broadcaster.find_peers(&pending);
        if peers.is_empty() {
            log::warn!(
                "gossip of height {}: none of {} validator(s) is connected, retrying",
                self.height,
                pending.len()
            );
            return AttemptOutcome::Pending;
        }

        for (address, peer) in peers {
            if !pending.contains(&address) {
                continue;
            }
            if self.signal.is_cancelled() {
                return AttemptOutcome::Cancelled;
            }
            match peer.send(TENDERMINT_MSG, &self.payload) {
                Ok(()) => {
                    delivered.insert(address);
                }
                Err(err) => log::warn!(
                    "gossip of height {}: failed to send to {}: {}",
                    self.height,
                    address,
                    err
                ),
            }
        }

        if delivered.len() >= self.required_deliveries {
            AttemptOutcome::Delivered
        } else {
            AttemptOutcome::Pending
        }
    }
}
