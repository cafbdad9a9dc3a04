// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Scheduling state of threads and wait queues.
//!
//! Threads and queues refer to each other through identifiers into this table: a thread knows the queue it waits on
//! and the queues it owns, a queue knows its owner and its waiters. Whenever the effective value of a thread changes,
//! the change is propagated along the chain of owners of transferring queues.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    runtime::scheduler::ThreadId,
    threads::{
        policy::{
            Priority,
            PriorityBounds,
            RankingPolicy,
        },
        wait_set::{
            WaitRecord,
            WaitSet,
        },
    },
};
use ::rand::{
    rngs::SmallRng,
    SeedableRng,
};
use ::slab::Slab;
use ::std::collections::HashMap;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Identifier of a wait queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QueueId(usize);

/// Scheduling state of a thread.
struct ThreadState {
    /// Base value, set by clients.
    base: Priority,
    /// Cached effective value.
    effective: Priority,
    /// Queues owned by this thread.
    acquired: Vec<QueueId>,
    /// Queue this thread waits on.
    waiting: Option<QueueId>,
}

/// State of a wait queue.
struct QueueState {
    /// Do waiters donate to the owner?
    transfer: bool,
    owner: Option<ThreadId>,
    waiters: WaitSet,
}

/// Scheduling table.
pub struct SchedulingTable {
    policy: Box<dyn RankingPolicy>,
    threads: HashMap<ThreadId, ThreadState>,
    queues: Slab<QueueState>,
    /// Next arrival number.
    arrivals: u64,
    /// Source of lottery draws.
    rng: SmallRng,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl ThreadState {
    fn new(bounds: &PriorityBounds) -> Self {
        Self {
            base: bounds.default,
            effective: bounds.default,
            acquired: Vec::new(),
            waiting: None,
        }
    }
}

impl SchedulingTable {
    /// Creates an empty table. Lottery draws are reproducible when `seed` is given.
    pub fn new(policy: Box<dyn RankingPolicy>, seed: Option<u64>) -> Self {
        let rng: SmallRng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Self {
            policy,
            threads: HashMap::new(),
            queues: Slab::new(),
            arrivals: 0,
            rng,
        }
    }

    pub fn bounds(&self) -> PriorityBounds {
        self.policy.bounds()
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    //==================================================================================================================
    // Queues
    //==================================================================================================================

    pub fn create_queue(&mut self, transfer: bool) -> QueueId {
        let queue: QueueId = QueueId(self.queues.insert(QueueState {
            transfer,
            owner: None,
            waiters: WaitSet::default(),
        }));
        trace!("create_queue(): queue={:?}, transfer={:?}", queue, transfer);
        queue
    }

    /// Removes a queue. Waiters are detached and the owner loses whatever the queue donated to it.
    pub fn destroy_queue(&mut self, queue: QueueId) {
        let state: QueueState = match self.queues.try_remove(queue.0) {
            Some(state) => state,
            None => {
                warn!("destroy_queue(): unknown queue (queue={:?})", queue);
                return;
            },
        };
        if !state.waiters.is_empty() {
            warn!(
                "destroy_queue(): detaching waiters (queue={:?}, waiters={:?})",
                queue,
                state.waiters.len()
            );
        }
        for record in state.waiters.iter() {
            if let Some(thread) = self.threads.get_mut(&record.thread) {
                thread.waiting = None;
            }
        }
        if let Some(owner) = state.owner {
            if let Some(thread) = self.threads.get_mut(&owner) {
                thread.acquired.retain(|acquired| *acquired != queue);
            }
            self.refresh_effective_priority(owner);
        }
        trace!("destroy_queue(): queue={:?}", queue);
    }

    /// Enqueues `thread` on `queue`. A thread that owns `queue` gives up ownership first.
    pub fn wait_for_access(&mut self, queue: QueueId, thread: ThreadId) {
        if let Some(other) = self.waiting_queue(thread) {
            panic!(
                "wait_for_access(): thread {:?} already waits on queue {:?} (queue={:?})",
                thread, other, queue
            );
        }
        if self.queue(queue).owner == Some(thread) {
            self.release_ownership(queue);
        }

        let arrival: u64 = self.arrivals;
        self.arrivals += 1;
        let state: &mut ThreadState = self.state_mut(thread);
        state.waiting = Some(queue);
        let record: WaitRecord = WaitRecord::new(thread, state.effective, arrival);

        let queue_state: &mut QueueState = queue_mut(&mut self.queues, queue);
        queue_state.waiters.insert(record, self.policy.as_ref());
        trace!(
            "wait_for_access(): queue={:?}, thread={:?}, weight={:?}, arrival={:?}",
            queue,
            thread,
            record.weight,
            arrival
        );

        let owner: Option<ThreadId> = if queue_state.transfer { queue_state.owner } else { None };
        if let Some(owner) = owner {
            self.refresh_effective_priority(owner);
        }
    }

    /// Makes `thread` the owner of `queue`, revoking the previous owner. A pending record of `thread` in `queue` is
    /// removed.
    pub fn acquire(&mut self, queue: QueueId, thread: ThreadId) {
        let waiting: Option<QueueId> = self.waiting_queue(thread);
        if let Some(other) = waiting {
            if other != queue {
                panic!(
                    "acquire(): thread {:?} waits on queue {:?} (queue={:?})",
                    thread, other, queue
                );
            }
        }
        self.release_ownership(queue);

        let queue_state: &mut QueueState = queue_mut(&mut self.queues, queue);
        if waiting == Some(queue) {
            queue_state.waiters.remove(thread);
        }
        queue_state.owner = Some(thread);
        let state: &mut ThreadState = self.state_mut(thread);
        state.waiting = None;
        state.acquired.push(queue);
        trace!("acquire(): queue={:?}, thread={:?}", queue, thread);
        self.refresh_effective_priority(thread);
    }

    /// Hands `queue` over to the waiter picked by the policy. Returns `None` and clears the owner if nobody waits.
    pub fn next_thread(&mut self, queue: QueueId) -> Option<ThreadId> {
        let queue_state: &QueueState = queue_ref(&self.queues, queue);
        let winner: Option<ThreadId> = self
            .policy
            .select(&queue_state.waiters, &mut self.rng)
            .and_then(|index| queue_state.waiters.get(index))
            .map(|record| record.thread);
        match winner {
            Some(thread) => {
                self.acquire(queue, thread);
                Some(thread)
            },
            None => {
                self.release_ownership(queue);
                None
            },
        }
    }

    /// Clears the owner of `queue`, withdrawing its donation.
    pub fn release_ownership(&mut self, queue: QueueId) {
        let owner: Option<ThreadId> = queue_mut(&mut self.queues, queue).owner.take();
        if let Some(owner) = owner {
            if let Some(state) = self.threads.get_mut(&owner) {
                state.acquired.retain(|acquired| *acquired != queue);
            }
            trace!("release_ownership(): queue={:?}, owner={:?}", queue, owner);
            self.refresh_effective_priority(owner);
        }
    }

    pub fn owner(&self, queue: QueueId) -> Option<ThreadId> {
        self.queue(queue).owner
    }

    pub fn num_waiters(&self, queue: QueueId) -> usize {
        self.queue(queue).waiters.len()
    }

    /// Sum of the weights of the waiters of `queue`.
    pub fn weight_sum(&self, queue: QueueId) -> u64 {
        self.queue(queue).waiters.weight_sum()
    }

    pub fn is_transfer(&self, queue: QueueId) -> bool {
        self.queue(queue).transfer
    }

    //==================================================================================================================
    // Threads
    //==================================================================================================================

    pub fn waiting_queue(&self, thread: ThreadId) -> Option<QueueId> {
        self.threads.get(&thread).and_then(|state| state.waiting)
    }

    pub fn priority(&self, thread: ThreadId) -> Priority {
        self.threads
            .get(&thread)
            .map_or(self.policy.bounds().default, |state| state.base)
    }

    pub fn effective_priority(&self, thread: ThreadId) -> Priority {
        self.threads
            .get(&thread)
            .map_or(self.policy.bounds().default, |state| state.effective)
    }

    /// Sets the base value of `thread`. Values outside the bounds of the policy are fatal.
    pub fn set_priority(&mut self, thread: ThreadId, priority: Priority) {
        let bounds: PriorityBounds = self.policy.bounds();
        if !bounds.contains(priority) {
            panic!(
                "set_priority(): priority {:?} out of range [{:?}, {:?}] (thread={:?})",
                priority, bounds.min, bounds.max, thread
            );
        }
        trace!("set_priority(): thread={:?}, priority={:?}", thread, priority);
        self.state_mut(thread).base = priority;
        self.refresh_effective_priority(thread);
    }

    /// Forgets a thread. Its pending record is removed and the queues it owns are left without owner.
    pub fn remove_thread(&mut self, thread: ThreadId) {
        let state: ThreadState = match self.threads.remove(&thread) {
            Some(state) => state,
            None => return,
        };
        if let Some(queue) = state.waiting {
            let owner: Option<ThreadId> = match self.queues.get_mut(queue.0) {
                Some(queue_state) => {
                    queue_state.waiters.remove(thread);
                    if queue_state.transfer {
                        queue_state.owner
                    } else {
                        None
                    }
                },
                None => None,
            };
            if let Some(owner) = owner {
                self.refresh_effective_priority(owner);
            }
        }
        if !state.acquired.is_empty() {
            warn!(
                "remove_thread(): thread still owns queues (thread={:?}, queues={:?})",
                thread, state.acquired
            );
        }
        for queue in state.acquired {
            if let Some(queue_state) = self.queues.get_mut(queue.0) {
                queue_state.owner = None;
            }
        }
        trace!("remove_thread(): thread={:?}", thread);
    }

    /// Effective value of `thread` from scratch: its base value combined with the donation of every transferring
    /// queue it owns.
    fn compute_effective(&self, thread: ThreadId) -> Priority {
        let state: &ThreadState = match self.threads.get(&thread) {
            Some(state) => state,
            None => return self.policy.bounds().default,
        };
        state
            .acquired
            .iter()
            .map(|queue| queue_ref(&self.queues, *queue))
            .filter(|queue| queue.transfer)
            .fold(state.base, |effective, queue| {
                self.policy.combine(effective, self.policy.donation(&queue.waiters))
            })
    }

    /// Recomputes the effective value of `thread` and propagates a change along the chain of owners.
    fn refresh_effective_priority(&mut self, thread: ThreadId) {
        let mut thread: ThreadId = thread;
        let mut hops: usize = 0;
        loop {
            let effective: Priority = self.compute_effective(thread);
            let state: &mut ThreadState = self.state_mut(thread);
            if state.effective == effective {
                return;
            }
            debug!(
                "refresh_effective_priority(): thread={:?}, effective={:?} -> {:?}",
                thread, state.effective, effective
            );
            state.effective = effective;

            // Re-rank the pending record, keeping its arrival number.
            let queue: QueueId = match state.waiting {
                Some(queue) => queue,
                None => return,
            };
            let queue_state: &mut QueueState = queue_mut(&mut self.queues, queue);
            let mut record: WaitRecord = match queue_state.waiters.remove(thread) {
                Some(record) => record,
                None => panic!(
                    "refresh_effective_priority(): thread {:?} has no record in queue {:?}",
                    thread, queue
                ),
            };
            record.weight = effective;
            queue_state.waiters.insert(record, self.policy.as_ref());

            if !queue_state.transfer {
                return;
            }
            thread = match queue_state.owner {
                Some(owner) => owner,
                None => return,
            };
            hops += 1;
            assert!(
                hops <= self.threads.len(),
                "refresh_effective_priority(): ownership cycle through thread {:?}",
                thread
            );
        }
    }

    fn state_mut(&mut self, thread: ThreadId) -> &mut ThreadState {
        let bounds: PriorityBounds = self.policy.bounds();
        self.threads.entry(thread).or_insert_with(|| ThreadState::new(&bounds))
    }

    fn queue(&self, queue: QueueId) -> &QueueState {
        queue_ref(&self.queues, queue)
    }
}

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

fn queue_ref(queues: &Slab<QueueState>, queue: QueueId) -> &QueueState {
    match queues.get(queue.0) {
        Some(state) => state,
        None => panic!("unknown queue {:?}", queue),
    }
}

fn queue_mut(queues: &mut Slab<QueueState>, queue: QueueId) -> &mut QueueState {
    match queues.get_mut(queue.0) {
        Some(state) => state,
        None => panic!("unknown queue {:?}", queue),
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl From<usize> for QueueId {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

impl From<QueueId> for usize {
    fn from(value: QueueId) -> Self {
        value.0
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
