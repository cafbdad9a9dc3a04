// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Thread registry of the kernel.
//!
//! Threads ([ThreadTask]s) live in a slab. Each thread owns a [Yielder] and a [Waker] that posts its identifier to the
//! ready channel, which the dispatch loop drains into the ready set.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    runtime::{
        interrupt::InterruptLevel,
        scheduler::{
            ThreadCoroutine,
            ThreadId,
            ThreadTask,
            ThreadWaker,
            Yielder,
            YielderHandle,
        },
    },
    threads::table::QueueId,
};
use ::crossbeam_channel::{
    Receiver,
    Sender,
};
use ::slab::Slab;
use ::std::{
    collections::HashMap,
    task::Waker,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Per-thread execution context.
pub struct ThreadSlot {
    /// The coroutine. Taken out of the slot while the thread is being polled.
    task: Option<ThreadTask>,
    /// Yield points of this thread.
    yielder: Yielder,
    /// Waker handed to the coroutine on every poll.
    waker: Waker,
    /// Queue that joiners of this thread wait on.
    join_queue: QueueId,
    /// Interrupt level saved when the thread last suspended.
    interrupts: InterruptLevel,
}

/// Thread Scheduler
pub struct Scheduler {
    // Live threads. The offset into the slab is an internal identifier.
    threads: Slab<ThreadSlot>,
    // Mapping between external thread ids and offsets into the slab.
    ids: HashMap<ThreadId, usize>,
    // Next external identifier to hand out.
    next_id: u64,
    // Track the currently running thread. If no thread is being polled this MUST be None, because we cannot block or
    // yield outside of a thread.
    current: Option<ThreadId>,
    // Wakers post here.
    ready_tx: Sender<ThreadId>,
    // The dispatch loop drains this.
    ready_rx: Receiver<ThreadId>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl ThreadSlot {
    pub fn yielder(&self) -> &Yielder {
        &self.yielder
    }

    pub fn get_handle(&self) -> YielderHandle {
        self.yielder.get_handle()
    }

    pub fn waker(&self) -> Waker {
        self.waker.clone()
    }

    pub fn join_queue(&self) -> QueueId {
        self.join_queue
    }

    pub fn interrupts(&self) -> InterruptLevel {
        self.interrupts
    }

    pub fn set_interrupts(&mut self, level: InterruptLevel) {
        self.interrupts = level;
    }

    pub fn take_task(&mut self) -> Option<ThreadTask> {
        self.task.take()
    }

    pub fn put_task(&mut self, task: ThreadTask) {
        assert!(self.task.is_none(), "put_task(): slot already holds a task");
        self.task = Some(task);
    }
}

impl Scheduler {
    /// Inserts a new thread. Its join queue must already exist.
    pub fn insert(&mut self, name: &str, coroutine: ThreadCoroutine, join_queue: QueueId) -> ThreadId {
        let id: ThreadId = ThreadId::from(self.next_id);
        self.next_id += 1;
        let slot: ThreadSlot = ThreadSlot {
            task: Some(ThreadTask::new(name.to_string(), id, coroutine)),
            yielder: Yielder::new(),
            waker: ::futures::task::waker(ThreadWaker::new(id, self.ready_tx.clone())),
            join_queue,
            interrupts: InterruptLevel::default(),
        };
        let offset: usize = self.threads.insert(slot);
        if let Some(existing) = self.ids.insert(id, offset) {
            panic!("insert(): thread id already in use (offset={:?})", existing);
        }
        trace!("insert(): thread={:?}, name={:?}", id, name);
        id
    }

    /// Removes a thread and returns its context.
    pub fn remove(&mut self, id: ThreadId) -> Option<ThreadSlot> {
        let offset: usize = self.ids.remove(&id)?;
        Some(self.threads.remove(offset))
    }

    pub fn get(&self, id: ThreadId) -> Option<&ThreadSlot> {
        self.threads.get(*self.ids.get(&id)?)
    }

    pub fn get_mut(&mut self, id: ThreadId) -> Option<&mut ThreadSlot> {
        let offset: usize = *self.ids.get(&id)?;
        self.threads.get_mut(offset)
    }

    /// Returns whether this thread id points to a live thread.
    pub fn contains(&self, id: ThreadId) -> bool {
        self.ids.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Returns the running thread, if any.
    pub fn current(&self) -> Option<ThreadId> {
        self.current
    }

    pub fn set_current(&mut self, id: Option<ThreadId>) {
        self.current = id;
    }

    /// Collects the identifiers posted by wakers since the last call, in wake order.
    pub fn drain_woken(&mut self) -> Vec<ThreadId> {
        self.ready_rx.try_iter().collect()
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Default for Scheduler {
    fn default() -> Self {
        let (ready_tx, ready_rx): (Sender<ThreadId>, Receiver<ThreadId>) = ::crossbeam_channel::unbounded();
        Self {
            threads: Slab::new(),
            ids: HashMap::new(),
            // Identifier zero is never handed out.
            next_id: 1,
            current: None,
            ready_tx,
            ready_rx,
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
