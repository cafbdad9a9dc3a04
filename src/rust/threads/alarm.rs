// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use crate::runtime::{
    interrupt::InterruptGuard,
    scheduler::ThreadId,
    timer::TimerInterrupt,
    SharedKernel,
    SharedObject,
};
use ::std::{
    cmp::{
        Ordering,
        Reverse,
    },
    collections::BinaryHeap,
    ops::{
        Deref,
        DerefMut,
    },
};

//==============================================================================
// Structures
//==============================================================================

struct AlarmEntry {
    wake_time: u64,
    /// Insertion order, to release equal deadlines first come first served.
    sequence: u64,
    thread: ThreadId,
}

/// Sleeping threads, earliest deadline first.
struct AlarmQueue {
    // Use a reverse to get a min heap.
    heap: BinaryHeap<Reverse<AlarmEntry>>,
    sequence: u64,
}

#[derive(Clone)]
struct SharedAlarmQueue(SharedObject<AlarmQueue>);

/// Puts threads to sleep until a deadline. Sleepers are released by the timer interrupt.
#[derive(Clone)]
pub struct Alarm {
    kernel: SharedKernel,
    queue: SharedAlarmQueue,
}

//==============================================================================
// Associate Functions
//==============================================================================

impl SharedAlarmQueue {
    fn push(&mut self, wake_time: u64, thread: ThreadId) {
        let sequence: u64 = self.sequence;
        self.sequence += 1;
        self.heap.push(Reverse(AlarmEntry {
            wake_time,
            sequence,
            thread,
        }));
    }
}

impl Alarm {
    /// Creates an alarm and registers it with the timer interrupt of `kernel`.
    pub fn new(kernel: SharedKernel) -> Self {
        let mut kernel: SharedKernel = kernel;
        let queue: SharedAlarmQueue = SharedAlarmQueue(SharedObject::new(AlarmQueue {
            heap: BinaryHeap::new(),
            sequence: 0,
        }));
        kernel.register_timer_handler(Box::new(queue.clone()));
        Self { kernel, queue }
    }

    /// Puts the current thread to sleep for at least `ticks`. The thread is released by the first timer interrupt at
    /// or after the deadline, so even a zero wait lasts until the next interrupt.
    pub async fn wait_until(&self, ticks: u64) {
        let kernel: SharedKernel = self.kernel.clone();
        let current: ThreadId = kernel.current_thread();
        let _guard: InterruptGuard = kernel.atomic_region();
        let wake_time: u64 = kernel.now().saturating_add(ticks);
        trace!("wait_until(): thread={:?}, wake_time={:?}", current, wake_time);
        let mut queue: SharedAlarmQueue = self.queue.clone();
        queue.push(wake_time, current);
        kernel.block_current_thread().await;
    }

    /// Number of sleeping threads.
    pub fn num_sleepers(&self) -> usize {
        self.queue.heap.len()
    }
}

//==============================================================================
// Trait Implementations
//==============================================================================

impl TimerInterrupt for SharedAlarmQueue {
    fn on_timer_tick(&mut self, kernel: &mut SharedKernel) {
        let now: u64 = kernel.now();
        while let Some(Reverse(entry)) = self.heap.peek() {
            if now < entry.wake_time {
                break;
            }
            if let Some(Reverse(entry)) = self.heap.pop() {
                trace!("on_timer_tick(): thread={:?}, wake_time={:?}, now={:?}", entry.thread, entry.wake_time, now);
                kernel.mark_ready(entry.thread);
            }
        }
    }

    fn has_pending(&self) -> bool {
        !self.heap.is_empty()
    }
}

impl Deref for SharedAlarmQueue {
    type Target = AlarmQueue;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for SharedAlarmQueue {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.deref_mut()
    }
}

impl PartialEq for AlarmEntry {
    fn eq(&self, other: &AlarmEntry) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AlarmEntry {}

impl PartialOrd for AlarmEntry {
    fn partial_cmp(&self, other: &AlarmEntry) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AlarmEntry {
    fn cmp(&self, other: &AlarmEntry) -> Ordering {
        self.wake_time
            .cmp(&other.wake_time)
            .then(self.sequence.cmp(&other.sequence))
    }
}

//==============================================================================
// Unit Tests
//==============================================================================
