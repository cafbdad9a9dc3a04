// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    runtime::{
        interrupt::InterruptGuard,
        scheduler::ThreadId,
        SharedKernel,
        SharedObject,
    },
    threads::{
        lock::SharedLock,
        queue::WaitQueue,
    },
};
use ::std::ops::{
    Deref,
    DerefMut,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Condition variable. Threads sleep on it while holding the associated lock, which is given up while they sleep.
/// Sleepers do not donate to anyone.
pub struct Condition {
    kernel: SharedKernel,
    lock: SharedLock,
    queue: WaitQueue,
}

#[derive(Clone)]
pub struct SharedCondition(SharedObject<Condition>);

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl SharedCondition {
    pub fn new(kernel: SharedKernel, lock: SharedLock) -> Self {
        let queue: WaitQueue = WaitQueue::new(kernel.clone(), false);
        Self(SharedObject::new(Condition { kernel, lock, queue }))
    }

    /// Atomically releases the lock and sleeps until woken, then reacquires the lock. The caller must hold the lock.
    pub async fn sleep(&mut self) {
        if !self.lock.is_held_by_current_thread() {
            panic!("sleep(): lock is not held by the current thread");
        }
        let kernel: SharedKernel = self.kernel.clone();
        let current: ThreadId = kernel.current_thread();
        {
            let _guard: InterruptGuard = kernel.atomic_region();
            self.lock.release();
            self.queue.wait_for_access(current);
            trace!("sleep(): thread={:?}", current);
            kernel.block_current_thread().await;
        }
        let mut lock: SharedLock = self.lock.clone();
        lock.acquire().await;
    }

    /// Wakes one sleeper, if any. The caller must hold the lock.
    pub fn wake(&mut self) {
        if !self.lock.is_held_by_current_thread() {
            panic!("wake(): lock is not held by the current thread");
        }
        let mut kernel: SharedKernel = self.kernel.clone();
        let _guard: InterruptGuard = kernel.atomic_region();
        if let Some(thread) = self.queue.next_thread() {
            trace!("wake(): thread={:?}", thread);
            kernel.mark_ready(thread);
        }
    }

    /// Wakes every sleeper. The caller must hold the lock.
    pub fn wake_all(&mut self) {
        if !self.lock.is_held_by_current_thread() {
            panic!("wake_all(): lock is not held by the current thread");
        }
        let mut kernel: SharedKernel = self.kernel.clone();
        let _guard: InterruptGuard = kernel.atomic_region();
        while let Some(thread) = self.queue.next_thread() {
            trace!("wake_all(): thread={:?}", thread);
            kernel.mark_ready(thread);
        }
    }

    /// Number of sleepers.
    pub fn num_sleepers(&self) -> usize {
        self.queue.len()
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Deref for SharedCondition {
    type Target = Condition;

    fn deref(&self) -> &Self::Target {
        self.0.deref()
    }
}

impl DerefMut for SharedCondition {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.deref_mut()
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
