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
    threads::queue::WaitQueue,
};
use ::std::ops::{
    Deref,
    DerefMut,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Mutual exclusion lock. Waiters donate to the holder.
pub struct Lock {
    kernel: SharedKernel,
    holder: Option<ThreadId>,
    queue: WaitQueue,
}

#[derive(Clone)]
pub struct SharedLock(SharedObject<Lock>);

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl SharedLock {
    pub fn new(kernel: SharedKernel) -> Self {
        let queue: WaitQueue = WaitQueue::new(kernel.clone(), true);
        Self(SharedObject::new(Lock {
            kernel,
            holder: None,
            queue,
        }))
    }

    /// Acquires the lock, blocking until the holder hands it over. Acquiring a lock twice is fatal.
    pub async fn acquire(&mut self) {
        let kernel: SharedKernel = self.kernel.clone();
        let current: ThreadId = kernel.current_thread();
        let _guard: InterruptGuard = kernel.atomic_region();
        if self.holder == Some(current) {
            panic!("acquire(): thread {:?} already holds the lock", current);
        }
        if self.holder.is_none() {
            self.queue.acquire(current);
            self.holder = Some(current);
            trace!("acquire(): thread={:?}", current);
        } else {
            trace!("acquire(): thread={:?}, holder={:?}", current, self.holder);
            self.queue.wait_for_access(current);
            kernel.block_current_thread().await;
            // The releaser hands the lock over before waking us.
            debug_assert_eq!(self.holder, Some(current));
        }
    }

    /// Releases the lock and hands it over to the next waiter, if any. The caller must hold the lock.
    pub fn release(&mut self) {
        let mut kernel: SharedKernel = self.kernel.clone();
        let _guard: InterruptGuard = kernel.atomic_region();
        let current: ThreadId = kernel.current_thread();
        if self.holder != Some(current) {
            panic!(
                "release(): thread {:?} does not hold the lock (holder={:?})",
                current, self.holder
            );
        }
        self.holder = self.queue.next_thread();
        trace!("release(): thread={:?}, next={:?}", current, self.holder);
        if let Some(next) = self.holder {
            kernel.mark_ready(next);
        }
    }

    pub fn is_held_by_current_thread(&self) -> bool {
        self.holder.is_some() && self.holder == self.kernel.try_current_thread()
    }

    pub fn holder(&self) -> Option<ThreadId> {
        self.holder
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Deref for SharedLock {
    type Target = Lock;

    fn deref(&self) -> &Self::Target {
        self.0.deref()
    }
}

impl DerefMut for SharedLock {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.deref_mut()
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
