// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    runtime::{
        scheduler::ThreadId,
        SharedKernel,
    },
    threads::table::QueueId,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Ordered wait queue. Waiters are ranked by the active policy of the kernel. If the queue transfers, waiters donate
/// to its owner. All operations must be called inside the atomic region. Dropping the queue detaches its waiters.
pub struct WaitQueue {
    kernel: SharedKernel,
    id: QueueId,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl WaitQueue {
    pub fn new(kernel: SharedKernel, transfer: bool) -> Self {
        let mut kernel: SharedKernel = kernel;
        let id: QueueId = kernel.create_queue(transfer);
        Self { kernel, id }
    }

    pub fn id(&self) -> QueueId {
        self.id
    }

    /// Enqueues `thread`. The caller is expected to block `thread` afterwards.
    pub fn wait_for_access(&mut self, thread: ThreadId) {
        self.kernel.wait_for_access(self.id, thread);
    }

    /// Makes `thread` the owner of this queue without waiting.
    pub fn acquire(&mut self, thread: ThreadId) {
        self.kernel.acquire(self.id, thread);
    }

    /// Hands this queue over to the next waiter and returns it. The caller is expected to make it ready.
    pub fn next_thread(&mut self) -> Option<ThreadId> {
        self.kernel.next_thread(self.id)
    }

    pub fn owner(&self) -> Option<ThreadId> {
        self.kernel.queue_owner(self.id)
    }

    pub fn len(&self) -> usize {
        self.kernel.num_waiters(self.id)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Drop for WaitQueue {
    fn drop(&mut self) {
        self.kernel.destroy_queue(self.id);
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
