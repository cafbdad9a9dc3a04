// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use crate::runtime::scheduler::ThreadId;
use ::crossbeam_channel::Sender;
use ::futures::task::ArcWake;
use ::std::sync::Arc;

//==============================================================================
// Structures
//==============================================================================

/// Waker of a single thread. Waking it posts the thread identifier to the kernel's ready channel.
pub struct ThreadWaker {
    thread: ThreadId,
    ready_tx: Sender<ThreadId>,
}

//==============================================================================
// Associate Functions
//==============================================================================

impl ThreadWaker {
    pub fn new(thread: ThreadId, ready_tx: Sender<ThreadId>) -> Arc<Self> {
        Arc::new(Self { thread, ready_tx })
    }
}

//==============================================================================
// Trait Implementations
//==============================================================================

impl ArcWake for ThreadWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        // The receiver lives as long as the kernel, so a failed send means that the kernel is gone.
        if let Err(e) = arc_self.ready_tx.send(arc_self.thread) {
            warn!("wake_by_ref(): kernel is gone (thread={:?}, error={:?})", arc_self.thread, e);
        }
    }
}
